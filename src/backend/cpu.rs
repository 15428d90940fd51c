//! Host-memory backend running the reference kernel.

use std::collections::HashMap;

use glam::Vec3;

use super::{ComputeBackend, KernelInfo};
use crate::agents::AgentBuffers;
use crate::error::Result;
use crate::kernel::{self, AgentState};
use crate::shader::{FlockParams, PackedVec3, KERNEL_ENTRY_POINT};

/// Handle to a buffer owned by a [`CpuBackend`].
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct CpuBuffer {
    id: u64,
}

/// Backend that keeps agent buffers in host memory and evaluates the
/// flocking rules with [`kernel::update_agent`].
///
/// Invocations read the state from before the dispatch, so results do not
/// depend on agent order.
#[derive(Debug)]
pub struct CpuBackend {
    buffers: HashMap<u64, Vec<PackedVec3>>,
    next_id: u64,
    workgroup_size: [u32; 3],
    kernel_enabled: bool,
    dispatch_count: u64,
}

impl CpuBackend {
    /// Lane width declared by the host kernel.
    pub const DEFAULT_WORKGROUP_SIZE: [u32; 3] = [64, 1, 1];

    pub fn new() -> Self {
        Self {
            buffers: HashMap::new(),
            next_id: 0,
            workgroup_size: Self::DEFAULT_WORKGROUP_SIZE,
            kernel_enabled: true,
            dispatch_count: 0,
        }
    }

    /// Declare a different thread-group size for the host kernel.
    pub fn with_workgroup_size(mut self, workgroup_size: [u32; 3]) -> Self {
        self.workgroup_size = workgroup_size;
        self
    }

    /// A backend whose kernel is missing; every tick is skipped.
    pub fn without_kernel() -> Self {
        Self {
            kernel_enabled: false,
            ..Self::new()
        }
    }

    /// Number of buffers currently allocated.
    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    /// Number of dispatches executed so far.
    pub fn dispatch_count(&self) -> u64 {
        self.dispatch_count
    }

    fn data(&self, buffer: &CpuBuffer) -> Option<&Vec<PackedVec3>> {
        self.buffers.get(&buffer.id)
    }

    fn store(&mut self, buffer: &CpuBuffer, index: usize, value: Vec3) {
        if let Some(slot) = self.buffers.get_mut(&buffer.id).and_then(|d| d.get_mut(index)) {
            *slot = value.into();
        }
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ComputeBackend for CpuBackend {
    type Buffer = CpuBuffer;

    fn kernel(&self) -> Option<KernelInfo> {
        self.kernel_enabled.then(|| KernelInfo {
            entry_point: KERNEL_ENTRY_POINT.to_string(),
            workgroup_size: self.workgroup_size,
        })
    }

    fn create_agent_buffer(&mut self, _label: &str, len: u32) -> Result<CpuBuffer> {
        let id = self.next_id;
        self.next_id += 1;
        self.buffers.insert(id, vec![PackedVec3::default(); len as usize]);
        Ok(CpuBuffer { id })
    }

    fn write_agent_buffer(&mut self, buffer: &CpuBuffer, data: &[PackedVec3]) {
        if let Some(dst) = self.buffers.get_mut(&buffer.id) {
            let n = data.len().min(dst.len());
            dst[..n].copy_from_slice(&data[..n]);
        }
    }

    fn buffer_len(&self, buffer: &CpuBuffer) -> u32 {
        self.data(buffer).map_or(0, |d| d.len() as u32)
    }

    fn release_buffer(&mut self, buffer: CpuBuffer) {
        self.buffers.remove(&buffer.id);
    }

    fn dispatch(
        &mut self,
        buffers: &AgentBuffers<CpuBuffer>,
        params: &FlockParams,
        workgroups: [u32; 3],
    ) {
        let (Some(positions), Some(velocities), Some(smoothed_p), Some(smoothed_v)) = (
            self.data(&buffers.positions),
            self.data(&buffers.velocities),
            self.data(&buffers.smoothed_positions),
            self.data(&buffers.smoothed_velocities),
        ) else {
            log::warn!("CPU dispatch references a released buffer, ignoring");
            return;
        };

        let len = [positions.len(), velocities.len(), smoothed_p.len(), smoothed_v.len()]
            .into_iter()
            .min()
            .unwrap_or(0);
        let count = (params.agent_count as usize).min(len);

        let agents: Vec<AgentState> = positions[..count]
            .iter()
            .zip(&velocities[..count])
            .map(|(p, v)| AgentState {
                position: p.to_vec3(),
                velocity: v.to_vec3(),
            })
            .collect();
        let prev_smoothed: Vec<(Vec3, Vec3)> = smoothed_p[..count]
            .iter()
            .zip(&smoothed_v[..count])
            .map(|(p, v)| (p.to_vec3(), v.to_vec3()))
            .collect();

        let invocations = workgroups
            .iter()
            .zip(self.workgroup_size)
            .map(|(&groups, size)| groups as u64 * size as u64)
            .product::<u64>();
        let active = (invocations.min(count as u64)) as usize;

        let blend = kernel::smoothing_blend(params.delta_time);
        for index in 0..active {
            let next = kernel::update_agent(index, &agents, params);
            let (sp, sv) = prev_smoothed[index];
            self.store(&buffers.positions, index, next.position);
            self.store(&buffers.velocities, index, next.velocity);
            self.store(&buffers.smoothed_positions, index, sp.lerp(next.position, blend));
            self.store(&buffers.smoothed_velocities, index, sv.lerp(next.velocity, blend));
        }

        self.dispatch_count += 1;
    }

    fn read_agent_buffer(&mut self, buffer: &CpuBuffer) -> Result<Vec<Vec3>> {
        Ok(self
            .data(buffer)
            .map(|d| d.iter().map(|v| v.to_vec3()).collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_lifecycle() {
        let mut backend = CpuBackend::new();
        let buf = backend.create_agent_buffer("test", 8).unwrap();
        assert_eq!(backend.buffer_len(&buf), 8);
        assert_eq!(backend.live_buffers(), 1);

        backend.write_agent_buffer(&buf, &[PackedVec3::from(Vec3::ONE)]);
        let data = backend.read_agent_buffer(&buf).unwrap();
        assert_eq!(data[0], Vec3::ONE);
        assert_eq!(data[1], Vec3::ZERO);

        backend.release_buffer(buf);
        assert_eq!(backend.live_buffers(), 0);
    }

    #[test]
    fn test_kernel_info() {
        let backend = CpuBackend::new().with_workgroup_size([32, 1, 1]);
        let info = backend.kernel().unwrap();
        assert_eq!(info.entry_point, "main");
        assert_eq!(info.width(), 32);

        assert!(CpuBackend::without_kernel().kernel().is_none());
    }

    #[test]
    fn test_released_buffer_reads_zero_len() {
        let mut backend = CpuBackend::new();
        let buf = backend.create_agent_buffer("a", 4).unwrap();
        let stale = CpuBuffer { id: buf.id };
        backend.release_buffer(buf);
        assert_eq!(backend.buffer_len(&stale), 0);
        assert!(backend.read_agent_buffer(&stale).unwrap().is_empty());
    }
}
