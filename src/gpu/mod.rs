//! wgpu compute backend.
//!
//! Compiles `flocking.wgsl` into a compute pipeline and keeps agent buffers
//! in device memory. Buffers are created with `VERTEX` usage as well as
//! `STORAGE`, so a renderer sharing the device can read the smoothed
//! buffers directly as per-instance data.
//!
//! Each dispatch first copies the raw positions and velocities into a pair
//! of snapshot buffers. The kernel reads neighbors from the snapshot only,
//! which gives every agent the same view of the previous tick.

use std::sync::mpsc;

use glam::Vec3;

use crate::agents::AgentBuffers;
use crate::backend::{ComputeBackend, KernelInfo};
use crate::error::{Result, ShoalError};
use crate::shader::{
    FlockParams, KernelSlot, PackedVec3, FLOCKING_SOURCE, KERNEL_ENTRY_POINT,
};

/// Find the compute entry point `entry_point` in `source` and read its
/// declared thread-group size.
pub fn discover_kernel(source: &str, entry_point: &str) -> Result<KernelInfo> {
    let module = naga::front::wgsl::parse_str(source)
        .map_err(|e| ShoalError::KernelParse(e.emit_to_string(source)))?;

    module
        .entry_points
        .iter()
        .find(|ep| ep.stage == naga::ShaderStage::Compute && ep.name == entry_point)
        .map(|ep| KernelInfo {
            entry_point: ep.name.clone(),
            workgroup_size: ep.workgroup_size,
        })
        .ok_or_else(|| ShoalError::KernelEntryPointMissing(entry_point.to_string()))
}

/// Agent buffer in device memory.
#[derive(Debug)]
pub struct GpuBuffer {
    buffer: wgpu::Buffer,
    len: u32,
}

impl GpuBuffer {
    /// The underlying buffer, for binding in a render pass.
    pub fn raw(&self) -> &wgpu::Buffer {
        &self.buffer
    }
}

struct Kernel {
    info: KernelInfo,
    pipeline: wgpu::ComputePipeline,
}

/// Bind group and snapshot buffers for one agent buffer generation.
struct Binding {
    generation: u64,
    previous_positions: wgpu::Buffer,
    previous_velocities: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl Binding {
    fn destroy(self) {
        self.previous_positions.destroy();
        self.previous_velocities.destroy();
    }
}

/// Backend running the flocking kernel on a wgpu device.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    bind_group_layout: wgpu::BindGroupLayout,
    params_buffer: wgpu::Buffer,
    kernel: Option<Kernel>,
    binding: Option<Binding>,
    max_buffer_bytes: u64,
}

impl WgpuBackend {
    /// Request a high-performance adapter and build the kernel on it.
    pub async fn new() -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(ShoalError::NoAdapter)?;

        let info = adapter.get_info();
        log::info!("Using adapter {} ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Flocking Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        Ok(Self::from_device(device, queue, FLOCKING_SOURCE))
    }

    /// Blocking version of [`WgpuBackend::new`].
    pub fn new_blocking() -> Result<Self> {
        pollster::block_on(Self::new())
    }

    /// Build the backend on an existing device, e.g. the renderer's.
    ///
    /// A kernel that fails to parse or lacks a `main` compute entry point
    /// leaves the backend without a kernel; every dispatch is then skipped.
    pub fn from_device(device: wgpu::Device, queue: wgpu::Queue, source: &str) -> Self {
        let limits = device.limits();
        let max_buffer_bytes =
            u64::from(limits.max_storage_buffer_binding_size).min(limits.max_buffer_size);

        let layout_entries: Vec<wgpu::BindGroupLayoutEntry> = KernelSlot::ALL
            .iter()
            .map(|&slot| wgpu::BindGroupLayoutEntry {
                binding: slot.binding(),
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: if slot.is_uniform() {
                        wgpu::BufferBindingType::Uniform
                    } else {
                        wgpu::BufferBindingType::Storage {
                            read_only: slot.is_read_only(),
                        }
                    },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            })
            .collect();

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Flocking Bind Group Layout"),
            entries: &layout_entries,
        });

        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Flock Params Buffer"),
            size: std::mem::size_of::<FlockParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let kernel = match discover_kernel(source, KERNEL_ENTRY_POINT) {
            Ok(info) => {
                let pipeline = Self::create_pipeline(&device, &bind_group_layout, source, &info);
                log::info!(
                    "Flocking kernel `{}` ready, workgroup size {:?}",
                    info.entry_point,
                    info.workgroup_size
                );
                Some(Kernel { info, pipeline })
            }
            Err(e) => {
                log::warn!("Flocking kernel unavailable: {}", e);
                None
            }
        };

        Self {
            device,
            queue,
            bind_group_layout,
            params_buffer,
            kernel,
            binding: None,
            max_buffer_bytes,
        }
    }

    fn create_pipeline(
        device: &wgpu::Device,
        bind_group_layout: &wgpu::BindGroupLayout,
        source: &str,
        info: &KernelInfo,
    ) -> wgpu::ComputePipeline {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Flocking Kernel"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Flocking Pipeline Layout"),
            bind_group_layouts: &[bind_group_layout],
            push_constant_ranges: &[],
        });

        device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Flocking Pipeline"),
            layout: Some(&layout),
            module: &module,
            entry_point: Some(info.entry_point.as_str()),
            compilation_options: Default::default(),
            cache: None,
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    fn create_snapshot_buffer(&self, label: &str, size: u64) -> wgpu::Buffer {
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn ensure_binding(&mut self, buffers: &AgentBuffers<GpuBuffer>) {
        let generation = buffers.generation();
        if matches!(&self.binding, Some(b) if b.generation == generation) {
            return;
        }
        if let Some(old) = self.binding.take() {
            old.destroy();
        }

        let previous_positions =
            self.create_snapshot_buffer("Previous Positions", buffers.positions.buffer.size());
        let previous_velocities =
            self.create_snapshot_buffer("Previous Velocities", buffers.velocities.buffer.size());

        let bind_group = {
            let entries: Vec<wgpu::BindGroupEntry> = KernelSlot::ALL
                .iter()
                .map(|&slot| {
                    let buffer = match slot {
                        KernelSlot::Positions => &buffers.positions.buffer,
                        KernelSlot::Velocities => &buffers.velocities.buffer,
                        KernelSlot::SmoothedPositions => &buffers.smoothed_positions.buffer,
                        KernelSlot::SmoothedVelocities => &buffers.smoothed_velocities.buffer,
                        KernelSlot::Params => &self.params_buffer,
                        KernelSlot::PreviousPositions => &previous_positions,
                        KernelSlot::PreviousVelocities => &previous_velocities,
                    };
                    wgpu::BindGroupEntry {
                        binding: slot.binding(),
                        resource: buffer.as_entire_binding(),
                    }
                })
                .collect();

            self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Flocking Bind Group"),
                layout: &self.bind_group_layout,
                entries: &entries,
            })
        };
        log::debug!("Rebuilt flocking bind group for generation {}", generation);
        self.binding = Some(Binding {
            generation,
            previous_positions,
            previous_velocities,
            bind_group,
        });
    }
}

impl ComputeBackend for WgpuBackend {
    type Buffer = GpuBuffer;

    fn kernel(&self) -> Option<KernelInfo> {
        self.kernel.as_ref().map(|k| k.info.clone())
    }

    fn create_agent_buffer(&mut self, label: &str, len: u32) -> Result<GpuBuffer> {
        let size = u64::from(len.max(1)) * PackedVec3::STRIDE;
        if size > self.max_buffer_bytes {
            return Err(ShoalError::BufferTooLarge {
                requested: size,
                limit: self.max_buffer_bytes,
            });
        }

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::VERTEX
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Ok(GpuBuffer { buffer, len })
    }

    fn write_agent_buffer(&mut self, buffer: &GpuBuffer, data: &[PackedVec3]) {
        let n = data.len().min(buffer.len as usize);
        if n == 0 {
            return;
        }
        self.queue
            .write_buffer(&buffer.buffer, 0, bytemuck::cast_slice(&data[..n]));
    }

    fn buffer_len(&self, buffer: &GpuBuffer) -> u32 {
        buffer.len
    }

    fn release_buffer(&mut self, buffer: GpuBuffer) {
        // The cached bind group references the buffer
        if let Some(old) = self.binding.take() {
            old.destroy();
        }
        buffer.buffer.destroy();
    }

    fn dispatch(
        &mut self,
        buffers: &AgentBuffers<GpuBuffer>,
        params: &FlockParams,
        workgroups: [u32; 3],
    ) {
        if self.kernel.is_none() {
            return;
        }
        self.queue
            .write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(params));

        self.ensure_binding(buffers);
        let (Some(kernel), Some(binding)) = (&self.kernel, &self.binding) else {
            return;
        };

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Flocking Encoder"),
        });
        for (src, dst) in [
            (&buffers.positions.buffer, &binding.previous_positions),
            (&buffers.velocities.buffer, &binding.previous_velocities),
        ] {
            encoder.copy_buffer_to_buffer(src, 0, dst, 0, src.size().min(dst.size()));
        }
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Flocking Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&kernel.pipeline);
            pass.set_bind_group(0, &binding.bind_group, &[]);
            let [x, y, z] = workgroups;
            pass.dispatch_workgroups(x, y, z);
        }
        self.queue.submit(Some(encoder.finish()));
    }

    fn read_agent_buffer(&mut self, buffer: &GpuBuffer) -> Result<Vec<Vec3>> {
        if buffer.len == 0 {
            return Ok(Vec::new());
        }
        let size = u64::from(buffer.len) * PackedVec3::STRIDE;

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Agent Readback Buffer"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Agent Readback Encoder"),
        });
        encoder.copy_buffer_to_buffer(&buffer.buffer, 0, &staging, 0, size);
        self.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);

        rx.recv()
            .map_err(|e| ShoalError::BufferMapping(e.to_string()))?
            .map_err(|e| ShoalError::BufferMapping(e.to_string()))?;

        let data = {
            let view = slice.get_mapped_range();
            bytemuck::cast_slice::<u8, PackedVec3>(&view)
                .iter()
                .map(|p| p.to_vec3())
                .collect()
        };
        staging.unmap();
        staging.destroy();
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discover_flocking_kernel() {
        let info = discover_kernel(FLOCKING_SOURCE, KERNEL_ENTRY_POINT).unwrap();
        assert_eq!(info.entry_point, "main");
        assert_eq!(info.workgroup_size, [64, 1, 1]);
        assert_eq!(info.width(), 64);
    }

    #[test]
    fn test_discover_missing_entry_point() {
        let err = discover_kernel(FLOCKING_SOURCE, "flock").unwrap_err();
        assert!(matches!(err, ShoalError::KernelEntryPointMissing(name) if name == "flock"));
    }

    #[test]
    fn test_discover_ignores_non_compute_entry_points() {
        let src = r#"
            @vertex
            fn main() -> @builtin(position) vec4<f32> {
                return vec4<f32>(0.0);
            }
        "#;
        assert!(matches!(
            discover_kernel(src, "main"),
            Err(ShoalError::KernelEntryPointMissing(_))
        ));
    }

    #[test]
    fn test_discover_reads_declared_size() {
        let src = r#"
            @compute @workgroup_size(128, 2)
            fn main() {}
        "#;
        let info = discover_kernel(src, "main").unwrap();
        assert_eq!(info.workgroup_size, [128, 2, 1]);
    }

    #[test]
    fn test_discover_parse_error() {
        assert!(matches!(
            discover_kernel("fn main( {", "main"),
            Err(ShoalError::KernelParse(_))
        ));
    }
}
