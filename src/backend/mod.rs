//! Compute backends.
//!
//! A backend owns the memory that agent buffers live in and the flocking
//! kernel that runs over them. [`CpuBackend`] evaluates the kernel on the
//! host and is what tests and headless runs use;
//! [`WgpuBackend`](crate::gpu::WgpuBackend) compiles `flocking.wgsl` into a
//! compute pipeline.

mod cpu;

pub use cpu::{CpuBackend, CpuBuffer};

use glam::Vec3;

use crate::agents::AgentBuffers;
use crate::error::Result;
use crate::shader::{FlockParams, PackedVec3};

/// What the driver needs to know about a compiled kernel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KernelInfo {
    /// Entry point the kernel was discovered under.
    pub entry_point: String,
    /// Thread-group size declared by the kernel.
    pub workgroup_size: [u32; 3],
}

impl KernelInfo {
    /// Lanes per thread group along X, the only axis the driver dispatches over.
    #[inline]
    pub fn width(&self) -> u32 {
        self.workgroup_size[0]
    }
}

/// Memory and kernel provider for a flock.
///
/// Buffers hold [`PackedVec3`] elements. All operations are issued from a
/// single thread; `dispatch` only records or runs the work and never reads
/// results back.
pub trait ComputeBackend {
    /// Handle to one agent buffer.
    type Buffer;

    /// The flocking kernel, or `None` if it is not available.
    fn kernel(&self) -> Option<KernelInfo>;

    /// Allocate a zeroed buffer of `len` elements.
    fn create_agent_buffer(&mut self, label: &str, len: u32) -> Result<Self::Buffer>;

    /// Overwrite the start of `buffer` with `data`.
    fn write_agent_buffer(&mut self, buffer: &Self::Buffer, data: &[PackedVec3]);

    /// Element count of `buffer`; 0 once the buffer has been released.
    fn buffer_len(&self, buffer: &Self::Buffer) -> u32;

    /// Free `buffer`.
    fn release_buffer(&mut self, buffer: Self::Buffer);

    /// Run the kernel over `buffers` with `params` in `workgroups` thread groups.
    fn dispatch(
        &mut self,
        buffers: &AgentBuffers<Self::Buffer>,
        params: &FlockParams,
        workgroups: [u32; 3],
    );

    /// Copy `buffer` back to the host. Blocks until prior dispatches finish.
    fn read_agent_buffer(&mut self, buffer: &Self::Buffer) -> Result<Vec<Vec3>>;
}
