//! GPU-side layout of the flocking kernel inputs.
//!
//! The Rust structs here match the WGSL declarations in `flocking.wgsl`
//! byte for byte. Agent vectors are stored as `vec4<f32>` with an unused
//! `w` so that storage arrays keep a 16-byte stride.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// WGSL source of the flocking compute kernel.
pub const FLOCKING_SOURCE: &str = include_str!("flocking.wgsl");

/// Name of the compute entry point in [`FLOCKING_SOURCE`].
pub const KERNEL_ENTRY_POINT: &str = "main";

/// One agent vector as laid out in a storage buffer.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PackedVec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub _pad: f32,
}

impl PackedVec3 {
    /// Size of one element in bytes.
    pub const STRIDE: u64 = std::mem::size_of::<PackedVec3>() as u64;

    #[inline]
    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }
}

impl From<Vec3> for PackedVec3 {
    fn from(v: Vec3) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
            _pad: 0.0,
        }
    }
}

impl From<PackedVec3> for Vec3 {
    fn from(v: PackedVec3) -> Self {
        v.to_vec3()
    }
}

/// Scalar and vector parameters uploaded to the kernel every tick.
///
/// Field order is chosen so the struct has no implicit padding under WGSL
/// uniform layout rules (each `vec3` lands on a 16-byte boundary and is
/// followed by a 4-byte scalar).
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct FlockParams {
    pub speed_range: [f32; 2],
    pub agent_count: u32,
    pub max_steer_force: f32,
    /// (alignment, cohesion, separation)
    pub force_weight: [f32; 3],
    pub delta_time: f32,
    /// (alignment, cohesion, separation)
    pub perception_radius: [f32; 3],
    pub target_seek_force: f32,
    pub target_position: [f32; 3],
    pub target_clamp_distance: f32,
}

/// Binding slots of the flocking kernel, all in bind group 0.
///
/// The kernel reads neighbors from the `Previous*` slots, a copy of the
/// raw buffers taken before each dispatch, and writes the raw and smoothed
/// slots only at its own agent index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KernelSlot {
    Positions,
    Velocities,
    SmoothedPositions,
    SmoothedVelocities,
    Params,
    PreviousPositions,
    PreviousVelocities,
}

impl KernelSlot {
    pub const ALL: [KernelSlot; 7] = [
        KernelSlot::Positions,
        KernelSlot::Velocities,
        KernelSlot::SmoothedPositions,
        KernelSlot::SmoothedVelocities,
        KernelSlot::Params,
        KernelSlot::PreviousPositions,
        KernelSlot::PreviousVelocities,
    ];

    /// `@binding` index in the WGSL source.
    pub fn binding(self) -> u32 {
        match self {
            KernelSlot::Positions => 0,
            KernelSlot::Velocities => 1,
            KernelSlot::SmoothedPositions => 2,
            KernelSlot::SmoothedVelocities => 3,
            KernelSlot::Params => 4,
            KernelSlot::PreviousPositions => 5,
            KernelSlot::PreviousVelocities => 6,
        }
    }

    /// Variable name of the slot in the WGSL source.
    pub fn wgsl_name(self) -> &'static str {
        match self {
            KernelSlot::Positions => "positions",
            KernelSlot::Velocities => "velocities",
            KernelSlot::SmoothedPositions => "smoothed_positions",
            KernelSlot::SmoothedVelocities => "smoothed_velocities",
            KernelSlot::Params => "params",
            KernelSlot::PreviousPositions => "previous_positions",
            KernelSlot::PreviousVelocities => "previous_velocities",
        }
    }

    pub fn is_uniform(self) -> bool {
        matches!(self, KernelSlot::Params)
    }

    /// Storage slots the kernel never writes.
    pub fn is_read_only(self) -> bool {
        matches!(
            self,
            KernelSlot::PreviousPositions | KernelSlot::PreviousVelocities
        )
    }
}
