//! # Shoal - GPU Boids Flocking
//!
//! A compute-driven flock of thousands of agents that align, cohere,
//! separate and seek a target, with state kept in GPU buffers and handed
//! straight to a renderer.
//!
//! Shoal owns the buffers and the per-tick dispatch. Drawing is left to the
//! host through the [`RenderSink`] trait.
//!
//! ## Quick Start
//!
//! ```ignore
//! use shoal::prelude::*;
//!
//! fn main() -> shoal::Result<()> {
//!     let config = FlockingConfig::default();
//!     let mut flock = Flock::new(WgpuBackend::new_blocking()?, &config);
//!     let mut sink = NullSink;
//!     flock.start(&config, &mut sink)?;
//!
//!     let mut clock = FixedClock::default();
//!     loop {
//!         for _ in 0..clock.update() {
//!             flock.tick(clock.fixed_delta(), &config, &TargetInput::default(), &mut sink)?;
//!         }
//!     }
//! }
//! ```
//!
//! ## Core Concepts
//!
//! ### Agent buffers
//!
//! Each agent has a position and velocity plus smoothed copies of both. The
//! four values live in four separate buffers of [`PackedVec3`], one element
//! per agent. The kernel integrates the raw pair; the renderer reads the
//! smoothed pair. A flock never holds fewer than [`MIN_AGENT_COUNT`] agents.
//!
//! ### Ticks
//!
//! [`Flock::tick`] runs once per fixed timestep:
//!
//! 1. If a reset was requested, buffers are rebuilt at the configured count.
//! 2. The target is resolved and all parameters are uploaded.
//! 3. The kernel is dispatched over `ceil(count / workgroup_width)` groups.
//! 4. The smoothed buffers are bound on the render sink.
//!
//! A missing kernel or buffer skips the dispatch; nothing panics.
//!
//! ### Resets
//!
//! Parameter edits take effect on the next tick. Changing the agent count
//! needs new buffers: call [`Flock::notify`] (or a [`ResetHandle`] from
//! another thread) and the next tick rebuilds them.
//!
//! ## Backends
//!
//! | Backend | Use |
//! |---------|-----|
//! | [`WgpuBackend`] | wgpu compute pipeline built from `flocking.wgsl` |
//! | [`CpuBackend`] | Host evaluation of the same rules, for tests and headless runs |

pub mod agents;
pub mod backend;
pub mod clock;
pub mod config;
pub mod driver;
pub mod error;
pub mod flock;
pub mod gpu;
pub mod kernel;
pub mod notifier;
pub mod render;
pub mod shader;
pub mod target;

pub use agents::{AgentBuffers, AgentStore, MIN_AGENT_COUNT};
pub use backend::{ComputeBackend, CpuBackend, CpuBuffer, KernelInfo};
pub use bytemuck;
pub use clock::FixedClock;
pub use config::{FlockingConfig, RenderConfig, TargetConfig};
pub use driver::{DispatchOutcome, SimulationDriver, SkipReason};
pub use error::{Result, ShoalError};
pub use flock::{Flock, FlockStats, TickReport};
pub use glam::{Vec2, Vec3};
pub use gpu::{GpuBuffer, WgpuBackend};
pub use notifier::{ConfigChangeNotifier, ResetHandle, ResetState};
pub use render::{NullSink, RenderBridge, RenderSink, RenderSlot};
pub use shader::{FlockParams, PackedVec3};
pub use target::{PointerSample, TargetInput, TargetSource};

/// Convenient re-exports for common usage.
///
/// # Usage
///
/// ```ignore
/// use shoal::prelude::*;
/// ```
pub mod prelude {
    pub use crate::backend::{ComputeBackend, CpuBackend};
    pub use crate::clock::FixedClock;
    pub use crate::config::FlockingConfig;
    pub use crate::flock::{Flock, TickReport};
    pub use crate::gpu::WgpuBackend;
    pub use crate::notifier::ResetHandle;
    pub use crate::render::{NullSink, RenderSink, RenderSlot};
    pub use crate::target::{PointerSample, TargetInput, TargetSource};
    pub use crate::{Vec2, Vec3};
}
