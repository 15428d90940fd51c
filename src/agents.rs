//! Agent state storage.
//!
//! The flock is a structure of arrays: raw positions and velocities written
//! by the kernel, plus smoothed copies the renderer reads. The four buffers
//! are created, seeded and released together and always share one length.

use std::f32::consts::PI;

use glam::{Vec2, Vec3};
use rand::Rng;

use crate::backend::ComputeBackend;
use crate::error::{Result, ShoalError};
use crate::shader::PackedVec3;

/// Smallest agent count ever allocated.
pub const MIN_AGENT_COUNT: u32 = 256;

/// Default half-size of the cube agents are seeded in.
pub const DEFAULT_SPAWN_EXTENT: f32 = 10.0;

/// Agent count actually allocated for a requested count.
#[inline]
pub fn effective_agent_count(requested: u32) -> u32 {
    requested.max(MIN_AGENT_COUNT)
}

/// The four per-agent buffers of one allocation.
#[derive(Debug)]
pub struct AgentBuffers<B> {
    pub positions: B,
    pub velocities: B,
    pub smoothed_positions: B,
    pub smoothed_velocities: B,
    count: u32,
    generation: u64,
}

impl<B> AgentBuffers<B> {
    /// Agents per buffer.
    #[inline]
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Increments on every allocation; backends key cached bindings on it.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// All four buffers in kernel slot order.
    pub fn all(&self) -> [&B; 4] {
        [
            &self.positions,
            &self.velocities,
            &self.smoothed_positions,
            &self.smoothed_velocities,
        ]
    }
}

/// Initial positions and velocities for a flock.
#[derive(Clone, Debug, Default)]
pub struct SeedData {
    pub positions: Vec<Vec3>,
    pub velocities: Vec<Vec3>,
}

/// Uniformly distributed unit vector.
pub fn random_direction<R: Rng + ?Sized>(rng: &mut R) -> Vec3 {
    let theta = rng.gen_range(-PI..=PI);
    let phi = rng.gen_range(-1.0f32..=1.0).asin();
    Vec3::new(phi.cos() * theta.cos(), phi.cos() * theta.sin(), phi.sin())
}

/// Random positions in the cube `[-extent, extent]^3` and random headings
/// at the middle of `speed_range`.
pub fn generate_seed<R: Rng + ?Sized>(
    count: u32,
    speed_range: Vec2,
    extent: f32,
    rng: &mut R,
) -> SeedData {
    let speed = (speed_range.x + speed_range.y) * 0.5;
    let mut positions = Vec::with_capacity(count as usize);
    let mut velocities = Vec::with_capacity(count as usize);

    for _ in 0..count {
        positions.push(
            Vec3::new(
                rng.gen_range(-1.0..=1.0),
                rng.gen_range(-1.0..=1.0),
                rng.gen_range(-1.0..=1.0),
            ) * extent,
        );
        velocities.push(random_direction(rng) * speed);
    }

    SeedData {
        positions,
        velocities,
    }
}

/// Owner of the flock's agent buffers.
#[derive(Debug)]
pub struct AgentStore<B> {
    buffers: Option<AgentBuffers<B>>,
    generation: u64,
}

impl<B> AgentStore<B> {
    pub fn new() -> Self {
        Self {
            buffers: None,
            generation: 0,
        }
    }

    /// Current buffers, if allocated.
    #[inline]
    pub fn buffers(&self) -> Option<&AgentBuffers<B>> {
        self.buffers.as_ref()
    }

    #[inline]
    pub fn is_allocated(&self) -> bool {
        self.buffers.is_some()
    }

    /// Allocated agent count, 0 when released.
    #[inline]
    pub fn count(&self) -> u32 {
        self.buffers.as_ref().map_or(0, |b| b.count)
    }

    /// Allocate four zeroed buffers for `requested` agents, clamped to
    /// [`MIN_AGENT_COUNT`]. Any previous allocation is released first.
    ///
    /// Returns the allocated count.
    pub fn allocate<C>(&mut self, backend: &mut C, requested: u32) -> Result<u32>
    where
        C: ComputeBackend<Buffer = B>,
    {
        self.release(backend);

        let count = effective_agent_count(requested);

        // Buffers created before a failure are released again
        let positions = backend.create_agent_buffer("Position Buffer", count)?;
        let velocities = match backend.create_agent_buffer("Velocity Buffer", count) {
            Ok(buffer) => buffer,
            Err(e) => return Err(release_partial(backend, [positions], e)),
        };
        let smoothed_positions =
            match backend.create_agent_buffer("Smoothed Position Buffer", count) {
                Ok(buffer) => buffer,
                Err(e) => return Err(release_partial(backend, [positions, velocities], e)),
            };
        let smoothed_velocities =
            match backend.create_agent_buffer("Smoothed Velocity Buffer", count) {
                Ok(buffer) => buffer,
                Err(e) => {
                    let held = [positions, velocities, smoothed_positions];
                    return Err(release_partial(backend, held, e));
                }
            };

        self.generation += 1;
        self.buffers = Some(AgentBuffers {
            positions,
            velocities,
            smoothed_positions,
            smoothed_velocities,
            count,
            generation: self.generation,
        });

        log::debug!(
            "Allocated agent buffers for {} agents (generation {})",
            count,
            self.generation
        );
        Ok(count)
    }

    /// Fill the buffers with fresh random state. Smoothed buffers get the
    /// same values as the raw ones.
    ///
    /// Returns `false` if nothing is allocated.
    pub fn seed<C, R>(
        &mut self,
        backend: &mut C,
        speed_range: Vec2,
        extent: f32,
        rng: &mut R,
    ) -> bool
    where
        C: ComputeBackend<Buffer = B>,
        R: Rng + ?Sized,
    {
        let Some(buffers) = &self.buffers else {
            return false;
        };

        let seed = generate_seed(buffers.count, speed_range, extent, rng);
        let positions: Vec<PackedVec3> = seed.positions.iter().map(|&p| p.into()).collect();
        let velocities: Vec<PackedVec3> = seed.velocities.iter().map(|&v| v.into()).collect();

        backend.write_agent_buffer(&buffers.positions, &positions);
        backend.write_agent_buffer(&buffers.velocities, &velocities);
        backend.write_agent_buffer(&buffers.smoothed_positions, &positions);
        backend.write_agent_buffer(&buffers.smoothed_velocities, &velocities);
        true
    }

    /// Free all four buffers. Does nothing when already released.
    pub fn release<C>(&mut self, backend: &mut C)
    where
        C: ComputeBackend<Buffer = B>,
    {
        if let Some(buffers) = self.buffers.take() {
            backend.release_buffer(buffers.positions);
            backend.release_buffer(buffers.velocities);
            backend.release_buffer(buffers.smoothed_positions);
            backend.release_buffer(buffers.smoothed_velocities);
            log::debug!("Released agent buffers (generation {})", buffers.generation);
        }
    }

    /// Release, allocate and seed in one step.
    pub fn reset<C, R>(
        &mut self,
        backend: &mut C,
        requested: u32,
        speed_range: Vec2,
        extent: f32,
        rng: &mut R,
    ) -> Result<u32>
    where
        C: ComputeBackend<Buffer = B>,
        R: Rng + ?Sized,
    {
        let count = self.allocate(backend, requested)?;
        self.seed(backend, speed_range, extent, rng);
        Ok(count)
    }
}

fn release_partial<C, const N: usize>(
    backend: &mut C,
    held: [C::Buffer; N],
    err: ShoalError,
) -> ShoalError
where
    C: ComputeBackend,
{
    log::debug!("Releasing {} agent buffers after a failed allocation", N);
    for buffer in held {
        backend.release_buffer(buffer);
    }
    err
}

impl<B> Default for AgentStore<B> {
    fn default() -> Self {
        Self::new()
    }
}
