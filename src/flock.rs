//! The flock component.
//!
//! [`Flock`] is what a host scene owns. It wires the agent store, the
//! simulation driver, the render bridge and the reset notifier together
//! around one [`ComputeBackend`]:
//!
//! ```ignore
//! let config = FlockingConfig::default();
//! let mut flock = Flock::new(CpuBackend::new(), &config);
//! flock.start(&config, &mut sink)?;
//!
//! // once per fixed timestep
//! let report = flock.tick(1.0 / 50.0, &config, &TargetInput::default(), &mut sink)?;
//! ```
//!
//! Each tick runs, in order: a pending buffer reset, the kernel dispatch,
//! and the render hand-off. Dropping the flock releases its buffers.

use glam::Vec3;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::agents::{AgentBuffers, AgentStore};
use crate::backend::ComputeBackend;
use crate::config::FlockingConfig;
use crate::driver::{DispatchOutcome, SimulationDriver};
use crate::error::Result;
use crate::notifier::{ConfigChangeNotifier, ResetHandle, ResetState};
use crate::render::{RenderBridge, RenderSink};
use crate::target::TargetInput;

/// What happened during one tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickReport {
    /// Buffers were rebuilt at the start of the tick.
    pub reset: bool,
    pub dispatch: DispatchOutcome,
    /// Buffers bound on the render sink.
    pub bound_slots: u32,
}

/// Running totals since the flock was created.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlockStats {
    pub ticks: u64,
    pub dispatches: u64,
    pub skipped: u64,
    pub resets: u64,
}

/// A boids flock simulated on a compute backend.
pub struct Flock<B: ComputeBackend> {
    backend: B,
    store: AgentStore<B::Buffer>,
    driver: SimulationDriver,
    bridge: RenderBridge,
    notifier: ConfigChangeNotifier,
    rng: StdRng,
    stats: FlockStats,
}

impl<B: ComputeBackend> Flock<B> {
    /// Create a flock with no buffers yet. Seeding uses `config.seed` when set.
    pub fn new(backend: B, config: &FlockingConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            backend,
            store: AgentStore::new(),
            driver: SimulationDriver::new(),
            bridge: RenderBridge::new(),
            notifier: ConfigChangeNotifier::new(),
            rng,
            stats: FlockStats::default(),
        }
    }

    /// Allocate and seed the agent buffers and announce the instance count.
    ///
    /// Returns the allocated agent count.
    pub fn start<S>(&mut self, config: &FlockingConfig, sink: &mut S) -> Result<u32>
    where
        S: RenderSink<B::Buffer> + ?Sized,
    {
        let count = self.rebuild(config)?;
        self.bridge.publish_instance_count(&self.store, sink);
        log::info!("Flock started with {} agents", count);
        Ok(count)
    }

    /// Advance the simulation by one fixed timestep.
    ///
    /// Missing resources skip the dispatch rather than fail. An error is
    /// only returned when a pending reset cannot allocate its buffers; the
    /// reset stays pending and is retried on every following tick.
    pub fn tick<S>(
        &mut self,
        delta_time: f32,
        config: &FlockingConfig,
        input: &TargetInput,
        sink: &mut S,
    ) -> Result<TickReport>
    where
        S: RenderSink<B::Buffer> + ?Sized,
    {
        self.stats.ticks += 1;

        let reset = self.notifier.begin_reset();
        if reset {
            let count = match self.rebuild(config) {
                Ok(count) => count,
                Err(e) => {
                    // Retry on the next tick
                    self.notifier.notify();
                    return Err(e);
                }
            };
            self.bridge.publish_instance_count(&self.store, sink);
            log::info!("Flock reset to {} agents", count);
        }

        let dispatch = self
            .driver
            .step(&mut self.backend, &self.store, config, input, delta_time);
        match dispatch {
            DispatchOutcome::Dispatched { workgroups, .. } => {
                self.stats.dispatches += 1;
                log::trace!("Dispatched {:?} thread groups", workgroups);
            }
            DispatchOutcome::Skipped(reason) => {
                self.stats.skipped += 1;
                log::debug!("Skipped dispatch: {:?}", reason);
            }
        }

        let bound_slots = self.bridge.publish(&self.store, config, sink);

        Ok(TickReport {
            reset,
            dispatch,
            bound_slots,
        })
    }

    /// Request a buffer reset at the start of the next tick.
    pub fn notify(&self) {
        self.notifier.notify();
    }

    /// Handle for requesting resets from elsewhere.
    pub fn reset_handle(&self) -> ResetHandle {
        self.notifier.handle()
    }

    pub fn reset_state(&self) -> ResetState {
        self.notifier.state()
    }

    /// Free the agent buffers. Safe to call repeatedly.
    pub fn release(&mut self) {
        if self.store.is_allocated() {
            log::info!("Releasing flock buffers");
        }
        self.store.release(&mut self.backend);
    }

    /// Allocated agent count, 0 when released.
    pub fn agent_count(&self) -> u32 {
        self.store.count()
    }

    pub fn buffers(&self) -> Option<&AgentBuffers<B::Buffer>> {
        self.store.buffers()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn stats(&self) -> FlockStats {
        self.stats
    }

    /// Target of the most recent dispatch.
    pub fn last_target(&self) -> Vec3 {
        self.driver.last_target()
    }

    /// Read back raw positions. Empty when no buffers are allocated.
    pub fn read_positions(&mut self) -> Result<Vec<Vec3>> {
        self.read(|b| &b.positions)
    }

    /// Read back raw velocities.
    pub fn read_velocities(&mut self) -> Result<Vec<Vec3>> {
        self.read(|b| &b.velocities)
    }

    /// Read back smoothed positions.
    pub fn read_smoothed_positions(&mut self) -> Result<Vec<Vec3>> {
        self.read(|b| &b.smoothed_positions)
    }

    /// Read back smoothed velocities.
    pub fn read_smoothed_velocities(&mut self) -> Result<Vec<Vec3>> {
        self.read(|b| &b.smoothed_velocities)
    }

    fn read(&mut self, pick: fn(&AgentBuffers<B::Buffer>) -> &B::Buffer) -> Result<Vec<Vec3>> {
        match self.store.buffers() {
            Some(buffers) => self.backend.read_agent_buffer(pick(buffers)),
            None => Ok(Vec::new()),
        }
    }

    fn rebuild(&mut self, config: &FlockingConfig) -> Result<u32> {
        let count = self.store.reset(
            &mut self.backend,
            config.agent_count,
            config.speed_range(),
            config.spawn_extent,
            &mut self.rng,
        )
        .inspect_err(|e| log::warn!("Failed to allocate agent buffers: {}", e))?;
        self.stats.resets += 1;
        Ok(count)
    }
}

impl<B: ComputeBackend> Drop for Flock<B> {
    fn drop(&mut self) {
        self.store.release(&mut self.backend);
    }
}
