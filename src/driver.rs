//! Per-tick kernel dispatch.
//!
//! Each tick the driver resolves the target point, packs every simulation
//! parameter into [`FlockParams`], sizes the dispatch from the kernel's own
//! thread-group width and hands everything to the backend. Nothing is read
//! back. When the kernel or a buffer is missing the tick is skipped and the
//! next tick tries again.

use glam::Vec3;

use crate::agents::AgentStore;
use crate::backend::ComputeBackend;
use crate::config::FlockingConfig;
use crate::shader::FlockParams;
use crate::target::{resolve_target, TargetInput};

/// Why a tick did not dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// The backend has no kernel.
    KernelUnavailable,
    /// The kernel declares a zero-width thread group.
    EmptyWorkgroup,
    /// Agent buffers are not allocated.
    BuffersUnavailable,
    /// A buffer's length differs from the allocated agent count.
    BufferLengthMismatch { expected: u32, found: u32 },
    /// A simulation parameter or the target is NaN or infinite.
    NonFiniteParams,
}

/// Result of one driver step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DispatchOutcome {
    Dispatched { workgroups: [u32; 3], target: Vec3 },
    Skipped(SkipReason),
}

impl DispatchOutcome {
    pub fn is_dispatched(&self) -> bool {
        matches!(self, DispatchOutcome::Dispatched { .. })
    }
}

/// One-dimensional thread-group count covering `agent_count` agents.
#[inline]
pub fn dispatch_size(agent_count: u32, workgroup_width: u32) -> [u32; 3] {
    [agent_count.div_ceil(workgroup_width), 1, 1]
}

/// Pack the kernel parameters for one tick.
///
/// The speed range is reordered so that `min <= max` holds even when the
/// config was edited into an inverted range.
pub fn build_params(
    config: &FlockingConfig,
    target: Vec3,
    agent_count: u32,
    delta_time: f32,
) -> FlockParams {
    let [a, b] = config.speed_range;
    FlockParams {
        speed_range: if a <= b { [a, b] } else { [b, a] },
        agent_count,
        max_steer_force: config.max_steer_force,
        force_weight: config.force_weight,
        delta_time,
        perception_radius: config.perception_radius,
        target_seek_force: config.target.seek_force,
        target_position: target.to_array(),
        target_clamp_distance: config.target.clamp_distance,
    }
}

fn params_are_finite(params: &FlockParams) -> bool {
    params
        .speed_range
        .iter()
        .chain(&params.force_weight)
        .chain(&params.perception_radius)
        .chain(&params.target_position)
        .chain([
            &params.max_steer_force,
            &params.delta_time,
            &params.target_seek_force,
            &params.target_clamp_distance,
        ])
        .all(|v| v.is_finite())
}

/// Issues the flocking kernel once per tick.
#[derive(Debug, Default)]
pub struct SimulationDriver {
    last_target: Vec3,
    dispatches: u64,
}

impl SimulationDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Target used by the most recent dispatch.
    pub fn last_target(&self) -> Vec3 {
        self.last_target
    }

    /// Dispatches issued so far.
    pub fn dispatches(&self) -> u64 {
        self.dispatches
    }

    /// Upload parameters and dispatch the kernel for one tick.
    pub fn step<C>(
        &mut self,
        backend: &mut C,
        store: &AgentStore<C::Buffer>,
        config: &FlockingConfig,
        input: &TargetInput,
        delta_time: f32,
    ) -> DispatchOutcome
    where
        C: ComputeBackend,
    {
        let Some(kernel) = backend.kernel() else {
            return DispatchOutcome::Skipped(SkipReason::KernelUnavailable);
        };
        if kernel.width() == 0 {
            return DispatchOutcome::Skipped(SkipReason::EmptyWorkgroup);
        }
        let Some(buffers) = store.buffers() else {
            return DispatchOutcome::Skipped(SkipReason::BuffersUnavailable);
        };

        let expected = buffers.count();
        for buffer in buffers.all() {
            let found = backend.buffer_len(buffer);
            if found != expected {
                log::warn!(
                    "Agent buffer holds {} elements, expected {}; skipping dispatch",
                    found,
                    expected
                );
                let reason = SkipReason::BufferLengthMismatch { expected, found };
                return DispatchOutcome::Skipped(reason);
            }
        }

        let target = resolve_target(&config.target.source, input);
        let params = build_params(config, target, expected, delta_time);
        if !params_are_finite(&params) {
            log::warn!("Non-finite flocking parameters; skipping dispatch");
            return DispatchOutcome::Skipped(SkipReason::NonFiniteParams);
        }
        let workgroups = dispatch_size(expected, kernel.width());

        backend.dispatch(buffers, &params, workgroups);
        self.last_target = target;
        self.dispatches += 1;

        DispatchOutcome::Dispatched { workgroups, target }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{CpuBackend, CpuBuffer};
    use crate::target::{PointerSample, TargetSource};
    use glam::Vec2;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn allocated(backend: &mut CpuBackend, n: u32) -> AgentStore<CpuBuffer> {
        let mut store = AgentStore::new();
        store
            .reset(backend, n, Vec2::new(1.0, 2.0), 5.0, &mut StdRng::seed_from_u64(1))
            .unwrap();
        store
    }

    #[test]
    fn test_dispatch_size() {
        assert_eq!(dispatch_size(10_000, 64), [157, 1, 1]);
        assert_eq!(dispatch_size(256, 64), [4, 1, 1]);
        assert_eq!(dispatch_size(257, 256), [2, 1, 1]);
        assert_eq!(dispatch_size(1, 1024), [1, 1, 1]);
    }

    #[test]
    fn test_build_params_copies_config() {
        let config = FlockingConfig::default();
        let params = build_params(&config, Vec3::new(1.0, 2.0, 0.0), 300, 0.02);
        assert_eq!(params.agent_count, 300);
        assert_eq!(params.speed_range, config.speed_range);
        assert_eq!(params.force_weight, config.force_weight);
        assert_eq!(params.perception_radius, config.perception_radius);
        assert_eq!(params.max_steer_force, config.max_steer_force);
        assert_eq!(params.target_seek_force, config.target.seek_force);
        assert_eq!(params.target_clamp_distance, config.target.clamp_distance);
        assert_eq!(params.target_position, [1.0, 2.0, 0.0]);
        assert_eq!(params.delta_time, 0.02);
    }

    #[test]
    fn test_step_uses_kernel_width() {
        let mut backend = CpuBackend::new().with_workgroup_size([128, 1, 1]);
        let store = allocated(&mut backend, 1000);
        let mut driver = SimulationDriver::new();

        let outcome = driver.step(
            &mut backend,
            &store,
            &FlockingConfig::default(),
            &TargetInput::default(),
            0.02,
        );
        assert_eq!(
            outcome,
            DispatchOutcome::Dispatched {
                workgroups: [8, 1, 1],
                target: Vec3::ZERO
            }
        );
        assert_eq!(backend.dispatch_count(), 1);
        assert_eq!(driver.dispatches(), 1);
    }

    #[test]
    fn test_step_resolves_pointer_target() {
        let mut backend = CpuBackend::new();
        let store = allocated(&mut backend, 256);
        let mut driver = SimulationDriver::new();
        let viewport = Vec2::new(800.0, 600.0);
        let input = TargetInput::pointer(PointerSample::new(Vec2::ZERO, viewport));

        driver.step(&mut backend, &store, &FlockingConfig::default(), &input, 0.02);
        assert_eq!(driver.last_target(), Vec3::new(-10.0, -5.5, 0.0));
    }

    #[test]
    fn test_skips_without_buffers() {
        let mut backend = CpuBackend::new();
        let store: AgentStore<CpuBuffer> = AgentStore::new();
        let outcome = SimulationDriver::new().step(
            &mut backend,
            &store,
            &FlockingConfig::default(),
            &TargetInput::default(),
            0.02,
        );
        assert_eq!(outcome, DispatchOutcome::Skipped(SkipReason::BuffersUnavailable));
        assert_eq!(backend.dispatch_count(), 0);
    }

    #[test]
    fn test_skips_without_kernel() {
        let mut backend = CpuBackend::without_kernel();
        let store = allocated(&mut backend, 256);
        let outcome = SimulationDriver::new().step(
            &mut backend,
            &store,
            &FlockingConfig::default(),
            &TargetInput::default(),
            0.02,
        );
        assert_eq!(outcome, DispatchOutcome::Skipped(SkipReason::KernelUnavailable));
    }

    #[test]
    fn test_build_params_orders_speed_range() {
        let mut config = FlockingConfig::default();
        config.speed_range = [5.0, 2.0];
        let params = build_params(&config, Vec3::ZERO, 256, 0.02);
        assert_eq!(params.speed_range, [2.0, 5.0]);
    }

    #[test]
    fn test_inverted_speed_range_still_dispatches() {
        let mut backend = CpuBackend::new();
        let store = allocated(&mut backend, 256);
        let mut config = FlockingConfig::default();
        config.set_speed_range(Vec2::new(5.0, 2.0));

        let outcome = SimulationDriver::new().step(
            &mut backend,
            &store,
            &config,
            &TargetInput::default(),
            0.02,
        );
        assert!(outcome.is_dispatched());
        let velocities = backend
            .read_agent_buffer(&store.buffers().unwrap().velocities)
            .unwrap();
        for v in velocities {
            let speed = v.length();
            assert!((2.0 - 1e-3..=5.0 + 1e-3).contains(&speed), "speed {speed}");
        }
    }

    #[test]
    fn test_skips_non_finite_params() {
        let mut backend = CpuBackend::new();
        let store = allocated(&mut backend, 256);
        let mut config = FlockingConfig::default();
        config.speed_range = [f32::NAN, f32::NAN];

        let mut driver = SimulationDriver::new();
        let outcome = driver.step(&mut backend, &store, &config, &TargetInput::default(), 0.02);
        assert_eq!(outcome, DispatchOutcome::Skipped(SkipReason::NonFiniteParams));
        assert_eq!(backend.dispatch_count(), 0);

        config = FlockingConfig::default();
        config.target.source = TargetSource::Tracked;
        let input = TargetInput::tracked(Vec3::new(f32::INFINITY, 0.0, 0.0));
        let outcome = driver.step(&mut backend, &store, &config, &input, 0.02);
        assert_eq!(outcome, DispatchOutcome::Skipped(SkipReason::NonFiniteParams));
    }

    #[test]
    fn test_skips_zero_width_kernel() {
        let mut backend = CpuBackend::new().with_workgroup_size([0, 1, 1]);
        let store = allocated(&mut backend, 256);
        let outcome = SimulationDriver::new().step(
            &mut backend,
            &store,
            &FlockingConfig::default(),
            &TargetInput::default(),
            0.02,
        );
        assert_eq!(outcome, DispatchOutcome::Skipped(SkipReason::EmptyWorkgroup));
    }
}
