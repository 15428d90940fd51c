//! Fixed-timestep clock.
//!
//! Ticks always advance the flock by the same delta. The clock accumulates
//! wall time and reports how many fixed steps are due, so a host loop can
//! run at any frame rate:
//!
//! ```ignore
//! let mut clock = FixedClock::new(1.0 / 50.0);
//!
//! // In your frame loop:
//! for _ in 0..clock.update() {
//!     flock.tick(clock.fixed_delta(), &config, &input, &mut sink)?;
//! }
//! ```

use std::time::Instant;

/// Default step length, 50 ticks per second.
pub const DEFAULT_FIXED_DELTA: f32 = 0.02;

/// Default cap on steps per update.
pub const DEFAULT_MAX_STEPS: u32 = 8;

/// Accumulating fixed-step clock.
#[derive(Debug)]
pub struct FixedClock {
    fixed_delta: f32,
    accumulator: f32,
    /// Time scale multiplier (1.0 = normal speed).
    time_scale: f32,
    paused: bool,
    /// Steps beyond this per update are dropped.
    max_steps: u32,
    last_update: Instant,
    steps: u64,
}

impl FixedClock {
    /// Create a clock stepping `fixed_delta` seconds at a time.
    ///
    /// Non-positive deltas fall back to [`DEFAULT_FIXED_DELTA`].
    pub fn new(fixed_delta: f32) -> Self {
        let fixed_delta = if fixed_delta > 0.0 && fixed_delta.is_finite() {
            fixed_delta
        } else {
            DEFAULT_FIXED_DELTA
        };
        Self {
            fixed_delta,
            accumulator: 0.0,
            time_scale: 1.0,
            paused: false,
            max_steps: DEFAULT_MAX_STEPS,
            last_update: Instant::now(),
            steps: 0,
        }
    }

    /// Measure wall time since the last update and return the steps due.
    pub fn update(&mut self) -> u32 {
        let now = Instant::now();
        let real_delta = now.duration_since(self.last_update).as_secs_f32();
        self.last_update = now;
        self.advance(real_delta)
    }

    /// Add `real_delta` seconds and return the steps due.
    pub fn advance(&mut self, real_delta: f32) -> u32 {
        if self.paused || !real_delta.is_finite() || real_delta <= 0.0 {
            return 0;
        }
        self.accumulator += real_delta * self.time_scale;

        let whole = (self.accumulator / self.fixed_delta).floor();
        let due = if whole > self.max_steps as f32 {
            log::debug!("Dropping {} fixed steps to catch up", whole - self.max_steps as f32);
            self.accumulator = 0.0;
            self.max_steps
        } else {
            let due = whole as u32;
            self.accumulator = (self.accumulator - due as f32 * self.fixed_delta).max(0.0);
            due
        };
        self.steps += u64::from(due);
        due
    }

    /// Length of one step in seconds.
    #[inline]
    pub fn fixed_delta(&self) -> f32 {
        self.fixed_delta
    }

    /// Steps issued since creation.
    #[inline]
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Simulated seconds, i.e. steps times the fixed delta.
    #[inline]
    pub fn simulated_time(&self) -> f64 {
        self.steps as f64 * f64::from(self.fixed_delta)
    }

    /// Fraction of a step left in the accumulator, for interpolation.
    #[inline]
    pub fn alpha(&self) -> f32 {
        self.accumulator / self.fixed_delta
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    #[inline]
    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    /// Stop issuing steps. Wall time that passes while paused is discarded.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        if self.paused {
            self.last_update = Instant::now();
            self.paused = false;
        }
    }

    pub fn toggle_pause(&mut self) {
        if self.paused {
            self.resume();
        } else {
            self.pause();
        }
    }

    /// Set time scale multiplier.
    ///
    /// - `1.0` = normal speed
    /// - `0.5` = half speed (slow motion)
    /// - `2.0` = double speed
    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.max(0.0);
    }

    /// Cap the steps one update may issue. At least one.
    pub fn set_max_steps(&mut self, max_steps: u32) {
        self.max_steps = max_steps.max(1);
    }
}

impl Default for FixedClock {
    fn default() -> Self {
        Self::new(DEFAULT_FIXED_DELTA)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_new() {
        let clock = FixedClock::default();
        assert_eq!(clock.fixed_delta(), DEFAULT_FIXED_DELTA);
        assert_eq!(clock.steps(), 0);
        assert!(!clock.is_paused());
        assert_eq!(clock.time_scale(), 1.0);
    }

    #[test]
    fn test_invalid_delta_falls_back() {
        assert_eq!(FixedClock::new(0.0).fixed_delta(), DEFAULT_FIXED_DELTA);
        assert_eq!(FixedClock::new(-1.0).fixed_delta(), DEFAULT_FIXED_DELTA);
        assert_eq!(FixedClock::new(f32::NAN).fixed_delta(), DEFAULT_FIXED_DELTA);
    }

    #[test]
    fn test_accumulates_partial_steps() {
        let mut clock = FixedClock::new(0.25);
        assert_eq!(clock.advance(0.1), 0);
        assert_eq!(clock.advance(0.1), 0);
        assert_eq!(clock.advance(0.1), 1);
        assert!((clock.alpha() - 0.2).abs() < 1e-4);
        assert_eq!(clock.advance(0.5), 2);
        assert_eq!(clock.steps(), 3);
        assert!((clock.simulated_time() - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_max_steps_drops_backlog() {
        let mut clock = FixedClock::new(0.25);
        clock.set_max_steps(2);
        assert_eq!(clock.advance(10.0), 2);
        // Backlog was dropped, not carried
        assert_eq!(clock.advance(0.0), 0);
        assert!(clock.alpha() < 1.0);
    }

    #[test]
    fn test_huge_delta_returns_capped_steps() {
        let mut clock = FixedClock::default();
        assert_eq!(clock.advance(1.0e6), DEFAULT_MAX_STEPS);
        assert_eq!(clock.alpha(), 0.0);

        clock.set_time_scale(1.0e9);
        assert_eq!(clock.advance(1.0), DEFAULT_MAX_STEPS);
        assert_eq!(clock.steps(), 2 * u64::from(DEFAULT_MAX_STEPS));
    }

    #[test]
    fn test_pause() {
        let mut clock = FixedClock::new(0.25);
        clock.pause();
        assert!(clock.is_paused());
        assert_eq!(clock.advance(1.0), 0);

        clock.toggle_pause();
        assert!(!clock.is_paused());
        assert_eq!(clock.advance(0.5), 2);
    }

    #[test]
    fn test_time_scale() {
        let mut clock = FixedClock::new(0.25);
        clock.set_time_scale(2.0);
        assert_eq!(clock.advance(0.25), 2);

        // Negative scale should clamp to 0
        clock.set_time_scale(-1.0);
        assert_eq!(clock.time_scale(), 0.0);
        assert_eq!(clock.advance(1.0), 0);
    }
}
