//! Frame clock with fixed-timestep accumulator

use crate::config::RuntimeConfig;
use std::time::Instant;

/// Tracks frame time and decides how many fixed-update passes a frame owes
pub struct FrameClock {
    /// Total elapsed time in seconds
    pub total_time: f64,
    /// Time since last frame in seconds, after clamping
    pub delta_time: f64,
    /// Fixed timestep interval (default: 1/60 second)
    pub fixed_timestep: f64,
    /// Upper bound on a single frame's delta
    pub max_frame_time: f64,
    /// Accumulated time for fixed-step consumption
    accumulator: f64,
    /// Last tick instant
    last_instant: Instant,
    /// Whether this is the first tick
    first_tick: bool,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self {
            total_time: 0.0,
            delta_time: 0.0,
            fixed_timestep: 1.0 / 60.0,
            max_frame_time: 0.25,
            accumulator: 0.0,
            last_instant: Instant::now(),
            first_tick: true,
        }
    }
}

impl FrameClock {
    /// Create a new clock with default 60Hz fixed timestep
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock with a custom fixed rate in Hz
    pub fn with_fixed_rate(hz: f64) -> Self {
        Self {
            fixed_timestep: 1.0 / hz,
            ..Self::default()
        }
    }

    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self {
            fixed_timestep: config.fixed_timestep(),
            max_frame_time: config.max_frame_time,
            ..Self::default()
        }
    }

    /// Advance by wall-clock time since the previous tick. Call once per frame.
    ///
    /// The first tick only establishes the reference instant.
    pub fn tick(&mut self) {
        let now = Instant::now();

        if self.first_tick {
            self.first_tick = false;
            self.last_instant = now;
            self.delta_time = 0.0;
            return;
        }

        let elapsed = now.duration_since(self.last_instant).as_secs_f64();
        self.last_instant = now;
        self.advance(elapsed);
    }

    /// Advance by an explicit amount of time (headless and test drivers)
    pub fn advance(&mut self, elapsed: f64) {
        // Clamp to avoid spiral of death; the bound may be unvalidated and
        // `f64::clamp` panics on a negative or NaN one
        self.delta_time = elapsed.max(0.0).min(self.max_frame_time).max(0.0);
        self.total_time += self.delta_time;
        self.accumulator += self.delta_time;
    }

    /// Returns true if there's enough accumulated time for a fixed update step
    pub fn should_fixed_update(&self) -> bool {
        self.accumulator >= self.fixed_timestep
    }

    /// Consume one fixed timestep from the accumulator
    pub fn consume_fixed_step(&mut self) {
        self.accumulator -= self.fixed_timestep;
    }

    /// Discard whole fixed steps still owed, keeping the fractional remainder.
    /// Returns how many steps were dropped.
    pub fn drop_backlog(&mut self) -> u32 {
        let owed = (self.accumulator / self.fixed_timestep).floor();
        self.accumulator -= owed * self.fixed_timestep;
        owed as u32
    }

    /// Interpolation alpha between fixed steps
    pub fn interpolation_alpha(&self) -> f64 {
        self.accumulator / self.fixed_timestep
    }
}
