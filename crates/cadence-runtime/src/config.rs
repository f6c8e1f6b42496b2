//! Runtime configuration
//!
//! Loaded from a TOML file (every field optional), then overridden by
//! environment variables:
//! - `CADENCE_FIXED_HZ` - fixed-update rate
//! - `CADENCE_ITERATION` - `snapshot` or `immediate`

use crate::dispatcher::IterationPolicy;
use cadence_core::{CadenceError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// Largest `initial_capacity` accepted. The collection still grows past it.
pub const MAX_INITIAL_CAPACITY: usize = 1 << 20;

/// Dispatcher and frame loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Fixed-update rate in Hz
    pub fixed_hz: f64,
    /// Longest frame delta accepted, in seconds (spiral-of-death clamp)
    pub max_frame_time: f64,
    /// Fixed-update passes allowed per frame before the backlog is dropped
    pub max_fixed_steps: u32,
    /// Initial capacity of the participant collection
    pub initial_capacity: usize,
    /// How passes treat joins and leaves made while they run
    pub iteration: IterationPolicy,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            fixed_hz: 60.0,
            max_frame_time: 0.25,
            max_fixed_steps: 8,
            initial_capacity: 32,
            iteration: IterationPolicy::Snapshot,
        }
    }
}

impl RuntimeConfig {
    /// Parse from TOML and validate. Environment overrides are not applied.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: RuntimeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file, then apply environment overrides
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: RuntimeConfig = toml::from_str(&content).map_err(|e| {
            CadenceError::Config(format!("Failed to parse config {}: {}", path.display(), e))
        })?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Seconds per fixed step
    pub fn fixed_timestep(&self) -> f64 {
        1.0 / self.fixed_hz
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.fixed_hz > 0.0 && self.fixed_hz.is_finite()) {
            return Err(CadenceError::Config(format!(
                "fixed_hz must be a positive number, got {}",
                self.fixed_hz
            )));
        }
        if !(self.max_frame_time > 0.0 && self.max_frame_time.is_finite()) {
            return Err(CadenceError::Config(format!(
                "max_frame_time must be a positive number, got {}",
                self.max_frame_time
            )));
        }
        if self.max_fixed_steps == 0 {
            return Err(CadenceError::Config(
                "max_fixed_steps must be at least 1".to_string(),
            ));
        }
        if self.initial_capacity > MAX_INITIAL_CAPACITY {
            return Err(CadenceError::Config(format!(
                "initial_capacity must be at most {}, got {}",
                MAX_INITIAL_CAPACITY, self.initial_capacity
            )));
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any variable source. Unparseable values are
    /// logged and ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(raw) = lookup("CADENCE_FIXED_HZ") {
            match raw.trim().parse::<f64>() {
                Ok(hz) => self.fixed_hz = hz,
                Err(e) => warn!("ignoring CADENCE_FIXED_HZ={:?}: {}", raw, e),
            }
        }
        if let Some(raw) = lookup("CADENCE_ITERATION") {
            match raw.trim().parse::<IterationPolicy>() {
                Ok(policy) => self.iteration = policy,
                Err(e) => warn!("ignoring CADENCE_ITERATION: {}", e),
            }
        }
    }
}
