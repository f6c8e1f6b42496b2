//! Config command

use anyhow::{Context, Result};
use cadence_runtime::RuntimeConfig;
use std::path::Path;

/// Print the effective config: the file (or defaults) with environment
/// overrides applied
pub fn run(config_path: Option<&str>) -> Result<()> {
    let config = match config_path {
        Some(path) => RuntimeConfig::load_from_file(Path::new(path))
            .with_context(|| format!("Failed to load config {}", path))?,
        None => RuntimeConfig::from_env().context("Invalid environment overrides")?,
    };

    print!("{}", config.to_toml_string()?);
    Ok(())
}
