//! World configuration loading for the command line

use std::fs;
use std::path::Path;
use thiserror::Error;
use tom_simulator_core_rs::WorldConfig;

/// Errors that can occur while loading a configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO failure when reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Load a [`WorldConfig`] from a TOML file; missing fields take defaults
pub fn load(path: impl AsRef<Path>) -> Result<WorldConfig, ConfigError> {
    let contents = fs::read_to_string(path.as_ref())?;
    Ok(toml::from_str(&contents)?)
}
