//! TOML configuration files.
//!
//! A configuration file is the serialized [`SimulationConfig`]. Parsing and
//! validation happen together, so a loaded config is always runnable.

use std::path::Path;

use anyhow::{Context, Result};
use cascadelab_core::SimulationConfig;

use crate::runner::RunError;

/// Parse and validate a TOML configuration.
pub fn parse_config(text: &str) -> Result<SimulationConfig, RunError> {
    let config: SimulationConfig = toml::from_str(text)?;
    config.validate()?;
    Ok(config)
}

/// Read, parse and validate a configuration file.
pub fn load_config(path: &Path) -> Result<SimulationConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    parse_config(&text).with_context(|| format!("invalid config: {}", path.display()))
}

pub fn to_toml(config: &SimulationConfig) -> Result<String> {
    toml::to_string_pretty(config).context("failed to serialize config to TOML")
}

pub fn save_config(config: &SimulationConfig, path: &Path) -> Result<()> {
    let text = to_toml(config)?;
    std::fs::write(path, text)
        .with_context(|| format!("failed to write config: {}", path.display()))
}

/// Content hash of a configuration.
///
/// Two identical configs always hash the same, so artifacts can be matched
/// to the exact inputs that produced them.
pub fn config_hash(config: &SimulationConfig) -> Result<String> {
    let json = serde_json::to_string(config).context("failed to serialize config for hashing")?;
    Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
}
