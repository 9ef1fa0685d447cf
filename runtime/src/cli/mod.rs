//! CLI subcommand implementations for the Replica binary.

pub mod capture_cmd;
pub mod clone_cmd;
pub mod config_cmd;
pub mod doctor;
pub mod serve;
pub mod worker;

use anyhow::{Context, Result};
use replica::ReplicaConfig;
use serde::Serialize;

/// Command-line values that take precedence over the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub backend_url: Option<String>,
    pub model: Option<String>,
    pub chunk_size: Option<usize>,
    pub max_chunks: Option<usize>,
}

/// Defaults, then `REPLICA_*` environment, then command-line overrides.
pub fn load_config(overrides: &Overrides) -> Result<ReplicaConfig> {
    let mut config = ReplicaConfig::from_env().context("invalid environment configuration")?;
    apply_overrides(&mut config, overrides);
    config.validate()?;
    Ok(config)
}

pub fn apply_overrides(config: &mut ReplicaConfig, overrides: &Overrides) {
    if let Some(url) = &overrides.backend_url {
        config.backend.endpoint = url.clone();
    }
    if let Some(model) = &overrides.model {
        config.backend.model = model.clone();
    }
    if let Some(size) = overrides.chunk_size {
        config.assembly.chunk_size = size;
    }
    if let Some(n) = overrides.max_chunks {
        config.assembly.max_chunks = n;
    }
}

/// Pretty-print a value as JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
