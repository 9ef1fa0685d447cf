//! `replica config`: print the effective configuration.

use anyhow::Result;
use replica::ReplicaConfig;

use super::print_json;

/// The API key is masked.
pub fn run(config: &ReplicaConfig) -> Result<()> {
    print_json(&config.redacted())
}
