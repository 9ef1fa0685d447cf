//! `replica clone <url>`: one-shot clone to a file or stdout.

use std::path::Path;

use anyhow::{Context, Result};
use replica::{Cloner, ReplicaConfig};
use serde_json::json;

use super::print_json;
use crate::rest::validate_url;

pub async fn run(config: &ReplicaConfig, url: &str, output: Option<&Path>, json: bool) -> Result<()> {
    let url = validate_url(url).map_err(|e| anyhow::anyhow!("invalid URL: {e}"))?;
    let cloner = Cloner::from_config(config);
    let outcome = cloner.clone_page(url.as_str()).await;

    if let Some(path) = output {
        std::fs::write(path, &outcome.html)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    if json {
        let written_to = output.map(|p| p.display().to_string());
        let html = output.is_none().then_some(&outcome.html);
        print_json(&json!({
            "url": url.as_str(),
            "output": written_to,
            "degraded": outcome.degraded,
            "capture": outcome.capture,
            "attempts": outcome.attempts,
            "generation_calls": outcome.generation_calls,
            "html": html,
        }))?;
    } else if let Some(path) = output {
        eprintln!(
            "  wrote {} ({} bytes, capture: {:?}{})",
            path.display(),
            outcome.html.len(),
            outcome.capture,
            if outcome.degraded { ", degraded" } else { "" }
        );
    } else {
        println!("{}", outcome.html);
    }
    Ok(())
}
