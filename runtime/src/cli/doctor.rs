//! Environment readiness check.

use std::time::Duration;

use anyhow::Result;
use replica::ReplicaConfig;
use serde_json::json;

use super::print_json;
use crate::renderer::chromium::find_chromium;

/// Check Chromium, the generation backend and the configuration.
pub async fn run(config: &ReplicaConfig, json: bool) -> Result<()> {
    let os = std::env::consts::OS;
    let arch = std::env::consts::ARCH;
    let chromium = find_chromium(config.capture.chromium_path.as_deref());
    let backend = probe_backend(&config.backend.endpoint).await;
    let valid = config.validate();

    if json {
        return print_json(&json!({
            "os": os,
            "arch": arch,
            "chromium": chromium.as_ref().map(|p| p.display().to_string()),
            "backend": {
                "endpoint": config.backend.endpoint,
                "model": config.backend.model,
                "reachable": backend.is_ok(),
                "detail": backend.as_ref().err(),
            },
            "config_valid": valid.is_ok(),
            "ready": chromium.is_some() && backend.is_ok() && valid.is_ok(),
        }));
    }

    println!("Replica Doctor");
    println!("==============");
    println!();
    println!("OS:   {os}");
    println!("Arch: {arch}");
    println!();

    match &chromium {
        Some(path) => println!("[OK] Chromium found: {}", path.display()),
        None => println!(
            "[!!] Chromium NOT found. Set REPLICA_CHROMIUM_PATH; clones fall back to raw HTML."
        ),
    }

    match &backend {
        Ok(status) => println!(
            "[OK] Backend reachable: {} (HTTP {status}, model {})",
            config.backend.endpoint, config.backend.model
        ),
        Err(e) => println!("[!!] Backend unreachable: {} ({e})", config.backend.endpoint),
    }

    match &valid {
        Ok(()) => println!("[OK] Configuration valid"),
        Err(e) => println!("[!!] Configuration invalid: {e}"),
    }

    println!();
    if backend.is_ok() && valid.is_ok() {
        if chromium.is_some() {
            println!("Status: READY");
        } else {
            println!("Status: READY (raw HTML only)");
        }
    } else {
        println!("Status: NOT READY");
        println!("  Clones will return the stub document until the backend is reachable.");
    }

    Ok(())
}

/// Any HTTP answer counts as reachable; only transport failures do not.
async fn probe_backend(endpoint: &str) -> Result<u16, String> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap_or_default();
    client
        .get(endpoint)
        .send()
        .await
        .map(|resp| resp.status().as_u16())
        .map_err(|e| e.to_string())
}
