//! `replica serve`: run the REST API.

use std::sync::Arc;

use anyhow::Result;
use replica::{Cloner, ReplicaConfig};
use tracing::{info, warn};

use crate::renderer::chromium::find_chromium;
use crate::rest;

pub async fn run(mut config: ReplicaConfig, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        backend = %config.backend.endpoint,
        model = %config.backend.model,
        "starting Replica"
    );
    if find_chromium(config.capture.chromium_path.as_deref()).is_none() {
        warn!("Chromium not found; clones will use raw HTML only");
    }

    let cloner = Arc::new(Cloner::from_config(&config));
    rest::serve(&config.server, cloner).await
}
