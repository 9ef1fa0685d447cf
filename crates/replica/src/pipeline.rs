//! Capture followed by assembly: one URL in, one HTML document out.

use std::sync::Arc;

use tracing::{info, warn};

use crate::assemble::Assembler;
use crate::backend::{self, Generator};
use crate::capture::CaptureEngine;
use crate::config::ReplicaConfig;
use crate::types::CloneOutcome;

pub struct Cloner {
    engine: CaptureEngine,
    assembler: Assembler,
}

impl Cloner {
    pub fn new(engine: CaptureEngine, assembler: Assembler) -> Self {
        Self { engine, assembler }
    }

    /// Default capture chain and the configured chat completions backend.
    pub fn from_config(config: &ReplicaConfig) -> Self {
        let generator: Arc<dyn Generator> = Arc::new(backend::connect(&config.backend));
        Self::new(
            CaptureEngine::from_config(&config.capture),
            Assembler::new(generator, config.assembly.clone()),
        )
    }

    pub fn engine(&self) -> &CaptureEngine {
        &self.engine
    }

    /// Clone `url`. Never fails; a degraded outcome carries the stub document.
    pub async fn clone_page(&self, url: &str) -> CloneOutcome {
        let report = self.engine.acquire_report(url).await;

        if report.source.is_stub() {
            warn!(url, "nothing captured, skipping generation");
            return CloneOutcome {
                html: self.assembler.stub_for(&report.context),
                degraded: true,
                capture: report.source,
                attempts: report.attempts,
                generation_calls: 0,
            };
        }

        let assembly = self.assembler.assemble_report(&report.context).await;
        info!(
            url,
            capture = ?report.source,
            degraded = assembly.degraded,
            calls = assembly.calls,
            bytes = assembly.html.len(),
            "clone finished"
        );

        CloneOutcome {
            html: assembly.html,
            degraded: assembly.degraded,
            capture: report.source,
            attempts: report.attempts,
            generation_calls: assembly.calls,
        }
    }
}
