//! Page capture with graceful degradation.
//!
//! The engine runs an ordered list of named [`CaptureStrategy`]s, keeps the
//! first non-empty value each one yields per field, then applies the
//! cross-fallback and placeholder rules. It never fails: the worst outcome
//! is a [`PageContext`] holding [`STUB_PAGE`].

pub mod frame;
pub mod purge;
pub mod raw;
pub mod rendered;

use std::time::Instant;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::CaptureConfig;
use crate::types::{
    AttemptOutcome, CaptureError, CaptureReport, CaptureSource, PageContext, StrategyAttempt,
};

pub use frame::CaptureFrame;
pub use raw::RawRetrieval;
pub use rendered::SubprocessCapture;

/// Placeholder used for both fields when every strategy came back empty.
pub const STUB_PAGE: &str =
    "<!doctype html><html><body><p>could not fetch page content</p></body></html>";

/// Fields a strategy managed to populate. Empty strings count as missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captured {
    pub raw_html: Option<String>,
    pub rendered_dom: Option<String>,
    pub screenshot_base64: Option<String>,
}

impl Captured {
    fn is_empty(&self) -> bool {
        [&self.raw_html, &self.rendered_dom, &self.screenshot_base64]
            .iter()
            .all(|f| f.as_deref().map_or(true, str::is_empty))
    }
}

/// One way of obtaining page content.
#[async_trait]
pub trait CaptureStrategy: Send + Sync {
    /// Short name recorded in the capture report.
    fn name(&self) -> &'static str;
    /// Try to capture `url`.
    async fn capture(&self, url: &str) -> Result<Captured, CaptureError>;
}

/// Ordered strategy driver.
pub struct CaptureEngine {
    strategies: Vec<Box<dyn CaptureStrategy>>,
}

impl CaptureEngine {
    pub fn new(strategies: Vec<Box<dyn CaptureStrategy>>) -> Self {
        Self { strategies }
    }

    /// Rendered capture in a worker subprocess, then a raw GET.
    pub fn from_config(config: &CaptureConfig) -> Self {
        Self::new(vec![
            Box::new(SubprocessCapture::from_config(config)),
            Box::new(RawRetrieval::new(config)),
        ])
    }

    /// Strategy names in execution order.
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Capture `url`, discarding the attempt trail.
    pub async fn acquire(&self, url: &str) -> PageContext {
        self.acquire_report(url).await.context
    }

    /// Capture `url` and report which strategies succeeded.
    pub async fn acquire_report(&self, url: &str) -> CaptureReport {
        let mut merged = Captured::default();
        let mut attempts = Vec::with_capacity(self.strategies.len());

        for strategy in &self.strategies {
            let start = Instant::now();
            let result = strategy.capture(url).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;

            let outcome = match result {
                Ok(captured) if captured.is_empty() => {
                    warn!(url, strategy = strategy.name(), elapsed_ms, "capture strategy returned no content");
                    AttemptOutcome::Failed {
                        reason: "no content".to_string(),
                    }
                }
                Ok(captured) => {
                    info!(url, strategy = strategy.name(), elapsed_ms, "capture strategy succeeded");
                    fill(&mut merged.raw_html, captured.raw_html);
                    fill(&mut merged.rendered_dom, captured.rendered_dom);
                    fill(&mut merged.screenshot_base64, captured.screenshot_base64);
                    AttemptOutcome::Succeeded
                }
                Err(e) => {
                    warn!(url, strategy = strategy.name(), elapsed_ms, error = %e, "capture strategy failed");
                    AttemptOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            };

            attempts.push(StrategyAttempt {
                strategy: strategy.name(),
                outcome,
                elapsed_ms,
            });
        }

        let (context, source) = resolve(merged);
        if source.is_stub() {
            warn!(url, "every capture strategy failed, using placeholder page");
        }
        CaptureReport {
            context,
            source,
            attempts,
        }
    }
}

fn fill(slot: &mut Option<String>, value: Option<String>) {
    if slot.is_none() {
        *slot = value.filter(|v| !v.is_empty());
    }
}

/// Apply cross-fallback and the placeholder rule.
fn resolve(captured: Captured) -> (PageContext, CaptureSource) {
    let screenshot_base64 = captured.screenshot_base64.unwrap_or_default();
    let (raw_html, rendered_dom, source) = match (captured.raw_html, captured.rendered_dom) {
        (Some(raw), Some(dom)) => (raw, dom, CaptureSource::Full),
        (None, Some(dom)) => (dom.clone(), dom, CaptureSource::RenderedOnly),
        (Some(raw), None) => (raw.clone(), raw, CaptureSource::RawOnly),
        (None, None) => (
            STUB_PAGE.to_string(),
            STUB_PAGE.to_string(),
            CaptureSource::Stub,
        ),
    };
    (
        PageContext {
            raw_html,
            rendered_dom,
            screenshot_base64,
        },
        source,
    )
}
