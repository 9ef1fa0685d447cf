//! `replica capture <url>`: run only the capture chain and report it.

use std::path::Path;

use anyhow::{Context, Result};
use base64::Engine as _;
use replica::{CaptureEngine, CaptureReport, ReplicaConfig};
use serde_json::json;

use super::print_json;
use crate::rest::validate_url;

pub async fn run(
    config: &ReplicaConfig,
    url: &str,
    dom_out: Option<&Path>,
    screenshot_out: Option<&Path>,
    json: bool,
) -> Result<()> {
    let url = validate_url(url).map_err(|e| anyhow::anyhow!("invalid URL: {e}"))?;
    let engine = CaptureEngine::from_config(&config.capture);
    let report = engine.acquire_report(url.as_str()).await;

    write_artifacts(&report, dom_out, screenshot_out)?;

    if json {
        print_json(&json!({
            "url": url.as_str(),
            "source": report.source,
            "attempts": report.attempts,
            "raw_html_bytes": report.context.raw_html.len(),
            "rendered_dom_bytes": report.context.rendered_dom.len(),
            "screenshot_bytes": report.context.screenshot_base64.len(),
        }))?;
    } else {
        println!("{url}  source: {:?}", report.source);
        for attempt in &report.attempts {
            let status = if attempt.succeeded() { "ok" } else { "failed" };
            println!("  {:<10} {:<7} {}ms", attempt.strategy, status, attempt.elapsed_ms);
        }
        println!(
            "  raw_html {} bytes, rendered_dom {} bytes, screenshot {} bytes",
            report.context.raw_html.len(),
            report.context.rendered_dom.len(),
            report.context.screenshot_base64.len()
        );
    }
    Ok(())
}

/// Write the rendered DOM and the decoded PNG where requested.
pub fn write_artifacts(
    report: &CaptureReport,
    dom_out: Option<&Path>,
    screenshot_out: Option<&Path>,
) -> Result<()> {
    if let Some(path) = dom_out {
        std::fs::write(path, &report.context.rendered_dom)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    if let Some(path) = screenshot_out {
        if report.context.screenshot_base64.is_empty() {
            anyhow::bail!("no screenshot captured for this page");
        }
        let png = base64::engine::general_purpose::STANDARD
            .decode(&report.context.screenshot_base64)
            .context("screenshot is not valid base64")?;
        std::fs::write(path, png).with_context(|| format!("failed to write {}", path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use replica::{CaptureSource, PageContext};

    fn report(shot: &str) -> CaptureReport {
        CaptureReport {
            context: PageContext::new("<p>raw</p>", "<p>dom</p>", shot),
            source: CaptureSource::Full,
            attempts: Vec::new(),
        }
    }

    #[test]
    fn test_writes_dom_and_decoded_screenshot() {
        let dir = tempfile::tempdir().unwrap();
        let dom = dir.path().join("page.html");
        let shot = dir.path().join("page.png");

        write_artifacts(&report("iVBORw=="), Some(&dom), Some(&shot)).unwrap();

        assert_eq!(std::fs::read_to_string(&dom).unwrap(), "<p>dom</p>");
        assert_eq!(std::fs::read(&shot).unwrap(), vec![0x89, b'P', b'N', b'G']);
    }

    #[test]
    fn test_missing_screenshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let shot = dir.path().join("page.png");
        assert!(write_artifacts(&report(""), None, Some(&shot)).is_err());
        assert!(!shot.exists());
    }
}
