//! `replica capture-worker <url>`: render one page and emit a capture frame.
//!
//! Stdout carries exactly one frame and nothing else; logs go to stderr.
//! Any failure exits non-zero, which the parent treats as "rendered capture
//! unavailable".

use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use base64::Engine as _;
use replica::capture::purge::{normalize_dom, NETWORK_PROBE_SCRIPT, PURGE_SCRIPT};
use replica::config::CaptureConfig;
use replica::CaptureFrame;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::renderer::chromium::ChromiumRenderer;
use crate::renderer::{RenderContext, Renderer};

const PROBE_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Deserialize)]
struct LoadProbe {
    ready: String,
    resources: u64,
}

pub async fn run(url: &str, config: &CaptureConfig) -> Result<()> {
    let mut renderer = ChromiumRenderer::launch(config.chromium_path.as_deref()).await?;
    let mut ctx = renderer.new_context().await?;

    let result = capture_frame(ctx.as_mut(), url, config).await;

    let _ = ctx.close().await;
    let _ = renderer.shutdown().await;

    let frame = result?;
    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(&frame.encode())
        .await
        .context("failed to write capture frame")?;
    stdout.flush().await?;
    Ok(())
}

/// Navigate, settle, purge and screenshot. Produces the frame the parent
/// decodes.
pub async fn capture_frame(
    ctx: &mut dyn RenderContext,
    url: &str,
    config: &CaptureConfig,
) -> Result<CaptureFrame> {
    let nav = ctx.navigate(url, config.navigation_timeout_ms).await?;
    debug!(final_url = %nav.final_url, load_ms = nav.load_time_ms, "navigation finished");

    wait_for_network_idle(
        &*ctx,
        Duration::from_millis(config.network_idle_timeout_ms),
        Duration::from_millis(config.network_idle_window_ms),
    )
    .await?;

    let purged = ctx.execute_js(PURGE_SCRIPT).await?;
    let Some(dom) = purged.as_str() else {
        bail!("purge script returned {purged}, expected a string");
    };
    let dom = normalize_dom(dom, config.dom_char_limit);

    let png = ctx.screenshot_full_page().await?;
    let screenshot_base64 = base64::engine::general_purpose::STANDARD.encode(png);

    info!(url, dom_bytes = dom.len(), screenshot_bytes = screenshot_base64.len(), "page captured");
    Ok(CaptureFrame {
        dom,
        screenshot_base64,
    })
}

/// Wait until the document is complete and no new resources have started
/// loading for `window`.
async fn wait_for_network_idle(
    ctx: &dyn RenderContext,
    timeout: Duration,
    window: Duration,
) -> Result<()> {
    let start = Instant::now();
    let mut last_count = None;
    let mut quiet_since = Instant::now();

    loop {
        let value = ctx.execute_js(NETWORK_PROBE_SCRIPT).await?;
        let probe: LoadProbe =
            serde_json::from_value(value).context("unexpected network probe result")?;

        if probe.ready == "complete" && last_count == Some(probe.resources) {
            if quiet_since.elapsed() >= window {
                debug!(resources = probe.resources, "network idle");
                return Ok(());
            }
        } else {
            last_count = Some(probe.resources);
            quiet_since = Instant::now();
        }

        if start.elapsed() >= timeout {
            bail!("network did not go idle within {}ms", timeout.as_millis());
        }
        tokio::time::sleep(PROBE_INTERVAL).await;
    }
}
