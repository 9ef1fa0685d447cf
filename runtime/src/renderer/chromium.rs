//! Chromium-based renderer using chromiumoxide.

use super::{NavigationResult, RenderContext, Renderer};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;

/// Find the Chromium binary path.
///
/// Order: an explicitly configured path, `REPLICA_CHROMIUM_PATH`,
/// `~/.replica/chromium/`, then the system `PATH`.
pub fn find_chromium(configured: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = configured {
        if path.exists() {
            return Some(path.to_path_buf());
        }
    }

    if let Ok(p) = std::env::var("REPLICA_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".replica/chromium/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".replica/chromium/chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".replica/chromium/chrome"),
            ]
        } else {
            vec![
                home.join(".replica/chromium/chrome-linux64/chrome"),
                home.join(".replica/chromium/chrome"),
            ]
        };
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Headless Chromium owned by the current process.
pub struct ChromiumRenderer {
    browser: Browser,
}

impl ChromiumRenderer {
    /// Launch a headless Chromium instance.
    pub async fn launch(configured: Option<&Path>) -> Result<Self> {
        let chrome_path = find_chromium(configured)
            .context("Chromium not found. Set REPLICA_CHROMIUM_PATH or install Chrome.")?;
        debug!(path = %chrome_path.display(), "launching Chromium");

        let config = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--hide-scrollbars")
            .window_size(1280, 800)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        Ok(Self { browser })
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;
        Ok(Box::new(ChromiumContext { page }))
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.browser.close().await.context("failed to close Chromium")?;
        let _ = self.browser.wait().await;
        Ok(())
    }
}

/// A single Chromium page context.
pub struct ChromiumContext {
    page: Page,
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult> {
        let start = Instant::now();

        let result = tokio::time::timeout(Duration::from_millis(timeout_ms), async {
            self.page.goto(url).await?;
            self.page.wait_for_navigation().await?;
            Ok::<_, chromiumoxide::error::CdpError>(())
        })
        .await;

        match result {
            Ok(Ok(())) => {
                let final_url = self
                    .page
                    .url()
                    .await
                    .unwrap_or_default()
                    .unwrap_or_else(|| url.to_string());
                Ok(NavigationResult {
                    final_url,
                    load_time_ms: start.elapsed().as_millis() as u64,
                })
            }
            Ok(Err(e)) => bail!("navigation failed: {e}"),
            Err(_) => bail!("navigation timed out after {timeout_ms}ms"),
        }
    }

    async fn execute_js(&self, script: &str) -> Result<serde_json::Value> {
        let params = EvaluateParams::builder()
            .expression(script)
            .return_by_value(true)
            .await_promise(true)
            .build()
            .map_err(|e| anyhow::anyhow!("invalid evaluate params: {e}"))?;

        let result = self
            .page
            .evaluate_expression(params)
            .await
            .context("JS execution failed")?;

        result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert JS result: {e:?}"))
    }

    async fn screenshot_full_page(&self) -> Result<Vec<u8>> {
        let params = ScreenshotParams::builder().full_page(true).build();
        self.page
            .screenshot(params)
            .await
            .context("screenshot failed")
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let _ = self.page.close().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_configured_path_is_skipped() {
        let bogus = Path::new("/nonexistent/replica/chrome");
        assert_ne!(find_chromium(Some(bogus)).as_deref(), Some(bogus));
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_chromium_navigate_and_execute_js() {
        let mut renderer = ChromiumRenderer::launch(None)
            .await
            .expect("failed to create renderer");
        let mut ctx = renderer
            .new_context()
            .await
            .expect("failed to create context");

        let nav = ctx
            .navigate("data:text/html,<h1>Hello</h1><p>World</p>", 10_000)
            .await
            .expect("navigation failed");
        assert!(nav.load_time_ms < 10_000);

        let result = ctx
            .execute_js("document.querySelector('h1').textContent")
            .await
            .expect("JS execution failed");
        assert_eq!(result.as_str().unwrap(), "Hello");

        let png = ctx.screenshot_full_page().await.expect("screenshot failed");
        assert!(png.starts_with(&[0x89, b'P', b'N', b'G']));

        ctx.close().await.expect("close failed");
        renderer.shutdown().await.expect("shutdown failed");
    }
}
