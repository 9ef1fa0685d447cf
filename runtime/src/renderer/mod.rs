//! Renderer abstraction for browser-based page rendering.
//!
//! The capture worker only talks to [`RenderContext`]; Chromium via
//! chromiumoxide is the one real implementation.

pub mod chromium;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Time taken to load the page in milliseconds.
    pub load_time_ms: u64,
}

/// A browser engine that can create rendering contexts.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Create a new browser context (tab).
    async fn new_context(&self) -> Result<Box<dyn RenderContext>>;
    /// Shut down the browser engine.
    async fn shutdown(&mut self) -> Result<()>;
}

/// A single browser context (tab) for rendering pages.
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Navigate to a URL with a timeout.
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult>;
    /// Evaluate a JavaScript expression and return its value as JSON.
    async fn execute_js(&self, script: &str) -> Result<serde_json::Value>;
    /// PNG of the whole scrollable page.
    async fn screenshot_full_page(&self) -> Result<Vec<u8>>;
    /// Close this context.
    async fn close(self: Box<Self>) -> Result<()>;
}
