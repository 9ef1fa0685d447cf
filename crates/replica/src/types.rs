//! Core data types shared by the capture engine, the assembler and the pipeline.

use serde::{Deserialize, Serialize};

/// Best-effort snapshot of a page, produced fresh for every clone request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageContext {
    /// Unrendered HTML body from a direct GET.
    pub raw_html: String,
    /// DOM serialization after scripts ran and the network settled.
    pub rendered_dom: String,
    /// Base64 PNG of the full rendered page. Empty when no renderer ran.
    pub screenshot_base64: String,
}

impl PageContext {
    pub fn new(
        raw_html: impl Into<String>,
        rendered_dom: impl Into<String>,
        screenshot_base64: impl Into<String>,
    ) -> Self {
        Self {
            raw_html: raw_html.into(),
            rendered_dom: rendered_dom.into(),
            screenshot_base64: screenshot_base64.into(),
        }
    }

    /// The text the assembler clones from: the rendered DOM when present,
    /// otherwise the raw HTML.
    pub fn source(&self) -> &str {
        if self.rendered_dom.is_empty() {
            &self.raw_html
        } else {
            &self.rendered_dom
        }
    }
}

/// Speaker of a generation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// One role-tagged unit of a generation prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationMessage {
    pub role: Role,
    pub content: String,
}

impl GenerationMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A single call to the text-generation backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Ordered prompt messages.
    pub messages: Vec<GenerationMessage>,
    /// Sequence at which the backend should stop generating.
    pub stop: Option<String>,
}

/// Which capture path ended up populating the [`PageContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureSource {
    /// Rendered DOM and raw HTML were both captured.
    Full,
    /// Only the rendered capture succeeded; raw HTML mirrors the DOM.
    RenderedOnly,
    /// Only raw retrieval succeeded; the DOM mirrors the raw HTML.
    RawOnly,
    /// Nothing succeeded; both fields hold the placeholder page.
    Stub,
}

impl CaptureSource {
    pub fn is_stub(self) -> bool {
        matches!(self, CaptureSource::Stub)
    }
}

/// How a single capture strategy fared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Succeeded,
    Failed { reason: String },
}

/// Record of one strategy run by the capture driver.
#[derive(Debug, Clone, Serialize)]
pub struct StrategyAttempt {
    pub strategy: &'static str,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
    pub elapsed_ms: u64,
}

impl StrategyAttempt {
    pub fn succeeded(&self) -> bool {
        self.outcome == AttemptOutcome::Succeeded
    }
}

/// Captured context plus the trail of strategies that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct CaptureReport {
    pub context: PageContext,
    pub source: CaptureSource,
    pub attempts: Vec<StrategyAttempt>,
}

/// Final result of one clone request.
#[derive(Debug, Clone, Serialize)]
pub struct CloneOutcome {
    pub html: String,
    /// True when the HTML is a stub rather than a generated clone.
    pub degraded: bool,
    pub capture: CaptureSource,
    pub attempts: Vec<StrategyAttempt>,
    pub generation_calls: usize,
}

/// Failures inside the capture chain. Never surfaced past the engine.
#[derive(thiserror::Error, Debug)]
pub enum CaptureError {
    #[error("failed to spawn capture worker: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("capture worker exited with {code:?}: {stderr}")]
    WorkerExit { code: Option<i32>, stderr: String },

    #[error("capture protocol error: {0}")]
    Protocol(String),

    #[error("{stage} timed out after {after_ms}ms")]
    Timeout { stage: &'static str, after_ms: u64 },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    Status(u16),
}

/// Failures talking to the text-generation backend.
#[derive(thiserror::Error, Debug)]
pub enum GenerationError {
    #[error("backend unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed backend response: {0}")]
    MalformedResponse(String),

    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: Box<GenerationError>,
    },
}

impl GenerationError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            GenerationError::Transport(_) => true,
            GenerationError::Status { status, .. } => *status == 429 || *status >= 500,
            GenerationError::MalformedResponse(_) | GenerationError::Exhausted { .. } => false,
        }
    }
}

/// Failures inside the chunk loop. Recovered by the stub document.
#[derive(thiserror::Error, Debug)]
pub enum AssemblyError {
    #[error("no source text to clone")]
    EmptySource,

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

/// Invalid configuration values.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}")]
    Parse { var: String, value: String },

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
