//! Configuration for the capture engine, the assembler and the backend.
//!
//! Every subsystem receives its section at construction time. Defaults
//! match the production constants; `REPLICA_*` environment variables
//! override them.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicaConfig {
    pub capture: CaptureConfig,
    pub assembly: AssemblyConfig,
    pub backend: BackendConfig,
    pub server: ServerConfig,
}

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles after each failure.
    pub base_delay_ms: u64,
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 0,
        }
    }

    /// Backoff to wait after the given (1-based) failed attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(10);
        Duration::from_millis(self.base_delay_ms.saturating_mul(1u64 << exp))
    }
}

/// Capture engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Bound on the browser navigation.
    pub navigation_timeout_ms: u64,
    /// Bound on waiting for network quiescence after navigation.
    pub network_idle_timeout_ms: u64,
    /// How long the resource count must stay flat to count as idle.
    pub network_idle_window_ms: u64,
    /// Bound on the whole raw GET, retries included.
    pub raw_timeout_ms: u64,
    pub raw_retry: RetryPolicy,
    /// Bound on the whole capture worker run.
    pub worker_timeout_ms: u64,
    /// Hard ceiling on the purged DOM, in characters.
    pub dom_char_limit: usize,
    /// Command that runs the capture worker; the URL is appended.
    /// `None` runs the current executable with `capture-worker`.
    pub worker_command: Option<Vec<String>>,
    /// Explicit Chromium binary for the worker.
    pub chromium_path: Option<PathBuf>,
    pub user_agent: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            navigation_timeout_ms: 45_000,
            network_idle_timeout_ms: 30_000,
            network_idle_window_ms: 500,
            raw_timeout_ms: 15_000,
            raw_retry: RetryPolicy {
                max_attempts: 2,
                base_delay_ms: 500,
            },
            worker_timeout_ms: 120_000,
            dom_char_limit: 75_000,
            worker_command: None,
            chromium_path: None,
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                         AppleWebKit/537.36 (KHTML, like Gecko) \
                         Chrome/131.0.0.0 Safari/537.36"
                .to_string(),
        }
    }
}

impl CaptureConfig {
    /// Environment handed to the capture worker so it sees the same
    /// settings as the parent, CLI overrides included.
    pub fn worker_env(&self) -> Vec<(&'static str, String)> {
        let mut env = vec![
            ("REPLICA_NAV_TIMEOUT_MS", self.navigation_timeout_ms.to_string()),
            (
                "REPLICA_NETWORK_IDLE_TIMEOUT_MS",
                self.network_idle_timeout_ms.to_string(),
            ),
            (
                "REPLICA_NETWORK_IDLE_WINDOW_MS",
                self.network_idle_window_ms.to_string(),
            ),
            ("REPLICA_DOM_CHAR_LIMIT", self.dom_char_limit.to_string()),
        ];
        if let Some(path) = &self.chromium_path {
            env.push(("REPLICA_CHROMIUM_PATH", path.display().to_string()));
        }
        env
    }
}

/// Document assembler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblyConfig {
    /// Maximum characters per chunk.
    pub chunk_size: usize,
    /// Source text is truncated to `max_chunks * chunk_size` characters.
    pub max_chunks: usize,
    /// Characters of the screenshot passed as a visual hint.
    pub screenshot_hint_chars: usize,
    /// Characters of raw HTML embedded in the stub document.
    pub stub_snippet_chars: usize,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            chunk_size: 8000,
            max_chunks: 5,
            screenshot_hint_chars: 2000,
            stub_snippet_chars: 2000,
        }
    }
}

impl AssemblyConfig {
    pub fn max_source_chars(&self) -> usize {
        self.chunk_size.saturating_mul(self.max_chunks)
    }
}

/// Text-generation backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// OpenAI-compatible chat completions endpoint.
    pub endpoint: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub timeout_ms: u64,
    pub retry: RetryPolicy,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434/v1/chat/completions".to_string(),
            model: "llama3".to_string(),
            api_key: None,
            temperature: 0.0,
            top_p: 0.1,
            max_tokens: 4000,
            timeout_ms: 90_000,
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay_ms: 500,
            },
        }
    }
}

/// REST service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

impl ReplicaConfig {
    /// Defaults overridden by `REPLICA_*` process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        let c = &mut config.capture;
        parse_var(&lookup, "REPLICA_NAV_TIMEOUT_MS", &mut c.navigation_timeout_ms)?;
        parse_var(
            &lookup,
            "REPLICA_NETWORK_IDLE_TIMEOUT_MS",
            &mut c.network_idle_timeout_ms,
        )?;
        parse_var(
            &lookup,
            "REPLICA_NETWORK_IDLE_WINDOW_MS",
            &mut c.network_idle_window_ms,
        )?;
        parse_var(&lookup, "REPLICA_RAW_TIMEOUT_MS", &mut c.raw_timeout_ms)?;
        parse_var(&lookup, "REPLICA_WORKER_TIMEOUT_MS", &mut c.worker_timeout_ms)?;
        parse_var(&lookup, "REPLICA_DOM_CHAR_LIMIT", &mut c.dom_char_limit)?;
        if let Some(cmd) = lookup("REPLICA_WORKER_COMMAND") {
            let parts: Vec<String> = cmd.split_whitespace().map(str::to_string).collect();
            if !parts.is_empty() {
                c.worker_command = Some(parts);
            }
        }
        if let Some(path) = lookup("REPLICA_CHROMIUM_PATH") {
            c.chromium_path = Some(PathBuf::from(path));
        }
        if let Some(ua) = lookup("REPLICA_USER_AGENT") {
            c.user_agent = ua;
        }

        let a = &mut config.assembly;
        parse_var(&lookup, "REPLICA_CHUNK_SIZE", &mut a.chunk_size)?;
        parse_var(&lookup, "REPLICA_MAX_CHUNKS", &mut a.max_chunks)?;

        let b = &mut config.backend;
        if let Some(url) = lookup("REPLICA_BACKEND_URL") {
            b.endpoint = url;
        }
        if let Some(model) = lookup("REPLICA_MODEL") {
            b.model = model;
        }
        b.api_key = lookup("REPLICA_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        parse_var(&lookup, "REPLICA_BACKEND_TIMEOUT_MS", &mut b.timeout_ms)?;
        parse_var(&lookup, "REPLICA_MAX_TOKENS", &mut b.max_tokens)?;
        parse_var(
            &lookup,
            "REPLICA_BACKEND_MAX_ATTEMPTS",
            &mut b.retry.max_attempts,
        )?;

        let s = &mut config.server;
        if let Some(host) = lookup("REPLICA_HOST") {
            s.host = host;
        }
        parse_var(&lookup, "REPLICA_PORT", &mut s.port)?;

        Ok(config)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn nonzero(field: &'static str, value: u64) -> Result<(), ConfigError> {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
            Ok(())
        }

        nonzero("assembly.chunk_size", self.assembly.chunk_size as u64)?;
        nonzero("assembly.max_chunks", self.assembly.max_chunks as u64)?;
        nonzero("capture.navigation_timeout_ms", self.capture.navigation_timeout_ms)?;
        nonzero(
            "capture.network_idle_timeout_ms",
            self.capture.network_idle_timeout_ms,
        )?;
        nonzero("capture.raw_timeout_ms", self.capture.raw_timeout_ms)?;
        nonzero("capture.worker_timeout_ms", self.capture.worker_timeout_ms)?;
        nonzero("capture.dom_char_limit", self.capture.dom_char_limit as u64)?;
        nonzero("capture.raw_retry.max_attempts", self.capture.raw_retry.max_attempts as u64)?;
        nonzero("backend.timeout_ms", self.backend.timeout_ms)?;
        nonzero("backend.retry.max_attempts", self.backend.retry.max_attempts as u64)?;

        if !self.backend.endpoint.starts_with("http://")
            && !self.backend.endpoint.starts_with("https://")
        {
            return Err(ConfigError::Invalid {
                field: "backend.endpoint",
                reason: format!("expected an http(s) URL, got {:?}", self.backend.endpoint),
            });
        }
        Ok(())
    }

    /// Copy safe to print: the API key is masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.backend.api_key.is_some() {
            copy.backend.api_key = Some("***".to_string());
        }
        copy
    }
}

fn parse_var<F, T>(lookup: &F, var: &str, target: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(value) = lookup(var) {
        *target = value.trim().parse().map_err(|_| ConfigError::Parse {
            var: var.to_string(),
            value,
        })?;
    }
    Ok(())
}
