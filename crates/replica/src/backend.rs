//! Text-generation backend.
//!
//! The assembler only sees [`Generator`]: "given role-tagged messages and
//! an optional stop sequence, return generated text". [`ChatCompletionsClient`]
//! implements it over the OpenAI-compatible chat completions API (Ollama,
//! OpenAI, vLLM, ...), and [`Retrying`] adds bounded retry with backoff to
//! any generator.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{BackendConfig, RetryPolicy};
use crate::types::{GenerationError, GenerationMessage, GenerationRequest};

/// Bytes of an error response body kept in [`GenerationError::Status`].
const ERROR_BODY_LIMIT: usize = 300;

/// Anything that turns a prompt into text.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

#[async_trait]
impl<G: Generator + ?Sized> Generator for Arc<G> {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        (**self).generate(request).await
    }
}

/// The configured backend: a chat completions client with retries.
pub fn connect(config: &BackendConfig) -> Retrying<ChatCompletionsClient> {
    Retrying::new(ChatCompletionsClient::new(config.clone()), config.retry)
}

// ── Wire types ──────────────────────────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [GenerationMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<[&'a str; 1]>,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

// ── Client ──────────────────────────────────────────────────────

/// Single-shot client for `POST {endpoint}` in chat completions format.
pub struct ChatCompletionsClient {
    client: reqwest::Client,
    config: BackendConfig,
}

impl ChatCompletionsClient {
    pub fn new(config: BackendConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl Generator for ChatCompletionsClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: &request.messages,
            stop: request.stop.as_deref().map(|s| [s]),
            temperature: self.config.temperature,
            top_p: self.config.top_p,
            max_tokens: self.config.max_tokens,
        };

        let mut builder = self.client.post(&self.config.endpoint).json(&body);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let resp = builder.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let mut text = resp.text().await.unwrap_or_default();
            if text.len() > ERROR_BODY_LIMIT {
                let cut = (0..=ERROR_BODY_LIMIT)
                    .rev()
                    .find(|&i| text.is_char_boundary(i))
                    .unwrap_or(0);
                text.truncate(cut);
            }
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                GenerationError::MalformedResponse(
                    "response has no choices[0].message.content".to_string(),
                )
            })?;

        debug!(model = %self.config.model, chars = content.len(), "generation call completed");
        Ok(content.trim().to_string())
    }
}

// ── Retry ───────────────────────────────────────────────────────

/// Retries retryable failures of the inner generator with exponential
/// backoff, up to `policy.max_attempts` calls in total.
pub struct Retrying<G> {
    inner: G,
    policy: RetryPolicy,
}

impl<G> Retrying<G> {
    pub fn new(inner: G, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }
}

#[async_trait]
impl<G: Generator> Generator for Retrying<G> {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let mut attempt = 1u32;
        loop {
            match self.inner.generate(request).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() && attempt < self.policy.max_attempts => {
                    let delay = self.policy.delay_for(attempt);
                    warn!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "generation call failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) if e.is_retryable() && attempt > 1 => {
                    return Err(GenerationError::Exhausted {
                        attempts: attempt,
                        last: Box::new(e),
                    })
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> GenerationRequest {
        GenerationRequest {
            messages: vec![
                GenerationMessage::system("You are an HTML cloning assistant."),
                GenerationMessage::user("HTML_CHUNK:\n<p>x</p>"),
            ],
            stop: Some("</html>".into()),
        }
    }

    fn config_for(server: &MockServer) -> BackendConfig {
        BackendConfig {
            endpoint: format!("{}/v1/chat/completions", server.uri()),
            timeout_ms: 2_000,
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay_ms: 1,
            },
            ..Default::default()
        }
    }

    fn completion(content: &str) -> serde_json::Value {
        json!({ "choices": [ { "message": { "role": "assistant", "content": content } } ] })
    }

    #[tokio::test]
    async fn test_sends_chat_completion_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({
                "model": "llama3",
                "stop": ["</html>"],
                "max_tokens": 4000,
                "messages": [
                    { "role": "system", "content": "You are an HTML cloning assistant." },
                    { "role": "user", "content": "HTML_CHUNK:\n<p>x</p>" }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("  <!DOCTYPE html><html>  ")))
            .expect(1)
            .mount(&server)
            .await;

        let client = ChatCompletionsClient::new(config_for(&server));
        let text = client.generate(&request()).await.unwrap();
        assert_eq!(text, "<!DOCTYPE html><html>");
    }

    #[tokio::test]
    async fn test_bearer_key_is_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("ok")))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = config_for(&server);
        config.api_key = Some("sk-test".into());
        let client = ChatCompletionsClient::new(config);
        assert_eq!(client.generate(&request()).await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_missing_content_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let client = ChatCompletionsClient::new(config_for(&server));
        let err = client.generate(&request()).await.unwrap_err();
        assert!(matches!(err, GenerationError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_retries_server_errors_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("<html></html>")))
            .mount(&server)
            .await;

        let backend = connect(&config_for(&server));
        assert_eq!(backend.generate(&request()).await.unwrap(), "<html></html>");
    }

    #[tokio::test]
    async fn test_bad_request_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("model not found"))
            .expect(1)
            .mount(&server)
            .await;

        let backend = connect(&config_for(&server));
        match backend.generate(&request()).await {
            Err(GenerationError::Status { status, body }) => {
                assert_eq!(status, 400);
                assert_eq!(body, "model not found");
            }
            other => panic!("expected Status error, got {other:?}"),
        }
    }

    struct AlwaysDown {
        calls: AtomicU32,
    }

    #[async_trait]
    impl Generator for AlwaysDown {
        async fn generate(&self, _: &GenerationRequest) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(GenerationError::Status {
                status: 503,
                body: String::new(),
            })
        }
    }

    #[tokio::test]
    async fn test_retry_budget_is_bounded() {
        let retrying = Retrying::new(
            AlwaysDown {
                calls: AtomicU32::new(0),
            },
            RetryPolicy {
                max_attempts: 3,
                base_delay_ms: 1,
            },
        );
        let err = retrying.generate(&request()).await.unwrap_err();
        assert!(matches!(err, GenerationError::Exhausted { attempts: 3, .. }));
        assert_eq!(retrying.inner().calls.load(Ordering::SeqCst), 3);
    }
}
