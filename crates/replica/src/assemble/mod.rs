//! Chunked seed-then-merge document synthesis.
//!
//! The source text is cut into bounded chunks. Chunk 0 seeds a complete
//! document; every later chunk is merged into the accumulated document in
//! order. Any failure along the way, including an empty source, yields the
//! stub document instead, so [`Assembler::assemble`] always returns HTML.

pub mod chunk;
pub mod extract;
pub mod prompts;
pub mod stub;

use std::sync::Arc;

use tracing::{debug, info, info_span, warn, Instrument};

use crate::backend::Generator;
use crate::config::AssemblyConfig;
use crate::text::truncate_chars;
use crate::types::{AssemblyError, GenerationRequest, PageContext};

pub use chunk::split_chunks;
pub use extract::{extract_document, finalize, strip_fences, terminate};
pub use stub::stub_document;

/// Result of one assembly run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembly {
    pub html: String,
    /// True when `html` is the stub document.
    pub degraded: bool,
    /// Backend calls issued, including the one that failed.
    pub calls: usize,
}

pub struct Assembler {
    generator: Arc<dyn Generator>,
    config: AssemblyConfig,
}

impl Assembler {
    pub fn new(generator: Arc<dyn Generator>, config: AssemblyConfig) -> Self {
        Self { generator, config }
    }

    pub fn config(&self) -> &AssemblyConfig {
        &self.config
    }

    /// Produce a single HTML document for `context`. Never fails.
    pub async fn assemble(&self, context: &PageContext) -> String {
        self.assemble_report(context).await.html
    }

    pub async fn assemble_report(&self, context: &PageContext) -> Assembly {
        let mut calls = 0;
        match self.run(context, &mut calls).await {
            Ok(html) => Assembly {
                html,
                degraded: false,
                calls,
            },
            Err(e) => {
                warn!(error = %e, calls, "assembly failed, returning stub document");
                Assembly {
                    html: self.stub_for(context),
                    degraded: true,
                    calls,
                }
            }
        }
    }

    /// The stub document for `context`.
    pub fn stub_for(&self, context: &PageContext) -> String {
        stub_document(&context.raw_html, self.config.stub_snippet_chars)
    }

    async fn run(&self, context: &PageContext, calls: &mut usize) -> Result<String, AssemblyError> {
        let source = truncate_chars(context.source(), self.config.max_source_chars());
        let chunks = split_chunks(source, self.config.chunk_size);
        let Some((first, rest)) = chunks.split_first() else {
            return Err(AssemblyError::EmptySource);
        };
        let total = chunks.len();
        info!(chunks = total, source_bytes = source.len(), "assembling document");

        let seed = prompts::seed_request(
            first,
            &context.screenshot_base64,
            self.config.screenshot_hint_chars,
        );
        let mut accumulated = self
            .call(&seed, calls)
            .instrument(info_span!("seed", chunk = 0))
            .await?;

        for (offset, chunk) in rest.iter().enumerate() {
            let index = offset + 1;
            let request = prompts::merge_request(&accumulated, chunk);
            let merged = self
                .call(&request, calls)
                .instrument(info_span!("merge", chunk = index, of = total))
                .await?;
            if extract::reopens_document(&merged) {
                warn!(chunk = index, "merge result re-opens the document root");
            }
            accumulated = merged;
        }

        let html = finalize(&accumulated);
        debug!(bytes = html.len(), calls = *calls, "document finalized");
        Ok(html)
    }

    async fn call(&self, request: &GenerationRequest, calls: &mut usize) -> Result<String, AssemblyError> {
        *calls += 1;
        let text = self.generator.generate(request).await?;
        debug!(bytes = text.len(), "backend replied");
        Ok(terminate(extract_document(strip_fences(&text))))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::GenerationError;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Generator replaying canned replies and recording every request.
    pub(crate) struct Scripted {
        replies: Mutex<VecDeque<Result<String, GenerationError>>>,
        pub requests: Mutex<Vec<GenerationRequest>>,
    }

    impl Scripted {
        pub fn new(replies: Vec<Result<String, GenerationError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        pub fn ok(replies: &[&str]) -> Arc<Self> {
            Self::new(replies.iter().map(|r| Ok(r.to_string())).collect())
        }

        pub fn requests(&self) -> Vec<GenerationRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Generator for Scripted {
        async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
            self.requests.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(GenerationError::MalformedResponse("script exhausted".into())))
        }
    }

    fn assembler(generator: Arc<Scripted>) -> Assembler {
        Assembler::new(generator, AssemblyConfig::default())
    }

    #[tokio::test]
    async fn test_single_chunk_is_seeded_and_terminated() {
        let generator = Scripted::ok(&["<!DOCTYPE html><html><body>clone</body>"]);
        let report = assembler(generator.clone())
            .assemble_report(&PageContext::new("<p>raw</p>", "<p>dom</p>", "iVBOR"))
            .await;

        assert_eq!(report.html, "<!DOCTYPE html><html><body>clone</body></html>");
        assert!(!report.degraded);
        assert_eq!(report.calls, 1);

        let requests = generator.requests();
        assert_eq!(requests[0].messages[1].content, "HTML_CHUNK:\n<p>dom</p>");
        assert_eq!(requests[0].messages[2].content, "SCREENSHOT_BASE64 (ignore): iVBOR");
    }

    #[tokio::test]
    async fn test_merge_calls_carry_accumulated_document() {
        let generator = Scripted::ok(&[
            "<!DOCTYPE html><html><body>A",
            "<!DOCTYPE html><html><body>A B",
            "<!DOCTYPE html><html><body>A B C</body></html>",
        ]);
        let source = format!("{}{}{}", "a".repeat(8_000), "b".repeat(8_000), "c".repeat(4_000));
        let html = assembler(generator.clone())
            .assemble(&PageContext::new("", source, ""))
            .await;

        assert_eq!(html, "<!DOCTYPE html><html><body>A B C</body></html>");
        let requests = generator.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].messages[0].content, prompts::SEED_SYSTEM);
        assert_eq!(
            requests[1].messages[1].content,
            format!(
                "EXISTING_HTML:\n<!DOCTYPE html><html><body>A</html>\nNEW_CHUNK:\n{}",
                "b".repeat(8_000)
            )
        );
        assert!(requests[2].messages[1]
            .content
            .starts_with("EXISTING_HTML:\n<!DOCTYPE html><html><body>A B</html>\nNEW_CHUNK:\n"));
        assert!(requests[2].messages[1].content.ends_with(&"c".repeat(4_000)));
    }

    #[tokio::test]
    async fn test_source_is_capped() {
        let generator = Scripted::ok(&["<html>", "<html>", "<html>", "<html>", "<html>", "<html>"]);
        let source = "x".repeat(100_000);
        let report = assembler(generator.clone())
            .assemble_report(&PageContext::new("", source, ""))
            .await;
        assert_eq!(report.calls, 5);
        assert_eq!(generator.requests().len(), 5);
    }

    #[tokio::test]
    async fn test_backend_failure_yields_stub() {
        let generator = Scripted::new(vec![
            Ok("<html><body>seed".into()),
            Err(GenerationError::Status {
                status: 500,
                body: "boom".into(),
            }),
        ]);
        let source = "y".repeat(9_000);
        let report = assembler(generator)
            .assemble_report(&PageContext::new("<p>raw & ready</p>", source, ""))
            .await;

        assert!(report.degraded);
        assert_eq!(report.calls, 2);
        assert!(report.html.contains("stub clone"));
        assert!(report.html.contains("&lt;p&gt;raw &amp; ready&lt;/p&gt;"));
    }

    #[tokio::test]
    async fn test_empty_source_yields_stub_without_calls() {
        let generator = Scripted::ok(&[]);
        let report = assembler(generator.clone())
            .assemble_report(&PageContext::default())
            .await;
        assert!(report.degraded);
        assert_eq!(report.calls, 0);
        assert!(report.html.starts_with("<!doctype html>"));
        assert!(generator.requests().is_empty());
    }

    #[tokio::test]
    async fn test_fenced_reply_is_cleaned() {
        let generator = Scripted::ok(&["```html\nHere is your HTML:\n<!DOCTYPE html><html><body>ok</body></html>\n```"]);
        let html = assembler(generator)
            .assemble(&PageContext::new("", "<p>x</p>", ""))
            .await;
        assert_eq!(html, "<!DOCTYPE html><html><body>ok</body></html>");
    }

    #[tokio::test]
    async fn test_trailing_commentary_is_dropped() {
        let generator = Scripted::ok(&[
            "Here is your HTML:\n<!DOCTYPE html><html><body>A</body></html>\nHope this helps!",
            "<!DOCTYPE html><html><body>A B</body></html>\nLet me know if you need more.",
        ]);
        let source = format!("{}{}", "a".repeat(8_000), "b".repeat(10));
        let html = assembler(generator.clone())
            .assemble(&PageContext::new("", source, ""))
            .await;

        assert_eq!(html, "<!DOCTYPE html><html><body>A B</body></html>");
        let requests = generator.requests();
        assert_eq!(
            requests[1].messages[1].content,
            format!(
                "EXISTING_HTML:\n<!DOCTYPE html><html><body>A</body></html>\nNEW_CHUNK:\n{}",
                "b".repeat(10)
            )
        );
    }
}
