//! Rendered capture through an isolated worker subprocess.
//!
//! The browser lives in the child process, so a browser crash ends that
//! process and nothing else. The child writes one [`CaptureFrame`] to its
//! stdout and logs to stderr.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::{CaptureFrame, CaptureStrategy, Captured};
use crate::config::CaptureConfig;
use crate::text::tail_chars;
use crate::types::CaptureError;

/// Characters of worker stderr kept in error reports.
const STDERR_TAIL_CHARS: usize = 500;

/// Runs the capture worker and decodes its frame.
pub struct SubprocessCapture {
    program: PathBuf,
    args: Vec<String>,
    env: Vec<(&'static str, String)>,
    timeout: Duration,
}

impl SubprocessCapture {
    /// Worker invoked as `program [args..] <url>`.
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, timeout_ms: u64) -> Self {
        Self {
            program: program.into(),
            args,
            env: Vec::new(),
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    /// Worker from `capture.worker_command`, or this executable's
    /// `capture-worker` subcommand.
    pub fn from_config(config: &CaptureConfig) -> Self {
        let (program, args) = match config.worker_command.as_deref() {
            Some([program, args @ ..]) => (PathBuf::from(program), args.to_vec()),
            _ => (
                std::env::current_exe().unwrap_or_else(|_| PathBuf::from("replica")),
                vec!["capture-worker".to_string()],
            ),
        };
        let mut capture = Self::new(program, args, config.worker_timeout_ms);
        capture.env = config.worker_env();
        capture
    }
}

#[async_trait]
impl CaptureStrategy for SubprocessCapture {
    fn name(&self) -> &'static str {
        "rendered"
    }

    async fn capture(&self, url: &str) -> Result<Captured, CaptureError> {
        debug!(url, program = %self.program.display(), "spawning capture worker");

        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(url)
            .envs(self.env.iter().map(|(k, v)| (*k, v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(CaptureError::Spawn)?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| CaptureError::Timeout {
                stage: "capture worker",
                after_ms: self.timeout.as_millis() as u64,
            })?
            .map_err(CaptureError::Spawn)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CaptureError::WorkerExit {
                code: output.status.code(),
                stderr: tail_chars(stderr.trim(), STDERR_TAIL_CHARS).to_string(),
            });
        }

        let frame = CaptureFrame::decode(&output.stdout)?;
        if frame.dom.is_empty() {
            return Err(CaptureError::Protocol("worker returned an empty DOM".into()));
        }

        Ok(Captured {
            raw_html: None,
            rendered_dom: Some(frame.dom),
            screenshot_base64: Some(frame.screenshot_base64),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    /// Worker implemented as an inline shell script; the URL lands in `$1`.
    fn sh_worker(script: &str, timeout_ms: u64) -> SubprocessCapture {
        SubprocessCapture::new(
            "sh",
            vec!["-c".into(), script.into(), "worker".into()],
            timeout_ms,
        )
    }

    #[tokio::test]
    async fn test_decodes_worker_frame() {
        let worker = sh_worker(
            r#"printf 'REPLICA-CAPTURE/1 dom=12 screenshot=4\n<p>hello</p>AAAA'"#,
            5_000,
        );
        let captured = worker.capture("https://example.com").await.unwrap();
        assert_eq!(captured.rendered_dom.as_deref(), Some("<p>hello</p>"));
        assert_eq!(captured.screenshot_base64.as_deref(), Some("AAAA"));
        assert!(captured.raw_html.is_none());
    }

    #[tokio::test]
    async fn test_url_is_last_argument() {
        let worker = sh_worker(
            r#"n=$(printf '%s' "$1" | wc -c | tr -d ' '); printf 'REPLICA-CAPTURE/1 dom=%s screenshot=0\n%s' "$n" "$1""#,
            5_000,
        );
        let captured = worker.capture("https://example.com/a").await.unwrap();
        assert_eq!(captured.rendered_dom.as_deref(), Some("https://example.com/a"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_failure() {
        let worker = sh_worker("echo 'browser crashed' >&2; exit 3", 5_000);
        match worker.capture("https://example.com").await {
            Err(CaptureError::WorkerExit { code, stderr }) => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "browser crashed");
            }
            other => panic!("expected WorkerExit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_garbage_output_is_protocol_error() {
        let worker = sh_worker("echo '===DOM_START==='", 5_000);
        let err = worker.capture("https://example.com").await.unwrap_err();
        assert!(matches!(err, CaptureError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_slow_worker_times_out() {
        let worker = sh_worker("sleep 5", 200);
        let err = worker.capture("https://example.com").await.unwrap_err();
        assert!(matches!(
            err,
            CaptureError::Timeout {
                stage: "capture worker",
                after_ms: 200
            }
        ));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let worker = SubprocessCapture::new("/nonexistent/replica-worker", vec![], 1_000);
        let err = worker.capture("https://example.com").await.unwrap_err();
        assert!(matches!(err, CaptureError::Spawn(_)));
    }
}
