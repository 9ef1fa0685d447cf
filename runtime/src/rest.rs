// Copyright 2026 Replica Contributors
// SPDX-License-Identifier: Apache-2.0

//! HTTP REST API for Replica.
//!
//! `POST /clone` runs the capture + assembly pipeline for one URL. Every
//! request owns its own clone task; if the client goes away the task is
//! aborted, which drops the capture worker and any in-flight backend call.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use replica::config::ServerConfig;
use replica::{CaptureSource, Cloner};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

/// Build the axum Router with all REST endpoints.
pub fn router(cloner: Arc<Cloner>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/clone", post(clone_site))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(cloner)
}

/// Serve the REST API until ctrl-c.
pub async fn serve(config: &ServerConfig, cloner: Arc<Cloner>) -> anyhow::Result<()> {
    let app = router(cloner);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("REST API listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("received shutdown signal");
        })
        .await?;
    Ok(())
}

// ── Types ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CloneRequest {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct CloneResponse {
    pub html: String,
    pub degraded: bool,
    pub capture: CaptureSource,
}

/// Error body: `{ "error": { "code", "message" }, "detail" }`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    detail: String,
}

impl ApiError {
    fn invalid_url(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "E_INVALID_URL",
            message: "url must be an absolute http(s) URL".to_string(),
            detail: detail.into(),
        }
    }

    fn invalid_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "E_INVALID_REQUEST",
            message: "expected a JSON body like {\"url\": \"https://...\"}".to_string(),
            detail: detail.into(),
        }
    }

    fn internal(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "E_INTERNAL",
            message: "clone failed unexpectedly".to_string(),
            detail: detail.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": { "code": self.code, "message": self.message },
            "detail": self.detail,
        });
        (self.status, Json(body)).into_response()
    }
}

// ── Helpers ─────────────────────────────────────────────────────

/// Aborts the task when dropped, so a cancelled request cancels its clone.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Accept absolute `http`/`https` URLs with a host.
pub fn validate_url(raw: &str) -> Result<url::Url, String> {
    let parsed = url::Url::parse(raw.trim()).map_err(|e| format!("{raw:?}: {e}"))?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(format!("unsupported scheme {other:?}")),
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(format!("{raw:?} has no host"));
    }
    Ok(parsed)
}

// ── Handlers ────────────────────────────────────────────────────

async fn root() -> Json<Value> {
    Json(json!({ "ok": true }))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn clone_site(
    State(cloner): State<Arc<Cloner>>,
    body: Result<Json<CloneRequest>, JsonRejection>,
) -> Result<Json<CloneResponse>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::invalid_request(e.body_text()))?;
    let url = validate_url(&request.url).map_err(ApiError::invalid_url)?;

    let request_id = Uuid::new_v4();
    let span = info_span!("clone", %request_id, url = %url);
    let target = url.to_string();

    let mut task = AbortOnDrop(tokio::spawn(
        async move { cloner.clone_page(&target).await }.instrument(span),
    ));

    let outcome = (&mut task.0).await.map_err(|e| {
        error!(%request_id, error = %e, "clone task failed");
        ApiError::internal(e.to_string())
    })?;

    Ok(Json(CloneResponse {
        html: outcome.html,
        degraded: outcome.degraded,
        capture: outcome.capture,
    }))
}
