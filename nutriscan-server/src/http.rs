//! NutriScan HTTP API
//!
//! Axum-based HTTP server exposing the scan flow and per-session history.
//!
//! Architecture: each endpoint has a thin axum handler that delegates to an
//! inner function returning `(StatusCode, serde_json::Value)`. The inner
//! functions are directly testable without axum dispatch machinery.
//!
//! Endpoints:
//! - GET    /                      — single-page UI
//! - GET    /health                — catalog size and classifier status
//! - GET    /version               — server version info
//! - POST   /sessions              — start a session
//! - DELETE /sessions/:id          — end a session
//! - POST   /sessions/:id/scan     — scan an uploaded image (raw body)
//! - GET    /sessions/:id/history  — most-recent-first history with totals
//! - DELETE /sessions/:id/history  — clear history

use std::sync::Arc;

use anyhow::Result;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use nutriscan_core::{
    ClassifierLoad, MacroChart, MacroRecord, NutriScanConfig, ScanOutcome, ScanResult, Scanner,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::sessions::SessionRegistry;

const INDEX_HTML: &str = include_str!("../static/index.html");

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub scanner: Arc<Scanner>,
    pub sessions: Arc<SessionRegistry>,
    pub config: NutriScanConfig,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    let body_limit = state.config.http.max_upload_bytes;
    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/sessions", post(create_session_handler))
        .route("/sessions/:id", axum::routing::delete(end_session_handler))
        .route("/sessions/:id/scan", post(scan_handler))
        .route(
            "/sessions/:id/history",
            get(history_handler).delete(clear_history_handler),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: Arc<HttpState>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", state.config.http.host, state.config.http.port);

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("NutriScan listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// JSON shapes
// ============================================================================

pub fn macros_json(macros: &MacroRecord) -> serde_json::Value {
    serde_json::json!({
        "calories": macros.calories,
        "protein": macros.protein,
        "carbs": macros.carbs,
        "fat": macros.fat,
    })
}

/// One history row as the UI shows it.
pub fn entry_json(result: &ScanResult) -> serde_json::Value {
    serde_json::json!({
        "label": result.label,
        "time": result.time_label(),
        "timestamp": result.timestamp.to_rfc3339(),
        "macros": macros_json(&result.macros),
    })
}

fn error_body(status: &str, msg: impl Into<String>) -> serde_json::Value {
    serde_json::json!({
        "status": status,
        "error": msg.into(),
    })
}

/// 404 for an unknown or evicted session. The `code` lets clients start a
/// fresh session and retry.
fn session_not_found(id: Uuid) -> (StatusCode, serde_json::Value) {
    let mut body = error_body("error", format!("session {id} not found"));
    body["code"] = serde_json::Value::from("session_not_found");
    (StatusCode::NOT_FOUND, body)
}

/// Map a scan outcome to its HTTP status and body.
pub fn outcome_to_http(outcome: &ScanOutcome) -> (StatusCode, serde_json::Value) {
    match outcome {
        ScanOutcome::Success(result) => {
            let mut body = entry_json(result);
            if let Some(obj) = body.as_object_mut() {
                obj.insert("status".to_string(), serde_json::json!(outcome.kind()));
                obj.insert(
                    "chart".to_string(),
                    serde_json::json!(MacroChart::from(&result.macros)),
                );
            }
            (StatusCode::OK, body)
        }
        ScanOutcome::NoNutritionData(label) => (
            StatusCode::OK,
            serde_json::json!({
                "status": outcome.kind(),
                "label": label,
                "warning": format!("No nutritional info found for {label}"),
            }),
        ),
        ScanOutcome::Unavailable(reason) => (
            StatusCode::SERVICE_UNAVAILABLE,
            error_body(outcome.kind(), format!("Model not loaded: {reason}")),
        ),
        ScanOutcome::ClassificationError(msg) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            error_body(outcome.kind(), msg.clone()),
        ),
    }
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

/// Inner health — reports degraded state rather than failing.
pub async fn health_inner(state: &HttpState) -> (StatusCode, serde_json::Value) {
    let classifier = match state.scanner.classifier_status() {
        ClassifierLoad::Loaded(c) => serde_json::json!({"status": "loaded", "backend": c.name()}),
        ClassifierLoad::Unavailable(reason) => {
            serde_json::json!({"status": "unavailable", "reason": reason})
        }
    };
    let catalog_entries = state.scanner.catalog().len();
    let degraded = !state.scanner.classifier_status().is_loaded() || catalog_entries == 0;
    let status = if degraded { "degraded" } else { "healthy" };
    let sessions = state.sessions.len().await;

    (
        StatusCode::OK,
        serde_json::json!({
            "status": status,
            "version": env!("CARGO_PKG_VERSION"),
            "classifier": classifier,
            "catalog_entries": catalog_entries,
            "labels": state.scanner.labels().len(),
            "sessions": sessions,
        }),
    )
}

/// Inner version — returns version info (pure, no IO).
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": "nutriscan/1",
    })
}

pub async fn create_session_inner(state: &HttpState) -> (StatusCode, serde_json::Value) {
    let session = state.sessions.create().await;
    (
        StatusCode::CREATED,
        serde_json::json!({
            "session_id": session.id,
            "created_at": session.created_at.to_rfc3339(),
        }),
    )
}

pub async fn end_session_inner(state: &HttpState, id: Uuid) -> (StatusCode, serde_json::Value) {
    if state.sessions.remove(id).await {
        (StatusCode::OK, serde_json::json!({"ended": true, "session_id": id}))
    } else {
        session_not_found(id)
    }
}

/// Inner scan — runs the orchestrator against the session's history.
pub async fn scan_inner(
    state: &HttpState,
    id: Uuid,
    image: &[u8],
) -> (StatusCode, serde_json::Value) {
    let Some(session) = state.sessions.get(id).await else {
        return session_not_found(id);
    };

    if image.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            error_body("error", "image body is required"),
        );
    }

    let mut history = session.history().await;
    let outcome = state.scanner.scan(image, &mut history).await;
    tracing::info!(session_id = %id, outcome = outcome.kind(), history = history.len(), "Scan finished");

    outcome_to_http(&outcome)
}

pub async fn history_inner(state: &HttpState, id: Uuid) -> (StatusCode, serde_json::Value) {
    let Some(session) = state.sessions.get(id).await else {
        return session_not_found(id);
    };

    let history = session.history().await;
    let entries: Vec<serde_json::Value> = history.all().map(entry_json).collect();

    (
        StatusCode::OK,
        serde_json::json!({
            "session_id": id,
            "count": entries.len(),
            "entries": entries,
            "totals": macros_json(&history.totals()),
        }),
    )
}

pub async fn clear_history_inner(state: &HttpState, id: Uuid) -> (StatusCode, serde_json::Value) {
    let Some(session) = state.sessions.get(id).await else {
        return session_not_found(id);
    };

    session.history().await.clear();
    tracing::info!(session_id = %id, "History cleared");
    (StatusCode::OK, serde_json::json!({"cleared": true, "session_id": id}))
}

// ============================================================================
// Axum handler wrappers (thin — delegate to inner functions)
// ============================================================================

pub async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn create_session_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = create_session_inner(&state).await;
    (status, Json(body))
}

pub async fn end_session_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let (status, body) = end_session_inner(&state, id).await;
    (status, Json(body))
}

pub async fn scan_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> impl IntoResponse {
    let (status, body) = scan_inner(&state, id, &body).await;
    (status, Json(body))
}

pub async fn history_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let (status, body) = history_inner(&state, id).await;
    (status, Json(body))
}

pub async fn clear_history_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let (status, body) = clear_history_inner(&state, id).await;
    (status, Json(body))
}

// ============================================================================
// Unit Tests — call inner functions directly
// ============================================================================
