//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{CancelResponse, ErrorResponse, SubmitTurnRequest, SubmitTurnResponse};
use super::AppState;
use crate::session::{SessionClosed, SessionSnapshot};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/session", get(get_session))
        .route("/api/session/turns", post(submit_turn))
        .route("/api/session/cancel", post(cancel_turn))
        .route("/api/session/reset", post(reset_session))
        .route("/api/session/stream", get(stream_session))
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Session
// ============================================================

async fn get_session(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.current().await.snapshot())
}

async fn submit_turn(
    State(state): State<AppState>,
    Json(req): Json<SubmitTurnRequest>,
) -> Result<Json<SubmitTurnResponse>, AppError> {
    let outcome = state.current().await.submit_turn(req.text).await?;
    Ok(Json(SubmitTurnResponse { outcome }))
}

async fn cancel_turn(State(state): State<AppState>) -> Result<Json<CancelResponse>, AppError> {
    let cancelled = state.current().await.cancel().await?;
    Ok(Json(CancelResponse {
        ok: true,
        cancelled,
    }))
}

async fn reset_session(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.reset().await.snapshot())
}

async fn stream_session(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.current().await;
    // Subscribe before taking the snapshot so nothing falls in between
    let broadcast_rx = session.subscribe();
    sse_stream(session.snapshot(), broadcast_rx)
}

async fn get_version() -> &'static str {
    concat!("dispatch_core ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    Unavailable(String),
}

impl From<SessionClosed> for AppError {
    fn from(e: SessionClosed) -> Self {
        tracing::error!(error = %e, "Session runtime unavailable");
        AppError::Unavailable(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
