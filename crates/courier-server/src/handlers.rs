use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use courier_core::Message;
use serde::Serialize;

use crate::server::AppState;

/// `POST {path}`: decode an envelope batch and answer it through the broker.
pub async fn bayeux_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let messages = match decode_batch(&body) {
        Ok(messages) => messages,
        Err(err) => {
            tracing::debug!(error = %err, bytes = body.len(), "rejecting malformed batch");
            return (StatusCode::BAD_REQUEST, "invalid message batch").into_response();
        }
    };

    let count = messages.len();
    let replies = state.broker.handle_batch(messages).await;
    tracing::debug!(requests = count, replies = replies.len(), "batch answered");
    Json(replies).into_response()
}

/// A batch must be a JSON array whose elements decode as envelopes.
pub fn decode_batch(body: &[u8]) -> Result<Vec<Message>, serde_json::Error> {
    serde_json::from_slice(body)
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub sessions: usize,
    pub channels: usize,
}

/// `GET /health`.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthReport> {
    Json(HealthReport {
        status: "healthy",
        sessions: state.broker.session_count(),
        channels: state.broker.channel_count(),
    })
}
