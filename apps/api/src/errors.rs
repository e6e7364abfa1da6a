use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::pipeline::models::Candidate;
use crate::pipeline::PipelineError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Remote failure: {0}")]
    Remote(String),

    /// Conversion succeeded but the replayed write did not; the body carries
    /// the permanent record so the view can swap it in before retrying.
    #[error("Replay failed: {message}")]
    ReplayFailed {
        message: String,
        converted: Box<Candidate>,
    },
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::ReplayFailed { converted, source } => AppError::ReplayFailed {
                message: source.to_string(),
                converted,
            },
            PipelineError::InvariantViolation(e) => AppError::InvariantViolation(e.to_string()),
            PipelineError::Remote(_) | PipelineError::Conversion(_) => {
                AppError::Remote(err.to_string())
            }
            PipelineError::MutationInFlight { .. } => AppError::Conflict(err.to_string()),
            PipelineError::PayloadMismatch { .. }
            | PipelineError::SideChannelIncomplete(_)
            | PipelineError::StaleMutation(_) => AppError::Validation(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, converted) = match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg, None),
            AppError::InvariantViolation(msg) => {
                tracing::error!("Invariant violation: {msg}");
                (StatusCode::BAD_REQUEST, "INVARIANT_VIOLATION", msg, None)
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "MUTATION_IN_FLIGHT", msg, None),
            AppError::Remote(msg) => {
                tracing::warn!("Remote failure: {msg}");
                (StatusCode::BAD_GATEWAY, "REMOTE_FAILURE", msg, None)
            }
            AppError::ReplayFailed { message, converted } => {
                tracing::warn!(permanent_id = %converted.id, "Replay after conversion failed: {message}");
                (StatusCode::BAD_GATEWAY, "REPLAY_FAILED", message, Some(converted))
            }
        };

        let mut error = json!({
            "code": code,
            "message": message
        });
        if let Some(candidate) = converted {
            error["convertedCandidate"] = json!(candidate);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}
