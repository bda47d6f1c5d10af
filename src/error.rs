use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::path::PathBuf;

/// Failures of the upload → describe → render pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// The description service was unreachable, rejected the call, or
    /// answered with something that is not a response envelope.
    #[error("description service failed: {0}")]
    Service(String),

    /// The description service answered without any usable text.
    #[error("description service returned no answer")]
    EmptyResponse,

    /// A caller-submitted answer set could not be decoded.
    #[error("malformed answer payload at entry {index}: {reason}")]
    MalformedPayload { index: usize, reason: String },

    /// A referenced image is not in the staging area. Non-fatal while rendering.
    #[error("image not available: {}", .0.display())]
    MissingAsset(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("pdf rendering failed: {0}")]
    Pdf(String),
}

impl From<reqwest::Error> for ReportError {
    fn from(e: reqwest::Error) -> Self {
        Self::Service(e.to_string())
    }
}

#[derive(Debug)]
pub enum AppError {
    /// Return a status code with a plain-text message body.
    Msg(StatusCode, String),
    /// Internal error -> 500 with JSON body; logged.
    Anyhow(anyhow::Error),
}

impl From<(StatusCode, String)> for AppError {
    fn from((code, msg): (StatusCode, String)) -> Self {
        Self::Msg(code, msg)
    }
}

impl From<ReportError> for AppError {
    fn from(e: ReportError) -> Self {
        match e {
            ReportError::Service(_) | ReportError::EmptyResponse => {
                tracing::warn!(error = %e, "description service call failed");
                Self::Msg(StatusCode::BAD_GATEWAY, e.to_string())
            }
            ReportError::MalformedPayload { .. } => Self::Msg(StatusCode::BAD_REQUEST, e.to_string()),
            ReportError::MissingAsset(_) => Self::Msg(StatusCode::NOT_FOUND, e.to_string()),
            ReportError::Io(_) | ReportError::Pdf(_) => Self::Anyhow(e.into()),
        }
    }
}

/* ---- Narrow, explicit conversions so `?` works everywhere ---- */

impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(e: axum::extract::multipart::MultipartError) -> Self {
        Self::Msg(StatusCode::BAD_REQUEST, format!("multipart error: {e}"))
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Anyhow(e.into())
    }
}

#[derive(Serialize)]
struct ErrBody {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        match self {
            Self::Msg(code, msg) => (code, msg).into_response(),
            Self::Anyhow(err) => {
                tracing::error!("{:#}", err);
                let body = Json(ErrBody {
                    error: err.to_string(),
                });
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
