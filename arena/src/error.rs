//! HTTP error responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Error returned by the HTTP handlers.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Content resolution error, mapped by kind.
    #[error(transparent)]
    Core(#[from] arena_core::Error),

    /// Anything that escaped every fallback (500).
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        use arena_core::Error;

        match self {
            Self::Core(err) => match err {
                Error::NotReady { .. }
                | Error::SourceNotSynced { .. }
                | Error::NoContent { .. }
                | Error::SourceNotFound { .. }
                | Error::VersionNotFound { .. }
                | Error::FileNotFound { .. } => StatusCode::NOT_FOUND,
                Error::InvalidInput { .. } => StatusCode::BAD_REQUEST,
                Error::CorruptArchive { .. } | Error::Upstream { .. } => StatusCode::BAD_GATEWAY,
                Error::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "request rejected");
        }

        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
