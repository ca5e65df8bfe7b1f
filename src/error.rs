use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{error, warn};

use crate::changelog::ChangelogError;

/// Request-scoped failures. Each one becomes a generic error response.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("changelog not found at {}", path.display())]
    ChangelogNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read changelog at {}", path.display())]
    ChangelogRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse changelog: {0}")]
    Changelog(#[from] ChangelogError),

    #[error("failed to encode metrics: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ChangelogNotFound { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("{}", self);
        } else {
            warn!("{}", self);
        }

        let body = match self {
            AppError::ChangelogNotFound { .. } => "Changelog not found",
            AppError::ChangelogRead { .. } | AppError::Changelog(_) => "Error loading changelog",
            AppError::Metrics(_) | AppError::Json(_) => "Internal server error",
        };
        (status, body).into_response()
    }
}
