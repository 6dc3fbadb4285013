//! HTTP error responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use binlevel_core::{IngestError, ValidationErrors};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Body message for unknown bins.
pub const NOT_REGISTERED_MESSAGE: &str = "Bin not registered.";
/// Body message for token mismatches.
pub const UNAUTHORIZED_MESSAGE: &str = "Invalid token. Unauthorized.";
/// Body message for every internal fault.
pub const INTERNAL_MESSAGE: &str = "Internal server error";

/// Failure of a telemetry request.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The body does not have the expected shape.
    #[error("Invalid submission: {0}")]
    Validation(#[from] ValidationErrors),

    /// The service rejected or failed to store the submission.
    #[error(transparent)]
    Ingest(#[from] IngestError),
}

impl ApiError {
    /// HTTP status the error is reported with.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Ingest(IngestError::NotRegistered(_)) => StatusCode::NOT_FOUND,
            Self::Ingest(IngestError::Unauthorized(_)) => StatusCode::FORBIDDEN,
            Self::Ingest(IngestError::InvalidBinData { .. } | IngestError::Store(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            Self::Validation(errors) => json!({ "errors": errors }),
            Self::Ingest(IngestError::NotRegistered(_)) => json!({ "message": NOT_REGISTERED_MESSAGE }),
            Self::Ingest(IngestError::Unauthorized(_)) => json!({ "message": UNAUTHORIZED_MESSAGE }),
            Self::Ingest(err) => {
                error!(error = %err, "Failed to ingest submission");
                json!({ "message": INTERNAL_MESSAGE })
            }
        };

        (status, Json(body)).into_response()
    }
}
