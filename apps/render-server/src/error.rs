//! Caller-facing errors.
//!
//! Only a fixed message per category ever leaves the process. Details,
//! including engine stderr, go to the log.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use nevis_common::error::{ErrorKind, NevisError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiError {
    NoVideo,
    InvalidBody,
    InvalidSettings,
    TooLarge,
    Processing,
    Internal,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
}

impl ApiError {
    pub fn status(self) -> StatusCode {
        match self {
            Self::NoVideo | Self::InvalidBody | Self::InvalidSettings => StatusCode::BAD_REQUEST,
            Self::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Processing | Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::NoVideo => "No video provided",
            Self::InvalidBody => "Invalid request body",
            Self::InvalidSettings => "Invalid settings",
            Self::TooLarge => "Video too large",
            Self::Processing => "Failed to process video",
            Self::Internal => "Internal server error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message(),
        });
        (self.status(), body).into_response()
    }
}

impl From<NevisError> for ApiError {
    fn from(err: NevisError) -> Self {
        match err.kind() {
            ErrorKind::BadRequest => {
                tracing::info!(error = %err, "Rejected render request");
                Self::InvalidSettings
            }
            ErrorKind::Processing => {
                tracing::error!(
                    error = %err,
                    diagnostics = err.diagnostics().unwrap_or_default().trim(),
                    "Engine failed to process video"
                );
                Self::Processing
            }
            ErrorKind::Internal => {
                tracing::error!(error = %err, "Render request failed");
                Self::Internal
            }
        }
    }
}
