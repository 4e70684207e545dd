use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::exception::{failure_response, UnhandledFailure};

/// Field name → list of rule violations.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Errors a REST handler can hand back to the ingress.
///
/// Client errors render as `{"error": ...}`; `Internal` is left for the
/// exception interceptor to log and report.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{message}")]
    Validation {
        message: String,
        details: FieldErrors,
    },
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("internal error")]
    Internal(#[source] anyhow::Error),
}

impl AppError {
    pub const VALIDATION_MESSAGE: &'static str = "One or more validation errors occurred.";

    pub fn validation(details: FieldErrors) -> Self {
        Self::Validation {
            message: Self::VALIDATION_MESSAGE.to_string(),
            details,
        }
    }

    /// Single-message validation failure (e.g. unparsable body).
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details: FieldErrors::new(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a FieldErrors>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let (message, details) = match &self {
            Self::Internal(err) => {
                return failure_response(UnhandledFailure(format!("{err:#}")));
            }
            Self::Validation { message, details } => {
                (message.as_str(), (!details.is_empty()).then_some(details))
            }
            Self::Unauthorized(m) | Self::NotFound(m) | Self::Conflict(m) => (m.as_str(), None),
        };

        tracing::debug!(status = status.as_u16(), error = %message, "request rejected");

        (
            status,
            Json(ErrorBody {
                error: message,
                details,
            }),
        )
            .into_response()
    }
}
