//! Outermost pipeline stage: turns unhandled failures into a 500 JSON body.
//!
//! Two kinds of failure reach this stage:
//! - a panic anywhere downstream (caught with `catch_unwind`);
//! - a handler returning [`crate::error::AppError::Internal`], which tags its
//!   response with an [`UnhandledFailure`] extension.
//!
//! Either way the cause is logged here and only here.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::error;

pub const INTERNAL_ERROR: &str = "Internal server error.";

#[cfg(not(feature = "debug-errors"))]
const GENERIC_MESSAGE: &str = "An unexpected error occurred.";

/// Response extension carrying the real cause of a 500 up to the interceptor.
#[derive(Debug, Clone)]
pub struct UnhandledFailure(pub String);

/// Body emitted for unhandled failures.
#[derive(Debug, Serialize, Deserialize)]
pub struct InternalErrorBody {
    pub error: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl InternalErrorBody {
    fn for_cause(_cause: &str) -> Self {
        #[cfg(feature = "debug-errors")]
        let message = _cause.to_string();
        #[cfg(not(feature = "debug-errors"))]
        let message = GENERIC_MESSAGE.to_string();

        Self {
            error: INTERNAL_ERROR.to_string(),
            message,
            timestamp: Utc::now(),
        }
    }
}

fn internal_response(cause: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(InternalErrorBody::for_cause(cause)),
    )
        .into_response()
}

/// Build the 500 response for `failure`, keeping the failure attached for the interceptor.
pub fn failure_response(failure: UnhandledFailure) -> Response {
    let mut response = internal_response(&failure.0);
    response.extensions_mut().insert(failure);
    response
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

pub async fn exception_interceptor(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    match AssertUnwindSafe(next.run(req)).catch_unwind().await {
        Ok(mut response) => {
            if let Some(UnhandledFailure(cause)) =
                response.extensions_mut().remove::<UnhandledFailure>()
            {
                error!(%method, %path, error = %cause, "An unhandled exception has occurred.");
            }
            response
        }
        Err(payload) => {
            let cause = panic_message(payload.as_ref());
            error!(%method, %path, error = %cause, panic = true, "An unhandled exception has occurred.");
            internal_response(&cause)
        }
    }
}
