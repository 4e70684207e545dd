use std::panic::{resume_unwind, AssertUnwindSafe};
use std::time::Instant;

use axum::{
    extract::Request,
    http::{Method, StatusCode},
    middleware::Next,
    response::Response,
};
use futures::FutureExt;
use tracing::info;

/// Innermost pipeline stage: one line on the way in, one on the way out.
///
/// A panicking handler is logged as a 500 and the panic is re-raised for the
/// exception interceptor. Responses produced by auth never reach this stage.
pub async fn access_log_interceptor(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let started = Instant::now();

    info!("Incoming Request: {} {}", method, path);

    match AssertUnwindSafe(next.run(req)).catch_unwind().await {
        Ok(response) => {
            log_exit(&method, &path, response.status(), started);
            response
        }
        Err(panic) => {
            log_exit(&method, &path, StatusCode::INTERNAL_SERVER_ERROR, started);
            resume_unwind(panic)
        }
    }
}

fn log_exit(method: &Method, path: &str, status: StatusCode, started: Instant) {
    let elapsed_ms = started.elapsed().as_millis() as u64;
    let status = status.as_u16();

    let span = tracing::Span::current();
    span.record("status", status);
    span.record("latency_ms", elapsed_ms);

    info!(
        "Outgoing Response: {} {} -> {} in {}ms",
        method, path, status, elapsed_ms
    );
}
