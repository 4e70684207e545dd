//! The fixed interceptor chain every request goes through.
//!
//! Outermost first: exception → auth → access log → handler.

use axum::{
    middleware::{from_fn, from_fn_with_state},
    Router,
};

use crate::access_log::access_log_interceptor;
use crate::auth::{auth_interceptor, AuthState};
use crate::exception::exception_interceptor;

/// Wrap every route (and the fallback) of `router` in the pipeline.
///
/// `Router::layer` wraps outward, so the innermost stage is added first.
pub fn apply<S>(router: Router<S>, auth: AuthState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(from_fn(access_log_interceptor))
        .layer(from_fn_with_state(auth, auth_interceptor))
        .layer(from_fn(exception_interceptor))
}
