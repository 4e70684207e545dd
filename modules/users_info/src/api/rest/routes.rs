use std::sync::Arc;

use axum::{routing::get, Extension, Router};

use crate::api::rest::handlers;
use crate::config::NameRules;
use crate::domain::service::Service;

/// Merge the `/api/users` endpoints into `router`.
///
/// Static segments (`active`, `test-exception`) take precedence over `{id}`.
pub fn register_routes(router: Router, service: Arc<Service>, name_rules: NameRules) -> Router {
    let users = Router::new()
        .route(
            "/api/users",
            get(handlers::list_users).post(handlers::create_user),
        )
        .route("/api/users/active", get(handlers::list_active_users))
        .route("/api/users/test-exception", get(handlers::test_exception))
        .route(
            "/api/users/{id}",
            get(handlers::get_user)
                .put(handlers::update_user)
                .delete(handlers::delete_user),
        )
        .layer(Extension(service))
        .layer(Extension(name_rules));

    router.merge(users)
}
