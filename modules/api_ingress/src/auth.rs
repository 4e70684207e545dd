//! Shared-secret API key check.

use std::sync::Arc;

use axum::{
    extract::{Query, Request, State},
    http::HeaderName,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::ApiIngressConfig;
use crate::error::AppError;

pub const API_KEY_HEADER: HeaderName = HeaderName::from_static("x-api-key");
pub const API_KEY_QUERY: &str = "apikey";

pub const MISSING_KEY_MESSAGE: &str =
    "API Key is missing. Provide it via X-API-KEY header or ?apikey=your_key query parameter.";
pub const INVALID_KEY_MESSAGE: &str = "Invalid API Key.";

#[derive(Clone)]
pub struct AuthState {
    api_key: Arc<str>,
    public_paths: Arc<[String]>,
}

impl AuthState {
    pub fn new(api_key: impl Into<Arc<str>>, public_paths: Vec<String>) -> Self {
        Self {
            api_key: api_key.into(),
            public_paths: public_paths.into(),
        }
    }

    pub fn from_config(cfg: &ApiIngressConfig) -> Self {
        Self::new(cfg.api_key.as_str(), cfg.public_paths.clone())
    }

    /// `/health` matches `/health` and `/health/live`, not `/healthy`.
    pub fn is_public(&self, path: &str) -> bool {
        self.public_paths.iter().any(|prefix| {
            let prefix = prefix.trim_end_matches('/').as_bytes();
            let path = path.as_bytes();
            path.get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
                && matches!(path.get(prefix.len()), None | Some(b'/'))
        })
    }
}

/// Where the caller put the key.
#[derive(Debug, PartialEq, Eq)]
enum Credential {
    Missing,
    Header(String),
    Query(String),
}

#[derive(Deserialize)]
struct ApiKeyQuery {
    apikey: Option<String>,
}

/// Header wins when present, even if empty; the query string is only consulted without it.
fn credential_of(req: &Request) -> Credential {
    if let Some(value) = req.headers().get(&API_KEY_HEADER) {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        return if value.is_empty() {
            Credential::Missing
        } else {
            Credential::Header(value)
        };
    }

    match Query::<ApiKeyQuery>::try_from_uri(req.uri()) {
        Ok(Query(ApiKeyQuery { apikey: Some(key) })) if !key.is_empty() => Credential::Query(key),
        _ => Credential::Missing,
    }
}

fn unauthorized(message: &str) -> Response {
    AppError::Unauthorized(message.to_string()).into_response()
}

pub async fn auth_interceptor(State(state): State<AuthState>, req: Request, next: Next) -> Response {
    let path = req.uri().path().to_owned();
    if state.is_public(&path) {
        return next.run(req).await;
    }

    let supplied = match credential_of(&req) {
        Credential::Missing => {
            warn!(%path, "API Key is missing from request to {}", path);
            return unauthorized(MISSING_KEY_MESSAGE);
        }
        Credential::Header(key) => key,
        Credential::Query(key) => {
            warn!(%path, "API Key provided via query parameter (for development/testing only)");
            key
        }
    };

    if state.api_key.is_empty() || supplied.as_str() != &*state.api_key {
        warn!(%path, "Invalid API Key provided for request to {}", path);
        return unauthorized(INVALID_KEY_MESSAGE);
    }

    info!(%path, "API Key accepted");
    next.run(req).await
}
