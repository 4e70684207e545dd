//! HTTP ingress: owns the listener, the interceptor pipeline and the
//! documentation endpoints. Feature modules hand it a plain `axum::Router`.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    http::header,
    middleware::from_fn,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
};
use utoipa::openapi::{Info, OpenApi, Paths};
use utoipa::Modify;

pub mod access_log;
pub mod auth;
mod config;
pub mod error;
pub mod exception;
pub mod openapi;
pub mod pipeline;
pub mod request_id;
mod web;

pub use auth::AuthState;
pub use config::ApiIngressConfig;
pub use error::{AppError, FieldErrors};

pub const API_TITLE: &str = "User Management API";

const BODY_LIMIT_BYTES: usize = 16 * 1024 * 1024;

pub struct ApiIngress {
    config: ApiIngressConfig,
    openapi: OpenApi,
}

impl ApiIngress {
    pub fn new(config: ApiIngressConfig) -> Self {
        if config.api_key.is_empty() {
            tracing::warn!("api_ingress.api_key is empty; every protected request will be rejected");
        }
        Self {
            config,
            openapi: OpenApi::new(Info::new(API_TITLE, env!("CARGO_PKG_VERSION")), Paths::new()),
        }
    }

    /// Replace the served OpenAPI document. The API key scheme is added on build.
    pub fn with_openapi(mut self, doc: OpenApi) -> Self {
        self.openapi = doc;
        self
    }

    pub fn config(&self) -> &ApiIngressConfig {
        &self.config
    }

    fn openapi_json(&self) -> Result<serde_json::Value> {
        let mut doc = self.openapi.clone();
        openapi::ApiKeySecurityAddon.modify(&mut doc);
        serde_json::to_value(doc).context("failed to serialize OpenAPI document")
    }

    /// Mount `api` next to the ingress routes and wrap everything in the middleware stack.
    pub fn build_router(&self, api: Router) -> Result<Router> {
        let mut router = api.route("/health", get(web::health_check));

        if self.config.enable_docs {
            let doc = Arc::new(self.openapi_json()?);
            router = router
                .route(
                    "/openapi.json",
                    get(move || {
                        let doc = doc.clone();
                        async move {
                            ([(header::CACHE_CONTROL, "no-store")], Json((*doc).clone()))
                                .into_response()
                        }
                    }),
                )
                .route("/docs", get(web::serve_docs));
        }

        router = router.fallback(web::not_found);

        // Added innermost to outermost:
        // BodyLimit -> pipeline -> CORS -> push_req_id -> Trace -> SetRequestId -> PropagateRequestId
        router = router.layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES));
        router = pipeline::apply(router, AuthState::from_config(&self.config));

        if self.config.cors_enabled {
            router = router.layer(CorsLayer::permissive());
        }

        let x_request_id = request_id::header();
        router = router
            .layer(from_fn(request_id::push_req_id_to_extensions))
            .layer(request_id::create_trace_layer())
            .layer(SetRequestIdLayer::new(x_request_id.clone(), request_id::MakeReqId))
            .layer(PropagateRequestIdLayer::new(x_request_id));

        Ok(router)
    }

    pub async fn bind(&self) -> Result<TcpListener> {
        let addr: SocketAddr = self
            .config
            .bind_addr
            .parse()
            .with_context(|| format!("Invalid bind address '{}'", self.config.bind_addr))?;
        TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))
    }

    /// Bind and serve until `cancel` fires.
    pub async fn serve(&self, router: Router, cancel: CancellationToken) -> Result<()> {
        let listener = self.bind().await?;
        serve_on(listener, router, cancel).await
    }
}

pub async fn serve_on(listener: TcpListener, router: Router, cancel: CancellationToken) -> Result<()> {
    tracing::info!("HTTP server bound on {}", listener.local_addr()?);

    let shutdown = async move {
        cancel.cancelled().await;
        tracing::info!("HTTP server shutting down gracefully (cancellation)");
    };

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")
}
