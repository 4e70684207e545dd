//! End-to-end behaviour of the ingress router: auth, exception handling,
//! access logging and the built-in routes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::Response,
    routing::get,
    Router,
};
use tower::ServiceExt;
use tracing_test::traced_test;

use api_ingress::auth::{INVALID_KEY_MESSAGE, MISSING_KEY_MESSAGE};
use api_ingress::exception::INTERNAL_ERROR;
use api_ingress::{ApiIngress, ApiIngressConfig, AppError};

const KEY: &str = "test-key";

fn config() -> ApiIngressConfig {
    ApiIngressConfig {
        api_key: KEY.to_string(),
        ..Default::default()
    }
}

async fn ok_handler(State(hits): State<Arc<AtomicUsize>>) -> &'static str {
    hits.fetch_add(1, Ordering::SeqCst);
    "ok"
}

async fn panicking_handler() -> &'static str {
    panic!("handler blew up")
}

async fn failing_handler() -> Result<&'static str, AppError> {
    Err(AppError::internal(anyhow::anyhow!("storage unavailable")))
}

fn app_with(cfg: ApiIngressConfig) -> (Router, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let api = Router::new()
        .route("/api/ping", get(ok_handler))
        .route("/api/panic", get(panicking_handler))
        .route("/api/fail", get(failing_handler))
        .with_state(hits.clone());

    let router = ApiIngress::new(cfg).build_router(api).unwrap();
    (router, hits)
}

fn app() -> (Router, Arc<AtomicUsize>) {
    app_with(config())
}

fn get_req(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn get_with_key(uri: &str, key: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("X-API-KEY", key)
        .body(Body::empty())
        .unwrap()
}

async fn json_of(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn missing_key_is_rejected_before_the_handler() {
    let (app, hits) = app();

    let response = app.oneshot(get_req("/api/ping")).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_of(response).await["error"], MISSING_KEY_MESSAGE);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn wrong_key_is_rejected_before_the_handler() {
    let (app, hits) = app();

    let response = app
        .oneshot(get_with_key("/api/ping", "nope"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_of(response).await["error"], INVALID_KEY_MESSAGE);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn empty_header_is_treated_as_missing() {
    let (app, _) = app();

    let response = app.oneshot(get_with_key("/api/ping", "")).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_of(response).await["error"], MISSING_KEY_MESSAGE);
}

#[tokio::test]
async fn header_key_reaches_the_handler() {
    let (app, hits) = app();

    let response = app.oneshot(get_with_key("/api/ping", KEY)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[traced_test]
#[tokio::test]
async fn query_key_is_accepted_with_a_warning() {
    let (app, hits) = app();

    let response = app
        .oneshot(get_req(&format!("/api/ping?apikey={KEY}")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert!(logs_contain("API Key provided via query parameter"));
}

#[tokio::test]
async fn empty_configured_key_rejects_everything() {
    let (app, hits) = app_with(ApiIngressConfig::default());

    let response = app.oneshot(get_with_key("/api/ping", "")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn health_and_docs_are_public() {
    for path in ["/health", "/openapi.json", "/docs"] {
        let (app, _) = app();
        let response = app.oneshot(get_req(path)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{path}");
    }
}

#[tokio::test]
async fn health_reports_status() {
    let (app, _) = app();

    let response = app.oneshot(get_req("/health")).await.unwrap();
    let json = json_of(response).await;

    assert_eq!(json["status"], "healthy");
    assert!(json["timestamp"].is_string());
}

#[tokio::test]
async fn openapi_document_declares_api_key_scheme() {
    let (app, _) = app();

    let response = app.oneshot(get_req("/openapi.json")).await.unwrap();
    let json = json_of(response).await;

    assert_eq!(json["info"]["title"], api_ingress::API_TITLE);
    assert_eq!(
        json["components"]["securitySchemes"]["ApiKey"]["name"],
        "X-API-KEY"
    );
}

#[tokio::test]
async fn docs_can_be_disabled() {
    let (app, _) = app_with(ApiIngressConfig {
        enable_docs: false,
        ..config()
    });

    // No longer routed, so the fallback answers; the path is still public.
    let response = app.oneshot(get_req("/openapi.json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_route_needs_the_key() {
    let (app, _) = app();
    let response = app.clone().oneshot(get_req("/api/nowhere")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(get_with_key("/api/nowhere", KEY))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(json_of(response).await["error"].is_string());
}

#[tokio::test]
async fn non_ascii_path_near_a_public_prefix_is_protected() {
    let (app, _) = app();
    let response = app.clone().oneshot(get_req("/docé")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.oneshot(get_with_key("/docé", KEY)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[traced_test]
#[tokio::test]
async fn panics_become_internal_error_body() {
    let (app, _) = app();

    let response = app.oneshot(get_with_key("/api/panic", KEY)).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = json_of(response).await;
    assert_eq!(json["error"], INTERNAL_ERROR);
    assert!(json["message"].is_string());
    assert!(json["timestamp"].is_string());
    assert!(logs_contain("An unhandled exception has occurred."));
    assert!(logs_contain("handler blew up"));
}

#[traced_test]
#[tokio::test]
async fn internal_errors_are_logged_once_and_reported() {
    let (app, _) = app();

    let response = app.oneshot(get_with_key("/api/fail", KEY)).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response
        .extensions()
        .get::<api_ingress::exception::UnhandledFailure>()
        .is_none());
    let json = json_of(response).await;
    assert_eq!(json["error"], INTERNAL_ERROR);
    assert!(logs_contain("storage unavailable"));
}

#[cfg(not(feature = "debug-errors"))]
#[tokio::test]
async fn internal_cause_is_not_leaked() {
    let (app, _) = app();

    let response = app.oneshot(get_with_key("/api/fail", KEY)).await.unwrap();
    let json = json_of(response).await;

    assert_eq!(json["message"], "An unexpected error occurred.");
}

#[traced_test]
#[tokio::test]
async fn access_log_records_both_directions() {
    let (app, _) = app();

    let response = app.oneshot(get_with_key("/api/ping", KEY)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert!(logs_contain("Incoming Request: GET /api/ping"));
    assert!(logs_contain("Outgoing Response: GET /api/ping -> 200 in"));
}

#[traced_test]
#[tokio::test]
async fn access_log_closes_panicking_requests() {
    let (app, _) = app();

    let response = app.oneshot(get_with_key("/api/panic", KEY)).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    assert!(logs_contain("Incoming Request: GET /api/panic"));
    assert!(logs_contain("Outgoing Response: GET /api/panic -> 500 in"));
    assert!(logs_contain("An unhandled exception has occurred."));
}

#[traced_test]
#[tokio::test]
async fn rejected_requests_skip_the_access_log() {
    let (app, _) = app();

    let response = app.oneshot(get_req("/api/ping")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    assert!(logs_contain("API Key is missing"));
    assert!(!logs_contain("Incoming Request: GET /api/ping"));
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let (app, _) = app();

    let response = app.oneshot(get_req("/health")).await.unwrap();

    let rid = response
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok());
    assert!(rid.is_some_and(|v| !v.is_empty()));
}
