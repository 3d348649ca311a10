//! HTTP surface tests driven through the router without a socket

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{event, incident_json, Pipeline};
use sha2::{Digest, Sha256};
use status_tracker::api::{build_router, AppState};
use status_tracker::config::PollingConfig;
use status_tracker::ingest::PollingOrchestrator;
use status_tracker::models::IncidentStatus;
use status_tracker::providers::{GenericStatuspageProvider, ProviderRegistry, SIGNATURE_HEADER};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const SECRET: &str = "s3cret";

fn app(pipeline: &Pipeline, registry: ProviderRegistry) -> Router {
    let registry = Arc::new(registry);
    let polling = Arc::new(PollingOrchestrator::new(
        registry.clone(),
        pipeline.processor.clone(),
        &PollingConfig::default(),
    ));
    build_router(AppState::new(pipeline.processor.clone(), registry, polling))
}

fn signed_registry() -> ProviderRegistry {
    let registry = ProviderRegistry::new();
    let provider = GenericStatuspageProvider::new(
        "acme",
        "http://127.0.0.1:9",
        "page",
        None,
        Duration::from_secs(1),
    )
    .unwrap()
    .with_webhook_secret(Some(SECRET.to_string()));
    registry.register_provider(Arc::new(provider)).unwrap();
    registry
}

fn sign(payload: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(SECRET.as_bytes());
    hasher.update(payload);
    format!("{:x}", hasher.finalize())
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, body)
}

fn post(uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

fn post_signed(uri: &str, body: &str, signature: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header(SIGNATURE_HEADER, signature)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_incident_webhook_is_processed() {
    let pipeline = Pipeline::new();
    let body = serde_json::json!({ "incident": incident_json("inc_1", "investigating", "M1") });

    let (status, json) = send(app(&pipeline, ProviderRegistry::new()), post("/webhook/openai", body.to_string())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "success");
    assert_eq!(json["outcome"]["outcome"], "processed");
    assert_eq!(json["outcome"]["classification"], "NEW");
    assert!(pipeline.record("openai", "inc_1").await.is_some());
}

#[tokio::test]
async fn test_unrecognized_shape_is_acknowledged() {
    let pipeline = Pipeline::new();
    let (status, json) = send(
        app(&pipeline, ProviderRegistry::new()),
        post("/webhook/openai", r#"{"page":{"id":"x"}}"#),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["outcome"]["outcome"], "dropped");
    assert_eq!(pipeline.store.count_incidents().await.unwrap(), 0);
}

#[tokio::test]
async fn test_malformed_body_is_a_server_error() {
    let pipeline = Pipeline::new();
    let (status, json) = send(
        app(&pipeline, ProviderRegistry::new()),
        post("/webhook/openai", "{not json"),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"]["code"], "MALFORMED_PAYLOAD");
}

#[tokio::test]
async fn test_signed_provider_rejects_bad_signature() {
    let pipeline = Pipeline::new();
    let body = serde_json::json!({ "incident": incident_json("inc_2", "investigating", "M1") }).to_string();

    let (status, _) = send(app(&pipeline, signed_registry()), post_signed("/webhook/acme", &body, "deadbeef")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(pipeline.record("acme", "inc_2").await.is_none());

    let signature = sign(body.as_bytes());
    let (status, _) = send(app(&pipeline, signed_registry()), post_signed("/webhook/acme", &body, &signature)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(pipeline.record("acme", "inc_2").await.is_some());
}

#[tokio::test]
async fn test_active_incidents_endpoint() {
    let pipeline = Pipeline::new();
    pipeline
        .processor
        .process_event(event("inc_a", IncidentStatus::Investigating, "open"))
        .await
        .unwrap();
    pipeline
        .processor
        .process_event(event("inc_b", IncidentStatus::Resolved, "done"))
        .await
        .unwrap();

    let (status, json) = send(app(&pipeline, ProviderRegistry::new()), get("/status/active")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 1);
    assert_eq!(json["incidents"][0]["service_id"], "inc_a");
}

#[tokio::test]
async fn test_recent_incidents_validates_window() {
    let pipeline = Pipeline::new();
    pipeline
        .processor
        .process_event(event("inc_a", IncidentStatus::Investigating, "open"))
        .await
        .unwrap();

    let (status, json) = send(
        app(&pipeline, ProviderRegistry::new()),
        get("/status/recent?provider=openai&hours=1"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 1);

    let (status, _) = send(
        app(&pipeline, ProviderRegistry::new()),
        get("/status/recent?hours=0"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_incident_is_not_found() {
    let pipeline = Pipeline::new();
    let (status, _) = send(
        app(&pipeline, ProviderRegistry::new()),
        get("/status/incidents/openai/missing"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_readiness_requires_a_provider() {
    let pipeline = Pipeline::new();

    let (status, json) = send(app(&pipeline, ProviderRegistry::new()), get("/health/ready")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["status"], "NOT_READY");

    let (status, _) = send(app(&pipeline, signed_registry()), get("/health/ready")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_polling_control_round_trip() {
    let pipeline = Pipeline::new();
    let router = app(&pipeline, ProviderRegistry::new());

    let (status, json) = send(
        router.clone(),
        post("/control/polling", r#"{"enabled":true,"reason":"webhook subscribe failed"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["enabled"], true);
    assert_eq!(json["reason"], "webhook subscribe failed");

    let (_, json) = send(router, get("/control/polling")).await;
    assert_eq!(json["enabled"], true);
}

#[tokio::test]
async fn test_system_status_degrades_with_open_incidents() {
    let pipeline = Pipeline::new();
    let (_, json) = send(app(&pipeline, ProviderRegistry::new()), get("/health/system")).await;
    assert_eq!(json["status"], "HEALTHY");

    pipeline
        .processor
        .process_event(event("inc_a", IncidentStatus::Investigating, "open"))
        .await
        .unwrap();
    let (_, json) = send(app(&pipeline, ProviderRegistry::new()), get("/health/system")).await;
    assert_eq!(json["status"], "DEGRADED");
    assert_eq!(json["active_incidents"], 1);
}
