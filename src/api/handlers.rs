use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::ingest::{PollingStatus, WebhookOutcome};
use crate::metrics;
use crate::models::*;
use crate::notifications::NotificationStats;
use crate::providers::SIGNATURE_HEADER;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};
use validator::Validate;

const DEFAULT_PROVIDER: &str = "openai";

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    Ok(Json(HealthResponse {
        status: "UP".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

pub async fn liveness() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "LIVE" }))
}

/// Ready once at least one provider is registered
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    if state.providers.is_empty() {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "status": "NOT_READY" })),
        )
    } else {
        (StatusCode::OK, Json(serde_json::json!({ "status": "READY" })))
    }
}

/// Per-provider reachability
pub async fn providers_health(State(state): State<AppState>) -> Result<Json<ProvidersHealthResponse>> {
    let providers = state.providers.health_all().await;
    Ok(Json(ProvidersHealthResponse {
        total_providers: providers.len(),
        providers,
        timestamp: Utc::now(),
    }))
}

#[derive(Debug, Serialize)]
pub struct ProvidersHealthResponse {
    pub total_providers: usize,
    pub providers: BTreeMap<String, bool>,
    pub timestamp: DateTime<Utc>,
}

/// Overall system view: DEGRADED while any incident is open
pub async fn system_status(State(state): State<AppState>) -> Result<Json<SystemStatusResponse>> {
    let incidents = state.processor.lifecycle().active_incidents().await?;
    let status = if incidents.is_empty() { "HEALTHY" } else { "DEGRADED" };

    Ok(Json(SystemStatusResponse {
        status: status.to_string(),
        active_incidents: incidents.len(),
        incidents,
        polling_enabled: state.polling.is_enabled(),
        notifications: state.notifier.as_ref().map(|n| n.stats()),
        timestamp: Utc::now(),
    }))
}

#[derive(Debug, Serialize)]
pub struct SystemStatusResponse {
    pub status: String,
    pub active_incidents: usize,
    pub incidents: Vec<IncidentRecord>,
    pub polling_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notifications: Option<NotificationStats>,
    pub timestamp: DateTime<Utc>,
}

/// Provider push endpoint.
///
/// Only an unparseable body is an error; shapes we do not understand are
/// acknowledged so the provider does not retry them.
pub async fn receive_webhook(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>> {
    let provider = provider.to_ascii_lowercase();

    if let Ok(registered) = state.providers.get(&provider) {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|value| value.to_str().ok());
        if !registered.validate_webhook_signature(&body, signature) {
            warn!(provider = %provider, "Rejected webhook with invalid signature");
            metrics::record_webhook_dropped(&provider, "invalid_signature");
            return Err(AppError::Authentication(format!(
                "invalid webhook signature for provider {}",
                provider
            )));
        }
    }

    let outcome = state.webhooks.ingest(&provider, &body).await?;
    info!(provider = %provider, bytes = body.len(), "Webhook handled");

    Ok(Json(WebhookResponse {
        status: "success".to_string(),
        outcome,
    }))
}

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub status: String,
    pub outcome: WebhookOutcome,
}

/// All unresolved incidents across providers
pub async fn active_incidents(State(state): State<AppState>) -> Result<Json<IncidentListResponse>> {
    let incidents = state.processor.lifecycle().active_incidents().await?;
    Ok(Json(IncidentListResponse::new(incidents)))
}

/// Incidents of one provider touched within the trailing window
pub async fn recent_incidents(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<IncidentListResponse>> {
    query.validate()?;

    let provider = query.provider.as_deref().unwrap_or(DEFAULT_PROVIDER);
    let incidents = state
        .processor
        .lifecycle()
        .recent_incidents(provider, query.hours.unwrap_or(24))
        .await?;
    Ok(Json(IncidentListResponse::new(incidents)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct RecentQuery {
    #[validate(length(min = 1, max = 100))]
    pub provider: Option<String>,
    #[validate(range(min = 1, max = 720))]
    pub hours: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct IncidentListResponse {
    pub incidents: Vec<IncidentRecord>,
    pub total: usize,
}

impl IncidentListResponse {
    fn new(incidents: Vec<IncidentRecord>) -> Self {
        Self {
            total: incidents.len(),
            incidents,
        }
    }
}

pub async fn get_incident(
    State(state): State<AppState>,
    Path((provider, service_id)): Path<(String, String)>,
) -> Result<Json<IncidentRecord>> {
    let key = IncidentKey::new(provider.to_ascii_lowercase(), service_id);
    let record = state.processor.lifecycle().incident(&key).await?;
    Ok(Json(record))
}

/// Audit trail of a provider, newest first
pub async fn status_changes(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> Result<Json<Vec<StatusChangeRecord>>> {
    let changes = state.processor.lifecycle().provider_history(&provider).await?;
    Ok(Json(changes))
}

/// Audit trail of one incident within a trailing window
pub async fn incident_history(
    State(state): State<AppState>,
    Path(service_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<StatusChangeRecord>>> {
    query.validate()?;

    let changes = state
        .processor
        .lifecycle()
        .status_history(&service_id, query.hours.unwrap_or(24))
        .await?;
    Ok(Json(changes))
}

#[derive(Debug, Deserialize, Validate)]
pub struct HistoryQuery {
    #[validate(range(min = 1, max = 720))]
    pub hours: Option<i64>,
}

pub async fn list_components(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> Result<Json<Vec<ComponentRecord>>> {
    let components = state
        .processor
        .components()
        .components(&provider.to_ascii_lowercase())
        .await?;
    Ok(Json(components))
}

pub async fn degraded_components(State(state): State<AppState>) -> Result<Json<Vec<ComponentRecord>>> {
    Ok(Json(state.processor.components().degraded().await?))
}

pub async fn polling_status(State(state): State<AppState>) -> Json<PollingStatus> {
    Json(state.polling.status())
}

/// Flip the polling fallback at runtime
pub async fn set_polling(
    State(state): State<AppState>,
    Json(request): Json<PollingControlRequest>,
) -> Result<Json<PollingStatus>> {
    request.validate()?;

    state.polling.set_enabled(request.enabled, request.reason);
    Ok(Json(state.polling.status()))
}

#[derive(Debug, Deserialize, Validate)]
pub struct PollingControlRequest {
    pub enabled: bool,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

/// Prometheus text exposition
pub async fn metrics() -> Result<impl IntoResponse> {
    let body = metrics::gather().map_err(|e| AppError::Internal(e.to_string()))?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}
