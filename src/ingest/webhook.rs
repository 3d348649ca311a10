//! Webhook ingestion: raw body to canonical events.

use crate::error::{AppError, Result};
use crate::ingest::mapping;
use crate::metrics;
use crate::models::EventSource;
use crate::processing::{Classification, EventSink};
use crate::providers::client::{StatuspageComponent, StatuspageIncident};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Recognized webhook body
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookEvent {
    Incident(StatuspageIncident),
    Component(StatuspageComponent),
}

/// What happened to an accepted webhook
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WebhookOutcome {
    Processed {
        kind: &'static str,
        service_id: String,
        classification: Classification,
    },
    Dropped {
        reason: String,
    },
}

/// Parse a body as JSON. This is the only failure surfaced to the sender.
pub fn parse_payload(payload: &[u8]) -> Result<Value> {
    serde_json::from_slice(payload)
        .map_err(|e| AppError::MalformedPayload(format!("Webhook body is not valid JSON: {}", e)))
}

/// Classify a parsed body by its top-level key
pub fn classify_payload(root: &Value) -> Result<WebhookEvent> {
    if let Some(incident) = root.get("incident") {
        return serde_json::from_value(incident.clone())
            .map(WebhookEvent::Incident)
            .map_err(|e| AppError::UnrecognizedEventShape(format!("Incomplete incident: {}", e)));
    }
    if let Some(component) = root.get("component") {
        return serde_json::from_value(component.clone())
            .map(WebhookEvent::Component)
            .map_err(|e| AppError::UnrecognizedEventShape(format!("Incomplete component: {}", e)));
    }
    Err(AppError::UnrecognizedEventShape(
        "Body has neither an incident nor a component".to_string(),
    ))
}

/// Turns webhook bodies into events on the shared sink.
///
/// Anything past JSON parsing is acknowledged: unknown shapes and processing
/// failures are logged and reported as dropped, because the sender can only
/// react by retransmitting and retransmission is idempotent.
pub struct WebhookIngestor {
    sink: Arc<dyn EventSink>,
}

impl WebhookIngestor {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink }
    }

    pub async fn ingest(&self, provider: &str, payload: &[u8]) -> Result<WebhookOutcome> {
        let provider = provider.trim().to_ascii_lowercase();
        let root = parse_payload(payload).map_err(|e| {
            metrics::record_webhook_dropped(&provider, "malformed");
            tracing::error!(provider = %provider, error = %e, "Rejecting malformed webhook");
            e
        })?;

        let event = match classify_payload(&root) {
            Ok(event) => event,
            Err(e) => {
                metrics::record_webhook_dropped(&provider, "unrecognized");
                tracing::warn!(provider = %provider, error = %e, "Dropping unrecognized webhook payload");
                return Ok(WebhookOutcome::Dropped {
                    reason: e.to_string(),
                });
            }
        };

        match event {
            WebhookEvent::Incident(incident) => self.ingest_incident(&provider, incident).await,
            WebhookEvent::Component(component) => self.ingest_component(&provider, component).await,
        }
    }

    async fn ingest_incident(
        &self,
        provider: &str,
        incident: StatuspageIncident,
    ) -> Result<WebhookOutcome> {
        tracing::info!(provider = %provider, incident_id = %incident.id, "Incident webhook received");

        let event = mapping::incident_event(provider, &incident, EventSource::Webhook);
        let service_id = event.service_id.clone();
        Ok(self.submit(provider, "incident", service_id, event).await)
    }

    async fn ingest_component(
        &self,
        provider: &str,
        component: StatuspageComponent,
    ) -> Result<WebhookOutcome> {
        tracing::info!(
            provider = %provider,
            component_id = %component.id,
            status = %component.status,
            "Component webhook received"
        );

        let snapshot = mapping::component_snapshot(provider, &component);
        if let Err(e) = self.sink.submit_component(snapshot).await {
            tracing::error!(
                provider = %provider,
                component_id = %component.id,
                error = %e,
                "Failed to refresh component registry"
            );
        }

        let event = mapping::component_event(provider, &component, EventSource::Webhook);
        Ok(self.submit(provider, "component", component.id, event).await)
    }

    async fn submit(
        &self,
        provider: &str,
        kind: &'static str,
        service_id: String,
        event: crate::models::CanonicalEvent,
    ) -> WebhookOutcome {
        match self.sink.submit(event).await {
            Ok(classification) => WebhookOutcome::Processed {
                kind,
                service_id,
                classification,
            },
            Err(e) => {
                metrics::record_webhook_dropped(provider, "processing_failed");
                tracing::error!(
                    provider = %provider,
                    service_id = %service_id,
                    error = %e,
                    "Webhook event could not be reconciled"
                );
                WebhookOutcome::Dropped {
                    reason: e.to_string(),
                }
            }
        }
    }
}
