//! Provider wire shapes to canonical events.
//!
//! Webhooks and polling both go through these functions so that an incident
//! maps to the same event regardless of how it arrived.

use crate::models::{
    CanonicalEvent, ComponentSnapshot, ComponentStatus, EventSource, IncidentStatus, Severity,
};
use crate::providers::client::{StatuspageComponent, StatuspageIncident};
use chrono::{DateTime, Utc};

/// Incident impact to severity
pub fn severity_from_impact(impact: &str) -> Severity {
    match impact.trim().to_ascii_lowercase().as_str() {
        "critical" => Severity::Critical,
        "major" => Severity::Major,
        "minor" => Severity::Minor,
        "maintenance" => Severity::Maintenance,
        _ => Severity::Unknown,
    }
}

/// Native component status to incident status vocabulary
pub fn status_from_component(status: &str) -> IncidentStatus {
    match status.trim().to_ascii_lowercase().as_str() {
        "major_outage" | "partial_outage" => IncidentStatus::Investigating,
        "degraded_performance" => IncidentStatus::Degraded,
        "operational" => IncidentStatus::Resolved,
        _ => IncidentStatus::Monitoring,
    }
}

/// Native component status to severity
pub fn severity_from_component(status: &str) -> Severity {
    match status.trim().to_ascii_lowercase().as_str() {
        "major_outage" => Severity::Critical,
        "partial_outage" => Severity::Major,
        "degraded_performance" => Severity::Minor,
        "operational" => Severity::Resolved,
        _ => Severity::Unknown,
    }
}

/// Message carried by a component-sourced event
pub fn component_message(status: &str) -> String {
    format!("Component status changed to: {}", status)
}

/// Latest update body; empty when the provider sent no updates
pub fn latest_update_message(incident: &StatuspageIncident) -> String {
    incident
        .incident_updates
        .first()
        .and_then(|update| update.body.clone())
        .unwrap_or_default()
}

pub fn incident_event(
    provider: &str,
    incident: &StatuspageIncident,
    source: EventSource,
) -> CanonicalEvent {
    let severity = incident
        .impact
        .as_deref()
        .map(severity_from_impact)
        .unwrap_or(Severity::Unknown);

    let affected = incident
        .components
        .iter()
        .filter_map(|component| component.name.clone())
        .collect();

    let mut event = CanonicalEvent::new(
        provider,
        incident.id.clone(),
        incident.name.clone(),
        IncidentStatus::normalize(&incident.status),
        severity,
        latest_update_message(incident),
    )
    .with_url(incident.shortlink.clone())
    .with_source(source)
    .with_affected_components(affected);

    if let Some(observed_at) = incident.updated_at.as_deref().and_then(parse_timestamp) {
        event = event.with_observed_at(observed_at);
    }

    event
}

pub fn component_event(
    provider: &str,
    component: &StatuspageComponent,
    source: EventSource,
) -> CanonicalEvent {
    CanonicalEvent::new(
        provider,
        component.id.clone(),
        component.name.clone(),
        status_from_component(&component.status),
        severity_from_component(&component.status),
        component_message(&component.status),
    )
    .with_source(source)
}

pub fn component_snapshot(provider: &str, component: &StatuspageComponent) -> ComponentSnapshot {
    ComponentSnapshot {
        component_id: component.id.clone(),
        provider: provider.to_ascii_lowercase(),
        name: component.name.clone(),
        status: ComponentStatus::parse_lenient(&component.status),
        description: component.description.clone(),
        position: component.position,
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}
