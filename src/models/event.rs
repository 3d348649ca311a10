use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum::{Display, EnumString};

/// Lifecycle status of an incident, as reconciled across providers
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum IncidentStatus {
    Investigating,
    Identified,
    Monitoring,
    Resolved,
    Degraded,
    Operational,
}

impl IncidentStatus {
    /// Normalize a provider status string.
    ///
    /// Known values match case-insensitively. Statuspage's scheduled
    /// maintenance vocabulary folds onto the closest lifecycle state and
    /// anything else lands on `Monitoring`.
    pub fn normalize(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Ok(status) = Self::from_str(trimmed) {
            return status;
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "postmortem" | "completed" => IncidentStatus::Resolved,
            "degraded_performance" => IncidentStatus::Degraded,
            "scheduled" | "in_progress" | "verifying" => IncidentStatus::Monitoring,
            _ => IncidentStatus::Monitoring,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, IncidentStatus::Resolved)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentStatus::Investigating => "investigating",
            IncidentStatus::Identified => "identified",
            IncidentStatus::Monitoring => "monitoring",
            IncidentStatus::Resolved => "resolved",
            IncidentStatus::Degraded => "degraded",
            IncidentStatus::Operational => "operational",
        }
    }
}

/// Impact level of an incident.
///
/// `Resolved` only appears on component-derived events for operational
/// components.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Severity {
    Critical,
    Major,
    Minor,
    Maintenance,
    Resolved,
    Unknown,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Major => "major",
            Severity::Minor => "minor",
            Severity::Maintenance => "maintenance",
            Severity::Resolved => "resolved",
            Severity::Unknown => "unknown",
        }
    }
}

/// Which ingestion path produced an event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventSource {
    Webhook,
    Polling,
}

/// Identity of a tracked incident: one record per (provider, service id)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IncidentKey {
    pub provider: String,
    pub service_id: String,
}

impl IncidentKey {
    pub fn new(provider: impl Into<String>, service_id: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            service_id: service_id.into(),
        }
    }
}

impl fmt::Display for IncidentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.service_id)
    }
}

/// Provider-agnostic status event; the single input to reconciliation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CanonicalEvent {
    /// Provider name, lowercase
    pub provider: String,

    /// Provider-native id of the incident or component
    pub service_id: String,

    /// Human-readable name
    pub service_name: String,

    pub status: IncidentStatus,

    pub severity: Severity,

    /// Latest human-readable message; empty when the provider sent none
    pub message: String,

    pub url: Option<String>,

    /// When the source asserted this status
    pub observed_at: DateTime<Utc>,

    pub source: EventSource,

    /// Component names the provider listed as affected
    pub affected_components: Vec<String>,
}

impl CanonicalEvent {
    pub fn new(
        provider: impl Into<String>,
        service_id: impl Into<String>,
        service_name: impl Into<String>,
        status: IncidentStatus,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into().to_ascii_lowercase(),
            service_id: service_id.into(),
            service_name: service_name.into(),
            status,
            severity,
            message: message.into(),
            url: None,
            observed_at: Utc::now(),
            source: EventSource::Webhook,
            affected_components: Vec::new(),
        }
    }

    pub fn with_url(mut self, url: Option<String>) -> Self {
        self.url = url;
        self
    }

    pub fn with_source(mut self, source: EventSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_observed_at(mut self, observed_at: DateTime<Utc>) -> Self {
        self.observed_at = observed_at;
        self
    }

    pub fn with_affected_components(mut self, components: Vec<String>) -> Self {
        self.affected_components = components;
        self
    }

    pub fn key(&self) -> IncidentKey {
        IncidentKey::new(self.provider.clone(), self.service_id.clone())
    }
}
