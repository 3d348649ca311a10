use crate::models::{CanonicalEvent, IncidentKey, IncidentStatus, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Persisted state of one tracked incident
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IncidentRecord {
    pub service_id: String,

    pub provider: String,

    pub service_name: String,

    pub status: IncidentStatus,

    pub message: String,

    pub severity: Severity,

    pub url: Option<String>,

    pub affected_components: Vec<String>,

    /// Diagnostic digest of the last applied content
    pub content_fingerprint: String,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// Set while the incident is resolved, cleared on reopen
    pub resolved_at: Option<DateTime<Utc>>,

    /// Bumped on every committed transition; used as the optimistic lock
    pub revision: u64,
}

impl IncidentRecord {
    /// Build the initial record for a NEW event
    pub fn from_event(event: &CanonicalEvent, now: DateTime<Utc>) -> Self {
        Self {
            service_id: event.service_id.clone(),
            provider: event.provider.clone(),
            service_name: event.service_name.clone(),
            status: event.status,
            message: event.message.clone(),
            severity: event.severity,
            url: event.url.clone(),
            affected_components: event.affected_components.clone(),
            content_fingerprint: content_fingerprint(
                &event.service_id,
                event.status,
                &event.message,
            ),
            created_at: now,
            updated_at: now,
            resolved_at: event.status.is_resolved().then_some(now),
            revision: 0,
        }
    }

    /// Produce the successor record for a CHANGED event
    pub fn transitioned(&self, event: &CanonicalEvent, now: DateTime<Utc>) -> Self {
        let resolved_at = if event.status.is_resolved() {
            self.resolved_at.or(Some(now))
        } else {
            None
        };

        Self {
            status: event.status,
            message: event.message.clone(),
            content_fingerprint: content_fingerprint(
                &self.service_id,
                event.status,
                &event.message,
            ),
            updated_at: now,
            resolved_at,
            revision: self.revision + 1,
            ..self.clone()
        }
    }

    pub fn key(&self) -> IncidentKey {
        IncidentKey::new(self.provider.clone(), self.service_id.clone())
    }

    pub fn is_active(&self) -> bool {
        !self.status.is_resolved()
    }
}

/// Append-only audit entry written on every CHANGED transition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusChangeRecord {
    pub id: Uuid,

    pub service_id: String,

    pub service_name: String,

    pub provider: String,

    pub previous_status: IncidentStatus,

    pub current_status: IncidentStatus,

    pub change_reason: Option<String>,

    pub changed_at: DateTime<Utc>,
}

impl StatusChangeRecord {
    pub fn new(
        previous: &IncidentRecord,
        current_status: IncidentStatus,
        change_reason: Option<String>,
        changed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            service_id: previous.service_id.clone(),
            service_name: previous.service_name.clone(),
            provider: previous.provider.clone(),
            previous_status: previous.status,
            current_status,
            change_reason,
            changed_at,
        }
    }
}

/// SHA-256 over `serviceId|status|message`, lowercase hex
pub fn content_fingerprint(service_id: &str, status: IncidentStatus, message: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(service_id.as_bytes());
    hasher.update(b"|");
    hasher.update(status.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(message.as_bytes());
    format!("{:x}", hasher.finalize())
}
