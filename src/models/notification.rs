use crate::models::{IncidentRecord, IncidentStatus, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

/// What kind of transition a notification announces
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationKind {
    New,
    Updated,
    Resolved,
}

/// Notification handed to the dispatcher after a committed transition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub provider: String,
    pub service_id: String,
    pub service_name: String,
    pub status: IncidentStatus,
    pub severity: Severity,
    pub message: String,
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Build from the record as it stands after the transition
    pub fn from_record(kind: NotificationKind, record: &IncidentRecord) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            provider: record.provider.clone(),
            service_id: record.service_id.clone(),
            service_name: record.service_name.clone(),
            status: record.status,
            severity: record.severity,
            message: record.message.clone(),
            url: record.url.clone(),
            created_at: Utc::now(),
        }
    }

    /// One-line human-readable body shared by the text channels
    pub fn render(&self) -> String {
        match self.kind {
            NotificationKind::New => format!(
                "Product: {} | Status: {} | Severity: {} | Message: {}",
                self.service_name,
                self.status.as_str().to_uppercase(),
                self.severity.as_str().to_uppercase(),
                self.message
            ),
            NotificationKind::Updated => {
                format!("Status Update for {}: {}", self.service_name, self.message)
            }
            NotificationKind::Resolved => format!(
                "Incident Resolved: {} | Resolution: {}",
                self.service_name, self.message
            ),
        }
    }

    pub fn subject(&self) -> String {
        format!(
            "[{}] {} - {}",
            self.provider,
            self.kind.to_string().to_uppercase(),
            self.service_name
        )
    }

    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CanonicalEvent;

    fn record(status: IncidentStatus) -> IncidentRecord {
        let event = CanonicalEvent::new(
            "openai",
            "inc-1",
            "ChatGPT",
            status,
            Severity::Critical,
            "Elevated errors",
        );
        IncidentRecord::from_event(&event, Utc::now())
    }

    #[test]
    fn test_render_formats() {
        let new = Notification::from_record(NotificationKind::New, &record(IncidentStatus::Investigating));
        assert_eq!(
            new.render(),
            "Product: ChatGPT | Status: INVESTIGATING | Severity: CRITICAL | Message: Elevated errors"
        );

        let updated = Notification::from_record(NotificationKind::Updated, &record(IncidentStatus::Monitoring));
        assert_eq!(updated.render(), "Status Update for ChatGPT: Elevated errors");

        let resolved = Notification::from_record(NotificationKind::Resolved, &record(IncidentStatus::Resolved));
        assert_eq!(
            resolved.render(),
            "Incident Resolved: ChatGPT | Resolution: Elevated errors"
        );
        assert!(resolved.is_critical());
        assert_eq!(resolved.subject(), "[openai] RESOLVED - ChatGPT");
    }
}
