use crate::models::{content_fingerprint, CanonicalEvent, IncidentRecord};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

/// Verdict for one incoming event against the stored record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    New,
    Changed,
    Duplicate,
}

impl Classification {
    /// Whether the verdict produces a state mutation
    pub fn is_actionable(&self) -> bool {
        !matches!(self, Classification::Duplicate)
    }
}

/// Decides NEW / CHANGED / DUPLICATE. Pure: no I/O, time is passed in.
#[derive(Debug, Clone)]
pub struct ChangeDetector {
    refresh_window: Duration,
}

impl ChangeDetector {
    pub fn new(refresh_window_secs: u64) -> Self {
        Self {
            refresh_window: Duration::seconds(refresh_window_secs as i64),
        }
    }

    pub fn refresh_window(&self) -> Duration {
        self.refresh_window
    }

    /// Classify `event` against the record currently stored for its key.
    ///
    /// A status change always wins. With the same status, a new message only
    /// counts once the record is older than the refresh window, so bursts of
    /// wording edits collapse into one update.
    pub fn classify(
        &self,
        event: &CanonicalEvent,
        existing: Option<&IncidentRecord>,
        now: DateTime<Utc>,
    ) -> Classification {
        let Some(existing) = existing else {
            return Classification::New;
        };

        // Statuses are normalized on parse, so enum equality is already
        // case-insensitive with respect to the provider's spelling.
        if existing.status != event.status {
            return Classification::Changed;
        }

        let message_differs = !existing.message.eq_ignore_ascii_case(&event.message);
        let outside_window = existing.updated_at + self.refresh_window < now;

        if message_differs && outside_window {
            Classification::Changed
        } else {
            Classification::Duplicate
        }
    }

    /// Diagnostic digest of an event's content
    pub fn fingerprint(event: &CanonicalEvent) -> String {
        content_fingerprint(&event.service_id, event.status, &event.message)
    }
}

impl Default for ChangeDetector {
    fn default() -> Self {
        Self::new(60)
    }
}
