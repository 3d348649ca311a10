use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{Display, EnumString};

/// Provider-native component status vocabulary
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ComponentStatus {
    Operational,
    DegradedPerformance,
    PartialOutage,
    MajorOutage,
    UnderMaintenance,
    Unknown,
}

impl ComponentStatus {
    pub fn parse_lenient(raw: &str) -> Self {
        Self::from_str(raw.trim()).unwrap_or(ComponentStatus::Unknown)
    }

    /// Neither operational nor in planned maintenance
    pub fn is_degraded(&self) -> bool {
        !matches!(
            self,
            ComponentStatus::Operational | ComponentStatus::UnderMaintenance
        )
    }
}

/// A component as reported by a provider at one point in time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComponentSnapshot {
    pub component_id: String,
    pub provider: String,
    pub name: String,
    pub status: ComponentStatus,
    pub description: Option<String>,
    pub position: Option<i64>,
}

/// Persisted component registry entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComponentRecord {
    pub component_id: String,
    pub provider: String,
    pub name: String,
    pub current_status: ComponentStatus,
    pub description: Option<String>,
    pub position: Option<i64>,
    pub last_checked_at: DateTime<Utc>,
    pub last_status_change_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic-lock counter
    pub version: u64,
}

impl ComponentRecord {
    pub fn from_snapshot(snapshot: &ComponentSnapshot, now: DateTime<Utc>) -> Self {
        Self {
            component_id: snapshot.component_id.clone(),
            provider: snapshot.provider.clone(),
            name: snapshot.name.clone(),
            current_status: snapshot.status,
            description: snapshot.description.clone(),
            position: snapshot.position,
            last_checked_at: now,
            last_status_change_at: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Apply a fresh snapshot, bumping the version
    pub fn refreshed(&self, snapshot: &ComponentSnapshot, now: DateTime<Utc>) -> Self {
        let status_changed = self.current_status != snapshot.status;
        Self {
            name: snapshot.name.clone(),
            current_status: snapshot.status,
            description: snapshot.description.clone().or_else(|| self.description.clone()),
            position: snapshot.position.or(self.position),
            last_checked_at: now,
            last_status_change_at: if status_changed {
                Some(now)
            } else {
                self.last_status_change_at
            },
            updated_at: now,
            version: self.version + 1,
            ..self.clone()
        }
    }
}
