use crate::error::{AppError, Result};
use crate::models::{
    ComponentRecord, ComponentStatus, IncidentKey, IncidentRecord, IncidentStatus, Severity,
    StatusChangeRecord,
};
use crate::state::store::{component_conflict, incident_conflict, revision_conflict, sort_by_position};
use crate::state::StatusStore;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

const MIGRATION_0001: (&str, &str) = (
    "0001_init.sql",
    include_str!("../../migrations/0001_init.sql"),
);

fn migrations() -> Vec<(&'static str, &'static str)> {
    vec![MIGRATION_0001]
}

const INCIDENT_COLUMNS: &str = "incident_id, provider, service_name, status, status_message, \
     severity, incident_url, affected_components, hash_code, created_at, updated_at, \
     resolved_at, revision";

const COMPONENT_COLUMNS: &str = "component_id, provider, name, current_status, description, \
     position, last_checked_at, last_status_change_at, created_at, updated_at, version";

/// Relational status store backed by SQLite.
///
/// `UNIQUE (incident_id, provider)` and `UNIQUE (component_id, provider)`
/// carry the uniqueness guarantees; constraint violations surface as
/// [`AppError::PersistenceConflict`].
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) a database file and apply migrations
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut conn = Connection::open(path.as_ref())?;
        migrate(&mut conn)?;
        tracing::info!(path = ?path.as_ref(), "Initialized SQLite store");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        r#"
      CREATE TABLE IF NOT EXISTS _migrations (
        name TEXT PRIMARY KEY NOT NULL,
        applied_at TEXT NOT NULL
      );
    "#,
    )?;

    for (name, sql) in migrations() {
        let applied: Option<String> = conn
            .query_row("SELECT name FROM _migrations WHERE name = ?1", [name], |row| row.get(0))
            .optional()?;
        if applied.is_some() {
            continue;
        }

        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.execute(
            "INSERT INTO _migrations (name, applied_at) VALUES (?1, ?2)",
            params![name, ts(&Utc::now())],
        )?;
        tx.commit()?;
        tracing::info!(migration = name, "Applied migration");
    }
    Ok(())
}

/// Fixed-width RFC 3339 so lexical order matches chronological order
fn ts(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::Database(format!("invalid timestamp '{}': {}", raw, e)))
}

fn parse_opt_ts(raw: Option<String>) -> Result<Option<DateTime<Utc>>> {
    raw.as_deref().map(parse_ts).transpose()
}

fn parse_enum<T: FromStr>(raw: &str, what: &str) -> Result<T> {
    T::from_str(raw).map_err(|_| AppError::Database(format!("invalid {} '{}'", what, raw)))
}

/// Raw incident row; converted outside the rusqlite closure
struct IncidentRow {
    incident_id: String,
    provider: String,
    service_name: String,
    status: String,
    message: String,
    severity: String,
    url: Option<String>,
    affected_components: String,
    hash_code: String,
    created_at: String,
    updated_at: String,
    resolved_at: Option<String>,
    revision: i64,
}

impl IncidentRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            incident_id: row.get(0)?,
            provider: row.get(1)?,
            service_name: row.get(2)?,
            status: row.get(3)?,
            message: row.get(4)?,
            severity: row.get(5)?,
            url: row.get(6)?,
            affected_components: row.get(7)?,
            hash_code: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
            resolved_at: row.get(11)?,
            revision: row.get(12)?,
        })
    }

    fn into_record(self) -> Result<IncidentRecord> {
        Ok(IncidentRecord {
            service_id: self.incident_id,
            provider: self.provider,
            service_name: self.service_name,
            status: parse_enum::<IncidentStatus>(&self.status, "status")?,
            message: self.message,
            severity: parse_enum::<Severity>(&self.severity, "severity")?,
            url: self.url,
            affected_components: serde_json::from_str(&self.affected_components)?,
            content_fingerprint: self.hash_code,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
            resolved_at: parse_opt_ts(self.resolved_at)?,
            revision: self.revision as u64,
        })
    }
}

struct ChangeRow {
    id: String,
    service_id: String,
    service_name: String,
    provider: String,
    previous_status: String,
    current_status: String,
    change_reason: Option<String>,
    changed_at: String,
}

impl ChangeRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            service_id: row.get(1)?,
            service_name: row.get(2)?,
            provider: row.get(3)?,
            previous_status: row.get(4)?,
            current_status: row.get(5)?,
            change_reason: row.get(6)?,
            changed_at: row.get(7)?,
        })
    }

    fn into_record(self) -> Result<StatusChangeRecord> {
        Ok(StatusChangeRecord {
            id: Uuid::parse_str(&self.id)
                .map_err(|e| AppError::Database(format!("invalid audit id: {}", e)))?,
            service_id: self.service_id,
            service_name: self.service_name,
            provider: self.provider,
            previous_status: parse_enum::<IncidentStatus>(&self.previous_status, "status")?,
            current_status: parse_enum::<IncidentStatus>(&self.current_status, "status")?,
            change_reason: self.change_reason,
            changed_at: parse_ts(&self.changed_at)?,
        })
    }
}

struct ComponentRow {
    component_id: String,
    provider: String,
    name: String,
    current_status: String,
    description: Option<String>,
    position: Option<i64>,
    last_checked_at: String,
    last_status_change_at: Option<String>,
    created_at: String,
    updated_at: String,
    version: i64,
}

impl ComponentRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            component_id: row.get(0)?,
            provider: row.get(1)?,
            name: row.get(2)?,
            current_status: row.get(3)?,
            description: row.get(4)?,
            position: row.get(5)?,
            last_checked_at: row.get(6)?,
            last_status_change_at: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
            version: row.get(10)?,
        })
    }

    fn into_record(self) -> Result<ComponentRecord> {
        Ok(ComponentRecord {
            component_id: self.component_id,
            provider: self.provider,
            name: self.name,
            current_status: ComponentStatus::parse_lenient(&self.current_status),
            description: self.description,
            position: self.position,
            last_checked_at: parse_ts(&self.last_checked_at)?,
            last_status_change_at: parse_opt_ts(self.last_status_change_at)?,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
            version: self.version as u64,
        })
    }
}

fn collect<T, R>(rows: Vec<T>, convert: impl Fn(T) -> Result<R>) -> Result<Vec<R>> {
    rows.into_iter().map(convert).collect()
}

#[async_trait]
impl StatusStore for SqliteStore {
    async fn find_incident(&self, key: &IncidentKey) -> Result<Option<IncidentRecord>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM incident_logs WHERE incident_id = ?1 AND provider = ?2",
                    INCIDENT_COLUMNS
                ),
                params![key.service_id, key.provider],
                IncidentRow::from_row,
            )
            .optional()?;
        row.map(IncidentRow::into_record).transpose()
    }

    async fn insert_incident(&self, record: &IncidentRecord) -> Result<()> {
        let conn = self.conn.lock();
        let components = serde_json::to_string(&record.affected_components)?;
        let inserted = conn.execute(
            &format!(
                "INSERT INTO incident_logs ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                INCIDENT_COLUMNS
            ),
            params![
                record.service_id,
                record.provider,
                record.service_name,
                record.status.as_str(),
                record.message,
                record.severity.as_str(),
                record.url,
                components,
                record.content_fingerprint,
                ts(&record.created_at),
                ts(&record.updated_at),
                record.resolved_at.as_ref().map(ts),
                record.revision as i64,
            ],
        );

        match inserted {
            Ok(_) => Ok(()),
            Err(e) => match AppError::from(e) {
                AppError::PersistenceConflict(_) => Err(incident_conflict(&record.key())),
                other => Err(other),
            },
        }
    }

    async fn commit_transition(
        &self,
        record: &IncidentRecord,
        expected_revision: u64,
        change: &StatusChangeRecord,
    ) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let updated = tx.execute(
            "UPDATE incident_logs
                SET status = ?1, status_message = ?2, hash_code = ?3, updated_at = ?4,
                    resolved_at = ?5, revision = ?6
              WHERE incident_id = ?7 AND provider = ?8 AND revision = ?9",
            params![
                record.status.as_str(),
                record.message,
                record.content_fingerprint,
                ts(&record.updated_at),
                record.resolved_at.as_ref().map(ts),
                record.revision as i64,
                record.service_id,
                record.provider,
                expected_revision as i64,
            ],
        )?;

        if updated == 0 {
            // Dropping the transaction rolls it back.
            return Err(revision_conflict(&record.key(), expected_revision));
        }

        tx.execute(
            "INSERT INTO status_change_logs
                (id, service_id, service_name, provider, previous_status, current_status,
                 change_reason, changed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                change.id.to_string(),
                change.service_id,
                change.service_name,
                change.provider,
                change.previous_status.as_str(),
                change.current_status.as_str(),
                change.change_reason,
                ts(&change.changed_at),
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    async fn list_active(&self) -> Result<Vec<IncidentRecord>> {
        let rows = {
            let conn = self.conn.lock();
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM incident_logs WHERE status != 'resolved' ORDER BY updated_at DESC",
                INCIDENT_COLUMNS
            ))?;
            let rows = stmt
                .query_map([], IncidentRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };
        collect(rows, IncidentRow::into_record)
    }

    async fn list_updated_since(
        &self,
        provider: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<IncidentRecord>> {
        let rows = {
            let conn = self.conn.lock();
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM incident_logs WHERE provider = ?1 AND updated_at >= ?2 ORDER BY updated_at DESC",
                INCIDENT_COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![provider, ts(&since)], IncidentRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };
        collect(rows, IncidentRow::into_record)
    }

    async fn count_incidents(&self) -> Result<u64> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM incident_logs", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    async fn status_changes(
        &self,
        service_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<StatusChangeRecord>> {
        let rows = {
            let conn = self.conn.lock();
            let mut stmt = conn.prepare(
                "SELECT id, service_id, service_name, provider, previous_status, current_status, change_reason, changed_at
                   FROM status_change_logs
                  WHERE service_id = ?1 AND changed_at >= ?2
                  ORDER BY changed_at ASC",
            )?;
            let rows = stmt
                .query_map(params![service_id, ts(&since)], ChangeRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };
        collect(rows, ChangeRow::into_record)
    }

    async fn status_changes_for_provider(&self, provider: &str) -> Result<Vec<StatusChangeRecord>> {
        let rows = {
            let conn = self.conn.lock();
            let mut stmt = conn.prepare(
                "SELECT id, service_id, service_name, provider, previous_status, current_status, change_reason, changed_at
                   FROM status_change_logs
                  WHERE provider = ?1
                  ORDER BY changed_at DESC",
            )?;
            let rows = stmt
                .query_map(params![provider], ChangeRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };
        collect(rows, ChangeRow::into_record)
    }

    async fn find_component(
        &self,
        provider: &str,
        component_id: &str,
    ) -> Result<Option<ComponentRecord>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM component_registry WHERE component_id = ?1 AND provider = ?2",
                    COMPONENT_COLUMNS
                ),
                params![component_id, provider],
                ComponentRow::from_row,
            )
            .optional()?;
        row.map(ComponentRow::into_record).transpose()
    }

    async fn insert_component(&self, record: &ComponentRecord) -> Result<()> {
        let conn = self.conn.lock();
        let inserted = conn.execute(
            &format!(
                "INSERT INTO component_registry ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                COMPONENT_COLUMNS
            ),
            params![
                record.component_id,
                record.provider,
                record.name,
                record.current_status.to_string(),
                record.description,
                record.position,
                ts(&record.last_checked_at),
                record.last_status_change_at.as_ref().map(ts),
                ts(&record.created_at),
                ts(&record.updated_at),
                record.version as i64,
            ],
        );
        match inserted {
            Ok(_) => Ok(()),
            Err(e) => match AppError::from(e) {
                AppError::PersistenceConflict(_) => {
                    Err(component_conflict(&record.provider, &record.component_id))
                }
                other => Err(other),
            },
        }
    }

    async fn update_component(&self, record: &ComponentRecord, expected_version: u64) -> Result<()> {
        let conn = self.conn.lock();
        let updated = conn.execute(
            "UPDATE component_registry
                SET name = ?1, current_status = ?2, description = ?3, position = ?4,
                    last_checked_at = ?5, last_status_change_at = ?6, updated_at = ?7, version = ?8
              WHERE component_id = ?9 AND provider = ?10 AND version = ?11",
            params![
                record.name,
                record.current_status.to_string(),
                record.description,
                record.position,
                ts(&record.last_checked_at),
                record.last_status_change_at.as_ref().map(ts),
                ts(&record.updated_at),
                record.version as i64,
                record.component_id,
                record.provider,
                expected_version as i64,
            ],
        )?;
        if updated == 0 {
            return Err(component_conflict(&record.provider, &record.component_id));
        }
        Ok(())
    }

    async fn list_components(&self, provider: &str) -> Result<Vec<ComponentRecord>> {
        let rows = {
            let conn = self.conn.lock();
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM component_registry WHERE provider = ?1",
                COMPONENT_COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![provider], ComponentRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };
        let mut components = collect(rows, ComponentRow::into_record)?;
        sort_by_position(&mut components);
        Ok(components)
    }

    async fn list_degraded_components(&self) -> Result<Vec<ComponentRecord>> {
        let rows = {
            let conn = self.conn.lock();
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM component_registry
                  WHERE current_status NOT IN ('operational', 'under_maintenance')
                  ORDER BY updated_at DESC",
                COMPONENT_COLUMNS
            ))?;
            let rows = stmt
                .query_map([], ComponentRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };
        collect(rows, ComponentRow::into_record)
    }

    async fn delete_stale_components(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn.lock();
        let removed = conn.execute(
            "DELETE FROM component_registry WHERE current_status = 'operational' AND last_checked_at < ?1",
            params![ts(&cutoff)],
        )?;
        Ok(removed)
    }

    async fn health_check(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }
}
