//! Monitored-source catalogue operations (SPEC_FULL.md §4.9).

use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::domain::{now_iso8601, MonitoredSource};
use crate::error::AppError;

use super::MetadataStore;

fn row_to_source(row: &rusqlite::Row) -> rusqlite::Result<MonitoredSource> {
    Ok(MonitoredSource {
        id: row.get("id")?,
        kind: row.get("kind")?,
        locator: row.get("locator")?,
        scope_json: row.get("scope_json")?,
        last_seen_fingerprint: row.get("last_seen_fingerprint")?,
        last_checked_at: row.get("last_checked_at")?,
        last_ingested_at: row.get("last_ingested_at")?,
        enabled: row.get::<_, i64>("enabled")? != 0,
        created_at: row.get("created_at")?,
    })
}

impl MetadataStore {
    /// Insert a new monitored source. Uniqueness on `scope_json` is enforced
    /// by the table's UNIQUE constraint; a duplicate registration surfaces as
    /// [`AppError::Conflict`].
    pub fn add_monitored_source(&self, kind: &str, locator: &str, scope_json: &str) -> Result<MonitoredSource, AppError> {
        let id = Uuid::new_v4().to_string();
        let now = now_iso8601();
        let conn = self.lock();
        conn.execute(
            "INSERT INTO monitored_sources (id, kind, locator, scope_json, enabled, created_at)
             VALUES (?1, ?2, ?3, ?4, 1, ?5)",
            params![id, kind, locator, scope_json, now],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(ref sql_err, _)
                if sql_err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                AppError::Conflict(format!("monitored source with scope {scope_json} already exists"))
            }
            other => AppError::from(other),
        })?;
        Ok(MonitoredSource {
            id,
            kind: kind.to_string(),
            locator: locator.to_string(),
            scope_json: scope_json.to_string(),
            last_seen_fingerprint: None,
            last_checked_at: None,
            last_ingested_at: None,
            enabled: true,
            created_at: now,
        })
    }

    pub fn get_monitored_source(&self, id: &str) -> Result<Option<MonitoredSource>, AppError> {
        let conn = self.lock();
        conn.query_row("SELECT * FROM monitored_sources WHERE id = ?1", params![id], row_to_source)
            .optional()
            .map_err(AppError::from)
    }

    pub fn list_monitored_sources(&self) -> Result<Vec<MonitoredSource>, AppError> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT * FROM monitored_sources ORDER BY created_at ASC")?;
        let rows = stmt.query_map([], row_to_source)?;
        rows.collect::<rusqlite::Result<_>>().map_err(AppError::from)
    }

    pub fn touch_monitored_source_checked(&self, id: &str) -> Result<(), AppError> {
        let conn = self.lock();
        conn.execute(
            "UPDATE monitored_sources SET last_checked_at = ?2 WHERE id = ?1",
            params![id, now_iso8601()],
        )?;
        Ok(())
    }

    pub fn touch_monitored_source_ingested(&self, id: &str) -> Result<(), AppError> {
        let conn = self.lock();
        conn.execute(
            "UPDATE monitored_sources SET last_ingested_at = ?2 WHERE id = ?1",
            params![id, now_iso8601()],
        )?;
        Ok(())
    }

    pub fn set_monitored_source_enabled(&self, id: &str, enabled: bool) -> Result<(), AppError> {
        let conn = self.lock();
        conn.execute(
            "UPDATE monitored_sources SET enabled = ?2 WHERE id = ?1",
            params![id, enabled as i64],
        )?;
        Ok(())
    }

    pub fn delete_monitored_source(&self, id: &str) -> Result<(), AppError> {
        let conn = self.lock();
        conn.execute("DELETE FROM monitored_sources WHERE id = ?1", params![id])?;
        Ok(())
    }
}
