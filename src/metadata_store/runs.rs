//! Run table operations, grounded on
//! `original_source/storage/metadata_db/indexing_runs.py` and
//! `original_source/api/app/routes/runs.py`.

use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::domain::{now_iso8601, Run, RunStatus};
use crate::error::AppError;

use super::MetadataStore;

fn row_to_run(row: &rusqlite::Row) -> rusqlite::Result<Run> {
    let status_str: String = row.get("status")?;
    Ok(Run {
        id: row.get("id")?,
        kind: row.get("kind")?,
        scope_json: row.get("scope_json")?,
        status: RunStatus::parse(&status_str).unwrap_or(RunStatus::Failed),
        started_at: row.get("started_at")?,
        updated_at: row.get("updated_at")?,
        last_document_id: row.get("last_document_id")?,
        discovered_count: row.get::<_, i64>("discovered_count")? as u64,
        indexed_count: row.get::<_, i64>("indexed_count")? as u64,
        stop_requested: row.get::<_, i64>("stop_requested")? != 0,
        is_discovering: row.get::<_, i64>("is_discovering")? != 0,
        is_indexing: row.get::<_, i64>("is_indexing")? != 0,
    })
}

impl MetadataStore {
    /// Create a `running` run with zero counters, `is_discovering=true`,
    /// `is_indexing=false`, `stop_requested=false` — per §4.8 `create`.
    pub fn create_run(&self, kind: &str, scope_json: &str) -> Result<Run, AppError> {
        let id = Uuid::new_v4().to_string();
        let now = now_iso8601();
        let conn = self.lock();
        conn.execute(
            "INSERT INTO runs (id, kind, scope_json, status, started_at, updated_at,
                                last_document_id, discovered_count, indexed_count,
                                stop_requested, is_discovering, is_indexing)
             VALUES (?1, ?2, ?3, 'running', ?4, ?4, NULL, 0, 0, 0, 1, 0)",
            params![id, kind, scope_json, now],
        )?;
        Ok(Run {
            id,
            kind: kind.to_string(),
            scope_json: scope_json.to_string(),
            status: RunStatus::Running,
            started_at: now.clone(),
            updated_at: now,
            last_document_id: None,
            discovered_count: 0,
            indexed_count: 0,
            stop_requested: false,
            is_discovering: true,
            is_indexing: false,
        })
    }

    pub fn load_run_by_id(&self, run_id: &str) -> Result<Option<Run>, AppError> {
        let conn = self.lock();
        conn.query_row("SELECT * FROM runs WHERE id = ?1", params![run_id], row_to_run)
            .optional()
            .map_err(AppError::from)
    }

    pub fn load_latest_by_kind(&self, kind: &str) -> Result<Option<Run>, AppError> {
        let conn = self.lock();
        conn.query_row(
            "SELECT * FROM runs WHERE kind = ?1 AND status NOT IN ('completed', 'failed')
             ORDER BY started_at DESC LIMIT 1",
            params![kind],
            row_to_run,
        )
        .optional()
        .map_err(AppError::from)
    }

    pub fn load_latest_interrupted_by_kind(&self, kind: &str) -> Result<Option<Run>, AppError> {
        let conn = self.lock();
        conn.query_row(
            "SELECT * FROM runs WHERE kind = ?1 AND status = 'interrupted'
             ORDER BY started_at DESC LIMIT 1",
            params![kind],
            row_to_run,
        )
        .optional()
        .map_err(AppError::from)
    }

    pub fn list_runs(&self) -> Result<Vec<Run>, AppError> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT * FROM runs ORDER BY started_at DESC")?;
        let rows = stmt.query_map([], row_to_run)?;
        rows.collect::<rusqlite::Result<_>>().map_err(AppError::from)
    }

    pub fn update_status(&self, run_id: &str, status: RunStatus) -> Result<(), AppError> {
        let conn = self.lock();
        conn.execute(
            "UPDATE runs SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), now_iso8601(), run_id],
        )?;
        Ok(())
    }

    /// Idempotent; a no-op on terminal runs (I7).
    pub fn request_stop(&self, run_id: &str) -> Result<(), AppError> {
        let conn = self.lock();
        conn.execute(
            "UPDATE runs SET stop_requested = 1, updated_at = ?2
             WHERE id = ?1 AND status NOT IN ('completed', 'failed')",
            params![run_id, now_iso8601()],
        )?;
        Ok(())
    }

    pub fn is_stop_requested(&self, run_id: &str) -> Result<bool, AppError> {
        let conn = self.lock();
        conn.query_row(
            "SELECT stop_requested FROM runs WHERE id = ?1",
            params![run_id],
            |r| r.get::<_, i64>(0),
        )
        .optional()
        .map(|v| v.map(|v| v != 0).unwrap_or(false))
        .map_err(AppError::from)
    }

    pub fn increment_discovered(&self, run_id: &str) -> Result<(), AppError> {
        let conn = self.lock();
        conn.execute(
            "UPDATE runs SET discovered_count = discovered_count + 1, updated_at = ?2 WHERE id = ?1",
            params![run_id, now_iso8601()],
        )?;
        Ok(())
    }

    pub fn increment_indexed(&self, run_id: &str) -> Result<(), AppError> {
        let conn = self.lock();
        conn.execute(
            "UPDATE runs SET indexed_count = indexed_count + 1, updated_at = ?2 WHERE id = ?1",
            params![run_id, now_iso8601()],
        )?;
        Ok(())
    }

    pub fn set_is_discovering(&self, run_id: &str, value: bool) -> Result<(), AppError> {
        let conn = self.lock();
        conn.execute(
            "UPDATE runs SET is_discovering = ?2, updated_at = ?3 WHERE id = ?1",
            params![run_id, value as i64, now_iso8601()],
        )?;
        Ok(())
    }

    /// Reset an `interrupted` run back to `running` with `stop_requested`
    /// cleared, so the Run Controller can respawn its workers — a no-op on
    /// any run not currently `interrupted`.
    pub fn resume_run(&self, run_id: &str) -> Result<(), AppError> {
        let conn = self.lock();
        conn.execute(
            "UPDATE runs SET status = 'running', stop_requested = 0, updated_at = ?2
             WHERE id = ?1 AND status = 'interrupted'",
            params![run_id, now_iso8601()],
        )?;
        Ok(())
    }

    pub fn set_is_indexing(&self, run_id: &str, value: bool) -> Result<(), AppError> {
        let conn = self.lock();
        conn.execute(
            "UPDATE runs SET is_indexing = ?2, updated_at = ?3 WHERE id = ?1",
            params![run_id, value as i64, now_iso8601()],
        )?;
        Ok(())
    }
}
