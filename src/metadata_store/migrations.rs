//! Numbered, append-only schema migrations (SPEC_FULL.md §4.2).
//!
//! Applied in order inside one transaction at startup; each applied version
//! is recorded in `schema_migrations`. Generalizes the teacher's single-step
//! `PRAGMA user_version` gate (`docstore.rs::init_db`) to N steps.

use rusqlite::Connection;

use crate::error::AppError;

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "initial schema",
        sql: r#"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS runs (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                scope_json TEXT NOT NULL,
                status TEXT NOT NULL,
                started_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                last_document_id TEXT,
                discovered_count INTEGER NOT NULL DEFAULT 0,
                indexed_count INTEGER NOT NULL DEFAULT 0,
                stop_requested INTEGER NOT NULL DEFAULT 0,
                is_discovering INTEGER NOT NULL DEFAULT 1,
                is_indexing INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS document_parts (
                document_part_id TEXT PRIMARY KEY,
                checksum TEXT NOT NULL,
                kind TEXT NOT NULL,
                source_instance_id TEXT NOT NULL,
                device_id TEXT NOT NULL,
                source_path TEXT NOT NULL,
                metadata_json TEXT NOT NULL,
                last_indexed_run_id TEXT,
                chunk_ids_json TEXT,
                unit_locator TEXT NOT NULL,
                content_type TEXT NOT NULL,
                extractor_name TEXT NOT NULL,
                extractor_version TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                last_indexed_at TEXT,
                scope_json TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS document_parts_queue (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                run_id TEXT NOT NULL,
                document_part_id TEXT NOT NULL,
                checksum TEXT NOT NULL,
                kind TEXT NOT NULL,
                source_instance_id TEXT NOT NULL,
                device_id TEXT NOT NULL,
                source_path TEXT NOT NULL,
                metadata_json TEXT NOT NULL,
                unit_locator TEXT NOT NULL,
                content_type TEXT NOT NULL,
                extractor_name TEXT NOT NULL,
                extractor_version TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                text TEXT NOT NULL,
                scope_json TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS monitored_sources (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                locator TEXT NOT NULL,
                scope_json TEXT NOT NULL UNIQUE,
                last_seen_fingerprint TEXT,
                last_checked_at TEXT,
                last_ingested_at TEXT,
                enabled INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_queue_run_id ON document_parts_queue(run_id, id);
            CREATE INDEX IF NOT EXISTS idx_parts_scope ON document_parts(scope_json);
        "#,
    },
    Migration {
        version: 2,
        name: "index last_indexed_run_id for staleness queries",
        sql: r#"
            CREATE INDEX IF NOT EXISTS idx_parts_last_indexed_run
                ON document_parts(last_indexed_run_id);
        "#,
    },
];

pub fn run_migrations(conn: &mut Connection) -> Result<(), AppError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (version INTEGER PRIMARY KEY, applied_at TEXT NOT NULL);",
    )?;

    let current: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_migrations", [], |r| r.get(0))
        .unwrap_or(0);

    let tx = conn.transaction()?;
    for migration in MIGRATIONS {
        if migration.version <= current {
            continue;
        }
        tx.execute_batch(migration.sql)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            rusqlite::params![migration.version, crate::domain::now_iso8601()],
        )?;
        tracing::info!(version = migration.version, name = migration.name, "applied migration");
    }
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();
        run_migrations(&mut conn).unwrap();
        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, 2);
    }

    #[test]
    fn all_tables_exist_after_migration() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();
        for table in ["runs", "document_parts", "document_parts_queue", "monitored_sources"] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |r| r.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "table {table} should exist");
        }
    }
}
