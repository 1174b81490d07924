//! Durable, single-writer-per-row relational store for runs, document parts,
//! the work queue, and monitored sources (SPEC_FULL.md §4.2).
//!
//! Storage is SQLite via `rusqlite`, the same crate and pragma set the
//! teacher's docstore uses (`docstore_core.rs::open_conn`): WAL journaling,
//! foreign keys on, a busy timeout so concurrent readers/writers back off
//! instead of erroring immediately.

mod migrations;
mod parts;
mod queue;
mod runs;
mod sources;

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::Connection;

use crate::error::AppError;

pub const DB_FILENAME: &str = "metadata.db";

/// Thread-safe handle to the metadata database. Methods lock an internal
/// mutex around the connection for the duration of one statement or
/// transaction — mirroring the "single-writer-per-row" policy in SPEC_FULL.md
/// §5 without requiring a connection pool for a single embedded file.
pub struct MetadataStore {
    conn: Mutex<Connection>,
}

fn open_conn(db_path: &Path) -> Result<Connection, AppError> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;",
    )?;
    Ok(conn)
}

impl MetadataStore {
    /// Open (creating if absent) the metadata database under `data_dir` and
    /// apply any pending migrations.
    pub fn open(data_dir: &Path) -> Result<Self, AppError> {
        std::fs::create_dir_all(data_dir)?;
        let db_path = data_dir.join(DB_FILENAME);
        let mut conn = open_conn(&db_path)?;
        migrations::run_migrations(&mut conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// In-memory store for tests — same schema, no file on disk.
    pub fn open_in_memory() -> Result<Self, AppError> {
        let mut conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migrations::run_migrations(&mut conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn db_path(data_dir: &Path) -> PathBuf {
        data_dir.join(DB_FILENAME)
    }
}
