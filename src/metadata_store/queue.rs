//! Work queue operations, grounded on
//! `original_source/storage/metadata_db/document_parts_queue.py` (FIFO by
//! auto-increment rowid, as named in SPEC_FULL.md §3/§4.2).

use rusqlite::{params, OptionalExtension};

use crate::domain::{DocumentPart, QueueEntry};
use crate::error::AppError;

use super::MetadataStore;

fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<QueueEntry> {
    Ok(QueueEntry {
        queue_id: row.get("id")?,
        run_id: row.get("run_id")?,
        part: DocumentPart {
            document_part_id: row.get("document_part_id")?,
            checksum: row.get("checksum")?,
            source_type: row.get("kind")?,
            source_instance_id: row.get("source_instance_id")?,
            device_id: row.get("device_id")?,
            source_path: row.get("source_path")?,
            unit_locator: row.get("unit_locator")?,
            content_type: row.get("content_type")?,
            extractor_name: row.get("extractor_name")?,
            extractor_version: row.get("extractor_version")?,
            metadata_json: {
                let s: String = row.get("metadata_json")?;
                serde_json::from_str(&s).unwrap_or_default()
            },
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            text: row.get("text")?,
            scope_json: row.get("scope_json")?,
        },
    })
}

impl MetadataStore {
    pub fn queue_add(&self, run_id: &str, part: &DocumentPart) -> Result<(), AppError> {
        let conn = self.lock();
        let metadata_json = serde_json::to_string(&part.metadata_json)?;
        conn.execute(
            "INSERT INTO document_parts_queue (
                run_id, document_part_id, checksum, kind, source_instance_id, device_id,
                source_path, metadata_json, unit_locator, content_type, extractor_name,
                extractor_version, created_at, updated_at, text, scope_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                run_id,
                part.document_part_id,
                part.checksum,
                part.source_type,
                part.source_instance_id,
                part.device_id,
                part.source_path,
                metadata_json,
                part.unit_locator,
                part.content_type,
                part.extractor_name,
                part.extractor_version,
                part.created_at,
                part.updated_at,
                part.text,
                part.scope_json,
            ],
        )?;
        Ok(())
    }

    /// Oldest queued entry for `run_id`, FIFO by insertion order.
    pub fn queue_next(&self, run_id: &str) -> Result<Option<QueueEntry>, AppError> {
        let conn = self.lock();
        conn.query_row(
            "SELECT * FROM document_parts_queue WHERE run_id = ?1 ORDER BY id ASC LIMIT 1",
            params![run_id],
            row_to_entry,
        )
        .optional()
        .map_err(AppError::from)
    }

    pub fn queue_remove(&self, run_id: &str, document_part_id: &str) -> Result<(), AppError> {
        let conn = self.lock();
        conn.execute(
            "DELETE FROM document_parts_queue WHERE run_id = ?1 AND document_part_id = ?2",
            params![run_id, document_part_id],
        )?;
        Ok(())
    }

    pub fn queue_list(&self, run_id: &str) -> Result<Vec<QueueEntry>, AppError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT * FROM document_parts_queue WHERE run_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![run_id], row_to_entry)?;
        rows.collect::<rusqlite::Result<_>>().map_err(AppError::from)
    }

    pub fn queue_clear(&self, run_id: &str) -> Result<(), AppError> {
        let conn = self.lock();
        conn.execute("DELETE FROM document_parts_queue WHERE run_id = ?1", params![run_id])?;
        Ok(())
    }

    pub fn queue_clear_all(&self) -> Result<(), AppError> {
        let conn = self.lock();
        conn.execute("DELETE FROM document_parts_queue", [])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::now_iso8601;
    use std::collections::HashMap;

    fn sample_part(id: &str) -> DocumentPart {
        DocumentPart {
            document_part_id: id.to_string(),
            checksum: "c1".to_string(),
            source_type: "filesystem".to_string(),
            source_instance_id: "src".to_string(),
            device_id: "dev".to_string(),
            source_path: "/tmp/x".to_string(),
            unit_locator: "filesystem:/tmp/x".to_string(),
            content_type: "text/plain".to_string(),
            extractor_name: "plaintext".to_string(),
            extractor_version: "1.0".to_string(),
            metadata_json: HashMap::new(),
            created_at: now_iso8601(),
            updated_at: now_iso8601(),
            text: "hello".to_string(),
            scope_json: "{}".to_string(),
        }
    }

    #[test]
    fn queue_is_fifo() {
        let store = MetadataStore::open_in_memory().unwrap();
        store.queue_add("run-1", &sample_part("p1")).unwrap();
        store.queue_add("run-1", &sample_part("p2")).unwrap();

        let first = store.queue_next("run-1").unwrap().unwrap();
        assert_eq!(first.part.document_part_id, "p1");
        store.queue_remove("run-1", "p1").unwrap();

        let second = store.queue_next("run-1").unwrap().unwrap();
        assert_eq!(second.part.document_part_id, "p2");
    }

    #[test]
    fn queue_next_empty_returns_none() {
        let store = MetadataStore::open_in_memory().unwrap();
        assert!(store.queue_next("run-x").unwrap().is_none());
    }

    #[test]
    fn queue_isolated_per_run() {
        let store = MetadataStore::open_in_memory().unwrap();
        store.queue_add("run-1", &sample_part("p1")).unwrap();
        assert!(store.queue_next("run-2").unwrap().is_none());
    }
}
