//! Document part operations, grounded on
//! `original_source/storage/metadata_db/document_parts.py`.

use std::collections::HashMap;

use rusqlite::{params, OptionalExtension};

use crate::domain::{now_iso8601, DocumentPart};
use crate::error::AppError;

use super::MetadataStore;

/// A stored part row, carrying indexing state absent from a freshly-extracted
/// [`DocumentPart`] (chunk ids, last-indexed run).
#[derive(Debug, Clone)]
pub struct StoredPart {
    pub part: DocumentPart,
    pub last_indexed_run_id: Option<String>,
    pub chunk_ids: Option<Vec<String>>,
    pub last_indexed_at: Option<String>,
}

fn row_to_stored_part(row: &rusqlite::Row) -> rusqlite::Result<StoredPart> {
    let metadata_json: String = row.get("metadata_json")?;
    let metadata: HashMap<String, String> = serde_json::from_str(&metadata_json).unwrap_or_default();
    let chunk_ids_json: Option<String> = row.get("chunk_ids_json")?;
    let chunk_ids = chunk_ids_json
        .as_deref()
        .and_then(|s| serde_json::from_str::<Vec<String>>(s).ok());

    Ok(StoredPart {
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
            metadata_json: metadata,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            text: String::new(),
            scope_json: row.get("scope_json")?,
        },
        last_indexed_run_id: row.get("last_indexed_run_id")?,
        chunk_ids,
        last_indexed_at: row.get("last_indexed_at")?,
    })
}

impl MetadataStore {
    /// Insert a brand-new part row with no chunk ids yet, or update the
    /// metadata/extractor fields of an existing row — `last_indexed_run_id`
    /// and `chunk_ids_json` are only ever set by [`Self::mark_document_part_processed`].
    pub fn upsert_document_part(&self, part: &DocumentPart) -> Result<(), AppError> {
        let conn = self.lock();
        let metadata_json = serde_json::to_string(&part.metadata_json)?;
        conn.execute(
            "INSERT INTO document_parts (
                document_part_id, checksum, kind, source_instance_id, device_id,
                source_path, metadata_json, last_indexed_run_id, chunk_ids_json,
                unit_locator, content_type, extractor_name, extractor_version,
                created_at, updated_at, last_indexed_at, scope_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, NULL, ?8, ?9, ?10, ?11, ?12, ?12, NULL, ?13)
            ON CONFLICT(document_part_id) DO UPDATE SET
                checksum = excluded.checksum,
                kind = excluded.kind,
                source_instance_id = excluded.source_instance_id,
                device_id = excluded.device_id,
                source_path = excluded.source_path,
                metadata_json = excluded.metadata_json,
                unit_locator = excluded.unit_locator,
                content_type = excluded.content_type,
                extractor_name = excluded.extractor_name,
                extractor_version = excluded.extractor_version,
                updated_at = excluded.updated_at,
                scope_json = excluded.scope_json",
            params![
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
                now_iso8601(),
                part.scope_json,
            ],
        )?;
        Ok(())
    }

    pub fn get_document_part_by_id(&self, id: &str) -> Result<Option<StoredPart>, AppError> {
        let conn = self.lock();
        conn.query_row(
            "SELECT * FROM document_parts WHERE document_part_id = ?1",
            params![id],
            row_to_stored_part,
        )
        .optional()
        .map_err(AppError::from)
    }

    /// Mark a part processed for `run_id`. If `chunk_ids` is `None` (the skip
    /// path, §4.7), `last_indexed_run_id`/`last_indexed_at` still advance —
    /// resolving Open Question (a): a skip counts as "processed by this run".
    pub fn mark_document_part_processed(
        &self,
        run_id: &str,
        document_part_id: &str,
        chunk_ids: Option<&[String]>,
    ) -> Result<(), AppError> {
        let conn = self.lock();
        let now = now_iso8601();
        match chunk_ids {
            Some(ids) => {
                let json = serde_json::to_string(ids)?;
                conn.execute(
                    "UPDATE document_parts SET last_indexed_run_id = ?2, chunk_ids_json = ?3,
                        last_indexed_at = ?4, updated_at = ?4 WHERE document_part_id = ?1",
                    params![document_part_id, run_id, json, now],
                )?;
            }
            None => {
                conn.execute(
                    "UPDATE document_parts SET last_indexed_run_id = ?2,
                        last_indexed_at = ?3, updated_at = ?3 WHERE document_part_id = ?1",
                    params![document_part_id, run_id, now],
                )?;
            }
        }
        Ok(())
    }

    /// Parts whose `scope_json` equals `run`'s scope but whose
    /// `last_indexed_run_id` differs — stale in this run's scope (I5),
    /// grounded on `document_parts.py::get_stale_parts`.
    pub fn get_stale_parts(&self, run_id: &str, scope_json: &str) -> Result<Vec<(String, Vec<String>)>, AppError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT document_part_id, chunk_ids_json FROM document_parts
             WHERE scope_json = ?1 AND last_indexed_run_id IS NOT NULL AND last_indexed_run_id != ?2",
        )?;
        let rows = stmt.query_map(params![scope_json, run_id], |row| {
            let id: String = row.get(0)?;
            let chunk_ids_json: Option<String> = row.get(1)?;
            Ok((id, chunk_ids_json))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, chunk_ids_json) = row?;
            let chunk_ids: Vec<String> = chunk_ids_json
                .as_deref()
                .and_then(|s| serde_json::from_str(s).ok())
                .unwrap_or_default();
            out.push((id, chunk_ids));
        }
        Ok(out)
    }

    pub fn remove_document_parts_by_id(&self, ids: &[String]) -> Result<(), AppError> {
        if ids.is_empty() {
            return Ok(());
        }
        let conn = self.lock();
        let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!("DELETE FROM document_parts WHERE document_part_id IN ({placeholders})");
        let params_vec: Vec<&dyn rusqlite::ToSql> = ids.iter().map(|s| s as &dyn rusqlite::ToSql).collect();
        conn.execute(&sql, params_vec.as_slice())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn sample_part(id: &str) -> DocumentPart {
        DocumentPart {
            document_part_id: id.to_string(),
            checksum: "checksum-1".to_string(),
            source_type: "filesystem".to_string(),
            source_instance_id: "src-1".to_string(),
            device_id: "dev-1".to_string(),
            source_path: "/tmp/a.txt".to_string(),
            unit_locator: "filesystem:/tmp/a.txt".to_string(),
            content_type: "text/plain".to_string(),
            extractor_name: "plaintext".to_string(),
            extractor_version: "1.0".to_string(),
            metadata_json: HashMap::new(),
            created_at: now_iso8601(),
            updated_at: now_iso8601(),
            text: "hello".to_string(),
            scope_json: "{\"kind\":\"filesystem\"}".to_string(),
        }
    }

    #[test]
    fn upsert_then_get_round_trips() {
        let store = MetadataStore::open_in_memory().unwrap();
        let part = sample_part("part-1");
        store.upsert_document_part(&part).unwrap();
        let stored = store.get_document_part_by_id("part-1").unwrap().unwrap();
        assert_eq!(stored.part.checksum, "checksum-1");
        assert!(stored.chunk_ids.is_none());
        assert!(stored.last_indexed_run_id.is_none());
    }

    #[test]
    fn mark_processed_without_chunk_ids_still_advances_last_indexed_run() {
        let store = MetadataStore::open_in_memory().unwrap();
        let part = sample_part("part-1");
        store.upsert_document_part(&part).unwrap();
        store.mark_document_part_processed("run-1", "part-1", None).unwrap();
        let stored = store.get_document_part_by_id("part-1").unwrap().unwrap();
        assert_eq!(stored.last_indexed_run_id.as_deref(), Some("run-1"));
        assert!(stored.chunk_ids.is_none());
        assert!(stored.last_indexed_at.is_some());
    }

    #[test]
    fn mark_processed_with_chunk_ids_records_them() {
        let store = MetadataStore::open_in_memory().unwrap();
        let part = sample_part("part-1");
        store.upsert_document_part(&part).unwrap();
        let ids = vec!["c1".to_string(), "c2".to_string()];
        store.mark_document_part_processed("run-1", "part-1", Some(&ids)).unwrap();
        let stored = store.get_document_part_by_id("part-1").unwrap().unwrap();
        assert_eq!(stored.chunk_ids, Some(ids));
    }

    #[test]
    fn get_stale_parts_excludes_matching_run_and_never_indexed() {
        let store = MetadataStore::open_in_memory().unwrap();
        let scope = "{\"kind\":\"filesystem\"}";

        let mut never_indexed = sample_part("never");
        never_indexed.scope_json = scope.to_string();
        store.upsert_document_part(&never_indexed).unwrap();

        let mut owned = sample_part("owned");
        owned.scope_json = scope.to_string();
        store.upsert_document_part(&owned).unwrap();
        store.mark_document_part_processed("run-current", "owned", Some(&["c1".to_string()])).unwrap();

        let mut stale = sample_part("stale");
        stale.scope_json = scope.to_string();
        store.upsert_document_part(&stale).unwrap();
        store.mark_document_part_processed("run-old", "stale", Some(&["c2".to_string()])).unwrap();

        let result = store.get_stale_parts("run-current", scope).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].0, "stale");
        assert_eq!(result[0].1, vec!["c2".to_string()]);
    }

    #[test]
    fn remove_document_parts_by_id_deletes_rows() {
        let store = MetadataStore::open_in_memory().unwrap();
        store.upsert_document_part(&sample_part("p1")).unwrap();
        store.remove_document_parts_by_id(&["p1".to_string()]).unwrap();
        assert!(store.get_document_part_by_id("p1").unwrap().is_none());
    }
}
