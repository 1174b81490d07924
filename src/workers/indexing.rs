//! Indexing Worker (SPEC_FULL.md §4.7), grounded line-for-line on
//! `original_source/api/app/routes/runs.py::run_indexing_process` for the
//! outer loop and `original_source/api/app/routes/ingest.py::ingest_document_part`
//! for the skip/reprocess/fresh decision.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::chunking::Chunker;
use crate::domain::RunStatus;
use crate::embeddings::EmbeddingProvider;
use crate::error::AppError;
use crate::metadata_store::MetadataStore;
use crate::runtime::{Component, ComponentFuture};
use crate::vector_store::VectorStore;

/// Parts processed between `release_resources()` calls — the Rust analogue
/// of the original's periodic `torch.cuda.empty_cache()` cadence.
const RELEASE_EVERY: u64 = 50;

/// Queue empty + still discovering: how long to sleep before polling again.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

const MAX_ADD_RETRIES: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(20);

pub struct IndexingWorker {
    run_id: String,
    store: Arc<MetadataStore>,
    vector_store: Arc<dyn VectorStore>,
    chunker: Arc<dyn Chunker>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl IndexingWorker {
    pub fn new(
        run_id: String,
        store: Arc<MetadataStore>,
        vector_store: Arc<dyn VectorStore>,
        chunker: Arc<dyn Chunker>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self { run_id, store, vector_store, chunker, embedder }
    }
}

impl Component for IndexingWorker {
    fn id(&self) -> &str {
        "indexing-worker"
    }

    fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture {
        Box::pin(run_indexing(
            self.run_id,
            self.store,
            self.vector_store,
            self.chunker,
            self.embedder,
            shutdown,
        ))
    }
}

async fn run_indexing(
    run_id: String,
    store: Arc<MetadataStore>,
    vector_store: Arc<dyn VectorStore>,
    chunker: Arc<dyn Chunker>,
    embedder: Arc<dyn EmbeddingProvider>,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    info!(run_id = %run_id, "indexing started");
    let mut processed_count: u64 = 0;

    loop {
        if shutdown.is_cancelled() || store.is_stop_requested(&run_id)? {
            store.update_status(&run_id, RunStatus::Interrupted)?;
            info!(run_id = %run_id, "indexing run interrupted by stop request");
            embedder.release_resources();
            return Ok(());
        }

        let entry = store.queue_next(&run_id)?;
        let entry = match entry {
            Some(entry) => entry,
            None => {
                let run = store
                    .load_run_by_id(&run_id)?
                    .ok_or_else(|| AppError::NotFound(format!("run {run_id} not found")))?;
                if !run.is_discovering {
                    cleanup(&run_id, &store, vector_store.as_ref())?;
                    store.update_status(&run_id, RunStatus::Completed)?;
                    info!(run_id = %run_id, "indexing run completed");
                    return Ok(());
                }
                tokio::time::sleep(POLL_INTERVAL).await;
                continue;
            }
        };

        process_entry(
            &run_id,
            &store,
            vector_store.as_ref(),
            chunker.as_ref(),
            embedder.as_ref(),
            &entry.part,
        )
        .await?;
        store.queue_remove(&run_id, &entry.part.document_part_id)?;

        processed_count += 1;
        if processed_count % RELEASE_EVERY == 0 {
            debug!(run_id = %run_id, processed_count, "releasing embedder resources");
            embedder.release_resources();
        }
    }
}

/// Skip/reprocess/fresh decision per SPEC_FULL.md §4.7. `pub(crate)` so the
/// `/ingest/document_part` HTTP route (§6) can drive the exact same decision
/// logic for a directly-pushed part, outside the queue-driven loop above.
pub async fn process_entry(
    run_id: &str,
    store: &MetadataStore,
    vector_store: &dyn VectorStore,
    chunker: &dyn Chunker,
    embedder: &dyn EmbeddingProvider,
    part: &crate::domain::DocumentPart,
) -> Result<bool, AppError> {
    let old_part = store.get_document_part_by_id(&part.document_part_id)?;

    let skip = match &old_part {
        Some(old) => {
            old.part.extractor_name == part.extractor_name
                && old.part.extractor_version == part.extractor_version
                && old.part.checksum == part.checksum
        }
        None => false,
    };

    if skip {
        debug!(document_part_id = %part.document_part_id, "skipping already-processed part");
        store.mark_document_part_processed(run_id, &part.document_part_id, None)?;
        store.increment_indexed(run_id)?;
        return Ok(true);
    }

    match &old_part {
        Some(old) => {
            let chunk_ids = old.chunk_ids.as_ref().ok_or_else(|| {
                AppError::Fatal(format!(
                    "existing document part {} has no chunk_ids; cannot remove old chunks",
                    part.document_part_id
                ))
            })?;
            vector_store.remove_chunks(chunk_ids)?;
            store.upsert_document_part(part)?;
        }
        None => {
            store.upsert_document_part(part)?;
        }
    }

    let chunks = chunker.chunk(part)?;
    if chunks.is_empty() {
        warn!(document_part_id = %part.document_part_id, "chunker produced no chunks");
    }

    let mut chunk_ids = Vec::with_capacity(chunks.len());
    for chunk in &chunks {
        let embedding = embedder.embed_document(&chunk.text)?;
        add_with_retries(vector_store, chunk, &embedding)?;
        chunk_ids.push(chunk.id.clone());
    }

    store.mark_document_part_processed(run_id, &part.document_part_id, Some(&chunk_ids))?;
    store.increment_indexed(run_id)?;
    Ok(false)
}

fn add_with_retries(vector_store: &dyn VectorStore, chunk: &crate::domain::Chunk, embedding: &[f32]) -> Result<(), AppError> {
    let mut attempt = 1;
    loop {
        match vector_store.add(chunk, embedding) {
            Ok(()) => return Ok(()),
            Err(e) if attempt < MAX_ADD_RETRIES => {
                warn!(chunk_id = %chunk.id, attempt, error = %e, "retrying vector store add");
                std::thread::sleep(RETRY_BACKOFF);
                attempt += 1;
            }
            Err(e) => {
                warn!(chunk_id = %chunk.id, attempts = attempt, error = %e, "giving up on vector store add");
                return Err(e);
            }
        }
    }
}

/// Stale-part cleanup per SPEC_FULL.md §4.8, I5: parts whose scope matches
/// this run but whose `last_indexed_run_id` is some other run are gone from
/// the current scan and are purged from both stores.
fn cleanup(run_id: &str, store: &MetadataStore, vector_store: &dyn VectorStore) -> Result<(), AppError> {
    let run = store
        .load_run_by_id(run_id)?
        .ok_or_else(|| AppError::NotFound(format!("run {run_id} not found")))?;
    let stale = store.get_stale_parts(run_id, &run.scope_json)?;
    if stale.is_empty() {
        return Ok(());
    }

    let mut all_chunk_ids = Vec::new();
    let mut stale_part_ids = Vec::with_capacity(stale.len());
    for (part_id, chunk_ids) in stale {
        all_chunk_ids.extend(chunk_ids);
        stale_part_ids.push(part_id);
    }

    vector_store.remove_chunks(&all_chunk_ids)?;
    store.remove_document_parts_by_id(&stale_part_ids)?;
    info!(run_id = %run_id, removed = stale_part_ids.len(), "cleanup removed stale parts");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::SimpleChunker;
    use crate::domain::{DocumentPart, now_iso8601};
    use crate::embeddings::DummyEmbeddingProvider;
    use crate::vector_store::InMemoryVectorStore;
    use std::collections::HashMap;

    fn sample_part(id: &str, checksum: &str, text: &str) -> DocumentPart {
        DocumentPart {
            document_part_id: id.to_string(),
            checksum: checksum.to_string(),
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
            text: text.to_string(),
            scope_json: "{\"kind\":\"filesystem\"}".to_string(),
        }
    }

    fn harness() -> (MetadataStore, InMemoryVectorStore, SimpleChunker, DummyEmbeddingProvider) {
        (
            MetadataStore::open_in_memory().unwrap(),
            InMemoryVectorStore::new(8),
            SimpleChunker::new(5, 0).unwrap(),
            DummyEmbeddingProvider::new("dummy".to_string(), 8),
        )
    }

    #[tokio::test]
    async fn fresh_part_is_chunked_embedded_and_indexed() {
        let (store, vs, chunker, embedder) = harness();
        let run = store.create_run("filesystem", "{}").unwrap();
        let part = sample_part("p1", "c1", "hello world");

        process_entry(&run.id, &store, &vs, &chunker, &embedder, &part).await.unwrap();

        let stored = store.get_document_part_by_id("p1").unwrap().unwrap();
        assert_eq!(stored.last_indexed_run_id.as_deref(), Some(run.id.as_str()));
        assert!(stored.chunk_ids.is_some());
        assert!(vs.count().unwrap() > 0);

        let reloaded = store.load_run_by_id(&run.id).unwrap().unwrap();
        assert_eq!(reloaded.indexed_count, 1);
    }

    #[tokio::test]
    async fn unchanged_part_is_skipped_without_rechunking() {
        let (store, vs, chunker, embedder) = harness();
        let run = store.create_run("filesystem", "{}").unwrap();
        let part = sample_part("p1", "c1", "hello world");
        process_entry(&run.id, &store, &vs, &chunker, &embedder, &part).await.unwrap();
        let count_after_first = vs.count().unwrap();

        let run2 = store.create_run("filesystem", "{}").unwrap();
        process_entry(&run2.id, &store, &vs, &chunker, &embedder, &part).await.unwrap();

        assert_eq!(vs.count().unwrap(), count_after_first);
        let stored = store.get_document_part_by_id("p1").unwrap().unwrap();
        assert_eq!(stored.last_indexed_run_id.as_deref(), Some(run2.id.as_str()));
    }

    #[tokio::test]
    async fn changed_checksum_triggers_reprocess_and_replaces_chunks() {
        let (store, vs, chunker, embedder) = harness();
        let run = store.create_run("filesystem", "{}").unwrap();
        let part = sample_part("p1", "c1", "hello world");
        process_entry(&run.id, &store, &vs, &chunker, &embedder, &part).await.unwrap();
        let old_chunk_ids = store.get_document_part_by_id("p1").unwrap().unwrap().chunk_ids.unwrap();

        let updated = sample_part("p1", "c2", "a completely different body of text");
        process_entry(&run.id, &store, &vs, &chunker, &embedder, &updated).await.unwrap();

        for id in &old_chunk_ids {
            assert!(!vs.exists(id).unwrap());
        }
        let stored = store.get_document_part_by_id("p1").unwrap().unwrap();
        assert_eq!(stored.part.checksum, "c2");
    }

    #[tokio::test]
    async fn cleanup_removes_parts_stale_in_the_runs_scope() {
        let (store, vs, chunker, embedder) = harness();
        let scope = "{\"kind\":\"filesystem\"}";

        let run1 = store.create_run("filesystem", scope).unwrap();
        let mut stale_part = sample_part("stale", "c1", "will be removed");
        stale_part.scope_json = scope.to_string();
        process_entry(&run1.id, &store, &vs, &chunker, &embedder, &stale_part).await.unwrap();
        store.update_status(&run1.id, RunStatus::Completed).unwrap();

        let run2 = store.create_run("filesystem", scope).unwrap();
        store.set_is_discovering(&run2.id, false).unwrap();

        cleanup(&run2.id, &store, &vs).unwrap();

        assert!(store.get_document_part_by_id("stale").unwrap().is_none());
        assert_eq!(vs.count().unwrap(), 0);
    }
}
