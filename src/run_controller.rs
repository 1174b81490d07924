//! Run Controller (SPEC_FULL.md §4.8), grounded on
//! `original_source/api/app/routes/runs.py`. The single code path that
//! touches runs regardless of trigger (HTTP, CLI, or the periodic monitored-
//! source sweep) — it owns run creation, worker spawning, and the
//! stop/resume/cleanup lifecycle.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::chunking::Chunker;
use crate::domain::{Run, RunStatus, Scope};
use crate::embeddings::EmbeddingProvider;
use crate::error::AppError;
use crate::extractors::ExtractorRegistry;
use crate::metadata_store::MetadataStore;
use crate::runtime::spawn_components;
use crate::sources::{EmailSource, FilesystemSource, IngestionSource};
use crate::vector_store::VectorStore;
use crate::workers::{DiscoveryWorker, IndexingWorker};

/// Shared construction dependencies every run's pair of workers needs.
pub struct RunController {
    store: Arc<MetadataStore>,
    vector_store: Arc<dyn VectorStore>,
    extractor_registry: Arc<ExtractorRegistry>,
    chunker: Arc<dyn Chunker>,
    embedder: Arc<dyn EmbeddingProvider>,
    device_id: String,
    shutdown: CancellationToken,
}

impl RunController {
    pub fn new(
        store: Arc<MetadataStore>,
        vector_store: Arc<dyn VectorStore>,
        extractor_registry: Arc<ExtractorRegistry>,
        chunker: Arc<dyn Chunker>,
        embedder: Arc<dyn EmbeddingProvider>,
        device_id: String,
        shutdown: CancellationToken,
    ) -> Self {
        Self { store, vector_store, extractor_registry, chunker, embedder, device_id, shutdown }
    }

    /// Create a `running`, `is_discovering=true` run over `scope`'s canonical
    /// form. Does not start workers — `start_indexing` does that separately,
    /// matching the original's two-step `create` then `start_indexing` calls.
    pub fn create(&self, scope: &Scope) -> Result<Run, AppError> {
        let scope_json = scope.canonical_json();
        self.store.create_run(scope.kind(), &scope_json)
    }

    pub fn list(&self) -> Result<Vec<Run>, AppError> {
        self.store.list_runs()
    }

    pub fn get(&self, run_id: &str) -> Result<Run, AppError> {
        self.store
            .load_run_by_id(run_id)?
            .ok_or_else(|| AppError::NotFound(format!("run {run_id} not found")))
    }

    pub fn is_stop_requested(&self, run_id: &str) -> Result<bool, AppError> {
        self.store.is_stop_requested(run_id)
    }

    /// Idempotent; a no-op on a terminal run (I7).
    pub fn request_stop(&self, run_id: &str) -> Result<(), AppError> {
        self.store.request_stop(run_id)
    }

    pub fn stop_latest(&self, kind: &str) -> Result<Option<Run>, AppError> {
        match self.store.load_latest_by_kind(kind)? {
            Some(run) => {
                self.store.request_stop(&run.id)?;
                Ok(Some(run))
            }
            None => Ok(None),
        }
    }

    pub fn mark_completed(&self, run_id: &str) -> Result<(), AppError> {
        self.store.update_status(run_id, RunStatus::Completed)
    }

    pub fn mark_failed(&self, run_id: &str) -> Result<(), AppError> {
        self.store.update_status(run_id, RunStatus::Failed)
    }

    pub fn mark_interrupted(&self, run_id: &str) -> Result<(), AppError> {
        self.store.update_status(run_id, RunStatus::Interrupted)
    }

    /// Discovery-done signal (§10.5) — lets an out-of-process Discovery
    /// Worker tell the controller it finished without owning the Indexing
    /// Worker's loop itself.
    pub fn discovering_stopped(&self, run_id: &str) -> Result<(), AppError> {
        self.store.set_is_discovering(run_id, false)
    }

    /// Launch the Discovery + Indexing `Component`s for `run_id` and return
    /// immediately — matches "HTTP handlers never block on ingestion" (§5).
    /// Errors surfacing after this point fail the run asynchronously rather
    /// than the triggering request.
    pub fn start_indexing(&self, run_id: &str) -> Result<(), AppError> {
        self.start_indexing_inner(run_id, None)
    }

    /// Same as [`Self::start_indexing`], but also records
    /// `last_ingested_at` (§4.9) on `source_id` once the run finishes in
    /// `completed` status — used by the HTTP `/sources/scan` route and the
    /// periodic sweep (§10.5), the two triggers that tie a run back to a
    /// monitored-source catalogue entry.
    pub fn start_indexing_for_source(&self, run_id: &str, source_id: &str) -> Result<(), AppError> {
        self.start_indexing_inner(run_id, Some(source_id.to_string()))
    }

    fn start_indexing_inner(&self, run_id: &str, source_id: Option<String>) -> Result<(), AppError> {
        let run = self.get(run_id)?;
        let scope: Scope = serde_json::from_str(&run.scope_json)?;
        let source = self.build_source(&run.id, &scope);

        let discovery = Box::new(DiscoveryWorker::new(run.id.clone(), self.store.clone(), source));
        let indexing = Box::new(IndexingWorker::new(
            run.id.clone(),
            self.store.clone(),
            self.vector_store.clone(),
            self.chunker.clone(),
            self.embedder.clone(),
        ));

        let handle = spawn_components(vec![discovery, indexing], self.shutdown.clone());
        let store = self.store.clone();
        let run_id = run.id.clone();
        tokio::spawn(async move {
            match handle.join().await {
                Ok(()) => {
                    if let Some(source_id) = source_id {
                        record_ingested_if_completed(&store, &run_id, &source_id);
                    }
                }
                Err(e) => {
                    error!(run_id = %run_id, error = %e, "run failed");
                    if let Err(mark_err) = store.update_status(&run_id, RunStatus::Failed) {
                        error!(run_id = %run_id, error = %mark_err, "failed to mark run as failed");
                    }
                }
            }
        });

        info!(run_id = %run.id, "indexing workers spawned");
        Ok(())
    }

    /// Reset the latest `interrupted` run of `kind` back to `running` and
    /// respawn its workers. The Discovery Worker re-walks its source from
    /// scratch (cheap relative to re-embedding, and the work queue silently
    /// tolerates re-queuing an already-queued part — the Indexing Worker's
    /// skip path absorbs the duplicate on its next pass).
    pub fn resume_latest(&self, kind: &str) -> Result<Option<Run>, AppError> {
        let run = match self.store.load_latest_interrupted_by_kind(kind)? {
            Some(run) => run,
            None => return Ok(None),
        };
        self.store.resume_run(&run.id)?;
        self.start_indexing(&run.id)?;
        self.get(&run.id).map(Some)
    }

    fn build_source(&self, run_id: &str, scope: &Scope) -> Box<dyn IngestionSource> {
        let store = self.store.clone();
        let run_id = run_id.to_string();
        let should_stop: crate::sources::ShouldStop =
            Arc::new(move || store.is_stop_requested(&run_id).unwrap_or(false));

        match scope {
            Scope::Filesystem(fs_scope) => Box::new(FilesystemSource::new(
                fs_scope.clone(),
                self.device_id.clone(),
                self.extractor_registry.clone(),
                should_stop,
            )) as Box<dyn IngestionSource>,
            Scope::Email(email_scope) => Box::new(EmailSource::new(
                email_scope.clone(),
                self.device_id.clone(),
                self.extractor_registry.clone(),
                should_stop,
            )) as Box<dyn IngestionSource>,
        }
    }

    /// Stale-parts cleanup for `run_id`'s own scope (I5), per §4.8. Exposed
    /// so the periodic monitored-source sweep (§10.5) can also trigger it
    /// outside the Indexing Worker's own end-of-queue cleanup call.
    pub fn cleanup(&self, run_id: &str) -> Result<(), AppError> {
        let run = self.get(run_id)?;
        let stale = self.store.get_stale_parts(run_id, &run.scope_json)?;
        if stale.is_empty() {
            return Ok(());
        }
        let mut all_chunk_ids = Vec::new();
        let mut stale_part_ids = Vec::with_capacity(stale.len());
        for (part_id, chunk_ids) in stale {
            all_chunk_ids.extend(chunk_ids);
            stale_part_ids.push(part_id);
        }
        self.vector_store.remove_chunks(&all_chunk_ids)?;
        self.store.remove_document_parts_by_id(&stale_part_ids)?;
        warn!(run_id = %run_id, removed = stale_part_ids.len(), "run controller cleanup removed stale parts");
        Ok(())
    }

    /// Enable or disable a monitored source — a disabled source is skipped
    /// by the periodic sweep (§10.5) but its catalogue entry and previously
    /// indexed parts are left alone (§4.8's cleanup Open Question (b)).
    pub fn set_source_enabled(&self, source_id: &str, enabled: bool) -> Result<(), AppError> {
        self.store.set_monitored_source_enabled(source_id, enabled)
    }

    /// Remove a monitored source from the catalogue. Does not touch any run
    /// or document part previously produced by scanning it.
    pub fn remove_source(&self, source_id: &str) -> Result<(), AppError> {
        self.store.delete_monitored_source(source_id)
    }
}

/// Shared by both sweep- and scan-triggered runs: only a `completed` run
/// represents a successful ingestion of the source's current contents, so
/// `last_ingested_at` is only advanced on that outcome.
fn record_ingested_if_completed(store: &MetadataStore, run_id: &str, source_id: &str) {
    match store.load_run_by_id(run_id) {
        Ok(Some(run)) if run.status == RunStatus::Completed => {
            if let Err(e) = store.touch_monitored_source_ingested(source_id) {
                error!(run_id, source_id, error = %e, "failed to record monitored source ingestion timestamp");
            }
        }
        Ok(_) => {}
        Err(e) => error!(run_id, source_id, error = %e, "failed to load run while recording ingestion timestamp"),
    }
}
