//! Discovery Worker (SPEC_FULL.md §4.6): walks a run's
//! [`IngestionSource`](crate::sources::IngestionSource) and enqueues every
//! part it yields. Grounded on `original_source/api/app/routes/runs.py`'s
//! `run_discovery_process` (discovery and indexing are two independent
//! background loops coordinated only through the run row and the queue).

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::AppError;
use crate::metadata_store::MetadataStore;
use crate::runtime::{Component, ComponentFuture};
use crate::sources::IngestionSource;

pub struct DiscoveryWorker {
    run_id: String,
    store: Arc<MetadataStore>,
    source: Box<dyn IngestionSource>,
}

impl DiscoveryWorker {
    pub fn new(run_id: String, store: Arc<MetadataStore>, source: Box<dyn IngestionSource>) -> Self {
        Self { run_id, store, source }
    }
}

impl Component for DiscoveryWorker {
    fn id(&self) -> &str {
        "discovery-worker"
    }

    fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture {
        Box::pin(run_discovery(self.run_id, self.store, self.source, shutdown))
    }
}

/// Runs the source walk on a blocking thread (it does synchronous filesystem
/// / mbox IO) while the async side watches for stop requests and cancellation,
/// then drains and queues whatever the walk produced.
async fn run_discovery(
    run_id: String,
    store: Arc<MetadataStore>,
    source: Box<dyn IngestionSource>,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    info!(run_id = %run_id, kind = source.kind(), "discovery started");

    if store.is_stop_requested(&run_id)? {
        store.set_is_discovering(&run_id, false)?;
        return Ok(());
    }

    let documents = tokio::select! {
        _ = shutdown.cancelled() => {
            store.set_is_discovering(&run_id, false)?;
            return Ok(());
        }
        result = tokio::task::spawn_blocking(move || source.iter_documents()) => {
            result.map_err(|e| AppError::Worker(format!("discovery task panicked: {e}")))??
        }
    };

    for document in documents {
        if shutdown.is_cancelled() || store.is_stop_requested(&run_id)? {
            info!(run_id = %run_id, "discovery stopped before completion");
            break;
        }
        for part in &document.parts {
            store.queue_add(&run_id, part)?;
            store.increment_discovered(&run_id)?;
        }
    }

    store.set_is_discovering(&run_id, false)?;
    info!(run_id = %run_id, "discovery finished, is_discovering=false");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Document, DocumentPart, now_iso8601};
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    struct FakeSource {
        documents: StdMutex<Option<Vec<Document>>>,
    }

    impl IngestionSource for FakeSource {
        fn kind(&self) -> &str {
            "fake"
        }

        fn iter_documents(&self) -> Result<Vec<Document>, AppError> {
            Ok(self.documents.lock().unwrap().take().unwrap_or_default())
        }
    }

    fn sample_part(id: &str) -> DocumentPart {
        DocumentPart {
            document_part_id: id.to_string(),
            checksum: "c1".to_string(),
            source_type: "fake".to_string(),
            source_instance_id: "src".to_string(),
            device_id: "dev".to_string(),
            source_path: "/tmp/x".to_string(),
            unit_locator: "fake:/tmp/x".to_string(),
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

    #[tokio::test]
    async fn queues_every_part_and_stops_discovering() {
        let store = Arc::new(MetadataStore::open_in_memory().unwrap());
        let run = store.create_run("fake", "{}").unwrap();

        let documents = vec![Document {
            id: "doc-1".to_string(),
            source_type: "fake".to_string(),
            metadata: HashMap::new(),
            parts: vec![sample_part("p1"), sample_part("p2")],
        }];
        let source = Box::new(FakeSource { documents: StdMutex::new(Some(documents)) });

        run_discovery(run.id.clone(), store.clone(), source, CancellationToken::new())
            .await
            .unwrap();

        let reloaded = store.load_run_by_id(&run.id).unwrap().unwrap();
        assert!(!reloaded.is_discovering);
        assert_eq!(reloaded.discovered_count, 2);
        assert!(store.queue_next(&run.id).unwrap().is_some());
    }

    #[tokio::test]
    async fn stop_requested_before_start_skips_walk() {
        let store = Arc::new(MetadataStore::open_in_memory().unwrap());
        let run = store.create_run("fake", "{}").unwrap();
        store.request_stop(&run.id).unwrap();

        let source = Box::new(FakeSource { documents: StdMutex::new(Some(vec![])) });
        run_discovery(run.id.clone(), store.clone(), source, CancellationToken::new())
            .await
            .unwrap();

        let reloaded = store.load_run_by_id(&run.id).unwrap().unwrap();
        assert!(!reloaded.is_discovering);
        assert_eq!(reloaded.discovered_count, 0);
    }
}
