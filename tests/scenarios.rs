//! Scenario integration tests (SPEC_FULL.md §8, S1-S6), grounded in the
//! teacher's `tests/test_docstore.rs` style: tempfile-backed fixtures, plain
//! `#[tokio::test]`s driving the public API end to end.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use loseme::chunking::SimpleChunker;
use loseme::domain::{DocumentPart, EmailScope, FilesystemScope, IgnorePattern, RunStatus, Scope};
use loseme::embeddings::DummyEmbeddingProvider;
use loseme::extractors::ExtractorRegistry;
use loseme::metadata_store::MetadataStore;
use loseme::run_controller::RunController;
use loseme::vector_store::{InMemoryVectorStore, VectorStore};
use loseme::workers::process_entry;

const TIMEOUT: Duration = Duration::from_secs(5);

fn harness() -> (Arc<MetadataStore>, Arc<InMemoryVectorStore>, RunController) {
    let store = Arc::new(MetadataStore::open_in_memory().unwrap());
    let vs = Arc::new(InMemoryVectorStore::new(8));
    let controller = RunController::new(
        store.clone(),
        vs.clone() as Arc<dyn VectorStore>,
        Arc::new(ExtractorRegistry::default_registry()),
        Arc::new(SimpleChunker::new(200, 20).unwrap()),
        Arc::new(DummyEmbeddingProvider::new("dummy".to_string(), 8)),
        "test-device".to_string(),
        CancellationToken::new(),
    );
    (store, vs, controller)
}

fn fs_scope(dir: &TempDir) -> Scope {
    Scope::Filesystem(FilesystemScope {
        directories: vec![dir.path().to_path_buf()],
        include_patterns: vec![],
        exclude_patterns: vec![],
        recursive: true,
    })
}

/// Poll a run until it reaches a terminal status, or panic after `TIMEOUT`.
async fn wait_for_terminal(store: &MetadataStore, run_id: &str) -> loseme::domain::Run {
    wait_for_settled(store, run_id).await
}

/// Poll a run until it leaves `Pending`/`Running` (i.e. `Completed`, `Failed`,
/// or `Interrupted` — `Interrupted` is deliberately not "terminal" since it's
/// resumable, but it is still a stable end state for a single worker run).
async fn wait_for_settled(store: &MetadataStore, run_id: &str) -> loseme::domain::Run {
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    loop {
        let run = store.load_run_by_id(run_id).unwrap().unwrap();
        if !matches!(run.status, RunStatus::Pending | RunStatus::Running) {
            return run;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("run {run_id} did not settle in time (status={:?})", run.status);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

// ── S1 — idempotent filesystem scan ─────────────────────────────────────

#[tokio::test]
async fn s1_idempotent_filesystem_scan() {
    let (store, vs, controller) = harness();
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("a.txt"), "hello").unwrap();
    std::fs::write(dir.path().join("b.txt"), "world").unwrap();
    let scope = fs_scope(&dir);

    let run1 = controller.create(&scope).unwrap();
    controller.start_indexing(&run1.id).unwrap();
    let run1 = wait_for_terminal(&store, &run1.id).await;
    assert_eq!(run1.status, RunStatus::Completed);
    assert_eq!(vs.count().unwrap(), 2);

    let a_part_id = part_id_for(&dir, "a.txt");
    let chunk_ids_before = store.get_document_part_by_id(&a_part_id).unwrap().unwrap().chunk_ids.unwrap();

    let run2 = controller.create(&scope).unwrap();
    controller.start_indexing(&run2.id).unwrap();
    let run2 = wait_for_terminal(&store, &run2.id).await;
    assert_eq!(run2.status, RunStatus::Completed);
    assert_eq!(vs.count().unwrap(), 2);
    let chunk_ids_after = store.get_document_part_by_id(&a_part_id).unwrap().unwrap().chunk_ids.unwrap();
    assert_eq!(chunk_ids_after, chunk_ids_before);
}

/// Mirrors `FilesystemSource`'s id derivation (`"test-device"` is this
/// module's fixed harness device id) so tests can look a part up without
/// re-walking the directory.
fn part_id_for(dir: &TempDir, filename: &str) -> String {
    let path = dir.path().join(filename);
    let src_instance_id = loseme::identity::source_instance_id("filesystem", "test-device", &path);
    let unit_locator = format!("filesystem:{}", path.display());
    loseme::identity::document_part_id(&src_instance_id, &unit_locator)
}

// ── S2 — extractor-version upgrade ──────────────────────────────────────

fn sample_part(id: &str, extractor_version: &str) -> DocumentPart {
    DocumentPart {
        document_part_id: id.to_string(),
        checksum: "same-checksum".to_string(),
        source_type: "filesystem".to_string(),
        source_instance_id: "src-1".to_string(),
        device_id: "dev-1".to_string(),
        source_path: "/tmp/script.py".to_string(),
        unit_locator: "filesystem:/tmp/script.py".to_string(),
        content_type: "text/x-python".to_string(),
        extractor_name: "python".to_string(),
        extractor_version: extractor_version.to_string(),
        metadata_json: Default::default(),
        created_at: loseme::domain::now_iso8601(),
        updated_at: loseme::domain::now_iso8601(),
        text: "def main():\n    pass\n".to_string(),
        scope_json: "{}".to_string(),
    }
}

#[tokio::test]
async fn s2_extractor_version_upgrade_replaces_chunks() {
    let (store, vs, _controller) = harness();
    let chunker = SimpleChunker::new(200, 20).unwrap();
    let embedder = DummyEmbeddingProvider::new("dummy".to_string(), 8);
    let run = store.create_run("filesystem", "{}").unwrap();

    let old_part = sample_part("py-1", "python@0.1");
    process_entry(&run.id, &store, &vs, &chunker, &embedder, &old_part).await.unwrap();
    let old_chunk_ids = store.get_document_part_by_id("py-1").unwrap().unwrap().chunk_ids.unwrap();
    assert!(!old_chunk_ids.is_empty());

    let new_part = sample_part("py-1", "python@999.0");
    process_entry(&run.id, &store, &vs, &chunker, &embedder, &new_part).await.unwrap();

    for id in &old_chunk_ids {
        assert!(!vs.exists(id).unwrap(), "old chunk {id} should have been removed");
    }
    let stored = store.get_document_part_by_id("py-1").unwrap().unwrap();
    assert_eq!(stored.part.extractor_version, "python@999.0");
    assert!(stored.chunk_ids.is_some());
}

// ── S3 — deletion cleanup ────────────────────────────────────────────────

#[tokio::test]
async fn s3_deletion_cleanup_removes_stale_part() {
    let (store, vs, controller) = harness();
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("a.txt"), "alpha").unwrap();
    std::fs::write(dir.path().join("b.txt"), "bravo").unwrap();
    std::fs::write(dir.path().join("c.txt"), "charlie").unwrap();
    let scope = fs_scope(&dir);

    let run1 = controller.create(&scope).unwrap();
    controller.start_indexing(&run1.id).unwrap();
    wait_for_terminal(&store, &run1.id).await;
    let count_before = vs.count().unwrap();
    assert_eq!(count_before, 3);

    std::fs::remove_file(dir.path().join("b.txt")).unwrap();

    let run2 = controller.create(&scope).unwrap();
    controller.start_indexing(&run2.id).unwrap();
    let run2 = wait_for_terminal(&store, &run2.id).await;
    assert_eq!(run2.status, RunStatus::Completed);

    assert_eq!(vs.count().unwrap(), count_before - 1);
}

// ── S4 — cooperative stop ────────────────────────────────────────────────

#[tokio::test]
async fn s4_cooperative_stop_interrupts_before_processing() {
    let (store, _vs, controller) = harness();
    let run = controller.create(&Scope::Filesystem(FilesystemScope {
        directories: vec![PathBuf::from("/tmp")],
        include_patterns: vec![],
        exclude_patterns: vec![],
        recursive: true,
    })).unwrap();

    for i in 0..5 {
        let part = sample_part(&format!("part-{i}"), "v1");
        store.queue_add(&run.id, &part).unwrap();
    }

    controller.request_stop(&run.id).unwrap();
    controller.start_indexing(&run.id).unwrap();

    let run = wait_for_settled(&store, &run.id).await;
    assert_eq!(run.status, RunStatus::Interrupted);
    assert!(run.indexed_count < 5);
}

// ── S5 — email ignore pattern ────────────────────────────────────────────

fn write_mbox(dir: &TempDir, senders: &[&str]) -> PathBuf {
    let path = dir.path().join("mail.mbox");
    let mut body = String::new();
    for (i, sender) in senders.iter().enumerate() {
        body.push_str(&format!(
            "From {sender} Mon Jan  1 00:00:00 2026\nFrom: {sender}\nTo: me@example.com\nDate: Mon, 1 Jan 2026 00:0{i}:00 +0000\nSubject: message {i}\n\nbody of message {i}\n\n",
        ));
    }
    std::fs::write(&path, body).unwrap();
    path
}

#[tokio::test]
async fn s5_email_ignore_pattern_filters_messages() {
    let (store, vs, controller) = harness();
    let dir = TempDir::new().unwrap();

    let mut senders: Vec<String> = (0..13).map(|i| format!("person{i}@example.com")).collect();
    senders.extend((0..7).map(|i| format!("bot{i}@google.com")));
    let sender_refs: Vec<&str> = senders.iter().map(String::as_str).collect();
    let mbox_path = write_mbox(&dir, &sender_refs);

    let filtered_scope = Scope::Email(EmailScope {
        mbox_path: mbox_path.clone(),
        ignore_patterns: vec![IgnorePattern { field: "From".to_string(), value: "*google.com*".to_string() }],
    });
    let run = controller.create(&filtered_scope).unwrap();
    controller.start_indexing(&run.id).unwrap();
    let run = wait_for_terminal(&store, &run.id).await;
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.discovered_count, 13);

    let control_scope = Scope::Email(EmailScope { mbox_path, ignore_patterns: vec![] });
    let run2 = controller.create(&control_scope).unwrap();
    controller.start_indexing(&run2.id).unwrap();
    let run2 = wait_for_terminal(&store, &run2.id).await;
    assert_eq!(run2.status, RunStatus::Completed);
    assert_eq!(run2.discovered_count, 20);

    let _ = vs.count().unwrap();
}

// ── S6 — resume after interruption ───────────────────────────────────────

#[tokio::test]
async fn s6_resume_after_interruption_has_no_duplicate_chunks() {
    let (store, vs, controller) = harness();
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("a.txt"), "alpha content").unwrap();
    std::fs::write(dir.path().join("b.txt"), "bravo content").unwrap();
    let scope = fs_scope(&dir);

    let baseline = controller.create(&scope).unwrap();
    controller.start_indexing(&baseline.id).unwrap();
    let baseline = wait_for_terminal(&store, &baseline.id).await;
    assert_eq!(baseline.status, RunStatus::Completed);
    let baseline_indexed = baseline.indexed_count;
    let baseline_chunk_count = vs.count().unwrap();

    // Simulate a run that was interrupted right after creation.
    let interrupted = controller.create(&scope).unwrap();
    controller.mark_interrupted(&interrupted.id).unwrap();

    let resumed = controller.resume_latest("filesystem").unwrap().unwrap();
    assert_eq!(resumed.id, interrupted.id);
    let resumed = wait_for_terminal(&store, &resumed.id).await;

    assert_eq!(resumed.status, RunStatus::Completed);
    assert_eq!(resumed.indexed_count, baseline_indexed);
    assert_eq!(vs.count().unwrap(), baseline_chunk_count);
}
