//! loseme — ingestion control plane entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Init logger at default level
//!   3. Load config
//!   4. Re-init logger at configured level
//!   5. Open metadata store, build vector store / chunker / embedder
//!   6. Build the Run Controller
//!   7. Resume any runs left `interrupted` by a previous crash
//!   8. Spawn Ctrl-C → shutdown signal watcher
//!   9. Spawn HTTP server + monitored-source sweep, join until shutdown

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use loseme::error::AppError;
use loseme::http::{AppState, HttpServer};
use loseme::metadata_store::MetadataStore;
use loseme::run_controller::RunController;
use loseme::runtime::{spawn_components, Component};
use loseme::sweep::SweepWorker;
use loseme::{chunking, config, embeddings, extractors, logger, vector_store};

const CHUNK_SIZE: usize = 800;
const CHUNK_OVERLAP: usize = 80;
const SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(300);

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    let _ = dotenvy::dotenv();

    logger::init("info")?;

    let config = config::load(None)?;
    logger::init(&config.log_level)?;

    info!(
        device_id = %config.device_id,
        data_dir = %config.data_dir.display(),
        http_addr = %config.http_addr,
        "config loaded"
    );

    let store = Arc::new(MetadataStore::open(&config.data_dir)?);
    let extractor_registry = Arc::new(extractors::ExtractorRegistry::default_registry());
    let chunker: Arc<dyn loseme::chunking::Chunker> =
        chunking::build(&config.chunker, CHUNK_SIZE, CHUNK_OVERLAP)?.into();
    let embedder: Arc<dyn loseme::embeddings::EmbeddingProvider> =
        embeddings::build(&config.embedding_model).into();
    let vector_store_dir = config.data_dir.join("vectors");
    let vector_store = Arc::<dyn loseme::vector_store::VectorStore>::from(
        vector_store::build(&config.vector_storage, &vector_store_dir, embedder.dimension())?,
    );

    let shutdown = CancellationToken::new();

    let run_controller = Arc::new(RunController::new(
        store.clone(),
        vector_store.clone(),
        extractor_registry,
        chunker.clone(),
        embedder.clone(),
        config.device_id.clone(),
        shutdown.clone(),
    ));

    resume_interrupted_runs(&run_controller);

    let ctrlc_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received — initiating shutdown");
            ctrlc_token.cancel();
        }
    });

    let http_state = AppState {
        run_controller: run_controller.clone(),
        metadata_store: store.clone(),
        vector_store: vector_store.clone(),
        embedder: embedder.clone(),
        chunker: chunker.clone(),
    };
    let http_server: Box<dyn Component> = Box::new(HttpServer::new(config.http_addr.clone(), http_state));
    let sweep: Box<dyn Component> = Box::new(SweepWorker::new(store.clone(), run_controller.clone(), SWEEP_INTERVAL));

    let handle = spawn_components(vec![http_server, sweep], shutdown.clone());
    handle.join().await?;

    info!("loseme shut down");
    Ok(())
}

/// Resume every `interrupted` run across both source kinds — a previous
/// process exit (crash, or Ctrl-C mid-run) leaves runs in this state.
fn resume_interrupted_runs(run_controller: &RunController) {
    for kind in ["filesystem", "email"] {
        loop {
            match run_controller.resume_latest(kind) {
                Ok(Some(run)) => info!(run_id = %run.id, kind, "resumed interrupted run"),
                Ok(None) => break,
                Err(e) => {
                    warn!(kind, error = %e, "failed to resume interrupted run");
                    break;
                }
            }
        }
    }
}
