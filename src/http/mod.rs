//! HTTP surface (SPEC_FULL.md §6), axum-based. Grounded on the teacher's
//! `subsystems/comms/axum_channel` module: a `Component` owning a bound
//! listener, a cloneable `AppState` injected via `axum::extract::State`, and
//! graceful shutdown wired to the shared `CancellationToken`.
//!
//! Handlers never block on ingestion — every mutating route enqueues or
//! triggers a background `Component` and returns immediately (§5).

mod handlers;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::chunking::Chunker;
use crate::embeddings::EmbeddingProvider;
use crate::error::AppError;
use crate::metadata_store::MetadataStore;
use crate::run_controller::RunController;
use crate::runtime::{Component, ComponentFuture};
use crate::vector_store::VectorStore;

/// Everything a handler needs, injected via `axum::extract::State`. Cheap to
/// clone — every field is `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub run_controller: Arc<RunController>,
    pub metadata_store: Arc<MetadataStore>,
    pub vector_store: Arc<dyn VectorStore>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub chunker: Arc<dyn Chunker>,
}

pub struct HttpServer {
    bind_addr: String,
    state: AppState,
}

impl HttpServer {
    pub fn new(bind_addr: String, state: AppState) -> Self {
        Self { bind_addr, state }
    }
}

impl Component for HttpServer {
    fn id(&self) -> &str {
        "http-server"
    }

    fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture {
        Box::pin(run_http(self.bind_addr, self.state, shutdown))
    }
}

async fn run_http(bind_addr: String, state: AppState, shutdown: CancellationToken) -> Result<(), AppError> {
    let router = build_router(state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| AppError::Fatal(format!("http bind failed on {bind_addr}: {e}")))?;

    info!(%bind_addr, "http server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| AppError::Fatal(format!("http server error: {e}")))?;

    info!("http server shut down");
    Ok(())
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/runs/create", post(handlers::runs_create))
        .route("/runs/start_indexing/{run_id}", post(handlers::runs_start_indexing))
        .route("/runs/request_stop/{run_id}", post(handlers::runs_request_stop))
        .route("/runs/is_stop_requested/{run_id}", get(handlers::runs_is_stop_requested))
        .route("/runs/list", get(handlers::runs_list))
        .route("/runs/mark_completed/{run_id}", post(handlers::runs_mark_completed))
        .route("/runs/mark_failed/{run_id}", post(handlers::runs_mark_failed))
        .route("/runs/mark_interrupted/{run_id}", post(handlers::runs_mark_interrupted))
        .route("/runs/discovering_stopped/{run_id}", post(handlers::runs_discovering_stopped))
        .route("/queue/add", post(handlers::queue_add))
        .route("/queue/next/{run_id}", get(handlers::queue_next))
        .route("/ingest/document_part", post(handlers::ingest_document_part))
        .route("/search", post(handlers::search))
        .route("/sources/add", post(handlers::sources_add))
        .route("/sources/get_all_sources", get(handlers::sources_get_all))
        .route("/sources/scan/{id}", post(handlers::sources_scan))
        .route("/sources/set_enabled/{id}", post(handlers::sources_set_enabled))
        .route("/sources/delete/{id}", post(handlers::sources_delete))
        .with_state(state)
}
