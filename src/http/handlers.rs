//! Axum handlers for the routes in [`super::build_router`].
//!
//! Each handler receives [`AppState`] via [`axum::extract::State`] and
//! returns a [`Response`]. Error mapping follows `AppError::status_code`
//! (SPEC_FULL.md §7).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::domain::{DocumentPart, Scope};
use crate::error::AppError;
use crate::workers::process_entry;

use super::AppState;

fn json_error(code: &str, msg: impl std::fmt::Display) -> Json<serde_json::Value> {
    Json(json!({ "error": code, "message": format!("{msg}") }))
}

fn err_response(e: AppError) -> Response {
    let status = StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, json_error(error_code(&e), &e)).into_response()
}

fn error_code(e: &AppError) -> &'static str {
    match e {
        AppError::NotFound(_) => "not_found",
        AppError::Validation(_) => "validation",
        AppError::Conflict(_) => "conflict",
        AppError::ExtractionSkipped(_) => "extraction_skipped",
        AppError::Transient(_) => "transient",
        _ => "internal",
    }
}

// ── Health ───────────────────────────────────────────────────────────────

pub(super) async fn health() -> Response {
    (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response()
}

// ── Runs ─────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RunsCreateRequest {
    scope: Scope,
}

pub(super) async fn runs_create(State(state): State<AppState>, Json(req): Json<RunsCreateRequest>) -> Response {
    match state.run_controller.create(&req.scope) {
        Ok(run) => (StatusCode::OK, Json(run)).into_response(),
        Err(e) => err_response(e),
    }
}

pub(super) async fn runs_start_indexing(State(state): State<AppState>, Path(run_id): Path<String>) -> Response {
    match state.run_controller.start_indexing(&run_id) {
        Ok(()) => (StatusCode::OK, Json(json!({ "started": true }))).into_response(),
        Err(e) => err_response(e),
    }
}

pub(super) async fn runs_request_stop(State(state): State<AppState>, Path(run_id): Path<String>) -> Response {
    match state.run_controller.request_stop(&run_id) {
        Ok(()) => (StatusCode::OK, Json(json!({ "stop_requested": true }))).into_response(),
        Err(e) => err_response(e),
    }
}

pub(super) async fn runs_is_stop_requested(State(state): State<AppState>, Path(run_id): Path<String>) -> Response {
    match state.run_controller.is_stop_requested(&run_id) {
        Ok(requested) => (StatusCode::OK, Json(json!({ "stop_requested": requested }))).into_response(),
        Err(e) => err_response(e),
    }
}

pub(super) async fn runs_list(State(state): State<AppState>) -> Response {
    match state.run_controller.list() {
        Ok(runs) => (StatusCode::OK, Json(runs)).into_response(),
        Err(e) => err_response(e),
    }
}

pub(super) async fn runs_mark_completed(State(state): State<AppState>, Path(run_id): Path<String>) -> Response {
    match state.run_controller.mark_completed(&run_id) {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "completed" }))).into_response(),
        Err(e) => err_response(e),
    }
}

pub(super) async fn runs_mark_failed(State(state): State<AppState>, Path(run_id): Path<String>) -> Response {
    match state.run_controller.mark_failed(&run_id) {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "failed" }))).into_response(),
        Err(e) => err_response(e),
    }
}

pub(super) async fn runs_mark_interrupted(State(state): State<AppState>, Path(run_id): Path<String>) -> Response {
    match state.run_controller.mark_interrupted(&run_id) {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "interrupted" }))).into_response(),
        Err(e) => err_response(e),
    }
}

pub(super) async fn runs_discovering_stopped(State(state): State<AppState>, Path(run_id): Path<String>) -> Response {
    match state.run_controller.discovering_stopped(&run_id) {
        Ok(()) => (StatusCode::OK, Json(json!({ "is_discovering": false }))).into_response(),
        Err(e) => err_response(e),
    }
}

// ── Queue ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct QueueAddRequest {
    run_id: String,
    part: DocumentPart,
}

pub(super) async fn queue_add(State(state): State<AppState>, Json(req): Json<QueueAddRequest>) -> Response {
    match state.metadata_store.queue_add(&req.run_id, &req.part) {
        Ok(()) => (StatusCode::OK, Json(json!({ "queued": true }))).into_response(),
        Err(e) => err_response(e),
    }
}

pub(super) async fn queue_next(State(state): State<AppState>, Path(run_id): Path<String>) -> Response {
    match state.metadata_store.queue_next(&run_id) {
        Ok(Some(entry)) => (StatusCode::OK, Json(entry)).into_response(),
        Ok(None) => (StatusCode::OK, Json(json!(null))).into_response(),
        Err(e) => err_response(e),
    }
}

// ── Ingest ───────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct IngestRequest {
    run_id: String,
    part: DocumentPart,
}

/// Runs the same skip/reprocess/fresh decision as the Indexing Worker (§4.7),
/// for a document part submitted directly rather than discovered.
pub(super) async fn ingest_document_part(State(state): State<AppState>, Json(req): Json<IngestRequest>) -> Response {
    let result = process_entry(
        &req.run_id,
        &state.metadata_store,
        state.vector_store.as_ref(),
        state.chunker.as_ref(),
        state.embedder.as_ref(),
        &req.part,
    )
    .await;
    match result {
        Ok(skipped) => (StatusCode::OK, Json(json!({ "accepted": true, "skipped": skipped }))).into_response(),
        Err(e) => err_response(e),
    }
}

// ── Search ───────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct SearchRequest {
    query: String,
    #[serde(default = "default_top_k")]
    top_k: usize,
}

fn default_top_k() -> usize {
    10
}

pub(super) async fn search(State(state): State<AppState>, Json(req): Json<SearchRequest>) -> Response {
    let embedding = match state.embedder.embed_document(&req.query) {
        Ok(e) => e,
        Err(e) => return err_response(e),
    };
    match state.vector_store.search(&req.query, &embedding, req.top_k) {
        Ok(hits) => {
            let results: Vec<_> = hits
                .into_iter()
                .map(|(chunk, score)| {
                    json!({
                        "chunk_id": chunk.id,
                        "score": score,
                        "text": chunk.text,
                        "source_path": chunk.source_path,
                        "metadata": chunk.metadata,
                    })
                })
                .collect();
            (StatusCode::OK, Json(json!({ "results": results }))).into_response()
        }
        Err(e) => err_response(e),
    }
}

// ── Monitored sources ────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct SourcesAddRequest {
    kind: String,
    locator: String,
    scope: Scope,
}

pub(super) async fn sources_add(State(state): State<AppState>, Json(req): Json<SourcesAddRequest>) -> Response {
    let scope_json = req.scope.canonical_json();
    match state.metadata_store.add_monitored_source(&req.kind, &req.locator, &scope_json) {
        Ok(source) => (StatusCode::OK, Json(source)).into_response(),
        Err(e) => err_response(e),
    }
}

pub(super) async fn sources_get_all(State(state): State<AppState>) -> Response {
    match state.metadata_store.list_monitored_sources() {
        Ok(sources) => (StatusCode::OK, Json(sources)).into_response(),
        Err(e) => err_response(e),
    }
}

pub(super) async fn sources_scan(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let source = match state.metadata_store.get_monitored_source(&id) {
        Ok(Some(source)) => source,
        Ok(None) => return err_response(AppError::NotFound(format!("monitored source {id} not found"))),
        Err(e) => return err_response(e),
    };

    let scope: Scope = match serde_json::from_str(&source.scope_json) {
        Ok(scope) => scope,
        Err(e) => return err_response(e.into()),
    };

    let run = match state.run_controller.create(&scope) {
        Ok(run) => run,
        Err(e) => return err_response(e),
    };

    if let Err(e) = state.run_controller.start_indexing_for_source(&run.id, &id) {
        return err_response(e);
    }

    if let Err(e) = state.metadata_store.touch_monitored_source_checked(&id) {
        return err_response(e);
    }

    (StatusCode::OK, Json(run)).into_response()
}

#[derive(Deserialize)]
pub(super) struct SourcesSetEnabledRequest {
    enabled: bool,
}

pub(super) async fn sources_set_enabled(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SourcesSetEnabledRequest>,
) -> Response {
    match state.run_controller.set_source_enabled(&id, req.enabled) {
        Ok(()) => (StatusCode::OK, Json(json!({ "enabled": req.enabled }))).into_response(),
        Err(e) => err_response(e),
    }
}

pub(super) async fn sources_delete(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.run_controller.remove_source(&id) {
        Ok(()) => (StatusCode::OK, Json(json!({ "deleted": true }))).into_response(),
        Err(e) => err_response(e),
    }
}
