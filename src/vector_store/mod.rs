//! Vector Store Gateway (SPEC_FULL.md §4.3): the only code aware of the
//! backing engine. Enforces the embedding dimension, re-hashes application
//! chunk ids into whatever namespace the engine requires, and keeps the
//! application-level id as the source of truth.

mod memory;
mod sqlite_fts;

pub use memory::InMemoryVectorStore;
pub use sqlite_fts::SqliteVectorStore;

use crate::domain::Chunk;
use crate::error::AppError;

pub trait VectorStore: Send + Sync {
    fn add(&self, chunk: &Chunk, embedding: &[f32]) -> Result<(), AppError>;
    fn query(&self, embedding: &[f32], top_k: usize) -> Result<Vec<(Chunk, f32)>, AppError>;
    /// The ranked entry point for `/search` (SPEC_FULL.md §6): each backend
    /// picks whichever of `query_text`/`embedding` its ranking is actually
    /// based on, rather than every caller having to know which. The
    /// in-memory store ranks by cosine similarity on `embedding` (delegating
    /// to [`VectorStore::query`]); the sqlite-fts store ranks by `bm25` on
    /// `query_text` (delegating to `SqliteVectorStore::search_by_text`).
    fn search(&self, query_text: &str, embedding: &[f32], top_k: usize) -> Result<Vec<(Chunk, f32)>, AppError>;
    fn retrieve_chunk_by_id(&self, id: &str) -> Result<Option<Chunk>, AppError>;
    fn exists(&self, id: &str) -> Result<bool, AppError>;
    fn remove_chunks(&self, ids: &[String]) -> Result<(), AppError>;
    fn count(&self) -> Result<usize, AppError>;
    fn dimension(&self) -> usize;
}

/// Build the configured backend. `"sqlite-fts"` selects the FTS5/BM25 lexical
/// store; anything else (including the default `"in-memory"`) selects the
/// brute-force cosine store.
pub fn build(backend: &str, data_dir: &std::path::Path, dimension: usize) -> Result<Box<dyn VectorStore>, AppError> {
    match backend {
        "sqlite-fts" => Ok(Box::new(SqliteVectorStore::open(data_dir)?)),
        _ => Ok(Box::new(InMemoryVectorStore::new(dimension))),
    }
}
