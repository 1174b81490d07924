//! Chunker (SPEC_FULL.md §4.7, selected via `chunker` config), grounded on
//! `original_source/pipeline/chunking/simple_chunker.py` and
//! `original_source/pipeline/chunking/semantic_chunker.py`.

mod semantic;
mod simple;

pub use semantic::SemanticChunker;
pub use simple::SimpleChunker;

use crate::domain::{Chunk, DocumentPart};
use crate::error::AppError;

pub trait Chunker: Send + Sync {
    fn chunk(&self, part: &DocumentPart) -> Result<Vec<Chunk>, AppError>;
}

/// Build the configured chunker. `"semantic"` selects the text-splitter-backed
/// variant (only available when the `semantic-chunker` feature is enabled);
/// anything else, including the default `"simple"`, selects the fixed-size
/// overlap chunker.
pub fn build(kind: &str, chunk_size: usize, overlap: usize) -> Result<Box<dyn Chunker>, AppError> {
    match kind {
        #[cfg(feature = "semantic-chunker")]
        "semantic" => Ok(Box::new(SemanticChunker::new(chunk_size)?)),
        #[cfg(not(feature = "semantic-chunker"))]
        "semantic" => Err(AppError::Config(
            "chunker = \"semantic\" requires the semantic-chunker feature".to_string(),
        )),
        _ => Ok(Box::new(SimpleChunker::new(chunk_size, overlap)?)),
    }
}
