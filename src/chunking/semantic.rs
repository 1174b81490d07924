//! Semantic chunker backed by `text-splitter` (the teacher's own optional
//! dependency, used in idocstore under the `idocstore` feature), selected by
//! `chunker = "semantic"`. Splits on paragraph/sentence boundaries instead of
//! raw character offsets, grounded in spirit on
//! `original_source/pipeline/chunking/semantic_chunker.py`.

use text_splitter::MarkdownSplitter;

use crate::domain::{Chunk, DocumentPart};
use crate::error::AppError;
use crate::identity::chunk_id;

use super::Chunker;

/// Wraps the teacher's own `MarkdownSplitter` usage (`kg_docstore.rs`) behind
/// the `Chunker` trait. Markdown-aware splitting degrades gracefully on plain
/// text since Markdown is a superset of it.
pub struct SemanticChunker {
    chunk_size: usize,
}

impl SemanticChunker {
    pub fn new(chunk_size: usize) -> Result<Self, AppError> {
        if chunk_size == 0 {
            return Err(AppError::Config("chunk_size must be > 0".to_string()));
        }
        Ok(Self { chunk_size })
    }
}

impl Chunker for SemanticChunker {
    fn chunk(&self, part: &DocumentPart) -> Result<Vec<Chunk>, AppError> {
        let splitter = MarkdownSplitter::new(self.chunk_size);
        let chunks = splitter
            .chunk_indices(&part.text)
            .filter(|(_, t)| !t.trim().is_empty())
            .enumerate()
            .map(|(index, (start, text))| {
                let id = chunk_id(&part.document_part_id, &part.checksum, index);
                let mut metadata = std::collections::HashMap::new();
                metadata.insert("start".to_string(), start.to_string());
                Chunk {
                    id,
                    document_part_id: part.document_part_id.clone(),
                    source_path: part.source_path.clone(),
                    device_id: part.device_id.clone(),
                    source_type: part.source_type.clone(),
                    unit_locator: part.unit_locator.clone(),
                    index,
                    metadata,
                    text: text.to_string(),
                }
            })
            .collect();
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::now_iso8601;
    use std::collections::HashMap;

    fn sample_part(text: &str) -> DocumentPart {
        DocumentPart {
            document_part_id: "part-1".to_string(),
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
            text: text.to_string(),
            scope_json: "{}".to_string(),
        }
    }

    #[test]
    fn splits_on_paragraph_boundaries() {
        let chunker = SemanticChunker::new(40).unwrap();
        let text = "First paragraph with some words.\n\nSecond paragraph with more words here.";
        let chunks = chunker.chunk(&sample_part(text)).unwrap();
        assert!(chunks.len() >= 2);
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        let chunker = SemanticChunker::new(40).unwrap();
        let chunks = chunker.chunk(&sample_part("")).unwrap();
        assert!(chunks.is_empty());
    }
}
