//! Deterministic fixed-size overlap chunker, grounded on
//! `original_source/pipeline/chunking/simple_chunker.py`, itself grounded in
//! idiom on the teacher's `docstore.rs::chunk_document` char-boundary walk.

use crate::domain::{Chunk, DocumentPart};
use crate::error::AppError;
use crate::identity::chunk_id;

use super::Chunker;

pub struct SimpleChunker {
    chunk_size: usize,
    overlap: usize,
}

impl SimpleChunker {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, AppError> {
        if chunk_size == 0 {
            return Err(AppError::Config("chunk_size must be > 0".to_string()));
        }
        if overlap >= chunk_size {
            return Err(AppError::Config("overlap must be smaller than chunk_size".to_string()));
        }
        Ok(Self { chunk_size, overlap })
    }
}

impl Chunker for SimpleChunker {
    fn chunk(&self, part: &DocumentPart) -> Result<Vec<Chunk>, AppError> {
        let chars: Vec<char> = part.text.chars().collect();
        if chars.is_empty() {
            return Ok(Vec::new());
        }

        let mut chunks = Vec::new();
        let mut start = 0usize;
        let mut index = 0usize;

        while start < chars.len() {
            let end = (start + self.chunk_size).min(chars.len());
            let text: String = chars[start..end].iter().collect();
            let id = chunk_id(&part.document_part_id, &part.checksum, index);

            let mut metadata = std::collections::HashMap::new();
            metadata.insert("start".to_string(), start.to_string());
            metadata.insert("end".to_string(), end.to_string());

            chunks.push(Chunk {
                id,
                document_part_id: part.document_part_id.clone(),
                source_path: part.source_path.clone(),
                device_id: part.device_id.clone(),
                source_type: part.source_type.clone(),
                unit_locator: part.unit_locator.clone(),
                index,
                metadata,
                text,
            });

            index += 1;
            if end == chars.len() {
                break;
            }
            start = end - self.overlap;
        }

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
    fn splits_long_text_with_overlap() {
        let chunker = SimpleChunker::new(10, 2).unwrap();
        let text: String = "a".repeat(25);
        let chunks = chunker.chunk(&sample_part(&text)).unwrap();
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[1].index, 1);
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        let chunker = SimpleChunker::new(10, 2).unwrap();
        let chunks = chunker.chunk(&sample_part("")).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn short_text_yields_single_chunk() {
        let chunker = SimpleChunker::new(100, 10).unwrap();
        let chunks = chunker.chunk(&sample_part("hello")).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "hello");
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk_size() {
        let err = SimpleChunker::new(10, 10).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn chunk_ids_are_deterministic_and_position_sensitive() {
        let chunker = SimpleChunker::new(5, 0).unwrap();
        let text: String = "abcdefghij".to_string();
        let chunks = chunker.chunk(&sample_part(&text)).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_ne!(chunks[0].id, chunks[1].id);
    }
}
