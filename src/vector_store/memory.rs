//! Brute-force cosine-similarity vector store. The default backend and the
//! one exercised by the scenario tests in `tests/`; tolerates concurrent
//! `add`/`remove_chunks` on disjoint id sets behind an `RwLock`.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::domain::Chunk;
use crate::error::AppError;

use super::VectorStore;

struct Entry {
    chunk: Chunk,
    embedding: Vec<f32>,
}

pub struct InMemoryVectorStore {
    dimension: usize,
    entries: RwLock<HashMap<String, Entry>>,
}

impl InMemoryVectorStore {
    pub fn new(dimension: usize) -> Self {
        Self { dimension, entries: RwLock::new(HashMap::new()) }
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

impl VectorStore for InMemoryVectorStore {
    fn add(&self, chunk: &Chunk, embedding: &[f32]) -> Result<(), AppError> {
        if !embedding.is_empty() && embedding.len() != self.dimension {
            return Err(AppError::Fatal(format!(
                "embedding dimension mismatch: expected {}, got {}",
                self.dimension,
                embedding.len()
            )));
        }
        let mut entries = self.entries.write().unwrap();
        entries.insert(
            chunk.id.clone(),
            Entry { chunk: chunk.clone(), embedding: embedding.to_vec() },
        );
        Ok(())
    }

    fn query(&self, embedding: &[f32], top_k: usize) -> Result<Vec<(Chunk, f32)>, AppError> {
        let entries = self.entries.read().unwrap();
        let mut scored: Vec<(Chunk, f32)> = entries
            .values()
            .map(|e| (e.chunk.clone(), cosine_similarity(embedding, &e.embedding)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }

    fn search(&self, _query_text: &str, embedding: &[f32], top_k: usize) -> Result<Vec<(Chunk, f32)>, AppError> {
        self.query(embedding, top_k)
    }

    fn retrieve_chunk_by_id(&self, id: &str) -> Result<Option<Chunk>, AppError> {
        Ok(self.entries.read().unwrap().get(id).map(|e| e.chunk.clone()))
    }

    fn exists(&self, id: &str) -> Result<bool, AppError> {
        Ok(self.entries.read().unwrap().contains_key(id))
    }

    fn remove_chunks(&self, ids: &[String]) -> Result<(), AppError> {
        let mut entries = self.entries.write().unwrap();
        for id in ids {
            entries.remove(id);
        }
        Ok(())
    }

    fn count(&self) -> Result<usize, AppError> {
        Ok(self.entries.read().unwrap().len())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    fn chunk(id: &str) -> Chunk {
        Chunk {
            id: id.to_string(),
            document_part_id: "part-1".to_string(),
            source_path: "/tmp/a.txt".to_string(),
            device_id: "dev".to_string(),
            source_type: "filesystem".to_string(),
            unit_locator: "filesystem:/tmp/a.txt".to_string(),
            index: 0,
            metadata: Map::new(),
            text: "hello world".to_string(),
        }
    }

    #[test]
    fn add_and_retrieve_by_id() {
        let store = InMemoryVectorStore::new(3);
        store.add(&chunk("c1"), &[1.0, 0.0, 0.0]).unwrap();
        assert!(store.exists("c1").unwrap());
        assert_eq!(store.retrieve_chunk_by_id("c1").unwrap().unwrap().text, "hello world");
    }

    #[test]
    fn remove_chunks_is_disjoint_safe() {
        let store = InMemoryVectorStore::new(3);
        store.add(&chunk("c1"), &[1.0, 0.0, 0.0]).unwrap();
        store.add(&chunk("c2"), &[0.0, 1.0, 0.0]).unwrap();
        store.remove_chunks(&["c1".to_string()]).unwrap();
        assert!(!store.exists("c1").unwrap());
        assert!(store.exists("c2").unwrap());
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn query_ranks_by_similarity() {
        let store = InMemoryVectorStore::new(2);
        store.add(&chunk("close"), &[1.0, 0.0]).unwrap();
        store.add(&chunk("far"), &[0.0, 1.0]).unwrap();
        let results = store.query(&[0.9, 0.1], 2).unwrap();
        assert_eq!(results[0].0.id, "close");
    }

    #[test]
    fn search_delegates_to_cosine_query_and_ignores_query_text() {
        let store = InMemoryVectorStore::new(2);
        store.add(&chunk("close"), &[1.0, 0.0]).unwrap();
        store.add(&chunk("far"), &[0.0, 1.0]).unwrap();
        let results = store.search("irrelevant text", &[0.9, 0.1], 2).unwrap();
        assert_eq!(results[0].0.id, "close");
    }

    #[test]
    fn dimension_mismatch_is_fatal() {
        let store = InMemoryVectorStore::new(3);
        let err = store.add(&chunk("c1"), &[1.0, 0.0]).unwrap_err();
        assert!(matches!(err, AppError::Fatal(_)));
    }

    #[test]
    fn empty_embedding_is_allowed() {
        let store = InMemoryVectorStore::new(3);
        store.add(&chunk("c1"), &[]).unwrap();
        assert!(store.exists("c1").unwrap());
    }
}
