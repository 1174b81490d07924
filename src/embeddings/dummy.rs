//! Deterministic pseudo-embedding provider: hashes the text into a
//! fixed-dimension vector so the pipeline is exercisable end to end without
//! a real model. Grounded in spirit on the teacher's own dependency-light
//! approach to the `idocstore` feature (FTS5 lexical search rather than
//! vectors at all) — this provider exists because SPEC_FULL.md's Vector
//! Store Gateway contract requires *some* embedding, however nominal.

use std::sync::atomic::{AtomicU64, Ordering};

use sha2::{Digest, Sha256};

use crate::error::AppError;

use super::EmbeddingProvider;

pub struct DummyEmbeddingProvider {
    model_name: String,
    dimension: usize,
    release_count: AtomicU64,
}

impl DummyEmbeddingProvider {
    pub fn new(model_name: String, dimension: usize) -> Self {
        Self { model_name, dimension, release_count: AtomicU64::new(0) }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    #[cfg(test)]
    pub fn release_count(&self) -> u64 {
        self.release_count.load(Ordering::Relaxed)
    }
}

impl EmbeddingProvider for DummyEmbeddingProvider {
    fn embed_document(&self, text: &str) -> Result<Vec<f32>, AppError> {
        if text.is_empty() {
            return Ok(vec![0.0; self.dimension]);
        }
        let digest = Sha256::digest(text.as_bytes());
        let mut vector = Vec::with_capacity(self.dimension);
        for i in 0..self.dimension {
            let byte = digest[i % digest.len()];
            vector.push((byte as f32 / 255.0) * 2.0 - 1.0);
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn release_resources(&self) {
        self.release_count.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(model = %self.model_name, "release_resources no-op for CPU provider");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embeddings_are_deterministic() {
        let provider = DummyEmbeddingProvider::new("dummy".to_string(), 8);
        let a = provider.embed_document("hello").unwrap();
        let b = provider.embed_document("hello").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
    }

    #[test]
    fn different_text_yields_different_vectors() {
        let provider = DummyEmbeddingProvider::new("dummy".to_string(), 8);
        let a = provider.embed_document("hello").unwrap();
        let b = provider.embed_document("goodbye").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn empty_text_embeds_to_zero_vector() {
        let provider = DummyEmbeddingProvider::new("dummy".to_string(), 8);
        let v = provider.embed_document("").unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn release_resources_is_counted_but_harmless() {
        let provider = DummyEmbeddingProvider::new("dummy".to_string(), 8);
        provider.release_resources();
        provider.release_resources();
        assert_eq!(provider.release_count(), 2);
    }
}
