//! Embedding Provider (SPEC_FULL.md §4.7, selected via `embedding_model`
//! config). No real model is bundled — the teacher's dependency stack carries
//! no ML runtime — so the shipped providers are deterministic CPU-only
//! stand-ins with a real seam (`release_resources`) for a future CUDA
//! provider gated by `use_cuda`.

mod dummy;

pub use dummy::DummyEmbeddingProvider;

use crate::error::AppError;

pub trait EmbeddingProvider: Send + Sync {
    fn embed_document(&self, text: &str) -> Result<Vec<f32>, AppError>;
    fn dimension(&self) -> usize;

    /// Rust analogue of the original's periodic `torch.cuda.empty_cache()`
    /// (SPEC_FULL.md §4.7, §10.5). A no-op for CPU-only providers.
    fn release_resources(&self) {}
}

/// `dummy` is the only selector implemented here; anything else still
/// resolves to it, tagged with the requested model name so logs show what
/// was actually asked for (a future real provider slots in here by model name).
pub fn build(model: &str) -> Box<dyn EmbeddingProvider> {
    Box::new(DummyEmbeddingProvider::new(model.to_string(), 16))
}
