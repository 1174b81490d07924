//! Extractor Registry (SPEC_FULL.md §4.4), grounded on
//! `original_source/pipeline/extraction/registry.py` and
//! `original_source/src/sources/base/extractor.py`.

mod markdown;
mod mbox_message;
mod pdf;
mod plaintext;

pub use markdown::MarkdownExtractor;
pub use mbox_message::{MboxMessageExtractor, MimePart};
pub use pdf::PdfExtractor;
pub use plaintext::PlaintextExtractor;

use std::path::Path;

use crate::error::AppError;

/// Parallel-`Vec` extraction output; mirrors the original's
/// `DocumentExtractionResult` shape (`texts`/`content_types`/... all indexed
/// together) without the single-part convenience accessors, since every Rust
/// caller already knows whether it expects one part or many.
#[derive(Debug, Clone, Default)]
pub struct ExtractionResult {
    pub texts: Vec<String>,
    pub content_types: Vec<String>,
    pub metadata: Vec<std::collections::HashMap<String, String>>,
    pub unit_locators: Vec<String>,
    pub extractor_names: Vec<String>,
    pub extractor_versions: Vec<String>,
}

impl ExtractionResult {
    pub fn single(
        text: String,
        content_type: String,
        unit_locator: String,
        extractor_name: String,
        extractor_version: String,
    ) -> Self {
        Self {
            texts: vec![text],
            content_types: vec![content_type],
            metadata: vec![Default::default()],
            unit_locators: vec![unit_locator],
            extractor_names: vec![extractor_name],
            extractor_versions: vec![extractor_version],
        }
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }
}

pub trait Extractor: Send + Sync {
    fn name(&self) -> &str;
    fn version(&self) -> &str;
    fn priority(&self) -> i32;
    fn can_extract(&self, path: &Path) -> bool;
    fn can_extract_bytes(&self, bytes: &[u8]) -> bool;
    fn extract(&self, path: &Path) -> Result<ExtractionResult, AppError>;
    /// Extract from an already-decoded in-memory payload rather than a
    /// filesystem path — used by composite extractors (the email MIME
    /// walker, SPEC_FULL.md §4.5) that have a part's bytes in hand and have
    /// no file to point `extract` at.
    fn extract_bytes(&self, bytes: &[u8]) -> Result<ExtractionResult, AppError>;
}

/// Priority-ordered dispatch table. Built once at startup and passed by
/// reference wherever an `IngestionSource` needs to resolve an extractor —
/// constructor-injected rather than a global, avoiding an extractor↔registry
/// cycle (SPEC_FULL.md §9).
pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn Extractor>>,
}

impl ExtractorRegistry {
    pub fn new(mut extractors: Vec<Box<dyn Extractor>>) -> Self {
        extractors.sort_by(|a, b| b.priority().cmp(&a.priority()));
        Self { extractors }
    }

    /// Default registry: markdown (priority 5) before plaintext (priority 0)
    /// before the PDF stub (priority 0, registered last so plaintext wins
    /// ties on ordinary text files).
    pub fn default_registry() -> Self {
        Self::new(vec![
            Box::new(MarkdownExtractor::default()),
            Box::new(PlaintextExtractor::default()),
            Box::new(PdfExtractor::default()),
        ])
    }

    /// First extractor (by descending priority) whose `can_extract` matches.
    pub fn resolve(&self, path: &Path) -> Option<&dyn Extractor> {
        self.extractors.iter().find(|e| e.can_extract(path)).map(|b| b.as_ref())
    }

    /// Lookup by stable name, used by the email composite extractor to
    /// delegate MIME parts to the plaintext/markdown extractors without
    /// depending on their concrete types.
    pub fn get_by_name(&self, name: &str) -> Option<&dyn Extractor> {
        self.extractors.iter().find(|e| e.name() == name).map(|b| b.as_ref())
    }
}
