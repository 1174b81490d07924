//! Markdown extractor — same pass-through read as plaintext, but matched by
//! extension first so downstream chunkers can pick a markdown-aware splitter.

use std::path::Path;

use crate::error::AppError;

use super::{ExtractionResult, Extractor};

#[derive(Default)]
pub struct MarkdownExtractor;

const VERSION: &str = "1.0";

impl Extractor for MarkdownExtractor {
    fn name(&self) -> &str {
        "markdown"
    }

    fn version(&self) -> &str {
        VERSION
    }

    fn priority(&self) -> i32 {
        5
    }

    fn can_extract(&self, path: &Path) -> bool {
        matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("md") | Some("markdown")
        )
    }

    fn can_extract_bytes(&self, bytes: &[u8]) -> bool {
        std::str::from_utf8(bytes).is_ok()
    }

    fn extract(&self, path: &Path) -> Result<ExtractionResult, AppError> {
        let text = std::fs::read_to_string(path)?;
        Ok(ExtractionResult::single(
            text,
            "text/markdown".to_string(),
            format!("filesystem:{}", path.display()),
            self.name().to_string(),
            self.version().to_string(),
        ))
    }

    fn extract_bytes(&self, bytes: &[u8]) -> Result<ExtractionResult, AppError> {
        let text = String::from_utf8_lossy(bytes).into_owned();
        Ok(ExtractionResult::single(
            text,
            "text/markdown".to_string(),
            "inline".to_string(),
            self.name().to_string(),
            self.version().to_string(),
        ))
    }
}
