//! PDF stub extractor, grounded on
//! `original_source/src/sources/filesystem/pdf_extractor.py` and
//! `original_source/src/domain/extraction/pdf_extraction.py`.
//!
//! No PDF-parsing crate is pulled in — none of the teacher's or the pack's
//! dependency stacks carry one. Matching files are recognized (so they don't
//! silently fall through to the plaintext extractor and emit binary noise)
//! but extraction always yields `ExtractionSkipped`, per SPEC_FULL.md §7: the
//! caller logs and moves on without failing the run.

use std::path::Path;

use crate::error::AppError;

use super::{ExtractionResult, Extractor};

#[derive(Default)]
pub struct PdfExtractor;

const VERSION: &str = "0.1-stub";

impl Extractor for PdfExtractor {
    fn name(&self) -> &str {
        "pdf"
    }

    fn version(&self) -> &str {
        VERSION
    }

    fn priority(&self) -> i32 {
        0
    }

    fn can_extract(&self, path: &Path) -> bool {
        path.extension().and_then(|e| e.to_str()) == Some("pdf")
    }

    fn can_extract_bytes(&self, bytes: &[u8]) -> bool {
        bytes.starts_with(b"%PDF-")
    }

    fn extract(&self, path: &Path) -> Result<ExtractionResult, AppError> {
        Err(AppError::ExtractionSkipped(format!(
            "no PDF text layer parser available: {}",
            path.display()
        )))
    }

    fn extract_bytes(&self, _bytes: &[u8]) -> Result<ExtractionResult, AppError> {
        Err(AppError::ExtractionSkipped(
            "no PDF text layer parser available for inline attachment".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_pdf_extension() {
        assert!(PdfExtractor.can_extract(Path::new("report.pdf")));
        assert!(!PdfExtractor.can_extract(Path::new("report.txt")));
    }

    #[test]
    fn extract_always_skips() {
        let err = PdfExtractor.extract(Path::new("report.pdf")).unwrap_err();
        assert!(matches!(err, AppError::ExtractionSkipped(_)));
    }

    #[test]
    fn extract_bytes_always_skips() {
        let err = PdfExtractor.extract_bytes(b"%PDF-1.4 ...").unwrap_err();
        assert!(matches!(err, AppError::ExtractionSkipped(_)));
    }
}
