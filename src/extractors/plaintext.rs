//! Fallback extractor for plain text, grounded on
//! `original_source/src/sources/filesystem/plaintext_extractor.py`.

use std::path::Path;

use crate::error::AppError;

use super::{ExtractionResult, Extractor};

#[derive(Default)]
pub struct PlaintextExtractor;

const VERSION: &str = "1.0";

impl Extractor for PlaintextExtractor {
    fn name(&self) -> &str {
        "plaintext"
    }

    fn version(&self) -> &str {
        VERSION
    }

    /// Lowest priority: the catch-all extractor tried after anything more
    /// specific.
    fn priority(&self) -> i32 {
        0
    }

    fn can_extract(&self, _path: &Path) -> bool {
        true
    }

    fn can_extract_bytes(&self, bytes: &[u8]) -> bool {
        std::str::from_utf8(bytes).is_ok()
    }

    fn extract(&self, path: &Path) -> Result<ExtractionResult, AppError> {
        let text = std::fs::read_to_string(path)?;
        Ok(ExtractionResult::single(
            text,
            "text/plain".to_string(),
            format!("filesystem:{}", path.display()),
            self.name().to_string(),
            self.version().to_string(),
        ))
    }

    fn extract_bytes(&self, bytes: &[u8]) -> Result<ExtractionResult, AppError> {
        let text = String::from_utf8_lossy(bytes).into_owned();
        Ok(ExtractionResult::single(
            text,
            "text/plain".to_string(),
            "inline".to_string(),
            self.name().to_string(),
            self.version().to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;
    use std::io::Write;

    #[test]
    fn extracts_file_contents_verbatim() {
        let mut f = NamedTempFile::new().unwrap();
        write!(f, "hello world").unwrap();
        let result = PlaintextExtractor.extract(f.path()).unwrap();
        assert_eq!(result.texts[0], "hello world");
        assert_eq!(result.content_types[0], "text/plain");
    }

    #[test]
    fn can_extract_bytes_rejects_invalid_utf8() {
        assert!(!PlaintextExtractor.can_extract_bytes(&[0xff, 0xfe, 0x00]));
        assert!(PlaintextExtractor.can_extract_bytes(b"hello"));
    }

    #[test]
    fn extract_bytes_decodes_utf8_lossily() {
        let result = PlaintextExtractor.extract_bytes(b"hi there").unwrap();
        assert_eq!(result.texts[0], "hi there");
        assert_eq!(result.content_types[0], "text/plain");
    }
}
