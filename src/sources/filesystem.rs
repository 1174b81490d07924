//! Filesystem ingestion source, grounded on
//! `original_source/src/sources/filesystem/filesystem_source.py`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use glob::Pattern;

use crate::domain::{now_iso8601, Document, DocumentPart, FilesystemScope, Scope};
use crate::error::AppError;
use crate::extractors::ExtractorRegistry;
use crate::identity::{document_part_id, source_instance_id, text_checksum};

use super::{IngestionSource, ShouldStop};

pub struct FilesystemSource {
    scope: FilesystemScope,
    scope_json: String,
    device_id: String,
    registry: Arc<ExtractorRegistry>,
    should_stop: ShouldStop,
}

impl FilesystemSource {
    pub fn new(
        scope: FilesystemScope,
        device_id: String,
        registry: Arc<ExtractorRegistry>,
        should_stop: ShouldStop,
    ) -> Self {
        let scope_json = Scope::Filesystem(scope.clone()).canonical_json();
        Self { scope, scope_json, device_id, registry, should_stop }
    }

    /// Depth-first, lexicographically-ordered walk of one root directory —
    /// the Rust equivalent of `root.rglob("*")` sorted for stable resumable
    /// indexing.
    fn walk_dir(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
        let mut entries: Vec<_> = std::fs::read_dir(dir)?.filter_map(|e| e.ok()).collect();
        entries.sort_by_key(|e| e.file_name());
        for entry in entries {
            let path = entry.path();
            if path.is_dir() {
                if self_is_symlink_loop(&path) {
                    continue;
                }
                Self::walk_dir(&path, out)?;
            } else if path.is_file() {
                out.push(path);
            }
        }
        Ok(())
    }

    fn matches_patterns(rel_path: &str, patterns: &[String]) -> bool {
        patterns.iter().any(|p| {
            Pattern::new(p).map(|pat| pat.matches(rel_path)).unwrap_or(false)
        })
    }
}

fn self_is_symlink_loop(path: &Path) -> bool {
    std::fs::symlink_metadata(path).map(|m| m.file_type().is_symlink()).unwrap_or(false)
        && path.canonicalize().is_err()
}

impl IngestionSource for FilesystemSource {
    fn kind(&self) -> &str {
        "filesystem"
    }

    fn iter_documents(&self) -> Result<Vec<Document>, AppError> {
        let mut documents = Vec::new();

        for root in &self.scope.directories {
            if (self.should_stop)() {
                tracing::info!("stop requested, terminating filesystem ingestion source");
                break;
            }

            let mut files = Vec::new();
            if root.is_file() {
                files.push(root.clone());
            } else {
                Self::walk_dir(root, &mut files)?;
            }

            for path in files {
                if (self.should_stop)() {
                    tracing::info!("stop requested, terminating filesystem ingestion source");
                    break;
                }

                let rel_path = path.strip_prefix(root).unwrap_or(&path).to_string_lossy().replace('\\', "/");

                if !self.scope.exclude_patterns.is_empty()
                    && Self::matches_patterns(&rel_path, &self.scope.exclude_patterns)
                {
                    continue;
                }
                if !self.scope.include_patterns.is_empty()
                    && !Self::matches_patterns(&rel_path, &self.scope.include_patterns)
                {
                    continue;
                }

                let Some(extractor) = self.registry.resolve(&path) else {
                    tracing::warn!(path = %path.display(), "no suitable extractor found, skipping");
                    continue;
                };

                let extracted = match extractor.extract(&path) {
                    Ok(result) => result,
                    Err(AppError::ExtractionSkipped(reason)) => {
                        tracing::warn!(path = %path.display(), reason, "extraction skipped");
                        continue;
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "extraction failed, skipping");
                        continue;
                    }
                };

                if extracted.is_empty() {
                    continue;
                }

                let checksum = text_checksum(&extracted.texts[0]);
                let src_instance_id = source_instance_id("filesystem", &self.device_id, &path);
                let unit_locator = format!("filesystem:{}", path.display());
                let part_id = document_part_id(&src_instance_id, &unit_locator);
                let now = now_iso8601();

                let part = DocumentPart {
                    document_part_id: part_id.clone(),
                    checksum: checksum.clone(),
                    source_type: "filesystem".to_string(),
                    source_instance_id: src_instance_id,
                    device_id: self.device_id.clone(),
                    source_path: path.display().to_string(),
                    unit_locator,
                    content_type: extracted.content_types[0].clone(),
                    extractor_name: extracted.extractor_names[0].clone(),
                    extractor_version: extracted.extractor_versions[0].clone(),
                    metadata_json: extracted.metadata[0].clone(),
                    created_at: now.clone(),
                    updated_at: now,
                    text: extracted.texts[0].clone(),
                    scope_json: self.scope_json.clone(),
                };

                documents.push(Document {
                    id: part_id,
                    source_type: "filesystem".to_string(),
                    metadata: extracted.metadata[0].clone(),
                    parts: vec![part],
                });
            }
        }

        Ok(documents)
    }
}
