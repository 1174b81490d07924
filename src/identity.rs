//! Deterministic, content-addressed identity scheme (SPEC_FULL.md §4.1).
//!
//! Three pure functions, each a SHA-256 hex digest of a canonical string.
//! All three are collision-resistant and stable across hosts and processes
//! given identical inputs (invariant I1).

use std::path::Path;

use sha2::{Digest, Sha256};

pub fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// Canonicalize a path for hashing: resolve symlinks and relative components
/// so the same file reached two different ways hashes identically.
fn canonical_path_string(path: &Path) -> String {
    path.canonicalize()
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .into_owned()
}

/// Stable id for a source instance (e.g. a file on a specific device).
/// Tracks documents across indexing runs and pause/resume operations.
pub fn source_instance_id(kind: &str, device_id: &str, source_path: &Path) -> String {
    let canonical = canonical_path_string(source_path);
    sha256_hex(&format!("{kind}:{device_id}:{canonical}"))
}

/// Id for a document part: binds a unit's logical address to its containing source.
pub fn document_part_id(source_instance_id: &str, unit_locator: &str) -> String {
    sha256_hex(&format!("{source_instance_id}:{unit_locator}"))
}

/// Id for a chunk: mutates whenever content or position changes.
pub fn chunk_id(document_part_id: &str, part_checksum: &str, index: usize) -> String {
    sha256_hex(&format!("{document_part_id}:{part_checksum}:{index}"))
}

/// Checksum of canonicalized extracted text (trimmed, UTF-8).
pub fn text_checksum(text: &str) -> String {
    sha256_hex(text.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn source_instance_id_is_deterministic() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("a.txt");
        fs::write(&file, "hello").unwrap();

        let a = source_instance_id("filesystem", "dev-1", &file);
        let b = source_instance_id("filesystem", "dev-1", &file);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn source_instance_id_is_device_sensitive() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("a.txt");
        fs::write(&file, "hello").unwrap();

        let a = source_instance_id("filesystem", "dev-1", &file);
        let b = source_instance_id("filesystem", "dev-2", &file);
        assert_ne!(a, b);
    }

    #[test]
    fn source_instance_id_resolves_symlinks_to_same_id() {
        #[cfg(unix)]
        {
            use std::os::unix::fs::symlink;
            let tmp = TempDir::new().unwrap();
            let real = tmp.path().join("real.txt");
            fs::write(&real, "hello").unwrap();
            let link = tmp.path().join("link.txt");
            symlink(&real, &link).unwrap();

            let a = source_instance_id("filesystem", "dev-1", &real);
            let b = source_instance_id("filesystem", "dev-1", &link);
            assert_eq!(a, b);
        }
    }

    #[test]
    fn document_part_id_is_pure_and_deterministic() {
        let a = document_part_id("abc123", "filesystem:/tmp/x.txt");
        let b = document_part_id("abc123", "filesystem:/tmp/x.txt");
        assert_eq!(a, b);

        let c = document_part_id("abc123", "filesystem:/tmp/y.txt");
        assert_ne!(a, c);
    }

    #[test]
    fn chunk_id_is_position_sensitive() {
        let a = chunk_id("part1", "checksum1", 0);
        let b = chunk_id("part1", "checksum1", 1);
        assert_ne!(a, b);
    }

    #[test]
    fn chunk_id_changes_when_checksum_changes() {
        let a = chunk_id("part1", "checksum1", 0);
        let b = chunk_id("part1", "checksum2", 0);
        assert_ne!(a, b);
    }

    #[test]
    fn text_checksum_ignores_surrounding_whitespace() {
        let a = text_checksum("hello world");
        let b = text_checksum("  hello world  \n");
        assert_eq!(a, b);
    }
}
