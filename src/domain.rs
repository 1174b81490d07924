//! Core data model shared by every component (SPEC_FULL.md §3).

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Status of a [`Run`]. Terminal once `Completed` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Interrupted,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Interrupted => "interrupted",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "pending" => RunStatus::Pending,
            "running" => RunStatus::Running,
            "interrupted" => RunStatus::Interrupted,
            "completed" => RunStatus::Completed,
            "failed" => RunStatus::Failed,
            _ => return None,
        })
    }
}

/// Directory-scoped filesystem indexing target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FilesystemScope {
    pub directories: Vec<PathBuf>,
    #[serde(default)]
    pub include_patterns: Vec<String>,
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    #[serde(default = "default_true")]
    pub recursive: bool,
}

fn default_true() -> bool {
    true
}

/// A single header-field ignore rule for the email source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IgnorePattern {
    pub field: String,
    pub value: String,
}

/// Mbox-scoped email indexing target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmailScope {
    pub mbox_path: PathBuf,
    #[serde(default)]
    pub ignore_patterns: Vec<IgnorePattern>,
}

/// Sum type tagged by source-kind. Must serialize to a canonical form such
/// that two logically equal scopes hash identically — achieved here by
/// sorting pattern/directory lists before serialization (see [`Scope::canonicalize`]).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scope {
    Filesystem(FilesystemScope),
    Email(EmailScope),
}

impl Scope {
    pub fn kind(&self) -> &'static str {
        match self {
            Scope::Filesystem(_) => "filesystem",
            Scope::Email(_) => "email",
        }
    }

    /// Canonical form: directories/patterns sorted, paths resolved where
    /// possible. Two scopes describing the same logical target serialize
    /// identically after this pass, matching the original's
    /// `serialize_scope` (absolute + sorted directories).
    pub fn canonicalize(&self) -> Scope {
        match self {
            Scope::Filesystem(fs) => {
                let mut directories: Vec<PathBuf> = fs
                    .directories
                    .iter()
                    .map(|p| p.canonicalize().unwrap_or_else(|_| p.clone()))
                    .collect();
                directories.sort();
                let mut include_patterns = fs.include_patterns.clone();
                include_patterns.sort();
                let mut exclude_patterns = fs.exclude_patterns.clone();
                exclude_patterns.sort();
                Scope::Filesystem(FilesystemScope {
                    directories,
                    include_patterns,
                    exclude_patterns,
                    recursive: fs.recursive,
                })
            }
            Scope::Email(email) => {
                let mut ignore_patterns = email.ignore_patterns.clone();
                ignore_patterns.sort_by(|a, b| (&a.field, &a.value).cmp(&(&b.field, &b.value)));
                Scope::Email(EmailScope {
                    mbox_path: email
                        .mbox_path
                        .canonicalize()
                        .unwrap_or_else(|_| email.mbox_path.clone()),
                    ignore_patterns,
                })
            }
        }
    }

    /// Canonical JSON string — the value stored as `scope_json` and compared
    /// for uniqueness (monitored sources) and staleness (I5).
    pub fn canonical_json(&self) -> String {
        serde_json::to_string(&self.canonicalize()).expect("Scope always serializes")
    }
}

/// A single run of one scope, with lifecycle and counters (SPEC_FULL.md §3).
#[derive(Debug, Clone, Serialize)]
pub struct Run {
    pub id: String,
    pub kind: String,
    pub scope_json: String,
    pub status: RunStatus,
    pub started_at: String,
    pub updated_at: String,
    pub last_document_id: Option<String>,
    pub discovered_count: u64,
    pub indexed_count: u64,
    pub stop_requested: bool,
    pub is_discovering: bool,
    pub is_indexing: bool,
}

/// The unit of indexing. Identity: `document_part_id = H(source_instance_id, unit_locator)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentPart {
    pub document_part_id: String,
    pub checksum: String,
    pub source_type: String,
    pub source_instance_id: String,
    pub device_id: String,
    pub source_path: String,
    pub unit_locator: String,
    pub content_type: String,
    pub extractor_name: String,
    pub extractor_version: String,
    #[serde(default)]
    pub metadata_json: HashMap<String, String>,
    pub created_at: String,
    pub updated_at: String,
    pub text: String,
    pub scope_json: String,
}

/// A document yielded by an [`crate::sources::IngestionSource`]; may fan out
/// into multiple parts (e.g. an email's body plus each attachment).
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub source_type: String,
    pub metadata: HashMap<String, String>,
    pub parts: Vec<DocumentPart>,
}

/// A durable work-queue row: the full part payload plus the submitting run-id.
#[derive(Debug, Clone, Serialize)]
pub struct QueueEntry {
    pub queue_id: i64,
    pub run_id: String,
    pub part: DocumentPart,
}

/// Identity: `chunk_id = H(document_part_id, part_checksum, index)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub document_part_id: String,
    pub source_path: String,
    pub device_id: String,
    pub source_type: String,
    pub unit_locator: String,
    pub index: usize,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub text: String,
}

/// Registry entry: a scope eligible for scheduled scanning.
#[derive(Debug, Clone, Serialize)]
pub struct MonitoredSource {
    pub id: String,
    pub kind: String,
    pub locator: String,
    pub scope_json: String,
    pub last_seen_fingerprint: Option<String>,
    pub last_checked_at: Option<String>,
    pub last_ingested_at: Option<String>,
    pub enabled: bool,
    pub created_at: String,
}

/// Current time as RFC3339 (seconds precision), matching the teacher's
/// `docstore_core::now_iso8601`.
pub fn now_iso8601() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}
