#![cfg_attr(test, allow(dead_code))]
//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory,
//! then applies `LOSEME_*` env overrides (see table in SPEC_FULL.md §6).
//! Supports `[meta] base = "..."` inheritance chains exactly like a layered
//! deployment config: an overlay file names a base file and only needs to
//! specify the keys that differ.

use std::{
    collections::HashSet,
    env,
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::error::AppError;

/// Fully-resolved indexer configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Identifies this host in content-addressed IDs.
    pub device_id: String,
    /// Root of all managed content: metadata db, vector store file(s).
    pub data_dir: PathBuf,
    /// Host-visible root used to translate paths when the process runs in a container.
    pub source_root_host: Option<PathBuf>,
    /// Client-side base URL for the HTTP surface.
    pub api_url: String,
    /// Embedding provider selector, e.g. `"dummy"`, `"sentence-transformer:<name>"`.
    pub embedding_model: String,
    /// `"simple"` or `"semantic"`.
    pub chunker: String,
    /// `"in-memory"` or `"sqlite-fts"`.
    pub vector_storage: String,
    pub use_cuda: bool,
    pub allow_vector_clear: bool,
    pub log_level: String,
    /// Bind address for the HTTP surface.
    pub http_addr: String,
}

/// Raw TOML shape — `serde` target before resolution.
#[derive(Deserialize)]
struct RawConfig {
    indexer: RawIndexer,
    #[serde(default)]
    embedding: RawEmbedding,
    #[serde(default)]
    vector_store: RawVectorStore,
}

#[derive(Deserialize)]
struct RawIndexer {
    #[serde(default = "default_device_id")]
    device_id: String,
    #[serde(default = "default_data_dir")]
    data_dir: String,
    #[serde(default)]
    source_root_host: Option<String>,
    #[serde(default = "default_api_url")]
    api_url: String,
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default = "default_http_addr")]
    http_addr: String,
    #[serde(default = "default_false")]
    use_cuda: bool,
    #[serde(default = "default_false")]
    allow_vector_clear: bool,
}

#[derive(Deserialize, Default)]
struct RawEmbedding {
    #[serde(default = "default_embedding_model")]
    model: String,
    #[serde(default = "default_chunker")]
    chunker: String,
}

#[derive(Deserialize, Default)]
struct RawVectorStore {
    #[serde(default = "default_vector_storage")]
    backend: String,
}

fn default_device_id() -> String {
    hostname_fallback()
}

fn hostname_fallback() -> String {
    #[cfg(unix)]
    {
        if let Ok(name) = std::env::var("HOSTNAME") {
            if !name.is_empty() {
                return name;
            }
        }
    }
    "localhost".to_string()
}

fn default_data_dir() -> String { "~/.loseme".to_string() }
fn default_api_url() -> String { "http://localhost:8000".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_http_addr() -> String { "127.0.0.1:8000".to_string() }
fn default_embedding_model() -> String { "dummy".to_string() }
fn default_chunker() -> String { "simple".to_string() }
fn default_vector_storage() -> String { "in-memory".to_string() }
fn default_false() -> bool { false }

/// Deep-merge two TOML values. Tables merge recursively — the overlay only
/// needs to specify keys that differ from the base. Any other value type
/// (string, integer, array, …) is replaced wholesale by the overlay.
fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_tbl), toml::Value::Table(overlay_tbl)) => {
            for (key, ov_val) in overlay_tbl {
                let merged = match base_tbl.remove(&key) {
                    Some(base_val) => merge_toml(base_val, ov_val),
                    None => ov_val,
                };
                base_tbl.insert(key, merged);
            }
            toml::Value::Table(base_tbl)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file, follow any `[meta] base = "..."` chain, and return the
/// fully merged `toml::Value`. `visited` carries canonicalized paths already
/// seen in this chain so circular references are caught early.
fn load_raw_merged(path: &Path, visited: &mut HashSet<PathBuf>) -> Result<toml::Value, AppError> {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if !visited.insert(canonical) {
        return Err(AppError::Config(format!(
            "circular base reference detected at: {}",
            path.display()
        )));
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let overlay_val: toml::Value = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    if let Some(base_str) = overlay_val
        .get("meta")
        .and_then(|m| m.get("base"))
        .and_then(|b| b.as_str())
    {
        let base_path = if Path::new(base_str).is_absolute() {
            PathBuf::from(base_str)
        } else {
            path.parent().unwrap_or(Path::new(".")).join(base_str)
        };
        let base_val = load_raw_merged(&base_path, visited)?;
        Ok(merge_toml(base_val, overlay_val))
    } else {
        Ok(overlay_val)
    }
}

fn env_override(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

/// Load config from the given path, or `config/default.toml`, then apply
/// env-var overrides. If neither is present, returns a hardcoded minimal
/// default (so the server boots with no config file at all).
pub fn load(config_path: Option<&str>) -> Result<Config, AppError> {
    if let Some(path) = config_path {
        return load_from(Path::new(path));
    }

    let default_path = Path::new("config/default.toml");
    if default_path.exists() {
        load_from(default_path)
    } else {
        Ok(apply_env_overrides(Config {
            device_id: default_device_id(),
            data_dir: expand_home(&default_data_dir()),
            source_root_host: None,
            api_url: default_api_url(),
            embedding_model: default_embedding_model(),
            chunker: default_chunker(),
            vector_storage: default_vector_storage(),
            use_cuda: false,
            allow_vector_clear: false,
            log_level: default_log_level(),
            http_addr: default_http_addr(),
        }))
    }
}

/// Load, resolve, and env-override a config file at an explicit path.
pub fn load_from(path: &Path) -> Result<Config, AppError> {
    let merged_val = load_raw_merged(path, &mut HashSet::new())?;

    let parsed: RawConfig = serde::Deserialize::deserialize(merged_val)
        .map_err(|e: toml::de::Error| AppError::Config(format!("config error in {}: {e}", path.display())))?;

    let i = parsed.indexer;
    Ok(apply_env_overrides(Config {
        device_id: i.device_id,
        data_dir: expand_home(&i.data_dir),
        source_root_host: i.source_root_host.map(|s| expand_home(&s)),
        api_url: i.api_url,
        embedding_model: parsed.embedding.model,
        chunker: parsed.embedding.chunker,
        vector_storage: parsed.vector_store.backend,
        use_cuda: i.use_cuda,
        allow_vector_clear: i.allow_vector_clear,
        log_level: i.log_level,
        http_addr: i.http_addr,
    }))
}

fn apply_env_overrides(mut cfg: Config) -> Config {
    if let Some(v) = env_override("LOSEME_DEVICE_ID") {
        cfg.device_id = v;
    }
    if let Some(v) = env_override("LOSEME_DATA_DIR") {
        cfg.data_dir = expand_home(&v);
    }
    if let Some(v) = env_override("LOSEME_SOURCE_ROOT_HOST") {
        cfg.source_root_host = Some(expand_home(&v));
    }
    if let Some(v) = env_override("LOSEME_API_URL") {
        cfg.api_url = v;
    }
    if let Some(v) = env_override("LOSEME_EMBEDDING_MODEL") {
        cfg.embedding_model = v;
    }
    if let Some(v) = env_override("LOSEME_CHUNKER") {
        cfg.chunker = v;
    }
    if let Some(v) = env_override("LOSEME_VECTOR_STORAGE") {
        cfg.vector_storage = v;
    }
    if let Some(v) = env_override("LOSEME_USE_CUDA") {
        cfg.use_cuda = v == "1" || v.eq_ignore_ascii_case("true");
    }
    if let Some(v) = env_override("LOSEME_ALLOW_VECTOR_CLEAR") {
        cfg.allow_vector_clear = v == "1" || v.eq_ignore_ascii_case("true");
    }
    if let Some(v) = env_override("LOSEME_LOG_LEVEL") {
        cfg.log_level = v;
    }
    if let Some(v) = env_override("LOSEME_HTTP_ADDR") {
        cfg.http_addr = v;
    }
    cfg
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

// ── test helpers ──────────────────────────────────────────────────────────────

/// Safe `Config` for unit tests — in-memory vector store, dummy embedder, no
/// network or external calls.
#[cfg(test)]
impl Config {
    pub fn test_default(data_dir: &Path) -> Self {
        Self {
            device_id: "test-device".into(),
            data_dir: data_dir.to_path_buf(),
            source_root_host: None,
            api_url: "http://localhost:0".into(),
            embedding_model: "dummy".into(),
            chunker: "simple".into(),
            vector_storage: "in-memory".into(),
            use_cuda: false,
            allow_vector_clear: true,
            log_level: "debug".into(),
            http_addr: "127.0.0.1:0".into(),
        }
    }
}
