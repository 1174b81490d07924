//! Application-wide error types.
//!
//! Variants are kinds, not type names, matching the error taxonomy in
//! SPEC_FULL.md §7/§10.2: NotFound, Validation, Conflict, ExtractionSkipped,
//! Transient, Fatal, plus the ambient Config/Io/Json wrappers.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("extraction skipped: {0}")]
    ExtractionSkipped(String),

    #[error("transient error: {0}")]
    Transient(String),

    #[error("fatal error: {0}")]
    Fatal(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("worker error: {0}")]
    Worker(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// HTTP status code for this error kind, per SPEC_FULL.md §7.
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::NotFound(_) => 404,
            AppError::Validation(_) => 400,
            AppError::Conflict(_) => 409,
            AppError::ExtractionSkipped(_) => 200,
            _ => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn config_error_display() {
        let e = AppError::Config("missing field".into());
        assert!(e.to_string().contains("missing field"));
    }

    #[test]
    fn not_found_maps_to_404() {
        let e = AppError::NotFound("run x".into());
        assert_eq!(e.status_code(), 404);
    }

    #[test]
    fn conflict_maps_to_409() {
        let e = AppError::Conflict("duplicate scope".into());
        assert_eq!(e.status_code(), 409);
    }

    #[test]
    fn fatal_maps_to_500() {
        let e = AppError::Fatal("storage unreachable".into());
        assert_eq!(e.status_code(), 500);
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let e: AppError = io_err.into();
        assert!(e.to_string().contains("io error"));
        let _: &dyn Error = &e;
    }
}
