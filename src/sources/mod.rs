//! Ingestion Source (SPEC_FULL.md §4.5): per source-kind producer that walks
//! a [`Scope`](crate::domain::Scope) and emits [`Document`]s.

mod email;
mod filesystem;

pub use email::EmailSource;
pub use filesystem::FilesystemSource;

use crate::domain::Document;
use crate::error::AppError;

/// A callback polled between documents so a long-running walk can be
/// interrupted cooperatively — the Rust analogue of the original's
/// `should_stop: Optional[Callable[[], bool]]` constructor argument.
pub type ShouldStop = std::sync::Arc<dyn Fn() -> bool + Send + Sync>;

pub trait IngestionSource: Send {
    fn kind(&self) -> &str;

    /// Walk the source eagerly, returning every document not filtered out
    /// before `should_stop` first returns true. Real deployments with very
    /// large scopes would stream this through a channel instead; this crate
    /// keeps it a `Vec` since the Discovery Worker consumes it in one pass
    /// and the whole pipeline is already durable via the work queue.
    fn iter_documents(&self) -> Result<Vec<Document>, AppError>;
}
