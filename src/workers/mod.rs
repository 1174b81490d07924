//! Discovery and Indexing Workers (SPEC_FULL.md §4.6/§4.7) — the two
//! background `Component`s a Run Controller spawns per run.

mod discovery;
mod indexing;

pub use discovery::DiscoveryWorker;
pub use indexing::{process_entry, IndexingWorker};
