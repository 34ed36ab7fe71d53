//! Session-partitioned store for stage outputs.

pub mod error;
pub mod file;
pub mod handle;
pub mod model;
pub mod store;

/// Memory error type.
pub use error::MemoryError;
/// JSONL-backed store.
pub use file::FileMemoryStore;
/// Failure-tolerant facade used by stages.
pub use handle::MemoryHandle;
/// Memory record model.
pub use model::{MemoryRecord, render_content};
/// Store interface and in-process implementation.
pub use store::{InMemoryStore, MemoryStore};
