//! Error types for memory operations.

use tenderflow_protocol::PayloadError;

/// Errors returned by memory stores.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Payload rejected at the store boundary.
    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] PayloadError),
    /// Rollout written by a newer schema.
    #[error("unsupported schema version: {0}")]
    UnsupportedSchema(u32),
    /// Backing store cannot be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
