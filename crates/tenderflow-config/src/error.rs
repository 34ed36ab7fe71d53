//! Errors raised while reading, merging, or validating config layers.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    ReadFailed(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    ParseFailed(#[from] json5::Error),
    #[error("failed to decode config: {0}")]
    DecodeFailed(#[from] serde_json::Error),
    /// A field failed schema checks; `path` is `layer:dotted.key`.
    #[error("invalid config at {path}: {message}")]
    InvalidField { path: String, message: String },
    #[error("invalid config: {0}")]
    Invalid(String),
    /// No explicit memory path and no home directory to default into.
    #[error("cannot resolve memory directory: no home directory and memory.path unset")]
    NoMemoryRoot,
}
