use crate::error::CollaboratorError;
use async_trait::async_trait;
use log::debug;
use std::path::PathBuf;

/// Turns tender documents on disk into plain text.
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    async fn extract(&self, paths: &[PathBuf]) -> Result<String, CollaboratorError>;
}

/// Reads `.txt` and `.md` files; documents are joined with a blank line.
#[derive(Debug, Default, Clone)]
pub struct PlainTextExtractor;

impl PlainTextExtractor {
    fn is_supported(path: &std::path::Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "txt" | "md"))
            .unwrap_or(false)
    }
}

#[async_trait]
impl DocumentExtractor for PlainTextExtractor {
    async fn extract(&self, paths: &[PathBuf]) -> Result<String, CollaboratorError> {
        let mut parts = Vec::with_capacity(paths.len());
        for path in paths {
            if !Self::is_supported(path) {
                return Err(CollaboratorError::UnsupportedFile(path.display().to_string()));
            }
            let text = tokio::fs::read_to_string(path)
                .await
                .map_err(|source| CollaboratorError::Read {
                    path: path.display().to_string(),
                    source,
                })?;
            debug!(
                "extracted document text (path={}, chars={})",
                path.display(),
                text.len()
            );
            parts.push(text);
        }
        Ok(parts.join("\n\n"))
    }
}
