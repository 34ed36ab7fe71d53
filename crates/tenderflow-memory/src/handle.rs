//! Failure-tolerant facade over a shared [`MemoryStore`].

use crate::error::MemoryError;
use crate::model::MemoryRecord;
use crate::store::{InMemoryStore, MemoryStore};
use log::warn;
use std::sync::Arc;
use tenderflow_protocol::{RecordKind, SessionId, StagePayload};

/// Shared handle passed to stages and the controller.
///
/// Reads degrade to empty results when the backing store fails, so a flaky
/// store looks like an empty one. Writes and clears still report errors.
#[derive(Clone)]
pub struct MemoryHandle {
    store: Arc<dyn MemoryStore>,
}

impl MemoryHandle {
    pub fn new(store: Arc<dyn MemoryStore>) -> Self {
        Self { store }
    }

    /// Handle over a fresh process-local store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStore::new()))
    }

    /// Underlying store.
    pub fn backend(&self) -> Arc<dyn MemoryStore> {
        self.store.clone()
    }

    pub async fn store(
        &self,
        session_id: SessionId,
        payload: StagePayload,
    ) -> Result<MemoryRecord, MemoryError> {
        self.store.store(session_id, payload).await
    }

    pub async fn search(
        &self,
        session_id: SessionId,
        query: &str,
        kind: Option<RecordKind>,
    ) -> Vec<MemoryRecord> {
        match self.store.search(session_id, query, kind).await {
            Ok(records) => records,
            Err(err) => {
                warn!(
                    "memory search failed, returning no results (session_id={}, error={})",
                    session_id, err
                );
                Vec::new()
            }
        }
    }

    pub async fn get_latest(&self, session_id: SessionId, kind: RecordKind) -> Option<MemoryRecord> {
        match self.store.get_latest(session_id, kind).await {
            Ok(record) => record,
            Err(err) => {
                warn!(
                    "memory lookup failed, treating as absent (session_id={}, kind={}, error={})",
                    session_id, kind, err
                );
                None
            }
        }
    }

    pub async fn get_all(&self, session_id: SessionId, kind: RecordKind) -> Vec<MemoryRecord> {
        match self.store.get_all(session_id, kind).await {
            Ok(records) => records,
            Err(err) => {
                warn!(
                    "memory listing failed, returning no records (session_id={}, kind={}, error={})",
                    session_id, kind, err
                );
                Vec::new()
            }
        }
    }

    pub async fn clear(
        &self,
        session_id: SessionId,
        kind: Option<RecordKind>,
    ) -> Result<usize, MemoryError> {
        self.store.clear(session_id, kind).await
    }

    pub async fn list_sessions(&self) -> Result<Vec<SessionId>, MemoryError> {
        self.store.list_sessions().await
    }

    /// One line per stored stage output, or `"No information stored yet."`.
    pub async fn context_summary(&self, session_id: SessionId) -> String {
        let mut lines = Vec::new();
        for kind in RecordKind::ALL {
            if kind == RecordKind::Visualization {
                let count = self.get_all(session_id, kind).await.len();
                if count > 0 {
                    lines.push(format!("Visualizations: {count} diagrams"));
                }
            } else if self.get_latest(session_id, kind).await.is_some() {
                lines.push(format!("{}: Available", kind.label()));
            }
        }
        if lines.is_empty() {
            return "No information stored yet.".to_string();
        }
        lines.join("\n")
    }
}
