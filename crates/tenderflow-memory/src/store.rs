//! Memory store abstraction and the in-process implementation.

use crate::error::MemoryError;
use crate::model::{MemoryRecord, SessionLog};
use async_trait::async_trait;
use log::{debug, info};
use parking_lot::RwLock;
use std::collections::HashMap;
use tenderflow_protocol::{RecordKind, SessionId, StagePayload};

#[async_trait]
/// Session-partitioned record store shared by every stage.
///
/// Every call names the session it operates on; there is no ambient session.
pub trait MemoryStore: Send + Sync {
    /// Validate and append a payload, assigning the next `{kind}_{seq}` id.
    async fn store(
        &self,
        session_id: SessionId,
        payload: StagePayload,
    ) -> Result<MemoryRecord, MemoryError>;

    /// All records of a session in store order, optionally filtered by kind.
    async fn records(
        &self,
        session_id: SessionId,
        kind: Option<RecordKind>,
    ) -> Result<Vec<MemoryRecord>, MemoryError>;

    /// Remove records of `kind`, or every record when `None`. Irreversible.
    async fn clear(
        &self,
        session_id: SessionId,
        kind: Option<RecordKind>,
    ) -> Result<usize, MemoryError>;

    /// Sessions that have backing storage.
    async fn list_sessions(&self) -> Result<Vec<SessionId>, MemoryError>;

    /// Case-insensitive substring search over record content.
    async fn search(
        &self,
        session_id: SessionId,
        query: &str,
        kind: Option<RecordKind>,
    ) -> Result<Vec<MemoryRecord>, MemoryError> {
        let needle = query.to_lowercase();
        let mut records = self.records(session_id, kind).await?;
        records.retain(|record| record.content.to_lowercase().contains(&needle));
        debug!(
            "searched memory (session_id={}, query_len={}, matches={})",
            session_id,
            query.len(),
            records.len()
        );
        Ok(records)
    }

    /// Most recently appended record of `kind`.
    async fn get_latest(
        &self,
        session_id: SessionId,
        kind: RecordKind,
    ) -> Result<Option<MemoryRecord>, MemoryError> {
        Ok(self.records(session_id, Some(kind)).await?.pop())
    }

    /// Every record of `kind` in insertion order.
    async fn get_all(
        &self,
        session_id: SessionId,
        kind: RecordKind,
    ) -> Result<Vec<MemoryRecord>, MemoryError> {
        self.records(session_id, Some(kind)).await
    }
}

/// Process-local store; contents are lost when the process exits.
#[derive(Default)]
pub struct InMemoryStore {
    sessions: RwLock<HashMap<SessionId, SessionLog>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn store(
        &self,
        session_id: SessionId,
        payload: StagePayload,
    ) -> Result<MemoryRecord, MemoryError> {
        payload.validate()?;
        let kind = payload.kind();
        let mut sessions = self.sessions.write();
        let log = sessions.entry(session_id).or_default();
        let sequence = log.next_sequence(kind);
        let record = MemoryRecord::new(session_id, sequence, payload)?;
        log.records.push(record.clone());
        debug!(
            "stored memory record (session_id={}, id={}, content_len={})",
            session_id,
            record.id,
            record.content.len()
        );
        Ok(record)
    }

    async fn records(
        &self,
        session_id: SessionId,
        kind: Option<RecordKind>,
    ) -> Result<Vec<MemoryRecord>, MemoryError> {
        let sessions = self.sessions.read();
        Ok(sessions
            .get(&session_id)
            .map(|log| log.select(kind))
            .unwrap_or_default())
    }

    async fn clear(
        &self,
        session_id: SessionId,
        kind: Option<RecordKind>,
    ) -> Result<usize, MemoryError> {
        let mut sessions = self.sessions.write();
        let removed = sessions
            .get_mut(&session_id)
            .map(|log| log.clear(kind))
            .unwrap_or(0);
        info!(
            "cleared memory (session_id={}, kind={}, removed={})",
            session_id,
            kind.map(|kind| kind.as_str()).unwrap_or("all"),
            removed
        );
        Ok(removed)
    }

    async fn list_sessions(&self) -> Result<Vec<SessionId>, MemoryError> {
        let mut sessions: Vec<SessionId> = self.sessions.read().keys().copied().collect();
        sessions.sort();
        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::{InMemoryStore, MemoryStore};
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;
    use std::sync::Arc;
    use tenderflow_protocol::{DiagramKind, RecordKind, StagePayload, Visualization};
    use uuid::Uuid;

    fn diagram(kind: DiagramKind, code: &str) -> StagePayload {
        StagePayload::Visualization(Visualization {
            diagram_type: kind,
            mermaid_code: code.to_string(),
            description: kind.description().to_string(),
        })
    }

    #[tokio::test]
    async fn latest_follows_append_order() {
        let store = InMemoryStore::new();
        let session = Uuid::new_v4();
        for code in ["graph TD", "graph LR", "erDiagram"] {
            store
                .store(session, diagram(DiagramKind::DataFlow, code))
                .await
                .expect("store");
        }
        let latest = store
            .get_latest(session, RecordKind::Visualization)
            .await
            .expect("latest")
            .expect("record");
        assert_eq!(latest.id, "visualization_2");
        let all = store
            .get_all(session, RecordKind::Visualization)
            .await
            .expect("all");
        let ids: Vec<&str> = all.iter().map(|record| record.id.as_str()).collect();
        assert_eq!(ids, vec!["visualization_0", "visualization_1", "visualization_2"]);
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let store = InMemoryStore::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        store
            .store(first, diagram(DiagramKind::Sequence, "sequenceDiagram"))
            .await
            .expect("store");
        let other = store
            .get_all(second, RecordKind::Visualization)
            .await
            .expect("all");
        assert!(other.is_empty());
        let record = store
            .store(second, diagram(DiagramKind::Sequence, "sequenceDiagram"))
            .await
            .expect("store");
        assert_eq!(record.id, "visualization_0");
    }

    #[tokio::test]
    async fn search_is_case_insensitive_and_filters_kind() {
        let store = InMemoryStore::new();
        let session = Uuid::new_v4();
        store
            .store(session, diagram(DiagramKind::DatabaseEr, "erDiagram"))
            .await
            .expect("store");
        let hits = store
            .search(session, "ENTITY-RELATIONSHIP", None)
            .await
            .expect("search");
        assert_eq!(hits.len(), 1);
        let filtered = store
            .search(session, "entity", Some(RecordKind::ProjectPlan))
            .await
            .expect("search");
        assert!(filtered.is_empty());
    }

    #[tokio::test]
    async fn clear_keeps_sequence_monotonic() {
        let store = InMemoryStore::new();
        let session = Uuid::new_v4();
        store
            .store(session, diagram(DiagramKind::Infrastructure, "graph TD"))
            .await
            .expect("store");
        let removed = store
            .clear(session, Some(RecordKind::Visualization))
            .await
            .expect("clear");
        assert_eq!(removed, 1);
        let record = store
            .store(session, diagram(DiagramKind::Infrastructure, "graph TD"))
            .await
            .expect("store");
        assert_eq!(record.id, "visualization_1");
    }

    #[tokio::test]
    async fn rejects_invalid_payload() {
        let store = InMemoryStore::new();
        let session = Uuid::new_v4();
        let err = store
            .store(session, diagram(DiagramKind::Sequence, ""))
            .await
            .expect_err("invalid");
        assert!(err.to_string().contains("invalid payload"));
        assert!(store.list_sessions().await.expect("sessions").is_empty());
    }

    #[tokio::test]
    async fn concurrent_writers_get_unique_ids() {
        let store = Arc::new(InMemoryStore::new());
        let session = Uuid::new_v4();
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .store(session, diagram(DiagramKind::DataFlow, "graph LR"))
                    .await
                    .expect("store")
                    .id
            }));
        }
        let mut ids = HashSet::new();
        for handle in handles {
            ids.insert(handle.await.expect("join"));
        }
        assert_eq!(ids.len(), 16);
    }
}
