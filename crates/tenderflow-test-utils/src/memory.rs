use async_trait::async_trait;
use tenderflow_memory::{MemoryError, MemoryRecord, MemoryStore};
use tenderflow_protocol::{RecordKind, SessionId, StagePayload};

/// Store whose every operation fails as if the backend were down.
#[derive(Debug, Clone, Default)]
pub struct UnreachableStore;

fn unavailable() -> MemoryError {
    MemoryError::Unavailable("store unreachable".to_string())
}

#[async_trait]
impl MemoryStore for UnreachableStore {
    async fn store(
        &self,
        _session_id: SessionId,
        _payload: StagePayload,
    ) -> Result<MemoryRecord, MemoryError> {
        Err(unavailable())
    }

    async fn records(
        &self,
        _session_id: SessionId,
        _kind: Option<RecordKind>,
    ) -> Result<Vec<MemoryRecord>, MemoryError> {
        Err(unavailable())
    }

    async fn clear(
        &self,
        _session_id: SessionId,
        _kind: Option<RecordKind>,
    ) -> Result<usize, MemoryError> {
        Err(unavailable())
    }

    async fn list_sessions(&self) -> Result<Vec<SessionId>, MemoryError> {
        Err(unavailable())
    }
}
