//! JSONL rollout store: one append-only event log per session.

use crate::error::MemoryError;
use crate::model::{MemoryRecord, SessionLog};
use crate::store::MemoryStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tenderflow_protocol::{RecordKind, SessionId, StagePayload};
use uuid::Uuid;

const SCHEMA_VERSION: u32 = 1;

/// Internal JSONL event representation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RolloutEvent {
    SchemaVersion {
        version: u32,
    },
    Record {
        record: MemoryRecord,
    },
    Cleared {
        #[serde(default)]
        kind: Option<RecordKind>,
        cleared_at: DateTime<Utc>,
    },
}

/// File-backed store keeping `<root>/<session_id>.jsonl` rollouts.
///
/// Replaying a rollout rebuilds both the live records and the highest
/// sequence number ever issued per kind, so ids stay unique across restarts.
pub struct FileMemoryStore {
    /// Root directory for session rollouts.
    root: PathBuf,
    /// Serialize rollout reads against sequence assignment and appends.
    write_lock: Mutex<()>,
}

impl FileMemoryStore {
    /// Create a store under the given root, creating the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, MemoryError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        info!("initialized file memory store (root={})", root.display());
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn rollout_path(&self, session_id: SessionId) -> PathBuf {
        self.root.join(format!("{session_id}.jsonl"))
    }

    /// Rebuild a session from its rollout; missing files yield an empty log.
    fn read_rollout(&self, session_id: SessionId) -> Result<SessionLog, MemoryError> {
        let path = self.rollout_path(session_id);
        let mut log = SessionLog::default();
        if !path.exists() {
            return Ok(log);
        }
        let file = OpenOptions::new().read(true).open(&path)?;
        let mut lines = BufReader::new(file).lines().peekable();
        while let Some(line) = lines.next() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let event = match serde_json::from_str::<RolloutEvent>(&line) {
                Ok(event) => event,
                // A torn final line is an append that never completed.
                Err(err) if lines.peek().is_none() => {
                    warn!(
                        "skipping incomplete rollout line (session_id={}, error={})",
                        session_id, err
                    );
                    break;
                }
                Err(err) => return Err(err.into()),
            };
            match event {
                RolloutEvent::SchemaVersion { version } => {
                    if version > SCHEMA_VERSION {
                        return Err(MemoryError::UnsupportedSchema(version));
                    }
                }
                RolloutEvent::Record { record } => log.replay(record),
                RolloutEvent::Cleared { kind, .. } => {
                    log.clear(kind);
                }
            }
        }
        Ok(log)
    }

    /// Cut a final line that has no newline, left by an append that never completed.
    fn trim_torn_tail(&self, session_id: SessionId, path: &Path) -> Result<u64, MemoryError> {
        let contents = fs::read(path)?;
        if contents.last().is_none_or(|byte| *byte == b'\n') {
            return Ok(contents.len() as u64);
        }
        let keep = contents
            .iter()
            .rposition(|byte| *byte == b'\n')
            .map_or(0, |pos| pos + 1) as u64;
        warn!(
            "trimming incomplete rollout tail (session_id={}, bytes={})",
            session_id,
            contents.len() as u64 - keep
        );
        OpenOptions::new().write(true).open(path)?.set_len(keep)?;
        Ok(keep)
    }

    /// Append an event, writing the schema header first for new rollouts.
    fn append_event(&self, session_id: SessionId, event: &RolloutEvent) -> Result<(), MemoryError> {
        let path = self.rollout_path(session_id);
        let is_new = !path.exists() || self.trim_torn_tail(session_id, &path)? == 0;
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        if is_new {
            let header = serde_json::to_string(&RolloutEvent::SchemaVersion {
                version: SCHEMA_VERSION,
            })?;
            writeln!(file, "{header}")?;
        }
        let line = serde_json::to_string(event)?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}

#[async_trait]
impl MemoryStore for FileMemoryStore {
    async fn store(
        &self,
        session_id: SessionId,
        payload: StagePayload,
    ) -> Result<MemoryRecord, MemoryError> {
        payload.validate()?;
        let kind = payload.kind();
        let _guard = self.write_lock.lock();
        let mut log = self.read_rollout(session_id)?;
        let sequence = log.next_sequence(kind);
        let record = MemoryRecord::new(session_id, sequence, payload)?;
        self.append_event(
            session_id,
            &RolloutEvent::Record {
                record: record.clone(),
            },
        )?;
        debug!(
            "appended record event (session_id={}, id={}, content_len={})",
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
        let _guard = self.write_lock.lock();
        Ok(self.read_rollout(session_id)?.select(kind))
    }

    async fn clear(
        &self,
        session_id: SessionId,
        kind: Option<RecordKind>,
    ) -> Result<usize, MemoryError> {
        let _guard = self.write_lock.lock();
        if !self.rollout_path(session_id).exists() {
            warn!("session rollout not found (session_id={})", session_id);
            return Ok(0);
        }
        let mut log = self.read_rollout(session_id)?;
        let removed = log.clear(kind);
        self.append_event(
            session_id,
            &RolloutEvent::Cleared {
                kind,
                cleared_at: Utc::now(),
            },
        )?;
        info!(
            "cleared session records (session_id={}, kind={}, removed={})",
            session_id,
            kind.map(|kind| kind.as_str()).unwrap_or("all"),
            removed
        );
        Ok(removed)
    }

    async fn list_sessions(&self) -> Result<Vec<SessionId>, MemoryError> {
        let mut sessions = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("jsonl") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            if let Ok(session_id) = Uuid::parse_str(stem) {
                sessions.push(session_id);
            }
        }
        sessions.sort();
        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::FileMemoryStore;
    use crate::MemoryStore;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;
    use tenderflow_protocol::{DiagramKind, RecordKind, StagePayload, Visualization};
    use uuid::Uuid;

    fn diagram(code: &str) -> StagePayload {
        StagePayload::Visualization(Visualization {
            diagram_type: DiagramKind::ProjectWorkflow,
            mermaid_code: code.to_string(),
            description: "workflow".to_string(),
        })
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let temp = tempdir().expect("tempdir");
        let session = Uuid::new_v4();
        {
            let store = FileMemoryStore::new(temp.path()).expect("store");
            store.store(session, diagram("graph TD")).await.expect("store");
            store.store(session, diagram("graph LR")).await.expect("store");
        }
        let store = FileMemoryStore::new(temp.path()).expect("reopen");
        let latest = store
            .get_latest(session, RecordKind::Visualization)
            .await
            .expect("latest")
            .expect("record");
        assert_eq!(latest.id, "visualization_1");
        assert_eq!(store.list_sessions().await.expect("sessions"), vec![session]);
    }

    #[tokio::test]
    async fn clear_is_replayed_and_ids_are_not_reused() {
        let temp = tempdir().expect("tempdir");
        let session = Uuid::new_v4();
        let store = FileMemoryStore::new(temp.path()).expect("store");
        store.store(session, diagram("graph TD")).await.expect("store");
        store.store(session, diagram("graph TD")).await.expect("store");
        assert_eq!(store.clear(session, None).await.expect("clear"), 2);

        let reopened = FileMemoryStore::new(temp.path()).expect("reopen");
        assert!(
            reopened
                .get_all(session, RecordKind::Visualization)
                .await
                .expect("all")
                .is_empty()
        );
        let record = reopened
            .store(session, diagram("graph TD"))
            .await
            .expect("store");
        assert_eq!(record.id, "visualization_2");
    }

    #[tokio::test]
    async fn clearing_unknown_session_is_noop() {
        let temp = tempdir().expect("tempdir");
        let store = FileMemoryStore::new(temp.path()).expect("store");
        assert_eq!(store.clear(Uuid::new_v4(), None).await.expect("clear"), 0);
    }

    #[tokio::test]
    async fn reads_skip_a_torn_final_line() {
        let temp = tempdir().expect("tempdir");
        let session = Uuid::new_v4();
        let store = FileMemoryStore::new(temp.path()).expect("store");
        store.store(session, diagram("graph TD")).await.expect("store");
        let path = store.root().join(format!("{session}.jsonl"));
        let mut rollout = fs::read_to_string(&path).expect("read");
        rollout.push_str("{\"type\":\"record\",\"record\":{\"id\":");
        fs::write(&path, rollout).expect("write");

        let records = store
            .get_all(session, RecordKind::Visualization)
            .await
            .expect("all");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "visualization_0");

        let record = store.store(session, diagram("graph LR")).await.expect("store");
        assert_eq!(record.id, "visualization_1");
        let ids: Vec<String> = store
            .get_all(session, RecordKind::Visualization)
            .await
            .expect("all")
            .into_iter()
            .map(|record| record.id)
            .collect();
        assert_eq!(ids, vec!["visualization_0", "visualization_1"]);
    }

    #[tokio::test]
    async fn corrupt_line_before_the_end_is_an_error() {
        let temp = tempdir().expect("tempdir");
        let session = Uuid::new_v4();
        fs::write(
            temp.path().join(format!("{session}.jsonl")),
            "{\"type\":\"schema_version\",\"version\":1}\nnot json\n{\"type\":\"schema_version\",\"version\":1}\n",
        )
        .expect("write");
        let store = FileMemoryStore::new(temp.path()).expect("store");
        assert!(
            store
                .get_all(session, RecordKind::Visualization)
                .await
                .is_err()
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_reads_see_whole_records() {
        let temp = tempdir().expect("tempdir");
        let session = Uuid::new_v4();
        let store = std::sync::Arc::new(FileMemoryStore::new(temp.path()).expect("store"));
        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                for _ in 0..20 {
                    store.store(session, diagram("graph TD")).await.expect("store");
                }
            })
        };
        let mut last_seen = 0;
        for _ in 0..20 {
            let records = store
                .get_all(session, RecordKind::Visualization)
                .await
                .expect("read during writes");
            assert!(records.len() >= last_seen);
            last_seen = records.len();
            tokio::task::yield_now().await;
        }
        writer.await.expect("writer");
        let records = store
            .get_all(session, RecordKind::Visualization)
            .await
            .expect("all");
        assert_eq!(records.len(), 20);
        assert_eq!(records[19].id, "visualization_19");
    }

    #[tokio::test]
    async fn rejects_newer_schema() {
        let temp = tempdir().expect("tempdir");
        let session = Uuid::new_v4();
        fs::write(
            temp.path().join(format!("{session}.jsonl")),
            "{\"type\":\"schema_version\",\"version\":9}\n",
        )
        .expect("write");
        let store = FileMemoryStore::new(temp.path()).expect("store");
        let err = store
            .get_all(session, RecordKind::Visualization)
            .await
            .expect_err("schema");
        assert!(err.to_string().contains("unsupported schema version: 9"));
    }
}
