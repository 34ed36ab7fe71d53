//! Memory record model and content rendering.

use crate::error::MemoryError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tenderflow_protocol::{RecordKind, SessionId, StagePayload};

/// A persisted stage output. Records are immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// `{kind}_{sequence}`, unique within a session.
    pub id: String,
    pub session_id: SessionId,
    pub kind: RecordKind,
    pub sequence: u64,
    /// Text rendering of the payload, used for search.
    pub content: String,
    pub payload: StagePayload,
    pub created_at: DateTime<Utc>,
}

impl MemoryRecord {
    /// Build a record for the given sequence number.
    pub fn new(
        session_id: SessionId,
        sequence: u64,
        payload: StagePayload,
    ) -> Result<Self, MemoryError> {
        let kind = payload.kind();
        let content = render_content(&payload)?;
        Ok(Self {
            id: record_id(kind, sequence),
            session_id,
            kind,
            sequence,
            content,
            payload,
            created_at: Utc::now(),
        })
    }
}

/// Format a record id.
pub fn record_id(kind: RecordKind, sequence: u64) -> String {
    format!("{}_{}", kind.as_str(), sequence)
}

/// Render the searchable content for a payload.
pub fn render_content(payload: &StagePayload) -> Result<String, MemoryError> {
    let body = match payload {
        StagePayload::Visualization(visualization) => {
            return Ok(format!(
                "Visualization ({}): {}\n\nMermaid Code:\n{}",
                visualization.diagram_type, visualization.description, visualization.mermaid_code
            ));
        }
        StagePayload::TenderAnalysis(value) => serde_json::to_string_pretty(value)?,
        StagePayload::SolutionStrategy(value) => serde_json::to_string_pretty(value)?,
        StagePayload::ProjectPlan(value) => serde_json::to_string_pretty(value)?,
        StagePayload::TechnicalProposal(value) => serde_json::to_string_pretty(value)?,
    };
    Ok(format!("{}: {}", payload.kind().label(), body))
}

/// Records for one session plus the per-kind sequence counters.
///
/// Counters only grow: clearing records never rewinds them, so ids are never
/// reused within a session.
#[derive(Debug, Default, Clone)]
pub(crate) struct SessionLog {
    pub(crate) records: Vec<MemoryRecord>,
    counters: HashMap<RecordKind, u64>,
}

impl SessionLog {
    /// Reserve the next sequence number for `kind`.
    pub(crate) fn next_sequence(&mut self, kind: RecordKind) -> u64 {
        let counter = self.counters.entry(kind).or_insert(0);
        let sequence = *counter;
        *counter += 1;
        sequence
    }

    /// Apply a record read back from storage, keeping counters ahead of it.
    pub(crate) fn replay(&mut self, record: MemoryRecord) {
        let counter = self.counters.entry(record.kind).or_insert(0);
        *counter = (*counter).max(record.sequence + 1);
        self.records.push(record);
    }

    /// Drop records of `kind` (or all), returning how many were removed.
    pub(crate) fn clear(&mut self, kind: Option<RecordKind>) -> usize {
        let before = self.records.len();
        match kind {
            Some(kind) => self.records.retain(|record| record.kind != kind),
            None => self.records.clear(),
        }
        before - self.records.len()
    }

    /// Records in store order, optionally filtered by kind.
    pub(crate) fn select(&self, kind: Option<RecordKind>) -> Vec<MemoryRecord> {
        self.records
            .iter()
            .filter(|record| kind.is_none_or(|kind| record.kind == kind))
            .cloned()
            .collect()
    }
}
