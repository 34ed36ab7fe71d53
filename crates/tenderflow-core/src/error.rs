//! Error types for stages, collaborators, and the workflow controller.

use crate::stages::StageOutcome;
use std::collections::BTreeMap;
use tenderflow_config::ConfigError;
use tenderflow_memory::MemoryError;
use tenderflow_protocol::{RecordKind, SessionId};
use thiserror::Error;

/// Failures raised by external collaborators (documents, model, renderer).
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("unsupported file type: {0}")]
    UnsupportedFile(String),
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("model request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("model endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("model returned no content")]
    EmptyResponse,
    #[error("model is not configured: {0}")]
    NotConfigured(String),
    #[error("diagram rendering failed: {0}")]
    Render(String),
}

/// Failure of a single stage. Every variant names the stage that failed.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("{stage} stage is missing input: {detail}")]
    MissingInput { stage: RecordKind, detail: String },
    #[error("{stage} stage requires a {prerequisite} record; run {prerequisite} first")]
    PrerequisiteMissing {
        stage: RecordKind,
        prerequisite: RecordKind,
    },
    #[error("{stage} stage could not read the tender document: {message}")]
    Document { stage: RecordKind, message: String },
    #[error("{stage} stage language model call failed: {message}")]
    Model { stage: RecordKind, message: String },
    #[error("{stage} stage failed to store its output: {source}")]
    Memory {
        stage: RecordKind,
        #[source]
        source: MemoryError,
    },
}

impl StageError {
    /// Stage that raised the error.
    pub fn stage(&self) -> RecordKind {
        match self {
            StageError::MissingInput { stage, .. }
            | StageError::PrerequisiteMissing { stage, .. }
            | StageError::Document { stage, .. }
            | StageError::Model { stage, .. }
            | StageError::Memory { stage, .. } => *stage,
        }
    }
}

/// A full workflow run stopped at `stage`; earlier results are kept.
#[derive(Debug, Error)]
#[error("workflow aborted at {stage}: {source}")]
pub struct WorkflowAborted {
    pub stage: RecordKind,
    #[source]
    pub source: StageError,
    pub workflow_results: BTreeMap<RecordKind, StageOutcome>,
}

/// Errors returned by orchestrator queries and wiring.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Stage(#[from] StageError),
    #[error(transparent)]
    Workflow(#[from] Box<WorkflowAborted>),
    #[error("no tender analysis found for session {0}; run tender analysis first")]
    NoAnalysis(SessionId),
    #[error("no technical proposal found for session {0}; complete the workflow first")]
    NoProposal(SessionId),
    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("model setup failed: {0}")]
    Model(#[from] CollaboratorError),
    #[error("stage task failed: {0}")]
    Join(String),
}
