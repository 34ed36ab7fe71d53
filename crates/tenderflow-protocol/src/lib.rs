//! Data contracts shared by every tenderflow stage, the memory store, and the controller.

mod payload;
mod workflow;

pub use payload::*;
pub use workflow::{
    NEXT_STEP_COMPLETE, Priority, ProposalStatus, ProposalSummary, TriageResult, WorkflowProgress,
    WorkflowState,
};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for a proposal session.
pub type SessionId = Uuid;

/// Type tag for stored records, one per pipeline stage output.
///
/// Variants are declared in canonical pipeline order, so `Ord` follows the
/// workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    TenderAnalysis,
    SolutionStrategy,
    Visualization,
    ProjectPlan,
    TechnicalProposal,
}

impl RecordKind {
    /// All kinds in canonical pipeline order.
    pub const ALL: [RecordKind; 5] = [
        RecordKind::TenderAnalysis,
        RecordKind::SolutionStrategy,
        RecordKind::Visualization,
        RecordKind::ProjectPlan,
        RecordKind::TechnicalProposal,
    ];

    /// Stable snake_case name used in ids and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::TenderAnalysis => "tender_analysis",
            RecordKind::SolutionStrategy => "solution_strategy",
            RecordKind::Visualization => "visualization",
            RecordKind::ProjectPlan => "project_plan",
            RecordKind::TechnicalProposal => "technical_proposal",
        }
    }

    /// Human-readable label used in rendered content and summaries.
    pub fn label(&self) -> &'static str {
        match self {
            RecordKind::TenderAnalysis => "Tender Analysis",
            RecordKind::SolutionStrategy => "Solution Strategy",
            RecordKind::Visualization => "Visualization",
            RecordKind::ProjectPlan => "Project Plan",
            RecordKind::TechnicalProposal => "Technical Proposal",
        }
    }

    /// Zero-based position in the pipeline.
    pub fn position(&self) -> usize {
        match self {
            RecordKind::TenderAnalysis => 0,
            RecordKind::SolutionStrategy => 1,
            RecordKind::Visualization => 2,
            RecordKind::ProjectPlan => 3,
            RecordKind::TechnicalProposal => 4,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = PayloadError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "tender_analysis" | "analysis" => Ok(RecordKind::TenderAnalysis),
            "solution_strategy" | "strategy" => Ok(RecordKind::SolutionStrategy),
            "visualization" | "visualizations" => Ok(RecordKind::Visualization),
            "project_plan" | "plan" => Ok(RecordKind::ProjectPlan),
            "technical_proposal" | "proposal" => Ok(RecordKind::TechnicalProposal),
            _ => Err(PayloadError::UnknownKind(value.to_string())),
        }
    }
}

/// Errors raised when a payload violates its contract.
#[derive(Debug, Error, PartialEq)]
pub enum PayloadError {
    /// A record kind name did not match any stage.
    #[error("unknown record kind: {0}")]
    UnknownKind(String),
    /// A diagram kind name did not match any supported diagram.
    #[error("unknown diagram kind: {0}")]
    UnknownDiagram(String),
    /// A payload field broke an invariant.
    #[error("invalid {kind} payload: {message}")]
    Invalid { kind: RecordKind, message: String },
}
