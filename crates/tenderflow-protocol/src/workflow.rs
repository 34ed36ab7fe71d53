//! Derived workflow views: progress, triage, and proposal summary.

use crate::payload::RiskLevel;
use crate::{RecordKind, SessionId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Value of `next_recommended_step` once every stage has a record.
pub const NEXT_STEP_COMPLETE: &str = "complete";

/// Pipeline state, derived from which record kinds exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    NotStarted,
    TenderAnalyzed,
    StrategyDesigned,
    VisualizationsCreated,
    ProjectPlanCreated,
    ProposalGenerated,
}

impl WorkflowState {
    /// State reached once a record of `kind` exists.
    pub fn reached_by(kind: RecordKind) -> Self {
        match kind {
            RecordKind::TenderAnalysis => WorkflowState::TenderAnalyzed,
            RecordKind::SolutionStrategy => WorkflowState::StrategyDesigned,
            RecordKind::Visualization => WorkflowState::VisualizationsCreated,
            RecordKind::ProjectPlan => WorkflowState::ProjectPlanCreated,
            RecordKind::TechnicalProposal => WorkflowState::ProposalGenerated,
        }
    }

    /// Furthest stage in canonical order with at least one record.
    pub fn from_completed(completed: &BTreeSet<RecordKind>) -> Self {
        completed
            .iter()
            .max()
            .map(|kind| Self::reached_by(*kind))
            .unwrap_or(WorkflowState::NotStarted)
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WorkflowState::NotStarted => "not_started",
            WorkflowState::TenderAnalyzed => "tender_analyzed",
            WorkflowState::StrategyDesigned => "strategy_designed",
            WorkflowState::VisualizationsCreated => "visualizations_created",
            WorkflowState::ProjectPlanCreated => "project_plan_created",
            WorkflowState::ProposalGenerated => "proposal_generated",
        };
        f.write_str(label)
    }
}

/// Progress snapshot computed from memory contents on every query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowProgress {
    pub session_id: SessionId,
    pub state: WorkflowState,
    pub completed_steps: Vec<RecordKind>,
    pub missing_steps: Vec<RecordKind>,
    pub progress_percentage: f64,
    /// First missing step in canonical order, or `"complete"`.
    pub next_recommended_step: String,
    pub context_summary: String,
}

impl WorkflowProgress {
    /// Build progress from the set of kinds that have at least one record.
    pub fn derive(
        session_id: SessionId,
        completed: &BTreeSet<RecordKind>,
        context_summary: String,
    ) -> Self {
        let completed_steps: Vec<RecordKind> = RecordKind::ALL
            .into_iter()
            .filter(|kind| completed.contains(kind))
            .collect();
        let missing_steps: Vec<RecordKind> = RecordKind::ALL
            .into_iter()
            .filter(|kind| !completed.contains(kind))
            .collect();
        let progress_percentage =
            completed_steps.len() as f64 / RecordKind::ALL.len() as f64 * 100.0;
        let next_recommended_step = missing_steps
            .first()
            .map(|kind| kind.as_str().to_string())
            .unwrap_or_else(|| NEXT_STEP_COMPLETE.to_string());
        Self {
            session_id,
            state: WorkflowState::from_completed(completed),
            completed_steps,
            missing_steps,
            progress_percentage,
            next_recommended_step,
            context_summary,
        }
    }

    /// Next stage to run, `None` when the workflow is complete.
    pub fn next_stage(&self) -> Option<RecordKind> {
        self.missing_steps.first().copied()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_steps.is_empty()
    }
}

/// Clarification urgency for a missing-information item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// Missing-information items bucketed by priority.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriageResult {
    pub total_missing_items: usize,
    pub high_priority: Vec<String>,
    pub medium_priority: Vec<String>,
    pub low_priority: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    ReadyForReview,
}

/// Condensed view of the latest technical proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalSummary {
    pub project_name: String,
    pub total_cost: f64,
    pub duration_weeks: u32,
    pub team_size: usize,
    pub risk_level: RiskLevel,
    pub key_features: Vec<String>,
    pub business_value: String,
    pub status: ProposalStatus,
    pub proposal_id: String,
}
