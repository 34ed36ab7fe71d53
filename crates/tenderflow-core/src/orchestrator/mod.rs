//! Workflow controller
//!
//! The orchestrator owns the stage registry and the shared [`StageContext`].
//! Workflow state is never stored: every query recomputes it from memory.

mod intent;
pub use intent::Intent;

use crate::collaborators::model_from_config;
use crate::error::{OrchestratorError, StageError, WorkflowAborted};
use crate::stages::{
    PhaseUpdate, PlanSummary, Stage, StageContext, StageOutcome, StageParams, commit,
    default_stages, render_markdown, replan_timeline,
};
use crate::triage::triage;
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tenderflow_config::{MemoryBackend, TenderflowConfig};
use tenderflow_memory::{FileMemoryStore, MemoryHandle};
use tenderflow_protocol::{
    ProjectPlan, ProposalStatus, ProposalSummary, RecordKind, SessionId, StagePayload,
    TechnicalProposal, TriageResult, WorkflowProgress,
};
use tokio::task::JoinHandle;

/// Name reported by [`Orchestrator::summary`].
pub const PROJECT_NAME: &str = "Technical Solution Implementation";
const WORKFLOW_SUMMARY: &str = "All steps completed successfully";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Completed,
}

/// Result of a full workflow run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowReport {
    pub session_id: SessionId,
    pub status: WorkflowStatus,
    /// Outcome of every stage, keyed by stage.
    pub workflow_results: BTreeMap<RecordKind, StageOutcome>,
    pub summary: String,
}

/// Awaitable handle for a stage running on the tokio runtime.
pub struct StageHandle {
    /// Session the stage runs in.
    pub session_id: SessionId,
    /// Stage being run.
    pub stage: RecordKind,
    handle: JoinHandle<Result<StageOutcome, StageError>>,
}

impl StageHandle {
    /// Await completion of the stage and return its outcome.
    pub async fn finish(self) -> Result<StageOutcome, OrchestratorError> {
        let outcome = self
            .handle
            .await
            .map_err(|err| OrchestratorError::Join(err.to_string()))??;
        Ok(outcome)
    }
}

/// Answer to a free-text request routed by [`Intent`].
#[allow(clippy::large_enum_variant)]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "intent", content = "result", rename_all = "snake_case")]
pub enum RequestReply {
    Status(WorkflowProgress),
    MissingInfo(TriageResult),
    Summary(ProposalSummary),
    /// A stage was run on behalf of the request.
    Stage(StageOutcome),
}

/// Main workflow façade: runs stages and answers progress queries.
#[derive(Clone)]
pub struct Orchestrator {
    context: StageContext,
    stages: [Arc<dyn Stage>; 5],
}

impl Orchestrator {
    /// Orchestrator with the built-in stages.
    pub fn new(context: StageContext) -> Self {
        Self {
            context,
            stages: default_stages(),
        }
    }

    /// Wire memory and model from configuration.
    pub fn from_config(config: TenderflowConfig) -> Result<Self, OrchestratorError> {
        let memory = match config.memory.backend {
            MemoryBackend::InMemory => MemoryHandle::in_memory(),
            MemoryBackend::File => {
                let root = config.memory.resolved_path()?;
                info!("using file memory store (root={})", root.display());
                MemoryHandle::new(Arc::new(FileMemoryStore::new(root)?))
            }
        };
        let model = model_from_config(&config.model)?;
        info!("orchestrator ready (model={})", model.name());
        let context = StageContext::new(memory)
            .with_model(model)
            .with_config(config);
        Ok(Self::new(context))
    }

    /// Replace the stage registered for the same kind.
    pub fn with_stage(mut self, stage: Arc<dyn Stage>) -> Self {
        let slot = stage.kind().position();
        self.stages[slot] = stage;
        self
    }

    pub fn context(&self) -> &StageContext {
        &self.context
    }

    pub fn memory(&self) -> &MemoryHandle {
        &self.context.memory
    }

    /// Run one stage against the session's latest records.
    pub async fn run_stage(
        &self,
        kind: RecordKind,
        session_id: SessionId,
        params: &StageParams,
    ) -> Result<StageOutcome, StageError> {
        info!("running stage (session_id={}, stage={})", session_id, kind);
        let stage = &self.stages[kind.position()];
        match stage.run(&self.context, session_id, params).await {
            Ok(outcome) => {
                debug!(
                    "stage finished (session_id={}, stage={}, records={})",
                    session_id,
                    kind,
                    outcome.record_ids.len()
                );
                Ok(outcome)
            }
            Err(err) => {
                warn!(
                    "stage failed (session_id={}, stage={}, err={})",
                    session_id, kind, err
                );
                Err(err)
            }
        }
    }

    /// Run `run_stage` on the tokio runtime.
    pub fn spawn_stage(
        &self,
        kind: RecordKind,
        session_id: SessionId,
        params: StageParams,
    ) -> StageHandle {
        let orchestrator = self.clone();
        let handle =
            tokio::spawn(async move { orchestrator.run_stage(kind, session_id, &params).await });
        StageHandle {
            session_id,
            stage: kind,
            handle,
        }
    }

    /// Run all five stages in order, stopping at the first failure.
    pub async fn run_complete_workflow(
        &self,
        session_id: SessionId,
        params: &StageParams,
    ) -> Result<WorkflowReport, Box<WorkflowAborted>> {
        info!("starting complete workflow (session_id={})", session_id);
        let mut workflow_results = BTreeMap::new();
        for kind in RecordKind::ALL {
            match self.run_stage(kind, session_id, params).await {
                Ok(outcome) => {
                    workflow_results.insert(kind, outcome);
                }
                Err(source) => {
                    return Err(Box::new(WorkflowAborted {
                        stage: kind,
                        source,
                        workflow_results,
                    }));
                }
            }
        }
        info!("workflow completed (session_id={})", session_id);
        Ok(WorkflowReport {
            session_id,
            status: WorkflowStatus::Completed,
            workflow_results,
            summary: WORKFLOW_SUMMARY.to_string(),
        })
    }

    /// Derive progress with one lookup per stage.
    pub async fn status(&self, session_id: SessionId) -> WorkflowProgress {
        let mut completed = BTreeSet::new();
        for kind in RecordKind::ALL {
            if self.memory().get_latest(session_id, kind).await.is_some() {
                completed.insert(kind);
            }
        }
        let context_summary = self.memory().context_summary(session_id).await;
        WorkflowProgress::derive(session_id, &completed, context_summary)
    }

    /// Triage the latest analysis's missing-information items.
    pub async fn missing_info(
        &self,
        session_id: SessionId,
    ) -> Result<TriageResult, OrchestratorError> {
        let record = self
            .memory()
            .get_latest(session_id, RecordKind::TenderAnalysis)
            .await;
        let analysis = record
            .as_ref()
            .and_then(|record| record.payload.as_tender_analysis())
            .ok_or(OrchestratorError::NoAnalysis(session_id))?;
        Ok(triage(&analysis.missing_information))
    }

    /// Condense the latest proposal.
    pub async fn summary(&self, session_id: SessionId) -> Result<ProposalSummary, OrchestratorError> {
        let (proposal_id, proposal) = self.latest_proposal(session_id).await?;
        let executive = proposal.executive_summary;
        Ok(ProposalSummary {
            project_name: PROJECT_NAME.to_string(),
            total_cost: executive.total_cost,
            duration_weeks: executive.duration,
            team_size: executive.team_size,
            risk_level: executive.risk_level,
            key_features: executive.key_features,
            business_value: executive.business_value,
            status: ProposalStatus::ReadyForReview,
            proposal_id,
        })
    }

    /// Latest proposal rendered as markdown.
    pub async fn export_markdown(&self, session_id: SessionId) -> Result<String, OrchestratorError> {
        let (_, proposal) = self.latest_proposal(session_id).await?;
        Ok(render_markdown(&proposal))
    }

    /// Route a free-text request.
    pub async fn handle_request(
        &self,
        session_id: SessionId,
        message: &str,
        params: &StageParams,
    ) -> Result<RequestReply, OrchestratorError> {
        let intent = Intent::classify(message);
        debug!(
            "routing request (session_id={}, intent={:?})",
            session_id, intent
        );
        let reply = match intent {
            Intent::Status => RequestReply::Status(self.status(session_id).await),
            Intent::MissingInfo => RequestReply::MissingInfo(self.missing_info(session_id).await?),
            Intent::Summary => RequestReply::Summary(self.summary(session_id).await?),
            Intent::NewAnalysis => RequestReply::Stage(
                self.run_stage(RecordKind::TenderAnalysis, session_id, params)
                    .await?,
            ),
            Intent::Continue => {
                let progress = self.status(session_id).await;
                match progress.next_stage() {
                    Some(kind) => {
                        RequestReply::Stage(self.run_stage(kind, session_id, params).await?)
                    }
                    None => RequestReply::Status(progress),
                }
            }
        };
        Ok(reply)
    }

    /// Re-plan the latest project plan and store it as a new record.
    pub async fn update_timeline(
        &self,
        session_id: SessionId,
        updates: &[PhaseUpdate],
    ) -> Result<StageOutcome, StageError> {
        let (plan_id, plan) = self.latest_plan(session_id).await?;
        info!(
            "updating timeline (session_id={}, plan_id={}, updates={})",
            session_id,
            plan_id,
            updates.len()
        );
        let updated = replan_timeline(&plan, updates, &self.context.config.planning);
        let record = commit(
            &self.context,
            session_id,
            RecordKind::ProjectPlan,
            StagePayload::ProjectPlan(updated),
        )
        .await?;
        Ok(StageOutcome::record(RecordKind::ProjectPlan, record))
    }

    /// Headline numbers of the latest project plan.
    pub async fn plan_summary(&self, session_id: SessionId) -> Result<PlanSummary, StageError> {
        let (_, plan) = self.latest_plan(session_id).await?;
        Ok(PlanSummary::from_plan(&plan))
    }

    /// Delete a session's records, optionally of one kind only.
    pub async fn clear(
        &self,
        session_id: SessionId,
        kind: Option<RecordKind>,
    ) -> Result<usize, OrchestratorError> {
        let removed = self.memory().clear(session_id, kind).await?;
        info!(
            "cleared records (session_id={}, kind={}, removed={})",
            session_id,
            kind.map(|kind| kind.as_str()).unwrap_or("all"),
            removed
        );
        Ok(removed)
    }

    pub async fn list_sessions(&self) -> Result<Vec<SessionId>, OrchestratorError> {
        Ok(self.memory().list_sessions().await?)
    }

    async fn latest_proposal(
        &self,
        session_id: SessionId,
    ) -> Result<(String, TechnicalProposal), OrchestratorError> {
        let record = self
            .memory()
            .get_latest(session_id, RecordKind::TechnicalProposal)
            .await
            .ok_or(OrchestratorError::NoProposal(session_id))?;
        let proposal = record
            .payload
            .as_technical_proposal()
            .cloned()
            .ok_or(OrchestratorError::NoProposal(session_id))?;
        Ok((record.id, proposal))
    }

    async fn latest_plan(&self, session_id: SessionId) -> Result<(String, ProjectPlan), StageError> {
        let missing = StageError::PrerequisiteMissing {
            stage: RecordKind::ProjectPlan,
            prerequisite: RecordKind::ProjectPlan,
        };
        let Some(record) = self
            .memory()
            .get_latest(session_id, RecordKind::ProjectPlan)
            .await
        else {
            return Err(missing);
        };
        let plan = record.payload.as_project_plan().cloned().ok_or(missing)?;
        Ok((record.id, plan))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::StageResult;
    use pretty_assertions::assert_eq;
    use tenderflow_protocol::{NEXT_STEP_COMPLETE, WorkflowState};
    use uuid::Uuid;

    const TENDER: &str = "PROJECT OVERVIEW\n\
        The system must support barcode scanning.\n\
        Budget: $100,000\n\
        Timeline: 4 months\n";

    fn orchestrator() -> Orchestrator {
        Orchestrator::new(StageContext::new(MemoryHandle::in_memory()))
    }

    #[tokio::test]
    async fn fresh_session_is_not_started() {
        let orchestrator = orchestrator();
        let progress = orchestrator.status(Uuid::new_v4()).await;
        assert_eq!(progress.state, WorkflowState::NotStarted);
        assert_eq!(progress.progress_percentage, 0.0);
        assert_eq!(progress.next_recommended_step, "tender_analysis");
        assert_eq!(progress.context_summary, "No information stored yet.");
    }

    #[tokio::test]
    async fn complete_workflow_reaches_every_stage() {
        let orchestrator = orchestrator();
        let session = Uuid::new_v4();
        let report = orchestrator
            .run_complete_workflow(session, &StageParams::new().with_text(TENDER))
            .await
            .expect("workflow");
        assert_eq!(report.status, WorkflowStatus::Completed);
        assert_eq!(report.summary, WORKFLOW_SUMMARY);
        assert_eq!(report.workflow_results.len(), 5);
        let visualization = &report.workflow_results[&RecordKind::Visualization];
        assert!(matches!(visualization.result, StageResult::Diagrams(_)));
        assert_eq!(visualization.record_ids.len(), 6);

        let progress = orchestrator.status(session).await;
        assert!(progress.is_complete());
        assert_eq!(progress.progress_percentage, 100.0);
        assert_eq!(progress.next_recommended_step, NEXT_STEP_COMPLETE);
    }

    #[tokio::test]
    async fn summary_requires_a_proposal() {
        let orchestrator = orchestrator();
        let session = Uuid::new_v4();
        let err = orchestrator.summary(session).await.expect_err("no proposal");
        assert!(matches!(err, OrchestratorError::NoProposal(id) if id == session));
        let err = orchestrator
            .missing_info(session)
            .await
            .expect_err("no analysis");
        assert!(matches!(err, OrchestratorError::NoAnalysis(_)));
    }

    #[tokio::test]
    async fn continue_runs_next_stage_then_reports_status() {
        let orchestrator = orchestrator();
        let session = Uuid::new_v4();
        let params = StageParams::new().with_text(TENDER);
        let mut ran = Vec::new();
        loop {
            match orchestrator
                .handle_request(session, "continue", &params)
                .await
                .expect("request")
            {
                RequestReply::Stage(outcome) => ran.push(outcome.stage),
                RequestReply::Status(progress) => {
                    assert!(progress.is_complete());
                    break;
                }
                other => panic!("unexpected reply: {other:?}"),
            }
        }
        assert_eq!(ran, RecordKind::ALL.to_vec());
    }

    #[tokio::test]
    async fn new_analysis_without_input_fails() {
        let orchestrator = orchestrator();
        let err = orchestrator
            .handle_request(Uuid::new_v4(), "analyze a new tender", &StageParams::new())
            .await
            .expect_err("no input");
        assert!(matches!(
            err,
            OrchestratorError::Stage(StageError::MissingInput {
                stage: RecordKind::TenderAnalysis,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn update_timeline_requires_a_plan() {
        let orchestrator = orchestrator();
        let err = orchestrator
            .update_timeline(Uuid::new_v4(), &[])
            .await
            .expect_err("no plan");
        assert!(matches!(
            err,
            StageError::PrerequisiteMissing {
                prerequisite: RecordKind::ProjectPlan,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn spawned_stage_can_be_awaited() {
        let orchestrator = orchestrator();
        let session = Uuid::new_v4();
        let handle = orchestrator.spawn_stage(
            RecordKind::TenderAnalysis,
            session,
            StageParams::new().with_text(TENDER),
        );
        assert_eq!(handle.stage, RecordKind::TenderAnalysis);
        let outcome = handle.finish().await.expect("stage");
        assert_eq!(outcome.next_step, "solution_strategy");
        assert_eq!(
            orchestrator.status(session).await.state,
            WorkflowState::TenderAnalyzed
        );
    }
}
