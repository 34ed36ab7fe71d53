//! Workflow integration tests with stub collaborators.

use async_trait::async_trait;
use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tenderflow_config::{MemoryBackend, MemoryConfig, ModelConfig, ModelProvider, TenderflowConfig};
use tenderflow_core::{
    DiagramOutcome, Orchestrator, PhaseUpdate, Stage, StageContext, StageError, StageOutcome,
    StageParams, StageResult,
};
use tenderflow_memory::MemoryHandle;
use tenderflow_protocol::{DiagramKind, RecordKind, SessionId, WorkflowState};
use tenderflow_test_utils::{
    FailingModel, FixedModel, FlakyRenderer, MINIMAL_TENDER, RecordingModel, SAMPLE_TENDER,
    UnreachableStore,
};
use tempfile::tempdir;
use uuid::Uuid;

fn orchestrator() -> Orchestrator {
    Orchestrator::new(
        StageContext::new(MemoryHandle::in_memory())
            .with_model(Arc::new(FixedModel::new("narrative"))),
    )
}

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 6).expect("date")
}

struct BrokenPlanner;

#[async_trait]
impl Stage for BrokenPlanner {
    fn kind(&self) -> RecordKind {
        RecordKind::ProjectPlan
    }

    async fn run(
        &self,
        _ctx: &StageContext,
        _session_id: SessionId,
        _params: &StageParams,
    ) -> Result<StageOutcome, StageError> {
        Err(StageError::Model {
            stage: RecordKind::ProjectPlan,
            message: "planner offline".to_string(),
        })
    }
}

/// Progress only grows as stages complete, in steps of 20 percent.
#[tokio::test]
async fn progress_is_monotonic() {
    let orchestrator = orchestrator();
    let session = Uuid::new_v4();
    let params = StageParams::new().with_text(SAMPLE_TENDER);
    let mut last = orchestrator.status(session).await.progress_percentage;
    assert_eq!(last, 0.0);
    for (done, kind) in RecordKind::ALL.into_iter().enumerate() {
        orchestrator
            .run_stage(kind, session, &params)
            .await
            .expect("stage");
        let progress = orchestrator.status(session).await;
        assert!(progress.progress_percentage > last);
        assert_eq!(progress.progress_percentage, 100.0 * (done + 1) as f64 / 5.0);
        assert_eq!(progress.state, WorkflowState::reached_by(kind));
        last = progress.progress_percentage;
    }
}

/// Re-running the planner adds a plan but leaves the strategy untouched.
#[tokio::test]
async fn rerunning_planner_keeps_strategy() {
    let orchestrator = orchestrator();
    let session = Uuid::new_v4();
    let params = StageParams::new()
        .with_text(SAMPLE_TENDER)
        .with_start_date(start());
    for kind in [RecordKind::TenderAnalysis, RecordKind::SolutionStrategy] {
        orchestrator
            .run_stage(kind, session, &params)
            .await
            .expect("stage");
    }
    let before = orchestrator
        .memory()
        .get_latest(session, RecordKind::SolutionStrategy)
        .await
        .expect("strategy");

    let first = orchestrator
        .run_stage(RecordKind::ProjectPlan, session, &params)
        .await
        .expect("plan");
    let second = orchestrator
        .run_stage(RecordKind::ProjectPlan, session, &params)
        .await
        .expect("plan again");

    let after = orchestrator
        .memory()
        .get_latest(session, RecordKind::SolutionStrategy)
        .await
        .expect("strategy");
    assert_eq!(before, after);
    assert_eq!(first.record_ids, vec!["project_plan_0".to_string()]);
    assert_eq!(second.record_ids, vec!["project_plan_1".to_string()]);
    let plans = orchestrator
        .memory()
        .get_all(session, RecordKind::ProjectPlan)
        .await;
    assert_eq!(plans.len(), 2);
    assert_eq!(
        plans[0].payload.as_project_plan(),
        plans[1].payload.as_project_plan()
    );
}

/// Strategy cannot run before an analysis exists.
#[tokio::test]
async fn strategy_requires_analysis() {
    let orchestrator = orchestrator();
    let err = orchestrator
        .run_stage(
            RecordKind::SolutionStrategy,
            Uuid::new_v4(),
            &StageParams::new(),
        )
        .await
        .expect_err("prerequisite");
    assert!(matches!(
        err,
        StageError::PrerequisiteMissing {
            stage: RecordKind::SolutionStrategy,
            prerequisite: RecordKind::TenderAnalysis,
        }
    ));
    assert!(err.to_string().contains("tender_analysis"));
}

/// Two failing diagrams do not stop the other four.
#[tokio::test]
async fn partial_diagram_batch_is_reported() {
    let context = StageContext::new(MemoryHandle::in_memory()).with_renderer(Arc::new(
        FlakyRenderer::new([DiagramKind::Sequence, DiagramKind::DatabaseEr]),
    ));
    let orchestrator = Orchestrator::new(context);
    let session = Uuid::new_v4();
    let params = StageParams::new().with_text(SAMPLE_TENDER);
    for kind in [RecordKind::TenderAnalysis, RecordKind::SolutionStrategy] {
        orchestrator
            .run_stage(kind, session, &params)
            .await
            .expect("stage");
    }

    let outcome = orchestrator
        .run_stage(RecordKind::Visualization, session, &params)
        .await
        .expect("visualization");
    let StageResult::Diagrams(batch) = &outcome.result else {
        panic!("expected a diagram batch");
    };
    assert_eq!(batch.total_diagrams, 6);
    assert_eq!(batch.successful_diagrams, 4);
    assert_eq!(outcome.record_ids.len(), 4);
    for kind in [DiagramKind::Sequence, DiagramKind::DatabaseEr] {
        match &batch.diagrams[&kind] {
            DiagramOutcome::Failed { error } => assert!(error.contains("rendering disabled")),
            other => panic!("expected failure for {kind}: {other:?}"),
        }
    }
    let stored = orchestrator
        .memory()
        .get_all(session, RecordKind::Visualization)
        .await;
    assert_eq!(stored.len(), 4);
}

/// A short tender flows all the way to a costed proposal.
#[tokio::test]
async fn minimal_tender_produces_costed_proposal() {
    let orchestrator = orchestrator();
    let session = Uuid::new_v4();
    let report = orchestrator
        .run_complete_workflow(session, &StageParams::new().with_text(MINIMAL_TENDER))
        .await
        .expect("workflow");
    assert_eq!(report.workflow_results.len(), 5);

    let record = orchestrator
        .memory()
        .get_latest(session, RecordKind::TechnicalProposal)
        .await
        .expect("proposal");
    let proposal = record.payload.as_technical_proposal().expect("payload");
    assert!(proposal.executive_summary.total_cost > 0.0);
    assert!(proposal.executive_summary.duration > 0);
    assert!(
        proposal
            .requirements_analysis
            .functional_requirements
            .iter()
            .any(|item| item.contains("barcode scanning"))
    );
    assert_eq!(proposal.cover_letter, "narrative");

    let summary = orchestrator.summary(session).await.expect("summary");
    assert_eq!(summary.proposal_id, record.id);
    assert_eq!(summary.total_cost, proposal.executive_summary.total_cost);
}

/// The latest analysis wins; earlier ones stay readable in order.
#[tokio::test]
async fn latest_analysis_wins() {
    let orchestrator = orchestrator();
    let session = Uuid::new_v4();
    for budget in ["$10,000", "$20,000", "$30,000"] {
        orchestrator
            .run_stage(
                RecordKind::TenderAnalysis,
                session,
                &StageParams::new().with_text(format!("Budget: {budget}")),
            )
            .await
            .expect("analysis");
    }
    let latest = orchestrator
        .memory()
        .get_latest(session, RecordKind::TenderAnalysis)
        .await
        .expect("latest");
    assert_eq!(latest.id, "tender_analysis_2");
    assert!(latest.content.contains("$30,000"));
    let ids: Vec<String> = orchestrator
        .memory()
        .get_all(session, RecordKind::TenderAnalysis)
        .await
        .into_iter()
        .map(|record| record.id)
        .collect();
    assert_eq!(
        ids,
        vec![
            "tender_analysis_0".to_string(),
            "tender_analysis_1".to_string(),
            "tender_analysis_2".to_string(),
        ]
    );
}

/// A model failure aborts the stage before anything is stored.
#[tokio::test]
async fn model_failure_leaves_no_record() {
    let orchestrator = Orchestrator::new(
        StageContext::new(MemoryHandle::in_memory()).with_model(Arc::new(FailingModel)),
    );
    let session = Uuid::new_v4();
    let err = orchestrator
        .run_stage(
            RecordKind::TenderAnalysis,
            session,
            &StageParams::new().with_text(SAMPLE_TENDER),
        )
        .await
        .expect_err("model failure");
    assert!(matches!(
        err,
        StageError::Model {
            stage: RecordKind::TenderAnalysis,
            ..
        }
    ));
    assert_eq!(
        orchestrator.status(session).await.state,
        WorkflowState::NotStarted
    );
}

/// An aborted workflow keeps the stages that finished and their records.
#[tokio::test]
async fn aborted_workflow_keeps_partial_results() {
    let orchestrator = orchestrator().with_stage(Arc::new(BrokenPlanner));
    let session = Uuid::new_v4();
    let aborted = orchestrator
        .run_complete_workflow(session, &StageParams::new().with_text(SAMPLE_TENDER))
        .await
        .expect_err("planner fails");
    assert_eq!(aborted.stage, RecordKind::ProjectPlan);
    assert!(matches!(aborted.source, StageError::Model { .. }));
    assert_eq!(
        aborted.workflow_results.keys().copied().collect::<Vec<_>>(),
        vec![
            RecordKind::TenderAnalysis,
            RecordKind::SolutionStrategy,
            RecordKind::Visualization,
        ]
    );
    assert!(aborted.to_string().contains("project_plan"));

    let progress = orchestrator.status(session).await;
    assert_eq!(progress.state, WorkflowState::VisualizationsCreated);
    assert_eq!(progress.next_recommended_step, "project_plan");
}

/// Without a plan the writer still produces a proposal with placeholders.
#[tokio::test]
async fn writer_runs_without_plan() {
    let orchestrator = orchestrator();
    let session = Uuid::new_v4();
    let params = StageParams::new().with_text(SAMPLE_TENDER);
    for kind in [
        RecordKind::TenderAnalysis,
        RecordKind::SolutionStrategy,
        RecordKind::TechnicalProposal,
    ] {
        orchestrator
            .run_stage(kind, session, &params)
            .await
            .expect("stage");
    }
    let summary = orchestrator.summary(session).await.expect("summary");
    assert_eq!(summary.total_cost, 0.0);
    assert_eq!(summary.duration_weeks, 0);
    let markdown = orchestrator.export_markdown(session).await.expect("export");
    assert!(!markdown.contains("```mermaid"));
}

/// Reads degrade to empty while writes report the failure.
#[tokio::test]
async fn unreachable_store_reads_empty_and_fails_writes() {
    let orchestrator = Orchestrator::new(StageContext::new(MemoryHandle::new(Arc::new(
        UnreachableStore,
    ))));
    let session = Uuid::new_v4();
    let progress = orchestrator.status(session).await;
    assert_eq!(progress.state, WorkflowState::NotStarted);

    let err = orchestrator
        .run_stage(
            RecordKind::TenderAnalysis,
            session,
            &StageParams::new().with_text(MINIMAL_TENDER),
        )
        .await
        .expect_err("store down");
    assert!(matches!(
        err,
        StageError::Memory {
            stage: RecordKind::TenderAnalysis,
            ..
        }
    ));
}

/// Every stage except visualization asks the model exactly once.
#[tokio::test]
async fn model_is_consulted_once_per_narrative_stage() {
    let model = RecordingModel::new("noted");
    let orchestrator = Orchestrator::new(
        StageContext::new(MemoryHandle::in_memory()).with_model(Arc::new(model.clone())),
    );
    orchestrator
        .run_complete_workflow(
            Uuid::new_v4(),
            &StageParams::new().with_text(SAMPLE_TENDER),
        )
        .await
        .expect("workflow");
    let stages: Vec<RecordKind> = model.prompts().into_iter().map(|prompt| prompt.stage).collect();
    assert_eq!(
        stages,
        vec![
            RecordKind::TenderAnalysis,
            RecordKind::SolutionStrategy,
            RecordKind::ProjectPlan,
            RecordKind::TechnicalProposal,
        ]
    );
}

/// Timeline updates store a new plan with the stretched phase.
#[tokio::test]
async fn update_timeline_stores_new_plan() {
    let orchestrator = orchestrator();
    let session = Uuid::new_v4();
    let params = StageParams::new()
        .with_text(SAMPLE_TENDER)
        .with_start_date(start());
    for kind in [
        RecordKind::TenderAnalysis,
        RecordKind::SolutionStrategy,
        RecordKind::ProjectPlan,
    ] {
        orchestrator
            .run_stage(kind, session, &params)
            .await
            .expect("stage");
    }
    let before = orchestrator.plan_summary(session).await.expect("summary");
    assert_eq!(before.duration_weeks, 18);

    let outcome = orchestrator
        .update_timeline(
            session,
            &[PhaseUpdate {
                phase_name: "Development Phase 2".to_string(),
                new_duration: Some(8),
                new_tasks: Vec::new(),
            }],
        )
        .await
        .expect("update");
    assert_eq!(outcome.record_ids, vec!["project_plan_1".to_string()]);

    let after = orchestrator.plan_summary(session).await.expect("summary");
    assert_eq!(after.duration_weeks, 20);
    assert!(after.total_cost > before.total_cost);
    let plan = outcome
        .stored_record()
        .and_then(|record| record.payload.as_project_plan())
        .expect("plan");
    assert_eq!(plan.timeline.start_date, start());
}

/// A file-backed orchestrator built from config persists across instances.
#[tokio::test]
async fn file_backed_config_persists_sessions() {
    let temp = tempdir().expect("tempdir");
    let config = TenderflowConfig::builder()
        .memory(MemoryConfig {
            backend: MemoryBackend::File,
            path: Some(temp.path().join("memory").to_string_lossy().to_string()),
        })
        .model(ModelConfig {
            provider: ModelProvider::Offline,
            ..ModelConfig::default()
        })
        .build();
    let session = Uuid::new_v4();
    let first = Orchestrator::from_config(config.clone()).expect("orchestrator");
    first
        .run_stage(
            RecordKind::TenderAnalysis,
            session,
            &StageParams::new().with_text(SAMPLE_TENDER),
        )
        .await
        .expect("analysis");

    let second = Orchestrator::from_config(config).expect("orchestrator");
    assert_eq!(
        second.status(session).await.state,
        WorkflowState::TenderAnalyzed
    );
    assert_eq!(second.list_sessions().await.expect("sessions"), vec![session]);
    assert_eq!(second.clear(session, None).await.expect("clear"), 1);
    assert_eq!(
        second.status(session).await.state,
        WorkflowState::NotStarted
    );
}
