//! The five pipeline stages and the context they share.
//!
//! Every stage reads its prerequisites through [`MemoryHandle::get_latest`],
//! consults the language model once, and commits its output with a single
//! store call. Nothing is written before the model has answered, so a failed
//! stage leaves memory untouched.

mod analysis;
mod planning;
mod strategy;
mod visualization;
mod writer;

pub use analysis::TenderAnalysisStage;
pub use planning::{PhaseUpdate, PlanSummary, ProjectPlannerStage, replan_timeline};
pub use strategy::SolutionStrategyStage;
pub use visualization::{DiagramOutcome, VisualizationBatch, VisualizationStage, diagram_spec};
pub use writer::{TechnicalWriterStage, render_markdown};

use crate::collaborators::{
    DiagramRenderer, DocumentExtractor, LanguageModel, MermaidRenderer, OfflineModel,
    PatternExtractor, PlainTextExtractor, PromptContext, RequirementExtractor,
};
use crate::error::StageError;
use async_trait::async_trait;
use chrono::NaiveDate;
use log::{debug, info};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tenderflow_config::TenderflowConfig;
use tenderflow_memory::{MemoryHandle, MemoryRecord};
use tenderflow_protocol::{
    DiagramKind, NEXT_STEP_COMPLETE, RecordKind, SessionId, StagePayload, WorkflowState,
};

/// One step of the proposal pipeline.
#[async_trait]
pub trait Stage: Send + Sync {
    fn kind(&self) -> RecordKind;

    async fn run(
        &self,
        ctx: &StageContext,
        session_id: SessionId,
        params: &StageParams,
    ) -> Result<StageOutcome, StageError>;
}

/// The built-in stages in canonical order.
pub fn default_stages() -> [Arc<dyn Stage>; 5] {
    [
        Arc::new(TenderAnalysisStage),
        Arc::new(SolutionStrategyStage),
        Arc::new(VisualizationStage),
        Arc::new(ProjectPlannerStage),
        Arc::new(TechnicalWriterStage),
    ]
}

/// Memory handle, collaborators, and settings handed to every stage.
#[derive(Clone)]
pub struct StageContext {
    pub memory: MemoryHandle,
    pub documents: Arc<dyn DocumentExtractor>,
    pub model: Arc<dyn LanguageModel>,
    pub renderer: Arc<dyn DiagramRenderer>,
    pub extractor: Arc<dyn RequirementExtractor>,
    pub config: Arc<TenderflowConfig>,
}

impl StageContext {
    /// Context with the default offline collaborators.
    pub fn new(memory: MemoryHandle) -> Self {
        Self {
            memory,
            documents: Arc::new(PlainTextExtractor),
            model: Arc::new(OfflineModel),
            renderer: Arc::new(MermaidRenderer),
            extractor: Arc::new(PatternExtractor::new()),
            config: Arc::new(TenderflowConfig::default()),
        }
    }

    pub fn with_model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.model = model;
        self
    }

    pub fn with_documents(mut self, documents: Arc<dyn DocumentExtractor>) -> Self {
        self.documents = documents;
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn DiagramRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn RequirementExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_config(mut self, config: TenderflowConfig) -> Self {
        self.config = Arc::new(config);
        self
    }
}

/// Caller-supplied inputs. Stages ignore fields they do not use.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageParams {
    pub document_text: Option<String>,
    pub document_paths: Vec<PathBuf>,
    /// Overrides `workflow.diagrams` for the visualization stage.
    pub diagram_types: Option<Vec<DiagramKind>>,
    /// Overrides `planning.start_date` for the planner.
    pub start_date: Option<NaiveDate>,
}

impl StageParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.document_text = Some(text.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.document_paths.push(path.into());
        self
    }

    pub fn with_diagrams(mut self, diagrams: Vec<DiagramKind>) -> Self {
        self.diagram_types = Some(diagrams);
        self
    }

    pub fn with_start_date(mut self, date: NaiveDate) -> Self {
        self.start_date = Some(date);
        self
    }
}

/// What a stage produced.
#[allow(clippy::large_enum_variant)]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StageResult {
    Record(MemoryRecord),
    Diagrams(VisualizationBatch),
}

/// Result of a successful stage run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageOutcome {
    pub stage: RecordKind,
    pub status: WorkflowState,
    /// Next stage in canonical order, or `"complete"`.
    pub next_step: String,
    pub record_ids: Vec<String>,
    pub result: StageResult,
}

impl StageOutcome {
    pub fn new(stage: RecordKind, record_ids: Vec<String>, result: StageResult) -> Self {
        let next_step = RecordKind::ALL
            .get(stage.position() + 1)
            .map(|kind| kind.as_str().to_string())
            .unwrap_or_else(|| NEXT_STEP_COMPLETE.to_string());
        Self {
            stage,
            status: WorkflowState::reached_by(stage),
            next_step,
            record_ids,
            result,
        }
    }

    /// Outcome of a stage that stored exactly one record.
    pub fn record(stage: RecordKind, record: MemoryRecord) -> Self {
        Self::new(stage, vec![record.id.clone()], StageResult::Record(record))
    }

    pub fn stored_record(&self) -> Option<&MemoryRecord> {
        match &self.result {
            StageResult::Record(record) => Some(record),
            StageResult::Diagrams(_) => None,
        }
    }
}

/// Latest prerequisite payload and its record id.
pub(crate) async fn require<T: Clone>(
    ctx: &StageContext,
    session_id: SessionId,
    stage: RecordKind,
    prerequisite: RecordKind,
    pick: fn(&StagePayload) -> Option<&T>,
) -> Result<(String, T), StageError> {
    optional(ctx, session_id, prerequisite, pick)
        .await
        .ok_or(StageError::PrerequisiteMissing {
            stage,
            prerequisite,
        })
}

/// Latest payload of `kind`, if any.
pub(crate) async fn optional<T: Clone>(
    ctx: &StageContext,
    session_id: SessionId,
    kind: RecordKind,
    pick: fn(&StagePayload) -> Option<&T>,
) -> Option<(String, T)> {
    let record = ctx.memory.get_latest(session_id, kind).await?;
    pick(&record.payload).map(|payload| (record.id.clone(), payload.clone()))
}

/// Persist a stage output. This is the commit point of every stage.
pub(crate) async fn commit(
    ctx: &StageContext,
    session_id: SessionId,
    stage: RecordKind,
    payload: StagePayload,
) -> Result<MemoryRecord, StageError> {
    let record = ctx
        .memory
        .store(session_id, payload)
        .await
        .map_err(|source| StageError::Memory { stage, source })?;
    info!(
        "stage output committed (session_id={}, stage={}, id={})",
        session_id, stage, record.id
    );
    Ok(record)
}

/// Ask the model for the stage's narrative section.
pub(crate) async fn narrate(
    ctx: &StageContext,
    stage: RecordKind,
    instruction: &str,
    context: String,
) -> Result<String, StageError> {
    let prompt = PromptContext {
        stage,
        instruction: instruction.to_string(),
        context,
    };
    debug!(
        "requesting narrative (stage={}, model={})",
        stage,
        ctx.model.name()
    );
    ctx.model
        .invoke(&prompt)
        .await
        .map_err(|err| StageError::Model {
            stage,
            message: err.to_string(),
        })
}

/// Parse `"a-b weeks"` (or `"n weeks"`) into its bounds.
pub(crate) fn week_range(duration: &str) -> Option<(u32, u32)> {
    let numbers = duration.split_whitespace().next()?;
    match numbers.split_once('-') {
        Some((low, high)) => Some((low.trim().parse().ok()?, high.trim().parse().ok()?)),
        None => {
            let weeks = numbers.parse().ok()?;
            Some((weeks, weeks))
        }
    }
}

/// Whole-dollar amount with thousands separators, e.g. `$153,600`.
pub fn format_usd(amount: f64) -> String {
    let rounded = amount.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if rounded < 0.0 {
        format!("-${grouped}")
    } else {
        format!("${grouped}")
    }
}
