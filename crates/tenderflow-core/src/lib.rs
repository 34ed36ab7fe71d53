//! Core workflow primitives for Tenderflow.
//!
//! This crate owns the five proposal stages, the collaborators they call
//! (documents, language model, diagram renderer, requirement extractor),
//! missing-information triage, and the orchestrator that drives them.

pub mod collaborators;
pub mod error;
pub mod orchestrator;
pub mod stages;
pub mod triage;

pub use collaborators::{
    DiagramRenderer, DocumentExtractor, HttpChatModel, LanguageModel, MermaidRenderer,
    OfflineModel, PatternExtractor, PlainTextExtractor, PromptContext, RequirementExtractor,
};
pub use error::{CollaboratorError, OrchestratorError, StageError, WorkflowAborted};
/// Orchestrator facade and its reply types.
pub use orchestrator::{
    Intent, Orchestrator, RequestReply, StageHandle, WorkflowReport, WorkflowStatus,
};
pub use stages::{
    DiagramOutcome, PhaseUpdate, PlanSummary, Stage, StageContext, StageOutcome, StageParams,
    StageResult, VisualizationBatch,
};
