//! External collaborators the stages depend on.
//!
//! Each seam is a trait so the orchestrator can be wired with real services
//! or with fakes in tests.

mod diagram;
mod document;
mod extraction;
mod model;

pub use diagram::{
    DiagramEdge, DiagramEntity, DiagramNode, DiagramRenderer, DiagramSpec, EdgeStyle,
    EntityAttribute, MermaidRenderer, NodeShape, sanitize_id,
};
pub use document::{DocumentExtractor, PlainTextExtractor};
pub use extraction::{ExtractionReport, PatternExtractor, RequirementExtractor};
pub use model::{HttpChatModel, LanguageModel, OfflineModel, PromptContext, model_from_config};
