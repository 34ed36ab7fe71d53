//! Test helpers shared across Tenderflow crates.

pub mod llm;
pub mod memory;
pub mod render;
pub mod tender;

pub use llm::{FailingModel, FixedModel, RecordingModel};
pub use memory::UnreachableStore;
pub use render::FlakyRenderer;
pub use tender::{MINIMAL_TENDER, SAMPLE_TENDER};
