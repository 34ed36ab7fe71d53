use std::collections::BTreeSet;
use tenderflow_core::collaborators::DiagramSpec;
use tenderflow_core::{CollaboratorError, DiagramRenderer, MermaidRenderer};
use tenderflow_protocol::DiagramKind;

/// Mermaid renderer that refuses the configured diagram kinds.
#[derive(Debug, Clone, Default)]
pub struct FlakyRenderer {
    failing: BTreeSet<DiagramKind>,
}

impl FlakyRenderer {
    pub fn new(failing: impl IntoIterator<Item = DiagramKind>) -> Self {
        Self {
            failing: failing.into_iter().collect(),
        }
    }
}

impl DiagramRenderer for FlakyRenderer {
    fn render(&self, spec: &DiagramSpec) -> Result<String, CollaboratorError> {
        if self.failing.contains(&spec.kind) {
            return Err(CollaboratorError::Render(format!(
                "{} rendering disabled",
                spec.kind
            )));
        }
        MermaidRenderer.render(spec)
    }
}
