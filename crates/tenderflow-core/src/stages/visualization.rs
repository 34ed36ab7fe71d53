use super::{Stage, StageContext, StageOutcome, StageParams, StageResult, commit, require};
use crate::collaborators::{
    DiagramEdge, DiagramEntity, DiagramNode, DiagramSpec, EntityAttribute, NodeShape,
};
use crate::error::StageError;
use async_trait::async_trait;
use log::{info, warn};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tenderflow_protocol::{
    DiagramKind, RecordKind, SessionId, SolutionStrategy, StagePayload, Visualization,
};

const STAGE: RecordKind = RecordKind::Visualization;

/// Renders one diagram record per requested diagram kind.
#[derive(Debug, Default, Clone, Copy)]
pub struct VisualizationStage;

/// Per-diagram result. A failed diagram does not abort the batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum DiagramOutcome {
    Succeeded {
        record_id: String,
        description: String,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VisualizationBatch {
    pub total_diagrams: usize,
    pub successful_diagrams: usize,
    pub diagrams: BTreeMap<DiagramKind, DiagramOutcome>,
}

impl VisualizationBatch {
    fn push(&mut self, kind: DiagramKind, outcome: DiagramOutcome) {
        self.total_diagrams += 1;
        if matches!(outcome, DiagramOutcome::Succeeded { .. }) {
            self.successful_diagrams += 1;
        }
        self.diagrams.insert(kind, outcome);
    }

    pub fn failed(&self) -> impl Iterator<Item = (&DiagramKind, &str)> {
        self.diagrams.iter().filter_map(|(kind, outcome)| match outcome {
            DiagramOutcome::Failed { error } => Some((kind, error.as_str())),
            DiagramOutcome::Succeeded { .. } => None,
        })
    }
}

/// Describe the diagram of `kind` for a solution strategy.
pub fn diagram_spec(kind: DiagramKind, strategy: &SolutionStrategy) -> DiagramSpec {
    let spec = DiagramSpec::new(kind);
    match kind {
        DiagramKind::SystemArchitecture => system_architecture(spec, strategy),
        DiagramKind::Infrastructure => infrastructure(spec, strategy),
        DiagramKind::DataFlow => data_flow(spec),
        DiagramKind::ProjectWorkflow => project_workflow(spec, strategy),
        DiagramKind::Sequence => sequence(spec),
        DiagramKind::DatabaseEr => database_er(spec),
    }
}

fn system_architecture(mut spec: DiagramSpec, strategy: &SolutionStrategy) -> DiagramSpec {
    let stack = &strategy.technology_stack;
    spec.nodes = vec![
        DiagramNode::new(
            "Web Interface",
            format!("{} + {}", stack.frontend.framework, stack.frontend.ui_library),
            NodeShape::Rectangle,
        ),
        DiagramNode::new(
            "Mobile App",
            "Cross-platform mobile application",
            NodeShape::Rectangle,
        ),
        DiagramNode::new(
            "API Gateway",
            format!("{} API Gateway", stack.backend.framework),
            NodeShape::Rounded,
        ),
        DiagramNode::new(
            "Authentication Service",
            "JWT-based authentication",
            NodeShape::Rounded,
        ),
        DiagramNode::new(
            "Business Logic",
            format!("{} microservices", stack.backend.runtime),
            NodeShape::Rounded,
        ),
        DiagramNode::new(
            "Primary Database",
            format!("{} database", stack.database.primary),
            NodeShape::Cylinder,
        ),
        DiagramNode::new(
            "Cache Layer",
            format!("{} caching", stack.database.cache),
            NodeShape::Cylinder,
        ),
        DiagramNode::new(
            "Cloud Infrastructure",
            format!("{} cloud services", stack.infrastructure.cloud_provider),
            NodeShape::Rhombus,
        ),
    ];
    spec.chain(None)
}

fn infrastructure(mut spec: DiagramSpec, strategy: &SolutionStrategy) -> DiagramSpec {
    let containers = format!(
        "{} containers",
        strategy.technology_stack.infrastructure.containerization
    );
    let layers = [
        ("Load Balancer", "Application Load Balancer", "Load Balancer"),
        ("Web Server", "Nginx reverse proxy", "Web Server"),
        ("Application Server", containers.as_str(), "Application Server"),
        ("Database Server", "Managed database service", "Database"),
        ("File Storage", "Object storage service", "Storage"),
    ];
    spec.nodes = layers
        .iter()
        .map(|(name, description, layer)| {
            DiagramNode::new(*name, *description, NodeShape::Rectangle).in_group(*layer)
        })
        .collect();
    spec.chain(None)
}

fn data_flow(mut spec: DiagramSpec) -> DiagramSpec {
    spec.nodes = vec![
        DiagramNode::new(
            "User Input",
            "User interactions and form submissions",
            NodeShape::Stadium,
        ),
        DiagramNode::new(
            "API Gateway",
            "Request routing and authentication",
            NodeShape::Rounded,
        ),
        DiagramNode::new(
            "Business Logic",
            "Data processing and business rules",
            NodeShape::Rounded,
        ),
        DiagramNode::new("Database", "Persistent data storage", NodeShape::Cylinder),
        DiagramNode::new("Cache", "Temporary data storage", NodeShape::Cylinder),
        DiagramNode::new("User Interface", "Response to user", NodeShape::Rhombus),
    ];
    spec.chain(Some("data"))
}

fn project_workflow(mut spec: DiagramSpec, strategy: &SolutionStrategy) -> DiagramSpec {
    spec.nodes.push(DiagramNode::new(
        "Project Start",
        "Project initiation and kickoff",
        NodeShape::Stadium,
    ));
    for phase in &strategy.implementation_approach.phases {
        spec.nodes.push(DiagramNode::new(
            phase.name.clone(),
            format!("{} - {}", phase.duration, phase.deliverables.join(", ")),
            NodeShape::Rounded,
        ));
    }
    spec.nodes.push(DiagramNode::new(
        "Project Completion",
        "Final delivery and handover",
        NodeShape::Stadium,
    ));
    spec.chain(None)
}

fn sequence(mut spec: DiagramSpec) -> DiagramSpec {
    let participants = [
        "User",
        "Frontend",
        "API Gateway",
        "Backend Service",
        "Database",
    ];
    spec.nodes = participants
        .iter()
        .map(|name| DiagramNode::new(*name, "", NodeShape::Rectangle))
        .collect();
    let requests = ["Submit request", "API call", "Process request", "Query data"];
    let replies = [
        "Return data",
        "Return response",
        "Return data",
        "Display result",
    ];
    for (pair, label) in participants.windows(2).zip(requests) {
        spec.edges
            .push(DiagramEdge::new(pair[0], pair[1]).labeled(label));
    }
    for (pair, label) in participants.windows(2).rev().zip(replies) {
        spec.edges
            .push(DiagramEdge::new(pair[1], pair[0]).labeled(label).reply());
    }
    spec
}

fn database_er(mut spec: DiagramSpec) -> DiagramSpec {
    let entity = |name: &str, attributes: &[(&str, &str, Option<&str>)]| DiagramEntity {
        name: name.to_string(),
        attributes: attributes
            .iter()
            .map(|(data_type, name, constraint)| EntityAttribute {
                data_type: data_type.to_string(),
                name: name.to_string(),
                constraint: constraint.map(str::to_string),
            })
            .collect(),
    };
    spec.entities = vec![
        entity(
            "User",
            &[
                ("int", "id", Some("PK")),
                ("varchar", "email", Some("UNIQUE")),
                ("varchar", "password_hash", None),
                ("timestamp", "created_at", None),
                ("timestamp", "updated_at", None),
            ],
        ),
        entity(
            "Project",
            &[
                ("int", "id", Some("PK")),
                ("varchar", "name", None),
                ("text", "description", None),
                ("varchar", "status", None),
                ("timestamp", "created_at", None),
            ],
        ),
        entity(
            "Task",
            &[
                ("int", "id", Some("PK")),
                ("varchar", "title", None),
                ("text", "description", None),
                ("varchar", "status", None),
                ("varchar", "priority", None),
                ("date", "due_date", None),
            ],
        ),
    ];
    spec.chain(None)
}

#[async_trait]
impl Stage for VisualizationStage {
    fn kind(&self) -> RecordKind {
        STAGE
    }

    async fn run(
        &self,
        ctx: &StageContext,
        session_id: SessionId,
        params: &StageParams,
    ) -> Result<StageOutcome, StageError> {
        let (strategy_id, strategy) = require(
            ctx,
            session_id,
            STAGE,
            RecordKind::SolutionStrategy,
            StagePayload::as_solution_strategy,
        )
        .await?;
        let mut kinds = params
            .diagram_types
            .clone()
            .unwrap_or_else(|| ctx.config.workflow.diagrams.clone());
        // One record per kind; repeats keep their first position.
        let mut seen = BTreeSet::new();
        kinds.retain(|kind| seen.insert(*kind));
        if kinds.is_empty() {
            return Err(StageError::MissingInput {
                stage: STAGE,
                detail: "no diagram types requested".to_string(),
            });
        }

        let mut batch = VisualizationBatch::default();
        let mut record_ids = Vec::new();
        for kind in kinds {
            let code = match ctx.renderer.render(&diagram_spec(kind, &strategy)) {
                Ok(code) => code,
                Err(err) => {
                    warn!(
                        "diagram failed, continuing batch (session_id={}, diagram={}, error={})",
                        session_id, kind, err
                    );
                    batch.push(
                        kind,
                        DiagramOutcome::Failed {
                            error: err.to_string(),
                        },
                    );
                    continue;
                }
            };
            let description = kind.description().to_string();
            let payload = StagePayload::Visualization(Visualization {
                diagram_type: kind,
                mermaid_code: code,
                description: description.clone(),
            });
            let record = commit(ctx, session_id, STAGE, payload).await?;
            record_ids.push(record.id.clone());
            batch.push(
                kind,
                DiagramOutcome::Succeeded {
                    record_id: record.id,
                    description,
                },
            );
        }
        info!(
            "visualizations created (session_id={}, strategy={}, successful={}, total={})",
            session_id, strategy_id, batch.successful_diagrams, batch.total_diagrams
        );
        Ok(StageOutcome::new(
            STAGE,
            record_ids,
            StageResult::Diagrams(batch),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{DiagramRenderer, MermaidRenderer};
    use crate::stages::{SolutionStrategyStage, TenderAnalysisStage};
    use pretty_assertions::assert_eq;
    use tenderflow_memory::MemoryHandle;
    use uuid::Uuid;

    async fn strategy() -> SolutionStrategy {
        let ctx = StageContext::new(MemoryHandle::in_memory());
        let session = Uuid::new_v4();
        let params = StageParams::new().with_text("The platform must track shipments.");
        TenderAnalysisStage
            .run(&ctx, session, &params)
            .await
            .expect("analysis");
        SolutionStrategyStage
            .run(&ctx, session, &params)
            .await
            .expect("strategy");
        ctx.memory
            .get_latest(session, RecordKind::SolutionStrategy)
            .await
            .and_then(|record| record.payload.as_solution_strategy().cloned())
            .expect("strategy payload")
    }

    #[tokio::test]
    async fn every_kind_renders() {
        let strategy = strategy().await;
        for kind in DiagramKind::ALL {
            let code = MermaidRenderer
                .render(&diagram_spec(kind, &strategy))
                .expect("render");
            assert!(!code.trim().is_empty(), "{kind}");
        }
    }

    #[tokio::test]
    async fn workflow_wraps_phases() {
        let strategy = strategy().await;
        let code = MermaidRenderer
            .render(&diagram_spec(DiagramKind::ProjectWorkflow, &strategy))
            .expect("render");
        assert!(code.starts_with("graph TD\n    Project_Start([\"Project Start<br/>Project initiation and kickoff\"])"));
        assert!(code.contains(
            "Development_Phase_1(\"Development Phase 1<br/>4-6 weeks - Core functionality, Basic UI, API endpoints\")"
        ));
        assert!(code.ends_with("    Testing___Deployment --> Project_Completion"));
    }

    #[test]
    fn sequence_replies_run_backwards() {
        let spec = sequence(DiagramSpec::new(DiagramKind::Sequence));
        let replies: Vec<(String, String)> = spec
            .edges
            .iter()
            .skip(4)
            .map(|edge| (edge.from.clone(), edge.to.clone()))
            .collect();
        assert_eq!(
            replies.first(),
            Some(&("Database".to_string(), "Backend Service".to_string()))
        );
        assert_eq!(
            replies.last(),
            Some(&("Frontend".to_string(), "User".to_string()))
        );
    }

    #[tokio::test]
    async fn repeated_kinds_render_once() {
        let ctx = StageContext::new(MemoryHandle::in_memory());
        let session = Uuid::new_v4();
        let params = StageParams::new().with_text("The platform must track shipments.");
        TenderAnalysisStage
            .run(&ctx, session, &params)
            .await
            .expect("analysis");
        SolutionStrategyStage
            .run(&ctx, session, &params)
            .await
            .expect("strategy");

        let params = params.with_diagrams(vec![
            DiagramKind::Sequence,
            DiagramKind::DataFlow,
            DiagramKind::Sequence,
        ]);
        let outcome = VisualizationStage
            .run(&ctx, session, &params)
            .await
            .expect("visualization");
        assert_eq!(
            outcome.record_ids,
            vec!["visualization_0".to_string(), "visualization_1".to_string()]
        );
        let StageResult::Diagrams(batch) = outcome.result else {
            panic!("expected a diagram batch");
        };
        assert_eq!(batch.total_diagrams, 2);
        assert_eq!(batch.successful_diagrams, 2);
        assert_eq!(batch.diagrams.len(), 2);
        let stored: Vec<DiagramKind> = ctx
            .memory
            .get_all(session, RecordKind::Visualization)
            .await
            .iter()
            .filter_map(|record| record.payload.as_visualization())
            .map(|diagram| diagram.diagram_type)
            .collect();
        assert_eq!(stored, vec![DiagramKind::Sequence, DiagramKind::DataFlow]);
    }

    #[tokio::test]
    async fn needs_a_strategy() {
        let ctx = StageContext::new(MemoryHandle::in_memory());
        let err = VisualizationStage
            .run(&ctx, Uuid::new_v4(), &StageParams::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StageError::PrerequisiteMissing {
                prerequisite: RecordKind::SolutionStrategy,
                ..
            }
        ));
    }
}
