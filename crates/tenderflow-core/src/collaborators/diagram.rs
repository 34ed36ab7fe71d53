//! Diagram descriptions and the Mermaid renderer.

use crate::error::CollaboratorError;
use std::collections::HashSet;
use tenderflow_protocol::DiagramKind;

/// How a node is drawn in flowchart diagrams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeShape {
    Rectangle,
    Rounded,
    Cylinder,
    Rhombus,
    Stadium,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiagramNode {
    pub name: String,
    pub description: String,
    pub shape: NodeShape,
    /// Subgraph the node belongs to, if any.
    pub group: Option<String>,
}

impl DiagramNode {
    pub fn new(name: impl Into<String>, description: impl Into<String>, shape: NodeShape) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            shape,
            group: None,
        }
    }

    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeStyle {
    Solid,
    /// Dashed return message in sequence diagrams.
    Reply,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiagramEdge {
    pub from: String,
    pub to: String,
    pub label: Option<String>,
    pub style: EdgeStyle,
}

impl DiagramEdge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            label: None,
            style: EdgeStyle::Solid,
        }
    }

    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn reply(mut self) -> Self {
        self.style = EdgeStyle::Reply;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityAttribute {
    pub data_type: String,
    pub name: String,
    pub constraint: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiagramEntity {
    pub name: String,
    pub attributes: Vec<EntityAttribute>,
}

/// Renderer-neutral description of one diagram.
///
/// Flowchart kinds use `nodes`, sequence diagrams treat nodes as
/// participants, and ER diagrams use `entities`. Edges always refer to node
/// or entity names.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagramSpec {
    pub kind: DiagramKind,
    pub nodes: Vec<DiagramNode>,
    pub edges: Vec<DiagramEdge>,
    pub entities: Vec<DiagramEntity>,
}

impl DiagramSpec {
    pub fn new(kind: DiagramKind) -> Self {
        Self {
            kind,
            nodes: Vec::new(),
            edges: Vec::new(),
            entities: Vec::new(),
        }
    }

    /// Connect consecutive nodes, or consecutive entities for ER diagrams.
    pub fn chain(mut self, label: Option<&str>) -> Self {
        let names: Vec<String> = if self.kind == DiagramKind::DatabaseEr {
            self.entities.iter().map(|entity| entity.name.clone()).collect()
        } else {
            self.nodes.iter().map(|node| node.name.clone()).collect()
        };
        for pair in names.windows(2) {
            let edge = DiagramEdge::new(pair[0].clone(), pair[1].clone());
            self.edges.push(match label {
                Some(label) => edge.labeled(label),
                None => edge,
            });
        }
        self
    }
}

pub trait DiagramRenderer: Send + Sync {
    fn render(&self, spec: &DiagramSpec) -> Result<String, CollaboratorError>;
}

/// Mermaid identifiers allow only ASCII alphanumerics and underscores.
pub fn sanitize_id(name: &str) -> String {
    let id: String = name
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
        .collect();
    let id = id.trim_matches('_').to_string();
    match id.chars().next() {
        None => "node".to_string(),
        Some(first) if first.is_ascii_digit() => format!("n_{id}"),
        Some(_) => id,
    }
}

fn escape_label(text: &str) -> String {
    text.replace('"', "#quot;")
}

#[derive(Debug, Default, Clone)]
pub struct MermaidRenderer;

impl MermaidRenderer {
    fn check_edges(spec: &DiagramSpec) -> Result<(), CollaboratorError> {
        let known: HashSet<&str> = spec
            .nodes
            .iter()
            .map(|node| node.name.as_str())
            .chain(spec.entities.iter().map(|entity| entity.name.as_str()))
            .collect();
        for edge in &spec.edges {
            for end in [&edge.from, &edge.to] {
                if !known.contains(end.as_str()) {
                    return Err(CollaboratorError::Render(format!(
                        "{} diagram edge refers to unknown node '{end}'",
                        spec.kind
                    )));
                }
            }
        }
        Ok(())
    }

    fn node_line(node: &DiagramNode) -> String {
        let id = sanitize_id(&node.name);
        let label = if node.description.is_empty() {
            escape_label(&node.name)
        } else {
            format!("{}<br/>{}", escape_label(&node.name), escape_label(&node.description))
        };
        match node.shape {
            NodeShape::Rectangle => format!("{id}[\"{label}\"]"),
            NodeShape::Rounded => format!("{id}(\"{label}\")"),
            NodeShape::Cylinder => format!("{id}[(\"{label}\")]"),
            NodeShape::Rhombus => format!("{id}{{\"{label}\"}}"),
            NodeShape::Stadium => format!("{id}([\"{label}\"])"),
        }
    }

    fn flowchart(spec: &DiagramSpec, direction: &str) -> Vec<String> {
        let mut lines = vec![format!("graph {direction}")];
        let mut groups: Vec<&str> = Vec::new();
        for node in &spec.nodes {
            match node.group.as_deref() {
                Some(group) if !groups.contains(&group) => groups.push(group),
                Some(_) => {}
                None => lines.push(format!("    {}", Self::node_line(node))),
            }
        }
        for group in groups {
            lines.push(format!("    subgraph {} [\"{}\"]", sanitize_id(group), escape_label(group)));
            for node in spec
                .nodes
                .iter()
                .filter(|node| node.group.as_deref() == Some(group))
            {
                lines.push(format!("        {}", Self::node_line(node)));
            }
            lines.push("    end".to_string());
        }
        for edge in &spec.edges {
            let from = sanitize_id(&edge.from);
            let to = sanitize_id(&edge.to);
            lines.push(match &edge.label {
                Some(label) => format!("    {from} -->|{}| {to}", escape_label(label)),
                None => format!("    {from} --> {to}"),
            });
        }
        lines
    }

    fn sequence(spec: &DiagramSpec) -> Vec<String> {
        let mut lines = vec!["sequenceDiagram".to_string()];
        for node in &spec.nodes {
            let id = sanitize_id(&node.name);
            if id == node.name {
                lines.push(format!("    participant {id}"));
            } else {
                lines.push(format!("    participant {id} as {}", node.name));
            }
        }
        for edge in &spec.edges {
            let arrow = match edge.style {
                EdgeStyle::Solid => "->>",
                EdgeStyle::Reply => "-->>",
            };
            lines.push(format!(
                "    {}{arrow}{}: {}",
                sanitize_id(&edge.from),
                sanitize_id(&edge.to),
                edge.label.as_deref().unwrap_or("")
            ));
        }
        lines
    }

    fn entity_relationship(spec: &DiagramSpec) -> Vec<String> {
        let mut lines = vec!["erDiagram".to_string()];
        for entity in &spec.entities {
            lines.push(format!("    {} {{", sanitize_id(&entity.name)));
            for attribute in &entity.attributes {
                let mut line = format!("        {} {}", attribute.data_type, attribute.name);
                if let Some(constraint) = &attribute.constraint {
                    line.push(' ');
                    line.push_str(constraint);
                }
                lines.push(line);
            }
            lines.push("    }".to_string());
        }
        for edge in &spec.edges {
            lines.push(format!(
                "    {} ||--o{{ {} : {}",
                sanitize_id(&edge.from),
                sanitize_id(&edge.to),
                edge.label.as_deref().unwrap_or("relates")
            ));
        }
        lines
    }
}

impl DiagramRenderer for MermaidRenderer {
    fn render(&self, spec: &DiagramSpec) -> Result<String, CollaboratorError> {
        if spec.nodes.is_empty() && spec.entities.is_empty() {
            return Err(CollaboratorError::Render(format!(
                "{} diagram has nothing to draw",
                spec.kind
            )));
        }
        Self::check_edges(spec)?;
        let lines = match spec.kind {
            DiagramKind::SystemArchitecture
            | DiagramKind::Infrastructure
            | DiagramKind::ProjectWorkflow => Self::flowchart(spec, "TD"),
            DiagramKind::DataFlow => Self::flowchart(spec, "LR"),
            DiagramKind::Sequence => Self::sequence(spec),
            DiagramKind::DatabaseEr => Self::entity_relationship(spec),
        };
        Ok(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn sanitizes_identifiers() {
        assert_eq!(sanitize_id("API Gateway"), "API_Gateway");
        assert_eq!(sanitize_id("Discovery & Planning"), "Discovery___Planning");
        assert_eq!(sanitize_id("3rd Party"), "n_3rd_Party");
        assert_eq!(sanitize_id("!!"), "node");
    }

    #[test]
    fn renders_system_architecture_shapes() {
        let mut spec = DiagramSpec::new(DiagramKind::SystemArchitecture);
        spec.nodes = vec![
            DiagramNode::new("Web Interface", "React.js", NodeShape::Rectangle),
            DiagramNode::new("API Gateway", "", NodeShape::Rounded),
            DiagramNode::new("Primary Database", "PostgreSQL", NodeShape::Cylinder),
            DiagramNode::new("Cloud", "AWS", NodeShape::Rhombus),
        ];
        let spec = spec.chain(None);
        let code = MermaidRenderer.render(&spec).expect("render");
        assert_eq!(
            code,
            [
                "graph TD",
                "    Web_Interface[\"Web Interface<br/>React.js\"]",
                "    API_Gateway(\"API Gateway\")",
                "    Primary_Database[(\"Primary Database<br/>PostgreSQL\")]",
                "    Cloud{\"Cloud<br/>AWS\"}",
                "    Web_Interface --> API_Gateway",
                "    API_Gateway --> Primary_Database",
                "    Primary_Database --> Cloud",
            ]
            .join("\n")
        );
    }

    #[test]
    fn groups_nodes_into_subgraphs() {
        let mut spec = DiagramSpec::new(DiagramKind::Infrastructure);
        spec.nodes = vec![
            DiagramNode::new("Load Balancer", "", NodeShape::Rectangle).in_group("Load Balancer"),
            DiagramNode::new("Web Server", "Nginx", NodeShape::Rectangle).in_group("Web Server"),
        ];
        spec.edges.push(DiagramEdge::new("Load Balancer", "Web Server"));
        let code = MermaidRenderer.render(&spec).expect("render");
        assert!(code.contains("    subgraph Load_Balancer [\"Load Balancer\"]"));
        assert!(code.contains("        Web_Server[\"Web Server<br/>Nginx\"]"));
        assert!(code.ends_with("    Load_Balancer --> Web_Server"));
    }

    #[test]
    fn renders_sequence_replies_dashed() {
        let mut spec = DiagramSpec::new(DiagramKind::Sequence);
        spec.nodes = vec![
            DiagramNode::new("User", "", NodeShape::Rectangle),
            DiagramNode::new("API Gateway", "", NodeShape::Rectangle),
        ];
        spec.edges = vec![
            DiagramEdge::new("User", "API Gateway").labeled("Submit request"),
            DiagramEdge::new("API Gateway", "User").labeled("Return data").reply(),
        ];
        let code = MermaidRenderer.render(&spec).expect("render");
        assert_eq!(
            code,
            [
                "sequenceDiagram",
                "    participant User",
                "    participant API_Gateway as API Gateway",
                "    User->>API_Gateway: Submit request",
                "    API_Gateway-->>User: Return data",
            ]
            .join("\n")
        );
    }

    #[test]
    fn renders_entities_with_constraints() {
        let mut spec = DiagramSpec::new(DiagramKind::DatabaseEr);
        spec.entities = vec![
            DiagramEntity {
                name: "User".to_string(),
                attributes: vec![EntityAttribute {
                    data_type: "int".to_string(),
                    name: "id".to_string(),
                    constraint: Some("PK".to_string()),
                }],
            },
            DiagramEntity {
                name: "Project".to_string(),
                attributes: Vec::new(),
            },
        ];
        let code = MermaidRenderer.render(&spec.chain(None)).expect("render");
        assert!(code.starts_with("erDiagram\n    User {\n        int id PK\n    }"));
        assert!(code.ends_with("    User ||--o{ Project : relates"));
    }

    #[test]
    fn rejects_dangling_edges_and_empty_specs() {
        let empty = DiagramSpec::new(DiagramKind::DataFlow);
        assert!(MermaidRenderer.render(&empty).is_err());

        let mut spec = DiagramSpec::new(DiagramKind::DataFlow);
        spec.nodes.push(DiagramNode::new("Input", "", NodeShape::Stadium));
        spec.edges.push(DiagramEdge::new("Input", "Nowhere"));
        let err = MermaidRenderer.render(&spec).unwrap_err();
        assert!(err.to_string().contains("Nowhere"));
    }
}
