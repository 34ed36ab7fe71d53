//! Typed stage outputs and the tagged payload persisted with every record.

use crate::{PayloadError, RecordKind};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Structured requirements pulled out of a tender document.
///
/// List fields are sets: members are trimmed, non-empty, and unique
/// (case-sensitive). Use [`Requirements::insert`] to keep that invariant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Requirements {
    #[serde(default)]
    pub functional_requirements: BTreeSet<String>,
    #[serde(default)]
    pub non_functional_requirements: BTreeSet<String>,
    #[serde(default)]
    pub technical_constraints: BTreeSet<String>,
    #[serde(default)]
    pub budget_constraints: BTreeSet<String>,
    #[serde(default)]
    pub timeline_constraints: BTreeSet<String>,
    #[serde(default)]
    pub key_stakeholders: BTreeSet<String>,
    #[serde(default)]
    pub success_criteria: BTreeSet<String>,
    #[serde(default)]
    pub client_background: String,
    #[serde(default)]
    pub project_scope: String,
}

impl Requirements {
    /// Insert a trimmed value into a set, ignoring blanks.
    pub fn insert(set: &mut BTreeSet<String>, value: &str) -> bool {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return false;
        }
        set.insert(trimmed.to_string())
    }

    /// Named views over every list field, in declaration order.
    pub fn lists(&self) -> [(&'static str, &BTreeSet<String>); 7] {
        [
            ("functional_requirements", &self.functional_requirements),
            (
                "non_functional_requirements",
                &self.non_functional_requirements,
            ),
            ("technical_constraints", &self.technical_constraints),
            ("budget_constraints", &self.budget_constraints),
            ("timeline_constraints", &self.timeline_constraints),
            ("key_stakeholders", &self.key_stakeholders),
            ("success_criteria", &self.success_criteria),
        ]
    }

    /// Total number of list entries across all categories.
    pub fn total_items(&self) -> usize {
        self.lists().iter().map(|(_, set)| set.len()).sum()
    }

    fn validate(&self) -> Result<(), String> {
        for (name, set) in self.lists() {
            if let Some(item) = set
                .iter()
                .find(|item| item.is_empty() || item.trim() != item.as_str())
            {
                return Err(format!("{name} contains an untrimmed or empty entry: {item:?}"));
            }
        }
        Ok(())
    }
}

/// Section and quality heuristics for a tender document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentStructure {
    #[serde(default)]
    pub sections: Vec<String>,
    pub word_count: usize,
    pub has_executive_summary: bool,
    pub has_requirements_section: bool,
    pub has_technical_specifications: bool,
    pub has_timeline: bool,
    pub has_budget: bool,
    /// 0 to 100.
    pub quality_score: u32,
}

/// Output of the tender analysis stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenderAnalysis {
    pub document_excerpt: String,
    #[serde(default)]
    pub source_paths: Vec<String>,
    pub requirements: Requirements,
    #[serde(default)]
    pub missing_information: Vec<String>,
    pub structure_analysis: DocumentStructure,
    pub confidence_score: f64,
    #[serde(default)]
    pub analyst_notes: String,
    pub analyzed_at: DateTime<Utc>,
}

/// Qualitative level shared by risk impact, probability, and overall rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Numeric weight used for risk scoring.
    pub fn weight(&self) -> u32 {
        match self {
            RiskLevel::Low => 1,
            RiskLevel::Medium => 2,
            RiskLevel::High => 3,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Risk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub risk: String,
    pub impact: RiskLevel,
    pub probability: RiskLevel,
    pub mitigation: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SolutionOverview {
    pub summary: String,
    #[serde(default)]
    pub key_features: Vec<String>,
    pub business_value: String,
    #[serde(default)]
    pub differentiators: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchitectureLayer {
    pub name: String,
    pub components: Vec<String>,
    pub technologies: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TechnicalArchitecture {
    pub layers: Vec<ArchitectureLayer>,
    #[serde(default)]
    pub integration_points: Vec<String>,
    #[serde(default)]
    pub security_measures: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontendStack {
    pub framework: String,
    pub ui_library: String,
    pub state_management: String,
    pub build_tool: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendStack {
    pub runtime: String,
    pub framework: String,
    pub language: String,
    pub api_design: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseStack {
    pub primary: String,
    pub cache: String,
    pub orm: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfrastructureStack {
    pub cloud_provider: String,
    pub containerization: String,
    pub orchestration: String,
    pub ci_cd: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringStack {
    pub logging: String,
    pub metrics: String,
    pub tracing: String,
}

/// Selected technologies grouped by tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnologyStack {
    pub frontend: FrontendStack,
    pub backend: BackendStack,
    pub database: DatabaseStack,
    pub infrastructure: InfrastructureStack,
    pub monitoring: MonitoringStack,
}

/// A delivery phase as proposed by the strategy, durations as ranges like `"2-3 weeks"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseOutline {
    pub name: String,
    pub duration: String,
    #[serde(default)]
    pub deliverables: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamRole {
    pub role: String,
    pub count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImplementationApproach {
    pub methodology: String,
    pub phases: Vec<PhaseOutline>,
    #[serde(default)]
    pub team_structure: Vec<TeamRole>,
}

impl ImplementationApproach {
    /// Total head count across all roles.
    pub fn team_size(&self) -> u32 {
        self.team_structure.iter().map(|role| role.count).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostLine {
    pub amount: f64,
    pub description: String,
}

/// High-level cost envelope produced alongside the strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyCosts {
    pub development: CostLine,
    pub infrastructure: CostLine,
    pub third_party: CostLine,
    pub contingency: CostLine,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekMilestone {
    pub week: u32,
    pub milestone: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimelineEstimate {
    pub total_duration: String,
    #[serde(default)]
    pub milestones: Vec<WeekMilestone>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuccessMetrics {
    #[serde(default)]
    pub technical_metrics: Vec<String>,
    #[serde(default)]
    pub business_metrics: Vec<String>,
    #[serde(default)]
    pub project_metrics: Vec<String>,
}

/// Client-side constraints carried forward from the analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientConstraints {
    #[serde(default)]
    pub budget: Vec<String>,
    #[serde(default)]
    pub timeline: Vec<String>,
    #[serde(default)]
    pub technical: Vec<String>,
}

/// Output of the solution strategy stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionStrategy {
    pub solution_overview: SolutionOverview,
    pub technical_architecture: TechnicalArchitecture,
    pub technology_stack: TechnologyStack,
    pub implementation_approach: ImplementationApproach,
    #[serde(default)]
    pub risk_mitigation: Vec<Risk>,
    pub cost_estimates: StrategyCosts,
    pub timeline_estimate: TimelineEstimate,
    #[serde(default)]
    pub success_metrics: SuccessMetrics,
    #[serde(default)]
    pub assumptions: Vec<String>,
    #[serde(default)]
    pub client_constraints: ClientConstraints,
    #[serde(default)]
    pub rationale: String,
    /// Record id of the tender analysis this strategy was designed from.
    pub source_analysis_id: String,
}

/// Supported diagram types produced by the visualization stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagramKind {
    SystemArchitecture,
    Infrastructure,
    DataFlow,
    ProjectWorkflow,
    Sequence,
    DatabaseEr,
}

impl DiagramKind {
    /// Every diagram in the order the visualization stage renders them.
    pub const ALL: [DiagramKind; 6] = [
        DiagramKind::SystemArchitecture,
        DiagramKind::Infrastructure,
        DiagramKind::DataFlow,
        DiagramKind::ProjectWorkflow,
        DiagramKind::Sequence,
        DiagramKind::DatabaseEr,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DiagramKind::SystemArchitecture => "system_architecture",
            DiagramKind::Infrastructure => "infrastructure",
            DiagramKind::DataFlow => "data_flow",
            DiagramKind::ProjectWorkflow => "project_workflow",
            DiagramKind::Sequence => "sequence",
            DiagramKind::DatabaseEr => "database_er",
        }
    }

    /// Default caption stored with the diagram.
    pub fn description(&self) -> &'static str {
        match self {
            DiagramKind::SystemArchitecture => {
                "System architecture diagram showing all components and their relationships"
            }
            DiagramKind::Infrastructure => "Infrastructure diagram showing deployment architecture",
            DiagramKind::DataFlow => "Data flow diagram showing how data moves through the system",
            DiagramKind::ProjectWorkflow => {
                "Project workflow diagram showing implementation phases"
            }
            DiagramKind::Sequence => "Sequence diagram showing system interactions",
            DiagramKind::DatabaseEr => "Database entity-relationship diagram",
        }
    }
}

impl fmt::Display for DiagramKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiagramKind {
    type Err = PayloadError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        DiagramKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value.trim())
            .ok_or_else(|| PayloadError::UnknownDiagram(value.to_string()))
    }
}

/// Output of the visualization stage; one record per diagram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visualization {
    pub diagram_type: DiagramKind,
    pub mermaid_code: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectOverview {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub objectives: Vec<String>,
    #[serde(default)]
    pub success_criteria: SuccessMetrics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedTask {
    pub name: String,
    pub description: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub duration_weeks: f64,
    pub assigned_to: String,
    pub priority: TaskPriority,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedPhase {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub duration_weeks: u32,
    #[serde(default)]
    pub tasks: Vec<PlannedTask>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub name: String,
    pub date: NaiveDate,
    pub description: String,
}

/// Dated schedule derived from the strategy phases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_duration_weeks: u32,
    pub phases: Vec<PlannedPhase>,
    #[serde(default)]
    pub milestones: Vec<Milestone>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMember {
    pub name: String,
    pub role: String,
    /// Full-time equivalent, 1.0 is full time.
    pub availability: f64,
    #[serde(default)]
    pub skills: Vec<String>,
    pub total_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberAllocation {
    pub name: String,
    pub role: String,
    pub hours_allocated: f64,
    pub utilization: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseAllocation {
    pub phase_name: String,
    pub duration_weeks: u32,
    #[serde(default)]
    pub allocated_members: Vec<MemberAllocation>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UtilizationSummary {
    pub total_project_hours: f64,
    pub total_allocated_hours: f64,
    pub utilization_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceAllocation {
    pub team_members: Vec<TeamMember>,
    #[serde(default)]
    pub phase_allocations: Vec<PhaseAllocation>,
    #[serde(default)]
    pub utilization_summary: UtilizationSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostItem {
    pub amount: f64,
    pub percentage: f64,
    pub description: String,
}

/// Itemised project cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub labor_cost: CostItem,
    pub infrastructure_cost: CostItem,
    pub third_party_cost: CostItem,
    pub contingency: CostItem,
    pub total_cost: f64,
    pub duration_weeks: u32,
    pub team_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub risks: Vec<Risk>,
    /// 0 to 100.
    pub overall_risk_score: f64,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityGate {
    pub phase: String,
    pub criteria: Vec<String>,
    pub approval_required: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityPlan {
    #[serde(default)]
    pub testing_strategy: BTreeMap<String, String>,
    #[serde(default)]
    pub quality_gates: Vec<QualityGate>,
    #[serde(default)]
    pub review_process: BTreeMap<String, String>,
    #[serde(default)]
    pub metrics: BTreeMap<String, String>,
}

/// Output of the project planning stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectPlan {
    pub project_overview: ProjectOverview,
    pub timeline: Timeline,
    pub resource_allocation: ResourceAllocation,
    pub cost_estimates: CostBreakdown,
    pub risk_assessment: RiskAssessment,
    pub quality_assurance: QualityPlan,
    #[serde(default)]
    pub assumptions: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub planning_notes: String,
    /// Record id of the strategy this plan was built from.
    pub source_strategy_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutiveSummary {
    pub project_overview: String,
    pub business_value: String,
    #[serde(default)]
    pub key_features: Vec<String>,
    pub total_cost: f64,
    /// Weeks.
    pub duration: u32,
    pub team_size: usize,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientBackground {
    pub client_description: String,
    pub project_scope: String,
    #[serde(default)]
    pub key_stakeholders: Vec<String>,
    #[serde(default)]
    pub success_criteria: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequirementsAnalysis {
    #[serde(default)]
    pub functional_requirements: Vec<String>,
    #[serde(default)]
    pub non_functional_requirements: Vec<String>,
    #[serde(default)]
    pub technical_constraints: Vec<String>,
    #[serde(default)]
    pub budget_constraints: Vec<String>,
    #[serde(default)]
    pub timeline_constraints: Vec<String>,
    #[serde(default)]
    pub missing_information: Vec<String>,
    pub document_quality_score: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedSolution {
    pub overview: String,
    #[serde(default)]
    pub key_features: Vec<String>,
    pub business_value: String,
    #[serde(default)]
    pub differentiators: Vec<String>,
    pub technology_stack: TechnologyStack,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArchitectureSection {
    pub layers: Vec<ArchitectureLayer>,
    #[serde(default)]
    pub integration_points: Vec<String>,
    #[serde(default)]
    pub security_measures: Vec<String>,
    #[serde(default)]
    pub scalability_features: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImplementationSection {
    pub methodology: String,
    #[serde(default)]
    pub phases: Vec<PhaseOutline>,
    #[serde(default)]
    pub team_structure: Vec<TeamRole>,
    #[serde(default)]
    pub quality_gates: Vec<QualityGate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMilestone {
    pub milestone: String,
    pub percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostSection {
    pub total_cost: f64,
    pub breakdown: CostBreakdown,
    pub payment_schedule: Vec<PaymentMilestone>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSection {
    pub overall_risk_level: RiskLevel,
    pub risk_score: f64,
    pub risks: Vec<Risk>,
    #[serde(default)]
    pub mitigation_strategies: Vec<String>,
}

/// Placeholder text used when a proposal section depends on a missing plan.
pub const NO_PROJECT_PLAN: &str = "No project plan data available";

/// A proposal section that may be unavailable when no project plan exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlanSection<T> {
    Available(T),
    Unavailable { error: String },
}

impl<T> PlanSection<T> {
    /// Build the placeholder for a proposal written without a plan.
    pub fn missing_plan() -> Self {
        PlanSection::Unavailable {
            error: NO_PROJECT_PLAN.to_string(),
        }
    }

    pub fn available(&self) -> Option<&T> {
        match self {
            PlanSection::Available(value) => Some(value),
            PlanSection::Unavailable { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramEntry {
    pub description: String,
    pub mermaid_code: String,
    pub record_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssumptionsSection {
    #[serde(default)]
    pub assumptions: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// Record ids the proposal was assembled from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProposalSources {
    pub tender_analysis_id: String,
    pub solution_strategy_id: String,
    #[serde(default)]
    pub project_plan_id: Option<String>,
    #[serde(default)]
    pub visualization_ids: Vec<String>,
}

/// Output of the technical writing stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalProposal {
    pub executive_summary: ExecutiveSummary,
    pub client_background: ClientBackground,
    pub requirements_analysis: RequirementsAnalysis,
    pub proposed_solution: ProposedSolution,
    pub technical_architecture: ArchitectureSection,
    pub implementation_plan: ImplementationSection,
    pub project_timeline: PlanSection<Timeline>,
    pub cost_breakdown: PlanSection<CostSection>,
    pub risk_assessment: PlanSection<RiskSection>,
    pub quality_assurance: PlanSection<QualityPlan>,
    /// Keyed by diagram type.
    #[serde(default)]
    pub diagrams_and_visualizations: BTreeMap<String, DiagramEntry>,
    pub assumptions_and_constraints: AssumptionsSection,
    #[serde(default)]
    pub next_steps: Vec<String>,
    #[serde(default)]
    pub cover_letter: String,
    pub sources: ProposalSources,
}

/// Tagged union over every stage output; the only shape the memory store accepts.
#[allow(clippy::large_enum_variant)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "data")]
pub enum StagePayload {
    TenderAnalysis(TenderAnalysis),
    SolutionStrategy(SolutionStrategy),
    Visualization(Visualization),
    ProjectPlan(ProjectPlan),
    TechnicalProposal(TechnicalProposal),
}

impl StagePayload {
    /// Record kind this payload is stored under.
    pub fn kind(&self) -> RecordKind {
        match self {
            StagePayload::TenderAnalysis(_) => RecordKind::TenderAnalysis,
            StagePayload::SolutionStrategy(_) => RecordKind::SolutionStrategy,
            StagePayload::Visualization(_) => RecordKind::Visualization,
            StagePayload::ProjectPlan(_) => RecordKind::ProjectPlan,
            StagePayload::TechnicalProposal(_) => RecordKind::TechnicalProposal,
        }
    }

    /// Check structural invariants before the payload is persisted.
    pub fn validate(&self) -> Result<(), PayloadError> {
        let kind = self.kind();
        let invalid = |message: String| PayloadError::Invalid { kind, message };
        match self {
            StagePayload::TenderAnalysis(analysis) => {
                analysis.requirements.validate().map_err(invalid)?;
                if !(0.0..=1.0).contains(&analysis.confidence_score) {
                    return Err(invalid(format!(
                        "confidence_score {} outside [0, 1]",
                        analysis.confidence_score
                    )));
                }
                if analysis.structure_analysis.quality_score > 100 {
                    return Err(invalid("quality_score above 100".to_string()));
                }
            }
            StagePayload::SolutionStrategy(strategy) => {
                if strategy.implementation_approach.phases.is_empty() {
                    return Err(invalid("implementation approach has no phases".to_string()));
                }
                if strategy.source_analysis_id.trim().is_empty() {
                    return Err(invalid("source_analysis_id is empty".to_string()));
                }
            }
            StagePayload::Visualization(visualization) => {
                if visualization.mermaid_code.trim().is_empty() {
                    return Err(invalid(format!(
                        "{} diagram has no mermaid code",
                        visualization.diagram_type
                    )));
                }
            }
            StagePayload::ProjectPlan(plan) => {
                if plan.timeline.end_date < plan.timeline.start_date {
                    return Err(invalid("timeline ends before it starts".to_string()));
                }
                if plan.cost_estimates.total_cost < 0.0 {
                    return Err(invalid("total_cost is negative".to_string()));
                }
            }
            StagePayload::TechnicalProposal(proposal) => {
                if proposal.sources.tender_analysis_id.trim().is_empty()
                    || proposal.sources.solution_strategy_id.trim().is_empty()
                {
                    return Err(invalid(
                        "proposal must reference its analysis and strategy".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn as_tender_analysis(&self) -> Option<&TenderAnalysis> {
        match self {
            StagePayload::TenderAnalysis(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_solution_strategy(&self) -> Option<&SolutionStrategy> {
        match self {
            StagePayload::SolutionStrategy(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_visualization(&self) -> Option<&Visualization> {
        match self {
            StagePayload::Visualization(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_project_plan(&self) -> Option<&ProjectPlan> {
        match self {
            StagePayload::ProjectPlan(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_technical_proposal(&self) -> Option<&TechnicalProposal> {
        match self {
            StagePayload::TechnicalProposal(value) => Some(value),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn analysis(confidence: f64) -> TenderAnalysis {
        TenderAnalysis {
            document_excerpt: "excerpt".to_string(),
            source_paths: Vec::new(),
            requirements: Requirements::default(),
            missing_information: Vec::new(),
            structure_analysis: DocumentStructure::default(),
            confidence_score: confidence,
            analyst_notes: String::new(),
            analyzed_at: Utc::now(),
        }
    }

    #[test]
    fn insert_trims_and_skips_blanks() {
        let mut set = BTreeSet::new();
        assert!(Requirements::insert(&mut set, "  support barcode scanning "));
        assert!(!Requirements::insert(&mut set, "support barcode scanning"));
        assert!(!Requirements::insert(&mut set, "   "));
        assert_eq!(
            set.into_iter().collect::<Vec<_>>(),
            vec!["support barcode scanning".to_string()]
        );
    }

    #[test]
    fn rejects_out_of_range_confidence() {
        let payload = StagePayload::TenderAnalysis(analysis(1.5));
        let err = payload.validate().expect_err("invalid");
        assert!(err.to_string().contains("confidence_score"));
        assert!(StagePayload::TenderAnalysis(analysis(0.4)).validate().is_ok());
    }

    #[test]
    fn rejects_untrimmed_requirement() {
        let mut value = analysis(0.5);
        value
            .requirements
            .functional_requirements
            .insert(" padded".to_string());
        let err = StagePayload::TenderAnalysis(value)
            .validate()
            .expect_err("invalid");
        assert!(err.to_string().contains("functional_requirements"));
    }

    #[test]
    fn payload_is_tagged_by_kind() {
        let payload = StagePayload::Visualization(Visualization {
            diagram_type: DiagramKind::DataFlow,
            mermaid_code: "graph LR".to_string(),
            description: "flow".to_string(),
        });
        let value = serde_json::to_value(&payload).expect("serialize");
        assert_eq!(value["type"], "visualization");
        assert_eq!(value["data"]["diagram_type"], "data_flow");
        assert_eq!(payload.kind(), RecordKind::Visualization);
    }

    #[test]
    fn empty_diagram_is_invalid() {
        let payload = StagePayload::Visualization(Visualization {
            diagram_type: DiagramKind::Sequence,
            mermaid_code: "  ".to_string(),
            description: String::new(),
        });
        assert!(payload.validate().is_err());
    }

    #[test]
    fn missing_plan_section_serializes_placeholder() {
        let section: PlanSection<Timeline> = PlanSection::missing_plan();
        let value = serde_json::to_value(&section).expect("serialize");
        assert_eq!(value, serde_json::json!({ "error": NO_PROJECT_PLAN }));
        let back: PlanSection<Timeline> = serde_json::from_value(value).expect("deserialize");
        assert_eq!(back.available(), None);
    }

    #[test]
    fn diagram_kind_round_trips_names() {
        for kind in DiagramKind::ALL {
            assert_eq!(kind.as_str().parse::<DiagramKind>().expect("parse"), kind);
        }
        assert!("gantt".parse::<DiagramKind>().is_err());
    }
}
