use super::{Stage, StageContext, StageOutcome, StageParams, commit, format_usd, narrate, optional, require};
use crate::error::StageError;
use async_trait::async_trait;
use log::info;
use std::collections::{BTreeMap, BTreeSet};
use tenderflow_protocol::{
    ArchitectureSection, AssumptionsSection, ClientBackground, CostSection, DiagramEntry,
    ExecutiveSummary, ImplementationSection, PaymentMilestone, PlanSection, ProjectPlan,
    ProposalSources, ProposedSolution, RecordKind, RequirementsAnalysis, RiskLevel, RiskSection,
    SessionId, SolutionStrategy, StagePayload, TechnicalProposal, TenderAnalysis,
};

const STAGE: RecordKind = RecordKind::TechnicalProposal;

/// Assembles the proposal from every earlier stage output.
///
/// Analysis and strategy are required. Without a plan the plan-backed
/// sections carry the `"No project plan data available"` placeholder.
#[derive(Debug, Default, Clone, Copy)]
pub struct TechnicalWriterStage;

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn or_default(value: &str, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

fn executive_summary(strategy: &SolutionStrategy, plan: Option<&ProjectPlan>) -> ExecutiveSummary {
    let overview = &strategy.solution_overview;
    ExecutiveSummary {
        project_overview: or_default(&overview.summary, "Comprehensive technical solution"),
        business_value: or_default(
            &overview.business_value,
            "Improved efficiency and cost reduction",
        ),
        key_features: overview.key_features.clone(),
        total_cost: plan.map_or(0.0, |plan| plan.cost_estimates.total_cost),
        duration: plan.map_or(0, |plan| plan.timeline.total_duration_weeks),
        team_size: plan.map_or(0, |plan| plan.resource_allocation.team_members.len()),
        risk_level: plan.map_or(RiskLevel::Medium, |plan| plan.risk_assessment.risk_level),
    }
}

fn client_background(analysis: &TenderAnalysis) -> ClientBackground {
    let requirements = &analysis.requirements;
    ClientBackground {
        client_description: or_default(
            &requirements.client_background,
            "Client information to be provided",
        ),
        project_scope: or_default(&requirements.project_scope, "Project scope to be defined"),
        key_stakeholders: requirements.key_stakeholders.iter().cloned().collect(),
        success_criteria: requirements.success_criteria.iter().cloned().collect(),
    }
}

fn requirements_analysis(analysis: &TenderAnalysis) -> RequirementsAnalysis {
    let requirements = &analysis.requirements;
    let list = |set: &BTreeSet<String>| -> Vec<String> { set.iter().cloned().collect() };
    RequirementsAnalysis {
        functional_requirements: list(&requirements.functional_requirements),
        non_functional_requirements: list(&requirements.non_functional_requirements),
        technical_constraints: list(&requirements.technical_constraints),
        budget_constraints: list(&requirements.budget_constraints),
        timeline_constraints: list(&requirements.timeline_constraints),
        missing_information: analysis.missing_information.clone(),
        document_quality_score: analysis.structure_analysis.quality_score,
    }
}

fn proposed_solution(strategy: &SolutionStrategy) -> ProposedSolution {
    let overview = &strategy.solution_overview;
    ProposedSolution {
        overview: overview.summary.clone(),
        key_features: overview.key_features.clone(),
        business_value: overview.business_value.clone(),
        differentiators: overview.differentiators.clone(),
        technology_stack: strategy.technology_stack.clone(),
    }
}

fn architecture_section(strategy: &SolutionStrategy) -> ArchitectureSection {
    let architecture = &strategy.technical_architecture;
    ArchitectureSection {
        layers: architecture.layers.clone(),
        integration_points: architecture.integration_points.clone(),
        security_measures: architecture.security_measures.clone(),
        scalability_features: strings(&[
            "Horizontal scaling with load balancers",
            "Database read replicas",
            "Caching layers for performance",
            "Microservices architecture",
        ]),
    }
}

fn implementation_section(
    strategy: &SolutionStrategy,
    plan: Option<&ProjectPlan>,
) -> ImplementationSection {
    let approach = &strategy.implementation_approach;
    ImplementationSection {
        methodology: or_default(&approach.methodology, "Agile with Scrum"),
        phases: approach.phases.clone(),
        team_structure: approach.team_structure.clone(),
        quality_gates: plan
            .map(|plan| plan.quality_assurance.quality_gates.clone())
            .unwrap_or_default(),
    }
}

fn plan_section<T>(plan: Option<&ProjectPlan>, build: impl FnOnce(&ProjectPlan) -> T) -> PlanSection<T> {
    match plan {
        Some(plan) => PlanSection::Available(build(plan)),
        None => PlanSection::missing_plan(),
    }
}

fn cost_section(plan: &ProjectPlan) -> CostSection {
    let milestone = |name: &str| PaymentMilestone {
        milestone: name.to_string(),
        percentage: 25,
    };
    CostSection {
        total_cost: plan.cost_estimates.total_cost,
        breakdown: plan.cost_estimates.clone(),
        payment_schedule: vec![
            milestone("Project Start"),
            milestone("Phase 1 Complete"),
            milestone("Phase 2 Complete"),
            milestone("Project Completion"),
        ],
    }
}

fn risk_section(plan: &ProjectPlan) -> RiskSection {
    let assessment = &plan.risk_assessment;
    RiskSection {
        overall_risk_level: assessment.risk_level,
        risk_score: assessment.overall_risk_score,
        risks: assessment.risks.clone(),
        mitigation_strategies: assessment.recommendations.clone(),
    }
}

fn next_steps() -> Vec<String> {
    strings(&[
        "Review and approve the technical proposal",
        "Sign the project agreement",
        "Schedule project kickoff meeting",
        "Provide access to existing systems and documentation",
        "Assign project team members",
        "Begin project planning and setup phase",
    ])
}

/// Render the proposal as a Markdown document.
pub fn render_markdown(proposal: &TechnicalProposal) -> String {
    let summary = &proposal.executive_summary;
    let mut out = String::from("# Technical Proposal\n\n");

    out.push_str("## Executive Summary\n\n");
    out.push_str(&format!("**Project Overview:** {}\n\n", summary.project_overview));
    out.push_str(&format!("**Business Value:** {}\n\n", summary.business_value));
    out.push_str(&format!("**Total Cost:** {}\n\n", format_usd(summary.total_cost)));
    out.push_str(&format!("**Duration:** {} weeks\n\n", summary.duration));
    out.push_str(&format!("**Team Size:** {} members\n\n", summary.team_size));
    out.push_str(&format!("**Risk Level:** {}\n\n", summary.risk_level));

    out.push_str("## Requirements Analysis\n\n### Functional Requirements\n");
    for requirement in &proposal.requirements_analysis.functional_requirements {
        out.push_str(&format!("- {requirement}\n"));
    }
    out.push('\n');

    let solution = &proposal.proposed_solution;
    out.push_str("## Proposed Solution\n\n");
    out.push_str(&format!("{}\n\n### Key Features\n", solution.overview));
    for feature in &solution.key_features {
        out.push_str(&format!("- {feature}\n"));
    }
    out.push('\n');

    let implementation = &proposal.implementation_plan;
    out.push_str("## Implementation Plan\n\n");
    out.push_str(&format!(
        "**Methodology:** {}\n\n### Phases\n",
        implementation.methodology
    ));
    for phase in &implementation.phases {
        out.push_str(&format!("- **{}:** {}\n", phase.name, phase.duration));
    }
    out.push('\n');

    if !proposal.diagrams_and_visualizations.is_empty() {
        out.push_str("## Diagrams\n\n");
        for (diagram_type, entry) in &proposal.diagrams_and_visualizations {
            out.push_str(&format!(
                "### {diagram_type}\n\n{}\n\n```mermaid\n{}\n```\n\n",
                entry.description, entry.mermaid_code
            ));
        }
    }

    out.push_str("## Next Steps\n\n");
    for step in &proposal.next_steps {
        out.push_str(&format!("- {step}\n"));
    }
    out.push('\n');
    out
}

#[async_trait]
impl Stage for TechnicalWriterStage {
    fn kind(&self) -> RecordKind {
        STAGE
    }

    async fn run(
        &self,
        ctx: &StageContext,
        session_id: SessionId,
        _params: &StageParams,
    ) -> Result<StageOutcome, StageError> {
        let (analysis_id, analysis) = require(
            ctx,
            session_id,
            STAGE,
            RecordKind::TenderAnalysis,
            StagePayload::as_tender_analysis,
        )
        .await?;
        let (strategy_id, strategy) = require(
            ctx,
            session_id,
            STAGE,
            RecordKind::SolutionStrategy,
            StagePayload::as_solution_strategy,
        )
        .await?;
        let plan = optional(
            ctx,
            session_id,
            RecordKind::ProjectPlan,
            StagePayload::as_project_plan,
        )
        .await;
        let plan_id = plan.as_ref().map(|(id, _)| id.clone());
        let plan = plan.map(|(_, plan)| plan);
        let plan = plan.as_ref();

        let mut diagrams = BTreeMap::new();
        let mut visualization_ids = Vec::new();
        for record in ctx
            .memory
            .get_all(session_id, RecordKind::Visualization)
            .await
        {
            if let Some(visualization) = record.payload.as_visualization() {
                visualization_ids.push(record.id.clone());
                diagrams.insert(
                    visualization.diagram_type.as_str().to_string(),
                    DiagramEntry {
                        description: visualization.description.clone(),
                        mermaid_code: visualization.mermaid_code.clone(),
                        record_id: record.id.clone(),
                    },
                );
            }
        }

        let executive_summary = executive_summary(&strategy, plan);
        let cover_letter = narrate(
            ctx,
            STAGE,
            "Write a short cover letter introducing the proposal.",
            format!(
                "{}\nTotal cost: {}\nDuration: {} weeks",
                executive_summary.project_overview,
                format_usd(executive_summary.total_cost),
                executive_summary.duration
            ),
        )
        .await?;

        let proposal = TechnicalProposal {
            executive_summary,
            client_background: client_background(&analysis),
            requirements_analysis: requirements_analysis(&analysis),
            proposed_solution: proposed_solution(&strategy),
            technical_architecture: architecture_section(&strategy),
            implementation_plan: implementation_section(&strategy, plan),
            project_timeline: plan_section(plan, |plan| plan.timeline.clone()),
            cost_breakdown: plan_section(plan, cost_section),
            risk_assessment: plan_section(plan, risk_section),
            quality_assurance: plan_section(plan, |plan| plan.quality_assurance.clone()),
            diagrams_and_visualizations: diagrams,
            assumptions_and_constraints: AssumptionsSection {
                assumptions: strategy.assumptions.clone(),
                constraints: plan.map(|plan| plan.constraints.clone()).unwrap_or_default(),
                dependencies: strings(&[
                    "Client approval and sign-off",
                    "Access to existing systems",
                    "Timely feedback and communication",
                    "Resource availability",
                ]),
            },
            next_steps: next_steps(),
            cover_letter,
            sources: ProposalSources {
                tender_analysis_id: analysis_id,
                solution_strategy_id: strategy_id,
                project_plan_id: plan_id,
                visualization_ids,
            },
        };
        info!(
            "proposal written (session_id={}, with_plan={}, diagrams={})",
            session_id,
            proposal.sources.project_plan_id.is_some(),
            proposal.diagrams_and_visualizations.len()
        );
        let record = commit(
            ctx,
            session_id,
            STAGE,
            StagePayload::TechnicalProposal(proposal),
        )
        .await?;
        Ok(StageOutcome::record(STAGE, record))
    }
}
