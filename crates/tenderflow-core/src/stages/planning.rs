use super::{
    Stage, StageContext, StageOutcome, StageParams, commit, format_usd, narrate, require,
    week_range,
};
use crate::error::StageError;
use async_trait::async_trait;
use chrono::{Days, NaiveDate, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tenderflow_config::PlanningConfig;
use tenderflow_protocol::{
    CostBreakdown, CostItem, MemberAllocation, Milestone, PhaseAllocation, PlannedPhase,
    PlannedTask, ProjectOverview, ProjectPlan, QualityGate, QualityPlan, RecordKind,
    ResourceAllocation, Risk, RiskAssessment, RiskLevel, SessionId, SolutionStrategy,
    StagePayload, TaskPriority, TeamMember, TeamRole, Timeline, UtilizationSummary,
};

const STAGE: RecordKind = RecordKind::ProjectPlan;
const DEFAULT_PHASE_WEEKS: u32 = 3;
const PROJECT_NAME: &str = "Technical Solution Implementation";
/// Monthly cloud and database spend.
const INFRASTRUCTURE_MONTHLY: f64 = 200.0 + 150.0;
/// Monthly monitoring and tooling subscriptions.
const THIRD_PARTY_MONTHLY: f64 = 50.0 + 30.0;

/// Turns the latest solution strategy into a dated, costed plan.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProjectPlannerStage;

/// Change to one phase of an existing plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseUpdate {
    pub phase_name: String,
    #[serde(default)]
    pub new_duration: Option<u32>,
    /// Replacement deliverables; empty keeps the current tasks.
    #[serde(default)]
    pub new_tasks: Vec<String>,
}

/// Stakeholder view of the latest project plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanSummary {
    pub project_name: String,
    pub duration_weeks: u32,
    pub team_size: usize,
    pub total_cost: f64,
    pub risk_level: RiskLevel,
    pub key_milestones: Vec<Milestone>,
    pub main_risks: Vec<String>,
}

impl PlanSummary {
    pub fn from_plan(plan: &ProjectPlan) -> Self {
        Self {
            project_name: plan.project_overview.name.clone(),
            duration_weeks: plan.timeline.total_duration_weeks,
            team_size: plan.resource_allocation.team_members.len(),
            total_cost: plan.cost_estimates.total_cost,
            risk_level: plan.risk_assessment.risk_level,
            key_milestones: plan.timeline.milestones.clone(),
            main_risks: plan
                .risk_assessment
                .risks
                .iter()
                .take(3)
                .map(|risk| risk.risk.clone())
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
struct PhaseDraft {
    name: String,
    weeks: u32,
    deliverables: Vec<String>,
}

fn drafts(strategy: &SolutionStrategy) -> Vec<PhaseDraft> {
    strategy
        .implementation_approach
        .phases
        .iter()
        .map(|phase| PhaseDraft {
            name: phase.name.clone(),
            weeks: week_range(&phase.duration)
                .map(|(_, high)| high)
                .unwrap_or(DEFAULT_PHASE_WEEKS),
            deliverables: phase.deliverables.clone(),
        })
        .collect()
}

fn add_days(date: NaiveDate, days: f64) -> NaiveDate {
    date.checked_add_days(Days::new(days.round().max(0.0) as u64))
        .unwrap_or(date)
}

fn build_timeline(start_date: NaiveDate, phases: &[PhaseDraft]) -> Timeline {
    let mut current = start_date;
    let mut planned = Vec::with_capacity(phases.len());
    let mut milestones = Vec::with_capacity(phases.len());
    for phase in phases {
        let phase_end = add_days(current, f64::from(phase.weeks) * 7.0);
        let task_weeks = f64::from(phase.weeks) / phase.deliverables.len().max(1) as f64;
        let tasks = phase
            .deliverables
            .iter()
            .enumerate()
            .map(|(idx, deliverable)| {
                let task_start = add_days(current, idx as f64 * task_weeks * 7.0);
                PlannedTask {
                    name: format!("Deliverable {}", idx + 1),
                    description: deliverable.clone(),
                    start_date: task_start,
                    end_date: add_days(current, (idx + 1) as f64 * task_weeks * 7.0),
                    duration_weeks: task_weeks,
                    assigned_to: "TBD".to_string(),
                    priority: if idx == 0 {
                        TaskPriority::High
                    } else {
                        TaskPriority::Medium
                    },
                }
            })
            .collect();
        planned.push(PlannedPhase {
            name: phase.name.clone(),
            start_date: current,
            end_date: phase_end,
            duration_weeks: phase.weeks,
            tasks,
        });
        milestones.push(Milestone {
            name: format!("Complete {}", phase.name),
            date: phase_end,
            description: format!("All tasks in {} completed", phase.name),
        });
        current = phase_end;
    }
    Timeline {
        start_date,
        end_date: current,
        total_duration_weeks: phases.iter().map(|phase| phase.weeks).sum(),
        phases: planned,
        milestones,
    }
}

fn skills_for(role: &str) -> Vec<String> {
    let skills: &[&str] = match role {
        "project_manager" => &[
            "Project Management",
            "Agile",
            "Scrum",
            "Communication",
            "Risk Management",
        ],
        "tech_lead" => &[
            "Architecture Design",
            "Code Review",
            "Technical Leadership",
            "System Design",
        ],
        "frontend_developers" => &["React", "JavaScript", "TypeScript", "CSS", "UI/UX"],
        "backend_developers" => &[
            "Node.js",
            "Python",
            "Database Design",
            "API Development",
            "Microservices",
        ],
        "devops_engineer" => &["Docker", "Kubernetes", "AWS", "CI/CD", "Infrastructure"],
        "qa_engineer" => &["Testing", "Automation", "Quality Assurance", "Test Planning"],
        _ => &["General Development"],
    };
    skills.iter().map(|skill| skill.to_string()).collect()
}

fn title_case(role: &str) -> String {
    role.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn team_members(structure: &[TeamRole]) -> Vec<TeamMember> {
    structure
        .iter()
        .flat_map(|role| {
            let title = title_case(&role.role);
            (1..=role.count).map(move |idx| TeamMember {
                name: format!("{title} {idx}"),
                role: title.clone(),
                availability: 1.0,
                skills: skills_for(&role.role),
                total_hours: 0.0,
            })
        })
        .collect()
}

fn allocate(
    mut members: Vec<TeamMember>,
    phases: &[PhaseDraft],
    hours_per_week: f64,
) -> ResourceAllocation {
    let mut phase_allocations = Vec::with_capacity(phases.len());
    for phase in phases {
        let weeks = f64::from(phase.weeks);
        let allocated_members = members
            .iter_mut()
            .map(|member| {
                let hours = member.availability * hours_per_week * weeks;
                member.total_hours += hours;
                MemberAllocation {
                    name: member.name.clone(),
                    role: member.role.clone(),
                    hours_allocated: hours,
                    utilization: member.availability,
                }
            })
            .collect();
        phase_allocations.push(PhaseAllocation {
            phase_name: phase.name.clone(),
            duration_weeks: phase.weeks,
            allocated_members,
        });
    }
    let total_project_hours = phases
        .iter()
        .map(|phase| f64::from(phase.weeks) * hours_per_week)
        .sum::<f64>()
        * members.len() as f64;
    let total_allocated_hours: f64 = members.iter().map(|member| member.total_hours).sum();
    let utilization_rate = if total_project_hours > 0.0 {
        total_allocated_hours / total_project_hours * 100.0
    } else {
        0.0
    };
    ResourceAllocation {
        team_members: members,
        phase_allocations,
        utilization_summary: UtilizationSummary {
            total_project_hours,
            total_allocated_hours,
            utilization_rate,
        },
    }
}

fn estimate_costs(team_size: usize, weeks: u32, rates: &PlanningConfig) -> CostBreakdown {
    let months = f64::from(weeks) / 4.0;
    let labor = team_size as f64 * rates.hourly_rate * rates.hours_per_week * f64::from(weeks);
    let infrastructure = INFRASTRUCTURE_MONTHLY * months;
    let third_party = THIRD_PARTY_MONTHLY * months;
    let subtotal = labor + infrastructure + third_party;
    let contingency = subtotal * rates.contingency_rate;
    let total_cost = subtotal + contingency;
    let item = |amount: f64, description: String| CostItem {
        amount,
        percentage: if total_cost > 0.0 {
            amount / total_cost * 100.0
        } else {
            0.0
        },
        description,
    };
    CostBreakdown {
        labor_cost: item(labor, format!("Team of {team_size} for {weeks} weeks")),
        infrastructure_cost: item(
            infrastructure,
            "Cloud services, hardware, and licenses".to_string(),
        ),
        third_party_cost: item(third_party, "External APIs and services".to_string()),
        contingency: item(
            contingency,
            format!(
                "{:.0}% contingency buffer",
                rates.contingency_rate * 100.0
            ),
        ),
        total_cost,
        duration_weeks: weeks,
        team_size,
    }
}

fn assess_risks(scope: &str, weeks: u32, team_size: usize) -> RiskAssessment {
    let risk = |category: &str, risk: &str, impact, probability, mitigation: &str| Risk {
        category: Some(category.to_string()),
        risk: risk.to_string(),
        impact,
        probability,
        mitigation: mitigation.to_string(),
    };
    let mut risks = Vec::new();
    if weeks > 20 {
        risks.push(risk(
            "Timeline",
            "Long project duration",
            RiskLevel::High,
            RiskLevel::Medium,
            "Break into smaller phases with regular checkpoints",
        ));
    }
    if team_size < 3 {
        risks.push(risk(
            "Team",
            "Small team size",
            RiskLevel::Medium,
            RiskLevel::High,
            "Consider additional resources or extend timeline",
        ));
    }
    if scope.chars().count() > 500 {
        risks.push(risk(
            "Scope",
            "Complex project scope",
            RiskLevel::High,
            RiskLevel::Medium,
            "Implement agile methodology with regular scope reviews",
        ));
    }
    risks.push(risk(
        "Technology",
        "Integration complexity",
        RiskLevel::Medium,
        RiskLevel::Medium,
        "Early prototyping and proof of concept",
    ));

    let total: u32 = risks
        .iter()
        .map(|risk| risk.impact.weight() * risk.probability.weight())
        .sum();
    let overall_risk_score = f64::from(total) / (risks.len() as f64 * 9.0) * 100.0;
    let risk_level = if overall_risk_score > 70.0 {
        RiskLevel::High
    } else if overall_risk_score > 40.0 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };
    RiskAssessment {
        risks,
        overall_risk_score,
        risk_level,
        recommendations: vec![
            "Implement regular risk reviews".to_string(),
            "Establish clear communication channels".to_string(),
            "Create contingency plans for high-impact risks".to_string(),
        ],
    }
}

fn table(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

fn quality_plan(phases: &[PhaseDraft]) -> QualityPlan {
    QualityPlan {
        testing_strategy: table(&[
            ("unit_testing", "Automated unit tests for all components"),
            ("integration_testing", "API and component integration testing"),
            ("system_testing", "End-to-end system validation"),
            ("user_acceptance_testing", "Client validation of requirements"),
        ]),
        quality_gates: phases
            .iter()
            .map(|phase| QualityGate {
                phase: phase.name.clone(),
                criteria: vec![
                    "All requirements implemented".to_string(),
                    "Unit tests passing".to_string(),
                    "Code review completed".to_string(),
                    "Documentation updated".to_string(),
                ],
                approval_required: true,
            })
            .collect(),
        review_process: table(&[
            ("code_reviews", "Mandatory for all code changes"),
            ("design_reviews", "Before major architectural decisions"),
            ("security_reviews", "For all external integrations"),
            ("performance_reviews", "Before production deployment"),
        ]),
        metrics: table(&[
            ("code_coverage", "Target: 80% minimum"),
            ("defect_density", "Target: < 1 defect per 100 lines of code"),
            ("response_time", "Target: < 2 seconds for 95% of requests"),
            ("availability", "Target: 99.9% uptime"),
        ]),
    }
}

fn constraints(strategy: &SolutionStrategy) -> Vec<String> {
    let mut constraints = Vec::new();
    if !strategy.timeline_estimate.total_duration.is_empty() {
        constraints.push(format!(
            "Project must be completed within {}",
            strategy.timeline_estimate.total_duration
        ));
    }
    if strategy.cost_estimates.total > 0.0 {
        constraints.push(format!(
            "Project budget: {}",
            format_usd(strategy.cost_estimates.total)
        ));
    }
    let cloud = &strategy.technology_stack.infrastructure.cloud_provider;
    if !cloud.is_empty() {
        constraints.push(format!("Must use {cloud} cloud platform"));
    }
    constraints.extend([
        "Must meet security compliance requirements".to_string(),
        "Must achieve 99.9% uptime".to_string(),
        "Must support specified number of concurrent users".to_string(),
    ]);
    constraints
}

/// Build a plan from a strategy without touching memory.
pub(crate) fn plan_from_strategy(
    strategy: &SolutionStrategy,
    strategy_id: String,
    start_date: NaiveDate,
    rates: &PlanningConfig,
) -> ProjectPlan {
    let phases = drafts(strategy);
    let timeline = build_timeline(start_date, &phases);
    let members = team_members(&strategy.implementation_approach.team_structure);
    let team_size = members.len();
    let resource_allocation = allocate(members, &phases, rates.hours_per_week);
    let overview = &strategy.solution_overview;
    ProjectPlan {
        project_overview: ProjectOverview {
            name: PROJECT_NAME.to_string(),
            description: overview.summary.clone(),
            objectives: overview.key_features.clone(),
            success_criteria: strategy.success_metrics.clone(),
        },
        cost_estimates: estimate_costs(team_size, timeline.total_duration_weeks, rates),
        risk_assessment: assess_risks(&overview.summary, timeline.total_duration_weeks, team_size),
        quality_assurance: quality_plan(&phases),
        timeline,
        resource_allocation,
        assumptions: strategy.assumptions.clone(),
        constraints: constraints(strategy),
        planning_notes: String::new(),
        source_strategy_id: strategy_id,
    }
}

/// Apply phase updates to a plan, keeping its start date.
///
/// Timeline, allocation, cost, and risk are recomputed; unknown phase names
/// are logged and skipped.
pub fn replan_timeline(
    plan: &ProjectPlan,
    updates: &[PhaseUpdate],
    rates: &PlanningConfig,
) -> ProjectPlan {
    let mut phases: Vec<PhaseDraft> = plan
        .timeline
        .phases
        .iter()
        .map(|phase| PhaseDraft {
            name: phase.name.clone(),
            weeks: phase.duration_weeks,
            deliverables: phase
                .tasks
                .iter()
                .map(|task| task.description.clone())
                .collect(),
        })
        .collect();
    for update in updates {
        let Some(phase) = phases
            .iter_mut()
            .find(|phase| phase.name == update.phase_name)
        else {
            warn!(
                "ignoring update for unknown phase (phase={})",
                update.phase_name
            );
            continue;
        };
        if let Some(weeks) = update.new_duration.filter(|weeks| *weeks > 0) {
            phase.weeks = weeks;
        }
        if !update.new_tasks.is_empty() {
            phase.deliverables = update.new_tasks.clone();
        }
    }

    let timeline = build_timeline(plan.timeline.start_date, &phases);
    let members: Vec<TeamMember> = plan
        .resource_allocation
        .team_members
        .iter()
        .cloned()
        .map(|member| TeamMember {
            total_hours: 0.0,
            ..member
        })
        .collect();
    let team_size = members.len();
    let mut updated = plan.clone();
    updated.resource_allocation = allocate(members, &phases, rates.hours_per_week);
    updated.cost_estimates = estimate_costs(team_size, timeline.total_duration_weeks, rates);
    updated.risk_assessment = assess_risks(
        &plan.project_overview.description,
        timeline.total_duration_weeks,
        team_size,
    );
    updated.quality_assurance = quality_plan(&phases);
    updated.timeline = timeline;
    updated
}

#[async_trait]
impl Stage for ProjectPlannerStage {
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
        let start_date = params
            .start_date
            .or(ctx.config.planning.start_date)
            .unwrap_or_else(|| Utc::now().date_naive());

        let mut plan = plan_from_strategy(&strategy, strategy_id, start_date, &ctx.config.planning);
        plan.planning_notes = narrate(
            ctx,
            STAGE,
            "Comment on the feasibility of this delivery plan.",
            format!(
                "Duration: {} weeks\nTeam: {} members\nTotal cost: {}\nRisk level: {}",
                plan.timeline.total_duration_weeks,
                plan.resource_allocation.team_members.len(),
                format_usd(plan.cost_estimates.total_cost),
                plan.risk_assessment.risk_level
            ),
        )
        .await?;
        info!(
            "project planned (session_id={}, source={}, weeks={}, total_cost={:.0})",
            session_id,
            plan.source_strategy_id,
            plan.timeline.total_duration_weeks,
            plan.cost_estimates.total_cost
        );
        let record = commit(ctx, session_id, STAGE, StagePayload::ProjectPlan(plan)).await?;
        Ok(StageOutcome::record(STAGE, record))
    }
}
