use super::{Stage, StageContext, StageOutcome, StageParams, commit, narrate, require, week_range};
use crate::error::StageError;
use async_trait::async_trait;
use log::info;
use tenderflow_protocol::{
    ArchitectureLayer, BackendStack, ClientConstraints, CostLine, DatabaseStack, FrontendStack,
    ImplementationApproach, InfrastructureStack, MonitoringStack, PhaseOutline, RecordKind,
    Requirements, Risk, RiskLevel, SessionId, SolutionOverview, SolutionStrategy, StagePayload,
    StrategyCosts, SuccessMetrics, TeamRole, TechnicalArchitecture, TechnologyStack,
    TimelineEstimate, WeekMilestone,
};

const STAGE: RecordKind = RecordKind::SolutionStrategy;

/// Designs the solution from the latest tender analysis.
#[derive(Debug, Default, Clone, Copy)]
pub struct SolutionStrategyStage;

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn overview(requirements: &Requirements) -> SolutionOverview {
    let functional = &requirements.functional_requirements;
    SolutionOverview {
        summary: format!(
            "Comprehensive solution addressing {} functional requirements",
            functional.len()
        ),
        key_features: functional.iter().take(5).cloned().collect(),
        business_value: "Improved efficiency, cost reduction, and enhanced user experience"
            .to_string(),
        differentiators: strings(&[
            "Modern, scalable architecture",
            "Integration with existing systems",
            "Comprehensive security measures",
            "User-friendly interface design",
        ]),
    }
}

fn architecture() -> TechnicalArchitecture {
    let layer = |name: &str, components: &[&str], technologies: &[&str]| ArchitectureLayer {
        name: name.to_string(),
        components: strings(components),
        technologies: strings(technologies),
    };
    TechnicalArchitecture {
        layers: vec![
            layer(
                "presentation_layer",
                &["Web Interface", "Mobile App", "Admin Dashboard"],
                &["React", "React Native", "Material-UI"],
            ),
            layer(
                "business_logic_layer",
                &["API Gateway", "Microservices", "Authentication Service"],
                &["Node.js", "Python", "JWT"],
            ),
            layer(
                "data_layer",
                &["Primary Database", "Cache", "File Storage"],
                &["PostgreSQL", "Redis", "AWS S3"],
            ),
        ],
        integration_points: strings(&[
            "REST APIs for external integrations",
            "Webhook support for real-time updates",
            "Database connectors for legacy systems",
        ]),
        security_measures: strings(&[
            "OAuth 2.0 authentication",
            "Data encryption at rest and in transit",
            "Regular security audits",
            "Compliance with industry standards",
        ]),
    }
}

/// Default stack, adjusted for language and cloud constraints named in the tender.
pub(crate) fn technology_stack<'a>(constraints: impl IntoIterator<Item = &'a String>) -> TechnologyStack {
    let mut stack = TechnologyStack {
        frontend: FrontendStack {
            framework: "React.js".to_string(),
            ui_library: "Material-UI".to_string(),
            state_management: "Redux Toolkit".to_string(),
            build_tool: "Vite".to_string(),
        },
        backend: BackendStack {
            runtime: "Node.js".to_string(),
            framework: "Express.js".to_string(),
            language: "TypeScript".to_string(),
            api_design: "REST + GraphQL".to_string(),
        },
        database: DatabaseStack {
            primary: "PostgreSQL".to_string(),
            cache: "Redis".to_string(),
            orm: "Prisma".to_string(),
        },
        infrastructure: InfrastructureStack {
            cloud_provider: "AWS".to_string(),
            containerization: "Docker".to_string(),
            orchestration: "Kubernetes".to_string(),
            ci_cd: "GitHub Actions".to_string(),
        },
        monitoring: MonitoringStack {
            logging: "ELK Stack".to_string(),
            metrics: "Prometheus + Grafana".to_string(),
            tracing: "Jaeger".to_string(),
        },
    };
    for constraint in constraints {
        let lower = constraint.to_lowercase();
        if lower.contains("python") {
            stack.backend.runtime = "Python".to_string();
            stack.backend.framework = "FastAPI".to_string();
            stack.backend.language = "Python".to_string();
        } else if lower.contains("java") && !lower.contains("javascript") {
            stack.backend.runtime = "Java".to_string();
            stack.backend.framework = "Spring Boot".to_string();
            stack.backend.language = "Java".to_string();
        }
        if lower.contains("azure") {
            stack.infrastructure.cloud_provider = "Azure".to_string();
        } else if lower.contains("gcp") || lower.contains("google cloud") {
            stack.infrastructure.cloud_provider = "Google Cloud Platform".to_string();
        }
    }
    stack
}

fn implementation_approach() -> ImplementationApproach {
    let phase = |name: &str, duration: &str, deliverables: &[&str]| PhaseOutline {
        name: name.to_string(),
        duration: duration.to_string(),
        deliverables: strings(deliverables),
    };
    let role = |role: &str, count: u32| TeamRole {
        role: role.to_string(),
        count,
    };
    ImplementationApproach {
        methodology: "Agile with Scrum".to_string(),
        phases: vec![
            phase(
                "Discovery & Planning",
                "2-3 weeks",
                &["Detailed requirements", "Technical design", "Project plan"],
            ),
            phase(
                "Development Phase 1",
                "4-6 weeks",
                &["Core functionality", "Basic UI", "API endpoints"],
            ),
            phase(
                "Development Phase 2",
                "4-6 weeks",
                &["Advanced features", "Integration", "Testing"],
            ),
            phase(
                "Testing & Deployment",
                "2-3 weeks",
                &["QA testing", "Production deployment", "Documentation"],
            ),
        ],
        team_structure: vec![
            role("project_manager", 1),
            role("tech_lead", 1),
            role("frontend_developers", 2),
            role("backend_developers", 2),
            role("devops_engineer", 1),
            role("qa_engineer", 1),
        ],
    }
}

fn risks() -> Vec<Risk> {
    let risk = |risk: &str, impact, probability, mitigation: &str| Risk {
        category: None,
        risk: risk.to_string(),
        impact,
        probability,
        mitigation: mitigation.to_string(),
    };
    vec![
        risk(
            "Scope creep during development",
            RiskLevel::Medium,
            RiskLevel::Medium,
            "Regular scope reviews, change control process",
        ),
        risk(
            "Integration challenges with existing systems",
            RiskLevel::High,
            RiskLevel::Medium,
            "Early integration testing, proof of concept",
        ),
        risk(
            "Performance issues under load",
            RiskLevel::High,
            RiskLevel::Low,
            "Load testing, performance monitoring, scaling strategy",
        ),
        risk(
            "Security vulnerabilities",
            RiskLevel::High,
            RiskLevel::Low,
            "Security reviews, penetration testing, secure coding practices",
        ),
    ]
}

fn cost_estimates(contingency_rate: f64) -> StrategyCosts {
    let line = |amount: f64, description: &str| CostLine {
        amount,
        description: description.to_string(),
    };
    let development = line(120_000.0, "Development team costs");
    let infrastructure = line(5_000.0, "Cloud infrastructure and services");
    let third_party = line(3_000.0, "Third-party software and services");
    let subtotal = development.amount + infrastructure.amount + third_party.amount;
    let contingency = line(subtotal * contingency_rate, "Contingency buffer");
    let total = subtotal + contingency.amount;
    StrategyCosts {
        development,
        infrastructure,
        third_party,
        contingency,
        total,
    }
}

fn timeline_estimate(phases: &[PhaseOutline]) -> TimelineEstimate {
    let (low, high) = phases
        .iter()
        .filter_map(|phase| week_range(&phase.duration))
        .fold((0, 0), |(low, high), (a, b)| (low + a, high + b));
    let milestone = |week: u32, milestone: &str| WeekMilestone {
        week,
        milestone: milestone.to_string(),
    };
    TimelineEstimate {
        total_duration: format!("{low}-{high} weeks"),
        milestones: vec![
            milestone(3, "Requirements finalized and approved"),
            milestone(9, "Core functionality completed"),
            milestone(15, "All features completed and tested"),
            milestone(18, "Production deployment"),
        ],
    }
}

fn success_metrics() -> SuccessMetrics {
    SuccessMetrics {
        technical_metrics: strings(&[
            "System uptime: 99.9%",
            "Response time: < 2 seconds",
            "Page load time: < 3 seconds",
            "API response time: < 500ms",
        ]),
        business_metrics: strings(&[
            "User adoption rate: > 80%",
            "Task completion rate: > 90%",
            "User satisfaction score: > 4.5/5",
            "Reduction in manual processes: > 50%",
        ]),
        project_metrics: strings(&[
            "On-time delivery",
            "Within budget",
            "All requirements met",
            "Zero critical bugs in production",
        ]),
    }
}

fn assumptions() -> Vec<String> {
    strings(&[
        "Client has existing IT infrastructure and team",
        "Client will provide necessary access to existing systems",
        "Client will participate in regular review meetings",
        "Client will provide timely feedback and approvals",
        "No major regulatory changes during implementation",
        "Team availability and skills as specified",
        "Third-party services and APIs remain available",
    ])
}

#[async_trait]
impl Stage for SolutionStrategyStage {
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
        let requirements = &analysis.requirements;

        let implementation_approach = implementation_approach();
        let technology_stack = technology_stack(&requirements.technical_constraints);
        let rationale = narrate(
            ctx,
            STAGE,
            "Explain why this architecture and stack fit the tender.",
            format!(
                "Backend: {} with {}\nCloud: {}\nFunctional requirements: {}",
                technology_stack.backend.runtime,
                technology_stack.backend.framework,
                technology_stack.infrastructure.cloud_provider,
                requirements.functional_requirements.len()
            ),
        )
        .await?;

        let strategy = SolutionStrategy {
            solution_overview: overview(requirements),
            technical_architecture: architecture(),
            technology_stack,
            timeline_estimate: timeline_estimate(&implementation_approach.phases),
            implementation_approach,
            risk_mitigation: risks(),
            cost_estimates: cost_estimates(ctx.config.planning.contingency_rate),
            success_metrics: success_metrics(),
            assumptions: assumptions(),
            client_constraints: ClientConstraints {
                budget: requirements.budget_constraints.iter().cloned().collect(),
                timeline: requirements.timeline_constraints.iter().cloned().collect(),
                technical: requirements.technical_constraints.iter().cloned().collect(),
            },
            rationale,
            source_analysis_id: analysis_id,
        };
        info!(
            "solution designed (session_id={}, source={}, total={})",
            session_id, strategy.source_analysis_id, strategy.cost_estimates.total
        );
        let record = commit(ctx, session_id, STAGE, StagePayload::SolutionStrategy(strategy)).await?;
        Ok(StageOutcome::record(STAGE, record))
    }
}
