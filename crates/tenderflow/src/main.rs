//! Command-line front end for the tender-to-proposal workflow.

use anyhow::{Context, bail};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use log::{debug, info, warn};
use serde::Serialize;
use std::path::PathBuf;
use tenderflow::config::{LayeredConfigOptions, TenderflowConfig};
use tenderflow::core::{Orchestrator, PhaseUpdate, StageParams};
use tenderflow::protocol::{DiagramKind, RecordKind, SessionId};
use uuid::Uuid;

/// Command-line options for the workflow CLI.
#[derive(Parser)]
#[command(name = "tenderflow", version)]
struct Cli {
    /// Optional tenderflow.json5 applied over the layered config
    #[arg(long)]
    config: Option<PathBuf>,
    /// Session to operate on; a new one is created when omitted
    #[arg(long)]
    session: Option<Uuid>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze a tender document
    Analyze(InputArgs),
    /// Run a single stage by name
    Stage {
        name: RecordKind,
        #[command(flatten)]
        input: InputArgs,
    },
    /// Run all five stages in order
    Run(InputArgs),
    /// Show workflow progress
    Status,
    /// Triage missing tender information
    MissingInfo,
    /// Summarize the latest proposal
    Summary,
    /// Print the latest proposal as markdown
    Export,
    /// Route a free-text request
    Ask {
        message: String,
        #[command(flatten)]
        input: InputArgs,
    },
    /// Change a phase duration and re-plan
    Replan {
        #[arg(long)]
        phase: String,
        #[arg(long)]
        weeks: Option<u32>,
        /// Replacement deliverables for the phase
        #[arg(long = "task")]
        tasks: Vec<String>,
    },
    /// Headline numbers of the latest project plan
    PlanSummary,
    /// Delete stored records
    Clear {
        #[arg(long)]
        kind: Option<RecordKind>,
    },
    /// List sessions in the memory store
    Sessions,
}

#[derive(Args, Default)]
struct InputArgs {
    /// Tender document (.txt or .md); repeatable
    #[arg(long = "file")]
    files: Vec<PathBuf>,
    /// Inline tender text
    #[arg(long)]
    text: Option<String>,
    /// Diagram kinds to produce; repeatable
    #[arg(long = "diagram")]
    diagrams: Vec<DiagramKind>,
    /// Project start date (YYYY-MM-DD)
    #[arg(long)]
    start_date: Option<NaiveDate>,
}

impl InputArgs {
    fn into_params(self) -> StageParams {
        let mut params = StageParams::new();
        params.document_text = self.text;
        params.document_paths = self.files;
        if !self.diagrams.is_empty() {
            params.diagram_types = Some(self.diagrams);
        }
        params.start_date = self.start_date;
        params
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<TenderflowConfig> {
    let cwd = std::env::current_dir().context("failed to resolve cwd")?;
    let mut options = LayeredConfigOptions::new(&cwd);
    if let Some(path) = path {
        info!("applying config override (path={})", path.display());
        options = options.with_runtime_path(path);
    }
    let layered = TenderflowConfig::load_layered_with_options(options)
        .context("failed to load layered config")?;
    debug!("layered config loaded (layers={})", layered.layers.len());
    Ok(layered.config)
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render output")?;
    println!("{rendered}");
    Ok(())
}

/// Entry point for the Tenderflow CLI.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tenderflow::init_logging();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;
    let orchestrator = Orchestrator::from_config(config).context("failed to build orchestrator")?;
    let session_id: SessionId = match cli.session {
        Some(session_id) => session_id,
        None => {
            let session_id = Uuid::new_v4();
            eprintln!("session: {session_id}");
            session_id
        }
    };
    info!("starting command (session_id={})", session_id);

    match cli.command {
        Command::Analyze(input) => {
            let outcome = orchestrator
                .run_stage(RecordKind::TenderAnalysis, session_id, &input.into_params())
                .await?;
            print_json(&outcome)?;
        }
        Command::Stage { name, input } => {
            let outcome = orchestrator
                .spawn_stage(name, session_id, input.into_params())
                .finish()
                .await?;
            print_json(&outcome)?;
        }
        Command::Run(input) => {
            match orchestrator
                .run_complete_workflow(session_id, &input.into_params())
                .await
            {
                Ok(report) => print_json(&report)?,
                Err(aborted) => {
                    warn!(
                        "workflow aborted (session_id={}, stage={})",
                        session_id, aborted.stage
                    );
                    print_json(&aborted.workflow_results)?;
                    bail!(*aborted);
                }
            }
        }
        Command::Status => print_json(&orchestrator.status(session_id).await)?,
        Command::MissingInfo => print_json(&orchestrator.missing_info(session_id).await?)?,
        Command::Summary => print_json(&orchestrator.summary(session_id).await?)?,
        Command::Export => {
            let markdown = orchestrator.export_markdown(session_id).await?;
            print!("{markdown}");
        }
        Command::Ask { message, input } => {
            let reply = orchestrator
                .handle_request(session_id, &message, &input.into_params())
                .await?;
            print_json(&reply)?;
        }
        Command::Replan {
            phase,
            weeks,
            tasks,
        } => {
            let update = PhaseUpdate {
                phase_name: phase,
                new_duration: weeks,
                new_tasks: tasks,
            };
            let outcome = orchestrator.update_timeline(session_id, &[update]).await?;
            print_json(&outcome)?;
        }
        Command::PlanSummary => print_json(&orchestrator.plan_summary(session_id).await?)?,
        Command::Clear { kind } => {
            let removed = orchestrator.clear(session_id, kind).await?;
            print_json(&serde_json::json!({ "removed": removed }))?;
        }
        Command::Sessions => print_json(&orchestrator.list_sessions().await?)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_stage_command() {
        let cli = Cli::try_parse_from([
            "tenderflow",
            "stage",
            "plan",
            "--start-date",
            "2025-01-06",
        ])
        .expect("parse");
        let Command::Stage { name, input } = cli.command else {
            panic!("expected stage command");
        };
        assert_eq!(name, RecordKind::ProjectPlan);
        assert_eq!(
            input.into_params().start_date,
            NaiveDate::from_ymd_opt(2025, 1, 6)
        );
    }

    #[test]
    fn input_args_build_params() {
        let cli = Cli::try_parse_from([
            "tenderflow",
            "run",
            "--file",
            "tender.md",
            "--diagram",
            "sequence",
            "--text",
            "Budget: $10,000",
        ])
        .expect("parse");
        let Command::Run(input) = cli.command else {
            panic!("expected run command");
        };
        let params = input.into_params();
        assert_eq!(params.document_paths, vec![PathBuf::from("tender.md")]);
        assert_eq!(params.diagram_types, Some(vec![DiagramKind::Sequence]));
        assert_eq!(params.document_text.as_deref(), Some("Budget: $10,000"));
    }

    #[test]
    fn no_diagrams_keeps_config_default() {
        assert_eq!(InputArgs::default().into_params(), StageParams::new());
    }
}
