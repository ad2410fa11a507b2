use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use req_forge::config::CliConfig;
use req_forge::handoff::{ConsoleChannel, Handoff, HandoffRequest, ScriptedChannel};
use req_forge::orchestrator::{AbortReason, DEFAULT_PROJECT_NAME, RunOutcome};
use req_forge::specialists::{CommandSpecialist, CriteriaValidator, HeuristicEvaluator};
use req_forge::{
    ConfidenceEvaluator, FileDocumentSink, LocalKnowledgeBase, ResponseValidator, SectionCatalog,
    WorkflowOrchestrator,
};

const DEMO_PROJECT_NAME: &str = "Task Management App Demo";

/// Scripted answers for `--demo`, one per handoff in order.
/// The short user-stories answer triggers a follow-up; the empty reply
/// skips the closing section; "done" approves the document.
const DEMO_RESPONSES: &[&str] = &[
    "The main goal of this project is a lightweight task management application for small \
     teams of five to twenty people. Our primary objective is to replace scattered spreadsheets \
     and chat threads with one shared board. Each user can create tasks, assign owners, set due \
     dates and track progress. Managers need a quick overview of workload, while individual \
     contributors want a focused personal list without noise from other projects.",
    "Users manage tasks.",
    "As a team member, I want to see only the tasks assigned to me so that I can plan my day \
     quickly. As a project manager, I need to reassign work when someone is overloaded or on \
     vacation. As an administrator, I want to invite new people by email and remove accounts \
     when contractors leave. As a viewer from another department, I need read-only access to \
     progress dashboards without editing rights.",
    "The application must run in current desktop browsers and on iOS and Android phones through \
     a responsive web platform, without native installs. Hard requirements include single \
     sign-on through the existing Google Workspace tenant, encrypted storage, and daily backups \
     kept for thirty days. The backend must respond within two hundred milliseconds for typical \
     board views and support at least five hundred concurrent users during peak planning \
     sessions on Monday mornings.",
    "We will measure success after the first quarter using a few concrete metrics. At least 80% \
     of active team members should log in weekly, and average task completion time should drop \
     by 15% compared with the spreadsheet baseline. Support tickets about lost or duplicated \
     work must fall below five per month. We also plan a short satisfaction survey where the \
     target score is four out of five or higher.",
    "Users need to import existing task lists from CSV files exported by the old spreadsheets, \
     keeping titles, owners, due dates and status columns. Boards should export to CSV and JSON \
     so other teams can build reports, and a printable PDF format summary is useful for weekly \
     status meetings. Attachments on tasks may be any common office format, limited to \
     twenty-five megabytes per file and scanned for malware before storage.",
    "",
    "done",
];

/// Req-Forge CLI: human-in-the-loop requirements interviews
#[derive(Parser, Debug)]
#[command(name = "req-forge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a requirements interview
    #[command(name = "run")]
    Run {
        #[command(flatten)]
        args: RunArgs,
    },

    /// Print the section catalog as YAML
    #[command(name = "catalog")]
    Catalog {
        /// Catalog file to validate and print (defaults to the built-in catalog)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Project name (asked interactively when omitted)
    #[arg(short, long)]
    project: Option<String>,

    /// Replay a scripted sample interview
    #[arg(long)]
    demo: bool,

    /// Knowledge base directory; enables prompt enrichment
    #[arg(long)]
    kb: Option<PathBuf>,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to a section catalog YAML file
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Follow-up attempts per section before force-accepting
    #[arg(long)]
    max_retries: Option<u32>,

    /// Confidence acceptance threshold (0.0-1.0)
    #[arg(long)]
    threshold: Option<f32>,

    /// Output directory for requirements documents
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Run { args }) => handle_run_command(args).await,
        Some(Command::Catalog { file }) => handle_catalog_command(file),
        None => {
            eprintln!("No command specified. Use --help for usage information.");
            eprintln!("Example: req-forge run --project \"Task Tracker\"");
            std::process::exit(1);
        }
    }
}

fn handle_catalog_command(file: Option<PathBuf>) -> Result<()> {
    let catalog = SectionCatalog::load_or_default(file.as_deref())?;
    catalog
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid catalog: {}", e))?;
    print!("{}", catalog.to_yaml()?);
    Ok(())
}

async fn handle_run_command(args: RunArgs) -> Result<()> {
    // Logs go to stderr so the interview on stdout stays readable
    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    info!("Req-Forge starting");

    // Load configuration
    let mut config = CliConfig::load_or_default(args.config.as_ref())?;

    // Apply CLI overrides
    if let Some(max_retries) = args.max_retries {
        config.workflow.max_retries = max_retries;
    }
    if let Some(threshold) = args.threshold {
        config.workflow.confidence_threshold = threshold;
    }
    if let Some(dir) = args.kb {
        config.knowledge.dir = Some(dir);
        config.workflow.knowledge_enabled = true;
    }
    if let Some(output) = args.output {
        config.output.documents_dir = output;
    }
    config
        .workflow
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    let catalog = SectionCatalog::load_or_default(args.catalog.as_deref())?;

    // Human channel: scripted replay for the demo, the terminal otherwise
    let mut handoff = if args.demo {
        println!("Running demo interview: {}", DEMO_PROJECT_NAME);
        Handoff::new(Box::new(
            ScriptedChannel::new(DEMO_RESPONSES.iter().copied()).with_echo(),
        ))
    } else {
        Handoff::new(Box::new(ConsoleChannel::new()))
    };

    let project_name = match (args.project, args.demo) {
        (Some(name), _) => name,
        (None, true) => DEMO_PROJECT_NAME.to_string(),
        (None, false) => {
            let response = handoff
                .request_input(HandoffRequest::continue_with(format!(
                    "Project name (default: {})",
                    DEFAULT_PROJECT_NAME
                )))
                .await
                .context("Failed to read project name")?;
            response.text().unwrap_or_default().trim().to_string()
        }
    };

    // Specialists: external commands when configured, built-in heuristics otherwise
    let evaluator: Box<dyn ConfidenceEvaluator> = match config.specialists.evaluator.clone() {
        Some(command) => Box::new(CommandSpecialist::new(command)),
        None => Box::new(HeuristicEvaluator),
    };
    let validator: Box<dyn ResponseValidator> = match config.specialists.validator.clone() {
        Some(command) => Box::new(CommandSpecialist::new(command)),
        None => Box::new(CriteriaValidator::default()),
    };

    // Ctrl-C cancels the run, including a pending handoff
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    let sink = FileDocumentSink::new(config.output.documents_dir.clone());
    let documents_dir = sink.dir().to_path_buf();

    let mut orchestrator = WorkflowOrchestrator::new(handoff, evaluator, validator)
        .with_project_name(project_name)
        .with_sink(Box::new(sink))
        .with_cancellation(cancel);

    if config.workflow.knowledge_enabled {
        match LocalKnowledgeBase::from_config(&config.knowledge) {
            Some(kb) => {
                info!("Knowledge base: {:?}", kb.dir());
                orchestrator = orchestrator.with_retriever(Box::new(kb));
            }
            None => warn!("Knowledge enabled but no knowledge directory configured"),
        }
    }

    let outcome = orchestrator.start_run(&catalog, &config.workflow).await?;

    match outcome.run().save_snapshot(&config.output.runs_dir) {
        Ok(path) => info!("Run snapshot written to {:?}", path),
        Err(e) => warn!("Failed to write run snapshot: {:#}", e),
    }

    print_result(outcome, &documents_dir)
}

fn print_result(outcome: RunOutcome, documents_dir: &std::path::Path) -> Result<()> {
    match outcome {
        RunOutcome::Finalized(report) => {
            println!("\n========================================");
            println!("Requirements Interview Complete!");
            println!("========================================");
            println!("Project: {}", report.document.project_name);
            println!(
                "Sections completed: {}/{}",
                report.document.completed_sections(),
                report.document.entries.len()
            );
            println!("Human exchanges: {}", report.run.exchanges);
            println!(
                "Knowledge enhanced: {}",
                if report.document.knowledge_enhanced {
                    "yes"
                } else {
                    "no"
                }
            );
            match &report.document_id {
                Some(id) => println!(
                    "Document: {}",
                    documents_dir.join(format!("{}.md", id)).display()
                ),
                None => println!("Document: not saved"),
            }

            if !report.warnings.is_empty() {
                println!("\nWarnings:");
                for warning in &report.warnings {
                    println!("  - {}", warning);
                }
            }
            Ok(())
        }
        RunOutcome::Aborted(aborted) => {
            let reason = match &aborted.reason {
                AbortReason::Cancelled => "cancelled".to_string(),
                AbortReason::ChannelFailure(e) => e.to_string(),
            };
            println!("\n⚠️  Interview aborted: {}", reason);
            println!(
                "Partial progress: {} of {} sections answered",
                aborted
                    .run
                    .sections()
                    .iter()
                    .filter(|s| s.status.is_done())
                    .count(),
                aborted.run.sections().len()
            );
            std::process::exit(1);
        }
    }
}
