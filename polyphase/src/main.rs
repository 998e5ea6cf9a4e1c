//! polyphase - autonomous multi-phase software development orchestrator.
//!
//! CLI entry point; the orchestration engine itself lives in `lib.rs` so
//! `tests/integration_test.rs` can drive it without a subprocess.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;
use eyre::{Context, Result};
use tracing::info;

use polyphase::config::{PolyphaseConfig, ProjectPaths};
use polyphase::coordinator::{CoordinatorOutcome, PhaseCoordinator};
use polyphase::domain::PipelineState;
use polyphase::llm;
use polyphase::mailbox::Mailbox;
use polyphase::phases::PhaseRegistry;

#[derive(Parser)]
#[command(name = "polyphase", about = "Autonomous multi-phase software development orchestrator", version = env!("GIT_DESCRIBE"))]
struct Cli {
    /// Path to config file (defaults to ./polyphase.yml or the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the orchestrator against a project until terminated or budget-exhausted.
    Run {
        /// Project directory to operate on (defaults to the current directory).
        #[arg(default_value = ".")]
        project_dir: PathBuf,
    },
    /// List the registered phases and their polytope vertices.
    Phases,
    /// Print the persisted state's task/issue/phase counters.
    State {
        #[arg(default_value = ".")]
        project_dir: PathBuf,
    },
    /// Print a phase's recorded run history and learned awareness level.
    Metrics {
        #[arg(default_value = ".")]
        project_dir: PathBuf,
        /// Restrict to a single phase's history.
        phase: Option<String>,
    },
    /// Inspect a phase's mailbox (the advisory IPC hint it last received).
    Mailbox {
        #[arg(default_value = ".")]
        project_dir: PathBuf,
        phase: String,
    },
}

fn setup_logging() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging().context("failed to set up logging")?;
    let cli = Cli::parse();
    let config = PolyphaseConfig::load(cli.config.as_ref()).context("failed to load configuration")?;

    match cli.command {
        Command::Run { project_dir } => run(project_dir, config).await?,
        Command::Phases => list_phases(),
        Command::State { project_dir } => print_state(project_dir)?,
        Command::Metrics { project_dir, phase } => print_metrics(project_dir, phase)?,
        Command::Mailbox { project_dir, phase } => print_mailbox(project_dir, phase)?,
    }

    Ok(())
}

async fn run(project_dir: PathBuf, config: PolyphaseConfig) -> Result<()> {
    let paths = ProjectPaths::new(project_dir.canonicalize().unwrap_or(project_dir.clone()));
    paths.ensure_layout().context("failed to create .pipeline layout")?;

    info!(provider = %config.llm.provider, model = %config.llm.model, "starting polyphase run");
    let llm = llm::create_client(&config.llm).context("failed to construct LLM client")?;

    let mut state = PipelineState::load(paths.pipeline_dir_for_store())?;
    let (registry, polytope) = PhaseRegistry::standard();
    if state.polytope().vertices.is_empty() {
        state.set_polytope(polytope);
    }

    let mut coordinator = PhaseCoordinator::new(state, registry, config, paths.root.clone()).await;
    let outcome = coordinator.run(llm).await?;

    let code: polyphase::ExitCode = outcome.into();
    match outcome {
        CoordinatorOutcome::AllCompleted => println!("{} all tasks completed", "✓".green()),
        CoordinatorOutcome::SomeFailed => println!("{} one or more tasks failed", "✗".red()),
        CoordinatorOutcome::BudgetExhausted => println!("{} pipeline iteration budget exhausted with work remaining", "!".yellow()),
    }
    std::process::exit(code.into());
}

fn list_phases() {
    let (registry, polytope) = PhaseRegistry::standard();
    for name in registry.names() {
        let successors = polytope.successors(&name);
        println!("{:<18} -> {}", name.cyan(), successors.iter().cloned().collect::<Vec<_>>().join(", "));
    }
}

fn print_state(project_dir: PathBuf) -> Result<()> {
    let paths = ProjectPaths::new(project_dir);
    let state = PipelineState::load(paths.pipeline_dir_for_store())?;

    let tasks: Vec<_> = state.list_all_tasks().collect();
    let refactoring: Vec<_> = state.list_refactoring_tasks().collect();
    let issues = state.list_unresolved_issues()?;

    println!("run id: {}", state.run_id());
    println!("version: {}", state.version());
    println!("last phase: {}", state.last_phase().as_deref().unwrap_or("(none yet)"));
    println!("tasks: {} ({} pending, {} refactoring)", tasks.len(), state.list_pending_tasks()?.len(), refactoring.len());
    println!("unresolved issues: {}", issues.len());
    for issue in issues {
        println!("  [{:?}] {}", issue.severity, issue.title);
    }
    Ok(())
}

fn print_metrics(project_dir: PathBuf, phase: Option<String>) -> Result<()> {
    let paths = ProjectPaths::new(project_dir);
    let state = PipelineState::load(paths.pipeline_dir_for_store())?;

    let records: Vec<_> = match &phase {
        Some(name) => state.phase_record(name).into_iter().collect(),
        None => state.list_phase_records().collect(),
    };

    if records.is_empty() {
        println!("no recorded runs yet");
        return Ok(());
    }

    for record in records {
        let failures = record.runs.iter().filter(|r| !r.success).count();
        println!(
            "{:<18} runs={:<4} failures={:<4} awareness={:.2}",
            record.name.cyan(),
            record.runs.len(),
            failures,
            record.awareness_level
        );
    }
    Ok(())
}

fn print_mailbox(project_dir: PathBuf, phase: String) -> Result<()> {
    let paths = ProjectPaths::new(project_dir);
    let mailbox = Mailbox::new(paths.mailboxes_dir(), &phase);
    match mailbox.read_hint()? {
        Some(hint) => {
            println!("from: {}", hint.from_phase);
            if let Some(next) = &hint.next_phase {
                println!("suggested next phase: {next}");
            }
            if !hint.files.is_empty() {
                println!("files: {}", hint.files.join(", "));
            }
            if let Some(reason) = &hint.reason {
                println!("reason: {reason}");
            }
        }
        None => println!("no mailbox hint for {phase}"),
    }
    Ok(())
}
