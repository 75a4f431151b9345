mod cmd;
mod output;
mod root;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use cmd::{
    config::ConfigSubcommand, ledger::LedgerSubcommand, presence::PresenceSubcommand,
    schedule::ScheduleSubcommand, workflows::WorkflowsSubcommand,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "gameday",
    about = "Decide which collection workflows to run, audit every decision, and recover lost artifacts",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .gameday/)
    #[arg(long, global = true, env = "GAMEDAY_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize .gameday/ with a default config and example registry
    Init,

    /// Run one decision pass over every enabled workflow
    Evaluate {
        /// Evaluate as of this instant (RFC 3339, default: now)
        #[arg(long)]
        at: Option<DateTime<Utc>>,

        /// Bypass the schedule-freshness gate for this pass
        #[arg(long, env = "GAMEDAY_SCHEDULE_OVERRIDE")]
        override_freshness: bool,
    },

    /// Run one reconciliation between collection and storage
    Reconcile {
        /// Reconcile as of this instant (RFC 3339, default: now)
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },

    /// Append to and inspect the execution ledger
    Ledger {
        #[command(subcommand)]
        subcommand: LedgerSubcommand,
    },

    /// Record what has reached downstream storage
    Presence {
        #[command(subcommand)]
        subcommand: PresenceSubcommand,
    },

    /// Manage file-backed event schedules
    Schedule {
        #[command(subcommand)]
        subcommand: ScheduleSubcommand,
    },

    /// Inspect the workflow registry
    Workflows {
        #[command(subcommand)]
        subcommand: WorkflowsSubcommand,
    },

    /// Validate the project configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Evaluate { .. } | Commands::Reconcile { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::Evaluate {
            at,
            override_freshness,
        } => cmd::evaluate::run(&root, at, override_freshness, cli.json),
        Commands::Reconcile { at } => cmd::reconcile::run(&root, at, cli.json),
        Commands::Ledger { subcommand } => cmd::ledger::run(&root, subcommand, cli.json),
        Commands::Presence { subcommand } => cmd::presence::run(&root, subcommand, cli.json),
        Commands::Schedule { subcommand } => cmd::schedule::run(&root, subcommand, cli.json),
        Commands::Workflows { subcommand } => cmd::workflows::run(&root, subcommand, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
