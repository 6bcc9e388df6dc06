//! Command-line interface.
//!
//! Every command prints a human rendering by default and a JSON document
//! with `--json`.

pub mod commands;
pub mod output;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::Path;

use crate::adapters::sqlite::{initialize_database, sqlite_repositories};
use crate::domain::models::Config;
use crate::domain::ports::Repositories;
use crate::infrastructure::config::ConfigLoader;

use commands::{
    cycle::CycleArgs, decision::DecisionArgs, finding::FindingArgs, init::InitArgs, message::MessageArgs,
    queue::QueueArgs, req::ReqArgs, signal::SignalArgs, status::StatusArgs, trace::TraceArgs, work::WorkArgs,
};

#[derive(Parser, Debug)]
#[command(name = "triad")]
#[command(about = "Triad - requirements traceability between an owner, a designer and a verifier", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize configuration, database and work queues
    Init(InitArgs),
    /// Requirement store commands (owner)
    Req(ReqArgs),
    /// Work queue commands
    Queue(QueueArgs),
    /// Producer commands on a single work item
    Work(WorkArgs),
    /// Traceability matrix commands
    Trace(TraceArgs),
    /// Finding log commands
    Finding(FindingArgs),
    /// Decision log commands
    Decision(DecisionArgs),
    /// Owner/producer messages
    Message(MessageArgs),
    /// Assert the calling actor's completion marker
    Signal(SignalArgs),
    /// Run one owner cycle
    Cycle(CycleArgs),
    /// Phase and convergence blockers
    Status(StatusArgs),
}

impl Commands {
    pub async fn execute(self, json: bool) -> Result<()> {
        match self {
            Self::Init(args) => commands::init::execute(args, json).await,
            Self::Req(args) => commands::req::execute(args, json).await,
            Self::Queue(args) => commands::queue::execute(args, json).await,
            Self::Work(args) => commands::work::execute(args, json).await,
            Self::Trace(args) => commands::trace::execute(args, json).await,
            Self::Finding(args) => commands::finding::execute(args, json).await,
            Self::Decision(args) => commands::decision::execute(args, json).await,
            Self::Message(args) => commands::message::execute(args, json).await,
            Self::Signal(args) => commands::signal::execute(args, json).await,
            Self::Cycle(args) => commands::cycle::execute(args, json).await,
            Self::Status(args) => commands::status::execute(args, json).await,
        }
    }
}

/// Loaded configuration plus repositories over the project database.
pub struct Workspace {
    pub config: Config,
    pub repos: Repositories,
}

impl Workspace {
    /// Open an initialized project in the current directory.
    pub async fn open() -> Result<Self> {
        let config = ConfigLoader::load()?;
        let path = &config.database.path;
        if !path.starts_with("sqlite:") && !Path::new(path).exists() {
            bail!("No database at {path}. Run 'triad init' first.");
        }
        let pool = initialize_database(&config.database)
            .await
            .context("Failed to open database")?;
        Ok(Self {
            repos: sqlite_repositories(&pool),
            config,
        })
    }
}

/// Print an error and exit non-zero.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let chain: Vec<String> = err.chain().skip(1).map(ToString::to_string).collect();
        let body = serde_json::json!({ "error": err.to_string(), "causes": chain });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("{} {err:#}", console::style("error:").red().bold());
    }
    std::process::exit(1)
}
