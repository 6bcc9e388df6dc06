//! Producer CLI commands on a single work item.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::output::{action_notice, action_success, output, CommandOutput};
use crate::cli::Workspace;
use crate::domain::models::{Actor, Claim, WorkItem, WorkItemId};
use crate::services::{ClaimsFile, Completion, ProducerDesk};

#[derive(Args, Debug)]
pub struct WorkArgs {
    #[command(subcommand)]
    pub command: WorkCommands,
}

#[derive(Subcommand, Debug)]
pub enum WorkCommands {
    /// Check off one acceptance criterion
    Check {
        item: WorkItemId,
        /// Criterion number, starting at 1
        #[arg(value_parser = clap::value_parser!(u16).range(1..))]
        index: u16,
        /// Acting producer (design or verification)
        #[arg(long = "as")]
        actor: Actor,
    },
    /// Complete an item and record its claims
    Complete {
        item: WorkItemId,
        #[arg(long = "as")]
        actor: Actor,
        /// Reference to the supporting artifact
        #[arg(short, long)]
        artifact: Option<String>,
        /// Claim as REQ-001:parameter=VALUE[:PASS|FAIL|PARTIAL]; repeatable
        #[arg(short, long)]
        claim: Vec<Claim>,
        /// JSON claims document
        #[arg(long)]
        claims_file: Option<PathBuf>,
    },
}

#[derive(Debug, Serialize)]
pub struct WorkItemOutput {
    pub message: String,
    pub item: WorkItem,
}

impl CommandOutput for WorkItemOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![action_success(&self.message)];
        for (i, c) in self.item.acceptance_criteria.iter().enumerate() {
            lines.push(format!("  [{}] {}. {}", if c.checked { "x" } else { " " }, i + 1, c.text));
        }
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct CompletionOutput {
    #[serde(flatten)]
    pub completion: Completion,
}

impl CommandOutput for CompletionOutput {
    fn to_human(&self) -> String {
        let c = &self.completion;
        if c.newly_completed {
            action_success(&format!("Completed {} with {} claim(s)", c.item.id, c.claims_recorded))
        } else {
            action_notice(&format!("{} was already complete; nothing recorded", c.item.id))
        }
    }
}

pub async fn execute(args: WorkArgs, json_mode: bool) -> Result<()> {
    let ws = Workspace::open().await?;
    let desk = ProducerDesk::new(ws.repos.clone());

    match args.command {
        WorkCommands::Check { item, index, actor } => {
            let item = desk.check_criterion(actor, item, usize::from(index) - 1).await?;
            output(
                &WorkItemOutput {
                    message: format!("Checked criterion {index} of {}", item.id),
                    item,
                },
                json_mode,
            );
        }
        WorkCommands::Complete { item, actor, artifact, claim, claims_file } => {
            let doc = match claims_file {
                Some(path) => ClaimsFile::load(&path).context("Failed to read claims file")?,
                None => ClaimsFile::default(),
            }
            .merge(artifact, claim);
            let completion = desk.complete(actor, item, doc.artifact.as_deref(), doc.claims).await?;
            output(&CompletionOutput { completion }, json_mode);
        }
    }

    Ok(())
}
