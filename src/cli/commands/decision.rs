//! Decision log CLI commands.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::output::{list_table, output, render_list, truncate, CommandOutput};
use crate::cli::Workspace;
use crate::domain::models::{Decision, RequirementId};

#[derive(Args, Debug)]
pub struct DecisionArgs {
    #[command(subcommand)]
    pub command: DecisionCommands,
}

#[derive(Subcommand, Debug)]
pub enum DecisionCommands {
    /// List decisions, most recent first
    List {
        /// Only decisions affecting this requirement
        #[arg(short, long)]
        requirement: Option<RequirementId>,
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },
}

#[derive(Debug, Serialize)]
pub struct DecisionListOutput {
    pub decisions: Vec<Decision>,
}

impl CommandOutput for DecisionListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["when", "actor", "affects", "summary", "rationale"]);
        for d in &self.decisions {
            let affected: Vec<String> = d.affected_requirement_ids.iter().map(ToString::to_string).collect();
            table.add_row(vec![
                d.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                d.actor.to_string(),
                affected.join(","),
                truncate(&d.summary, 50),
                truncate(&d.rationale, 40),
            ]);
        }
        render_list("decision", &table, self.decisions.len())
    }
}

pub async fn execute(args: DecisionArgs, json_mode: bool) -> Result<()> {
    let ws = Workspace::open().await?;
    match args.command {
        DecisionCommands::List { requirement, limit } => {
            let decisions = ws.repos.decisions.list(requirement, limit).await?;
            output(&DecisionListOutput { decisions }, json_mode);
        }
    }
    Ok(())
}
