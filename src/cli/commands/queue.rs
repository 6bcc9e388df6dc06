//! Work queue CLI commands.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::output::{action_notice, action_success, list_table, or_dash, output, render_list, truncate, CommandOutput};
use crate::cli::Workspace;
use crate::domain::models::{Actor, WorkItem, WorkKind};
use crate::services::{QueueEntry, WorkScheduler};

#[derive(Args, Debug)]
pub struct QueueArgs {
    #[command(subcommand)]
    pub command: QueueCommands,
}

#[derive(Subcommand, Debug)]
pub enum QueueCommands {
    /// List a queue with eligibility flags
    List {
        /// Queue (design or verify)
        kind: WorkKind,
        /// Include completed items
        #[arg(short, long)]
        all: bool,
    },
    /// Top up one or both queues from the requirement store (owner)
    Replenish {
        /// Queue to replenish; both when omitted
        kind: Option<WorkKind>,
    },
}

#[derive(Debug, Serialize)]
pub struct QueueListOutput {
    pub kind: WorkKind,
    pub entries: Vec<QueueEntryOutput>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct QueueEntryOutput {
    #[serde(flatten)]
    pub item: WorkItem,
    pub eligible: bool,
}

impl From<QueueEntry> for QueueEntryOutput {
    fn from(entry: QueueEntry) -> Self {
        Self {
            eligible: entry.eligible(),
            item: entry.item,
        }
    }
}

impl CommandOutput for QueueListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["id", "state", "traces", "criteria", "blocked by", "deliverable"]);
        for entry in &self.entries {
            let item = &entry.item;
            let state = if item.complete {
                "complete"
            } else if entry.eligible {
                "eligible"
            } else {
                "blocked"
            };
            let checked = item.acceptance_criteria.iter().filter(|c| c.checked).count();
            let traces: Vec<String> = item.traces.iter().map(ToString::to_string).collect();
            table.add_row(vec![
                item.id.to_string(),
                state.to_string(),
                traces.join(","),
                format!("{checked}/{}", item.acceptance_criteria.len()),
                or_dash(item.blocked_by),
                truncate(&item.deliverable, 40),
            ]);
        }
        render_list(&format!("{} item", self.kind), &table, self.total)
    }
}

#[derive(Debug, Serialize)]
pub struct ReplenishOutput {
    pub enqueued: Vec<WorkItem>,
}

impl CommandOutput for ReplenishOutput {
    fn to_human(&self) -> String {
        if self.enqueued.is_empty() {
            return action_notice("Nothing eligible to enqueue.");
        }
        let ids: Vec<String> = self.enqueued.iter().map(|i| i.id.to_string()).collect();
        action_success(&format!("Enqueued {}", ids.join(", ")))
    }
}

pub async fn execute(args: QueueArgs, json_mode: bool) -> Result<()> {
    let ws = Workspace::open().await?;
    let scheduler = WorkScheduler::new(ws.repos.clone(), ws.config.scheduler);

    match args.command {
        QueueCommands::List { kind, all } => {
            let entries: Vec<QueueEntryOutput> =
                scheduler.queue(kind, all).await?.into_iter().map(Into::into).collect();
            let total = entries.len();
            output(&QueueListOutput { kind, entries, total }, json_mode);
        }
        QueueCommands::Replenish { kind } => {
            let kinds = kind.map_or_else(|| WorkKind::ALL.to_vec(), |k| vec![k]);
            let mut enqueued = Vec::new();
            for kind in kinds {
                enqueued.extend(scheduler.replenish(Actor::Owner, kind).await?);
            }
            output(&ReplenishOutput { enqueued }, json_mode);
        }
    }

    Ok(())
}
