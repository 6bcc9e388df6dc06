//! Traceability matrix CLI commands.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::output::{action_success, list_table, or_dash, output, render_list, CommandOutput};
use crate::cli::Workspace;
use crate::domain::models::{TraceGap, TraceRow};
use crate::services::{StatusChange, TraceabilityEngine};

#[derive(Args, Debug)]
pub struct TraceArgs {
    #[command(subcommand)]
    pub command: TraceCommands,
}

#[derive(Subcommand, Debug)]
pub enum TraceCommands {
    /// Show the traceability matrix
    Show,
    /// List requirements missing a design or verification ref
    Gaps,
    /// Recompute every row from current work items and findings (owner)
    Recompute,
}

#[derive(Debug, Serialize)]
pub struct MatrixOutput {
    pub rows: Vec<TraceRow>,
}

impl CommandOutput for MatrixOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["requirement", "design", "verification", "status"]);
        for row in &self.rows {
            table.add_row(vec![
                row.requirement_id.to_string(),
                or_dash(row.design_ref),
                or_dash(row.verification_ref),
                row.status.to_string(),
            ]);
        }
        render_list("row", &table, self.rows.len())
    }
}

#[derive(Debug, Serialize)]
pub struct GapsOutput {
    pub gaps: Vec<TraceGap>,
}

impl CommandOutput for GapsOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["requirement", "missing", "status"]);
        for gap in &self.gaps {
            table.add_row(vec![gap.requirement_id.to_string(), gap.kind.as_str().to_string(), gap.status.to_string()]);
        }
        render_list("gap", &table, self.gaps.len())
    }
}

#[derive(Debug, Serialize)]
pub struct RecomputeOutput {
    pub rows: usize,
    pub changes: Vec<StatusChange>,
}

impl CommandOutput for RecomputeOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![action_success(&format!(
            "Recomputed {} row(s), {} status change(s)",
            self.rows,
            self.changes.len()
        ))];
        for c in &self.changes {
            lines.push(format!("  {}: {} -> {}", c.requirement_id, c.from, c.to));
        }
        lines.join("\n")
    }
}

pub async fn execute(args: TraceArgs, json_mode: bool) -> Result<()> {
    let ws = Workspace::open().await?;
    let engine = TraceabilityEngine::new(ws.repos.clone());

    match args.command {
        TraceCommands::Show => output(&MatrixOutput { rows: engine.matrix().await? }, json_mode),
        TraceCommands::Gaps => output(&GapsOutput { gaps: engine.audit_gaps().await? }, json_mode),
        TraceCommands::Recompute => {
            let results = engine.recompute_all().await?;
            let rows = results.len();
            let changes = results.into_iter().flat_map(|r| r.changes).collect();
            output(&RecomputeOutput { rows, changes }, json_mode);
        }
    }

    Ok(())
}
