//! Finding log CLI commands.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::output::{action_success, list_table, or_dash, output, render_list, truncate, CommandOutput};
use crate::cli::Workspace;
use crate::domain::models::{Actor, Disposition, Finding, FindingId, RequirementId};
use crate::domain::ports::FindingFilter;
use crate::services::DiscrepancyResolver;

#[derive(Args, Debug)]
pub struct FindingArgs {
    #[command(subcommand)]
    pub command: FindingCommands,
}

#[derive(Subcommand, Debug)]
pub enum FindingCommands {
    /// List findings
    List {
        /// Filter by disposition (open, accepted, closed, waived)
        #[arg(short, long)]
        disposition: Option<Disposition>,
        /// Only findings referencing this requirement
        #[arg(short, long)]
        requirement: Option<RequirementId>,
    },
    /// Record the owner's disposition of an OPEN finding
    Dispose {
        id: FindingId,
        /// accepted, closed or waived
        disposition: Disposition,
        #[arg(short, long)]
        rationale: String,
    },
}

#[derive(Debug, Serialize)]
pub struct FindingListOutput {
    pub findings: Vec<Finding>,
}

fn format_value(value: Option<f64>) -> String {
    or_dash(value.map(|v| format!("{v}")))
}

impl CommandOutput for FindingListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["id", "requirements", "parameter", "design", "verification", "delta", "severity", "disposition", "summary"]);
        for f in &self.findings {
            let requirements: Vec<String> = f.requirement_ids.iter().map(ToString::to_string).collect();
            table.add_row(vec![
                f.id.to_string(),
                requirements.join(","),
                f.parameter.clone(),
                format_value(f.claim_design),
                format_value(Some(f.claim_verification)),
                or_dash(f.delta_pct.map(|d| format!("{d:.1}%"))),
                f.severity.to_string(),
                f.disposition.to_string(),
                truncate(&f.summary, 40),
            ]);
        }
        render_list("finding", &table, self.findings.len())
    }
}

#[derive(Debug, Serialize)]
pub struct DispositionOutput {
    pub finding: Finding,
}

impl CommandOutput for DispositionOutput {
    fn to_human(&self) -> String {
        action_success(&format!("{} is now {}", self.finding.id, self.finding.disposition))
    }
}

pub async fn execute(args: FindingArgs, json_mode: bool) -> Result<()> {
    let ws = Workspace::open().await?;
    let resolver = DiscrepancyResolver::new(ws.repos.clone());

    match args.command {
        FindingCommands::List { disposition, requirement } => {
            let findings = resolver.list(FindingFilter { disposition, requirement }).await?;
            output(&FindingListOutput { findings }, json_mode);
        }
        FindingCommands::Dispose { id, disposition, rationale } => {
            let finding = resolver.set_disposition(Actor::Owner, id, disposition, &rationale).await?;
            output(&DispositionOutput { finding }, json_mode);
        }
    }

    Ok(())
}
