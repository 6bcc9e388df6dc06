//! Requirement store CLI commands.

use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::output::{action_success, list_table, or_dash, output, render_list, truncate, CommandOutput};
use crate::cli::Workspace;
use crate::domain::models::{
    Actor, Decision, NewRequirement, Priority, Requirement, RequirementAmendment, RequirementId,
    RequirementStatus, Threshold, TraceRow, VerificationMethod,
};
use crate::services::RequirementStore;

#[derive(Args, Debug)]
pub struct ReqArgs {
    #[command(subcommand)]
    pub command: ReqCommands,
}

#[derive(Subcommand, Debug)]
pub enum ReqCommands {
    /// Add an atomic requirement
    Add {
        /// Requirement text (one "shall", one measurable condition)
        text: String,
        /// External parent clause this decomposes
        #[arg(short, long)]
        parent: String,
        /// Verification method (inspection, analysis, simulation, demonstration)
        #[arg(short, long, default_value = "analysis")]
        method: VerificationMethod,
        /// Priority (must, should, could)
        #[arg(short = 'P', long, default_value = "should")]
        priority: Priority,
        #[arg(short, long)]
        rationale: Option<String>,
        /// Acceptance band, e.g. "0.95..1.05 N" or "..50 ms"
        #[arg(short, long, value_parser = Threshold::parse)]
        threshold: Option<Threshold>,
    },
    /// List requirements
    List {
        /// Filter by status
        #[arg(short, long)]
        status: Vec<RequirementStatus>,
    },
    /// Show one requirement with its trace row and decisions
    Show { id: RequirementId },
    /// Amend a requirement's owner-writable fields
    Amend {
        id: RequirementId,
        #[arg(long)]
        text: Option<String>,
        #[arg(long)]
        rationale: Option<String>,
        #[arg(long)]
        method: Option<VerificationMethod>,
        #[arg(long)]
        priority: Option<Priority>,
        #[arg(long, value_parser = Threshold::parse)]
        threshold: Option<Threshold>,
        /// Why the amendment was made (recorded in the decision log)
        #[arg(long)]
        reason: Option<String>,
    },
    /// Declare a parent clause fully decomposed
    Cover { parent: String },
}

#[derive(Debug, Serialize)]
pub struct RequirementListOutput {
    pub requirements: Vec<Requirement>,
    pub total: usize,
}

impl CommandOutput for RequirementListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["id", "status", "priority", "method", "parent", "text"]);
        for r in &self.requirements {
            table.add_row(vec![
                r.id.to_string(),
                r.status.to_string(),
                r.priority.to_string(),
                r.verification_method.to_string(),
                truncate(&r.parent_ref, 16),
                truncate(&r.text, 60),
            ]);
        }
        render_list("requirement", &table, self.total)
    }
}

#[derive(Debug, Serialize)]
pub struct RequirementDetailOutput {
    pub requirement: Requirement,
    pub trace: Option<TraceRow>,
    pub decisions: Vec<Decision>,
}

impl CommandOutput for RequirementDetailOutput {
    fn to_human(&self) -> String {
        let r = &self.requirement;
        let mut lines = vec![
            format!("{}: {}", r.id, r.text),
            format!("Status:    {}", r.status),
            format!("Parent:    {}", r.parent_ref),
            format!("Method:    {}", r.verification_method),
            format!("Priority:  {}", r.priority),
            format!("Threshold: {}", or_dash(r.threshold.as_ref())),
        ];
        if !r.rationale.is_empty() {
            lines.push(format!("Rationale: {}", r.rationale));
        }
        if let Some(row) = &self.trace {
            lines.push(format!(
                "Trace:     design {} / verification {}",
                or_dash(row.design_ref),
                or_dash(row.verification_ref)
            ));
        }
        if !self.decisions.is_empty() {
            lines.push("\nDecisions:".to_string());
            for d in &self.decisions {
                lines.push(format!("  {} [{}] {}", d.timestamp.format("%Y-%m-%d %H:%M"), d.actor, d.summary));
            }
        }
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct RequirementActionOutput {
    pub message: String,
    pub requirement: Option<Requirement>,
}

impl CommandOutput for RequirementActionOutput {
    fn to_human(&self) -> String {
        action_success(&self.message)
    }
}

pub async fn execute(args: ReqArgs, json_mode: bool) -> Result<()> {
    let ws = Workspace::open().await?;
    let store = RequirementStore::new(ws.repos.clone());

    match args.command {
        ReqCommands::Add { text, parent, method, priority, rationale, threshold } => {
            let mut new = NewRequirement::new(text, parent, method, priority);
            if let Some(rationale) = rationale {
                new = new.with_rationale(rationale);
            }
            if let Some(threshold) = threshold {
                new = new.with_threshold(threshold);
            }
            let requirement = store.create(Actor::Owner, new).await?;
            output(
                &RequirementActionOutput {
                    message: format!("Created {}", requirement.id),
                    requirement: Some(requirement),
                },
                json_mode,
            );
        }
        ReqCommands::List { status } => {
            let requirements = if status.is_empty() {
                store.list().await?
            } else {
                store.list_by_status(&status).await?
            };
            let total = requirements.len();
            output(&RequirementListOutput { requirements, total }, json_mode);
        }
        ReqCommands::Show { id } => {
            let requirement = store.get(id).await?;
            let trace = ws.repos.traces.get(id).await?;
            let decisions = ws.repos.decisions.list(Some(id), 20).await?;
            output(&RequirementDetailOutput { requirement, trace, decisions }, json_mode);
        }
        ReqCommands::Amend { id, text, rationale, method, priority, threshold, reason } => {
            let amendment = RequirementAmendment {
                text,
                rationale,
                verification_method: method,
                priority,
                threshold,
            };
            if amendment.is_empty() {
                bail!("Nothing to amend; pass at least one of --text, --rationale, --method, --priority, --threshold");
            }
            let requirement = store.amend(Actor::Owner, id, amendment, reason).await?;
            output(
                &RequirementActionOutput {
                    message: format!("Amended {id}"),
                    requirement: Some(requirement),
                },
                json_mode,
            );
        }
        ReqCommands::Cover { parent } => {
            store.mark_parent_covered(Actor::Owner, &parent).await?;
            output(
                &RequirementActionOutput {
                    message: format!("Parent clause {parent} marked fully covered"),
                    requirement: None,
                },
                json_mode,
            );
        }
    }

    Ok(())
}
