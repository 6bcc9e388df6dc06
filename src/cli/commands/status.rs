//! Implementation of the `triad status` command.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use crate::cli::output::{action_success, output, CommandOutput};
use crate::cli::Workspace;
use crate::domain::models::Actor;
use crate::services::{ConvergenceGate, ConvergenceReport};

#[derive(Args, Debug)]
pub struct StatusArgs {}

#[derive(Debug, Serialize)]
pub struct StatusOutput {
    #[serde(flatten)]
    pub report: ConvergenceReport,
    pub ready: bool,
}

/// Shared rendering of a convergence report.
pub fn render_report(report: &ConvergenceReport) -> Vec<String> {
    let names = |actors: &[Actor]| {
        if actors.is_empty() {
            "-".to_string()
        } else {
            actors.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
        }
    };
    let mut lines = vec![
        format!("Phase:    {}", report.phase),
        format!("Signaled: {}", names(&report.signaled)),
        format!("Awaiting: {}", names(&report.awaiting)),
    ];
    if report.ready() {
        lines.push(action_success("No blockers"));
    } else {
        lines.push(format!("Blockers ({}):", report.blockers.len()));
        lines.extend(report.blockers.iter().map(|b| format!("  - {b}")));
    }
    lines
}

impl CommandOutput for StatusOutput {
    fn to_human(&self) -> String {
        render_report(&self.report).join("\n")
    }
}

pub async fn execute(_args: StatusArgs, json_mode: bool) -> Result<()> {
    let ws = Workspace::open().await?;
    let gate = ConvergenceGate::new(ws.repos.clone(), ws.config.scheduler);
    let report = gate.report().await?;
    let ready = report.ready();
    output(&StatusOutput { report, ready }, json_mode);
    Ok(())
}
