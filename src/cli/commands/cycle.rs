//! Implementation of the `triad cycle` command.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use crate::cli::commands::status::render_report;
use crate::cli::output::{output, truncate, CommandOutput};
use crate::cli::Workspace;
use crate::services::{CycleReport, OwnerCycle};

#[derive(Args, Debug)]
pub struct CycleArgs {}

#[derive(Debug, Serialize)]
pub struct CycleOutput {
    #[serde(flatten)]
    pub cycle: CycleReport,
}

impl CommandOutput for CycleOutput {
    fn to_human(&self) -> String {
        let c = &self.cycle;
        let mut lines = vec![format!("Phase {} -> {}", c.phase_before, c.phase_after)];

        for rfi in &c.rfis {
            lines.push(format!("RFI from {}: {}", rfi.from, truncate(&rfi.payload, 70)));
        }
        for f in &c.findings_created {
            lines.push(format!("New finding {} ({}) {}", f.id, f.severity, truncate(&f.summary, 60)));
        }
        if c.agreements > 0 {
            lines.push(format!("{} claim pair(s) agreed", c.agreements));
        }
        for item in c.enqueued.iter().chain(&c.corrective) {
            let traces: Vec<String> = item.traces.iter().map(ToString::to_string).collect();
            let tag = if item.reason.is_some() { " (corrective)" } else { "" };
            lines.push(format!("Enqueued {} for {}{tag}", item.id, traces.join(",")));
        }
        for change in &c.status_changes {
            lines.push(format!("{}: {} -> {}", change.requirement_id, change.from, change.to));
        }
        if !c.closed.is_empty() {
            lines.push(format!("Final audit closed {} requirement(s)", c.closed.len()));
        }

        lines.push(String::new());
        lines.extend(render_report(&c.report));
        lines.join("\n")
    }
}

pub async fn execute(_args: CycleArgs, json_mode: bool) -> Result<()> {
    let ws = Workspace::open().await?;
    let cycle = OwnerCycle::new(ws.repos.clone(), ws.config.scheduler).run().await?;
    output(&CycleOutput { cycle }, json_mode);
    Ok(())
}
