//! Implementation of the `triad signal` command.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use crate::cli::output::{action_notice, action_success, output, CommandOutput};
use crate::cli::Workspace;
use crate::domain::models::Actor;
use crate::services::ConvergenceGate;

#[derive(Args, Debug)]
pub struct SignalArgs {
    /// Producer asserting its own completion marker (the owner signals via `triad cycle`)
    #[arg(long = "as")]
    pub actor: Actor,
    /// Short summary stored with the marker
    #[arg(short, long, default_value = "work complete")]
    pub summary: String,
}

#[derive(Debug, Serialize)]
pub struct SignalOutput {
    pub actor: Actor,
    pub asserted: bool,
}

impl CommandOutput for SignalOutput {
    fn to_human(&self) -> String {
        if self.asserted {
            action_success(&format!("Completion signaled for {}", self.actor))
        } else {
            action_notice(&format!("{} had already signaled completion", self.actor))
        }
    }
}

pub async fn execute(args: SignalArgs, json_mode: bool) -> Result<()> {
    let ws = Workspace::open().await?;
    let gate = ConvergenceGate::new(ws.repos.clone(), ws.config.scheduler);
    let asserted = gate.signal(args.actor, &args.summary).await?;
    output(&SignalOutput { actor: args.actor, asserted }, json_mode);
    Ok(())
}
