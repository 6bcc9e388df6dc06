//! Owner/producer message CLI commands.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;
use uuid::Uuid;

use crate::cli::output::{action_success, list_table, output, render_list, truncate, CommandOutput};
use crate::cli::Workspace;
use crate::domain::models::{Actor, Message, MessageKind};
use crate::services::Messenger;

#[derive(Args, Debug)]
pub struct MessageArgs {
    #[command(subcommand)]
    pub command: MessageCommands,
}

#[derive(Subcommand, Debug)]
pub enum MessageCommands {
    /// Send a message
    Send {
        #[arg(long)]
        from: Actor,
        #[arg(long)]
        to: Actor,
        /// rfi, status or finding
        #[arg(short, long, default_value = "rfi")]
        kind: MessageKind,
        payload: String,
    },
    /// List messages addressed to an actor
    Inbox {
        actor: Actor,
        /// Include consumed messages
        #[arg(short, long)]
        all: bool,
    },
    /// Archive a message once actioned
    Consume {
        id: Uuid,
        #[arg(long = "as")]
        actor: Actor,
    },
}

#[derive(Debug, Serialize)]
pub struct InboxOutput {
    pub messages: Vec<Message>,
}

impl CommandOutput for InboxOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["id", "from", "kind", "sent", "consumed", "payload"]);
        for m in &self.messages {
            table.add_row(vec![
                m.id.to_string(),
                m.from.to_string(),
                m.kind.to_string(),
                m.sent_at.format("%Y-%m-%d %H:%M").to_string(),
                if m.consumed { "yes" } else { "no" }.to_string(),
                truncate(&m.payload, 60),
            ]);
        }
        render_list("message", &table, self.messages.len())
    }
}

#[derive(Debug, Serialize)]
pub struct MessageActionOutput {
    pub action: &'static str,
    pub message: Message,
}

impl CommandOutput for MessageActionOutput {
    fn to_human(&self) -> String {
        action_success(&format!("{} {} {}", self.action, self.message.kind, self.message.id))
    }
}

pub async fn execute(args: MessageArgs, json_mode: bool) -> Result<()> {
    let ws = Workspace::open().await?;
    let messenger = Messenger::new(ws.repos.clone());

    match args.command {
        MessageCommands::Send { from, to, kind, payload } => {
            let message = messenger.send(from, to, kind, &payload).await?;
            output(&MessageActionOutput { action: "Sent", message }, json_mode);
        }
        MessageCommands::Inbox { actor, all } => {
            let messages = messenger.inbox(actor, all).await?;
            output(&InboxOutput { messages }, json_mode);
        }
        MessageCommands::Consume { id, actor } => {
            let message = messenger.consume(actor, id).await?;
            output(&MessageActionOutput { action: "Consumed", message }, json_mode);
        }
    }

    Ok(())
}
