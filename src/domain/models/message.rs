//! Directional messages between the owner and the producers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::ids::Actor;
use crate::domain::errors::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    /// Request for information
    Rfi,
    Status,
    Finding,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rfi => "RFI",
            Self::Status => "STATUS",
            Self::Finding => "FINDING",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "RFI" => Ok(Self::Rfi),
            "STATUS" => Ok(Self::Status),
            "FINDING" => Ok(Self::Finding),
            other => Err(DomainError::ValidationFailed(format!("unknown message kind: {other}"))),
        }
    }
}

/// A message with consumed-once semantics: once actioned it is archived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub from: Actor,
    pub to: Actor,
    pub kind: MessageKind,
    pub payload: String,
    pub consumed: bool,
    pub sent_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn new(from: Actor, to: Actor, kind: MessageKind, payload: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            from,
            to,
            kind,
            payload: payload.into(),
            consumed: false,
            sent_at: Utc::now(),
            consumed_at: None,
        }
    }

    /// Producer→owner or owner→producer, as the data model names it.
    pub fn direction(&self) -> String {
        format!("{}->{}", self.from, self.to)
    }
}
