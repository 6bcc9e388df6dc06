//! Phase state, queue registrations and completion markers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ids::{Actor, WorkKind};
use crate::domain::errors::DomainError;

/// Phase of the owner's control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Bootstrap,
    Planning,
    Convergence,
    Done,
}

impl Default for Phase {
    fn default() -> Self {
        Self::Bootstrap
    }
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bootstrap => "BOOTSTRAP",
            Self::Planning => "PLANNING",
            Self::Convergence => "CONVERGENCE",
            Self::Done => "DONE",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BOOTSTRAP" => Ok(Self::Bootstrap),
            "PLANNING" => Ok(Self::Planning),
            "CONVERGENCE" => Ok(Self::Convergence),
            "DONE" => Ok(Self::Done),
            other => Err(DomainError::ValidationFailed(format!("unknown phase: {other}"))),
        }
    }
}

/// Persisted phase detector state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseState {
    pub phase: Phase,
    pub updated_at: DateTime<Utc>,
}

/// An initialised (possibly empty) work queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueRegistration {
    pub kind: WorkKind,
    pub initialized_at: DateTime<Utc>,
}

/// One actor's terminal completion flag. Written once by that actor only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionMarker {
    pub actor: Actor,
    pub complete: bool,
    pub summary: String,
    pub signaled_at: DateTime<Utc>,
}

impl CompletionMarker {
    pub fn new(actor: Actor, summary: impl Into<String>) -> Self {
        Self {
            actor,
            complete: true,
            summary: summary.into(),
            signaled_at: Utc::now(),
        }
    }
}
