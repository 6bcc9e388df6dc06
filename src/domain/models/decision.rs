//! Append-only decision log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ids::{Actor, RequirementId};

/// An audit trail entry. Created once, never mutated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub actor: Actor,
    pub summary: String,
    pub rationale: String,
    pub affected_requirement_ids: Vec<RequirementId>,
}

impl Decision {
    pub fn new(actor: Actor, summary: impl Into<String>, affected: Vec<RequirementId>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            actor,
            summary: summary.into(),
            rationale: String::new(),
            affected_requirement_ids: affected,
        }
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = rationale.into();
        self
    }
}
