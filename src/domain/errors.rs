//! Domain errors for the triad coordinator.
//!
//! Structural invariant violations are rejected at the API boundary and never
//! partially applied. Business-level conditions (unresolved findings,
//! traceability gaps) are recorded as state and surface through the
//! convergence report instead of through this type.

use thiserror::Error;

use super::models::{Actor, FindingId, RequirementId, RequirementStatus, WorkItemId};

fn format_ids<T: std::fmt::Display>(ids: &[T]) -> String {
    ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Domain-level errors that can occur in the triad system.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Compound requirement: {clauses} independently measurable conditions in \"{text}\"; submit one requirement per condition")]
    CompoundRequirement { text: String, clauses: usize },

    #[error("Duplicate coverage: parent clause {parent} {reason}")]
    DuplicateCoverage { parent: String, reason: String },

    #[error("Invalid transition for {id} from {from} to {to}")]
    InvalidTransition {
        id: RequirementId,
        from: RequirementStatus,
        to: RequirementStatus,
    },

    #[error("Orphan work item {item} traces to missing requirement(s): {}", format_ids(.missing))]
    OrphanWorkItem {
        item: WorkItemId,
        missing: Vec<RequirementId>,
    },

    #[error("Requirement not found: {0}")]
    RequirementNotFound(RequirementId),

    #[error("Work item not found: {0}")]
    WorkItemNotFound(WorkItemId),

    #[error("Finding not found: {0}")]
    FindingNotFound(FindingId),

    #[error("Message not found: {0}")]
    MessageNotFound(uuid::Uuid),

    #[error("Actor {actor} does not own {field}")]
    OwnershipViolation { actor: Actor, field: String },

    #[error("Work item {item} is blocked by unfinished {blocked_by}")]
    BlockedWorkItem {
        item: WorkItemId,
        blocked_by: WorkItemId,
    },

    #[error("Finding {id} already has disposition {current}; only OPEN findings can be dispositioned")]
    InvalidDisposition { id: FindingId, current: String },

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl DomainError {
    /// Whether this error must halt replenishment until the data is repaired.
    pub fn is_integrity_fault(&self) -> bool {
        matches!(self, Self::OrphanWorkItem { .. })
    }
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
