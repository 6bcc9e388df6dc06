pub mod config;
pub mod coordination;
pub mod decision;
pub mod finding;
pub mod ids;
pub mod message;
pub mod requirement;
pub mod trace;
pub mod work_item;

pub use config::{Config, DatabaseConfig, LoggingConfig, SchedulerConfig};
pub use coordination::{CompletionMarker, Phase, PhaseState, QueueRegistration};
pub use decision::Decision;
pub use finding::{Disposition, Finding, NewFinding, Severity};
pub use ids::{Actor, FindingId, RequirementId, WorkItemId, WorkKind};
pub use message::{Message, MessageKind};
pub use requirement::{
    normalize_text, validate_atomic, NewRequirement, Priority, Requirement,
    RequirementAmendment, RequirementStatus, StatusEvent, Threshold, VerificationMethod,
};
pub use trace::{GapKind, TraceGap, TraceRow};
pub use work_item::{criteria_for, AcceptanceCriterion, Claim, Evidence, Outcome, WorkItem};
