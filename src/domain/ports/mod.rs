//! Port trait definitions (Hexagonal Architecture)
//!
//! Async repository interfaces the services depend on. Every mutating method
//! writes only the fields it names, so two actors touching different fields
//! of one record in the same interval never lose each other's update.

pub mod coordination_repository;
pub mod finding_repository;
pub mod ledger_repository;
pub mod requirement_repository;
pub mod trace_repository;
pub mod work_item_repository;

use std::sync::Arc;

pub use coordination_repository::CoordinationRepository;
pub use finding_repository::{FindingFilter, FindingRepository};
pub use ledger_repository::{DecisionRepository, MessageRepository};
pub use requirement_repository::RequirementRepository;
pub use trace_repository::TraceRepository;
pub use work_item_repository::{ResolvedClaim, WorkItemFilter, WorkItemRepository};

/// The shared durable record store, one handle per port.
#[derive(Clone)]
pub struct Repositories {
    pub requirements: Arc<dyn RequirementRepository>,
    pub work_items: Arc<dyn WorkItemRepository>,
    pub findings: Arc<dyn FindingRepository>,
    pub traces: Arc<dyn TraceRepository>,
    pub decisions: Arc<dyn DecisionRepository>,
    pub messages: Arc<dyn MessageRepository>,
    pub coordination: Arc<dyn CoordinationRepository>,
}
