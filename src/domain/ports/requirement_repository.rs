use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    Requirement, RequirementAmendment, RequirementId, RequirementStatus, StatusEvent,
};

/// Repository port for the requirement store and its status event log.
#[async_trait]
pub trait RequirementRepository: Send + Sync {
    /// Next sequential id; ids are never reused
    async fn next_id(&self) -> DomainResult<RequirementId>;

    /// Insert a requirement together with its creation event
    async fn insert(&self, requirement: &Requirement) -> DomainResult<()>;

    async fn get(&self, id: RequirementId) -> DomainResult<Option<Requirement>>;

    /// All requirements ordered by id
    async fn list(&self) -> DomainResult<Vec<Requirement>>;

    /// Requirements whose status is any of `statuses`, ordered by id
    async fn list_by_status(&self, statuses: &[RequirementStatus]) -> DomainResult<Vec<Requirement>>;

    async fn count(&self) -> DomainResult<u64>;

    /// Compare-and-set the status column and append a status event.
    ///
    /// Returns `false` without writing when the stored status is no longer `from`.
    async fn transition(
        &self,
        id: RequirementId,
        from: RequirementStatus,
        to: RequirementStatus,
    ) -> DomainResult<bool>;

    /// Write only the fields the amendment names
    async fn amend(&self, id: RequirementId, amendment: &RequirementAmendment) -> DomainResult<()>;

    /// Whether a requirement with this normalised text exists under `parent_ref`
    async fn exists_under_parent(&self, parent_ref: &str, normalized_text: &str) -> DomainResult<bool>;

    async fn is_parent_covered(&self, parent_ref: &str) -> DomainResult<bool>;

    async fn mark_parent_covered(&self, parent_ref: &str) -> DomainResult<()>;

    /// Status events with `seq > after`, oldest first
    async fn events_since(&self, after: i64, limit: usize) -> DomainResult<Vec<StatusEvent>>;
}
