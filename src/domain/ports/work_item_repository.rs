use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Claim, Evidence, Outcome, RequirementId, WorkItem, WorkItemId, WorkKind};

/// Filters for querying work items
#[derive(Default, Debug, Clone)]
pub struct WorkItemFilter {
    pub kind: Option<WorkKind>,
    pub complete: Option<bool>,
    pub requirement: Option<RequirementId>,
}

impl WorkItemFilter {
    pub fn unfinished(kind: WorkKind) -> Self {
        Self {
            kind: Some(kind),
            complete: Some(false),
            requirement: None,
        }
    }
}

/// A claim with its compliance outcome already settled, ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedClaim {
    pub claim: Claim,
    pub outcome: Outcome,
}

/// Repository port for work queues and the evidence attached to completed items.
#[async_trait]
pub trait WorkItemRepository: Send + Sync {
    /// Next per-kind sequence number
    async fn next_seq(&self, kind: WorkKind) -> DomainResult<u32>;

    async fn insert(&self, item: &WorkItem) -> DomainResult<()>;

    async fn get(&self, id: WorkItemId) -> DomainResult<Option<WorkItem>>;

    /// Items matching the filter, oldest first
    async fn list(&self, filter: WorkItemFilter) -> DomainResult<Vec<WorkItem>>;

    /// Mark complete, record the artifact ref and append claims, atomically.
    ///
    /// Returns `false` without writing when the item was already complete.
    async fn complete(
        &self,
        id: WorkItemId,
        artifact_ref: Option<&str>,
        claims: &[ResolvedClaim],
    ) -> DomainResult<bool>;

    /// Check off one acceptance criterion; `false` if the index does not exist
    async fn check_criterion(&self, id: WorkItemId, index: usize) -> DomainResult<bool>;

    /// Trace links pointing at requirements that do not exist
    async fn find_orphans(&self) -> DomainResult<Vec<(WorkItemId, RequirementId)>>;

    async fn evidence_for_item(&self, id: WorkItemId) -> DomainResult<Vec<Evidence>>;

    async fn evidence_for_requirement(&self, requirement: RequirementId) -> DomainResult<Vec<Evidence>>;

    /// Verification evidence the discrepancy resolver has not processed yet
    async fn unresolved_verification_evidence(&self) -> DomainResult<Vec<Evidence>>;

    /// Most recent design claim for a requirement parameter
    async fn latest_design_claim(
        &self,
        requirement: RequirementId,
        parameter: &str,
    ) -> DomainResult<Option<Evidence>>;

    async fn mark_evidence_resolved(&self, evidence_id: i64) -> DomainResult<()>;
}
