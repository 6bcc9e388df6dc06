use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Disposition, Finding, FindingId, NewFinding, RequirementId};

/// Filters for querying findings
#[derive(Default, Debug, Clone)]
pub struct FindingFilter {
    pub disposition: Option<Disposition>,
    pub requirement: Option<RequirementId>,
}

/// Repository port for the finding log. Findings are never deleted.
#[async_trait]
pub trait FindingRepository: Send + Sync {
    /// Insert a finding, or return the one already raised for the same
    /// verification evidence
    async fn insert(&self, finding: &NewFinding) -> DomainResult<Finding>;

    async fn get(&self, id: FindingId) -> DomainResult<Option<Finding>>;

    async fn list(&self, filter: FindingFilter) -> DomainResult<Vec<Finding>>;

    /// Findings raised against one verification evidence row
    async fn for_verification_evidence(&self, evidence_id: i64) -> DomainResult<Vec<Finding>>;

    /// Set the disposition of an OPEN finding; `false` if it was not OPEN
    async fn set_disposition(&self, id: FindingId, disposition: Disposition) -> DomainResult<bool>;
}
