use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{RequirementId, TraceRow};

/// Repository port for the traceability matrix
#[async_trait]
pub trait TraceRepository: Send + Sync {
    async fn upsert(&self, row: &TraceRow) -> DomainResult<()>;

    async fn get(&self, requirement: RequirementId) -> DomainResult<Option<TraceRow>>;

    /// All rows ordered by requirement id
    async fn list(&self) -> DomainResult<Vec<TraceRow>>;
}
