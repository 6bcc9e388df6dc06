use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Actor, Decision, Message, RequirementId};

/// Repository port for the append-only decision log
#[async_trait]
pub trait DecisionRepository: Send + Sync {
    async fn append(&self, decision: &Decision) -> DomainResult<()>;

    /// Most recent first, optionally restricted to one requirement
    async fn list(&self, requirement: Option<RequirementId>, limit: usize) -> DomainResult<Vec<Decision>>;
}

/// Repository port for owner/producer messages
#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn insert(&self, message: &Message) -> DomainResult<()>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<Message>>;

    /// Messages addressed to `recipient`, oldest first
    async fn inbox(&self, recipient: Actor, include_consumed: bool) -> DomainResult<Vec<Message>>;

    /// Archive a message; `false` if it was already consumed
    async fn mark_consumed(&self, id: Uuid) -> DomainResult<bool>;
}
