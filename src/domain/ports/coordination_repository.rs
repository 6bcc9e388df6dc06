use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{CompletionMarker, Phase, PhaseState, QueueRegistration, WorkKind};

/// Repository port for phase state, queue registrations, completion markers
/// and event-consumer cursors
#[async_trait]
pub trait CoordinationRepository: Send + Sync {
    async fn phase(&self) -> DomainResult<PhaseState>;

    async fn set_phase(&self, phase: Phase) -> DomainResult<()>;

    /// Idempotently register an (empty) queue
    async fn register_queue(&self, kind: WorkKind) -> DomainResult<()>;

    async fn queues(&self) -> DomainResult<Vec<QueueRegistration>>;

    /// Insert the marker if the actor has none yet; `true` when inserted
    async fn assert_marker(&self, marker: &CompletionMarker) -> DomainResult<bool>;

    async fn markers(&self) -> DomainResult<Vec<CompletionMarker>>;

    async fn cursor(&self, consumer: &str) -> DomainResult<i64>;

    /// Move a cursor forward; never moves it backwards
    async fn advance_cursor(&self, consumer: &str, seq: i64) -> DomainResult<()>;
}
