//! Owner/producer messages with consumed-once semantics.

use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Actor, Message, MessageKind};
use crate::domain::ports::Repositories;

#[derive(Clone)]
pub struct Messenger {
    repos: Repositories,
}

impl Messenger {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    pub async fn send(&self, from: Actor, to: Actor, kind: MessageKind, payload: &str) -> DomainResult<Message> {
        if from == to {
            return Err(DomainError::ValidationFailed("an actor cannot message itself".into()));
        }
        if from != Actor::Owner && to != Actor::Owner {
            return Err(DomainError::ValidationFailed(
                "messages run between the owner and a producer".into(),
            ));
        }
        let payload = payload.trim();
        if payload.is_empty() {
            return Err(DomainError::ValidationFailed("message payload cannot be empty".into()));
        }

        let message = Message::new(from, to, kind, payload);
        self.repos.messages.insert(&message).await?;
        info!(message_id = %message.id, direction = %message.direction(), %kind, "message sent");
        Ok(message)
    }

    pub async fn inbox(&self, recipient: Actor, include_consumed: bool) -> DomainResult<Vec<Message>> {
        self.repos.messages.inbox(recipient, include_consumed).await
    }

    /// Archive a message once actioned. Repeating is a no-op.
    pub async fn consume(&self, actor: Actor, id: Uuid) -> DomainResult<Message> {
        let message = self.repos.messages.get(id).await?.ok_or(DomainError::MessageNotFound(id))?;
        actor.ensure_writes(message.to, "message consumed flag")?;

        if !self.repos.messages.mark_consumed(id).await? {
            debug!(message_id = %id, "already consumed");
        }
        self.repos.messages.get(id).await?.ok_or(DomainError::MessageNotFound(id))
    }

    /// Consume a batch previously read from `recipient`'s inbox.
    ///
    /// Messages that arrived after the batch was read stay unread.
    pub async fn acknowledge(&self, recipient: Actor, batch: &[Message]) -> DomainResult<Vec<Message>> {
        let mut consumed = Vec::with_capacity(batch.len());
        for message in batch {
            consumed.push(self.consume(recipient, message.id).await?);
        }
        Ok(consumed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, sqlite_repositories};

    async fn setup() -> Messenger {
        let pool = create_migrated_test_pool().await.unwrap();
        Messenger::new(sqlite_repositories(&pool))
    }

    #[tokio::test]
    async fn test_only_recipient_consumes() {
        let messenger = setup().await;
        let rfi = messenger
            .send(Actor::Verification, Actor::Owner, MessageKind::Rfi, "Which load case for REQ-004?")
            .await
            .unwrap();

        assert!(matches!(
            messenger.consume(Actor::Design, rfi.id).await,
            Err(DomainError::OwnershipViolation { .. })
        ));

        let consumed = messenger.consume(Actor::Owner, rfi.id).await.unwrap();
        assert!(consumed.consumed);
        assert!(messenger.consume(Actor::Owner, rfi.id).await.unwrap().consumed);
        assert!(messenger.inbox(Actor::Owner, false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_validation() {
        let messenger = setup().await;
        assert!(messenger.send(Actor::Owner, Actor::Owner, MessageKind::Status, "x").await.is_err());
        assert!(messenger.send(Actor::Design, Actor::Verification, MessageKind::Rfi, "x").await.is_err());
        assert!(messenger.send(Actor::Design, Actor::Owner, MessageKind::Rfi, "  ").await.is_err());
    }

    #[tokio::test]
    async fn test_acknowledge_leaves_later_arrivals_unread() {
        let messenger = setup().await;
        messenger.send(Actor::Design, Actor::Owner, MessageKind::Rfi, "q1").await.unwrap();
        messenger.send(Actor::Verification, Actor::Owner, MessageKind::Status, "s1").await.unwrap();
        let batch = messenger.inbox(Actor::Owner, false).await.unwrap();
        let late = messenger.send(Actor::Design, Actor::Owner, MessageKind::Rfi, "q2").await.unwrap();

        let consumed = messenger.acknowledge(Actor::Owner, &batch).await.unwrap();
        assert_eq!(consumed.len(), 2);
        assert!(consumed.iter().all(|m| m.consumed));

        let unread = messenger.inbox(Actor::Owner, false).await.unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].id, late.id);
        assert_eq!(messenger.inbox(Actor::Owner, true).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_message() {
        let messenger = setup().await;
        assert!(matches!(
            messenger.consume(Actor::Owner, Uuid::new_v4()).await,
            Err(DomainError::MessageNotFound(_))
        ));
    }
}
