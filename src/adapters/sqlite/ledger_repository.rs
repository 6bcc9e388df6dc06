//! SQLite implementations of the decision log and message repositories.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{parse_datetime, parse_json_or_default, parse_optional_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Actor, Decision, Message, RequirementId};
use crate::domain::ports::{DecisionRepository, MessageRepository};

#[derive(Clone)]
pub struct SqliteDecisionRepository {
    pool: SqlitePool,
}

impl SqliteDecisionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DecisionRepository for SqliteDecisionRepository {
    async fn append(&self, decision: &Decision) -> DomainResult<()> {
        let affected_json = serde_json::to_string(&decision.affected_requirement_ids)?;

        sqlx::query(
            "INSERT INTO decisions (id, timestamp, actor, summary, rationale, affected) VALUES (?, ?, ?, ?, ?, ?)"
        )
        .bind(decision.id.to_string())
        .bind(decision.timestamp.to_rfc3339())
        .bind(decision.actor.as_str())
        .bind(&decision.summary)
        .bind(&decision.rationale)
        .bind(&affected_json)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(&self, requirement: Option<RequirementId>, limit: usize) -> DomainResult<Vec<Decision>> {
        // Affected ids are stored as a JSON array of quoted strings.
        let pattern = requirement.map(|r| format!("%\"{r}\"%"));

        let rows: Vec<DecisionRow> = sqlx::query_as(
            r#"SELECT id, timestamp, actor, summary, rationale, affected FROM decisions
               WHERE (? IS NULL OR affected LIKE ?)
               ORDER BY rowid DESC
               LIMIT ?"#
        )
        .bind(pattern.as_deref())
        .bind(pattern.as_deref())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct DecisionRow {
    id: String,
    timestamp: String,
    actor: String,
    summary: String,
    rationale: String,
    affected: Option<String>,
}

impl TryFrom<DecisionRow> for Decision {
    type Error = DomainError;

    fn try_from(row: DecisionRow) -> Result<Self, Self::Error> {
        Ok(Decision {
            id: parse_uuid(&row.id)?,
            timestamp: parse_datetime(&row.timestamp)?,
            actor: row.actor.parse()?,
            summary: row.summary,
            rationale: row.rationale,
            affected_requirement_ids: parse_json_or_default(row.affected)?,
        })
    }
}

#[derive(Clone)]
pub struct SqliteMessageRepository {
    pool: SqlitePool,
}

impl SqliteMessageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for SqliteMessageRepository {
    async fn insert(&self, message: &Message) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO messages (id, from_actor, to_actor, kind, payload, consumed, sent_at, consumed_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#
        )
        .bind(message.id.to_string())
        .bind(message.from.as_str())
        .bind(message.to.as_str())
        .bind(message.kind.as_str())
        .bind(&message.payload)
        .bind(message.consumed)
        .bind(message.sent_at.to_rfc3339())
        .bind(message.consumed_at.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Message>> {
        let row: Option<MessageRow> = sqlx::query_as(
            "SELECT id, from_actor, to_actor, kind, payload, consumed, sent_at, consumed_at FROM messages WHERE id = ?"
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn inbox(&self, recipient: Actor, include_consumed: bool) -> DomainResult<Vec<Message>> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            r#"SELECT id, from_actor, to_actor, kind, payload, consumed, sent_at, consumed_at FROM messages
               WHERE to_actor = ? AND (? OR consumed = 0)
               ORDER BY rowid"#
        )
        .bind(recipient.as_str())
        .bind(include_consumed)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn mark_consumed(&self, id: Uuid) -> DomainResult<bool> {
        let result = sqlx::query("UPDATE messages SET consumed = 1, consumed_at = ? WHERE id = ? AND consumed = 0")
            .bind(Utc::now().to_rfc3339())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: String,
    from_actor: String,
    to_actor: String,
    kind: String,
    payload: String,
    consumed: bool,
    sent_at: String,
    consumed_at: Option<String>,
}

impl TryFrom<MessageRow> for Message {
    type Error = DomainError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        Ok(Message {
            id: parse_uuid(&row.id)?,
            from: row.from_actor.parse()?,
            to: row.to_actor.parse()?,
            kind: row.kind.parse()?,
            payload: row.payload,
            consumed: row.consumed,
            sent_at: parse_datetime(&row.sent_at)?,
            consumed_at: parse_optional_datetime(row.consumed_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use crate::domain::models::MessageKind;

    #[tokio::test]
    async fn test_decisions_filter_by_requirement() {
        let repo = SqliteDecisionRepository::new(create_migrated_test_pool().await.unwrap());

        repo.append(&Decision::new(Actor::Owner, "accepted FND-001", vec![RequirementId(1)]))
            .await
            .unwrap();
        repo.append(&Decision::new(Actor::Owner, "agreement on isp_s", vec![RequirementId(10)]))
            .await
            .unwrap();

        let all = repo.list(None, 10).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].summary, "agreement on isp_s");

        let only_one = repo.list(Some(RequirementId(1)), 10).await.unwrap();
        assert_eq!(only_one.len(), 1);
        assert_eq!(only_one[0].affected_requirement_ids, vec![RequirementId(1)]);
    }

    #[tokio::test]
    async fn test_message_consumed_once_and_archived() {
        let repo = SqliteMessageRepository::new(create_migrated_test_pool().await.unwrap());
        let rfi = Message::new(Actor::Design, Actor::Owner, MessageKind::Rfi, "Is REQ-003 hot or cold start?");
        repo.insert(&rfi).await.unwrap();

        assert_eq!(repo.inbox(Actor::Owner, false).await.unwrap().len(), 1);
        assert!(repo.inbox(Actor::Design, false).await.unwrap().is_empty());

        assert!(repo.mark_consumed(rfi.id).await.unwrap());
        assert!(!repo.mark_consumed(rfi.id).await.unwrap());

        assert!(repo.inbox(Actor::Owner, false).await.unwrap().is_empty());
        let archived = repo.inbox(Actor::Owner, true).await.unwrap();
        assert_eq!(archived.len(), 1);
        assert!(archived[0].consumed);
        assert!(repo.get(rfi.id).await.unwrap().unwrap().consumed_at.is_some());
    }
}
