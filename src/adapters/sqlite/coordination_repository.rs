//! SQLite implementation of the CoordinationRepository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use super::parse_datetime;
use crate::domain::errors::DomainResult;
use crate::domain::models::{CompletionMarker, Phase, PhaseState, QueueRegistration, WorkKind};
use crate::domain::ports::CoordinationRepository;

#[derive(Clone)]
pub struct SqliteCoordinationRepository {
    pool: SqlitePool,
}

impl SqliteCoordinationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CoordinationRepository for SqliteCoordinationRepository {
    async fn phase(&self) -> DomainResult<PhaseState> {
        let row: Option<(String, String)> = sqlx::query_as("SELECT phase, updated_at FROM phase_state WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some((phase, updated_at)) => Ok(PhaseState {
                phase: phase.parse()?,
                updated_at: parse_datetime(&updated_at)?,
            }),
            None => Ok(PhaseState {
                phase: Phase::default(),
                updated_at: Utc::now(),
            }),
        }
    }

    async fn set_phase(&self, phase: Phase) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO phase_state (id, phase, updated_at) VALUES (1, ?, ?)
               ON CONFLICT(id) DO UPDATE SET phase = excluded.phase, updated_at = excluded.updated_at"#
        )
        .bind(phase.as_str())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn register_queue(&self, kind: WorkKind) -> DomainResult<()> {
        sqlx::query("INSERT OR IGNORE INTO queues (kind, initialized_at) VALUES (?, ?)")
            .bind(kind.as_str())
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn queues(&self) -> DomainResult<Vec<QueueRegistration>> {
        let rows: Vec<(String, String)> = sqlx::query_as("SELECT kind, initialized_at FROM queues ORDER BY kind")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|(kind, initialized_at)| {
                Ok(QueueRegistration {
                    kind: kind.parse()?,
                    initialized_at: parse_datetime(&initialized_at)?,
                })
            })
            .collect()
    }

    async fn assert_marker(&self, marker: &CompletionMarker) -> DomainResult<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO completion_markers (actor, complete, summary, signaled_at) VALUES (?, ?, ?, ?)"
        )
        .bind(marker.actor.as_str())
        .bind(marker.complete)
        .bind(&marker.summary)
        .bind(marker.signaled_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn markers(&self) -> DomainResult<Vec<CompletionMarker>> {
        let rows: Vec<(String, bool, String, String)> = sqlx::query_as(
            "SELECT actor, complete, summary, signaled_at FROM completion_markers ORDER BY signaled_at"
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(actor, complete, summary, signaled_at)| {
                Ok(CompletionMarker {
                    actor: actor.parse()?,
                    complete,
                    summary,
                    signaled_at: parse_datetime(&signaled_at)?,
                })
            })
            .collect()
    }

    async fn cursor(&self, consumer: &str) -> DomainResult<i64> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT seq FROM event_cursors WHERE consumer = ?")
            .bind(consumer)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map_or(0, |(seq,)| seq))
    }

    async fn advance_cursor(&self, consumer: &str, seq: i64) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO event_cursors (consumer, seq) VALUES (?, ?)
               ON CONFLICT(consumer) DO UPDATE SET seq = MAX(event_cursors.seq, excluded.seq)"#
        )
        .bind(consumer)
        .bind(seq)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
