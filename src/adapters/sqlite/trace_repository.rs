//! SQLite implementation of the TraceRepository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use super::parse_requirement_id;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{RequirementId, TraceRow};
use crate::domain::ports::TraceRepository;

#[derive(Clone)]
pub struct SqliteTraceRepository {
    pool: SqlitePool,
}

impl SqliteTraceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TraceRepository for SqliteTraceRepository {
    async fn upsert(&self, row: &TraceRow) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO trace_rows (requirement_id, design_ref, verification_ref, status, updated_at)
               VALUES (?, ?, ?, ?, ?)
               ON CONFLICT(requirement_id) DO UPDATE SET
                   design_ref = excluded.design_ref,
                   verification_ref = excluded.verification_ref,
                   status = excluded.status,
                   updated_at = excluded.updated_at"#
        )
        .bind(i64::from(row.requirement_id.seq()))
        .bind(row.design_ref.map(|r| r.to_string()))
        .bind(row.verification_ref.map(|r| r.to_string()))
        .bind(row.status.as_str())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, requirement: RequirementId) -> DomainResult<Option<TraceRow>> {
        let row: Option<TraceRowRecord> = sqlx::query_as(
            "SELECT requirement_id, design_ref, verification_ref, status FROM trace_rows WHERE requirement_id = ?"
        )
        .bind(i64::from(requirement.seq()))
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list(&self) -> DomainResult<Vec<TraceRow>> {
        let rows: Vec<TraceRowRecord> = sqlx::query_as(
            "SELECT requirement_id, design_ref, verification_ref, status FROM trace_rows ORDER BY requirement_id"
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct TraceRowRecord {
    requirement_id: i64,
    design_ref: Option<String>,
    verification_ref: Option<String>,
    status: String,
}

impl TryFrom<TraceRowRecord> for TraceRow {
    type Error = DomainError;

    fn try_from(row: TraceRowRecord) -> Result<Self, Self::Error> {
        Ok(TraceRow {
            requirement_id: parse_requirement_id(row.requirement_id)?,
            design_ref: row.design_ref.map(|r| r.parse()).transpose()?,
            verification_ref: row.verification_ref.map(|r| r.parse()).transpose()?,
            status: row.status.parse()?,
        })
    }
}
