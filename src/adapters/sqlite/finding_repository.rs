//! SQLite implementation of the FindingRepository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use super::{parse_datetime, parse_finding_id, parse_optional_datetime, parse_requirement_id};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Disposition, Finding, FindingId, NewFinding};
use crate::domain::ports::{FindingFilter, FindingRepository};

const FINDING_COLUMNS: &str = "id, parameter, claim_design, claim_verification, delta_pct, severity, disposition, summary, design_evidence_id, verification_evidence_id, created_at, dispositioned_at";

#[derive(Clone)]
pub struct SqliteFindingRepository {
    pool: SqlitePool,
}

impl SqliteFindingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn hydrate(&self, row: FindingRow) -> DomainResult<Finding> {
        let requirements: Vec<(i64,)> = sqlx::query_as(
            "SELECT requirement_id FROM finding_requirements WHERE finding_id = ? ORDER BY requirement_id"
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Finding {
            id: parse_finding_id(row.id)?,
            requirement_ids: requirements
                .into_iter()
                .map(|(id,)| parse_requirement_id(id))
                .collect::<DomainResult<_>>()?,
            parameter: row.parameter,
            claim_design: row.claim_design,
            claim_verification: row.claim_verification,
            delta_pct: row.delta_pct,
            severity: row.severity.parse()?,
            disposition: row.disposition.parse()?,
            summary: row.summary,
            design_evidence_id: row.design_evidence_id,
            verification_evidence_id: row.verification_evidence_id,
            created_at: parse_datetime(&row.created_at)?,
            dispositioned_at: parse_optional_datetime(row.dispositioned_at)?,
        })
    }

    async fn hydrate_all(&self, rows: Vec<FindingRow>) -> DomainResult<Vec<Finding>> {
        let mut findings = Vec::with_capacity(rows.len());
        for row in rows {
            findings.push(self.hydrate(row).await?);
        }
        Ok(findings)
    }
}

#[async_trait]
impl FindingRepository for SqliteFindingRepository {
    async fn insert(&self, finding: &NewFinding) -> DomainResult<Finding> {
        let mut tx = self.pool.begin().await?;

        let (next,): (i64,) = sqlx::query_as("SELECT COALESCE(MAX(id), 0) + 1 FROM findings")
            .fetch_one(&mut *tx)
            .await?;

        let inserted = sqlx::query(
            r#"INSERT INTO findings (id, parameter, claim_design, claim_verification, delta_pct, severity, disposition, summary, design_evidence_id, verification_evidence_id, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(verification_evidence_id) DO NOTHING"#
        )
        .bind(next)
        .bind(&finding.parameter)
        .bind(finding.claim_design)
        .bind(finding.claim_verification)
        .bind(finding.delta_pct)
        .bind(finding.severity.as_str())
        .bind(Disposition::Open.as_str())
        .bind(&finding.summary)
        .bind(finding.design_evidence_id)
        .bind(finding.verification_evidence_id)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?
        .rows_affected()
            > 0;

        if inserted {
            for requirement in &finding.requirement_ids {
                sqlx::query("INSERT INTO finding_requirements (finding_id, requirement_id) VALUES (?, ?)")
                    .bind(next)
                    .bind(i64::from(requirement.seq()))
                    .execute(&mut *tx)
                    .await?;
            }
        }
        tx.commit().await?;

        self.for_verification_evidence(finding.verification_evidence_id)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                DomainError::DatabaseError(format!(
                    "finding for evidence {} vanished after insert",
                    finding.verification_evidence_id
                ))
            })
    }

    async fn get(&self, id: FindingId) -> DomainResult<Option<Finding>> {
        let row: Option<FindingRow> = sqlx::query_as(&format!("SELECT {FINDING_COLUMNS} FROM findings WHERE id = ?"))
            .bind(i64::from(id.0))
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn list(&self, filter: FindingFilter) -> DomainResult<Vec<Finding>> {
        let disposition = filter.disposition.map(|d| d.as_str());
        let requirement = filter.requirement.map(|r| i64::from(r.seq()));

        let rows: Vec<FindingRow> = sqlx::query_as(&format!(
            r#"SELECT {FINDING_COLUMNS} FROM findings
               WHERE (? IS NULL OR disposition = ?)
                 AND (? IS NULL OR id IN (SELECT finding_id FROM finding_requirements WHERE requirement_id = ?))
               ORDER BY id"#
        ))
        .bind(disposition)
        .bind(disposition)
        .bind(requirement)
        .bind(requirement)
        .fetch_all(&self.pool)
        .await?;

        self.hydrate_all(rows).await
    }

    async fn for_verification_evidence(&self, evidence_id: i64) -> DomainResult<Vec<Finding>> {
        let rows: Vec<FindingRow> = sqlx::query_as(&format!(
            "SELECT {FINDING_COLUMNS} FROM findings WHERE verification_evidence_id = ? ORDER BY id"
        ))
        .bind(evidence_id)
        .fetch_all(&self.pool)
        .await?;

        self.hydrate_all(rows).await
    }

    async fn set_disposition(&self, id: FindingId, disposition: Disposition) -> DomainResult<bool> {
        let result = sqlx::query(
            "UPDATE findings SET disposition = ?, dispositioned_at = ? WHERE id = ? AND disposition = ?"
        )
        .bind(disposition.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(i64::from(id.0))
        .bind(Disposition::Open.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[derive(sqlx::FromRow)]
struct FindingRow {
    id: i64,
    parameter: String,
    claim_design: Option<f64>,
    claim_verification: f64,
    delta_pct: Option<f64>,
    severity: String,
    disposition: String,
    summary: String,
    design_evidence_id: Option<i64>,
    verification_evidence_id: i64,
    created_at: String,
    dispositioned_at: Option<String>,
}
