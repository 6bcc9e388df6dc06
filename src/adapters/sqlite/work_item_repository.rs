//! SQLite implementation of the WorkItemRepository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use super::{parse_datetime, parse_optional_datetime, parse_requirement_id};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AcceptanceCriterion, Evidence, RequirementId, WorkItem, WorkItemId, WorkKind,
};
use crate::domain::ports::{ResolvedClaim, WorkItemFilter, WorkItemRepository};

const EVIDENCE_COLUMNS: &str = "id, work_item_id, requirement_id, parameter, value, outcome, resolved, recorded_at";

#[derive(Clone)]
pub struct SqliteWorkItemRepository {
    pool: SqlitePool,
}

impl SqliteWorkItemRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Attach trace links and acceptance criteria to a bare row.
    async fn hydrate(&self, row: WorkItemRow) -> DomainResult<WorkItem> {
        let traces: Vec<(i64,)> = sqlx::query_as(
            "SELECT requirement_id FROM work_item_traces WHERE work_item_id = ? ORDER BY requirement_id"
        )
        .bind(&row.id)
        .fetch_all(&self.pool)
        .await?;

        let criteria: Vec<(String, bool)> = sqlx::query_as(
            "SELECT text, checked FROM acceptance_criteria WHERE work_item_id = ? ORDER BY idx"
        )
        .bind(&row.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(WorkItem {
            id: row.id.parse()?,
            traces: traces
                .into_iter()
                .map(|(id,)| parse_requirement_id(id))
                .collect::<DomainResult<_>>()?,
            deliverable: row.deliverable,
            acceptance_criteria: criteria
                .into_iter()
                .map(|(text, checked)| AcceptanceCriterion { text, checked })
                .collect(),
            blocked_by: row.blocked_by.map(|b| b.parse()).transpose()?,
            complete: row.complete,
            artifact_ref: row.artifact_ref,
            reason: row.reason,
            created_at: parse_datetime(&row.created_at)?,
            completed_at: parse_optional_datetime(row.completed_at)?,
        })
    }

    async fn query_evidence(&self, query: &str, binds: &[String]) -> DomainResult<Vec<Evidence>> {
        let mut q = sqlx::query_as::<_, EvidenceRow>(query);
        for bind in binds {
            q = q.bind(bind);
        }
        let rows = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[async_trait]
impl WorkItemRepository for SqliteWorkItemRepository {
    async fn next_seq(&self, kind: WorkKind) -> DomainResult<u32> {
        let (next,): (i64,) = sqlx::query_as("SELECT COALESCE(MAX(seq), 0) + 1 FROM work_items WHERE kind = ?")
            .bind(kind.as_str())
            .fetch_one(&self.pool)
            .await?;
        u32::try_from(next).map_err(|_| DomainError::DatabaseError(format!("{kind} sequence overflow")))
    }

    async fn insert(&self, item: &WorkItem) -> DomainResult<()> {
        if item.traces.is_empty() {
            return Err(DomainError::ValidationFailed(format!(
                "work item {} must trace to at least one requirement",
                item.id
            )));
        }

        let id = item.id.to_string();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"INSERT INTO work_items (id, kind, seq, deliverable, blocked_by, complete, artifact_ref, reason, created_at, completed_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#
        )
        .bind(&id)
        .bind(item.kind().as_str())
        .bind(i64::from(item.id.seq))
        .bind(&item.deliverable)
        .bind(item.blocked_by.map(|b| b.to_string()))
        .bind(item.complete)
        .bind(&item.artifact_ref)
        .bind(&item.reason)
        .bind(item.created_at.to_rfc3339())
        .bind(item.completed_at.map(|t| t.to_rfc3339()))
        .execute(&mut *tx)
        .await?;

        for requirement in &item.traces {
            sqlx::query("INSERT INTO work_item_traces (work_item_id, requirement_id) VALUES (?, ?)")
                .bind(&id)
                .bind(i64::from(requirement.seq()))
                .execute(&mut *tx)
                .await?;
        }

        for (idx, criterion) in item.acceptance_criteria.iter().enumerate() {
            sqlx::query("INSERT INTO acceptance_criteria (work_item_id, idx, text, checked) VALUES (?, ?, ?, ?)")
                .bind(&id)
                .bind(i64::try_from(idx).unwrap_or(i64::MAX))
                .bind(&criterion.text)
                .bind(criterion.checked)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: WorkItemId) -> DomainResult<Option<WorkItem>> {
        let row: Option<WorkItemRow> = sqlx::query_as(
            "SELECT id, deliverable, blocked_by, complete, artifact_ref, reason, created_at, completed_at FROM work_items WHERE id = ?"
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn list(&self, filter: WorkItemFilter) -> DomainResult<Vec<WorkItem>> {
        let kind = filter.kind.map(|k| k.as_str());
        let requirement = filter.requirement.map(|r| i64::from(r.seq()));

        let rows: Vec<WorkItemRow> = sqlx::query_as(
            r#"SELECT id, deliverable, blocked_by, complete, artifact_ref, reason, created_at, completed_at
               FROM work_items
               WHERE (? IS NULL OR kind = ?)
                 AND (? IS NULL OR complete = ?)
                 AND (? IS NULL OR id IN (SELECT work_item_id FROM work_item_traces WHERE requirement_id = ?))
               ORDER BY rowid"#
        )
        .bind(kind)
        .bind(kind)
        .bind(filter.complete)
        .bind(filter.complete)
        .bind(requirement)
        .bind(requirement)
        .fetch_all(&self.pool)
        .await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(self.hydrate(row).await?);
        }
        Ok(items)
    }

    async fn complete(
        &self,
        id: WorkItemId,
        artifact_ref: Option<&str>,
        claims: &[ResolvedClaim],
    ) -> DomainResult<bool> {
        let item_id = id.to_string();
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE work_items SET complete = 1, artifact_ref = COALESCE(?, artifact_ref), completed_at = ? WHERE id = ? AND complete = 0"
        )
        .bind(artifact_ref)
        .bind(&now)
        .bind(&item_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("UPDATE acceptance_criteria SET checked = 1 WHERE work_item_id = ?")
            .bind(&item_id)
            .execute(&mut *tx)
            .await?;

        for resolved in claims {
            sqlx::query(
                r#"INSERT INTO evidence (work_item_id, kind, requirement_id, parameter, value, outcome, resolved, recorded_at)
                   VALUES (?, ?, ?, ?, ?, ?, 0, ?)"#
            )
            .bind(&item_id)
            .bind(id.kind.as_str())
            .bind(i64::from(resolved.claim.requirement_id.seq()))
            .bind(&resolved.claim.parameter)
            .bind(resolved.claim.value)
            .bind(resolved.outcome.as_str())
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn check_criterion(&self, id: WorkItemId, index: usize) -> DomainResult<bool> {
        let result = sqlx::query("UPDATE acceptance_criteria SET checked = 1 WHERE work_item_id = ? AND idx = ?")
            .bind(id.to_string())
            .bind(i64::try_from(index).unwrap_or(i64::MAX))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_orphans(&self) -> DomainResult<Vec<(WorkItemId, RequirementId)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"SELECT t.work_item_id, t.requirement_id
               FROM work_item_traces t
               LEFT JOIN requirements r ON r.id = t.requirement_id
               WHERE r.id IS NULL
               ORDER BY t.work_item_id, t.requirement_id"#
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(item, requirement)| Ok((item.parse()?, parse_requirement_id(requirement)?)))
            .collect()
    }

    async fn evidence_for_item(&self, id: WorkItemId) -> DomainResult<Vec<Evidence>> {
        self.query_evidence(
            &format!("SELECT {EVIDENCE_COLUMNS} FROM evidence WHERE work_item_id = ? ORDER BY id"),
            &[id.to_string()],
        )
        .await
    }

    async fn evidence_for_requirement(&self, requirement: RequirementId) -> DomainResult<Vec<Evidence>> {
        let rows: Vec<EvidenceRow> =
            sqlx::query_as(&format!("SELECT {EVIDENCE_COLUMNS} FROM evidence WHERE requirement_id = ? ORDER BY id"))
                .bind(i64::from(requirement.seq()))
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn unresolved_verification_evidence(&self) -> DomainResult<Vec<Evidence>> {
        self.query_evidence(
            &format!("SELECT {EVIDENCE_COLUMNS} FROM evidence WHERE kind = ? AND resolved = 0 ORDER BY id"),
            &[WorkKind::Verify.as_str().to_string()],
        )
        .await
    }

    async fn latest_design_claim(
        &self,
        requirement: RequirementId,
        parameter: &str,
    ) -> DomainResult<Option<Evidence>> {
        let row: Option<EvidenceRow> = sqlx::query_as(&format!(
            "SELECT {EVIDENCE_COLUMNS} FROM evidence WHERE requirement_id = ? AND parameter = ? AND kind = ? ORDER BY id DESC LIMIT 1"
        ))
        .bind(i64::from(requirement.seq()))
        .bind(parameter)
        .bind(WorkKind::Design.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn mark_evidence_resolved(&self, evidence_id: i64) -> DomainResult<()> {
        sqlx::query("UPDATE evidence SET resolved = 1 WHERE id = ?")
            .bind(evidence_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct WorkItemRow {
    id: String,
    deliverable: String,
    blocked_by: Option<String>,
    complete: bool,
    artifact_ref: Option<String>,
    reason: Option<String>,
    created_at: String,
    completed_at: Option<String>,
}

#[derive(sqlx::FromRow)]
struct EvidenceRow {
    id: i64,
    work_item_id: String,
    requirement_id: i64,
    parameter: String,
    value: f64,
    outcome: String,
    resolved: bool,
    recorded_at: String,
}

impl TryFrom<EvidenceRow> for Evidence {
    type Error = DomainError;

    fn try_from(row: EvidenceRow) -> Result<Self, Self::Error> {
        Ok(Evidence {
            id: row.id,
            work_item_id: row.work_item_id.parse()?,
            requirement_id: parse_requirement_id(row.requirement_id)?,
            parameter: row.parameter,
            value: row.value,
            outcome: row.outcome.parse()?,
            resolved: row.resolved,
            recorded_at: parse_datetime(&row.recorded_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use crate::domain::models::{Claim, Outcome};

    async fn setup_test_repo() -> (SqlitePool, SqliteWorkItemRepository) {
        let pool = create_migrated_test_pool().await.unwrap();
        (pool.clone(), SqliteWorkItemRepository::new(pool))
    }

    fn item(kind: WorkKind, seq: u32, requirement: u32) -> WorkItem {
        WorkItem {
            id: WorkItemId::new(kind, seq),
            traces: vec![RequirementId(requirement)],
            deliverable: "design artifact".to_string(),
            acceptance_criteria: vec![
                AcceptanceCriterion::new("first"),
                AcceptanceCriterion::new("second"),
            ],
            blocked_by: None,
            complete: false,
            artifact_ref: None,
            reason: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    #[tokio::test]
    async fn test_insert_and_filter() {
        let (_pool, repo) = setup_test_repo().await;
        assert_eq!(repo.next_seq(WorkKind::Design).await.unwrap(), 1);

        repo.insert(&item(WorkKind::Design, 1, 1)).await.unwrap();
        repo.insert(&item(WorkKind::Design, 2, 2)).await.unwrap();
        repo.insert(&item(WorkKind::Verify, 1, 1)).await.unwrap();

        assert_eq!(repo.next_seq(WorkKind::Design).await.unwrap(), 3);
        assert_eq!(repo.next_seq(WorkKind::Verify).await.unwrap(), 2);

        let design = repo.list(WorkItemFilter::unfinished(WorkKind::Design)).await.unwrap();
        assert_eq!(design.len(), 2);
        assert_eq!(design[0].acceptance_criteria.len(), 2);

        let for_req_one = repo
            .list(WorkItemFilter { requirement: Some(RequirementId(1)), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(for_req_one.len(), 2);
    }

    #[tokio::test]
    async fn test_item_without_traces_rejected() {
        let (_pool, repo) = setup_test_repo().await;
        let mut untraced = item(WorkKind::Design, 1, 1);
        untraced.traces.clear();
        assert!(matches!(repo.insert(&untraced).await, Err(DomainError::ValidationFailed(_))));
    }

    #[tokio::test]
    async fn test_complete_records_evidence_once() {
        let (_pool, repo) = setup_test_repo().await;
        let des = item(WorkKind::Design, 1, 1);
        repo.insert(&des).await.unwrap();

        assert!(repo.check_criterion(des.id, 1).await.unwrap());
        assert!(!repo.check_criterion(des.id, 7).await.unwrap());

        let claims = vec![ResolvedClaim {
            claim: Claim::new(RequirementId(1), "thrust_N", 1.0),
            outcome: Outcome::Pass,
        }];
        assert!(repo.complete(des.id, Some("designs/thruster.md"), &claims).await.unwrap());
        assert!(!repo.complete(des.id, Some("again.md"), &claims).await.unwrap());

        let stored = repo.get(des.id).await.unwrap().unwrap();
        assert!(stored.complete);
        assert!(stored.all_criteria_checked());
        assert_eq!(stored.artifact_ref.as_deref(), Some("designs/thruster.md"));
        assert_eq!(repo.evidence_for_item(des.id).await.unwrap().len(), 1);

        let latest = repo.latest_design_claim(RequirementId(1), "thrust_N").await.unwrap().unwrap();
        assert!((latest.value - 1.0).abs() < f64::EPSILON);
        assert!(repo.unresolved_verification_evidence().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_orphans_detected_without_requirement_row() {
        let (pool, repo) = setup_test_repo().await;
        repo.insert(&item(WorkKind::Design, 1, 42)).await.unwrap();

        let orphans = repo.find_orphans().await.unwrap();
        assert_eq!(orphans, vec![(WorkItemId::new(WorkKind::Design, 1), RequirementId(42))]);

        sqlx::query(
            "INSERT INTO requirements (id, parent_ref, text, normalized_text, verification_method, priority, created_at, updated_at) VALUES (42, 'P', 't', 't', 'analysis', 'must', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')"
        )
        .execute(&pool)
        .await
        .unwrap();
        assert!(repo.find_orphans().await.unwrap().is_empty());
    }
}
