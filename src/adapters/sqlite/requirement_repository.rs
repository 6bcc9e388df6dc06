//! SQLite implementation of the RequirementRepository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use super::{parse_datetime, parse_requirement_id, placeholders};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    normalize_text, Requirement, RequirementAmendment, RequirementId, RequirementStatus,
    StatusEvent, Threshold,
};
use crate::domain::ports::RequirementRepository;

const REQUIREMENT_COLUMNS: &str = "id, parent_ref, text, rationale, verification_method, priority, status, threshold, created_at, updated_at";

#[derive(Clone)]
pub struct SqliteRequirementRepository {
    pool: SqlitePool,
}

impl SqliteRequirementRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RequirementRepository for SqliteRequirementRepository {
    async fn next_id(&self) -> DomainResult<RequirementId> {
        let (next,): (i64,) = sqlx::query_as("SELECT COALESCE(MAX(id), 0) + 1 FROM requirements")
            .fetch_one(&self.pool)
            .await?;
        parse_requirement_id(next)
    }

    async fn insert(&self, requirement: &Requirement) -> DomainResult<()> {
        let threshold_json = requirement.threshold.as_ref().map(serde_json::to_string).transpose()?;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"INSERT INTO requirements (id, parent_ref, text, normalized_text, rationale, verification_method, priority, status, threshold, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#
        )
        .bind(i64::from(requirement.id.seq()))
        .bind(&requirement.parent_ref)
        .bind(&requirement.text)
        .bind(normalize_text(&requirement.text))
        .bind(&requirement.rationale)
        .bind(requirement.verification_method.as_str())
        .bind(requirement.priority.as_str())
        .bind(requirement.status.as_str())
        .bind(threshold_json)
        .bind(requirement.created_at.to_rfc3339())
        .bind(requirement.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT OR IGNORE INTO parent_clauses (parent_ref, fully_covered) VALUES (?, 0)")
            .bind(&requirement.parent_ref)
            .execute(&mut *tx)
            .await?;

        sqlx::query("INSERT INTO requirement_events (requirement_id, from_status, to_status, at) VALUES (?, NULL, ?, ?)")
            .bind(i64::from(requirement.id.seq()))
            .bind(requirement.status.as_str())
            .bind(requirement.created_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: RequirementId) -> DomainResult<Option<Requirement>> {
        let row: Option<RequirementRow> =
            sqlx::query_as(&format!("SELECT {REQUIREMENT_COLUMNS} FROM requirements WHERE id = ?"))
                .bind(i64::from(id.seq()))
                .fetch_optional(&self.pool)
                .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list(&self) -> DomainResult<Vec<Requirement>> {
        let rows: Vec<RequirementRow> =
            sqlx::query_as(&format!("SELECT {REQUIREMENT_COLUMNS} FROM requirements ORDER BY id"))
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_by_status(&self, statuses: &[RequirementStatus]) -> DomainResult<Vec<Requirement>> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }
        let query = format!(
            "SELECT {REQUIREMENT_COLUMNS} FROM requirements WHERE status IN ({}) ORDER BY id",
            placeholders(statuses.len())
        );
        let mut q = sqlx::query_as::<_, RequirementRow>(&query);
        for status in statuses {
            q = q.bind(status.as_str());
        }

        let rows = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn count(&self) -> DomainResult<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM requirements")
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn transition(
        &self,
        id: RequirementId,
        from: RequirementStatus,
        to: RequirementStatus,
    ) -> DomainResult<bool> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("UPDATE requirements SET status = ?, updated_at = ? WHERE id = ? AND status = ?")
            .bind(to.as_str())
            .bind(&now)
            .bind(i64::from(id.seq()))
            .bind(from.as_str())
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("INSERT INTO requirement_events (requirement_id, from_status, to_status, at) VALUES (?, ?, ?, ?)")
            .bind(i64::from(id.seq()))
            .bind(from.as_str())
            .bind(to.as_str())
            .bind(&now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn amend(&self, id: RequirementId, amendment: &RequirementAmendment) -> DomainResult<()> {
        if amendment.is_empty() {
            return Ok(());
        }

        let mut sets: Vec<&str> = Vec::new();
        let mut bindings: Vec<String> = Vec::new();

        if let Some(text) = &amendment.text {
            sets.push("text = ?");
            bindings.push(text.clone());
            sets.push("normalized_text = ?");
            bindings.push(normalize_text(text));
        }
        if let Some(rationale) = &amendment.rationale {
            sets.push("rationale = ?");
            bindings.push(rationale.clone());
        }
        if let Some(method) = &amendment.verification_method {
            sets.push("verification_method = ?");
            bindings.push(method.as_str().to_string());
        }
        if let Some(priority) = &amendment.priority {
            sets.push("priority = ?");
            bindings.push(priority.as_str().to_string());
        }
        if let Some(threshold) = &amendment.threshold {
            sets.push("threshold = ?");
            bindings.push(serde_json::to_string(threshold)?);
        }
        sets.push("updated_at = ?");
        bindings.push(Utc::now().to_rfc3339());

        let query = format!("UPDATE requirements SET {} WHERE id = ?", sets.join(", "));
        let mut q = sqlx::query(&query);
        for binding in &bindings {
            q = q.bind(binding);
        }
        let result = q.bind(i64::from(id.seq())).execute(&self.pool).await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::RequirementNotFound(id));
        }
        Ok(())
    }

    async fn exists_under_parent(&self, parent_ref: &str, normalized_text: &str) -> DomainResult<bool> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM requirements WHERE parent_ref = ? AND normalized_text = ?")
                .bind(parent_ref)
                .bind(normalized_text)
                .fetch_one(&self.pool)
                .await?;
        Ok(count > 0)
    }

    async fn is_parent_covered(&self, parent_ref: &str) -> DomainResult<bool> {
        let covered: Option<(bool,)> = sqlx::query_as("SELECT fully_covered FROM parent_clauses WHERE parent_ref = ?")
            .bind(parent_ref)
            .fetch_optional(&self.pool)
            .await?;
        Ok(covered.is_some_and(|(c,)| c))
    }

    async fn mark_parent_covered(&self, parent_ref: &str) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO parent_clauses (parent_ref, fully_covered, covered_at) VALUES (?, 1, ?)
               ON CONFLICT(parent_ref) DO UPDATE SET fully_covered = 1, covered_at = excluded.covered_at"#
        )
        .bind(parent_ref)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn events_since(&self, after: i64, limit: usize) -> DomainResult<Vec<StatusEvent>> {
        let rows: Vec<StatusEventRow> = sqlx::query_as(
            "SELECT seq, requirement_id, from_status, to_status, at FROM requirement_events WHERE seq > ? ORDER BY seq LIMIT ?"
        )
        .bind(after)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct RequirementRow {
    id: i64,
    parent_ref: String,
    text: String,
    rationale: String,
    verification_method: String,
    priority: String,
    status: String,
    threshold: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<RequirementRow> for Requirement {
    type Error = DomainError;

    fn try_from(row: RequirementRow) -> Result<Self, Self::Error> {
        let threshold: Option<Threshold> = row.threshold.map(|t| serde_json::from_str(&t)).transpose()?;

        Ok(Requirement {
            id: parse_requirement_id(row.id)?,
            parent_ref: row.parent_ref,
            text: row.text,
            rationale: row.rationale,
            verification_method: row.verification_method.parse()?,
            priority: row.priority.parse()?,
            status: row.status.parse()?,
            threshold,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct StatusEventRow {
    seq: i64,
    requirement_id: i64,
    from_status: Option<String>,
    to_status: String,
    at: String,
}

impl TryFrom<StatusEventRow> for StatusEvent {
    type Error = DomainError;

    fn try_from(row: StatusEventRow) -> Result<Self, Self::Error> {
        Ok(StatusEvent {
            seq: row.seq,
            requirement_id: parse_requirement_id(row.requirement_id)?,
            from: row.from_status.map(|s| s.parse()).transpose()?,
            to: row.to_status.parse()?,
            at: parse_datetime(&row.at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use crate::domain::models::{Priority, VerificationMethod};

    async fn setup_test_repo() -> SqliteRequirementRepository {
        let pool = create_migrated_test_pool().await.unwrap();
        SqliteRequirementRepository::new(pool)
    }

    fn requirement(id: u32, text: &str) -> Requirement {
        let now = Utc::now();
        Requirement {
            id: RequirementId(id),
            parent_ref: "SOW 3.1".to_string(),
            text: text.to_string(),
            rationale: String::new(),
            verification_method: VerificationMethod::Analysis,
            priority: Priority::Must,
            status: RequirementStatus::Open,
            threshold: Some(Threshold::parse("0.95..1.05 N").unwrap()),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_get_and_creation_event() {
        let repo = setup_test_repo().await;
        assert_eq!(repo.next_id().await.unwrap(), RequirementId(1));

        repo.insert(&requirement(1, "The thruster shall produce 1.0 N")).await.unwrap();

        let stored = repo.get(RequirementId(1)).await.unwrap().unwrap();
        assert_eq!(stored.text, "The thruster shall produce 1.0 N");
        assert_eq!(stored.threshold.unwrap().unit.as_deref(), Some("N"));
        assert_eq!(repo.next_id().await.unwrap(), RequirementId(2));

        let events = repo.events_since(0, 10).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].from, None);
        assert_eq!(events[0].to, RequirementStatus::Open);
    }

    #[tokio::test]
    async fn test_transition_is_compare_and_set() {
        let repo = setup_test_repo().await;
        repo.insert(&requirement(1, "The valve shall close within 50 ms")).await.unwrap();

        assert!(repo
            .transition(RequirementId(1), RequirementStatus::Open, RequirementStatus::Assigned)
            .await
            .unwrap());
        // Stale expectation: nothing written
        assert!(!repo
            .transition(RequirementId(1), RequirementStatus::Open, RequirementStatus::Assigned)
            .await
            .unwrap());

        let events = repo.events_since(0, 10).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].from, Some(RequirementStatus::Open));
        assert_eq!(events[1].to, RequirementStatus::Assigned);
        assert_eq!(repo.events_since(events[1].seq, 10).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_amend_touches_only_named_fields() {
        let repo = setup_test_repo().await;
        repo.insert(&requirement(1, "The heater shall draw at most 15 W")).await.unwrap();
        repo.transition(RequirementId(1), RequirementStatus::Open, RequirementStatus::Assigned)
            .await
            .unwrap();

        let amendment = RequirementAmendment {
            priority: Some(Priority::Should),
            ..Default::default()
        };
        repo.amend(RequirementId(1), &amendment).await.unwrap();

        let stored = repo.get(RequirementId(1)).await.unwrap().unwrap();
        assert_eq!(stored.priority, Priority::Should);
        assert_eq!(stored.status, RequirementStatus::Assigned);
        assert_eq!(stored.text, "The heater shall draw at most 15 W");

        let missing = repo.amend(RequirementId(9), &amendment).await;
        assert!(matches!(missing, Err(DomainError::RequirementNotFound(_))));
    }

    #[tokio::test]
    async fn test_parent_coverage_and_duplicates() {
        let repo = setup_test_repo().await;
        repo.insert(&requirement(1, "The bed shall reach 150 °C.")).await.unwrap();

        assert!(repo.exists_under_parent("SOW 3.1", "the bed shall reach 150 °c").await.unwrap());
        assert!(!repo.exists_under_parent("SOW 3.2", "the bed shall reach 150 °c").await.unwrap());

        assert!(!repo.is_parent_covered("SOW 3.1").await.unwrap());
        repo.mark_parent_covered("SOW 3.1").await.unwrap();
        assert!(repo.is_parent_covered("SOW 3.1").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_by_status() {
        let repo = setup_test_repo().await;
        repo.insert(&requirement(1, "The thruster shall weigh at most 50 g")).await.unwrap();
        repo.insert(&requirement(2, "The thruster shall produce 1.0 N")).await.unwrap();
        repo.transition(RequirementId(2), RequirementStatus::Open, RequirementStatus::Assigned)
            .await
            .unwrap();

        let open = repo.list_by_status(&[RequirementStatus::Open]).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, RequirementId(1));

        let unsettled = repo.list_by_status(&RequirementStatus::UNSETTLED).await.unwrap();
        assert_eq!(unsettled.len(), 2);
        assert!(repo.list_by_status(&[]).await.unwrap().is_empty());
        assert_eq!(repo.count().await.unwrap(), 2);
    }
}
