//! Requirement store: creation, amendment and lifecycle transitions.
//!
//! Only the owner writes here. Every status change goes through the
//! repository's compare-and-set so it lands together with its event.

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    normalize_text, validate_atomic, Actor, Decision, NewRequirement, Requirement,
    RequirementAmendment, RequirementId, RequirementStatus,
};
use crate::domain::ports::Repositories;

/// One applied edge of the lifecycle graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct StatusChange {
    pub requirement_id: RequirementId,
    pub from: RequirementStatus,
    pub to: RequirementStatus,
}

#[derive(Clone)]
pub struct RequirementStore {
    repos: Repositories,
}

impl RequirementStore {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    /// Decompose one atomic requirement from a parent clause.
    pub async fn create(&self, actor: Actor, new: NewRequirement) -> DomainResult<Requirement> {
        actor.ensure_writes(Actor::Owner, "requirement")?;

        let parent_ref = new.parent_ref.trim().to_string();
        if parent_ref.is_empty() {
            return Err(DomainError::ValidationFailed("parent reference cannot be empty".into()));
        }
        validate_atomic(&new.text)?;

        if self.repos.requirements.is_parent_covered(&parent_ref).await? {
            return Err(DomainError::DuplicateCoverage {
                parent: parent_ref,
                reason: "is already fully covered".into(),
            });
        }
        if self
            .repos
            .requirements
            .exists_under_parent(&parent_ref, &normalize_text(&new.text))
            .await?
        {
            return Err(DomainError::DuplicateCoverage {
                parent: parent_ref,
                reason: "already has a requirement with this text".into(),
            });
        }

        let now = Utc::now();
        let requirement = Requirement {
            id: self.repos.requirements.next_id().await?,
            parent_ref,
            text: new.text.trim().to_string(),
            rationale: new.rationale,
            verification_method: new.verification_method,
            priority: new.priority,
            status: RequirementStatus::Open,
            threshold: new.threshold,
            created_at: now,
            updated_at: now,
        };
        self.repos.requirements.insert(&requirement).await?;

        info!(
            requirement_id = %requirement.id,
            parent = %requirement.parent_ref,
            priority = %requirement.priority,
            "requirement created"
        );
        Ok(requirement)
    }

    pub async fn get(&self, id: RequirementId) -> DomainResult<Requirement> {
        self.repos
            .requirements
            .get(id)
            .await?
            .ok_or(DomainError::RequirementNotFound(id))
    }

    pub async fn list(&self) -> DomainResult<Vec<Requirement>> {
        self.repos.requirements.list().await
    }

    pub async fn list_by_status(&self, statuses: &[RequirementStatus]) -> DomainResult<Vec<Requirement>> {
        self.repos.requirements.list_by_status(statuses).await
    }

    /// Move a requirement along one edge of the lifecycle graph.
    pub async fn set_status(
        &self,
        actor: Actor,
        id: RequirementId,
        to: RequirementStatus,
    ) -> DomainResult<Requirement> {
        actor.ensure_writes(Actor::Owner, "requirement status")?;
        let requirement = self.get(id).await?;
        let from = requirement.status;
        if from == to {
            return Ok(requirement);
        }
        if !from.can_transition_to(to) {
            warn!(requirement_id = %id, %from, %to, "rejected status change");
            return Err(DomainError::InvalidTransition { id, from, to });
        }
        if !self.repos.requirements.transition(id, from, to).await? {
            let current = self.get(id).await?.status;
            warn!(requirement_id = %id, expected = %from, %current, "status changed underneath");
            return Err(DomainError::InvalidTransition { id, from: current, to });
        }

        info!(requirement_id = %id, %from, %to, "status changed");
        self.get(id).await
    }

    /// Walk from the stored status to `target` one edge at a time.
    ///
    /// Stops early when another writer moved the status in between; the
    /// returned changes are the edges actually applied.
    pub async fn walk_to(
        &self,
        actor: Actor,
        id: RequirementId,
        target: RequirementStatus,
    ) -> DomainResult<Vec<StatusChange>> {
        actor.ensure_writes(Actor::Owner, "requirement status")?;
        let from = self.get(id).await?.status;
        let path = from
            .path_to(target)
            .ok_or(DomainError::InvalidTransition { id, from, to: target })?;

        let mut applied = Vec::with_capacity(path.len());
        let mut current = from;
        for next in path {
            if !self.repos.requirements.transition(id, current, next).await? {
                warn!(requirement_id = %id, expected = %current, "status changed underneath; walk stopped");
                break;
            }
            debug!(requirement_id = %id, from = %current, to = %next, "status step");
            applied.push(StatusChange { requirement_id: id, from: current, to: next });
            current = next;
        }
        Ok(applied)
    }

    /// Edit the owner-held fields of a requirement.
    pub async fn amend(
        &self,
        actor: Actor,
        id: RequirementId,
        amendment: RequirementAmendment,
        rationale: Option<String>,
    ) -> DomainResult<Requirement> {
        for field in amendment.fields() {
            actor.ensure_writes(Actor::Owner, field)?;
        }
        if amendment.is_empty() {
            return Err(DomainError::ValidationFailed("amendment changes nothing".into()));
        }

        let current = self.get(id).await?;
        if let Some(text) = &amendment.text {
            validate_atomic(text)?;
            let normalized = normalize_text(text);
            if normalized != normalize_text(&current.text)
                && self
                    .repos
                    .requirements
                    .exists_under_parent(&current.parent_ref, &normalized)
                    .await?
            {
                return Err(DomainError::DuplicateCoverage {
                    parent: current.parent_ref,
                    reason: "already has a requirement with this text".into(),
                });
            }
        }

        self.repos.requirements.amend(id, &amendment).await?;

        let mut decision = Decision::new(
            actor,
            format!("Amended {id}: {}", amendment.fields().join(", ")),
            vec![id],
        );
        if let Some(rationale) = rationale {
            decision = decision.with_rationale(rationale);
        }
        self.repos.decisions.append(&decision).await?;

        info!(requirement_id = %id, fields = ?amendment.fields(), "requirement amended");
        self.get(id).await
    }

    /// Declare a parent clause fully decomposed.
    pub async fn mark_parent_covered(&self, actor: Actor, parent_ref: &str) -> DomainResult<()> {
        actor.ensure_writes(Actor::Owner, "parent coverage")?;
        let parent_ref = parent_ref.trim();
        if parent_ref.is_empty() {
            return Err(DomainError::ValidationFailed("parent reference cannot be empty".into()));
        }
        self.repos.requirements.mark_parent_covered(parent_ref).await?;
        self.repos
            .decisions
            .append(&Decision::new(actor, format!("Parent clause {parent_ref} fully covered"), Vec::new()))
            .await?;
        info!(parent = %parent_ref, "parent clause marked covered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, sqlite_repositories};
    use crate::domain::models::{Priority, VerificationMethod};

    async fn setup_store() -> RequirementStore {
        let pool = create_migrated_test_pool().await.unwrap();
        RequirementStore::new(sqlite_repositories(&pool))
    }

    fn thrust() -> NewRequirement {
        NewRequirement::new(
            "The thruster shall produce 1.0 N ± 0.05 N",
            "SOW 3.1",
            VerificationMethod::Simulation,
            Priority::Must,
        )
    }

    #[tokio::test]
    async fn test_create_assigns_sequential_ids() {
        let store = setup_store().await;
        let first = store.create(Actor::Owner, thrust()).await.unwrap();
        let second = store
            .create(
                Actor::Owner,
                NewRequirement::new("The dry mass shall not exceed 50 g", "SOW 3.1", VerificationMethod::Inspection, Priority::Should),
            )
            .await
            .unwrap();

        assert_eq!(first.id, RequirementId(1));
        assert_eq!(second.id, RequirementId(2));
        assert_eq!(first.status, RequirementStatus::Open);
    }

    #[tokio::test]
    async fn test_create_rejects_compound_and_non_owner() {
        let store = setup_store().await;
        let compound = NewRequirement::new(
            "The thruster shall produce 1.0 N and achieve an Isp of at least 220 s",
            "SOW 3.1",
            VerificationMethod::Analysis,
            Priority::Must,
        );
        assert!(matches!(
            store.create(Actor::Owner, compound).await,
            Err(DomainError::CompoundRequirement { .. })
        ));
        assert!(matches!(
            store.create(Actor::Design, thrust()).await,
            Err(DomainError::OwnershipViolation { .. })
        ));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_coverage() {
        let store = setup_store().await;
        store.create(Actor::Owner, thrust()).await.unwrap();

        let again = store.create(Actor::Owner, thrust()).await;
        assert!(matches!(again, Err(DomainError::DuplicateCoverage { .. })));

        store.mark_parent_covered(Actor::Owner, "SOW 3.1").await.unwrap();
        let more = NewRequirement::new(
            "The valve shall close within 50 ms",
            "SOW 3.1",
            VerificationMethod::Demonstration,
            Priority::Could,
        );
        assert!(matches!(
            store.create(Actor::Owner, more).await,
            Err(DomainError::DuplicateCoverage { .. })
        ));
    }

    #[tokio::test]
    async fn test_set_status_follows_lifecycle() {
        let store = setup_store().await;
        let req = store.create(Actor::Owner, thrust()).await.unwrap();

        let err = store.set_status(Actor::Owner, req.id, RequirementStatus::Verified).await;
        assert!(matches!(err, Err(DomainError::InvalidTransition { .. })));

        let assigned = store.set_status(Actor::Owner, req.id, RequirementStatus::Assigned).await.unwrap();
        assert_eq!(assigned.status, RequirementStatus::Assigned);

        let by_status = store.list_by_status(&[RequirementStatus::Assigned]).await.unwrap();
        assert_eq!(by_status.len(), 1);
    }

    #[tokio::test]
    async fn test_walk_to_emits_one_step_per_edge() {
        let store = setup_store().await;
        let req = store.create(Actor::Owner, thrust()).await.unwrap();

        let steps = store.walk_to(Actor::Owner, req.id, RequirementStatus::Verified).await.unwrap();
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[2].to, RequirementStatus::Verified);

        let back = store.walk_to(Actor::Owner, req.id, RequirementStatus::Designed).await.unwrap();
        assert_eq!(
            back.iter().map(|s| s.to).collect::<Vec<_>>(),
            vec![RequirementStatus::Assigned, RequirementStatus::Designed]
        );
    }

    #[tokio::test]
    async fn test_amend_revalidates_and_logs_decision() {
        let store = setup_store().await;
        let req = store.create(Actor::Owner, thrust()).await.unwrap();

        let compound = RequirementAmendment {
            text: Some("The thruster shall produce 1.0 N; the bed shall reach 150 °C".into()),
            ..Default::default()
        };
        assert!(store.amend(Actor::Owner, req.id, compound, None).await.is_err());

        let by_design = RequirementAmendment {
            priority: Some(Priority::Could),
            ..Default::default()
        };
        assert!(matches!(
            store.amend(Actor::Design, req.id, by_design.clone(), None).await,
            Err(DomainError::OwnershipViolation { .. })
        ));

        let amended = store
            .amend(Actor::Owner, req.id, by_design, Some("descoped by customer".into()))
            .await
            .unwrap();
        assert_eq!(amended.priority, Priority::Could);
    }
}
