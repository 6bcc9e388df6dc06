//! The producer-facing side of the work queues.

use tracing::{info, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Actor, Claim, Outcome, SchedulerConfig, WorkItem, WorkItemId, WorkKind,
};
use crate::domain::ports::{Repositories, ResolvedClaim};
use crate::services::work_scheduler::{QueueEntry, WorkScheduler};

/// Result of a completion request.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Completion {
    pub item: WorkItem,
    /// `false` when the item had already been completed earlier
    pub newly_completed: bool,
    pub claims_recorded: usize,
}

#[derive(Clone)]
pub struct ProducerDesk {
    repos: Repositories,
    scheduler: WorkScheduler,
}

impl ProducerDesk {
    pub fn new(repos: Repositories) -> Self {
        let scheduler = WorkScheduler::new(repos.clone(), SchedulerConfig::default());
        Self { repos, scheduler }
    }

    /// The actor's own queue with eligibility flags.
    pub async fn list_queue(&self, actor: Actor, include_complete: bool) -> DomainResult<Vec<QueueEntry>> {
        let kind = Self::kind_for(actor, "work queue")?;
        self.scheduler.queue(kind, include_complete).await
    }

    /// Check off acceptance criterion `index` (zero-based).
    pub async fn check_criterion(&self, actor: Actor, id: WorkItemId, index: usize) -> DomainResult<WorkItem> {
        let item = self.owned_item(actor, id, "acceptance criteria").await?;
        if !self.repos.work_items.check_criterion(item.id, index).await? {
            return Err(DomainError::ValidationFailed(format!(
                "{id} has no acceptance criterion #{}",
                index + 1
            )));
        }
        self.fetch(id).await
    }

    /// Mark an item complete and record its claims as evidence.
    pub async fn complete(
        &self,
        actor: Actor,
        id: WorkItemId,
        artifact_ref: Option<&str>,
        claims: Vec<Claim>,
    ) -> DomainResult<Completion> {
        let item = self.owned_item(actor, id, "completion").await?;
        if item.complete {
            info!(work_item = %id, "already complete; ignoring repeated completion");
            return Ok(Completion { item, newly_completed: false, claims_recorded: 0 });
        }
        if let Some(prerequisite) = item.blocked_by {
            if self.scheduler.is_blocked(&item).await? {
                return Err(DomainError::BlockedWorkItem { item: id, blocked_by: prerequisite });
            }
        }

        let resolved = self.resolve_claims(&item, claims).await?;
        let newly_completed = self.repos.work_items.complete(id, artifact_ref, &resolved).await?;
        if !newly_completed {
            warn!(work_item = %id, "completed concurrently; claims discarded");
        }

        let claims_recorded = if newly_completed { resolved.len() } else { 0 };
        info!(work_item = %id, actor = %actor, claims = claims_recorded, "work item completed");
        Ok(Completion {
            item: self.fetch(id).await?,
            newly_completed,
            claims_recorded,
        })
    }

    fn kind_for(actor: Actor, field: &str) -> DomainResult<WorkKind> {
        actor.consumes().ok_or_else(|| DomainError::OwnershipViolation {
            actor,
            field: field.to_string(),
        })
    }

    async fn fetch(&self, id: WorkItemId) -> DomainResult<WorkItem> {
        self.repos.work_items.get(id).await?.ok_or(DomainError::WorkItemNotFound(id))
    }

    async fn owned_item(&self, actor: Actor, id: WorkItemId, field: &str) -> DomainResult<WorkItem> {
        let item = self.fetch(id).await?;
        if actor.consumes() != Some(item.kind()) {
            return Err(DomainError::OwnershipViolation {
                actor,
                field: format!("{id} {field}"),
            });
        }
        Ok(item)
    }

    /// Settle each claim's outcome: stated, else judged against the
    /// requirement's threshold, else PASS. Verification claims must state one.
    async fn resolve_claims(&self, item: &WorkItem, claims: Vec<Claim>) -> DomainResult<Vec<ResolvedClaim>> {
        let mut resolved = Vec::with_capacity(claims.len());
        for claim in claims {
            if !item.traces_to(claim.requirement_id) {
                return Err(DomainError::ValidationFailed(format!(
                    "{} does not trace to {}",
                    item.id, claim.requirement_id
                )));
            }
            if !claim.value.is_finite() {
                return Err(DomainError::ValidationFailed(format!(
                    "claim {} for {} is not a finite number",
                    claim.parameter, claim.requirement_id
                )));
            }

            let outcome = match (item.kind(), claim.outcome) {
                (_, Some(outcome)) => outcome,
                (WorkKind::Verify, None) => {
                    return Err(DomainError::ValidationFailed(format!(
                        "verification claim {} for {} needs a PASS/FAIL/PARTIAL outcome",
                        claim.parameter, claim.requirement_id
                    )));
                }
                (WorkKind::Design, None) => {
                    let requirement = self
                        .repos
                        .requirements
                        .get(claim.requirement_id)
                        .await?
                        .ok_or(DomainError::RequirementNotFound(claim.requirement_id))?;
                    match requirement.threshold {
                        Some(threshold) if !threshold.admits(claim.value) => Outcome::Fail,
                        _ => Outcome::Pass,
                    }
                }
            };
            resolved.push(ResolvedClaim { claim, outcome });
        }

        if item.kind() == WorkKind::Verify {
            for requirement in &item.traces {
                if !resolved.iter().any(|r| r.claim.requirement_id == *requirement) {
                    return Err(DomainError::ValidationFailed(format!(
                        "verification of {} must report a claim for {requirement}",
                        item.id
                    )));
                }
            }
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, sqlite_repositories};
    use crate::domain::models::{
        NewRequirement, Priority, RequirementId, Threshold, VerificationMethod,
    };
    use crate::services::RequirementStore;

    struct Fixture {
        repos: Repositories,
        desk: ProducerDesk,
        scheduler: WorkScheduler,
        requirement: RequirementId,
    }

    async fn setup() -> Fixture {
        let pool = create_migrated_test_pool().await.unwrap();
        let repos = sqlite_repositories(&pool);
        let store = RequirementStore::new(repos.clone());
        let requirement = store
            .create(
                Actor::Owner,
                NewRequirement::new("The thruster shall produce 1.0 N", "SOW 3.1", VerificationMethod::Simulation, Priority::Must)
                    .with_threshold(Threshold::parse("0.95..1.05 N").unwrap()),
            )
            .await
            .unwrap()
            .id;
        Fixture {
            desk: ProducerDesk::new(repos.clone()),
            scheduler: WorkScheduler::new(repos.clone(), SchedulerConfig::default()),
            repos,
            requirement,
        }
    }

    #[tokio::test]
    async fn test_design_completion_judges_threshold() {
        let f = setup().await;
        let design = f.scheduler.replenish(Actor::Owner, WorkKind::Design).await.unwrap().remove(0);

        let done = f
            .desk
            .complete(Actor::Design, design.id, Some("designs/thruster.md"), vec![Claim::new(f.requirement, "thrust_N", 1.2)])
            .await
            .unwrap();
        assert!(done.newly_completed);
        assert!(done.item.complete);

        let evidence = f.repos.work_items.evidence_for_item(design.id).await.unwrap();
        assert_eq!(evidence[0].outcome, Outcome::Fail);

        let again = f.desk.complete(Actor::Design, design.id, None, Vec::new()).await.unwrap();
        assert!(!again.newly_completed);
        assert_eq!(f.repos.work_items.evidence_for_item(design.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_wrong_producer_rejected() {
        let f = setup().await;
        let design = f.scheduler.replenish(Actor::Owner, WorkKind::Design).await.unwrap().remove(0);

        assert!(matches!(
            f.desk.complete(Actor::Verification, design.id, None, Vec::new()).await,
            Err(DomainError::OwnershipViolation { .. })
        ));
        assert!(matches!(
            f.desk.check_criterion(Actor::Owner, design.id, 0).await,
            Err(DomainError::OwnershipViolation { .. })
        ));
        assert!(f.desk.list_queue(Actor::Owner, false).await.is_err());
    }

    #[tokio::test]
    async fn test_check_criterion() {
        let f = setup().await;
        let design = f.scheduler.replenish(Actor::Owner, WorkKind::Design).await.unwrap().remove(0);

        let item = f.desk.check_criterion(Actor::Design, design.id, 0).await.unwrap();
        assert!(item.acceptance_criteria[0].checked);
        assert!(!item.acceptance_criteria[1].checked);
        assert!(f.desk.check_criterion(Actor::Design, design.id, 99).await.is_err());
    }

    #[tokio::test]
    async fn test_blocked_verification_cannot_complete() {
        let f = setup().await;
        let design = f.scheduler.replenish(Actor::Owner, WorkKind::Design).await.unwrap().remove(0);
        let verify = f
            .scheduler
            .enqueue_corrective(Actor::Owner, WorkKind::Verify, &[f.requirement], "early look")
            .await
            .unwrap();

        let claim = Claim::new(f.requirement, "thrust_N", 1.0).with_outcome(Outcome::Pass);
        let err = f.desk.complete(Actor::Verification, verify.id, None, vec![claim.clone()]).await;
        assert!(matches!(err, Err(DomainError::BlockedWorkItem { blocked_by, .. }) if blocked_by == design.id));

        f.desk.complete(Actor::Design, design.id, None, Vec::new()).await.unwrap();
        let queue = f.desk.list_queue(Actor::Verification, false).await.unwrap();
        assert!(queue[0].eligible());
        assert!(f.desk.complete(Actor::Verification, verify.id, None, vec![claim]).await.unwrap().newly_completed);
    }

    #[tokio::test]
    async fn test_verification_claims_need_outcome_and_coverage() {
        let f = setup().await;
        let design = f.scheduler.replenish(Actor::Owner, WorkKind::Design).await.unwrap().remove(0);
        f.desk.complete(Actor::Design, design.id, None, Vec::new()).await.unwrap();
        let verify = f
            .scheduler
            .enqueue_corrective(Actor::Owner, WorkKind::Verify, &[f.requirement], "verify")
            .await
            .unwrap();

        let no_outcome = vec![Claim::new(f.requirement, "thrust_N", 1.0)];
        assert!(f.desk.complete(Actor::Verification, verify.id, None, no_outcome).await.is_err());
        assert!(f.desk.complete(Actor::Verification, verify.id, None, Vec::new()).await.is_err());

        let foreign = vec![Claim::new(RequirementId(42), "thrust_N", 1.0).with_outcome(Outcome::Pass)];
        assert!(f.desk.complete(Actor::Verification, verify.id, None, foreign).await.is_err());

        let item = f.repos.work_items.get(verify.id).await.unwrap().unwrap();
        assert!(!item.complete);
    }
}
