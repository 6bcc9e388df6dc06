//! Work assignment scheduler.
//!
//! Keeps the design and verification queues topped up to a floor of
//! unfinished items without ever enqueueing more than a batch per cycle.

use chrono::Utc;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::{error, info, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    criteria_for, Actor, Requirement, RequirementId, RequirementStatus, SchedulerConfig, WorkItem,
    WorkItemId, WorkKind,
};
use crate::domain::ports::{Repositories, WorkItemFilter};

/// A queued item as a producer sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueEntry {
    pub item: WorkItem,
    /// Prerequisite design item is still incomplete
    pub blocked: bool,
}

impl QueueEntry {
    pub fn eligible(&self) -> bool {
        !self.blocked && !self.item.complete
    }
}

/// Status a requirement must hold to be picked up by `kind`'s queue.
pub fn candidate_status(kind: WorkKind) -> RequirementStatus {
    match kind {
        WorkKind::Design => RequirementStatus::Open,
        WorkKind::Verify => RequirementStatus::Designed,
    }
}

#[derive(Clone)]
pub struct WorkScheduler {
    repos: Repositories,
    config: SchedulerConfig,
}

impl WorkScheduler {
    pub fn new(repos: Repositories, config: SchedulerConfig) -> Self {
        Self { repos, config }
    }

    pub fn config(&self) -> SchedulerConfig {
        self.config
    }

    /// Fail with `OrphanWorkItem` if any trace link points at a missing requirement.
    pub async fn check_integrity(&self) -> DomainResult<()> {
        let orphans = self.repos.work_items.find_orphans().await?;
        let mut by_item: BTreeMap<String, (WorkItemId, Vec<RequirementId>)> = BTreeMap::new();
        for (item, requirement) in orphans {
            by_item
                .entry(item.to_string())
                .or_insert_with(|| (item, Vec::new()))
                .1
                .push(requirement);
        }

        if let Some((_, (item, missing))) = by_item.into_iter().next() {
            error!(work_item = %item, ?missing, "orphan work item; replenishment halted");
            return Err(DomainError::OrphanWorkItem { item, missing });
        }
        Ok(())
    }

    /// Top up `kind`'s queue from the requirement store.
    pub async fn replenish(&self, actor: Actor, kind: WorkKind) -> DomainResult<Vec<WorkItem>> {
        actor.ensure_writes(Actor::Owner, "work item creation")?;
        let candidates = self
            .repos
            .requirements
            .list_by_status(&[candidate_status(kind)])
            .await?;
        self.replenish_from(actor, kind, &candidates).await
    }

    /// Top up `kind`'s queue from an explicit candidate list.
    ///
    /// Candidates whose status does not fit the queue, or that an unfinished
    /// item in the same queue already covers, are skipped. Returns an empty
    /// list when nothing is eligible.
    pub async fn replenish_from(
        &self,
        actor: Actor,
        kind: WorkKind,
        candidates: &[Requirement],
    ) -> DomainResult<Vec<WorkItem>> {
        actor.ensure_writes(Actor::Owner, "work item creation")?;
        self.check_integrity().await?;

        let unfinished = self.repos.work_items.list(WorkItemFilter::unfinished(kind)).await?;
        let covered: HashSet<RequirementId> = unfinished
            .iter()
            .flat_map(|item| item.traces.iter().copied())
            .collect();

        let wanted = candidate_status(kind);
        let mut eligible: Vec<&Requirement> = candidates
            .iter()
            .filter(|r| r.status == wanted && !covered.contains(&r.id))
            .collect();
        eligible.sort_by_key(|r| (r.priority.rank(), r.id));
        eligible.dedup_by_key(|r| r.id);

        let room = self.config.target_floor.saturating_sub(unfinished.len());
        let count = room.min(self.config.batch_cap).min(eligible.len());
        if count == 0 {
            return Ok(Vec::new());
        }

        let mut created = Vec::with_capacity(count);
        for requirement in eligible.into_iter().take(count) {
            let item = self.enqueue(kind, &[requirement], None).await?;
            if kind == WorkKind::Design
                && !self
                    .repos
                    .requirements
                    .transition(requirement.id, RequirementStatus::Open, RequirementStatus::Assigned)
                    .await?
            {
                warn!(requirement_id = %requirement.id, "requirement left OPEN before assignment");
            }
            created.push(item);
        }

        info!(queue = %kind, enqueued = created.len(), unfinished = unfinished.len(), "queue replenished");
        Ok(created)
    }

    /// Enqueue a corrective item regardless of requirement status.
    pub async fn enqueue_corrective(
        &self,
        actor: Actor,
        kind: WorkKind,
        requirement_ids: &[RequirementId],
        reason: &str,
    ) -> DomainResult<WorkItem> {
        actor.ensure_writes(Actor::Owner, "work item creation")?;
        if requirement_ids.is_empty() {
            return Err(DomainError::ValidationFailed(
                "corrective work must trace to at least one requirement".into(),
            ));
        }

        let mut requirements = Vec::with_capacity(requirement_ids.len());
        for id in requirement_ids {
            let requirement = self
                .repos
                .requirements
                .get(*id)
                .await?
                .ok_or(DomainError::RequirementNotFound(*id))?;
            requirements.push(requirement);
        }
        let refs: Vec<&Requirement> = requirements.iter().collect();

        let item = self.enqueue(kind, &refs, Some(reason.to_string())).await?;
        info!(work_item = %item.id, traces = ?requirement_ids, reason, "corrective item enqueued");
        Ok(item)
    }

    /// Items in `kind`'s queue with their blocked flag, oldest first.
    pub async fn queue(&self, kind: WorkKind, include_complete: bool) -> DomainResult<Vec<QueueEntry>> {
        let filter = WorkItemFilter {
            kind: Some(kind),
            complete: (!include_complete).then_some(false),
            requirement: None,
        };
        let items = self.repos.work_items.list(filter).await?;

        let mut entries = Vec::with_capacity(items.len());
        for item in items {
            let blocked = self.is_blocked(&item).await?;
            entries.push(QueueEntry { item, blocked });
        }
        Ok(entries)
    }

    /// Whether the item's prerequisite design work is still outstanding.
    pub async fn is_blocked(&self, item: &WorkItem) -> DomainResult<bool> {
        let Some(prerequisite) = item.blocked_by else {
            return Ok(false);
        };
        let done = self
            .repos
            .work_items
            .get(prerequisite)
            .await?
            .is_some_and(|p| p.complete);
        Ok(!done)
    }

    async fn enqueue(
        &self,
        kind: WorkKind,
        requirements: &[&Requirement],
        reason: Option<String>,
    ) -> DomainResult<WorkItem> {
        let mut deliverable = String::new();
        let mut acceptance_criteria = Vec::new();
        for requirement in requirements {
            let (label, criteria) = criteria_for(kind, requirement);
            if deliverable.is_empty() {
                deliverable = label;
            }
            acceptance_criteria.extend(criteria);
        }

        let blocked_by = match kind {
            WorkKind::Design => None,
            WorkKind::Verify => self.pending_design(requirements).await?,
        };

        let item = WorkItem {
            id: WorkItemId::new(kind, self.repos.work_items.next_seq(kind).await?),
            traces: requirements.iter().map(|r| r.id).collect(),
            deliverable,
            acceptance_criteria,
            blocked_by,
            complete: false,
            artifact_ref: None,
            reason,
            created_at: Utc::now(),
            completed_at: None,
        };
        self.repos.work_items.insert(&item).await?;
        Ok(item)
    }

    /// Most recent design item for any of the requirements, if still incomplete.
    async fn pending_design(&self, requirements: &[&Requirement]) -> DomainResult<Option<WorkItemId>> {
        for requirement in requirements {
            let designs = self
                .repos
                .work_items
                .list(WorkItemFilter {
                    kind: Some(WorkKind::Design),
                    complete: None,
                    requirement: Some(requirement.id),
                })
                .await?;
            if let Some(latest) = designs.last() {
                if !latest.complete {
                    return Ok(Some(latest.id));
                }
            }
        }
        Ok(None)
    }
}
