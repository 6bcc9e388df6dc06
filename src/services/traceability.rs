//! Traceability matrix engine.
//!
//! Derives each requirement's status from its work items, evidence and
//! findings, drives the stored status toward it edge by edge, and keeps one
//! trace row per requirement mirroring the stored status.

use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Actor, Disposition, Requirement, RequirementId, RequirementStatus, TraceGap, TraceRow,
    WorkItem, WorkItemId, WorkKind,
};
use crate::domain::ports::{FindingFilter, Repositories, WorkItemFilter};
use crate::services::requirement_store::{RequirementStore, StatusChange};

/// Name of this engine's cursor over the status event log.
pub const EVENT_CONSUMER: &str = "traceability";

/// Default number of events consumed per invocation.
pub const EVENT_BATCH: usize = 500;

/// Status and references a requirement's evidence supports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Derivation {
    pub status: RequirementStatus,
    pub design_ref: Option<WorkItemId>,
    pub verification_ref: Option<WorkItemId>,
    pub open_findings: usize,
}

/// Result of recomputing one requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recomputed {
    pub row: TraceRow,
    pub changes: Vec<StatusChange>,
}

/// Completed items of `kind`, oldest completion first.
fn completed(items: &[WorkItem], kind: WorkKind) -> Vec<&WorkItem> {
    let mut done: Vec<&WorkItem> = items.iter().filter(|i| i.kind() == kind && i.complete).collect();
    done.sort_by_key(|i| (i.completed_at, i.id.seq));
    done
}

#[derive(Clone)]
pub struct TraceabilityEngine {
    repos: Repositories,
    store: RequirementStore,
}

impl TraceabilityEngine {
    pub fn new(repos: Repositories) -> Self {
        let store = RequirementStore::new(repos.clone());
        Self { repos, store }
    }

    /// Pure derivation from the current record store contents.
    pub async fn derive(&self, requirement: &Requirement) -> DomainResult<Derivation> {
        let id = requirement.id;
        let items = self
            .repos
            .work_items
            .list(WorkItemFilter { requirement: Some(id), ..Default::default() })
            .await?;
        let findings = self
            .repos
            .findings
            .list(FindingFilter { requirement: Some(id), ..Default::default() })
            .await?;
        let evidence = self.repos.work_items.evidence_for_requirement(id).await?;

        let open_findings = findings.iter().filter(|f| f.disposition.is_open()).count();
        let waived: BTreeSet<i64> = findings
            .iter()
            .filter(|f| f.disposition == Disposition::Waived)
            .map(|f| f.verification_evidence_id)
            .collect();

        let design_ref = completed(&items, WorkKind::Design).last().map(|i| i.id);

        // A verification item qualifies when it reported on this requirement
        // and every parameter either passed or was waived.
        let qualifies = |item: &WorkItem| -> Option<bool> {
            let rows: Vec<_> = evidence.iter().filter(|e| e.work_item_id == item.id).collect();
            if rows.is_empty() {
                return None;
            }
            Some(rows.iter().all(|e| e.outcome.is_pass() || waived.contains(&e.id)))
        };
        let reported: Vec<(WorkItemId, bool)> = completed(&items, WorkKind::Verify)
            .into_iter()
            .filter_map(|item| qualifies(item).map(|ok| (item.id, ok)))
            .collect();
        let verification_ref = reported.iter().rev().find(|(_, ok)| *ok).map(|(id, _)| *id);
        let latest_verification_passes = reported.last().is_some_and(|(_, ok)| *ok);

        let base = if latest_verification_passes {
            RequirementStatus::Verified
        } else if design_ref.is_some() {
            RequirementStatus::Designed
        } else if items.iter().any(|i| !i.complete) {
            RequirementStatus::Assigned
        } else {
            RequirementStatus::Open
        };
        let status = if open_findings > 0 {
            base.min(RequirementStatus::Assigned)
        } else {
            base
        };

        Ok(Derivation { status, design_ref, verification_ref, open_findings })
    }

    /// Bring one requirement's status and trace row in line with its evidence.
    ///
    /// Idempotent: a second call with no new evidence changes nothing.
    pub async fn recompute(&self, id: RequirementId) -> DomainResult<Recomputed> {
        let requirement = self.store.get(id).await?;
        let derivation = self.derive(&requirement).await?;

        let mut changes = Vec::new();
        let stored = requirement.status;
        if stored != RequirementStatus::Closed && derivation.status != stored {
            if stored.path_to(derivation.status).is_some() {
                changes = self.store.walk_to(Actor::Owner, id, derivation.status).await?;
            } else {
                let err = DomainError::InvalidTransition { id, from: stored, to: derivation.status };
                warn!(requirement_id = %id, error = %err, "derived status unreachable; keeping stored status");
            }
        }

        let status = match changes.last() {
            Some(change) => change.to,
            None => stored,
        };
        let row = TraceRow {
            requirement_id: id,
            design_ref: derivation.design_ref,
            verification_ref: derivation.verification_ref,
            status,
        };
        self.repos.traces.upsert(&row).await?;

        if !changes.is_empty() {
            info!(requirement_id = %id, from = %stored, to = %status, steps = changes.len(), "status recomputed");
        }
        Ok(Recomputed { row, changes })
    }

    pub async fn recompute_all(&self) -> DomainResult<Vec<Recomputed>> {
        let requirements = self.store.list().await?;
        let mut results = Vec::with_capacity(requirements.len());
        for requirement in requirements {
            results.push(self.recompute(requirement.id).await?);
        }
        Ok(results)
    }

    /// Recompute every requirement named by status events since this
    /// engine's cursor, then advance the cursor. Returns events consumed.
    pub async fn consume_events(&self, limit: usize) -> DomainResult<usize> {
        let cursor = self.repos.coordination.cursor(EVENT_CONSUMER).await?;
        let events = self.repos.requirements.events_since(cursor, limit).await?;
        let Some(last) = events.last().map(|e| e.seq) else {
            return Ok(0);
        };

        let touched: BTreeSet<RequirementId> = events.iter().map(|e| e.requirement_id).collect();
        for id in touched {
            match self.recompute(id).await {
                Ok(_) | Err(DomainError::RequirementNotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        self.repos.coordination.advance_cursor(EVENT_CONSUMER, last).await?;
        debug!(consumed = events.len(), cursor = last, "status events consumed");
        Ok(events.len())
    }

    /// Requirements whose trace row lacks a design ref, a verification ref, or both.
    pub async fn audit_gaps(&self) -> DomainResult<Vec<TraceGap>> {
        let requirements = self.store.list().await?;
        let mut gaps = Vec::new();
        for requirement in requirements {
            let row = self
                .repos
                .traces
                .get(requirement.id)
                .await?
                .unwrap_or_else(|| TraceRow::empty(requirement.id, requirement.status));
            if let Some(kind) = row.gap() {
                gaps.push(TraceGap {
                    requirement_id: requirement.id,
                    kind,
                    status: requirement.status,
                });
            }
        }
        Ok(gaps)
    }

    /// The full matrix, one row per requirement, in id order.
    pub async fn matrix(&self) -> DomainResult<Vec<TraceRow>> {
        let requirements = self.store.list().await?;
        let mut rows = Vec::with_capacity(requirements.len());
        for requirement in requirements {
            let row = self
                .repos
                .traces
                .get(requirement.id)
                .await?
                .unwrap_or_else(|| TraceRow::empty(requirement.id, requirement.status));
            rows.push(row);
        }
        Ok(rows)
    }

    /// Requirements whose trace row is missing, disagrees with the stored
    /// status, or is internally inconsistent.
    pub async fn inconsistencies(&self) -> DomainResult<Vec<RequirementId>> {
        let requirements = self.store.list().await?;
        let mut broken = Vec::new();
        for requirement in requirements {
            match self.repos.traces.get(requirement.id).await? {
                Some(row) if row.status == requirement.status && row.is_consistent() => {}
                _ => broken.push(requirement.id),
            }
        }
        Ok(broken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, sqlite_repositories};
    use crate::domain::models::{
        Claim, NewRequirement, Outcome, Priority, SchedulerConfig, VerificationMethod,
    };
    use crate::services::{DiscrepancyResolver, ProducerDesk, WorkScheduler};

    struct Fixture {
        engine: TraceabilityEngine,
        scheduler: WorkScheduler,
        desk: ProducerDesk,
        resolver: DiscrepancyResolver,
        store: RequirementStore,
    }

    async fn setup() -> Fixture {
        let pool = create_migrated_test_pool().await.unwrap();
        let repos = sqlite_repositories(&pool);
        Fixture {
            engine: TraceabilityEngine::new(repos.clone()),
            scheduler: WorkScheduler::new(repos.clone(), SchedulerConfig::default()),
            desk: ProducerDesk::new(repos.clone()),
            resolver: DiscrepancyResolver::new(repos.clone()),
            store: RequirementStore::new(repos),
        }
    }

    async fn requirement(f: &Fixture) -> RequirementId {
        f.store
            .create(
                Actor::Owner,
                NewRequirement::new("The thruster shall produce 1.0 N", "SOW 3.1", VerificationMethod::Simulation, Priority::Must),
            )
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_recompute_is_idempotent() {
        let f = setup().await;
        let id = requirement(&f).await;

        let first = f.engine.recompute(id).await.unwrap();
        assert_eq!(first.row.status, RequirementStatus::Open);
        assert!(first.changes.is_empty());
        let second = f.engine.recompute(id).await.unwrap();
        assert_eq!(first, second);
        assert!(f.engine.inconsistencies().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_design_completion_advances_to_designed() {
        let f = setup().await;
        let id = requirement(&f).await;
        let design = f.scheduler.replenish(Actor::Owner, WorkKind::Design).await.unwrap().remove(0);
        f.desk.complete(Actor::Design, design.id, Some("d.md"), vec![Claim::new(id, "thrust_N", 1.0)]).await.unwrap();

        let result = f.engine.recompute(id).await.unwrap();
        assert_eq!(result.row.status, RequirementStatus::Designed);
        assert_eq!(result.row.design_ref, Some(design.id));
        assert_eq!(result.row.verification_ref, None);

        let gaps = f.engine.audit_gaps().await.unwrap();
        assert_eq!(gaps.len(), 1);
        assert!(gaps[0].kind.needs_verification());
    }

    #[tokio::test]
    async fn test_open_finding_caps_at_assigned_and_waiver_qualifies() {
        let f = setup().await;
        let id = requirement(&f).await;
        let design = f.scheduler.replenish(Actor::Owner, WorkKind::Design).await.unwrap().remove(0);
        f.desk.complete(Actor::Design, design.id, None, vec![Claim::new(id, "thrust_N", 1.0)]).await.unwrap();
        f.engine.recompute(id).await.unwrap();

        let verify = f.scheduler.replenish(Actor::Owner, WorkKind::Verify).await.unwrap().remove(0);
        f.desk
            .complete(Actor::Verification, verify.id, None, vec![Claim::new(id, "thrust_N", 0.9).with_outcome(Outcome::Partial)])
            .await
            .unwrap();
        let report = f.resolver.resolve_pending(Actor::Owner).await.unwrap();
        assert_eq!(report.findings.len(), 1);

        let capped = f.engine.recompute(id).await.unwrap();
        assert_eq!(capped.row.status, RequirementStatus::Assigned);
        assert_eq!(capped.row.verification_ref, None);

        f.resolver
            .set_disposition(Actor::Owner, report.findings[0].id, Disposition::Waived, "documented exception")
            .await
            .unwrap();
        let verified = f.engine.recompute(id).await.unwrap();
        assert_eq!(verified.row.status, RequirementStatus::Verified);
        assert_eq!(verified.row.verification_ref, Some(verify.id));
        assert_eq!(verified.changes.len(), 2);
    }

    #[tokio::test]
    async fn test_consume_events_advances_cursor() {
        let f = setup().await;
        requirement(&f).await;

        assert_eq!(f.engine.consume_events(EVENT_BATCH).await.unwrap(), 1);
        assert_eq!(f.engine.consume_events(EVENT_BATCH).await.unwrap(), 0);
        assert_eq!(f.engine.matrix().await.unwrap().len(), 1);
    }
}
