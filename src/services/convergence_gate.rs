//! Phase detector and convergence gate.
//!
//! BOOTSTRAP → PLANNING → CONVERGENCE → DONE, with CONVERGENCE falling back
//! to PLANNING whenever a requirement is unsettled or a trace gap appears.
//! DONE is a three-way rendezvous over append-only completion markers.

use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Actor, CompletionMarker, Decision, Disposition, FindingId, GapKind, Phase, RequirementId,
    RequirementStatus, SchedulerConfig, Severity, WorkItem, WorkKind,
};
use crate::domain::ports::{FindingFilter, Repositories, WorkItemFilter};
use crate::services::traceability::TraceabilityEngine;
use crate::services::work_scheduler::WorkScheduler;

/// One reason the sprint cannot converge.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Blocker {
    UnsettledRequirement {
        requirement_id: RequirementId,
        status: RequirementStatus,
    },
    UnresolvedFinding {
        finding_id: FindingId,
        requirement_ids: Vec<RequirementId>,
        severity: Severity,
    },
    TraceabilityGap {
        requirement_id: RequirementId,
        gap: GapKind,
    },
}

impl fmt::Display for Blocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsettledRequirement { requirement_id, status } => {
                write!(f, "{requirement_id} is {status}")
            }
            Self::UnresolvedFinding { finding_id, requirement_ids, severity } => {
                let ids: Vec<String> = requirement_ids.iter().map(ToString::to_string).collect();
                write!(f, "{finding_id} ({severity}) is OPEN against {}", ids.join(", "))
            }
            Self::TraceabilityGap { requirement_id, gap } => {
                write!(f, "{requirement_id} trace row {}", gap.as_str())
            }
        }
    }
}

/// Everything the gate knows about convergence, by id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvergenceReport {
    pub phase: Phase,
    pub blockers: Vec<Blocker>,
    pub signaled: Vec<Actor>,
    pub awaiting: Vec<Actor>,
}

impl ConvergenceReport {
    pub fn ready(&self) -> bool {
        self.blockers.is_empty()
    }

    pub fn unsettled(&self) -> impl Iterator<Item = RequirementId> + '_ {
        self.blockers.iter().filter_map(|b| match b {
            Blocker::UnsettledRequirement { requirement_id, .. } => Some(*requirement_id),
            _ => None,
        })
    }
}

/// Result of one gate evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateOutcome {
    pub from: Phase,
    pub to: Phase,
    pub corrective: Vec<WorkItem>,
    /// The owner asserted its completion marker during this evaluation
    pub owner_signaled: bool,
    pub closed: Vec<RequirementId>,
    pub report: ConvergenceReport,
}

#[derive(Clone)]
pub struct ConvergenceGate {
    repos: Repositories,
    trace: TraceabilityEngine,
    scheduler: WorkScheduler,
}

impl ConvergenceGate {
    pub fn new(repos: Repositories, scheduler: SchedulerConfig) -> Self {
        Self {
            trace: TraceabilityEngine::new(repos.clone()),
            scheduler: WorkScheduler::new(repos.clone(), scheduler),
            repos,
        }
    }

    pub async fn phase(&self) -> DomainResult<Phase> {
        Ok(self.repos.coordination.phase().await?.phase)
    }

    /// Register both (possibly empty) work queues.
    pub async fn initialize_queues(&self) -> DomainResult<()> {
        for kind in WorkKind::ALL {
            self.repos.coordination.register_queue(kind).await?;
        }
        Ok(())
    }

    /// BOOTSTRAP → PLANNING once requirements exist and both queues are registered.
    pub async fn detect_bootstrap(&self) -> DomainResult<Phase> {
        let phase = self.phase().await?;
        if phase != Phase::Bootstrap {
            return Ok(phase);
        }

        let populated = self.repos.requirements.count().await? > 0;
        let queues = self.repos.coordination.queues().await?;
        let initialized = WorkKind::ALL.iter().all(|k| queues.iter().any(|q| q.kind == *k));
        if populated && initialized {
            self.set_phase(phase, Phase::Planning).await?;
            return Ok(Phase::Planning);
        }
        Ok(phase)
    }

    /// Every blocker by id, plus the rendezvous state.
    pub async fn report(&self) -> DomainResult<ConvergenceReport> {
        let mut blockers: Vec<Blocker> = self
            .repos
            .requirements
            .list_by_status(&RequirementStatus::UNSETTLED)
            .await?
            .into_iter()
            .map(|r| Blocker::UnsettledRequirement { requirement_id: r.id, status: r.status })
            .collect();

        let open = self
            .repos
            .findings
            .list(FindingFilter { disposition: Some(Disposition::Open), ..Default::default() })
            .await?;
        blockers.extend(open.into_iter().map(|f| Blocker::UnresolvedFinding {
            finding_id: f.id,
            requirement_ids: f.requirement_ids,
            severity: f.severity,
        }));

        blockers.extend(self.trace.audit_gaps().await?.into_iter().map(|g| Blocker::TraceabilityGap {
            requirement_id: g.requirement_id,
            gap: g.kind,
        }));

        let markers = self.repos.coordination.markers().await?;
        let signaled: Vec<Actor> = markers.iter().filter(|m| m.complete).map(|m| m.actor).collect();
        let awaiting = Actor::ALL.into_iter().filter(|a| !signaled.contains(a)).collect();

        Ok(ConvergenceReport {
            phase: self.phase().await?,
            blockers,
            signaled,
            awaiting,
        })
    }

    /// Run the phase machine once for the owner.
    pub async fn evaluate(&self, actor: Actor) -> DomainResult<GateOutcome> {
        actor.ensure_writes(Actor::Owner, "phase state")?;
        let from = self.detect_bootstrap().await?;
        let mut phase = from;
        let mut corrective = Vec::new();
        let mut owner_signaled = false;
        let mut closed = Vec::new();

        if phase == Phase::Planning {
            let unsettled = self.repos.requirements.list_by_status(&RequirementStatus::UNSETTLED).await?;
            if unsettled.is_empty() {
                self.set_phase(phase, Phase::Convergence).await?;
                phase = Phase::Convergence;
            }
        }

        if phase == Phase::Convergence {
            let unsettled = self.repos.requirements.list_by_status(&RequirementStatus::UNSETTLED).await?;
            if unsettled.is_empty() {
                let gaps = self.trace.audit_gaps().await?;
                if gaps.is_empty() {
                    owner_signaled = self.signal_owner().await?;
                    if self.all_markers_present().await? {
                        closed = self.final_audit().await?;
                        self.set_phase(phase, Phase::Done).await?;
                        phase = Phase::Done;
                    }
                } else {
                    for gap in &gaps {
                        corrective.extend(self.correct_gap(gap.requirement_id, gap.kind).await?);
                    }
                    self.set_phase(phase, Phase::Planning).await?;
                    phase = Phase::Planning;
                }
            } else {
                let ids: Vec<String> = unsettled.iter().map(|r| r.id.to_string()).collect();
                warn!(unsettled = %ids.join(", "), "convergence re-blocked");
                self.set_phase(phase, Phase::Planning).await?;
                phase = Phase::Planning;
            }
        }

        let report = self.report().await?;
        if phase != Phase::Done && !report.ready() {
            let blockers: Vec<String> = report.blockers.iter().map(ToString::to_string).collect();
            info!(phase = %phase, blockers = %blockers.join("; "), "cannot converge");
        }

        Ok(GateOutcome { from, to: phase, corrective, owner_signaled, closed, report })
    }

    /// Assert a producer's own completion marker. Returns `false` if it was
    /// already set.
    ///
    /// The owner's marker is written only by [`Self::evaluate`] once the
    /// convergence audit is clean.
    pub async fn signal(&self, actor: Actor, summary: &str) -> DomainResult<bool> {
        let Some(kind) = actor.consumes() else {
            return Err(DomainError::ValidationFailed(
                "the owner signals completion only through convergence evaluation".into(),
            ));
        };
        let unfinished = self.repos.work_items.list(WorkItemFilter::unfinished(kind)).await?;
        if !unfinished.is_empty() {
            warn!(%actor, unfinished = unfinished.len(), "signaling completion with unfinished work");
        }
        self.assert_marker(actor, summary).await
    }

    async fn signal_owner(&self) -> DomainResult<bool> {
        let total = self.repos.requirements.count().await?;
        self.assert_marker(
            Actor::Owner,
            &format!("All {total} requirements verified with complete traceability"),
        )
        .await
    }

    async fn assert_marker(&self, actor: Actor, summary: &str) -> DomainResult<bool> {
        let asserted = self
            .repos
            .coordination
            .assert_marker(&CompletionMarker::new(actor, summary))
            .await?;
        if asserted {
            info!(%actor, "completion signaled");
        }
        Ok(asserted)
    }

    async fn all_markers_present(&self) -> DomainResult<bool> {
        let markers = self.repos.coordination.markers().await?;
        Ok(Actor::ALL
            .iter()
            .all(|actor| markers.iter().any(|m| m.actor == *actor && m.complete)))
    }

    /// Corrective work for a gap, unless the queue already covers it.
    async fn correct_gap(&self, requirement: RequirementId, gap: GapKind) -> DomainResult<Vec<WorkItem>> {
        let mut created = Vec::new();
        let needed = [
            (gap.needs_design(), WorkKind::Design),
            (gap.needs_verification(), WorkKind::Verify),
        ];
        for (needed, kind) in needed {
            if !needed {
                continue;
            }
            let pending = self
                .repos
                .work_items
                .list(WorkItemFilter {
                    kind: Some(kind),
                    complete: Some(false),
                    requirement: Some(requirement),
                })
                .await?;
            if pending.is_empty() {
                let reason = format!("convergence audit: {}", gap.as_str());
                created.push(
                    self.scheduler
                        .enqueue_corrective(Actor::Owner, kind, &[requirement], &reason)
                        .await?,
                );
            }
        }
        Ok(created)
    }

    /// Close every VERIFIED requirement and record the audit.
    async fn final_audit(&self) -> DomainResult<Vec<RequirementId>> {
        let verified = self.repos.requirements.list_by_status(&[RequirementStatus::Verified]).await?;
        let mut closed = Vec::with_capacity(verified.len());
        for requirement in verified {
            if self
                .repos
                .requirements
                .transition(requirement.id, RequirementStatus::Verified, RequirementStatus::Closed)
                .await?
            {
                self.trace.recompute(requirement.id).await?;
                closed.push(requirement.id);
            }
        }

        self.repos
            .decisions
            .append(&Decision::new(
                Actor::Owner,
                format!("Final audit closed {} requirements", closed.len()),
                closed.clone(),
            ))
            .await?;
        info!(closed = closed.len(), "final audit complete");
        Ok(closed)
    }

    async fn set_phase(&self, from: Phase, to: Phase) -> DomainResult<()> {
        self.repos.coordination.set_phase(to).await?;
        info!(%from, %to, "phase changed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, sqlite_repositories};
    use crate::domain::models::{NewRequirement, Priority, VerificationMethod};
    use crate::services::RequirementStore;

    async fn setup() -> (RequirementStore, ConvergenceGate) {
        let pool = create_migrated_test_pool().await.unwrap();
        let repos = sqlite_repositories(&pool);
        (
            RequirementStore::new(repos.clone()),
            ConvergenceGate::new(repos, SchedulerConfig::default()),
        )
    }

    #[tokio::test]
    async fn test_bootstrap_needs_requirements_and_queues() {
        let (store, gate) = setup().await;
        assert_eq!(gate.detect_bootstrap().await.unwrap(), Phase::Bootstrap);

        gate.initialize_queues().await.unwrap();
        assert_eq!(gate.detect_bootstrap().await.unwrap(), Phase::Bootstrap);

        store
            .create(
                Actor::Owner,
                NewRequirement::new("The thruster shall produce 1 N", "SOW 1", VerificationMethod::Analysis, Priority::Must),
            )
            .await
            .unwrap();
        assert_eq!(gate.detect_bootstrap().await.unwrap(), Phase::Planning);
    }

    #[tokio::test]
    async fn test_report_enumerates_blockers_by_id() {
        let (store, gate) = setup().await;
        gate.initialize_queues().await.unwrap();
        let req = store
            .create(
                Actor::Owner,
                NewRequirement::new("The thruster shall produce 1 N", "SOW 1", VerificationMethod::Analysis, Priority::Must),
            )
            .await
            .unwrap();

        let outcome = gate.evaluate(Actor::Owner).await.unwrap();
        assert_eq!(outcome.to, Phase::Planning);
        assert!(!outcome.report.ready());
        assert_eq!(outcome.report.unsettled().collect::<Vec<_>>(), vec![req.id]);
        assert!(outcome
            .report
            .blockers
            .iter()
            .any(|b| b.to_string() == "REQ-001 trace row missing design and verification refs"));
        assert_eq!(outcome.report.awaiting, Actor::ALL.to_vec());
    }

    #[tokio::test]
    async fn test_markers_are_per_actor_and_written_once() {
        let (_, gate) = setup().await;
        assert!(gate.signal(Actor::Design, "designs complete").await.unwrap());
        assert!(!gate.signal(Actor::Design, "again").await.unwrap());
        assert!(matches!(
            gate.evaluate(Actor::Design).await,
            Err(DomainError::OwnershipViolation { .. })
        ));

        let report = gate.report().await.unwrap();
        assert_eq!(report.signaled, vec![Actor::Design]);
        assert_eq!(report.awaiting, vec![Actor::Owner, Actor::Verification]);
    }
}
