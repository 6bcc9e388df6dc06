//! The owner's control loop, one iteration per invocation.

use serde::Serialize;
use tracing::{info, instrument};

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    Actor, Finding, Message, MessageKind, Phase, RequirementId, RequirementStatus, SchedulerConfig, WorkItem,
    WorkKind,
};
use crate::domain::ports::Repositories;
use crate::services::convergence_gate::{ConvergenceGate, ConvergenceReport};
use crate::services::discrepancy::DiscrepancyResolver;
use crate::services::messaging::Messenger;
use crate::services::requirement_store::StatusChange;
use crate::services::traceability::{TraceabilityEngine, EVENT_BATCH};
use crate::services::work_scheduler::WorkScheduler;

/// Everything one owner cycle did.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub phase_before: Phase,
    pub phase_after: Phase,
    /// RFIs read from the owner inbox, for the owner to answer
    pub rfis: Vec<Message>,
    pub findings_created: Vec<Finding>,
    pub agreements: usize,
    pub enqueued: Vec<WorkItem>,
    pub status_changes: Vec<StatusChange>,
    pub corrective: Vec<WorkItem>,
    pub closed: Vec<RequirementId>,
    pub report: ConvergenceReport,
}

#[derive(Clone)]
pub struct OwnerCycle {
    messenger: Messenger,
    resolver: DiscrepancyResolver,
    trace: TraceabilityEngine,
    scheduler: WorkScheduler,
    gate: ConvergenceGate,
}

impl OwnerCycle {
    pub fn new(repos: Repositories, config: SchedulerConfig) -> Self {
        Self {
            messenger: Messenger::new(repos.clone()),
            resolver: DiscrepancyResolver::new(repos.clone()),
            trace: TraceabilityEngine::new(repos.clone()),
            scheduler: WorkScheduler::new(repos.clone(), config),
            gate: ConvergenceGate::new(repos, config),
        }
    }

    /// Run one cycle.
    ///
    /// Order: bootstrap detection, inbox, discrepancy resolution, matrix
    /// recomputation, queue replenishment, phase evaluation. An orphan work
    /// item aborts the cycle before anything is enqueued. The owner inbox is
    /// only marked consumed once every step has succeeded, so a failed cycle
    /// leaves its messages for the next one.
    #[instrument(skip(self))]
    pub async fn run(&self) -> DomainResult<CycleReport> {
        let phase_before = self.gate.detect_bootstrap().await?;

        let unread = self.messenger.inbox(Actor::Owner, false).await?;

        let resolution = self.resolver.resolve_pending(Actor::Owner).await?;

        let mut status_changes: Vec<StatusChange> = self
            .trace
            .recompute_all()
            .await?
            .into_iter()
            .flat_map(|r| r.changes)
            .collect();
        self.trace.consume_events(EVENT_BATCH).await?;

        let mut enqueued = Vec::new();
        if matches!(self.gate.phase().await?, Phase::Planning | Phase::Convergence) {
            for kind in WorkKind::ALL {
                enqueued.extend(self.scheduler.replenish(Actor::Owner, kind).await?);
            }
            if !enqueued.is_empty() {
                // design assignment moved requirements OPEN -> ASSIGNED
                self.trace.consume_events(EVENT_BATCH).await?;
            }
        }

        let outcome = self.gate.evaluate(Actor::Owner).await?;
        status_changes.extend(outcome.closed.iter().map(|id| StatusChange {
            requirement_id: *id,
            from: RequirementStatus::Verified,
            to: RequirementStatus::Closed,
        }));

        let rfis: Vec<Message> = self
            .messenger
            .acknowledge(Actor::Owner, &unread)
            .await?
            .into_iter()
            .filter(|m| m.kind == MessageKind::Rfi)
            .collect();

        info!(
            phase = %outcome.to,
            rfis = rfis.len(),
            findings = resolution.findings.len(),
            enqueued = enqueued.len(),
            blockers = outcome.report.blockers.len(),
            "owner cycle complete"
        );

        Ok(CycleReport {
            phase_before,
            phase_after: outcome.to,
            rfis,
            findings_created: resolution.findings,
            agreements: resolution.agreements,
            enqueued,
            status_changes,
            corrective: outcome.corrective,
            closed: outcome.closed,
            report: outcome.report,
        })
    }
}
