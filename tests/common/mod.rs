//! Common test utilities for integration tests
//!
//! A [`Harness`] wires every service over one in-memory migrated database
//! and offers short helpers that play the two producers.

#![allow(dead_code)]

use triad::adapters::sqlite::{create_migrated_test_pool, sqlite_repositories};
use triad::domain::models::{
    Actor, Claim, NewRequirement, Outcome, Priority, RequirementId, SchedulerConfig,
    VerificationMethod, WorkItem, WorkItemId, WorkKind,
};
use triad::domain::ports::Repositories;
use triad::services::{
    ConvergenceGate, DiscrepancyResolver, Messenger, OwnerCycle, ProducerDesk, RequirementStore,
    TraceabilityEngine, WorkScheduler,
};

pub const PARAMETER: &str = "thrust_N";

pub struct Harness {
    pub repos: Repositories,
    pub store: RequirementStore,
    pub scheduler: WorkScheduler,
    pub desk: ProducerDesk,
    pub resolver: DiscrepancyResolver,
    pub trace: TraceabilityEngine,
    pub gate: ConvergenceGate,
    pub messenger: Messenger,
    pub cycle: OwnerCycle,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(SchedulerConfig::default()).await
    }

    pub async fn with_config(config: SchedulerConfig) -> Self {
        let pool = create_migrated_test_pool().await.expect("test pool");
        let repos = sqlite_repositories(&pool);
        let harness = Self {
            store: RequirementStore::new(repos.clone()),
            scheduler: WorkScheduler::new(repos.clone(), config),
            desk: ProducerDesk::new(repos.clone()),
            resolver: DiscrepancyResolver::new(repos.clone()),
            trace: TraceabilityEngine::new(repos.clone()),
            gate: ConvergenceGate::new(repos.clone(), config),
            messenger: Messenger::new(repos.clone()),
            cycle: OwnerCycle::new(repos.clone(), config),
            repos,
        };
        harness.gate.initialize_queues().await.expect("queues");
        harness
    }

    /// Create a requirement under its own parent clause.
    pub async fn requirement(&self, text: &str, priority: Priority) -> RequirementId {
        let parent = format!("SOW {}", self.store.list().await.expect("list").len() + 1);
        self.store
            .create(
                Actor::Owner,
                NewRequirement::new(text, parent, VerificationMethod::Simulation, priority),
            )
            .await
            .expect("create requirement")
            .id
    }

    /// Replenish `kind` and return the new item tracing `requirement`.
    pub async fn assign(&self, kind: WorkKind, requirement: RequirementId) -> WorkItem {
        let created = self.scheduler.replenish(Actor::Owner, kind).await.expect("replenish");
        created
            .into_iter()
            .find(|item| item.traces_to(requirement))
            .unwrap_or_else(|| panic!("no {kind} item enqueued for {requirement}"))
    }

    pub async fn complete_design(&self, item: WorkItemId, requirement: RequirementId, value: f64) {
        self.desk
            .complete(
                Actor::Design,
                item,
                Some("analysis/design.md"),
                vec![Claim::new(requirement, PARAMETER, value)],
            )
            .await
            .expect("complete design");
    }

    pub async fn complete_verification(
        &self,
        item: WorkItemId,
        requirement: RequirementId,
        value: f64,
        outcome: Outcome,
    ) {
        self.desk
            .complete(
                Actor::Verification,
                item,
                Some("sim/run.json"),
                vec![Claim::new(requirement, PARAMETER, value).with_outcome(outcome)],
            )
            .await
            .expect("complete verification");
    }

    /// The owner's bookkeeping between producer turns.
    pub async fn settle(&self) {
        self.resolver.resolve_pending(Actor::Owner).await.expect("resolve");
        self.trace.recompute_all().await.expect("recompute");
    }

    /// Drive a requirement from OPEN to VERIFIED with agreeing claims.
    pub async fn verify_fully(&self, requirement: RequirementId, value: f64) {
        let design = self.assign(WorkKind::Design, requirement).await;
        self.complete_design(design.id, requirement, value).await;
        self.settle().await;
        let verify = self.assign(WorkKind::Verify, requirement).await;
        self.complete_verification(verify.id, requirement, value, Outcome::Pass).await;
        self.settle().await;
    }

    /// Complete every unfinished item in both queues with agreeing claims.
    pub async fn drain_queues(&self, value: f64) {
        for kind in WorkKind::ALL {
            let actor = match kind {
                WorkKind::Design => Actor::Design,
                WorkKind::Verify => Actor::Verification,
            };
            for entry in self.scheduler.queue(kind, false).await.expect("queue") {
                let claims = entry
                    .item
                    .traces
                    .iter()
                    .map(|id| {
                        let claim = Claim::new(*id, PARAMETER, value);
                        match kind {
                            WorkKind::Design => claim,
                            WorkKind::Verify => claim.with_outcome(Outcome::Pass),
                        }
                    })
                    .collect();
                self.desk
                    .complete(actor, entry.item.id, Some("artifacts/run"), claims)
                    .await
                    .expect("complete queued item");
            }
        }
    }
}
