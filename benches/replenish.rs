//! Replenishment and owner-cycle throughput over an in-memory store.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;

use triad::adapters::sqlite::{create_migrated_test_pool, sqlite_repositories};
use triad::domain::models::{Actor, NewRequirement, Priority, SchedulerConfig, VerificationMethod, WorkKind};
use triad::domain::ports::Repositories;
use triad::services::{ConvergenceGate, OwnerCycle, RequirementStore, WorkScheduler};

const PRIORITIES: [Priority; 3] = [Priority::Must, Priority::Should, Priority::Could];

async fn seeded(count: usize) -> Repositories {
    let pool = create_migrated_test_pool().await.expect("pool");
    let repos = sqlite_repositories(&pool);
    let store = RequirementStore::new(repos.clone());
    for i in 0..count {
        store
            .create(
                Actor::Owner,
                NewRequirement::new(
                    format!("Unit {i} shall weigh 4 kg"),
                    format!("SOW {i}"),
                    VerificationMethod::Inspection,
                    PRIORITIES[i % PRIORITIES.len()],
                ),
            )
            .await
            .expect("requirement");
    }
    ConvergenceGate::new(repos.clone(), SchedulerConfig::default())
        .initialize_queues()
        .await
        .expect("queues");
    repos
}

fn bench_replenish(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");
    let mut group = c.benchmark_group("replenish_design");

    for count in [10usize, 100, 500] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.to_async(&rt).iter_custom(|iters| async move {
                let mut elapsed = Duration::ZERO;
                for _ in 0..iters {
                    let repos = seeded(count).await;
                    let config = SchedulerConfig { target_floor: count, batch_cap: count };
                    let scheduler = WorkScheduler::new(repos, config);
                    let start = Instant::now();
                    black_box(scheduler.replenish(Actor::Owner, WorkKind::Design).await.expect("replenish"));
                    elapsed += start.elapsed();
                }
                elapsed
            });
        });
    }
    group.finish();
}

fn bench_owner_cycle(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");
    c.bench_function("owner_cycle_first_pass_100", |b| {
        b.to_async(&rt).iter_custom(|iters| async move {
            let mut elapsed = Duration::ZERO;
            for _ in 0..iters {
                let cycle = OwnerCycle::new(seeded(100).await, SchedulerConfig::default());
                let start = Instant::now();
                black_box(cycle.run().await.expect("cycle"));
                elapsed += start.elapsed();
            }
            elapsed
        });
    });
}

criterion_group!(benches, bench_replenish, bench_owner_cycle);
criterion_main!(benches);
