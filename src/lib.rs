//! Triad - requirements traceability coordinator
//!
//! Coordinates three cooperating actors through a shared durable record
//! store: a requirements owner, a design producer and an independent
//! verification producer. The owner decomposes external clauses into atomic
//! requirements, hands out design and verification work, reconciles the two
//! sides' numeric claims and closes the sprint once every requirement is
//! verified with complete traceability.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, errors and repository ports
//! - **Adapters** (`adapters`): SQLite implementations of the ports
//! - **Service Layer** (`services`): requirement store, scheduler,
//!   traceability, discrepancy resolution, convergence gate, owner cycle
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```no_run
//! use triad::adapters::sqlite::{initialize_database, sqlite_repositories};
//! use triad::domain::models::{DatabaseConfig, SchedulerConfig};
//! use triad::services::OwnerCycle;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let pool = initialize_database(&DatabaseConfig::default()).await?;
//! let report = OwnerCycle::new(sqlite_repositories(&pool), SchedulerConfig::default())
//!     .run()
//!     .await?;
//! println!("phase is now {}", report.phase_after);
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::models::{
    Actor, Config, Finding, Phase, Requirement, RequirementId, RequirementStatus, TraceRow, WorkItem,
    WorkItemId, WorkKind,
};
pub use domain::{DomainError, DomainResult};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    ConvergenceGate, DiscrepancyResolver, OwnerCycle, ProducerDesk, RequirementStore, TraceabilityEngine,
    WorkScheduler,
};
