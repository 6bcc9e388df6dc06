//! Application services.
//!
//! Each service wraps the shared [`Repositories`](crate::domain::ports::Repositories)
//! and enforces the write-ownership rules of one slice of the protocol.

pub mod claims_file;
pub mod convergence_gate;
pub mod discrepancy;
pub mod messaging;
pub mod owner_cycle;
pub mod producer_desk;
pub mod requirement_store;
pub mod traceability;
pub mod work_scheduler;

pub use claims_file::ClaimsFile;
pub use convergence_gate::{Blocker, ConvergenceGate, ConvergenceReport, GateOutcome};
pub use discrepancy::{classify, relative_delta, Classification, DiscrepancyResolver, ResolutionReport};
pub use messaging::Messenger;
pub use owner_cycle::{CycleReport, OwnerCycle};
pub use producer_desk::{Completion, ProducerDesk};
pub use requirement_store::{RequirementStore, StatusChange};
pub use traceability::{Derivation, Recomputed, TraceabilityEngine};
pub use work_scheduler::{QueueEntry, WorkScheduler};
