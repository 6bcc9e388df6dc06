//! Domain layer for the triad coordinator
//!
//! Core models, the error taxonomy and the repository ports the services
//! depend on. Nothing here knows about SQLite or the CLI.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
