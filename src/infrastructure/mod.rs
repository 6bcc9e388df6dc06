//! Infrastructure layer module
//!
//! Configuration loading and logging setup. Storage adapters live under
//! [`crate::adapters`].

pub mod config;
pub mod logging;
