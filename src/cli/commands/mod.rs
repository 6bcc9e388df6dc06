//! CLI command implementations.

pub mod cycle;
pub mod decision;
pub mod finding;
pub mod init;
pub mod message;
pub mod queue;
pub mod req;
pub mod signal;
pub mod status;
pub mod trace;
pub mod work;
