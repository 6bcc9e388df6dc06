//! SQLite adapters for the triad record store.

pub mod connection;
pub mod coordination_repository;
pub mod finding_repository;
pub mod ledger_repository;
pub mod migrations;
pub mod requirement_repository;
pub mod trace_repository;
pub mod work_item_repository;

pub use connection::{memory_store, open_store, ping, ConnectionError, BUSY_TIMEOUT};
pub use coordination_repository::SqliteCoordinationRepository;
pub use finding_repository::SqliteFindingRepository;
pub use ledger_repository::{SqliteDecisionRepository, SqliteMessageRepository};
pub use migrations::{migrate, MigrationError, MigrationReport, SchemaStep, SCHEMA, SCHEMA_VERSION};
pub use requirement_repository::SqliteRequirementRepository;
pub use trace_repository::SqliteTraceRepository;
pub use work_item_repository::SqliteWorkItemRepository;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{DatabaseConfig, FindingId, RequirementId};
use crate::domain::ports::Repositories;

/// Parse a UUID string from a SQLite row field.
pub fn parse_uuid(s: &str) -> DomainResult<Uuid> {
    Uuid::parse_str(s).map_err(|e| DomainError::SerializationError(e.to_string()))
}

/// Parse an RFC3339 datetime string from a SQLite row field.
pub fn parse_datetime(s: &str) -> DomainResult<DateTime<Utc>> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map_err(|e| DomainError::SerializationError(e.to_string()))
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse an optional RFC3339 datetime string from a SQLite row field.
pub fn parse_optional_datetime(s: Option<String>) -> DomainResult<Option<DateTime<Utc>>> {
    s.as_deref().map(parse_datetime).transpose()
}

/// Parse a JSON string from a SQLite row field, falling back to the type's default.
pub fn parse_json_or_default<T: serde::de::DeserializeOwned + Default>(s: Option<String>) -> DomainResult<T> {
    s.map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(|e| DomainError::SerializationError(e.to_string()))
        .map(Option::unwrap_or_default)
}

pub fn parse_requirement_id(raw: i64) -> DomainResult<RequirementId> {
    u32::try_from(raw)
        .ok()
        .filter(|seq| *seq > 0)
        .map(RequirementId)
        .ok_or_else(|| DomainError::SerializationError(format!("invalid stored requirement id: {raw}")))
}

pub fn parse_finding_id(raw: i64) -> DomainResult<FindingId> {
    u32::try_from(raw)
        .ok()
        .map(FindingId)
        .ok_or_else(|| DomainError::SerializationError(format!("invalid stored finding id: {raw}")))
}

/// `?, ?, ?` for an IN clause of `n` values.
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
    #[error("Migration error: {0}")]
    Migration(#[from] MigrationError),
    #[error("Query error: {0}")]
    Query(#[from] sqlx::Error),
}

/// Open the configured record store and bring its schema up to date.
pub async fn initialize_database(config: &DatabaseConfig) -> Result<SqlitePool, DatabaseError> {
    let pool = open_store(config).await?;
    migrate(&pool).await?;
    Ok(pool)
}

/// In-memory record store with every migration applied.
pub async fn create_migrated_test_pool() -> Result<SqlitePool, DatabaseError> {
    let pool = memory_store().await?;
    migrate(&pool).await?;
    Ok(pool)
}

/// Wire every port to its SQLite implementation over one pool.
pub fn sqlite_repositories(pool: &SqlitePool) -> Repositories {
    Repositories {
        requirements: Arc::new(SqliteRequirementRepository::new(pool.clone())),
        work_items: Arc::new(SqliteWorkItemRepository::new(pool.clone())),
        findings: Arc::new(SqliteFindingRepository::new(pool.clone())),
        traces: Arc::new(SqliteTraceRepository::new(pool.clone())),
        decisions: Arc::new(SqliteDecisionRepository::new(pool.clone())),
        messages: Arc::new(SqliteMessageRepository::new(pool.clone())),
        coordination: Arc::new(SqliteCoordinationRepository::new(pool.clone())),
    }
}
