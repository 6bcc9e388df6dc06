//! Stable, human-readable identifiers.
//!
//! Requirements, work items and findings are numbered sequentially and
//! rendered with a fixed prefix (`REQ-001`, `DES-004`, `VER-002`, `FND-010`).
//! The numeric part is what gets stored; the prefix is presentation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::errors::DomainError;

fn parse_prefixed(s: &str, prefix: &str) -> Option<u32> {
    let trimmed = s.trim();
    let (head, tail) = trimmed.split_once('-')?;
    if !head.eq_ignore_ascii_case(prefix) {
        return None;
    }
    let seq: u32 = tail.parse().ok()?;
    (seq > 0).then_some(seq)
}

/// Identifier of a requirement (`REQ-001`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RequirementId(pub u32);

impl RequirementId {
    pub const PREFIX: &'static str = "REQ";

    pub fn seq(self) -> u32 {
        self.0
    }
}

impl fmt::Display for RequirementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:03}", Self::PREFIX, self.0)
    }
}

impl FromStr for RequirementId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_prefixed(s, Self::PREFIX)
            .map(Self)
            .ok_or_else(|| DomainError::ValidationFailed(format!("invalid requirement id: {s}")))
    }
}

impl TryFrom<String> for RequirementId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RequirementId> for String {
    fn from(id: RequirementId) -> Self {
        id.to_string()
    }
}

/// Which downstream queue a work item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkKind {
    Design,
    Verify,
}

impl WorkKind {
    pub const ALL: [Self; 2] = [Self::Design, Self::Verify];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Design => "design",
            Self::Verify => "verify",
        }
    }

    /// Id prefix for items of this kind.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Design => "DES",
            Self::Verify => "VER",
        }
    }
}

impl fmt::Display for WorkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "design" | "des" => Ok(Self::Design),
            "verify" | "verification" | "ver" => Ok(Self::Verify),
            other => Err(DomainError::ValidationFailed(format!("unknown queue: {other}"))),
        }
    }
}

/// Identifier of a work item (`DES-001`, `VER-001`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WorkItemId {
    pub kind: WorkKind,
    pub seq: u32,
}

impl WorkItemId {
    pub fn new(kind: WorkKind, seq: u32) -> Self {
        Self { kind, seq }
    }
}

impl fmt::Display for WorkItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:03}", self.kind.prefix(), self.seq)
    }
}

impl FromStr for WorkItemId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WorkKind::ALL
            .iter()
            .find_map(|kind| parse_prefixed(s, kind.prefix()).map(|seq| Self::new(*kind, seq)))
            .ok_or_else(|| DomainError::ValidationFailed(format!("invalid work item id: {s}")))
    }
}

impl TryFrom<String> for WorkItemId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<WorkItemId> for String {
    fn from(id: WorkItemId) -> Self {
        id.to_string()
    }
}

/// Identifier of a finding (`FND-001`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FindingId(pub u32);

impl FindingId {
    pub const PREFIX: &'static str = "FND";
}

impl fmt::Display for FindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:03}", Self::PREFIX, self.0)
    }
}

impl FromStr for FindingId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_prefixed(s, Self::PREFIX)
            .map(Self)
            .ok_or_else(|| DomainError::ValidationFailed(format!("invalid finding id: {s}")))
    }
}

impl TryFrom<String> for FindingId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FindingId> for String {
    fn from(id: FindingId) -> Self {
        id.to_string()
    }
}

/// One of the three cooperating actors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    /// The requirements owner; sole writer of requirement fields and dispositions.
    Owner,
    /// The design producer; consumes DESIGN work items.
    Design,
    /// The verification producer; consumes VERIFY work items.
    Verification,
}

impl Actor {
    pub const ALL: [Self; 3] = [Self::Owner, Self::Design, Self::Verification];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Design => "design",
            Self::Verification => "verification",
        }
    }

    /// The work kind this actor consumes, if it is a producer.
    pub fn consumes(&self) -> Option<WorkKind> {
        match self {
            Self::Owner => None,
            Self::Design => Some(WorkKind::Design),
            Self::Verification => Some(WorkKind::Verify),
        }
    }

    /// Reject a write to `field` unless `self` is its `writer`.
    pub fn ensure_writes(self, writer: Actor, field: &str) -> Result<(), DomainError> {
        if self == writer {
            Ok(())
        } else {
            Err(DomainError::OwnershipViolation {
                actor: self,
                field: field.to_string(),
            })
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Actor {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "owner" | "requirements" => Ok(Self::Owner),
            "design" => Ok(Self::Design),
            "verification" | "verify" => Ok(Self::Verification),
            other => Err(DomainError::ValidationFailed(format!("unknown actor: {other}"))),
        }
    }
}
