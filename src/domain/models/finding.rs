//! Findings raised when design and verification disagree.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ids::{FindingId, RequirementId};
use crate::domain::errors::DomainError;

/// How serious a discrepancy is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(DomainError::ValidationFailed(format!("unknown severity: {other}"))),
        }
    }
}

/// The owner's judgment on a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Disposition {
    /// Awaiting an owner decision
    Open,
    /// Both sides satisfy the requirement; the magnitude difference is tolerated
    Accepted,
    /// Root cause found and corrected; newer evidence supersedes
    Closed,
    /// Requirement partially met under a documented exception
    Waived,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Accepted => "ACCEPTED",
            Self::Closed => "CLOSED",
            Self::Waived => "WAIVED",
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Disposition {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "OPEN" => Ok(Self::Open),
            "ACCEPTED" | "ACCEPT" => Ok(Self::Accepted),
            "CLOSED" | "CLOSE" => Ok(Self::Closed),
            "WAIVED" | "WAIVE" => Ok(Self::Waived),
            other => Err(DomainError::ValidationFailed(format!("unknown disposition: {other}"))),
        }
    }
}

/// A recorded disagreement or failure between two independently produced claims.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub id: FindingId,
    pub requirement_ids: Vec<RequirementId>,
    pub parameter: String,
    /// Design claim, absent when verification failed without a design counterpart
    pub claim_design: Option<f64>,
    pub claim_verification: f64,
    /// Relative delta in percent, when both claims exist
    pub delta_pct: Option<f64>,
    pub severity: Severity,
    pub disposition: Disposition,
    pub summary: String,
    /// Evidence rows that produced this finding
    pub design_evidence_id: Option<i64>,
    pub verification_evidence_id: i64,
    pub created_at: DateTime<Utc>,
    pub dispositioned_at: Option<DateTime<Utc>>,
}

impl Finding {
    pub fn references(&self, requirement: RequirementId) -> bool {
        self.requirement_ids.contains(&requirement)
    }
}

/// A finding about to be persisted; the repository assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFinding {
    pub requirement_ids: Vec<RequirementId>,
    pub parameter: String,
    pub claim_design: Option<f64>,
    pub claim_verification: f64,
    pub delta_pct: Option<f64>,
    pub severity: Severity,
    pub summary: String,
    pub design_evidence_id: Option<i64>,
    pub verification_evidence_id: i64,
}
