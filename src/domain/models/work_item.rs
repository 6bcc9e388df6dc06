//! Work items and the evidence producers attach when completing them.
//!
//! Work items are created by the owner, checked off and completed by the
//! producer whose queue they sit in, and never deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ids::{RequirementId, WorkItemId, WorkKind};
use super::requirement::{Requirement, VerificationMethod};
use crate::domain::errors::DomainError;

/// A checkable acceptance condition on a work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptanceCriterion {
    pub text: String,
    pub checked: bool,
}

impl AcceptanceCriterion {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), checked: false }
    }
}

/// A unit of design or verification work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: WorkItemId,
    /// Requirements this item traces to (at least one)
    pub traces: Vec<RequirementId>,
    pub deliverable: String,
    pub acceptance_criteria: Vec<AcceptanceCriterion>,
    /// Prerequisite design item for verification work
    pub blocked_by: Option<WorkItemId>,
    pub complete: bool,
    /// Reference to supporting artifacts, supplied on completion
    pub artifact_ref: Option<String>,
    /// Free-form reason recorded for corrective items
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl WorkItem {
    pub fn kind(&self) -> WorkKind {
        self.id.kind
    }

    pub fn traces_to(&self, requirement: RequirementId) -> bool {
        self.traces.contains(&requirement)
    }

    pub fn all_criteria_checked(&self) -> bool {
        self.acceptance_criteria.iter().all(|c| c.checked)
    }
}

/// Deliverable label and acceptance criteria for a new item of `kind`.
pub fn criteria_for(kind: WorkKind, requirement: &Requirement) -> (String, Vec<AcceptanceCriterion>) {
    match kind {
        WorkKind::Design => (
            "design artifact".to_string(),
            vec![
                AcceptanceCriterion::new(format!("Design addresses {}: {}", requirement.id, requirement.text)),
                AcceptanceCriterion::new("Claimed value reported for every measured parameter"),
                AcceptanceCriterion::new("Supporting artifact referenced"),
            ],
        ),
        WorkKind::Verify => {
            let method = match requirement.verification_method {
                VerificationMethod::Inspection => "Inspection record",
                VerificationMethod::Analysis => "Independent analysis",
                VerificationMethod::Simulation => "Independent simulation",
                VerificationMethod::Demonstration => "Demonstration record",
            };
            (
                format!("{} evidence", requirement.verification_method),
                vec![
                    AcceptanceCriterion::new(format!("{method} of {} without reuse of design outputs", requirement.id)),
                    AcceptanceCriterion::new("PASS/FAIL/PARTIAL outcome reported"),
                    AcceptanceCriterion::new("Independently derived value reported for every measured parameter"),
                ],
            )
        }
    }
}

/// Verification outcome against a requirement's threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Pass,
    Fail,
    Partial,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Partial => "PARTIAL",
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Outcome {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PASS" => Ok(Self::Pass),
            "FAIL" => Ok(Self::Fail),
            "PARTIAL" => Ok(Self::Partial),
            other => Err(DomainError::ValidationFailed(format!("unknown outcome: {other}"))),
        }
    }
}

/// A numeric claim supplied by a producer when completing an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    #[serde(alias = "requirement")]
    pub requirement_id: RequirementId,
    pub parameter: String,
    pub value: f64,
    #[serde(default)]
    pub outcome: Option<Outcome>,
}

impl Claim {
    pub fn new(requirement_id: RequirementId, parameter: impl Into<String>, value: f64) -> Self {
        Self {
            requirement_id,
            parameter: parameter.into(),
            value,
            outcome: None,
        }
    }

    pub fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = Some(outcome);
        self
    }
}

impl FromStr for Claim {
    type Err = DomainError;

    /// Parse `REQ-001:parameter=1.00[:PASS]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DomainError::ValidationFailed(format!("claim must look like REQ-001:param=1.0[:PASS]: {s}"));
        let mut parts = s.trim().splitn(3, ':');
        let requirement_id: RequirementId = parts.next().ok_or_else(invalid)?.parse()?;
        let (parameter, value) = parts.next().ok_or_else(invalid)?.split_once('=').ok_or_else(invalid)?;
        let value: f64 = value.trim().parse().map_err(|_| invalid())?;
        let outcome = parts.next().map(str::parse).transpose()?;
        if parameter.trim().is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            requirement_id,
            parameter: parameter.trim().to_string(),
            value,
            outcome,
        })
    }
}

/// A claim as recorded against a completed work item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub id: i64,
    pub work_item_id: WorkItemId,
    pub requirement_id: RequirementId,
    pub parameter: String,
    pub value: f64,
    /// Stated or threshold-derived compliance
    pub outcome: Outcome,
    /// Set by the owner once the discrepancy resolver has processed it
    pub resolved: bool,
    pub recorded_at: DateTime<Utc>,
}

impl Evidence {
    pub fn kind(&self) -> WorkKind {
        self.work_item_id.kind
    }
}
