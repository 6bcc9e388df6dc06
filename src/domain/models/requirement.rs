//! Requirement domain model.
//!
//! A requirement is one atomic, testable "shall" statement decomposed from an
//! external parent clause. Its id and parent never change; only the owner may
//! edit its text, rationale, method, priority or threshold.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use super::ids::RequirementId;
use crate::domain::errors::{DomainError, DomainResult};

/// Lifecycle status of a requirement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequirementStatus {
    /// Decomposed, no work assigned yet
    #[default]
    Open,
    /// A design item is outstanding, or the requirement regressed
    Assigned,
    /// A completed design exists
    Designed,
    /// Independent verification passed with no open findings
    Verified,
    /// Closed out at the final audit
    Closed,
}

impl RequirementStatus {
    pub const ALL: [Self; 5] = [
        Self::Open,
        Self::Assigned,
        Self::Designed,
        Self::Verified,
        Self::Closed,
    ];

    /// Statuses that keep the sprint from converging.
    pub const UNSETTLED: [Self; 3] = [Self::Open, Self::Assigned, Self::Designed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Assigned => "ASSIGNED",
            Self::Designed => "DESIGNED",
            Self::Verified => "VERIFIED",
            Self::Closed => "CLOSED",
        }
    }

    /// Whether this status counts as settled for convergence.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Verified | Self::Closed)
    }

    /// Direct successors in the lifecycle graph.
    ///
    /// The forward chain is OPEN → ASSIGNED → DESIGNED → VERIFIED → CLOSED;
    /// DESIGNED and VERIFIED may also regress to ASSIGNED.
    pub fn valid_transitions(&self) -> &'static [RequirementStatus] {
        match self {
            Self::Open => &[Self::Assigned],
            Self::Assigned => &[Self::Designed],
            Self::Designed => &[Self::Verified, Self::Assigned],
            Self::Verified => &[Self::Closed, Self::Assigned],
            Self::Closed => &[],
        }
    }

    pub fn can_transition_to(&self, next: Self) -> bool {
        self.valid_transitions().contains(&next)
    }

    /// Shortest sequence of single-edge steps from `self` to `target`,
    /// excluding `self`. `Some(vec![])` when already there, `None` when
    /// the target is unreachable.
    pub fn path_to(&self, target: Self) -> Option<Vec<Self>> {
        let mut frontier = vec![(*self, Vec::new())];
        let mut seen = vec![*self];
        while !frontier.is_empty() {
            let mut next_frontier = Vec::new();
            for (status, path) in frontier {
                if status == target {
                    return Some(path);
                }
                for next in status.valid_transitions() {
                    if !seen.contains(next) {
                        seen.push(*next);
                        let mut extended = path.clone();
                        extended.push(*next);
                        next_frontier.push((*next, extended));
                    }
                }
            }
            frontier = next_frontier;
        }
        None
    }
}

impl fmt::Display for RequirementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequirementStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "OPEN" => Ok(Self::Open),
            "ASSIGNED" => Ok(Self::Assigned),
            "DESIGNED" => Ok(Self::Designed),
            "VERIFIED" => Ok(Self::Verified),
            "CLOSED" => Ok(Self::Closed),
            other => Err(DomainError::ValidationFailed(format!("unknown status: {other}"))),
        }
    }
}

/// How a requirement is to be verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationMethod {
    Inspection,
    Analysis,
    Simulation,
    Demonstration,
}

impl VerificationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inspection => "inspection",
            Self::Analysis => "analysis",
            Self::Simulation => "simulation",
            Self::Demonstration => "demonstration",
        }
    }
}

impl fmt::Display for VerificationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerificationMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "inspection" | "i" => Ok(Self::Inspection),
            "analysis" | "a" => Ok(Self::Analysis),
            "simulation" | "s" => Ok(Self::Simulation),
            "demonstration" | "d" => Ok(Self::Demonstration),
            other => Err(DomainError::ValidationFailed(format!(
                "unknown verification method: {other}"
            ))),
        }
    }
}

/// MoSCoW priority. Ordering puts `Must` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Must = 1,
    Should = 2,
    Could = 3,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Must => "must",
            Self::Should => "should",
            Self::Could => "could",
        }
    }

    /// Sort rank used by the scheduler (lower runs first).
    pub fn rank(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "must" => Ok(Self::Must),
            "should" => Ok(Self::Should),
            "could" => Ok(Self::Could),
            other => Err(DomainError::ValidationFailed(format!("unknown priority: {other}"))),
        }
    }
}

/// Numeric acceptance band for a requirement's measured parameter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl Threshold {
    pub fn admits(&self, value: f64) -> bool {
        self.min.is_none_or(|min| value >= min) && self.max.is_none_or(|max| value <= max)
    }

    /// Parse `"MIN..MAX[ UNIT]"`, where either bound may be omitted.
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let raw = raw.trim();
        let (range, unit) = match raw.split_once(char::is_whitespace) {
            Some((range, unit)) => (range, Some(unit.trim().to_string())),
            None => (raw, None),
        };
        let (lo, hi) = range.split_once("..").ok_or_else(|| {
            DomainError::ValidationFailed(format!("threshold must look like MIN..MAX: {raw}"))
        })?;
        let bound = |s: &str| -> DomainResult<Option<f64>> {
            if s.is_empty() {
                return Ok(None);
            }
            s.parse::<f64>()
                .map(Some)
                .map_err(|_| DomainError::ValidationFailed(format!("invalid threshold bound: {s}")))
        };
        let threshold = Self { min: bound(lo)?, max: bound(hi)?, unit };
        if threshold.min.is_none() && threshold.max.is_none() {
            return Err(DomainError::ValidationFailed("threshold needs at least one bound".into()));
        }
        if let (Some(min), Some(max)) = (threshold.min, threshold.max) {
            if min > max {
                return Err(DomainError::ValidationFailed(format!(
                    "threshold min {min} exceeds max {max}"
                )));
            }
        }
        Ok(threshold)
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lo = self.min.map(|v| v.to_string()).unwrap_or_default();
        let hi = self.max.map(|v| v.to_string()).unwrap_or_default();
        write!(f, "{lo}..{hi}")?;
        if let Some(unit) = &self.unit {
            write!(f, " {unit}")?;
        }
        Ok(())
    }
}

/// An atomic, independently verifiable requirement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub id: RequirementId,
    /// Reference to the immutable external source clause
    pub parent_ref: String,
    pub text: String,
    pub rationale: String,
    pub verification_method: VerificationMethod,
    pub priority: Priority,
    pub status: RequirementStatus,
    pub threshold: Option<Threshold>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a requirement.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRequirement {
    pub text: String,
    pub parent_ref: String,
    pub rationale: String,
    pub verification_method: VerificationMethod,
    pub priority: Priority,
    pub threshold: Option<Threshold>,
}

impl NewRequirement {
    pub fn new(
        text: impl Into<String>,
        parent_ref: impl Into<String>,
        verification_method: VerificationMethod,
        priority: Priority,
    ) -> Self {
        Self {
            text: text.into(),
            parent_ref: parent_ref.into(),
            rationale: String::new(),
            verification_method,
            priority,
            threshold: None,
        }
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = rationale.into();
        self
    }

    pub fn with_threshold(mut self, threshold: Threshold) -> Self {
        self.threshold = Some(threshold);
        self
    }
}

/// Owner edits to the mutable requirement fields. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequirementAmendment {
    pub text: Option<String>,
    pub rationale: Option<String>,
    pub verification_method: Option<VerificationMethod>,
    pub priority: Option<Priority>,
    pub threshold: Option<Threshold>,
}

impl RequirementAmendment {
    pub fn is_empty(&self) -> bool {
        self.text.is_none()
            && self.rationale.is_none()
            && self.verification_method.is_none()
            && self.priority.is_none()
            && self.threshold.is_none()
    }

    /// Names of the fields this amendment touches.
    pub fn fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.text.is_some() {
            fields.push("text");
        }
        if self.rationale.is_some() {
            fields.push("rationale");
        }
        if self.verification_method.is_some() {
            fields.push("verification_method");
        }
        if self.priority.is_some() {
            fields.push("priority");
        }
        if self.threshold.is_some() {
            fields.push("threshold");
        }
        fields
    }
}

/// Appended whenever a requirement is created or changes status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    /// Position in the durable event log
    pub seq: i64,
    pub requirement_id: RequirementId,
    /// `None` for the creation event
    pub from: Option<RequirementStatus>,
    pub to: RequirementStatus,
    pub at: DateTime<Utc>,
}

static RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bbetween\s+(\S+(?:\s+\S+)?)\s+and\s+").expect("static regex")
});
static CONJUNCTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+(?:and|or|as well as)\s+|;").expect("static regex"));
static MEASURABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\d|[≤≥<>±]|\bat (?:least|most)\b|\bno (?:more|less|greater|fewer) than\b|\b(?:less|greater|more|fewer) than\b|\bwithin\b|\bminimum\b|\bmaximum\b",
    )
    .expect("static regex")
});
static SHALL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bshall\b").expect("static regex"));

/// Normalised form used for duplicate detection under a parent.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches('.')
        .to_lowercase()
}

/// Reject text that joins two independently measurable conditions.
///
/// Numeric ranges (`between 150 and 300 °C`) are one condition, not two.
pub fn validate_atomic(text: &str) -> DomainResult<()> {
    let normalized = normalize_text(text);
    if normalized.is_empty() {
        return Err(DomainError::ValidationFailed("requirement text cannot be empty".into()));
    }

    let shall_count = SHALL_RE.find_iter(&normalized).count();
    if shall_count > 1 {
        return Err(DomainError::CompoundRequirement {
            text: text.to_string(),
            clauses: shall_count,
        });
    }

    let collapsed = RANGE_RE.replace_all(&normalized, "between $1 to ");
    let measurable = CONJUNCTION_RE
        .split(&collapsed)
        .filter(|clause| MEASURABLE_RE.is_match(clause))
        .count();
    if measurable > 1 {
        return Err(DomainError::CompoundRequirement {
            text: text.to_string(),
            clauses: measurable,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_edges() {
        use RequirementStatus::*;
        assert!(Open.can_transition_to(Assigned));
        assert!(!Open.can_transition_to(Designed));
        assert!(Designed.can_transition_to(Assigned));
        assert!(Verified.can_transition_to(Assigned));
        assert!(!Assigned.can_transition_to(Open));
        assert!(Closed.valid_transitions().is_empty());
    }

    #[test]
    fn test_new_requirements_start_open() {
        assert_eq!(RequirementStatus::default(), RequirementStatus::Open);
    }

    #[test]
    fn test_path_to_walks_forward_and_through_regression() {
        use RequirementStatus::*;
        assert_eq!(Open.path_to(Verified), Some(vec![Assigned, Designed, Verified]));
        assert_eq!(Verified.path_to(Designed), Some(vec![Assigned, Designed]));
        assert_eq!(Designed.path_to(Designed), Some(vec![]));
        assert_eq!(Assigned.path_to(Open), None);
        assert_eq!(Closed.path_to(Assigned), None);
    }

    #[test]
    fn test_priority_orders_must_first() {
        let mut priorities = vec![Priority::Could, Priority::Must, Priority::Should];
        priorities.sort();
        assert_eq!(priorities, vec![Priority::Must, Priority::Should, Priority::Could]);
    }

    #[test]
    fn test_atomic_requirement_accepted() {
        assert!(validate_atomic("The thruster shall produce 1.0 N ± 0.05 N at nominal feed pressure").is_ok());
        assert!(validate_atomic("The catalyst bed shall be preheated to between 150 and 300 °C").is_ok());
        assert!(validate_atomic("The valve shall open and close within 50 ms").is_ok());
    }

    #[test]
    fn test_compound_requirement_rejected() {
        let err = validate_atomic("The thruster shall produce 1.0 N thrust and an Isp of at least 220 s")
            .unwrap_err();
        assert!(matches!(err, DomainError::CompoundRequirement { clauses: 2, .. }));

        let err = validate_atomic("The heater shall draw ≤ 15 W; the bed shall reach 150 °C").unwrap_err();
        assert!(matches!(err, DomainError::CompoundRequirement { .. }));
    }

    #[test]
    fn test_empty_text_rejected() {
        assert!(matches!(validate_atomic("   "), Err(DomainError::ValidationFailed(_))));
    }

    #[test]
    fn test_threshold_parse_and_admit() {
        let t = Threshold::parse("0.95..1.05 N").unwrap();
        assert_eq!(t.unit.as_deref(), Some("N"));
        assert!(t.admits(1.0));
        assert!(!t.admits(1.10));

        let lower_only = Threshold::parse("220..").unwrap();
        assert!(lower_only.admits(230.0));
        assert!(!lower_only.admits(219.9));

        let upper_only = Threshold::parse("..15 W").unwrap();
        assert!(upper_only.admits(15.0));
        assert!(upper_only.admits(-3.0));
        assert!(!upper_only.admits(15.1));

        assert!(Threshold::parse("..").is_err());
        assert!(Threshold::parse("5..1").is_err());
        assert_eq!(Threshold::parse("..15 W").unwrap().to_string(), "..15 W");
    }
}
