//! Traceability rows.

use serde::{Deserialize, Serialize};

use super::ids::{RequirementId, WorkItemId};
use super::requirement::RequirementStatus;

/// Derived linkage of a requirement to its design and verification coverage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceRow {
    pub requirement_id: RequirementId,
    pub design_ref: Option<WorkItemId>,
    pub verification_ref: Option<WorkItemId>,
    pub status: RequirementStatus,
}

impl TraceRow {
    pub fn empty(requirement_id: RequirementId, status: RequirementStatus) -> Self {
        Self {
            requirement_id,
            design_ref: None,
            verification_ref: None,
            status,
        }
    }

    /// The coverage gap on this row, if any.
    pub fn gap(&self) -> Option<GapKind> {
        match (self.design_ref.is_some(), self.verification_ref.is_some()) {
            (true, true) => None,
            (false, true) => Some(GapKind::MissingDesign),
            (true, false) => Some(GapKind::MissingVerification),
            (false, false) => Some(GapKind::MissingBoth),
        }
    }

    /// An empty verification ref with a design ref only fits ASSIGNED or DESIGNED.
    pub fn is_consistent(&self) -> bool {
        if self.design_ref.is_some() && self.verification_ref.is_none() {
            return matches!(
                self.status,
                RequirementStatus::Assigned | RequirementStatus::Designed
            );
        }
        true
    }
}

/// Which references a trace row is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapKind {
    MissingDesign,
    MissingVerification,
    MissingBoth,
}

impl GapKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingDesign => "missing design ref",
            Self::MissingVerification => "missing verification ref",
            Self::MissingBoth => "missing design and verification refs",
        }
    }

    pub fn needs_design(&self) -> bool {
        matches!(self, Self::MissingDesign | Self::MissingBoth)
    }

    pub fn needs_verification(&self) -> bool {
        matches!(self, Self::MissingVerification | Self::MissingBoth)
    }
}

/// A requirement whose trace row is incomplete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceGap {
    pub requirement_id: RequirementId,
    pub kind: GapKind,
    pub status: RequirementStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::WorkKind;

    #[test]
    fn test_gap_kinds() {
        let mut row = TraceRow::empty(RequirementId(1), RequirementStatus::Open);
        assert_eq!(row.gap(), Some(GapKind::MissingBoth));

        row.design_ref = Some(WorkItemId::new(WorkKind::Design, 1));
        assert_eq!(row.gap(), Some(GapKind::MissingVerification));

        row.verification_ref = Some(WorkItemId::new(WorkKind::Verify, 1));
        assert_eq!(row.gap(), None);
    }

    #[test]
    fn test_design_without_verification_must_not_be_verified() {
        let mut row = TraceRow::empty(RequirementId(2), RequirementStatus::Designed);
        row.design_ref = Some(WorkItemId::new(WorkKind::Design, 1));
        assert!(row.is_consistent());
        row.status = RequirementStatus::Verified;
        assert!(!row.is_consistent());
    }
}
