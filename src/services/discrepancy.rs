//! Discrepancy resolver.
//!
//! Pairs each new verification claim with the latest design claim for the
//! same requirement parameter and records a finding when they disagree by
//! the fixed tolerance or when verification reports non-compliance.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Actor, Decision, Disposition, Evidence, Finding, FindingId, Message, MessageKind, NewFinding,
    Outcome, Severity,
};
use crate::domain::ports::{FindingFilter, Repositories};

/// Relative disagreement at or above which a finding is raised.
pub const TOLERANCE: f64 = 0.05;

/// Relative disagreement at or above which a compliant pair is Medium.
pub const MEDIUM_DELTA: f64 = 0.10;

/// Absorbs decimal representation error at the boundaries.
const EPSILON: f64 = 1e-9;

/// `|a - b| / max(|a|, |b|)`; zero when both are zero.
pub fn relative_delta(a: f64, b: f64) -> f64 {
    let scale = a.abs().max(b.abs());
    if scale == 0.0 {
        return 0.0;
    }
    (a - b).abs() / scale
}

/// Outcome of comparing a verification claim against its design counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Classification {
    /// Both compliant and within tolerance, or nothing to compare against
    Agreement { delta: Option<f64> },
    Discrepancy { delta: Option<f64>, severity: Severity },
}

impl Classification {
    pub fn severity(&self) -> Option<Severity> {
        match self {
            Self::Agreement { .. } => None,
            Self::Discrepancy { severity, .. } => Some(*severity),
        }
    }
}

/// Classify a `(value, outcome)` verification claim against an optional design claim.
///
/// Deterministic and symmetric in the two values.
pub fn classify(design: Option<(f64, Outcome)>, verification: (f64, Outcome)) -> Classification {
    let (verified_value, verified_outcome) = verification;
    let delta = design.map(|(value, _)| relative_delta(value, verified_value));

    let severity = match (verified_outcome, design.map(|(_, outcome)| outcome)) {
        (Outcome::Fail, _) => Some(Severity::High),
        (Outcome::Partial, _) => Some(Severity::Medium),
        (Outcome::Pass, Some(design_outcome)) if !design_outcome.is_pass() => Some(Severity::High),
        _ => match delta {
            Some(d) if d >= MEDIUM_DELTA - EPSILON => Some(Severity::Medium),
            Some(d) if d >= TOLERANCE - EPSILON => Some(Severity::Low),
            _ => None,
        },
    };

    match severity {
        Some(severity) => Classification::Discrepancy { delta, severity },
        None => Classification::Agreement { delta },
    }
}

/// What one resolver pass produced.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolutionReport {
    pub findings: Vec<Finding>,
    pub agreements: usize,
    pub processed: usize,
}

#[derive(Clone)]
pub struct DiscrepancyResolver {
    repos: Repositories,
}

impl DiscrepancyResolver {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    /// Resolve every verification claim not yet processed. Each claim is
    /// resolved exactly once.
    pub async fn resolve_pending(&self, actor: Actor) -> DomainResult<ResolutionReport> {
        actor.ensure_writes(Actor::Owner, "finding creation")?;
        let pending = self.repos.work_items.unresolved_verification_evidence().await?;

        let mut report = ResolutionReport::default();
        for evidence in pending {
            let design = self
                .repos
                .work_items
                .latest_design_claim(evidence.requirement_id, &evidence.parameter)
                .await?;
            let classification = classify(
                design.as_ref().map(|d| (d.value, d.outcome)),
                (evidence.value, evidence.outcome),
            );

            match classification {
                Classification::Discrepancy { delta, severity } => {
                    let finding = self.raise(&evidence, design.as_ref(), delta, severity).await?;
                    report.findings.push(finding);
                }
                Classification::Agreement { delta: Some(delta) } => {
                    let decision = Decision::new(
                        Actor::Owner,
                        format!(
                            "Agreement on {} {}: delta {:.2}%",
                            evidence.requirement_id,
                            evidence.parameter,
                            delta * 100.0
                        ),
                        vec![evidence.requirement_id],
                    );
                    self.repos.decisions.append(&decision).await?;
                    report.agreements += 1;
                    debug!(requirement_id = %evidence.requirement_id, parameter = %evidence.parameter, delta, "claims agree");
                }
                Classification::Agreement { delta: None } => {
                    debug!(requirement_id = %evidence.requirement_id, parameter = %evidence.parameter, "no design claim to compare");
                }
            }

            self.repos.work_items.mark_evidence_resolved(evidence.id).await?;
            report.processed += 1;
        }

        if report.processed > 0 {
            info!(
                processed = report.processed,
                findings = report.findings.len(),
                agreements = report.agreements,
                "verification claims resolved"
            );
        }
        Ok(report)
    }

    async fn raise(
        &self,
        evidence: &Evidence,
        design: Option<&Evidence>,
        delta: Option<f64>,
        severity: Severity,
    ) -> DomainResult<Finding> {
        let delta_pct = delta.map(|d| d * 100.0);
        let summary = match (design, delta_pct) {
            (Some(design), Some(pct)) => format!(
                "{} {}: design {} ({}) vs verification {} ({}), delta {:.2}%",
                evidence.requirement_id,
                evidence.parameter,
                design.value,
                design.outcome,
                evidence.value,
                evidence.outcome,
                pct
            ),
            _ => format!(
                "{} {}: verification reported {} at {} with no design claim",
                evidence.requirement_id, evidence.parameter, evidence.outcome, evidence.value
            ),
        };

        let finding = self
            .repos
            .findings
            .insert(&NewFinding {
                requirement_ids: vec![evidence.requirement_id],
                parameter: evidence.parameter.clone(),
                claim_design: design.map(|d| d.value),
                claim_verification: evidence.value,
                delta_pct,
                severity,
                summary: summary.clone(),
                design_evidence_id: design.map(|d| d.id),
                verification_evidence_id: evidence.id,
            })
            .await?;

        let payload = format!("{} ({severity}): {summary}", finding.id);
        for producer in [Actor::Design, Actor::Verification] {
            let notice = Message::new(Actor::Owner, producer, MessageKind::Finding, payload.clone());
            self.repos.messages.insert(&notice).await?;
        }

        warn!(finding = %finding.id, requirement_id = %evidence.requirement_id, %severity, "finding raised");
        Ok(finding)
    }

    /// Record the owner's judgment on an OPEN finding.
    pub async fn set_disposition(
        &self,
        actor: Actor,
        id: FindingId,
        disposition: Disposition,
        rationale: &str,
    ) -> DomainResult<Finding> {
        actor.ensure_writes(Actor::Owner, "finding disposition")?;
        if disposition.is_open() {
            return Err(DomainError::ValidationFailed("a finding cannot be re-opened".into()));
        }

        let finding = self.get(id).await?;
        if !finding.disposition.is_open()
            || !self.repos.findings.set_disposition(id, disposition).await?
        {
            let current = self.get(id).await?.disposition;
            return Err(DomainError::InvalidDisposition { id, current: current.to_string() });
        }

        let decision = Decision::new(
            actor,
            format!("{id} dispositioned {disposition}"),
            finding.requirement_ids.clone(),
        )
        .with_rationale(rationale);
        self.repos.decisions.append(&decision).await?;

        info!(finding = %id, %disposition, "finding dispositioned");
        self.get(id).await
    }

    pub async fn get(&self, id: FindingId) -> DomainResult<Finding> {
        self.repos.findings.get(id).await?.ok_or(DomainError::FindingNotFound(id))
    }

    pub async fn list(&self, filter: FindingFilter) -> DomainResult<Vec<Finding>> {
        self.repos.findings.list(filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_delta() {
        assert!((relative_delta(1.0, 1.1) - 0.1 / 1.1).abs() < 1e-12);
        assert_eq!(relative_delta(0.0, 0.0), 0.0);
        assert!((relative_delta(-2.0, 2.0) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_exact_five_percent_is_a_discrepancy() {
        let c = classify(Some((1.00, Outcome::Pass)), (0.95, Outcome::Pass));
        assert_eq!(c.severity(), Some(Severity::Low));

        let c = classify(Some((1.00, Outcome::Pass)), (0.951, Outcome::Pass));
        assert_eq!(c.severity(), None);
    }

    #[test]
    fn test_severity_ladder() {
        assert_eq!(classify(Some((1.0, Outcome::Pass)), (1.0, Outcome::Pass)).severity(), None);
        assert_eq!(classify(Some((1.0, Outcome::Pass)), (1.08, Outcome::Pass)).severity(), Some(Severity::Low));
        assert_eq!(classify(Some((1.0, Outcome::Pass)), (1.2, Outcome::Pass)).severity(), Some(Severity::Medium));
        assert_eq!(classify(Some((1.0, Outcome::Pass)), (1.0, Outcome::Partial)).severity(), Some(Severity::Medium));
        assert_eq!(classify(Some((1.0, Outcome::Pass)), (1.0, Outcome::Fail)).severity(), Some(Severity::High));
        assert_eq!(classify(Some((1.0, Outcome::Fail)), (1.0, Outcome::Pass)).severity(), Some(Severity::High));
    }

    #[test]
    fn test_failure_without_design_claim() {
        let c = classify(None, (3.0, Outcome::Fail));
        assert_eq!(c, Classification::Discrepancy { delta: None, severity: Severity::High });
        assert_eq!(classify(None, (3.0, Outcome::Pass)), Classification::Agreement { delta: None });
    }
}
