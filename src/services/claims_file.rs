//! JSON claims documents produced by the design and verification tools.
//!
//! ```json
//! {"artifact": "analysis/thruster.py", "claims": [
//!   {"requirement": "REQ-001", "parameter": "thrust_N", "value": 1.0, "outcome": "PASS"}
//! ]}
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::Claim;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClaimsFile {
    /// Supporting artifact the claims came from
    #[serde(default)]
    pub artifact: Option<String>,
    #[serde(default)]
    pub claims: Vec<Claim>,
}

impl ClaimsFile {
    pub fn parse(json: &str) -> DomainResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> DomainResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            DomainError::ValidationFailed(format!("cannot read claims file {}: {e}", path.display()))
        })?;
        Self::parse(&contents)
    }

    /// Combine with claims given inline; inline artifact wins.
    pub fn merge(mut self, artifact: Option<String>, claims: Vec<Claim>) -> Self {
        if artifact.is_some() {
            self.artifact = artifact;
        }
        self.claims.extend(claims);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Outcome, RequirementId};
    use std::io::Write;

    #[test]
    fn test_parse_results_document() {
        let doc = ClaimsFile::parse(
            r#"{"artifact": "sim/run-4.json", "claims": [
                {"requirement": "REQ-001", "parameter": "thrust_N", "value": 1.02, "outcome": "PASS"},
                {"requirement": "REQ-002", "parameter": "isp_s", "value": 212.0}
            ]}"#,
        )
        .unwrap();
        assert_eq!(doc.artifact.as_deref(), Some("sim/run-4.json"));
        assert_eq!(doc.claims.len(), 2);
        assert_eq!(doc.claims[0].outcome, Some(Outcome::Pass));
        assert_eq!(doc.claims[1].requirement_id, RequirementId(2));
        assert_eq!(doc.claims[1].outcome, None);
    }

    #[test]
    fn test_load_and_merge() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"claims": [{{"requirement": "REQ-003", "parameter": "t_ms", "value": 42}}]}}"#).unwrap();

        let doc = ClaimsFile::load(file.path())
            .unwrap()
            .merge(Some("bench/valve.md".into()), vec!["REQ-003:leak_sccm=0.1".parse().unwrap()]);
        assert_eq!(doc.artifact.as_deref(), Some("bench/valve.md"));
        assert_eq!(doc.claims.len(), 2);
    }

    #[test]
    fn test_malformed_document_rejected() {
        assert!(matches!(
            ClaimsFile::parse(r#"{"claims": [{"requirement": "X-1"}]}"#),
            Err(DomainError::SerializationError(_))
        ));
        assert!(ClaimsFile::load(Path::new("/nonexistent/claims.json")).is_err());
    }
}
