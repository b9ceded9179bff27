// crates/trustflow-core/src/subject.rs
//
// Externally supplied data about the entity being scored. Steps 1-6 read
// their metric group from here; step 2 hands `history` and `context` to the
// bias analysis service; oracles observe `reputation`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::TrustflowError;

/// Maximum accepted subject id length.
pub const MAX_SUBJECT_ID_LEN: usize = 128;

/// Reject empty, overlong, or oddly-charactered subject ids.
pub fn validate_subject_id(subject_id: &str) -> Result<(), TrustflowError> {
    if subject_id.is_empty() {
        return Err(TrustflowError::Validation("subject id must not be empty".to_string()));
    }
    if subject_id.len() > MAX_SUBJECT_ID_LEN {
        return Err(TrustflowError::Validation(format!(
            "subject id exceeds {} characters",
            MAX_SUBJECT_ID_LEN
        )));
    }
    if let Some(bad) = subject_id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | ':' | '@' | '-')))
    {
        return Err(TrustflowError::Validation(format!(
            "subject id contains invalid character {:?}",
            bad
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TechnicalMetrics {
    /// Uptime percentage over the observation window (0-100).
    pub uptime_pct: f64,
    /// Fraction of failed requests (0-1).
    pub error_rate: f64,
    pub p95_latency_ms: f64,
    /// Task accuracy (0-1).
    pub accuracy: f64,
}

impl Default for TechnicalMetrics {
    fn default() -> Self {
        Self {
            uptime_pct: 0.0,
            error_rate: 1.0,
            p95_latency_ms: 0.0,
            accuracy: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationalMetrics {
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    /// Availability percentage (0-100).
    pub availability_pct: f64,
    pub mean_response_ms: f64,
    /// Incidents in the last 30 days.
    pub incidents_30d: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransparencyMetrics {
    /// Fraction of capabilities documented (0-1).
    pub documentation_coverage: f64,
    /// Fraction of decisions that come with an explanation (0-1).
    pub explainability: f64,
    pub audit_logging: bool,
    pub source_available: bool,
    pub model_card: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityMetrics {
    pub critical_vulnerabilities: u32,
    pub high_vulnerabilities: u32,
    pub medium_vulnerabilities: u32,
    pub encryption_at_rest: bool,
    pub encryption_in_transit: bool,
    pub mfa_enforced: bool,
    /// Days since the last external security audit; `None` if never audited.
    pub days_since_audit: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplianceMetrics {
    pub required_frameworks: Vec<String>,
    pub certified_frameworks: Vec<String>,
    pub open_violations: u32,
    pub data_retention_policy: bool,
}

/// One past decision made by the subject, used for bias analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// Population group the decision applied to.
    pub group: String,
    /// Subject's predicted probability of a positive outcome (0-1).
    pub predicted: f64,
    /// Whether the subject decided positively.
    pub decided_positive: bool,
    /// Whether the ground truth was positive.
    pub actual_positive: bool,
}

/// Everything known about a subject before scoring starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectProfile {
    pub subject_id: String,
    #[serde(default)]
    pub technical: TechnicalMetrics,
    #[serde(default)]
    pub operational: OperationalMetrics,
    #[serde(default)]
    pub transparency: TransparencyMetrics,
    #[serde(default)]
    pub security: SecurityMetrics,
    #[serde(default)]
    pub compliance: ComplianceMetrics,
    #[serde(default)]
    pub history: Vec<DecisionRecord>,
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Externally observed reputation (0-100), if any.
    #[serde(default)]
    pub reputation: Option<f64>,
}

impl SubjectProfile {
    /// An empty profile: every metric at its least favourable default.
    pub fn new(subject_id: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            technical: TechnicalMetrics::default(),
            operational: OperationalMetrics::default(),
            transparency: TransparencyMetrics::default(),
            security: SecurityMetrics::default(),
            compliance: ComplianceMetrics::default(),
            history: Vec::new(),
            context: BTreeMap::new(),
            reputation: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_typical_ids() {
        assert!(validate_subject_id("agent-42").is_ok());
        assert!(validate_subject_id("did:web:example.com").is_ok());
        assert!(validate_subject_id("ops@team_a").is_ok());
    }

    #[test]
    fn test_rejects_bad_ids() {
        assert!(validate_subject_id("").is_err());
        assert!(validate_subject_id("has space").is_err());
        assert!(validate_subject_id("semi;colon").is_err());
        assert!(validate_subject_id(&"x".repeat(MAX_SUBJECT_ID_LEN + 1)).is_err());
    }

    #[test]
    fn test_profile_deserializes_with_missing_groups() {
        let json = r#"{ "subject_id": "agent-1", "reputation": 77.0 }"#;
        let profile: SubjectProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.subject_id, "agent-1");
        assert_eq!(profile.reputation, Some(77.0));
        assert!(profile.history.is_empty());
        assert_eq!(profile.technical.error_rate, 1.0);
    }
}
