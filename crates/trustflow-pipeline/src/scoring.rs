// crates/trustflow-pipeline/src/scoring.rs
//
// Local subscores for the profile-only steps (1, 3, 4, 5, 6) and the
// ethical score formula used by step 2.
//
// Every function is pure: it reads one metric group of the subject profile
// and returns a score in [0, 100] together with the detail fields that
// explain it.

use serde::Serialize;
use trustflow_core::{
    BiasAnalysis, ComplianceMetrics, FairnessMetrics, OperationalMetrics, SecurityMetrics,
    TechnicalMetrics, TransparencyMetrics,
};

/// Clamp to the [0, 100] score range; NaN maps to 0.
pub fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

fn unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicalAssessment {
    pub technical_score: f64,
    pub reliability: f64,
    pub error_score: f64,
    pub latency_score: f64,
    pub accuracy_score: f64,
}

/// Step 1: 0.3 reliability + 0.2 error score + 0.2 latency + 0.3 accuracy.
pub fn score_technical(m: &TechnicalMetrics) -> TechnicalAssessment {
    let reliability = clamp_score(m.uptime_pct);
    let error_score = (1.0 - unit(m.error_rate)) * 100.0;
    let latency_score = latency_score(m.p95_latency_ms);
    let accuracy_score = unit(m.accuracy) * 100.0;

    let technical_score = clamp_score(
        0.3 * reliability + 0.2 * error_score + 0.2 * latency_score + 0.3 * accuracy_score,
    );

    TechnicalAssessment {
        technical_score,
        reliability,
        error_score,
        latency_score,
        accuracy_score,
    }
}

/// Full marks up to 200 ms p95, then one point lost per 20 ms.
fn latency_score(p95_ms: f64) -> f64 {
    if p95_ms <= 200.0 {
        100.0
    } else {
        clamp_score(100.0 - (p95_ms - 200.0) / 20.0)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationalAnalysis {
    pub operational_score: f64,
    pub success_rate: f64,
    pub availability: f64,
    pub responsiveness: f64,
    pub incident_penalty: f64,
}

/// Step 3: 0.4 success + 0.3 availability + 0.3 responsiveness - incidents.
pub fn score_operational(m: &OperationalMetrics) -> OperationalAnalysis {
    let total = m.tasks_completed.saturating_add(m.tasks_failed);
    let success_rate = if total == 0 {
        0.5
    } else {
        m.tasks_completed as f64 / total as f64
    };
    let availability = clamp_score(m.availability_pct);
    let responsiveness = if m.mean_response_ms <= 1000.0 {
        100.0
    } else {
        clamp_score(100.0 - (m.mean_response_ms - 1000.0) / 100.0)
    };
    let incident_penalty = (m.incidents_30d as f64 * 5.0).min(30.0);

    let operational_score = clamp_score(
        0.4 * success_rate * 100.0 + 0.3 * availability + 0.3 * responsiveness - incident_penalty,
    );

    OperationalAnalysis {
        operational_score,
        success_rate,
        availability,
        responsiveness,
        incident_penalty,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransparencyAudit {
    pub transparency_score: f64,
    pub documentation: f64,
    pub explainability: f64,
    pub audit_logging: bool,
    pub source_available: bool,
    pub model_card: bool,
}

/// Step 4: 35 documentation + 35 explainability + 10 per disclosure practice.
pub fn score_transparency(m: &TransparencyMetrics) -> TransparencyAudit {
    let documentation = unit(m.documentation_coverage) * 35.0;
    let explainability = unit(m.explainability) * 35.0;
    let practices = [m.audit_logging, m.source_available, m.model_card]
        .iter()
        .filter(|&&p| p)
        .count() as f64
        * 10.0;

    TransparencyAudit {
        transparency_score: clamp_score(documentation + explainability + practices),
        documentation,
        explainability,
        audit_logging: m.audit_logging,
        source_available: m.source_available,
        model_card: m.model_card,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityAssessment {
    pub security_score: f64,
    pub vulnerability_penalty: f64,
    pub control_penalty: f64,
    pub audit_penalty: f64,
}

/// Step 5: 100 minus vulnerability, missing-control, and audit-staleness penalties.
pub fn score_security(m: &SecurityMetrics) -> SecurityAssessment {
    let vulnerability_penalty = (25.0 * m.critical_vulnerabilities as f64
        + 10.0 * m.high_vulnerabilities as f64
        + 3.0 * m.medium_vulnerabilities as f64)
        .min(70.0);

    let mut control_penalty = 0.0;
    if !m.encryption_at_rest {
        control_penalty += 10.0;
    }
    if !m.encryption_in_transit {
        control_penalty += 10.0;
    }
    if !m.mfa_enforced {
        control_penalty += 5.0;
    }

    let audit_penalty = match m.days_since_audit {
        None => 10.0,
        Some(days) if days > 365 => 10.0,
        Some(days) if days > 180 => 5.0,
        Some(_) => 0.0,
    };

    SecurityAssessment {
        security_score: clamp_score(
            100.0 - vulnerability_penalty - control_penalty - audit_penalty,
        ),
        vulnerability_penalty,
        control_penalty,
        audit_penalty,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceCheck {
    pub compliance_score: f64,
    pub coverage: f64,
    pub missing_frameworks: Vec<String>,
    pub open_violations: u32,
}

/// Step 6: 80 framework coverage + 20 retention policy - 15 per open violation.
pub fn score_compliance(m: &ComplianceMetrics) -> ComplianceCheck {
    let missing_frameworks: Vec<String> = m
        .required_frameworks
        .iter()
        .filter(|req| {
            !m.certified_frameworks
                .iter()
                .any(|c| c.eq_ignore_ascii_case(req))
        })
        .cloned()
        .collect();

    let coverage = if m.required_frameworks.is_empty() {
        1.0
    } else {
        1.0 - missing_frameworks.len() as f64 / m.required_frameworks.len() as f64
    };

    let policy = if m.data_retention_policy { 20.0 } else { 0.0 };
    let compliance_score =
        clamp_score(80.0 * coverage + policy - 15.0 * m.open_violations as f64);

    ComplianceCheck {
        compliance_score,
        coverage,
        missing_frameworks,
        open_violations: m.open_violations,
    }
}

/// Step 2 formula:
/// `clamp(100 - Σ(confidence × severityWeight × 5) + 0.5 × (fairness.overall - 80), 0, 100)`.
pub fn ethical_score(analysis: &BiasAnalysis, fairness: &FairnessMetrics) -> f64 {
    let bias_penalty = analysis.weighted_penalty() * 5.0;
    let fairness_adjustment = 0.5 * (fairness.overall - 80.0);
    clamp_score(100.0 - bias_penalty + fairness_adjustment)
}
