// crates/trustflow-pipeline/src/aggregator.rs
//
// Weighted aggregation of step scores into the final trust score.
//
// Each completed step contributes its primary score, read from the payload
// field named by `Computation::score_field`. Steps 7 and 9 contribute fixed
// bonus constants instead of a measured value. The weighted sum is divided
// by the sum of contributing weights, so disabled optional steps need no
// upfront renormalization.

use chrono::{DateTime, Utc};
use trustflow_core::{
    Computation, ProcessStatus, ScoringProcess, StepResult, TrustflowError,
};

/// Fixed contribution of a blockchain anchoring result.
pub const ANCHOR_BONUS: f64 = 95.0;
/// Fixed contribution of a cryptographic verification result.
pub const PROOF_BONUS: f64 = 90.0;

/// Primary score a result contributes, or `None` if its payload lacks one.
pub fn primary_score(computation: Computation, result: &StepResult) -> Option<f64> {
    match computation {
        Computation::BlockchainAnchoring => Some(ANCHOR_BONUS),
        Computation::CryptographicVerification => Some(PROOF_BONUS),
        other => other
            .score_field()
            .and_then(|field| result.number(field))
            .filter(|v| v.is_finite())
            .map(|v| v.clamp(0.0, 100.0)),
    }
}

/// Σ(score × weight) / Σ(weight) over steps that produced a scorable result.
///
/// Returns `None` if no step contributes.
pub fn weighted_average(process: &ScoringProcess) -> Option<f64> {
    let mut weighted_sum = 0.0;
    let mut weight_sum = 0.0;

    for step in &process.steps {
        let Some(result) = process.results.get(&step.id) else {
            continue;
        };
        let Some(score) = primary_score(step.computation, result) else {
            tracing::debug!(
                "Process {}: step {} result has no primary score, skipping",
                process.id,
                step.id
            );
            continue;
        };
        weighted_sum += score * step.weight;
        weight_sum += step.weight;
    }

    if weight_sum > 0.0 {
        Some(weighted_sum / weight_sum)
    } else {
        None
    }
}

/// Unrounded score over the steps completed so far (0.0 when none).
pub fn provisional_score(process: &ScoringProcess) -> f64 {
    weighted_average(process).unwrap_or(0.0)
}

/// Rounded final score in [0, 100] (0 when no step produced a result).
pub fn compute_final_score(process: &ScoringProcess) -> u32 {
    weighted_average(process)
        .map(|avg| avg.round().clamp(0.0, 100.0) as u32)
        .unwrap_or(0)
}

/// Finalizes completed processes.
pub struct Aggregator;

impl Aggregator {
    /// Compute the final score and mark the process `Completed`.
    ///
    /// Idempotent: finalizing an already completed process with an
    /// unchanged result set yields the same score and keeps `completed_at`.
    pub fn finalize(
        process: &mut ScoringProcess,
        now: DateTime<Utc>,
    ) -> Result<u32, TrustflowError> {
        let score = compute_final_score(process);

        match process.status {
            ProcessStatus::Completed => {}
            ProcessStatus::InProgress => process.transition(ProcessStatus::Completed)?,
            other => {
                return Err(TrustflowError::InvalidState(format!(
                    "cannot finalize process {} in status {}",
                    process.id, other
                )))
            }
        }

        process.final_score = Some(score);
        process.current_step = None;
        if process.completed_at.is_none() {
            process.completed_at = Some(now);
        }
        Ok(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use trustflow_core::{PipelineFlags, StepCatalogBuilder};

    fn process_with(flags: PipelineFlags) -> ScoringProcess {
        let mut p = ScoringProcess::new("agent-42", flags, StepCatalogBuilder::new(flags).build());
        p.transition(ProcessStatus::InProgress).unwrap();
        p
    }

    fn add(p: &mut ScoringProcess, step_id: u8, field: &str, score: f64) {
        p.record_result(StepResult::measured(step_id, json!({ field: score })))
            .unwrap();
    }

    #[test]
    fn test_no_results_scores_zero() {
        let mut p = process_with(PipelineFlags::default());
        assert_eq!(Aggregator::finalize(&mut p, Utc::now()).unwrap(), 0);
        assert_eq!(p.status, ProcessStatus::Completed);
        assert_eq!(p.final_score, Some(0));
    }

    #[test]
    fn test_weighted_average_over_base_steps() {
        let mut p = process_with(PipelineFlags::default());
        add(&mut p, 1, "technicalScore", 80.0);
        add(&mut p, 2, "ethicalScore", 90.0);
        add(&mut p, 3, "operationalScore", 70.0);
        add(&mut p, 4, "transparencyScore", 60.0);
        add(&mut p, 5, "securityScore", 100.0);
        add(&mut p, 6, "complianceScore", 50.0);
        // (0.15 * (80 + 90 + 70 + 60 + 100) + 0.10 * 50) / 0.85 = 65 / 0.85
        let expected = (65.0_f64 / 0.85).round() as u32;
        assert_eq!(compute_final_score(&p), expected);
        assert_eq!(expected, 76);
    }

    #[test]
    fn test_bonus_steps_contribute_constants() {
        let flags = PipelineFlags {
            use_blockchain: true,
            use_oracle_consensus: false,
            use_crypto_verification: true,
        };
        let mut p = process_with(flags);
        p.record_result(StepResult::measured(7, json!({ "anchored": true }))).unwrap();
        p.record_result(StepResult::simulated(9, json!({ "proofType": "simulated" }))).unwrap();
        // (0.10 * 95 + 0.10 * 90) / 0.20
        assert!((provisional_score(&p) - 92.5).abs() < 1e-10);
        assert_eq!(compute_final_score(&p), 93);
    }

    #[test]
    fn test_result_without_score_field_is_skipped() {
        let mut p = process_with(PipelineFlags::default());
        add(&mut p, 1, "technicalScore", 40.0);
        p.record_result(StepResult::measured(2, json!({ "note": "no score" }))).unwrap();
        assert_eq!(compute_final_score(&p), 40);
    }

    #[test]
    fn test_out_of_range_scores_are_clamped() {
        let mut p = process_with(PipelineFlags::default());
        add(&mut p, 1, "technicalScore", 250.0);
        assert_eq!(compute_final_score(&p), 100);
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let mut p = process_with(PipelineFlags::default());
        add(&mut p, 1, "technicalScore", 72.4);
        add(&mut p, 6, "complianceScore", 33.0);
        let first_at = Utc::now();
        let first = Aggregator::finalize(&mut p, first_at).unwrap();
        let snapshot = p.clone();
        let second = Aggregator::finalize(&mut p, first_at + chrono::Duration::seconds(5)).unwrap();
        assert_eq!(first, second);
        assert_eq!(p, snapshot);
    }

    #[test]
    fn test_failed_process_cannot_be_finalized() {
        let mut p = process_with(PipelineFlags::default());
        p.fail(&TrustflowError::ConsensusUnavailable("x".into()), Utc::now()).unwrap();
        assert!(Aggregator::finalize(&mut p, Utc::now()).is_err());
    }
}
