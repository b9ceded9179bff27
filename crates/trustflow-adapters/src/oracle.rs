// crates/trustflow-adapters/src/oracle.rs
//
// LocalOracleNetwork: N simulated oracles observing a subject's reputation.
//
// Each oracle reports the directory's reputation value shifted by a
// deterministic per-oracle jitter. The consensus value is the
// reputation-weighted median of the submissions: sort by value and walk
// cumulative weight until half the total is reached.

use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use trustflow_core::{
    ConsensusValue, OracleConsensusReport, OracleConsensusService, OracleSubmission,
    SubjectDirectory, TrustflowError,
};

pub const WEIGHTED_MEDIAN: &str = "weighted_median";

/// One oracle in the local network.
#[derive(Debug, Clone)]
pub struct LocalOracle {
    pub oracle_id: String,
    /// Voting weight in the median.
    pub weight: f64,
}

pub struct LocalOracleNetwork {
    directory: Arc<dyn SubjectDirectory>,
    oracles: Vec<LocalOracle>,
    /// Maximum absolute jitter applied to an observation.
    jitter: f64,
    /// Distance from the consensus value within which an oracle agrees.
    tolerance: f64,
    /// Agreement fraction reported as the consensus threshold.
    threshold: f64,
}

impl LocalOracleNetwork {
    /// `count` equally weighted oracles named `oracle-0..count`.
    pub fn new(directory: Arc<dyn SubjectDirectory>, count: usize) -> Self {
        let oracles = (0..count)
            .map(|i| LocalOracle {
                oracle_id: format!("oracle-{}", i),
                weight: 1.0,
            })
            .collect();
        Self {
            directory,
            oracles,
            jitter: 3.0,
            tolerance: 5.0,
            threshold: 0.67,
        }
    }

    pub fn with_oracles(mut self, oracles: Vec<LocalOracle>) -> Self {
        self.oracles = oracles;
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.abs();
        self
    }

    pub fn with_agreement(mut self, tolerance: f64, threshold: f64) -> Self {
        self.tolerance = tolerance;
        self.threshold = threshold;
        self
    }

    pub fn oracle_count(&self) -> usize {
        self.oracles.len()
    }

    /// Deterministic offset in [-jitter, jitter] for one oracle's view.
    fn offset(&self, oracle_id: &str, subject_id: &str, data_type: &str) -> f64 {
        let mut hasher = Sha256::new();
        hasher.update(oracle_id.as_bytes());
        hasher.update(subject_id.as_bytes());
        hasher.update(data_type.as_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        let unit = u64::from_le_bytes(bytes) as f64 / u64::MAX as f64;
        (unit * 2.0 - 1.0) * self.jitter
    }

    fn sign(oracle_id: &str, subject_id: &str, value: f64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(oracle_id.as_bytes());
        hasher.update(subject_id.as_bytes());
        hasher.update(value.to_le_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Weighted median of `(value, weight)` pairs. `None` if the total weight is not positive.
pub fn weighted_median(pairs: &[(f64, f64)]) -> Option<f64> {
    let total: f64 = pairs.iter().map(|(_, w)| w.max(0.0)).sum();
    if total <= 0.0 {
        return None;
    }

    let mut sorted = pairs.to_vec();
    sorted.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut cumulative = 0.0;
    let mut median = sorted[0].0;
    for (value, weight) in &sorted {
        cumulative += weight.max(0.0);
        median = *value;
        if cumulative >= total / 2.0 {
            break;
        }
    }
    Some(median)
}

#[async_trait]
impl OracleConsensusService for LocalOracleNetwork {
    async fn consensus(
        &self,
        subject_id: &str,
        data_type: &str,
    ) -> Result<OracleConsensusReport, TrustflowError> {
        let reputation = self
            .directory
            .lookup(subject_id)
            .and_then(|p| p.reputation)
            .ok_or_else(|| {
                TrustflowError::ConsensusUnavailable(format!(
                    "no oracle observations of {} for {}",
                    data_type, subject_id
                ))
            })?;

        let submissions: Vec<OracleSubmission> = self
            .oracles
            .iter()
            .map(|oracle| {
                let value = (reputation + self.offset(&oracle.oracle_id, subject_id, data_type))
                    .clamp(0.0, 100.0);
                OracleSubmission {
                    oracle_id: oracle.oracle_id.clone(),
                    value,
                    signature: Self::sign(&oracle.oracle_id, subject_id, value),
                }
            })
            .collect();

        let pairs: Vec<(f64, f64)> = submissions
            .iter()
            .zip(&self.oracles)
            .map(|(s, o)| (s.value, o.weight))
            .collect();
        let value = weighted_median(&pairs).ok_or_else(|| {
            TrustflowError::ConsensusUnavailable("oracle network has no voting weight".to_string())
        })?;

        let total: f64 = self.oracles.iter().map(|o| o.weight.max(0.0)).sum();
        let agreeing: f64 = pairs
            .iter()
            .filter(|(v, _)| (v - value).abs() <= self.tolerance)
            .map(|(_, w)| w.max(0.0))
            .sum();

        tracing::debug!(
            "Oracle consensus for {}: {:.2} from {} submissions",
            subject_id,
            value,
            submissions.len()
        );

        Ok(OracleConsensusReport {
            submissions,
            result: ConsensusValue {
                value,
                confidence: agreeing / total,
                algorithm: WEIGHTED_MEDIAN.to_string(),
            },
            threshold: self.threshold,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::StaticSubjectDirectory;
    use trustflow_core::SubjectProfile;

    fn directory(reputation: Option<f64>) -> Arc<dyn SubjectDirectory> {
        let mut profile = SubjectProfile::new("agent-1");
        profile.reputation = reputation;
        Arc::new(StaticSubjectDirectory::from_profiles(vec![profile]))
    }

    #[test]
    fn test_weighted_median_equal_weights() {
        let pairs = vec![(10.0, 1.0), (30.0, 1.0), (20.0, 1.0)];
        assert!((weighted_median(&pairs).unwrap() - 20.0).abs() < 1e-10);
    }

    #[test]
    fn test_weighted_median_heavy_oracle_wins() {
        let pairs = vec![(10.0, 1.0), (20.0, 1.0), (90.0, 5.0)];
        assert!((weighted_median(&pairs).unwrap() - 90.0).abs() < 1e-10);
    }

    #[test]
    fn test_weighted_median_without_weight() {
        assert!(weighted_median(&[]).is_none());
        assert!(weighted_median(&[(1.0, 0.0)]).is_none());
    }

    #[tokio::test]
    async fn test_consensus_tracks_reputation() {
        let network = LocalOracleNetwork::new(directory(Some(80.0)), 5);
        let report = network.consensus("agent-1", "trust_score").await.unwrap();

        assert_eq!(report.submissions.len(), 5);
        assert!((report.result.value - 80.0).abs() <= 3.0);
        assert!(report.submissions.iter().all(|s| (s.value - 80.0).abs() <= 3.0));
        // jitter 3 < tolerance 5: every oracle agrees
        assert!((report.result.confidence - 1.0).abs() < 1e-10);
        assert!((report.agreement(5.0) - 1.0).abs() < 1e-10);
        assert_eq!(report.result.algorithm, WEIGHTED_MEDIAN);
    }

    #[tokio::test]
    async fn test_weighted_oracles_report_weighted_confidence() {
        let network = LocalOracleNetwork::new(directory(Some(80.0)), 0)
            .with_oracles(vec![
                LocalOracle { oracle_id: "heavy".into(), weight: 3.0 },
                LocalOracle { oracle_id: "light".into(), weight: 1.0 },
            ])
            .with_jitter(0.0);
        assert_eq!(network.oracle_count(), 2);

        let report = network.consensus("agent-1", "trust_score").await.unwrap();
        assert_eq!(report.submissions.len(), 2);
        assert_eq!(report.submissions[0].oracle_id, "heavy");
        assert!((report.result.value - 80.0).abs() < 1e-10);
        assert!((report.result.confidence - 1.0).abs() < 1e-10);
    }

    #[tokio::test]
    async fn test_consensus_is_deterministic() {
        let network = LocalOracleNetwork::new(directory(Some(60.0)), 3);
        let a = network.consensus("agent-1", "trust_score").await.unwrap();
        let b = network.consensus("agent-1", "trust_score").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_missing_reputation_is_unavailable() {
        let network = LocalOracleNetwork::new(directory(None), 3);
        let err = network.consensus("agent-1", "trust_score").await.unwrap_err();
        assert!(matches!(err, TrustflowError::ConsensusUnavailable(_)));

        let err = network.consensus("ghost", "trust_score").await.unwrap_err();
        assert!(matches!(err, TrustflowError::ConsensusUnavailable(_)));
    }

    #[tokio::test]
    async fn test_empty_network_is_unavailable() {
        let network = LocalOracleNetwork::new(directory(Some(80.0)), 0);
        let err = network.consensus("agent-1", "trust_score").await.unwrap_err();
        assert!(matches!(err, TrustflowError::ConsensusUnavailable(_)));
    }
}
