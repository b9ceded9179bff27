// crates/trustflow-adapters/src/bias.rs
//
// History-based bias analysis and fairness scoring.
//
// The analyzer groups a subject's past decisions by population group and
// measures how far apart the groups are on three rates:
// - positive decision rate (demographic parity)
// - true/false positive rate (equalized odds)
// - mean calibration error (calibration)
// A gap above the disparity threshold is reported as a detected bias type.

use std::collections::BTreeMap;

use async_trait::async_trait;
use trustflow_core::{
    BiasAnalysis, BiasAnalysisService, DecisionRecord, FairnessMetrics, FairnessScorer, Severity,
    TrustflowError,
};

pub const DEMOGRAPHIC_PARITY: &str = "demographic_parity";
pub const EQUALIZED_ODDS: &str = "equalized_odds";
pub const CALIBRATION: &str = "calibration";

/// Per-group decision tallies.
#[derive(Debug, Default, Clone)]
struct GroupTally {
    count: usize,
    decided_positive: usize,
    true_positive: usize,
    actual_positive: usize,
    false_positive: usize,
    actual_negative: usize,
    calibration_error: f64,
}

impl GroupTally {
    fn add(&mut self, record: &DecisionRecord) {
        self.count += 1;
        if record.decided_positive {
            self.decided_positive += 1;
        }
        if record.actual_positive {
            self.actual_positive += 1;
            if record.decided_positive {
                self.true_positive += 1;
            }
        } else {
            self.actual_negative += 1;
            if record.decided_positive {
                self.false_positive += 1;
            }
        }
        let actual = if record.actual_positive { 1.0 } else { 0.0 };
        self.calibration_error += (record.predicted.clamp(0.0, 1.0) - actual).abs();
    }

    fn positive_rate(&self) -> f64 {
        self.decided_positive as f64 / self.count as f64
    }

    fn true_positive_rate(&self) -> Option<f64> {
        (self.actual_positive > 0).then(|| self.true_positive as f64 / self.actual_positive as f64)
    }

    fn false_positive_rate(&self) -> Option<f64> {
        (self.actual_negative > 0)
            .then(|| self.false_positive as f64 / self.actual_negative as f64)
    }

    fn mean_calibration_error(&self) -> f64 {
        self.calibration_error / self.count as f64
    }
}

/// Max minus min of the available values; 0 with fewer than two.
fn spread(values: impl Iterator<Item = f64>) -> f64 {
    let values: Vec<f64> = values.collect();
    if values.len() < 2 {
        return 0.0;
    }
    let max = values.iter().cloned().fold(f64::MIN, f64::max);
    let min = values.iter().cloned().fold(f64::MAX, f64::min);
    max - min
}

fn severity_for_gap(gap: f64) -> Severity {
    if gap >= 0.3 {
        Severity::High
    } else if gap >= 0.2 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Detects group disparities in a subject's decision history.
#[derive(Debug, Clone)]
pub struct HistoricalBiasAnalyzer {
    /// Rate gap above which a bias type is reported.
    pub disparity_threshold: f64,
    /// Groups with fewer decisions are ignored.
    pub min_group_size: usize,
}

impl HistoricalBiasAnalyzer {
    pub fn new() -> Self {
        Self {
            disparity_threshold: 0.1,
            min_group_size: 5,
        }
    }

    pub fn with_threshold(disparity_threshold: f64, min_group_size: usize) -> Self {
        Self {
            disparity_threshold,
            min_group_size,
        }
    }

    /// Synchronous core of `analyze`.
    pub fn analyze_history(
        &self,
        history: &[DecisionRecord],
        context: &BTreeMap<String, String>,
    ) -> BiasAnalysis {
        let mut tallies: BTreeMap<&str, GroupTally> = BTreeMap::new();
        for record in history {
            tallies.entry(record.group.as_str()).or_default().add(record);
        }
        let groups: Vec<&GroupTally> = tallies
            .values()
            .filter(|t| t.count >= self.min_group_size.max(1))
            .collect();

        let mut analysis = BiasAnalysis::default();
        if groups.len() < 2 {
            analysis
                .recommendations
                .push("collect decisions across at least two groups".to_string());
            return analysis;
        }

        let parity_gap = spread(groups.iter().map(|g| g.positive_rate()));
        let odds_gap = spread(groups.iter().filter_map(|g| g.true_positive_rate())).max(spread(
            groups.iter().filter_map(|g| g.false_positive_rate()),
        ));
        let calibration_gap = spread(groups.iter().map(|g| g.mean_calibration_error()));

        let attribute = context
            .get("protected_attribute")
            .map(String::as_str)
            .unwrap_or("group");

        for (kind, gap, metric, advice) in [
            (
                DEMOGRAPHIC_PARITY,
                parity_gap,
                "positiveRate",
                "rebalance positive decision rates",
            ),
            (
                EQUALIZED_ODDS,
                odds_gap,
                "truePositiveRate",
                "equalize error rates",
            ),
            (
                CALIBRATION,
                calibration_gap,
                "calibrationError",
                "recalibrate predicted probabilities",
            ),
        ] {
            if gap <= self.disparity_threshold {
                continue;
            }
            analysis.detected = true;
            analysis.types.push(kind.to_string());
            analysis
                .confidence_per_type
                .insert(kind.to_string(), (gap * 2.0).min(1.0));
            analysis
                .severity_per_type
                .insert(kind.to_string(), severity_for_gap(gap));
            analysis.affected_metrics.push(metric.to_string());
            analysis
                .recommendations
                .push(format!("{} across {} values", advice, attribute));
        }

        analysis
    }
}

impl Default for HistoricalBiasAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BiasAnalysisService for HistoricalBiasAnalyzer {
    async fn analyze(
        &self,
        subject_id: &str,
        history: &[DecisionRecord],
        context: &BTreeMap<String, String>,
    ) -> Result<BiasAnalysis, TrustflowError> {
        let analysis = self.analyze_history(history, context);
        tracing::debug!(
            "Bias analysis for {}: {} decisions, detected {:?}",
            subject_id,
            history.len(),
            analysis.types
        );
        Ok(analysis)
    }
}

/// Derives fairness metrics from the confidence of each detected bias type.
#[derive(Debug, Clone, Default)]
pub struct GroupRateFairnessScorer;

impl GroupRateFairnessScorer {
    pub fn new() -> Self {
        Self
    }

    pub fn metrics_for(analysis: &BiasAnalysis) -> FairnessMetrics {
        let unaffected = |kind: &str| {
            let confidence = analysis.confidence_per_type.get(kind).copied().unwrap_or(0.0);
            (100.0 * (1.0 - confidence)).clamp(0.0, 100.0)
        };
        let demographic_parity = unaffected(DEMOGRAPHIC_PARITY);
        let equalized_odds = unaffected(EQUALIZED_ODDS);
        let calibration = unaffected(CALIBRATION);
        let individual_fairness = (100.0 - 20.0 * analysis.weighted_penalty()).clamp(0.0, 100.0);
        let group_fairness = (demographic_parity + equalized_odds) / 2.0;
        let overall = (demographic_parity
            + equalized_odds
            + calibration
            + individual_fairness
            + group_fairness)
            / 5.0;

        FairnessMetrics {
            demographic_parity,
            equalized_odds,
            calibration,
            individual_fairness,
            group_fairness,
            overall,
        }
    }
}

#[async_trait]
impl FairnessScorer for GroupRateFairnessScorer {
    async fn score(
        &self,
        _subject_id: &str,
        analysis: &BiasAnalysis,
    ) -> Result<FairnessMetrics, TrustflowError> {
        Ok(Self::metrics_for(analysis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decisions(group: &str, positive: usize, total: usize) -> Vec<DecisionRecord> {
        (0..total)
            .map(|i| DecisionRecord {
                group: group.to_string(),
                predicted: if i < positive { 0.9 } else { 0.1 },
                decided_positive: i < positive,
                actual_positive: i < positive,
            })
            .collect()
    }

    #[test]
    fn test_balanced_history_has_no_bias() {
        let mut history = decisions("a", 5, 10);
        history.extend(decisions("b", 5, 10));
        let analysis = HistoricalBiasAnalyzer::new().analyze_history(&history, &BTreeMap::new());
        assert!(!analysis.detected);
        assert!(analysis.types.is_empty());
    }

    #[test]
    fn test_parity_gap_is_detected() {
        let mut history = decisions("a", 9, 10);
        history.extend(decisions("b", 2, 10));
        let analysis = HistoricalBiasAnalyzer::new().analyze_history(&history, &BTreeMap::new());
        assert!(analysis.detected);
        assert!(analysis.types.contains(&DEMOGRAPHIC_PARITY.to_string()));
        // gap 0.7 -> confidence capped at 1, severity high
        assert!((analysis.confidence_per_type[DEMOGRAPHIC_PARITY] - 1.0).abs() < 1e-10);
        assert_eq!(analysis.severity_per_type[DEMOGRAPHIC_PARITY], Severity::High);
    }

    #[test]
    fn test_small_groups_are_ignored() {
        let mut history = decisions("a", 9, 10);
        history.extend(decisions("b", 0, 3));
        let analysis = HistoricalBiasAnalyzer::new().analyze_history(&history, &BTreeMap::new());
        assert!(!analysis.detected);
        assert_eq!(analysis.recommendations.len(), 1);
    }

    #[test]
    fn test_custom_threshold_and_group_size() {
        // gap 0.2: reported at the default threshold, ignored at 0.3
        let mut history = decisions("a", 6, 10);
        history.extend(decisions("b", 4, 10));
        let strict = HistoricalBiasAnalyzer::with_threshold(0.3, 5);
        assert!(!strict.analyze_history(&history, &BTreeMap::new()).detected);
        assert!(HistoricalBiasAnalyzer::new()
            .analyze_history(&history, &BTreeMap::new())
            .detected);

        // groups of three only count once the minimum size allows it
        let mut small = decisions("a", 3, 3);
        small.extend(decisions("b", 0, 3));
        let lenient = HistoricalBiasAnalyzer::with_threshold(0.1, 3);
        let analysis = lenient.analyze_history(&small, &BTreeMap::new());
        assert!(analysis.types.contains(&DEMOGRAPHIC_PARITY.to_string()));
    }

    #[test]
    fn test_recommendation_names_protected_attribute() {
        let mut history = decisions("a", 9, 10);
        history.extend(decisions("b", 2, 10));
        let mut context = BTreeMap::new();
        context.insert("protected_attribute".to_string(), "region".to_string());
        let analysis = HistoricalBiasAnalyzer::new().analyze_history(&history, &context);
        assert!(analysis.recommendations.iter().all(|r| r.contains("region")));
    }

    #[test]
    fn test_fairness_without_bias_is_perfect() {
        let metrics = GroupRateFairnessScorer::metrics_for(&BiasAnalysis::default());
        assert!((metrics.overall - 100.0).abs() < 1e-10);
        assert!((metrics.individual_fairness - 100.0).abs() < 1e-10);
    }

    #[test]
    fn test_fairness_drops_with_confidence() {
        let mut analysis = BiasAnalysis {
            detected: true,
            types: vec![DEMOGRAPHIC_PARITY.to_string()],
            ..Default::default()
        };
        analysis
            .confidence_per_type
            .insert(DEMOGRAPHIC_PARITY.to_string(), 0.5);
        analysis
            .severity_per_type
            .insert(DEMOGRAPHIC_PARITY.to_string(), Severity::Medium);
        let metrics = GroupRateFairnessScorer::metrics_for(&analysis);
        assert!((metrics.demographic_parity - 50.0).abs() < 1e-10);
        assert!((metrics.group_fairness - 75.0).abs() < 1e-10);
        // penalty 0.5 * 2 = 1 -> 100 - 20
        assert!((metrics.individual_fairness - 80.0).abs() < 1e-10);
        // (50 + 100 + 100 + 80 + 75) / 5
        assert!((metrics.overall - 81.0).abs() < 1e-10);
    }
}
