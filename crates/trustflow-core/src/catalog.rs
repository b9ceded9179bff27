// crates/trustflow-core/src/catalog.rs
//
// Builds the ordered, dependency-annotated step list for a scoring process.
//
// Steps 1-6 are always present and depend only on the subject profile.
// Steps 7 (blockchain), 8 (oracle), and 9 (crypto) are appended when their
// flag is set; each depends on the closest enabled predecessor.

use serde::{Deserialize, Serialize};

use crate::step::{Computation, StepId, StepSpec};

/// Weight of the first five base steps.
pub const PRIMARY_STEP_WEIGHT: f64 = 0.15;
/// Weight of the compliance step and of every optional step.
pub const SECONDARY_STEP_WEIGHT: f64 = 0.10;

const BASE_STEP_IDS: [StepId; 6] = [1, 2, 3, 4, 5, 6];

/// Feature flags selecting the optional steps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineFlags {
    #[serde(default)]
    pub use_blockchain: bool,
    #[serde(default)]
    pub use_oracle_consensus: bool,
    #[serde(default)]
    pub use_crypto_verification: bool,
}

impl PipelineFlags {
    pub fn all() -> Self {
        Self {
            use_blockchain: true,
            use_oracle_consensus: true,
            use_crypto_verification: true,
        }
    }
}

/// Builds `StepSpec` catalogs from feature flags.
pub struct StepCatalogBuilder {
    flags: PipelineFlags,
}

impl StepCatalogBuilder {
    pub fn new(flags: PipelineFlags) -> Self {
        Self { flags }
    }

    /// Emit the ordered catalog.
    ///
    /// Every dependency id refers to a step earlier in the returned list.
    /// Disabled optional steps are omitted, never replaced by placeholders.
    pub fn build(&self) -> Vec<StepSpec> {
        let mut steps: Vec<StepSpec> = vec![
            base_step(
                Computation::TechnicalAssessment,
                "technical",
                &["technicalScore", "reliability", "latencyScore"],
            ),
            base_step(
                Computation::EthicalEvaluation,
                "history",
                &["ethicalScore", "biasDetected", "fairness"],
            ),
            base_step(
                Computation::OperationalAnalysis,
                "operational",
                &["operationalScore", "successRate"],
            ),
            base_step(
                Computation::TransparencyAudit,
                "transparency",
                &["transparencyScore"],
            ),
            base_step(
                Computation::SecurityAssessment,
                "security",
                &["securityScore", "vulnerabilityPenalty"],
            ),
            base_step(
                Computation::ComplianceCheck,
                "compliance",
                &["complianceScore", "coverage"],
            ),
        ];

        let mut last_optional: Option<StepId> = None;

        if self.flags.use_blockchain {
            steps.push(optional_step(
                Computation::BlockchainAnchoring,
                last_optional,
                &["results"],
                &["anchor"],
            ));
            last_optional = Some(Computation::BlockchainAnchoring.step_id());
        }

        if self.flags.use_oracle_consensus {
            steps.push(optional_step(
                Computation::OracleConsensus,
                last_optional,
                &["subject.reputation"],
                &["consensusScore", "oracleSubmissions"],
            ));
            last_optional = Some(Computation::OracleConsensus.step_id());
        }

        if self.flags.use_crypto_verification {
            steps.push(optional_step(
                Computation::CryptographicVerification,
                last_optional,
                &["provisionalScore"],
                &["proof"],
            ));
        }

        steps
    }
}

fn base_step(computation: Computation, input: &str, outputs: &[&str]) -> StepSpec {
    let weight = if computation == Computation::ComplianceCheck {
        SECONDARY_STEP_WEIGHT
    } else {
        PRIMARY_STEP_WEIGHT
    };
    StepSpec {
        id: computation.step_id(),
        name: computation.display_name().to_string(),
        weight,
        inputs: vec![format!("subject.{}", input)],
        outputs: outputs.iter().map(|s| s.to_string()).collect(),
        dependencies: Vec::new(),
        computation,
    }
}

fn optional_step(
    computation: Computation,
    previous_optional: Option<StepId>,
    inputs: &[&str],
    outputs: &[&str],
) -> StepSpec {
    let dependencies = match previous_optional {
        Some(id) => vec![id],
        None => BASE_STEP_IDS.to_vec(),
    };
    StepSpec {
        id: computation.step_id(),
        name: computation.display_name().to_string(),
        weight: SECONDARY_STEP_WEIGHT,
        inputs: inputs.iter().map(|s| s.to_string()).collect(),
        outputs: outputs.iter().map(|s| s.to_string()).collect(),
        dependencies,
        computation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_flag_combinations() -> Vec<PipelineFlags> {
        let mut combos = Vec::new();
        for bits in 0..8u8 {
            combos.push(PipelineFlags {
                use_blockchain: bits & 1 != 0,
                use_oracle_consensus: bits & 2 != 0,
                use_crypto_verification: bits & 4 != 0,
            });
        }
        combos
    }

    #[test]
    fn test_dependencies_always_precede_step() {
        for flags in all_flag_combinations() {
            let steps = StepCatalogBuilder::new(flags).build();
            for (idx, step) in steps.iter().enumerate() {
                for dep in &step.dependencies {
                    assert!(*dep < step.id, "{:?}: dep {} of step {}", flags, dep, step.id);
                    assert!(steps[..idx].iter().any(|s| s.id == *dep));
                }
            }
            let ids: Vec<StepId> = steps.iter().map(|s| s.id).collect();
            let mut sorted = ids.clone();
            sorted.sort();
            assert_eq!(ids, sorted);
        }
    }

    #[test]
    fn test_base_catalog_has_six_steps_weighing_085() {
        let steps = StepCatalogBuilder::new(PipelineFlags::default()).build();
        assert_eq!(steps.len(), 6);
        let total: f64 = steps.iter().map(|s| s.weight).sum();
        assert!((total - 0.85).abs() < 1e-10);
        assert!(steps.iter().all(|s| s.dependencies.is_empty()));
    }

    #[test]
    fn test_crypto_depends_on_blockchain_when_oracle_disabled() {
        let flags = PipelineFlags {
            use_blockchain: true,
            use_oracle_consensus: false,
            use_crypto_verification: true,
        };
        let steps = StepCatalogBuilder::new(flags).build();
        let ids: Vec<StepId> = steps.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6, 7, 9]);
        let crypto = steps.iter().find(|s| s.id == 9).unwrap();
        assert_eq!(crypto.dependencies, vec![7]);
    }

    #[test]
    fn test_optional_step_without_predecessor_depends_on_base() {
        let flags = PipelineFlags {
            use_blockchain: false,
            use_oracle_consensus: true,
            use_crypto_verification: false,
        };
        let steps = StepCatalogBuilder::new(flags).build();
        let oracle = steps.iter().find(|s| s.id == 8).unwrap();
        assert_eq!(oracle.dependencies, vec![1, 2, 3, 4, 5, 6]);
        assert!(steps.iter().all(|s| s.id != 7 && s.id != 9));
    }

    #[test]
    fn test_full_catalog_chains_optional_steps() {
        let steps = StepCatalogBuilder::new(PipelineFlags::all()).build();
        assert_eq!(steps.len(), 9);
        assert_eq!(steps[6].dependencies, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(steps[7].dependencies, vec![7]);
        assert_eq!(steps[8].dependencies, vec![8]);
        let total: f64 = steps.iter().map(|s| s.weight).sum();
        assert!((total - 1.15).abs() < 1e-10);
    }
}
