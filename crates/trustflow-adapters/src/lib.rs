// crates/trustflow-adapters/src/lib.rs
//
// trustflow-adapters: local, in-process implementations of the services a
// scoring pipeline consumes. Used by the daemon for standalone runs and by
// integration tests that want realistic collaborators.

pub mod anchor;
pub mod bias;
pub mod directory;
pub mod oracle;
pub mod prover;

pub use anchor::LocalLedger;
pub use bias::{GroupRateFairnessScorer, HistoricalBiasAnalyzer};
pub use directory::StaticSubjectDirectory;
pub use oracle::LocalOracleNetwork;
pub use prover::HashCommitmentProver;
