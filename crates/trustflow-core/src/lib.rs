// crates/trustflow-core/src/lib.rs
//
// trustflow-core: Core types, step catalog, and trait interfaces for the
// Trustflow staged trust-scoring pipeline.
//
// This is the leaf crate that all other crates in the workspace depend on.
// It defines the process data model, the error taxonomy, the step catalog
// builder, and the contracts of the external collaborators.

pub mod catalog;
pub mod collaborators;
pub mod error;
pub mod process;
pub mod step;
pub mod subject;
pub mod traits;

// Re-export key types for ergonomic access from downstream crates.
// Usage: `use trustflow_core::ScoringProcess;`

// Process types
pub use process::{
    AnchorRecord, ProcessId, ProcessMetadata, ProcessStatus, ProofRecord, ScoringProcess,
};

// Step types
pub use catalog::{PipelineFlags, StepCatalogBuilder};
pub use step::{Computation, ResultOrigin, StepId, StepResult, StepSpec};

// Subject types
pub use subject::{
    validate_subject_id, ComplianceMetrics, DecisionRecord, OperationalMetrics, SecurityMetrics,
    SubjectProfile, TechnicalMetrics, TransparencyMetrics,
};

// Collaborator payloads
pub use collaborators::{
    AnchorReceipt, BiasAnalysis, ConsensusValue, FairnessMetrics, OracleConsensusReport,
    OracleSubmission, ProofOutput, ProofPrivateInputs, Severity,
};

// Error type
pub use error::TrustflowError;

// Traits
pub use traits::{
    BiasAnalysisService, BlockchainAnchorService, FairnessScorer, OracleConsensusService,
    ProcessStore, ProofService, SubjectDirectory,
};
