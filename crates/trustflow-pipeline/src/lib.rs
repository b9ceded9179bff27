// crates/trustflow-pipeline/src/lib.rs
//
// trustflow-pipeline: step execution, retry and degradation, aggregation,
// and the process registry for the Trustflow scoring pipeline.
//
// A scoring run flows: ProcessRegistry::initiate -> StepCatalogBuilder ->
// PipelineRunner (driver loop over RetryController/StepExecutor) ->
// Aggregator::finalize -> retained until the retention sweep.

pub mod aggregator;
pub mod config;
pub mod driver;
pub mod events;
pub mod executor;
pub mod lease;
pub mod registry;
pub mod retry;
pub mod scoring;
pub mod simulation;
pub mod stats;
pub mod store;
pub mod sweeper;

// Re-export key types for ergonomic access from downstream crates.
pub use aggregator::Aggregator;
pub use config::PipelineConfig;
pub use events::ProcessEvent;
pub use executor::{Collaborators, StepExecutor};
pub use registry::{ProcessRegistry, RegistryBuilder};
pub use retry::RetryController;
pub use stats::PipelineStatistics;
pub use store::InMemoryProcessStore;
pub use sweeper::run_sweep_loop;
