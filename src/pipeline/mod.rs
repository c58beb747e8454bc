// Extract-transform pipeline: concurrent extraction, sequential transform, batch load

pub mod extraction;
pub mod orchestrator;
pub mod processing;

pub use extraction::{ExtractionCoordinator, ExtractionPlan, ExtractionReport};
pub use orchestrator::{PipelineOrchestrator, RunOutcome, RunSummary};
