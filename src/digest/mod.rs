//! Digest run engine: phase-by-phase orchestration and its summary types.

pub mod orchestrator;
pub mod types;

pub use orchestrator::DigestOrchestrator;
pub use types::{RunSummary, SchedulePreview, SendOutcome};
