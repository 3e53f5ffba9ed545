//! Process selection, controller grouping and the built-in scheduling
//! controller.

pub mod orchestrator;
pub mod schedule;

pub use orchestrator::{ProcessOrchestrator, RunOptions, StopOutcome};
pub use schedule::ScheduleController;
