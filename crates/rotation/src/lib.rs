//! Snapshot rotation: the retain-one policy, the per-run orchestrator and
//! the cron-driven scheduler loop that drives it.

pub mod error;
pub mod orchestrator;
pub mod policy;
pub mod scheduler;

pub use error::SchedulerError;
pub use orchestrator::{RunSummary, Rotator};
pub use scheduler::{next_run_after, parse_cron, run_scheduler, RotationSchedule};
