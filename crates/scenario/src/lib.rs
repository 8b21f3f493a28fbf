//! Benchmark scenario: actor workflows, the load scheduler, and the
//! verification engine that checks every response against the reference model.

pub mod context;
pub mod deadline;
pub mod params;
pub mod retry;
pub mod scheduler;
pub mod verify;
pub mod workflow;

pub use context::{CourseLoad, LoadContext, Phase, StudentLoad};
pub use deadline::Deadline;
pub use retry::{Attempt, RetryPolicy};
pub use scheduler::{ramp_up, run_load, LoadScheduler};
