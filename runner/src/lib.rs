//! Parallel orchestration for evcheck.
//!
//! A [`ParallelRun`] runs one checker concurrently with collaborator tasks
//! (typically a workload that waits for the checker, then installs
//! something), then runs cleanup strictly afterwards. [`TestContext`]
//! supplies the per-test defaults.

mod command;
mod context;
mod orchestrator;
mod task;
mod workload;

pub use command::CommandSpec;
pub use context::{RunDefaults, TestContext};
pub use orchestrator::{ParallelRun, TestOutcome};
pub use task::{Task, TaskOutcome};
pub use workload::{DEFAULT_ATTEMPTS, DEFAULT_WAIT_TIMEOUT, RetryPolicy, run_workload};
