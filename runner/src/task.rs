//! Named units of work run alongside or after a checker.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::time::Instant;

/// A named, not yet started unit of work.
///
/// The future is lazy: nothing runs until the orchestrator spawns it.
pub struct Task {
    name: String,
    future: BoxFuture<'static, anyhow::Result<()>>,
}

impl Task {
    pub fn new<F>(name: impl Into<String>, future: F) -> Self
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            future: Box::pin(future),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run on its own tokio task so a panic is reported as a failure
    /// instead of tearing down the orchestrator.
    pub(crate) async fn execute(self) -> TaskOutcome {
        let Self { name, future } = self;
        let started = Instant::now();
        tracing::info!(task = %name, "Task started");
        let result = match tokio::spawn(future).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(format!("{e:#}")),
            Err(join_err) => Err(format!("task panicked: {join_err}")),
        };
        let outcome = TaskOutcome {
            name,
            result,
            elapsed: started.elapsed(),
        };
        match &outcome.result {
            Ok(()) => tracing::info!(task = %outcome.name, "Task finished"),
            Err(e) => tracing::warn!(task = %outcome.name, error = %e, "Task failed"),
        }
        outcome
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Result of one finished task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutcome {
    name: String,
    result: Result<(), String>,
    elapsed: Duration,
}

impl TaskOutcome {
    pub(crate) fn skipped(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            result: Err(reason.into()),
            elapsed: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        self.result.is_ok()
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.result.as_ref().err().map(String::as_str)
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}
