//! Parallel orchestration: checker and collaborators under fork/join, then
//! strictly sequential cleanup.
//!
//! ```text
//! setup (sequential) -> [ checker.run  ||  collaborator_1 || ... ] -> cleanup (sequential)
//! ```
//!
//! Cleanup always runs, whatever happened before it. The test passes only
//! if every setup step passed, the checker succeeded, every collaborator
//! succeeded, and every cleanup step succeeded.

use std::fmt;
use std::future::Future;

use futures_util::future::join_all;

use evcheck_engine::{Checker, CheckerHandle, CheckerReport, EventSource};

use crate::task::{Task, TaskOutcome};

type CollaboratorFactory = Box<dyn FnOnce(CheckerHandle) -> Task + Send>;

/// Builder for one orchestrated test run.
pub struct ParallelRun {
    checker: Checker,
    setup: Vec<Task>,
    collaborators: Vec<CollaboratorFactory>,
    cleanup: Vec<Task>,
}

impl ParallelRun {
    #[must_use]
    pub fn new(checker: Checker) -> Self {
        Self {
            checker,
            setup: Vec::new(),
            collaborators: Vec::new(),
            cleanup: Vec::new(),
        }
    }

    /// A step that must succeed before the checker and collaborators start.
    pub fn setup(mut self, task: Task) -> Self {
        self.setup.push(task);
        self
    }

    /// A task run concurrently with the checker. It receives a handle to
    /// wait for readiness or refresh the checker deadline.
    pub fn collaborator<F, Fut>(mut self, name: impl Into<String>, start: F) -> Self
    where
        F: FnOnce(CheckerHandle) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let name = name.into();
        self.collaborators
            .push(Box::new(move |handle| Task::new(name, start(handle))));
        self
    }

    /// A step run after the checker and all collaborators have finished.
    pub fn cleanup(mut self, task: Task) -> Self {
        self.cleanup.push(task);
        self
    }

    pub async fn run<S>(self, source: S) -> TestOutcome
    where
        S: EventSource + 'static,
    {
        let Self {
            checker,
            setup,
            collaborators,
            cleanup,
        } = self;
        let checker_name = checker.name().to_string();

        let mut setup_outcomes = Vec::with_capacity(setup.len());
        let mut setup_failed = false;
        for task in setup {
            if setup_failed {
                setup_outcomes.push(TaskOutcome::skipped(task.name(), "skipped: earlier setup failed"));
                continue;
            }
            let outcome = task.execute().await;
            setup_failed = !outcome.passed();
            setup_outcomes.push(outcome);
        }

        let (checker_outcome, collaborator_outcomes) = if setup_failed {
            tracing::warn!(checker = %checker_name, "Setup failed; checker and collaborators not started");
            (Err("not started: setup failed".to_string()), Vec::new())
        } else {
            let handle = checker.handle();
            let checker_task = tokio::spawn(checker.run(source));
            let collaborator_runs = collaborators
                .into_iter()
                .map(|factory| factory(handle.clone()).execute());
            let (checker_result, collaborator_outcomes) =
                tokio::join!(checker_task, join_all(collaborator_runs));
            let checker_outcome =
                checker_result.map_err(|join_err| format!("checker task panicked: {join_err}"));
            (checker_outcome, collaborator_outcomes)
        };

        let mut cleanup_outcomes = Vec::with_capacity(cleanup.len());
        for task in cleanup {
            cleanup_outcomes.push(task.execute().await);
        }

        let outcome = TestOutcome {
            checker_name,
            setup: setup_outcomes,
            checker: checker_outcome,
            collaborators: collaborator_outcomes,
            cleanup: cleanup_outcomes,
        };
        if outcome.passed() {
            tracing::info!(checker = %outcome.checker_name, "Test passed");
        } else {
            tracing::warn!(
                checker = %outcome.checker_name,
                failures = outcome.failures().len(),
                "Test failed"
            );
        }
        outcome
    }
}

impl fmt::Debug for ParallelRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParallelRun")
            .field("checker", &self.checker.name())
            .field("setup", &self.setup)
            .field("collaborators", &self.collaborators.len())
            .field("cleanup", &self.cleanup)
            .finish()
    }
}

/// Aggregated verdict of one orchestrated run.
#[derive(Debug, Clone)]
pub struct TestOutcome {
    checker_name: String,
    setup: Vec<TaskOutcome>,
    checker: Result<CheckerReport, String>,
    collaborators: Vec<TaskOutcome>,
    cleanup: Vec<TaskOutcome>,
}

impl TestOutcome {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.failures().is_empty()
    }

    /// The checker report, or why none exists (setup failed, checker panicked).
    pub fn checker(&self) -> Result<&CheckerReport, &str> {
        self.checker.as_ref().map_err(String::as_str)
    }

    #[must_use]
    pub fn setup(&self) -> &[TaskOutcome] {
        &self.setup
    }

    #[must_use]
    pub fn collaborators(&self) -> &[TaskOutcome] {
        &self.collaborators
    }

    #[must_use]
    pub fn cleanup(&self) -> &[TaskOutcome] {
        &self.cleanup
    }

    /// Every failure reason, in the order they matter: setup, checker,
    /// collaborators, cleanup. Empty iff the test passed.
    #[must_use]
    pub fn failures(&self) -> Vec<String> {
        let mut failures = Vec::new();
        for task in &self.setup {
            if let Some(e) = task.error() {
                failures.push(format!("setup '{}' failed: {e}", task.name()));
            }
        }
        match &self.checker {
            Ok(report) if report.passed() => {}
            Ok(report) => failures.push(report.detail()),
            Err(reason) => failures.push(format!("checker '{}' {reason}", self.checker_name)),
        }
        for task in &self.collaborators {
            if let Some(e) = task.error() {
                failures.push(format!("collaborator '{}' failed: {e}", task.name()));
            }
        }
        for task in &self.cleanup {
            if let Some(e) = task.error() {
                failures.push(format!("cleanup '{}' failed: {e}", task.name()));
            }
        }
        failures
    }

    /// Single human-readable detail string for the outer harness.
    #[must_use]
    pub fn detail(&self) -> String {
        let failures = self.failures();
        if failures.is_empty() {
            return match &self.checker {
                Ok(report) => report.detail(),
                Err(reason) => reason.clone(),
            };
        }
        failures.join("\n")
    }
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.passed() { "PASS" } else { "FAIL" };
        write!(f, "{status}: {}", self.detail())
    }
}
