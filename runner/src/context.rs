//! Explicit per-test context.
//!
//! Holds the defaults every run in a test starts from. There is no global
//! fixture: each test builds (or is handed) a `TestContext` and derives its
//! checkers and runs from it.

use std::path::PathBuf;
use std::time::Duration;

use evcheck_engine::{Checker, CheckerLimits, EventExporter};
use evcheck_types::ExpectationSet;

use crate::orchestrator::ParallelRun;
use crate::workload::{DEFAULT_ATTEMPTS, DEFAULT_WAIT_TIMEOUT, RetryPolicy};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDefaults {
    pub limits: CheckerLimits,
    pub wait_timeout: Duration,
    pub workload_attempts: u32,
    /// Namespaces checkers are scoped to. Empty means unscoped.
    pub namespaces: Vec<String>,
    /// Directory receiving one `<checker>.events.jsonl` per checker.
    pub export_dir: Option<PathBuf>,
}

impl Default for RunDefaults {
    fn default() -> Self {
        Self {
            limits: CheckerLimits::default(),
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            workload_attempts: DEFAULT_ATTEMPTS,
            namespaces: Vec::new(),
            export_dir: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TestContext {
    defaults: RunDefaults,
}

impl TestContext {
    #[must_use]
    pub fn new(defaults: RunDefaults) -> Self {
        Self { defaults }
    }

    #[must_use]
    pub fn defaults(&self) -> &RunDefaults {
        &self.defaults
    }

    /// A checker using the context's limits.
    #[must_use]
    pub fn checker(&self, name: &str, expectations: ExpectationSet) -> Checker {
        self.checker_with_limits(name, expectations, self.defaults.limits)
    }

    /// A checker with per-run limits overriding the context defaults.
    #[must_use]
    pub fn checker_with_limits(
        &self,
        name: &str,
        expectations: ExpectationSet,
        limits: CheckerLimits,
    ) -> Checker {
        let mut checker =
            Checker::new(name, expectations, limits).with_namespaces(self.defaults.namespaces.iter().cloned());
        if let Some(dir) = &self.defaults.export_dir {
            let path = dir.join(export_file_name(name));
            match EventExporter::create(&path) {
                Ok(exporter) => checker = checker.with_exporter(exporter),
                Err(e) => {
                    tracing::warn!(path = %path.display(), "Event export unavailable: {e}");
                }
            }
        }
        checker
    }

    #[must_use]
    pub fn parallel(&self, checker: Checker) -> ParallelRun {
        ParallelRun::new(checker)
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            wait_timeout: self.defaults.wait_timeout,
            attempts: self.defaults.workload_attempts,
        }
    }
}

/// `<name>.events.jsonl`, with anything that could leave the export
/// directory replaced.
fn export_file_name(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    format!("{stem}.events.jsonl")
}
