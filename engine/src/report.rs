//! Terminal verdicts and the per-run report handed to the outer harness.

use std::fmt;
use std::time::Duration;

/// Outcome of one checker run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunVerdict {
    Success,
    Timeout,
    EventLimitExceeded,
    Failed { reason: String },
}

impl RunVerdict {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Timeout => "timeout",
            Self::EventLimitExceeded => "event limit exceeded",
            Self::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for RunVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed { reason } => write!(f, "failed: {reason}"),
            other => f.write_str(other.label()),
        }
    }
}

/// Summary of a finished run.
///
/// `unmatched` holds the rendered patterns that never matched, in
/// declaration order, so a human can see which process/label combinations
/// never appeared.
#[derive(Debug, Clone)]
pub struct CheckerReport {
    name: String,
    verdict: RunVerdict,
    events_seen: u64,
    event_limit: u64,
    elapsed: Duration,
    expected: usize,
    unmatched: Vec<String>,
}

impl CheckerReport {
    #[must_use]
    pub fn new(
        name: String,
        verdict: RunVerdict,
        events_seen: u64,
        event_limit: u64,
        elapsed: Duration,
        expected: usize,
        unmatched: Vec<String>,
    ) -> Self {
        Self {
            name,
            verdict,
            events_seen,
            event_limit,
            elapsed,
            expected,
            unmatched,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn verdict(&self) -> &RunVerdict {
        &self.verdict
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        self.verdict.is_success()
    }

    /// Raw count of in-scope events consumed, including the one that
    /// tripped the event limit.
    #[must_use]
    pub fn events_seen(&self) -> u64 {
        self.events_seen
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    #[must_use]
    pub fn unmatched(&self) -> &[String] {
        &self.unmatched
    }

    #[must_use]
    pub fn matched_count(&self) -> usize {
        self.expected - self.unmatched.len()
    }

    /// Human-readable detail: verdict, progress, and every unmatched pattern.
    #[must_use]
    pub fn detail(&self) -> String {
        let mut out = format!(
            "checker '{}': {} ({}/{} patterns matched, {} events seen",
            self.name,
            self.verdict,
            self.matched_count(),
            self.expected,
            self.events_seen,
        );
        if matches!(self.verdict, RunVerdict::EventLimitExceeded) {
            out.push_str(&format!(", limit {}", self.event_limit));
        }
        out.push_str(&format!(", {:.1}s)", self.elapsed.as_secs_f64()));
        if !self.passed() && !self.unmatched.is_empty() {
            out.push_str("\nunmatched:");
            for pattern in &self.unmatched {
                out.push_str("\n  - ");
                out.push_str(pattern);
            }
        }
        out
    }
}

impl fmt::Display for CheckerReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.detail())
    }
}
