//! Checker state machine.
//!
//! A [`Checker`] owns its run state exclusively. Other tasks interact with a
//! running checker only through a [`CheckerHandle`]: they can wait for the
//! readiness signal, observe the phase, and refresh the deadline.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, sleep_until};

use evcheck_types::{ExpectationSet, ObservedEvent};

use crate::control::{CheckerPhase, DeadlineControl};
use crate::export::EventExporter;
use crate::matching::{EngineAction, MatchState};
use crate::report::{CheckerReport, RunVerdict};
use crate::source::EventSource;

pub const DEFAULT_EVENT_LIMIT: u64 = 5000;
pub const DEFAULT_TIME_LIMIT: Duration = Duration::from_secs(5 * 60);

/// Event and time budgets for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckerLimits {
    pub event_limit: u64,
    pub time_limit: Duration,
}

impl Default for CheckerLimits {
    fn default() -> Self {
        Self {
            event_limit: DEFAULT_EVENT_LIMIT,
            time_limit: DEFAULT_TIME_LIMIT,
        }
    }
}

impl CheckerLimits {
    pub fn with_event_limit(mut self, event_limit: u64) -> Self {
        self.event_limit = event_limit;
        self
    }

    pub fn with_time_limit(mut self, time_limit: Duration) -> Self {
        self.time_limit = time_limit;
        self
    }
}

/// A configured, not yet started checker.
///
/// [`run`](Self::run) consumes the checker, so a finished run can never be
/// restarted; build a fresh checker instead.
#[derive(Debug)]
pub struct Checker {
    name: String,
    expectations: ExpectationSet,
    event_limit: u64,
    namespaces: BTreeSet<String>,
    exporter: Option<EventExporter>,
    deadline: Arc<DeadlineControl>,
    phase_tx: watch::Sender<CheckerPhase>,
}

impl Checker {
    #[must_use]
    pub fn new(name: impl Into<String>, expectations: ExpectationSet, limits: CheckerLimits) -> Self {
        let (phase_tx, _) = watch::channel(CheckerPhase::Configured);
        Self {
            name: name.into(),
            expectations,
            event_limit: limits.event_limit,
            namespaces: BTreeSet::new(),
            exporter: None,
            deadline: Arc::new(DeadlineControl::new(limits.time_limit)),
            phase_tx,
        }
    }

    /// Only consider events from these namespaces.
    ///
    /// Events outside the set, or without a namespace, are dropped before
    /// counting: they neither match nor consume the event budget. An empty
    /// set disables the filter.
    pub fn with_namespaces<I, S>(mut self, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.namespaces = namespaces.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_exporter(mut self, exporter: EventExporter) -> Self {
        self.exporter = Some(exporter);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn expectations(&self) -> &ExpectationSet {
        &self.expectations
    }

    #[must_use]
    pub fn handle(&self) -> CheckerHandle {
        CheckerHandle {
            name: self.name.clone().into(),
            phase_rx: self.phase_tx.subscribe(),
            deadline: Arc::clone(&self.deadline),
        }
    }

    fn in_scope(&self, event: &ObservedEvent) -> bool {
        if self.namespaces.is_empty() {
            return true;
        }
        event
            .namespace
            .as_ref()
            .is_some_and(|ns| self.namespaces.contains(ns))
    }

    /// Consume events from `source` until a terminal verdict.
    ///
    /// The readiness signal is published before the first event is awaited,
    /// so a producer that observed readiness cannot emit an event this run
    /// misses (modulo the source's own delivery guarantees).
    pub async fn run<S: EventSource>(mut self, mut source: S) -> CheckerReport {
        let started = Instant::now();
        let mut state = MatchState::new(self.expectations.clone());
        let mut events_seen: u64 = 0;
        let mut deadline = self.deadline.arm();
        self.phase_tx.send_replace(CheckerPhase::Listening);
        tracing::info!(
            checker = %self.name,
            patterns = state.expectations().len(),
            event_limit = self.event_limit,
            time_limit_secs = self.deadline.time_limit().as_secs(),
            "Checker listening"
        );

        let verdict = loop {
            tokio::select! {
                biased;

                () = self.deadline.changed() => {
                    if let Some(current) = self.deadline.current() {
                        deadline = current;
                    }
                }

                () = sleep_until(deadline) => {
                    // A reset may have landed after the sleep was armed.
                    match self.deadline.current() {
                        Some(current) if current > Instant::now() => deadline = current,
                        _ => break RunVerdict::Timeout,
                    }
                }

                next = source.next_event() => match next {
                    Ok(Some(event)) => {
                        if !self.in_scope(&event) {
                            tracing::trace!(checker = %self.name, %event, "Out of scope");
                            continue;
                        }
                        if let Some(exporter) = self.exporter.as_mut() {
                            exporter.record(&event);
                        }
                        events_seen += 1;
                        if events_seen > self.event_limit {
                            break RunVerdict::EventLimitExceeded;
                        }
                        match state.submit(&event) {
                            EngineAction::Matched(id) => {
                                tracing::info!(
                                    checker = %self.name,
                                    pattern = %id,
                                    matched = state.matched_count(),
                                    total = state.expectations().len(),
                                    %event,
                                    "Matched expected event"
                                );
                            }
                            EngineAction::AlreadySatisfied => {
                                tracing::debug!(checker = %self.name, %event, "Already satisfied");
                            }
                            EngineAction::NoMatch => {
                                tracing::trace!(checker = %self.name, %event, "No match");
                            }
                        }
                        if state.is_complete() {
                            break RunVerdict::Success;
                        }
                    }
                    Ok(None) => {
                        break RunVerdict::Failed {
                            reason: "event source closed before all expected events were seen"
                                .to_string(),
                        };
                    }
                    Err(e) => break RunVerdict::Failed { reason: e.to_string() },
                },
            }
        };

        self.deadline.disarm();
        if let Some(exporter) = self.exporter.as_mut() {
            exporter.finish();
        }
        self.phase_tx.send_replace(terminal_phase(&verdict));

        let unmatched: Vec<String> = state.unmatched().map(|(_, p)| p.to_string()).collect();
        let report = CheckerReport::new(
            self.name,
            verdict,
            events_seen,
            self.event_limit,
            started.elapsed(),
            state.expectations().len(),
            unmatched,
        );
        if report.passed() {
            tracing::info!(
                checker = %report.name(),
                events_seen,
                elapsed_ms = report.elapsed().as_millis() as u64,
                "Checker succeeded"
            );
        } else {
            tracing::warn!(
                checker = %report.name(),
                verdict = %report.verdict(),
                events_seen,
                unmatched = report.unmatched().len(),
                "Checker failed"
            );
        }
        report
    }
}

fn terminal_phase(verdict: &RunVerdict) -> CheckerPhase {
    match verdict {
        RunVerdict::Success => CheckerPhase::Succeeded,
        RunVerdict::Timeout => CheckerPhase::TimedOut,
        RunVerdict::EventLimitExceeded => CheckerPhase::EventLimitExceeded,
        RunVerdict::Failed { .. } => CheckerPhase::Failed,
    }
}

/// Cloneable view of a checker for collaborator tasks.
#[derive(Debug, Clone)]
pub struct CheckerHandle {
    name: Arc<str>,
    phase_rx: watch::Receiver<CheckerPhase>,
    deadline: Arc<DeadlineControl>,
}

impl CheckerHandle {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn phase(&self) -> CheckerPhase {
        *self.phase_rx.borrow()
    }

    /// Wait until the checker is listening (or has already finished a run).
    ///
    /// Returns `false` if that does not happen within `timeout`, or if the
    /// checker is dropped without ever running.
    pub async fn wait(&self, timeout: Duration) -> bool {
        if self.phase().has_started() {
            return true;
        }
        let mut rx = self.phase_rx.clone();
        let ready = tokio::time::timeout(timeout, rx.wait_for(|phase| phase.has_started())).await;
        let started = matches!(ready, Ok(Ok(_)));
        if !started {
            tracing::warn!(
                checker = %self.name,
                timeout_ms = timeout.as_millis() as u64,
                "Checker did not start in time"
            );
        }
        started
    }

    /// Push the deadline to `now + time_limit` without touching progress.
    ///
    /// Each call measures from the moment of the call; calls do not
    /// accumulate. A no-op unless the checker is listening.
    pub fn reset_timeout(&self) {
        match self.deadline.reset() {
            Some(_) => {
                tracing::info!(
                    checker = %self.name,
                    time_limit_secs = self.deadline.time_limit().as_secs(),
                    "Checker deadline reset"
                );
            }
            None => {
                tracing::debug!(checker = %self.name, "Ignoring deadline reset: checker not listening");
            }
        }
    }

    /// The current deadline, if the checker is listening.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline.current()
    }
}
