//! Matching engine: reconciles observed events against an unordered
//! expectation set.
//!
//! Patterns are immutable and shared; the only mutable state is one
//! `matched` flag per pattern, which moves false -> true and never back.

use evcheck_types::{ExpectationSet, ExpectedEventPattern, ObservedEvent, PatternId};

/// Result of submitting one event to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineAction {
    /// No pattern, matched or not, accepts the event.
    NoMatch,
    /// The event satisfied this previously unmatched pattern.
    Matched(PatternId),
    /// Only patterns that were already matched accept the event.
    AlreadySatisfied,
}

#[derive(Debug, Clone)]
pub struct MatchState {
    expectations: ExpectationSet,
    matched: Vec<bool>,
    remaining: usize,
}

impl MatchState {
    #[must_use]
    pub fn new(expectations: ExpectationSet) -> Self {
        let len = expectations.len();
        Self {
            expectations,
            matched: vec![false; len],
            remaining: len,
        }
    }

    /// Match `event` against the first unmatched pattern (declaration order)
    /// that accepts it. Events are not assumed to arrive in any order.
    pub fn submit(&mut self, event: &ObservedEvent) -> EngineAction {
        let mut satisfied_elsewhere = false;
        for (id, pattern) in self.expectations.iter() {
            if !pattern.matches(event) {
                continue;
            }
            if self.matched[id.index()] {
                satisfied_elsewhere = true;
                continue;
            }
            self.matched[id.index()] = true;
            self.remaining -= 1;
            return EngineAction::Matched(id);
        }
        if satisfied_elsewhere {
            EngineAction::AlreadySatisfied
        } else {
            EngineAction::NoMatch
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.remaining == 0
    }

    #[must_use]
    pub fn is_matched(&self, id: PatternId) -> bool {
        self.matched.get(id.index()).copied().unwrap_or(false)
    }

    #[must_use]
    pub fn matched_count(&self) -> usize {
        self.matched.len() - self.remaining
    }

    #[must_use]
    pub fn expectations(&self) -> &ExpectationSet {
        &self.expectations
    }

    pub fn unmatched(&self) -> impl Iterator<Item = (PatternId, &ExpectedEventPattern)> {
        self.expectations
            .iter()
            .filter(|(id, _)| !self.matched[id.index()])
    }
}
