//! Unordered event matching engine for evcheck.
//!
//! # Architecture
//!
//! ```text
//! EventSource -> Checker::run -> MatchState::submit -> CheckerReport
//!                     |
//!                     +-- CheckerHandle (wait / reset_timeout / phase)
//! ```
//!
//! A [`Checker`] is configured once with an immutable
//! [`ExpectationSet`](evcheck_types::ExpectationSet) and consumed by
//! [`Checker::run`]. Concurrent collaborators only ever see a
//! [`CheckerHandle`].

mod checker;
mod control;
mod export;
mod matching;
mod report;
mod source;

pub use checker::{
    Checker, CheckerHandle, CheckerLimits, DEFAULT_EVENT_LIMIT, DEFAULT_TIME_LIMIT,
};
pub use control::CheckerPhase;
pub use export::EventExporter;
pub use matching::{EngineAction, MatchState};
pub use report::{CheckerReport, RunVerdict};
pub use source::{EventSource, JsonLinesSource, SourceError, StreamSource, decode_event_line};
