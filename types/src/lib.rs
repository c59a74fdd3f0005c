//! Core domain types for evcheck.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer: the engine consumes
//! [`ObservedEvent`]s against an [`ExpectationSet`], configuration builds the
//! set, and the runner renders unmatched patterns in failure details.

mod event;
mod expectation;
mod pattern;
mod text;

pub use event::{EventKind, ObservedEvent};
pub use expectation::{ExpectationSet, ExpectedEventPattern, PatternId};
pub use pattern::{AttributePattern, FullMatchRegex, PatternError};
pub use text::{tail_lines, truncate_with_ellipsis};
