//! Attribute matchers.
//!
//! The matcher set is closed: a value either has to equal a literal byte for
//! byte, or has to satisfy a regular expression over its *entire* length.
//! Labels such as `pod-template-hash` are opaque tokens, so a prefix hit
//! (`abc123-xyz` against `[a-f0-9]+`) must not count as a match.

use std::fmt;

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum PatternError {
    #[error("invalid regex `{pattern}`: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("expected event pattern must name a process")]
    EmptyProcessName,
    #[error("attribute key must not be empty")]
    EmptyAttributeKey,
    #[error("expectation set must contain at least one pattern")]
    EmptyExpectationSet,
}

/// A predicate over a single attribute value.
#[derive(Clone)]
pub enum AttributePattern {
    Exact(String),
    Regex(FullMatchRegex),
}

impl AttributePattern {
    #[must_use]
    pub fn exact(value: impl Into<String>) -> Self {
        Self::Exact(value.into())
    }

    /// Compile a full-match regex pattern. Fails fast on invalid syntax.
    pub fn regex(pattern: &str) -> Result<Self, PatternError> {
        FullMatchRegex::new(pattern).map(Self::Regex)
    }

    #[must_use]
    pub fn matches(&self, value: &str) -> bool {
        match self {
            Self::Exact(expected) => expected == value,
            Self::Regex(regex) => regex.is_full_match(value),
        }
    }
}

impl fmt::Debug for AttributePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for AttributePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(value) => write!(f, "exact({value:?})"),
            Self::Regex(regex) => write!(f, "regex({:?})", regex.source()),
        }
    }
}

impl PartialEq for AttributePattern {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Exact(a), Self::Exact(b)) => a == b,
            (Self::Regex(a), Self::Regex(b)) => a.source() == b.source(),
            _ => false,
        }
    }
}

impl Eq for AttributePattern {}

/// A regex anchored at both ends.
///
/// The user-supplied source is kept for display; the compiled form wraps it
/// in `^(?:...)$` so alternations cannot escape the anchors.
#[derive(Clone)]
pub struct FullMatchRegex {
    source: String,
    compiled: Regex,
}

impl FullMatchRegex {
    pub fn new(pattern: &str) -> Result<Self, PatternError> {
        let compiled =
            Regex::new(&format!("^(?:{pattern})$")).map_err(|source| PatternError::InvalidRegex {
                pattern: pattern.to_string(),
                source,
            })?;
        Ok(Self {
            source: pattern.to_string(),
            compiled,
        })
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn is_full_match(&self, value: &str) -> bool {
        self.compiled.is_match(value)
    }
}
