//! Expected event patterns and the unordered expectation set.
//!
//! Both types are immutable once built. Match progress is tracked by the
//! engine against a [`PatternId`], never by mutating the patterns.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::event::{EventKind, ObservedEvent};
use crate::pattern::{AttributePattern, PatternError};

/// Stable index of a pattern within its [`ExpectationSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatternId(usize);

impl PatternId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for PatternId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Declarative description of one event that must be observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedEventPattern {
    kind: EventKind,
    process_name: String,
    attributes: BTreeMap<String, AttributePattern>,
}

impl ExpectedEventPattern {
    pub fn new(kind: EventKind, process_name: impl Into<String>) -> Result<Self, PatternError> {
        let process_name = process_name.into();
        if process_name.trim().is_empty() {
            return Err(PatternError::EmptyProcessName);
        }
        Ok(Self {
            kind,
            process_name,
            attributes: BTreeMap::new(),
        })
    }

    pub fn process_exec(process_name: impl Into<String>) -> Result<Self, PatternError> {
        Self::new(EventKind::ProcessExec, process_name)
    }

    /// Require attribute `key` to be present and satisfy `pattern`.
    ///
    /// Declaring the same key twice keeps the last pattern.
    pub fn with_attribute(
        mut self,
        key: impl Into<String>,
        pattern: AttributePattern,
    ) -> Result<Self, PatternError> {
        let key = key.into();
        if key.is_empty() {
            return Err(PatternError::EmptyAttributeKey);
        }
        self.attributes.insert(key, pattern);
        Ok(self)
    }

    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    #[must_use]
    pub fn process_name(&self) -> &str {
        &self.process_name
    }

    #[must_use]
    pub fn attributes(&self) -> &BTreeMap<String, AttributePattern> {
        &self.attributes
    }

    /// Subset match: kind and process name must be equal, and every declared
    /// attribute must be present on the event and satisfy its pattern.
    /// Attributes the pattern does not declare are ignored.
    #[must_use]
    pub fn matches(&self, event: &ObservedEvent) -> bool {
        self.kind == event.kind
            && self.process_name == event.process_name
            && self.attributes.iter().all(|(key, pattern)| {
                event
                    .attribute(key)
                    .is_some_and(|value| pattern.matches(value))
            })
    }
}

impl fmt::Display for ExpectedEventPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} process={:?}", self.kind, self.process_name)?;
        for (key, pattern) in &self.attributes {
            write!(f, " {key}={pattern}")?;
        }
        Ok(())
    }
}

/// Unordered, non-empty, fixed collection of expected patterns.
///
/// Cloning is cheap; clones share the same patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectationSet {
    patterns: Arc<[ExpectedEventPattern]>,
}

impl ExpectationSet {
    pub fn new(
        patterns: impl IntoIterator<Item = ExpectedEventPattern>,
    ) -> Result<Self, PatternError> {
        let patterns: Arc<[ExpectedEventPattern]> = patterns.into_iter().collect();
        if patterns.is_empty() {
            return Err(PatternError::EmptyExpectationSet);
        }
        Ok(Self { patterns })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: PatternId) -> Option<&ExpectedEventPattern> {
        self.patterns.get(id.0)
    }

    /// Patterns in declaration order, paired with their ids.
    pub fn iter(&self) -> impl Iterator<Item = (PatternId, &ExpectedEventPattern)> {
        self.patterns
            .iter()
            .enumerate()
            .map(|(index, pattern)| (PatternId(index), pattern))
    }
}
