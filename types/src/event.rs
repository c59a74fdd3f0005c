//! Observed runtime events.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of runtime event. Closed set; patterns and events compare by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ProcessExec,
    ProcessExit,
    ProcessKprobe,
}

impl EventKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ProcessExec => "process_exec",
            Self::ProcessExit => "process_exit",
            Self::ProcessKprobe => "process_kprobe",
        }
    }

    /// Parse the snake_case name used in configuration and on the wire.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "process_exec" | "exec" => Some(Self::ProcessExec),
            "process_exit" | "exit" => Some(Self::ProcessExit),
            "process_kprobe" | "kprobe" => Some(Self::ProcessKprobe),
            _ => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One event pulled from the live stream.
///
/// `attributes` holds the contextual metadata captured at emission time
/// (for process events, the pod labels of the emitting process).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedEvent {
    pub kind: EventKind,
    pub process_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl ObservedEvent {
    #[must_use]
    pub fn new(kind: EventKind, process_name: impl Into<String>) -> Self {
        Self {
            kind,
            process_name: process_name.into(),
            namespace: None,
            attributes: BTreeMap::new(),
        }
    }

    /// A process execution event.
    #[must_use]
    pub fn exec<K, V>(process_name: impl Into<String>, attributes: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut event = Self::new(EventKind::ProcessExec, process_name);
        event.attributes = attributes
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        event
    }

    #[must_use]
    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

impl fmt::Display for ObservedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} process={:?}", self.kind, self.process_name)?;
        if let Some(namespace) = &self.namespace {
            write!(f, " namespace={namespace:?}")?;
        }
        for (key, value) in &self.attributes {
            write!(f, " {key}={value:?}")?;
        }
        Ok(())
    }
}
