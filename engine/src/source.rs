//! Event sources.
//!
//! The transport that delivers events is opaque to the checker: anything
//! that can yield `ObservedEvent`s one at a time, signal end-of-stream, or
//! fail implements [`EventSource`].

use std::collections::BTreeMap;
use std::future::Future;
use std::path::Path;

use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::mpsc;

use evcheck_types::{EventKind, ObservedEvent};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("event source I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed event on line {line}: {source}")]
    Decode {
        line: u64,
        #[source]
        source: serde_json::Error,
    },
    #[error("event transport failed: {0}")]
    Transport(String),
}

/// A sequence of observed events.
///
/// `Ok(None)` signals end-of-stream. `next_event` must be cancel-safe: the
/// run loop races it against the deadline and drops the pending future when
/// the deadline wins, so no event may be lost by dropping it.
pub trait EventSource: Send {
    fn next_event(
        &mut self,
    ) -> impl Future<Output = Result<Option<ObservedEvent>, SourceError>> + Send;
}

impl EventSource for mpsc::Receiver<ObservedEvent> {
    async fn next_event(&mut self) -> Result<Option<ObservedEvent>, SourceError> {
        Ok(self.recv().await)
    }
}

impl EventSource for mpsc::UnboundedReceiver<ObservedEvent> {
    async fn next_event(&mut self) -> Result<Option<ObservedEvent>, SourceError> {
        Ok(self.recv().await)
    }
}

/// Adapts any stream of fallible events (e.g. a subscription client).
#[derive(Debug)]
pub struct StreamSource<S> {
    inner: S,
}

impl<S> StreamSource<S>
where
    S: Stream<Item = Result<ObservedEvent, SourceError>> + Unpin + Send,
{
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S> EventSource for StreamSource<S>
where
    S: Stream<Item = Result<ObservedEvent, SourceError>> + Unpin + Send,
{
    async fn next_event(&mut self) -> Result<Option<ObservedEvent>, SourceError> {
        self.inner.next().await.transpose()
    }
}

/// Reads newline-delimited JSON events from any async reader.
///
/// Blank lines and export records of unsupported event kinds are skipped.
/// Anything else that does not decode is an error, fatal to the run.
#[derive(Debug)]
pub struct JsonLinesSource<R> {
    lines: Lines<R>,
    line_no: u64,
}

impl<R> JsonLinesSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
        }
    }
}

impl JsonLinesSource<BufReader<tokio::fs::File>> {
    pub async fn open(path: &Path) -> Result<Self, SourceError> {
        let file = tokio::fs::File::open(path).await?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R> EventSource for JsonLinesSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_event(&mut self) -> Result<Option<ObservedEvent>, SourceError> {
        loop {
            let Some(line) = self.lines.next_line().await? else {
                return Ok(None);
            };
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            match decode_event_line(&line).map_err(|source| SourceError::Decode {
                line: self.line_no,
                source,
            })? {
                Some(event) => return Ok(Some(event)),
                None => {
                    tracing::debug!(line = self.line_no, "Skipping unsupported event record");
                }
            }
        }
    }
}

/// Top-level keys of the export encoding this crate understands.
const EXPORT_KINDS: [&str; 3] = ["process_exec", "process_exit", "process_kprobe"];

/// Process-event export encoding: one top-level key per event kind.
#[derive(Deserialize)]
struct ExportRecord {
    process_exec: Option<ExportProcessEvent>,
    process_exit: Option<ExportProcessEvent>,
    process_kprobe: Option<ExportProcessEvent>,
}

#[derive(Deserialize)]
struct ExportProcessEvent {
    process: ExportProcess,
}

#[derive(Deserialize)]
struct ExportProcess {
    binary: String,
    #[serde(default)]
    pod: Option<ExportPod>,
}

#[derive(Deserialize)]
struct ExportPod {
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default)]
    pod_labels: BTreeMap<String, String>,
}

/// Decode one JSON line.
///
/// Accepts the flat [`ObservedEvent`] encoding and the nested export
/// encoding (`{"process_exec":{"process":{"binary":..,"pod":{..}}}}`), in
/// which the process name is the basename of `binary` and the attributes
/// are the pod labels.
///
/// A record carrying `kind` or `process_name` must be a complete flat
/// event. Returns `Ok(None)` only for export records of other kinds
/// (`process_lsm`, ...); any other object is an error.
pub fn decode_event_line(line: &str) -> Result<Option<ObservedEvent>, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(line)?;
    let Some(record) = value.as_object() else {
        return Err(unrecognized("event record is not a JSON object"));
    };
    if record.contains_key("kind") || record.contains_key("process_name") {
        return ObservedEvent::deserialize(value).map(Some);
    }
    if EXPORT_KINDS.iter().any(|kind| record.contains_key(*kind)) {
        return ExportRecord::deserialize(value).map(ExportRecord::into_event);
    }
    if record.keys().any(|key| key.starts_with("process_")) {
        return Ok(None);
    }
    Err(unrecognized("no known event key in record"))
}

fn unrecognized(msg: &str) -> serde_json::Error {
    <serde_json::Error as serde::de::Error>::custom(msg)
}

impl ExportRecord {
    fn into_event(self) -> Option<ObservedEvent> {
        let (kind, body) = if let Some(body) = self.process_exec {
            (EventKind::ProcessExec, body)
        } else if let Some(body) = self.process_exit {
            (EventKind::ProcessExit, body)
        } else if let Some(body) = self.process_kprobe {
            (EventKind::ProcessKprobe, body)
        } else {
            return None;
        };

        let binary = body.process.binary;
        let name = binary.rsplit('/').next().unwrap_or(&binary).to_string();
        let mut event = ObservedEvent::new(kind, name);
        if let Some(pod) = body.process.pod {
            event.namespace = pod.namespace;
            event.attributes = pod.pod_labels;
        }
        Some(event)
    }
}
