//! JSON-lines export of observed events for post-mortem diagnosis.
//!
//! Export is best effort: a write failure is logged once and disables the
//! exporter, it never changes the verdict of the run.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use evcheck_types::ObservedEvent;

#[derive(Debug)]
pub struct EventExporter {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    written: u64,
}

impl EventExporter {
    /// Create (or truncate) the export file, creating parent directories.
    pub fn create(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;
        Ok(Self {
            path,
            writer: Some(BufWriter::new(file)),
            written: 0,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn record(&mut self, event: &ObservedEvent) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        let result = serde_json::to_writer(&mut *writer, event)
            .map_err(std::io::Error::from)
            .and_then(|()| writer.write_all(b"\n"));
        match result {
            Ok(()) => self.written += 1,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "Event export disabled: {e}");
                self.writer = None;
            }
        }
    }

    pub fn finish(&mut self) {
        if let Some(mut writer) = self.writer.take()
            && let Err(e) = writer.flush()
        {
            tracing::warn!(path = %self.path.display(), "Failed to flush event export: {e}");
        }
    }
}

impl Drop for EventExporter {
    fn drop(&mut self) {
        self.finish();
    }
}
