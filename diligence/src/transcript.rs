//! Session transcript writer.
//!
//! Every narrative line goes to the durable transcript file; most of it is
//! also echoed to the console. The file is therefore always a superset of
//! what the user saw.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, error};

struct Inner {
    path: PathBuf,
    console: Box<dyn Write + Send>,
    file: Option<File>,
    closed: bool,
    /// Whether the last shared write ended a line.
    at_line_start: bool,
}

impl Inner {
    fn append_file(&mut self, text: &str) -> io::Result<()> {
        if self.file.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            self.file = Some(file);
        }
        match self.file.as_mut() {
            Some(file) => file.write_all(text.as_bytes()),
            None => Ok(()),
        }
    }

    fn append_console(&mut self, text: &str) -> io::Result<()> {
        self.console.write_all(text.as_bytes())?;
        self.console.flush()
    }

    fn append_both(&mut self, chunk: &str) {
        if chunk.is_empty() {
            return;
        }
        self.at_line_start = chunk.ends_with('\n');
        if let Err(e) = self.append_console(chunk) {
            error!(error = %e, "failed to write transcript to console");
        }
        if let Err(e) = self.append_file(chunk) {
            error!(path = %self.path.display(), error = %e, "failed to append to transcript file");
        }
    }
}

/// Dual-sink, append-only transcript for one session.
///
/// The file is opened lazily on the first write and closed exactly once,
/// either by [`close`](Self::close) or on drop.
pub struct TranscriptWriter {
    inner: Mutex<Inner>,
}

impl TranscriptWriter {
    /// Create a writer that echoes to standard output.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_console(path, Box::new(io::stdout()))
    }

    /// Create a writer with a custom console sink.
    pub fn with_console(path: impl Into<PathBuf>, console: Box<dyn Write + Send>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                path: path.into(),
                console,
                file: None,
                closed: false,
                at_line_start: true,
            }),
        }
    }

    /// Path of the transcript file.
    pub fn path(&self) -> PathBuf {
        self.lock().path.clone()
    }

    /// Append `text` followed by `end` to both the console and the file.
    pub fn write(&self, text: &str, end: &str) {
        let mut inner = self.lock();
        if inner.closed {
            debug!("transcript closed, dropping write");
            return;
        }

        inner.append_both(&format!("{text}{end}"));
    }

    /// Append `text` as a line of its own, ending whatever partial line
    /// streamed text left behind.
    pub fn line(&self, text: &str) {
        let mut inner = self.lock();
        if inner.closed {
            debug!("transcript closed, dropping line");
            return;
        }

        let lead = if inner.at_line_start { "" } else { "\n" };
        inner.append_both(&format!("{lead}{text}\n"));
    }

    /// Append `text` to the file only.
    pub fn write_to_file(&self, text: &str) {
        let mut inner = self.lock();
        if inner.closed {
            debug!("transcript closed, dropping file write");
            return;
        }
        if let Err(e) = inner.append_file(text) {
            error!(path = %inner.path.display(), error = %e, "failed to append to transcript file");
        }
    }

    /// Flush and close the transcript file. Later calls do nothing.
    pub fn close(&self) {
        let mut inner = self.lock();
        if inner.closed {
            return;
        }
        inner.closed = true;

        if let Some(file) = inner.file.take() {
            if let Err(e) = file.sync_all() {
                error!(path = %inner.path.display(), error = %e, "failed to sync transcript file");
            }
        }
        if let Err(e) = inner.console.flush() {
            error!(error = %e, "failed to flush console");
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for TranscriptWriter {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for TranscriptWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscriptWriter")
            .field("path", &self.path())
            .finish_non_exhaustive()
    }
}
