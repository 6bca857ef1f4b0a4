//! Durable destinations for tool call records.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

/// An append-only destination for serialized records, one per line.
pub trait RecordSink: Send {
    /// Append one line. `line` carries no trailing newline.
    fn append(&mut self, line: &str) -> io::Result<()>;

    /// Flush and release the destination.
    fn close(&mut self) -> io::Result<()>;
}

/// JSON Lines file, created on the first append.
#[derive(Debug)]
pub struct JsonlFile {
    path: PathBuf,
    file: Option<File>,
}

impl JsonlFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }
}

impl RecordSink for JsonlFile {
    fn append(&mut self, line: &str) -> io::Result<()> {
        if self.file.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            self.file = Some(file);
        }

        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');
        match self.file.as_mut() {
            Some(file) => file.write_all(buf.as_bytes()),
            None => Ok(()),
        }
    }

    fn close(&mut self) -> io::Result<()> {
        match self.file.take() {
            Some(file) => file.sync_all(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn appends_one_line_per_record() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tool_calls.jsonl");
        let mut sink = JsonlFile::new(&path);
        assert!(!path.exists());

        sink.append(r#"{"sequence":1}"#).unwrap();
        sink.append(r#"{"sequence":2}"#).unwrap();
        sink.close().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "{\"sequence\":1}\n{\"sequence\":2}\n");
    }

    #[test]
    fn close_without_writes_creates_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tool_calls.jsonl");
        let mut sink = JsonlFile::new(&path);
        sink.close().unwrap();
        sink.close().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn reopens_in_append_mode() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tool_calls.jsonl");
        std::fs::write(&path, "existing\n").unwrap();

        let mut sink = JsonlFile::new(&path);
        sink.append("new").unwrap();
        sink.close().unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "existing\nnew\n");
    }
}
