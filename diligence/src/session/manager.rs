//! Session directory allocation and lookup.

use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local};
use uuid::Uuid;

/// Name of the human-readable transcript inside a session directory.
const TRANSCRIPT_FILE: &str = "transcript.txt";

/// Name of the structured tool call log inside a session directory.
const TOOL_LOG_FILE: &str = "tool_calls.jsonl";

const SESSION_PREFIX: &str = "session_";

/// Attempts at finding an unused session directory name.
const MAX_CREATE_ATTEMPTS: usize = 8;

/// One run of the agent, with its own directory of artifacts.
///
/// Session ids sort chronologically: `session_YYYYMMDD_HHMMSS_xxxxxx`, where
/// the suffix is random so concurrent runs started in the same second do not
/// collide.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    dir: PathBuf,
}

impl Session {
    /// Allocate a new session directory under `logs_dir`.
    ///
    /// Only the directory is created; the transcript and tool log appear on
    /// their first write.
    pub fn create(logs_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(logs_dir)
            .with_context(|| format!("Failed to create directory: {}", logs_dir.display()))?;

        let started = Local::now();
        for _ in 0..MAX_CREATE_ATTEMPTS {
            let id = generate_session_id(started);
            let dir = logs_dir.join(&id);
            match std::fs::create_dir(&dir) {
                Ok(()) => {
                    tracing::info!(session = %id, dir = %dir.display(), "session created");
                    return Ok(Self { id, dir });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!("Failed to create session directory: {}", dir.display())
                    });
                }
            }
        }

        bail!(
            "Could not allocate a unique session directory under {}",
            logs_dir.display()
        )
    }

    /// Resolve an existing session by id, id without prefix, or directory path.
    pub fn open(logs_dir: &Path, reference: &str) -> Result<Self> {
        let candidates = [
            PathBuf::from(reference),
            logs_dir.join(reference),
            logs_dir.join(format!("{SESSION_PREFIX}{reference}")),
        ];

        let dir = candidates
            .into_iter()
            .find(|path| path.is_dir())
            .with_context(|| {
                format!("No session '{reference}' found in {}", logs_dir.display())
            })?;

        let id = dir
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .context("Session path has no directory name")?;

        Ok(Self { id, dir })
    }

    /// Sessions under `logs_dir`, newest first.
    pub fn list(logs_dir: &Path) -> Result<Vec<SessionSummary>> {
        if !logs_dir.is_dir() {
            return Ok(Vec::new());
        }

        let entries = std::fs::read_dir(logs_dir)
            .with_context(|| format!("Failed to read {}", logs_dir.display()))?;

        let mut sessions = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.starts_with(SESSION_PREFIX) || !entry.path().is_dir() {
                continue;
            }
            let session = Self {
                id: name,
                dir: entry.path(),
            };
            sessions.push(SessionSummary {
                records: count_lines(&session.tool_log_path())?,
                has_transcript: session.transcript_path().is_file(),
                session,
            });
        }

        sessions.sort_by(|a, b| b.session.id.cmp(&a.session.id));
        Ok(sessions)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn transcript_path(&self) -> PathBuf {
        self.dir.join(TRANSCRIPT_FILE)
    }

    pub fn tool_log_path(&self) -> PathBuf {
        self.dir.join(TOOL_LOG_FILE)
    }
}

/// A past session and what it recorded.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub session: Session,
    /// Lines in the tool call log.
    pub records: usize,
    pub has_transcript: bool,
}

fn generate_session_id(started: DateTime<Local>) -> String {
    let random = Uuid::now_v7().simple().to_string();
    let suffix = &random[random.len() - 6..];
    format!(
        "{SESSION_PREFIX}{}_{suffix}",
        started.format("%Y%m%d_%H%M%S")
    )
}

fn count_lines(path: &Path) -> Result<usize> {
    if !path.is_file() {
        return Ok(0);
    }
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mut count = 0;
    for line in BufReader::new(file).lines() {
        if !line?.trim().is_empty() {
            count += 1;
        }
    }
    Ok(count)
}
