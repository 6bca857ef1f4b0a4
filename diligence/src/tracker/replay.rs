//! Reading a session's tool call log back for review.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::warn;

use super::{delegate_name, delegation_description, is_delegation};
use crate::models::{ToolCallRecord, ToolOutcome};

/// Per-subagent totals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubagentTotals {
    pub calls: usize,
    pub errors: usize,
    pub interrupted: usize,
    pub synthetic: usize,
    pub busy: chrono::Duration,
}

impl Default for SubagentTotals {
    fn default() -> Self {
        Self {
            calls: 0,
            errors: 0,
            interrupted: 0,
            synthetic: 0,
            busy: chrono::Duration::zero(),
        }
    }
}

/// Parsed contents of a `tool_calls.jsonl` file.
#[derive(Debug, Clone, Default)]
pub struct SessionReport {
    /// Records ordered by sequence number.
    pub records: Vec<ToolCallRecord>,
    /// Lines that could not be parsed.
    pub skipped: usize,
}

impl SessionReport {
    /// Load a report from a log file on disk.
    pub fn load(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        Self::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to read {}", path.display()))
    }

    /// Parse a report from JSON Lines, skipping malformed lines.
    pub fn from_reader(reader: impl BufRead) -> io::Result<Self> {
        let mut report = Self::default();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ToolCallRecord>(&line) {
                Ok(record) => report.records.push(record),
                Err(e) => {
                    warn!(line = index + 1, error = %e, "skipping malformed tool call record");
                    report.skipped += 1;
                }
            }
        }
        report.records.sort_by_key(|record| record.sequence);
        Ok(report)
    }

    /// Totals per subagent, keyed by subagent name.
    pub fn totals(&self) -> BTreeMap<String, SubagentTotals> {
        let mut totals: BTreeMap<String, SubagentTotals> = BTreeMap::new();
        for record in &self.records {
            let entry = totals.entry(record.subagent.clone()).or_default();
            entry.calls += 1;
            match record.outcome {
                ToolOutcome::Success => {}
                ToolOutcome::Error => entry.errors += 1,
                ToolOutcome::Interrupted => entry.interrupted += 1,
            }
            if record.synthetic {
                entry.synthetic += 1;
            }
            entry.busy += record.elapsed();
        }
        totals
    }

    /// Delegation records in sequence order.
    pub fn delegations(&self) -> impl Iterator<Item = &ToolCallRecord> {
        self.records
            .iter()
            .filter(|record| is_delegation(&record.tool_name))
    }

    /// Human-readable summary.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Tool calls: {}", self.records.len());
        if self.skipped > 0 {
            let _ = writeln!(out, "Skipped malformed lines: {}", self.skipped);
        }

        let _ = writeln!(out, "\nBy subagent:");
        for (name, totals) in self.totals() {
            let _ = writeln!(
                out,
                "  {name:<20} calls={:<4} errors={:<3} interrupted={:<3} synthetic={:<3} time={:.1}s",
                totals.calls,
                totals.errors,
                totals.interrupted,
                totals.synthetic,
                seconds(totals.busy),
            );
        }

        let mut delegations = self.delegations().peekable();
        if delegations.peek().is_some() {
            let _ = writeln!(out, "\nDelegations:");
            for record in delegations {
                let _ = writeln!(
                    out,
                    "  #{:<4} {:<20} {:<11} {:>7.1}s  {}",
                    record.sequence,
                    delegate_name(&record.input),
                    record.outcome.as_str(),
                    seconds(record.elapsed()),
                    delegation_description(&record.input).unwrap_or_default(),
                );
            }
        }
        out
    }
}

#[allow(clippy::cast_precision_loss)]
fn seconds(duration: chrono::Duration) -> f64 {
    duration.num_milliseconds() as f64 / 1000.0
}
