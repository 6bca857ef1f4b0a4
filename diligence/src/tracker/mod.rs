//! Subagent tracking.
//!
//! The tracker receives the runtime's pre/post tool hooks, attributes every
//! call to the subagent context that issued it and writes one finalized
//! [`ToolCallRecord`] per call to the durable log. Delegations additionally
//! produce start and completion lines in the session transcript.
//!
//! Hooks arrive interleaved, so open calls are indexed by invocation id and
//! active delegations live in an arena keyed by invocation id with parent
//! back-references, rather than on a single call stack.

mod replay;
mod sink;

pub use replay::SessionReport;
pub use sink::{JsonlFile, RecordSink};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use crate::hooks::{PostToolUse, PreToolUse, ToolHook, ToolResponse};
use crate::models::{SubagentContext, ToolCallRecord, ToolOutcome, LEAD_AGENT};
use crate::session::Session;
use crate::text::{first_line, truncate};
use crate::transcript::TranscriptWriter;

/// Tools whose effect is to hand a task to a named subagent.
pub const DELEGATION_TOOLS: &[&str] = &["Task", "Agent"];

/// Longest task description shown in the transcript.
const DESCRIPTION_LIMIT: usize = 100;

/// Longest result excerpt stored in a record.
const SUMMARY_LIMIT: usize = 200;

/// Whether `tool_name` delegates work to a subagent.
pub fn is_delegation(tool_name: &str) -> bool {
    DELEGATION_TOOLS.contains(&tool_name)
}

/// Subagent named by a delegation's input.
pub fn delegate_name(input: &Map<String, Value>) -> String {
    input
        .get("subagent_type")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .unwrap_or("subagent")
        .to_string()
}

/// Task description of a delegation, falling back to the prompt's first line.
pub fn delegation_description(input: &Map<String, Value>) -> Option<String> {
    input
        .get("description")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .or_else(|| {
            input
                .get("prompt")
                .and_then(Value::as_str)
                .map(first_line)
                .filter(|d| !d.is_empty())
        })
        .map(|d| truncate(d, DESCRIPTION_LIMIT))
}

/// A call between its pre and post hooks.
#[derive(Debug)]
struct OpenCall {
    sequence: u64,
    subagent: String,
    parent: Option<String>,
    tool_name: String,
    input: Map<String, Value>,
    started_at: DateTime<Utc>,
    started: Instant,
}

impl OpenCall {
    fn finish(
        self,
        invocation_id: &str,
        ended_at: DateTime<Utc>,
        outcome: ToolOutcome,
        result_summary: Option<String>,
        synthetic: bool,
    ) -> ToolCallRecord {
        ToolCallRecord {
            sequence: self.sequence,
            invocation_id: invocation_id.to_string(),
            subagent: self.subagent,
            parent_invocation_id: self.parent,
            tool_name: self.tool_name,
            input: self.input,
            ended_at: ended_at.max(self.started_at),
            started_at: self.started_at,
            outcome,
            result_summary,
            synthetic,
        }
    }
}

#[derive(Debug, Default)]
struct TrackerState {
    open: HashMap<String, OpenCall>,
    contexts: HashMap<String, SubagentContext>,
}

impl TrackerState {
    /// Chain of active contexts from the outermost delegation down to `id`.
    fn chain(&self, id: &str) -> Vec<&SubagentContext> {
        let mut chain = Vec::new();
        let mut cursor = self.contexts.get(id);
        while let Some(context) = cursor {
            // Reused ids can in principle link back on themselves.
            if chain.len() > self.contexts.len() {
                break;
            }
            chain.push(context);
            cursor = context
                .parent
                .as_deref()
                .and_then(|parent| self.contexts.get(parent));
        }
        chain.reverse();
        chain
    }

    fn depth(&self, id: &str) -> usize {
        self.chain(id).len().saturating_sub(1)
    }
}

/// Correlates tool hooks with subagent contexts and persists the audit trail.
///
/// One tracker belongs to one session; share it through an [`Arc`] with the
/// runtime. All methods take `&self` and are safe to call from several
/// threads. Nothing here returns an error: I/O failures are reported through
/// `tracing` and counted, see [`write_failures`](Self::write_failures).
pub struct SubagentTracker {
    transcript: Arc<TranscriptWriter>,
    state: Mutex<TrackerState>,
    sink: Mutex<Box<dyn RecordSink>>,
    sequence: AtomicU64,
    write_failures: AtomicU64,
    closed: AtomicBool,
}

impl SubagentTracker {
    /// Tracker writing to the session's `tool_calls.jsonl`.
    pub fn new(transcript: Arc<TranscriptWriter>, session: &Session) -> Self {
        Self::with_sink(transcript, Box::new(JsonlFile::new(session.tool_log_path())))
    }

    /// Tracker writing to an arbitrary sink.
    pub fn with_sink(transcript: Arc<TranscriptWriter>, sink: Box<dyn RecordSink>) -> Self {
        Self {
            transcript,
            state: Mutex::new(TrackerState::default()),
            sink: Mutex::new(sink),
            sequence: AtomicU64::new(0),
            write_failures: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Open a record for a tool that is about to execute.
    ///
    /// `current_context` is the invocation id of the delegation the call runs
    /// under. Delegation tools push a new context whose parent is that id.
    pub fn on_pre_tool_use(
        &self,
        invocation_id: &str,
        tool_name: &str,
        input: &Value,
        current_context: Option<&str>,
    ) {
        if self.closed.load(Ordering::SeqCst) {
            debug!(invocation_id, tool_name, "tracker closed, ignoring pre hook");
            return;
        }

        let input = input_map(input);
        let now = Utc::now();

        let (sequence, superseded, announcement) = {
            let mut state = self.lock_state();

            let subagent = match current_context {
                Some(id) => match state.contexts.get(id) {
                    Some(context) => context.name.clone(),
                    None => {
                        debug!(invocation_id, context = id, "unknown context, attributing to lead");
                        LEAD_AGENT.to_string()
                    }
                },
                None => LEAD_AGENT.to_string(),
            };

            let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;

            let superseded = state.open.remove(invocation_id).map(|stale| {
                state.contexts.remove(invocation_id);
                stale.finish(
                    invocation_id,
                    now,
                    ToolOutcome::Interrupted,
                    Some("superseded by a later call with the same invocation id".to_string()),
                    true,
                )
            });

            let announcement = is_delegation(tool_name).then(|| {
                let context = SubagentContext::new(
                    delegate_name(&input),
                    invocation_id.to_string(),
                    delegation_description(&input),
                    current_context.map(String::from),
                );
                state.contexts.insert(invocation_id.to_string(), context);
                let context = &state.contexts[invocation_id];
                debug!(
                    invocation_id,
                    subagent = %context.name,
                    top_level = context.is_top_level(),
                    "delegation started"
                );
                start_line(context, state.depth(invocation_id))
            });

            state.open.insert(
                invocation_id.to_string(),
                OpenCall {
                    sequence,
                    subagent,
                    parent: current_context.map(String::from),
                    tool_name: tool_name.to_string(),
                    input,
                    started_at: now,
                    started: Instant::now(),
                },
            );

            (sequence, superseded, announcement)
        };

        if let Some(record) = superseded {
            warn!(
                invocation_id,
                stale_sequence = record.sequence,
                "invocation id reused while still open"
            );
            self.append(&record);
        }
        if let Some(line) = announcement {
            self.transcript.line(&line);
        }
        debug!(sequence, invocation_id, tool_name, "tool call opened");
    }

    /// Finalize the record of a completed tool and append it to the log.
    ///
    /// A post hook with no open record yields a synthetic record flagged for
    /// review instead of an error.
    pub fn on_post_tool_use(&self, invocation_id: &str, response: ToolResponse<'_>) {
        if self.closed.load(Ordering::SeqCst) {
            debug!(invocation_id, "tracker closed, ignoring post hook");
            return;
        }

        let now = Utc::now();
        let outcome = ToolOutcome::from_error_flag(response.is_error);
        let summary = response.summary.map(|s| truncate(s, SUMMARY_LIMIT));

        let (record, summary_line) = {
            let mut state = self.lock_state();
            match state.open.remove(invocation_id) {
                Some(call) => {
                    let summary_line = if is_delegation(&call.tool_name) {
                        let depth = state.depth(invocation_id);
                        state.contexts.remove(invocation_id).map(|context| {
                            finish_line(&context, depth, call.started.elapsed().as_secs_f64(), outcome)
                        })
                    } else {
                        None
                    };
                    (call.finish(invocation_id, now, outcome, summary, false), summary_line)
                }
                None => {
                    let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
                    warn!(invocation_id, sequence, "post hook without matching pre hook");
                    (
                        ToolCallRecord::orphaned(sequence, invocation_id, now, outcome, summary),
                        None,
                    )
                }
            }
        };

        self.append(&record);
        if let Some(line) = summary_line {
            self.transcript.line(&line);
        }
        debug!(sequence = record.sequence, invocation_id, %outcome, "tool call closed");
    }

    /// Write still-open calls as interrupted, then flush and close the log.
    ///
    /// Safe to call more than once; only the first call does anything. Also
    /// runs on drop.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let now = Utc::now();
        let leftovers: Vec<ToolCallRecord> = {
            let mut state = self.lock_state();
            state.contexts.clear();
            let mut calls: Vec<(String, OpenCall)> = state.open.drain().collect();
            calls.sort_by_key(|(_, call)| call.sequence);
            calls
                .into_iter()
                .map(|(id, call)| call.finish(&id, now, ToolOutcome::Interrupted, None, false))
                .collect()
        };

        for record in &leftovers {
            warn!(
                sequence = record.sequence,
                invocation_id = %record.invocation_id,
                tool_name = %record.tool_name,
                "tool call still open at close"
            );
            self.append(record);
        }

        if let Err(e) = self.lock_sink().close() {
            error!(error = %e, "failed to close tool call log");
        }
    }

    /// Whether calls to `tool_name` are summarized in the transcript by the
    /// tracker itself.
    pub fn summarizes(&self, tool_name: &str) -> bool {
        is_delegation(tool_name)
    }

    /// Name of the active subagent started by `invocation_id`.
    pub fn subagent_name(&self, invocation_id: &str) -> Option<String> {
        self.lock_state()
            .contexts
            .get(invocation_id)
            .map(|context| context.name.clone())
    }

    /// Active delegations, oldest first.
    pub fn active_contexts(&self) -> Vec<SubagentContext> {
        let state = self.lock_state();
        let mut contexts: Vec<SubagentContext> = state.contexts.values().cloned().collect();
        contexts.sort_by_key(|context| {
            state
                .open
                .get(&context.invocation_id)
                .map_or(u64::MAX, |call| call.sequence)
        });
        contexts
    }

    /// Delegation chain from the outermost context down to `invocation_id`.
    pub fn context_stack(&self, invocation_id: &str) -> Vec<SubagentContext> {
        self.lock_state()
            .chain(invocation_id)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Number of calls between their pre and post hooks.
    pub fn open_calls(&self) -> usize {
        self.lock_state().open.len()
    }

    /// Number of records that could not be written to the log.
    pub fn write_failures(&self) -> u64 {
        self.write_failures.load(Ordering::SeqCst)
    }

    fn append(&self, record: &ToolCallRecord) {
        let result = serde_json::to_string(record)
            .map_err(std::io::Error::from)
            .and_then(|line| self.lock_sink().append(&line));

        if let Err(e) = result {
            self.write_failures.fetch_add(1, Ordering::SeqCst);
            error!(
                sequence = record.sequence,
                invocation_id = %record.invocation_id,
                error = %e,
                "failed to append tool call record"
            );
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_sink(&self) -> MutexGuard<'_, Box<dyn RecordSink>> {
        self.sink.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ToolHook for SubagentTracker {
    fn name(&self) -> &str {
        "subagent-tracker"
    }

    fn pre(&self, call: &PreToolUse<'_>) {
        self.on_pre_tool_use(call.invocation_id, call.tool_name, call.input, call.context);
    }

    fn post(&self, result: &PostToolUse<'_>) {
        self.on_post_tool_use(result.invocation_id, result.response);
    }
}

impl Drop for SubagentTracker {
    fn drop(&mut self) {
        self.close();
    }
}

fn input_map(input: &Value) -> Map<String, Value> {
    match input {
        Value::Object(map) => map.clone(),
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other.clone());
            map
        }
    }
}

fn start_line(context: &SubagentContext, depth: usize) -> String {
    let indent = "  ".repeat(depth);
    match &context.description {
        Some(description) => format!("\n{indent}[{}] Started: {description}", context.name),
        None => format!("\n{indent}[{}] Started", context.name),
    }
}

fn finish_line(context: &SubagentContext, depth: usize, secs: f64, outcome: ToolOutcome) -> String {
    let indent = "  ".repeat(depth);
    match outcome {
        ToolOutcome::Success => format!("{indent}[{}] Completed in {secs:.1}s", context.name),
        _ => format!("{indent}[{}] Failed after {secs:.1}s", context.name),
    }
}
