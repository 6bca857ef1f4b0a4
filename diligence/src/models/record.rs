//! Tool call record model, one line of the durable tool-call log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Subagent name used for calls made outside any delegation.
pub const LEAD_AGENT: &str = "lead";

/// How a tool call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolOutcome {
    /// The tool returned a result.
    Success,
    /// The tool reported an error.
    Error,
    /// The call never completed (session closed or invocation id reused).
    Interrupted,
}

impl ToolOutcome {
    /// Convert outcome to its log representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Interrupted => "interrupted",
        }
    }

    pub const fn from_error_flag(is_error: bool) -> Self {
        if is_error {
            Self::Error
        } else {
            Self::Success
        }
    }
}

impl std::fmt::Display for ToolOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A finalized tool invocation.
///
/// Records are written once, when the post-hook fires (or when the tracker
/// closes with the call still open), and never edited afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Position in record-open order, starting at 1.
    pub sequence: u64,
    /// Runtime-assigned tool use id shared by the pre and post hooks.
    pub invocation_id: String,
    /// Subagent that issued the call, or [`LEAD_AGENT`].
    pub subagent: String,
    /// Invocation id of the enclosing delegation, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_invocation_id: Option<String>,
    /// Tool name as reported by the runtime.
    pub tool_name: String,
    /// Tool input parameters.
    #[serde(default)]
    pub input: Map<String, Value>,
    /// When the pre-hook fired.
    pub started_at: DateTime<Utc>,
    /// When the post-hook fired.
    pub ended_at: DateTime<Utc>,
    pub outcome: ToolOutcome,
    /// Short excerpt of the tool result or error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_summary: Option<String>,
    /// Set when the record was not produced by a regular pre/post pair.
    #[serde(default)]
    pub synthetic: bool,
}

impl ToolCallRecord {
    /// Record for a post-hook that arrived without a matching pre-hook.
    pub fn orphaned(
        sequence: u64,
        invocation_id: &str,
        at: DateTime<Utc>,
        outcome: ToolOutcome,
        result_summary: Option<String>,
    ) -> Self {
        Self {
            sequence,
            invocation_id: invocation_id.to_string(),
            subagent: LEAD_AGENT.to_string(),
            parent_invocation_id: None,
            tool_name: "unknown".to_string(),
            input: Map::new(),
            started_at: at,
            ended_at: at,
            outcome,
            result_summary,
            synthetic: true,
        }
    }

    /// Wall-clock time between the pre and post hooks.
    pub fn elapsed(&self) -> chrono::Duration {
        self.ended_at - self.started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_display_matches_serde_name() {
        for outcome in [
            ToolOutcome::Success,
            ToolOutcome::Error,
            ToolOutcome::Interrupted,
        ] {
            let json = serde_json::to_value(outcome).unwrap();
            assert_eq!(json, outcome.to_string());
        }
        assert_eq!(ToolOutcome::from_error_flag(true), ToolOutcome::Error);
    }

    #[test]
    fn record_serializes_as_flat_json_line() {
        let at = Utc::now();
        let record = ToolCallRecord::orphaned(7, "toolu_x", at, ToolOutcome::Error, None);
        let line = serde_json::to_string(&record).unwrap();

        assert!(!line.contains('\n'));
        let value: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["sequence"], 7);
        assert_eq!(value["invocation_id"], "toolu_x");
        assert_eq!(value["subagent"], "lead");
        assert_eq!(value["outcome"], "error");
        assert_eq!(value["synthetic"], true);
        assert!(value.get("parent_invocation_id").is_none());
    }

    #[test]
    fn record_parses_without_optional_fields() {
        let line = r#"{"sequence":1,"invocation_id":"a","subagent":"lead","tool_name":"Read","started_at":"2026-01-01T00:00:00Z","ended_at":"2026-01-01T00:00:02Z","outcome":"success"}"#;
        let record: ToolCallRecord = serde_json::from_str(line).unwrap();
        assert!(record.input.is_empty());
        assert!(!record.synthetic);
        assert_eq!(record.elapsed().num_seconds(), 2);
    }
}
