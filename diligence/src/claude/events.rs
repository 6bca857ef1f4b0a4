//! Claude NDJSON stream events.
//!
//! This module parses the `stream-json` output of the Claude CLI into a small
//! set of tagged variants. Every event kind or content block kind this code
//! does not know maps to an `Unknown` variant, so newer CLI versions degrade
//! to "ignored" instead of failing.

use serde_json::Value;

use crate::text::{strip_noise, strip_reminders, truncate};

/// Longest tool result excerpt kept from a `tool_result` block.
const RESULT_SUMMARY_LIMIT: usize = 200;

/// A tool use block from an assistant message.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolUse {
    /// Unique ID for this tool use (for linking tool_result).
    pub id: String,
    /// Tool name.
    pub name: String,
    /// Tool input as JSON.
    pub input: Value,
}

/// A tool result block from a user message (response to tool_use).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    /// The tool_use ID this result responds to.
    pub tool_use_id: String,
    /// Brief summary of the result content.
    pub content_summary: Option<String>,
    /// Whether the tool call was an error.
    pub is_error: bool,
}

/// One block of a message's content.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    Text(String),
    ToolUse(ToolUse),
    ToolResult(ToolResult),
    /// Thinking, images and anything newer.
    Unknown,
}

/// A complete assistant turn, from the lead agent or from a subagent.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AssistantMessage {
    /// Delegation this message was produced under (none for the lead).
    pub parent_tool_use_id: Option<String>,
    pub content: Vec<ContentBlock>,
}

impl AssistantMessage {
    /// Tool use blocks in order.
    pub fn tool_uses(&self) -> impl Iterator<Item = &ToolUse> {
        self.content.iter().filter_map(|block| match block {
            ContentBlock::ToolUse(tool_use) => Some(tool_use),
            _ => None,
        })
    }
}

/// A user turn: the prompt echo or tool results fed back to the model.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UserMessage {
    pub content: Vec<ContentBlock>,
}

impl UserMessage {
    /// Tool result blocks in order.
    pub fn tool_results(&self) -> impl Iterator<Item = &ToolResult> {
        self.content.iter().filter_map(|block| match block {
            ContentBlock::ToolResult(result) => Some(result),
            _ => None,
        })
    }
}

/// System event (init, hook responses, ...).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SystemEvent {
    pub subtype: Option<String>,
    pub session_id: Option<String>,
    pub model: Option<String>,
}

impl SystemEvent {
    pub fn is_init(&self) -> bool {
        self.subtype.as_deref() == Some("init")
    }
}

/// Final event of a CLI run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultEvent {
    pub session_id: Option<String>,
    pub is_error: bool,
    pub total_cost_usd: Option<f64>,
    pub duration_ms: Option<u64>,
    pub num_turns: Option<u32>,
}

/// A parsed line of Claude's `stream-json` output.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    System(SystemEvent),
    Assistant(AssistantMessage),
    User(UserMessage),
    Result(ResultEvent),
    /// Stream deltas, errors and event kinds added after this was written.
    Unknown,
}

impl StreamEvent {
    /// Parse a line of NDJSON. Blank or non-JSON lines yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let value: Value = serde_json::from_str(line).ok()?;
        Some(Self::from_value(&value))
    }

    /// Classify an already-decoded event.
    pub fn from_value(value: &Value) -> Self {
        let str_field = |key: &str| value.get(key).and_then(Value::as_str).map(String::from);

        match value.get("type").and_then(Value::as_str) {
            Some("system") => Self::System(SystemEvent {
                subtype: str_field("subtype"),
                session_id: str_field("session_id").or_else(|| str_field("sessionId")),
                model: str_field("model"),
            }),
            Some("assistant") => {
                let message = value.get("message");
                Self::Assistant(AssistantMessage {
                    parent_tool_use_id: str_field("parent_tool_use_id"),
                    content: message.map(parse_content).unwrap_or_default(),
                })
            }
            Some("user") => Self::User(UserMessage {
                content: value.get("message").map(parse_content).unwrap_or_default(),
            }),
            Some("result") => Self::Result(ResultEvent {
                session_id: str_field("session_id"),
                is_error: value
                    .get("is_error")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
                total_cost_usd: value.get("total_cost_usd").and_then(Value::as_f64),
                duration_ms: value.get("duration_ms").and_then(Value::as_u64),
                num_turns: value
                    .get("num_turns")
                    .and_then(Value::as_u64)
                    .and_then(|n| u32::try_from(n).ok()),
            }),
            _ => Self::Unknown,
        }
    }
}

/// Parse `message.content`, which is either a string or an array of blocks.
fn parse_content(message: &Value) -> Vec<ContentBlock> {
    match message.get("content") {
        Some(Value::String(text)) => text_block(text).into_iter().collect(),
        Some(Value::Array(blocks)) => blocks.iter().filter_map(parse_block).collect(),
        _ => Vec::new(),
    }
}

/// Text is kept verbatim apart from reminders; blocks that were only
/// reminders and whitespace are dropped.
fn text_block(text: &str) -> Option<ContentBlock> {
    let cleaned = strip_reminders(text);
    (!cleaned.trim().is_empty()).then_some(ContentBlock::Text(cleaned))
}

/// Parse one content block.
fn parse_block(block: &Value) -> Option<ContentBlock> {
    match block.get("type").and_then(Value::as_str) {
        Some("text") => block
            .get("text")
            .and_then(Value::as_str)
            .and_then(text_block),
        Some("tool_use") => {
            let id = block.get("id").and_then(Value::as_str);
            let name = block.get("name").and_then(Value::as_str);
            Some(match (id, name) {
                (Some(id), Some(name)) => ContentBlock::ToolUse(ToolUse {
                    id: id.to_string(),
                    name: name.to_string(),
                    input: block.get("input").cloned().unwrap_or(Value::Null),
                }),
                _ => ContentBlock::Unknown,
            })
        }
        Some("tool_result") => Some(
            match block.get("tool_use_id").and_then(Value::as_str) {
                Some(tool_use_id) => ContentBlock::ToolResult(ToolResult {
                    tool_use_id: tool_use_id.to_string(),
                    content_summary: summarize_result(block.get("content")),
                    is_error: block
                        .get("is_error")
                        .and_then(Value::as_bool)
                        .unwrap_or(false),
                }),
                None => ContentBlock::Unknown,
            },
        ),
        _ => Some(ContentBlock::Unknown),
    }
}

/// Brief summary of a tool_result's content: a string or the first text item.
fn summarize_result(content: Option<&Value>) -> Option<String> {
    let text = match content? {
        Value::String(s) => strip_noise(s),
        Value::Array(items) => items
            .iter()
            .find_map(|item| item.get("text").and_then(Value::as_str))
            .map(strip_noise)?,
        _ => return None,
    };
    (!text.is_empty()).then(|| truncate(&text, RESULT_SUMMARY_LIMIT))
}
