//! Tool lifecycle hooks.
//!
//! The agent runtime calls every registered [`ToolHook`] immediately before
//! a tool executes and again when it completes. Hooks return nothing, so an
//! observer can never fail or block the workflow it observes.

use serde_json::Value;

/// Payload of the pre-tool-use hook.
#[derive(Debug, Clone, Copy)]
pub struct PreToolUse<'a> {
    /// Runtime-assigned id, repeated in the matching [`PostToolUse`].
    pub invocation_id: &'a str,
    pub tool_name: &'a str,
    pub input: &'a Value,
    /// Invocation id of the delegation this call runs under, if any.
    pub context: Option<&'a str>,
}

/// How a tool execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolResponse<'a> {
    pub is_error: bool,
    /// Short excerpt of the result or error text.
    pub summary: Option<&'a str>,
}

impl<'a> ToolResponse<'a> {
    pub const fn success(summary: Option<&'a str>) -> Self {
        Self {
            is_error: false,
            summary,
        }
    }

    pub const fn error(summary: Option<&'a str>) -> Self {
        Self {
            is_error: true,
            summary,
        }
    }
}

/// Payload of the post-tool-use hook.
#[derive(Debug, Clone, Copy)]
pub struct PostToolUse<'a> {
    pub invocation_id: &'a str,
    pub response: ToolResponse<'a>,
}

/// A tool lifecycle observer registered with the agent runtime.
///
/// Callbacks may arrive interleaved: the post-hook for one invocation can
/// follow the pre-hook of another. Implementations must therefore key their
/// state by invocation id.
///
/// # Precondition
///
/// The runtime never reuses an invocation id while a call with that id is
/// still open. Implementations may treat a reused id as superseding the
/// earlier call.
pub trait ToolHook: Send + Sync {
    /// Name used in diagnostics.
    fn name(&self) -> &str;

    /// Called immediately before a tool executes.
    fn pre(&self, call: &PreToolUse<'_>);

    /// Called when a tool execution completes.
    fn post(&self, result: &PostToolUse<'_>);
}
