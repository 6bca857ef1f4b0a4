//! Claude CLI interaction module.

mod events;
mod runtime;

pub use events::{AssistantMessage, ContentBlock, StreamEvent, ToolUse};
pub use runtime::{AgentRuntime, RuntimeOptions};
