//! Data models for tracked tool activity.

mod context;
mod record;

pub use context::SubagentContext;
pub use record::{ToolCallRecord, ToolOutcome, LEAD_AGENT};
