//! Subagent context model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One active delegation to a named subagent.
///
/// Contexts live in the tracker's arena keyed by `invocation_id`; `parent`
/// is the invocation id of the delegation that was active when this one
/// started, not an owning pointer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubagentContext {
    /// Subagent name, e.g. "financial-analyst".
    pub name: String,
    /// Invocation id of the delegation tool call.
    pub invocation_id: String,
    /// Task description given by the delegating agent.
    pub description: Option<String>,
    /// When the delegation started.
    pub started_at: DateTime<Utc>,
    /// Enclosing delegation (none for delegations made by the lead).
    pub parent: Option<String>,
}

impl SubagentContext {
    /// Create a context for a delegation that starts now.
    pub fn new(
        name: String,
        invocation_id: String,
        description: Option<String>,
        parent: Option<String>,
    ) -> Self {
        Self {
            name,
            invocation_id,
            description,
            started_at: Utc::now(),
            parent,
        }
    }

    /// Whether this delegation was issued directly by the lead agent.
    pub const fn is_top_level(&self) -> bool {
        self.parent.is_none()
    }
}
