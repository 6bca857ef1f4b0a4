//! Rendering assistant messages into the transcript.
//!
//! Tool hooks are fired by the runtime, not from here. This module only makes
//! tool activity visible: delegations are announced by the tracker, every
//! other tool use gets one concise line.

use serde_json::Value;

use crate::claude::{AssistantMessage, ContentBlock, ToolUse};
use crate::text::truncate;
use crate::tracker::SubagentTracker;
use crate::transcript::TranscriptWriter;

/// Longest tool detail shown in a transcript line.
const DETAIL_LIMIT: usize = 80;

/// Write one assistant message to the transcript.
pub fn process_assistant_message(
    message: &AssistantMessage,
    tracker: &SubagentTracker,
    transcript: &TranscriptWriter,
) {
    let subagent = message
        .parent_tool_use_id
        .as_deref()
        .and_then(|id| tracker.subagent_name(id));

    for block in &message.content {
        match block {
            ContentBlock::Text(text) => transcript.write(text, ""),
            ContentBlock::ToolUse(tool_use) if !tracker.summarizes(&tool_use.name) => {
                transcript.line(&describe_tool_use(tool_use, subagent.as_deref()));
            }
            ContentBlock::ToolUse(_) | ContentBlock::ToolResult(_) | ContentBlock::Unknown => {}
        }
    }
}

/// One-line summary of a tool use, e.g. `[financial-analyst → Read] a.csv`.
pub fn describe_tool_use(tool_use: &ToolUse, subagent: Option<&str>) -> String {
    let label = match subagent {
        Some(name) => format!("{name} → {}", tool_use.name),
        None => tool_use.name.clone(),
    };
    match tool_detail(&tool_use.name, &tool_use.input) {
        Some(detail) => format!("[{label}] {}", truncate(detail, DETAIL_LIMIT)),
        None => format!("[{label}]"),
    }
}

/// The input field that best identifies what a tool is working on.
fn tool_detail<'a>(tool_name: &str, input: &'a Value) -> Option<&'a str> {
    let key = match tool_name {
        "Read" | "Write" | "Edit" | "MultiEdit" => "file_path",
        "NotebookEdit" => "notebook_path",
        "Bash" => "command",
        "Glob" | "Grep" => "pattern",
        "Skill" => "skill",
        "WebFetch" => "url",
        "WebSearch" => "query",
        _ => return None,
    };
    input
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|detail| !detail.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claude::StreamEvent;
    use crate::transcript::tests::Capture;
    use crate::tracker::RecordSink;
    use serde_json::json;
    use std::io;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct NullSink;

    impl RecordSink for NullSink {
        fn append(&mut self, _line: &str) -> io::Result<()> {
            Ok(())
        }

        fn close(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn setup() -> (TempDir, Arc<TranscriptWriter>, Capture, SubagentTracker) {
        let dir = TempDir::new().unwrap();
        let console = Capture::default();
        let transcript = Arc::new(TranscriptWriter::with_console(
            dir.path().join("transcript.txt"),
            Box::new(console.clone()),
        ));
        let tracker = SubagentTracker::with_sink(Arc::clone(&transcript), Box::new(NullSink));
        (dir, transcript, console, tracker)
    }

    fn message(line: &str) -> AssistantMessage {
        match StreamEvent::parse(line) {
            Some(StreamEvent::Assistant(message)) => message,
            other => panic!("expected assistant message, got {other:?}"),
        }
    }

    #[test]
    fn text_is_written_verbatim_and_direct_tools_get_a_line() {
        let (_dir, transcript, console, tracker) = setup();
        let msg = message(
            r#"{"type":"assistant","message":{"content":[{"type":"text","text":"Let me look."},{"type":"tool_use","id":"1","name":"Read","input":{"file_path":"files/uploads/q3.pdf"}},{"type":"thinking","thinking":"..."}]}}"#,
        );

        process_assistant_message(&msg, &tracker, &transcript);

        assert_eq!(
            console.contents(),
            "Let me look.\n[Read] files/uploads/q3.pdf\n"
        );
    }

    #[test]
    fn tool_lines_after_unterminated_text_start_a_new_line() {
        let (_dir, transcript, console, tracker) = setup();
        let msg = message(
            r#"{"type":"assistant","message":{"content":[{"type":"text","text":"Checking two files.\n\n"},{"type":"tool_use","id":"1","name":"Read","input":{"file_path":"a.pdf"}},{"type":"text","text":"And the other"},{"type":"tool_use","id":"2","name":"Read","input":{"file_path":"b.pdf"}}]}}"#,
        );

        process_assistant_message(&msg, &tracker, &transcript);

        assert_eq!(
            console.contents(),
            "Checking two files.\n\n[Read] a.pdf\nAnd the other\n[Read] b.pdf\n"
        );
    }

    #[test]
    fn delegations_are_left_to_the_tracker() {
        let (_dir, transcript, console, tracker) = setup();
        let msg = message(
            r#"{"type":"assistant","message":{"content":[{"type":"tool_use","id":"t","name":"Task","input":{"subagent_type":"legal-analyst"}}]}}"#,
        );

        process_assistant_message(&msg, &tracker, &transcript);
        assert_eq!(console.contents(), "");
    }

    #[test]
    fn subagent_tools_are_labelled_with_the_subagent() {
        let (_dir, transcript, console, tracker) = setup();
        tracker.on_pre_tool_use(
            "task-1",
            "Task",
            &json!({"subagent_type": "financial-analyst", "description": "Financials"}),
            None,
        );
        let msg = message(
            r#"{"type":"assistant","parent_tool_use_id":"task-1","message":{"content":[{"type":"tool_use","id":"b","name":"Bash","input":{"command":"ls files/uploads"}}]}}"#,
        );

        process_assistant_message(&msg, &tracker, &transcript);
        assert!(console
            .contents()
            .ends_with("Started: Financials\n[financial-analyst → Bash] ls files/uploads\n"));
    }

    #[test]
    fn tools_without_a_known_detail_show_the_name_only() {
        let tool_use = ToolUse {
            id: "x".into(),
            name: "TodoWrite".into(),
            input: json!({"todos": []}),
        };
        assert_eq!(describe_tool_use(&tool_use, None), "[TodoWrite]");

        let long = ToolUse {
            id: "y".into(),
            name: "Bash".into(),
            input: json!({"command": "x".repeat(200)}),
        };
        let line = describe_tool_use(&long, None);
        assert!(line.ends_with("..."));
        assert!(line.chars().count() < 100);
    }
}
