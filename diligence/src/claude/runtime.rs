//! Claude CLI agent runtime.
//!
//! Each user turn spawns one `claude -p` process in `stream-json` mode. The
//! NDJSON stream is turned into tool hook calls and assistant message
//! callbacks; the session id from the first turn is resumed on later turns so
//! the conversation carries over.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use super::{AssistantMessage, StreamEvent};
use crate::hooks::{PostToolUse, PreToolUse, ToolHook, ToolResponse};

/// Options for spawning Claude.
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    /// Executable to run.
    pub claude_bin: PathBuf,
    /// Model for the lead agent.
    pub model: String,
    /// Replaces the entire system prompt.
    pub system_prompt: Option<String>,
    /// Custom subagents as JSON.
    pub agents: Option<String>,
    /// Tools that don't require permission prompts.
    pub allowed_tools: Vec<String>,
    /// Setting sources to load (`user`, `project`, `local`).
    pub setting_sources: Option<String>,
    pub working_dir: Option<PathBuf>,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            claude_bin: PathBuf::from("claude"),
            model: "haiku".to_string(),
            system_prompt: None,
            agents: None,
            allowed_tools: Vec::new(),
            setting_sources: None,
            working_dir: None,
        }
    }
}

/// Outcome of one user turn.
#[derive(Debug, Clone, Default)]
pub struct TurnSummary {
    pub session_id: Option<String>,
    /// Whether the CLI exited cleanly and reported a non-error result.
    pub success: bool,
    pub cost_usd: Option<f64>,
    pub duration_ms: Option<u64>,
    pub num_turns: Option<u32>,
}

/// Drives the Claude CLI and fans its tool activity out to registered hooks.
pub struct AgentRuntime {
    options: RuntimeOptions,
    hooks: Vec<Arc<dyn ToolHook>>,
    session_id: Option<String>,
}

impl AgentRuntime {
    pub fn new(options: RuntimeOptions) -> Self {
        Self {
            options,
            hooks: Vec::new(),
            session_id: None,
        }
    }

    /// Register a hook called before and after every tool execution.
    pub fn register_hook(&mut self, hook: Arc<dyn ToolHook>) {
        debug!(hook = hook.name(), "registered tool hook");
        self.hooks.push(hook);
    }

    /// Claude session being resumed, once the first turn has reported one.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Build the command for one turn:
    /// `claude --dangerously-skip-permissions --output-format stream-json --verbose [options] -p <prompt>`
    fn build_command(&self, prompt: &str) -> Command {
        let options = &self.options;
        let mut cmd = Command::new(&options.claude_bin);

        cmd.arg("--dangerously-skip-permissions");
        cmd.arg("--output-format").arg("stream-json");
        cmd.arg("--verbose");
        cmd.arg("--model").arg(&options.model);

        if let Some(ref prompt) = options.system_prompt {
            cmd.arg("--system-prompt").arg(prompt);
        }
        if let Some(ref agents) = options.agents {
            cmd.arg("--agents").arg(agents);
        }
        if !options.allowed_tools.is_empty() {
            cmd.arg("--allowedTools").arg(options.allowed_tools.join(","));
        }
        if let Some(ref sources) = options.setting_sources {
            cmd.arg("--setting-sources").arg(sources);
        }
        if let Some(ref session_id) = self.session_id {
            cmd.arg("--resume").arg(session_id);
        }
        if let Some(ref dir) = options.working_dir {
            cmd.current_dir(dir);
        }

        cmd.arg("-p").arg(prompt);

        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.stdin(Stdio::null());
        cmd.kill_on_drop(true);
        cmd
    }

    /// Send one prompt and stream the response.
    ///
    /// `on_message` sees every assistant message, lead and subagent alike,
    /// before the hooks hear about the tools it uses.
    pub async fn query<F>(&mut self, prompt: &str, mut on_message: F) -> Result<TurnSummary>
    where
        F: FnMut(&AssistantMessage),
    {
        let mut child = self
            .build_command(prompt)
            .spawn()
            .with_context(|| {
                format!(
                    "Failed to spawn claude CLI ({})",
                    self.options.claude_bin.display()
                )
            })?;

        let stdout = child.stdout.take().context("Failed to capture stdout")?;
        let stderr = child.stderr.take().context("Failed to capture stderr")?;

        let mut stdout_reader = BufReader::new(stdout).lines();
        let mut stderr_reader = BufReader::new(stderr).lines();
        let mut stderr_open = true;

        let mut summary = TurnSummary::default();
        let mut saw_result = false;

        loop {
            tokio::select! {
                line = stdout_reader.next_line() => {
                    match line {
                        Ok(Some(line)) => {
                            let Some(event) = StreamEvent::parse(&line) else {
                                continue;
                            };
                            match &event {
                                StreamEvent::System(system) if system.is_init() => {
                                    debug!(
                                        session_id = ?system.session_id,
                                        model = ?system.model,
                                        "claude session initialized"
                                    );
                                    if let Some(ref id) = system.session_id {
                                        self.session_id = Some(id.clone());
                                    }
                                }
                                StreamEvent::Result(result) => {
                                    saw_result = true;
                                    summary.success = !result.is_error;
                                    summary.cost_usd = result.total_cost_usd;
                                    summary.duration_ms = result.duration_ms;
                                    summary.num_turns = result.num_turns;
                                    if let Some(ref id) = result.session_id {
                                        self.session_id = Some(id.clone());
                                    }
                                }
                                _ => {}
                            }
                            dispatch(&self.hooks, &event, &mut on_message);
                        }
                        Ok(None) => break,
                        Err(e) => {
                            warn!(error = %e, "error reading claude stdout");
                            break;
                        }
                    }
                }
                line = stderr_reader.next_line(), if stderr_open => {
                    match line {
                        Ok(Some(line)) => debug!(%line, "claude stderr"),
                        Ok(None) => stderr_open = false,
                        Err(e) => {
                            debug!(error = %e, "error reading claude stderr");
                            stderr_open = false;
                        }
                    }
                }
            }
        }

        let status = child
            .wait()
            .await
            .context("Failed to wait for claude CLI")?;
        if !status.success() {
            warn!(%status, "claude CLI exited unsuccessfully");
        }

        summary.success = summary.success && saw_result && status.success();
        summary.session_id.clone_from(&self.session_id);
        Ok(summary)
    }
}

/// Route one stream event to the message callback and the hooks.
pub(crate) fn dispatch<F>(hooks: &[Arc<dyn ToolHook>], event: &StreamEvent, on_message: &mut F)
where
    F: FnMut(&AssistantMessage),
{
    match event {
        StreamEvent::Assistant(message) => {
            on_message(message);
            for tool_use in message.tool_uses() {
                let call = PreToolUse {
                    invocation_id: &tool_use.id,
                    tool_name: &tool_use.name,
                    input: &tool_use.input,
                    context: message.parent_tool_use_id.as_deref(),
                };
                for hook in hooks {
                    hook.pre(&call);
                }
            }
        }
        StreamEvent::User(message) => {
            for result in message.tool_results() {
                let post = PostToolUse {
                    invocation_id: &result.tool_use_id,
                    response: if result.is_error {
                        ToolResponse::error(result.content_summary.as_deref())
                    } else {
                        ToolResponse::success(result.content_summary.as_deref())
                    },
                };
                for hook in hooks {
                    hook.post(&post);
                }
            }
        }
        StreamEvent::System(_) | StreamEvent::Result(_) | StreamEvent::Unknown => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claude::ContentBlock;
    use crate::processor::process_assistant_message;
    use crate::tracker::{JsonlFile, SubagentTracker};
    use crate::transcript::tests::Capture;
    use crate::transcript::TranscriptWriter;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn text_of(message: &AssistantMessage) -> String {
        message
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ToolHook for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn pre(&self, call: &PreToolUse<'_>) {
            self.calls.lock().unwrap().push(format!(
                "pre {} {} {}",
                call.invocation_id,
                call.tool_name,
                call.context.unwrap_or("-")
            ));
        }

        fn post(&self, result: &PostToolUse<'_>) {
            self.calls.lock().unwrap().push(format!(
                "post {} {}",
                result.invocation_id,
                if result.response.is_error { "error" } else { "ok" }
            ));
        }
    }

    const STREAM: &[&str] = &[
        r#"{"type":"system","subtype":"init","session_id":"sess-1"}"#,
        r#"{"type":"assistant","message":{"content":[{"type":"text","text":"Delegating."},{"type":"tool_use","id":"t1","name":"Task","input":{"subagent_type":"financial-analyst","description":"Review"}}]}}"#,
        r#"{"type":"assistant","parent_tool_use_id":"t1","message":{"content":[{"type":"tool_use","id":"r1","name":"Read","input":{"file_path":"a.csv"}}]}}"#,
        r#"{"type":"user","parent_tool_use_id":"t1","message":{"content":[{"type":"tool_result","tool_use_id":"r1","content":"rows"}]}}"#,
        r#"{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"t1","content":"done","is_error":true}]}}"#,
        r#"{"type":"result","subtype":"success","session_id":"sess-1","result":"All done","total_cost_usd":0.01,"num_turns":3,"is_error":false}"#,
    ];

    #[test]
    fn dispatch_fires_hooks_with_parent_context() {
        let recorder = Arc::new(Recorder::default());
        let hook: Arc<dyn ToolHook> = recorder.clone();
        let hooks = vec![hook];
        let mut messages = Vec::new();

        for line in STREAM {
            let event = StreamEvent::parse(line).unwrap();
            dispatch(&hooks, &event, &mut |message: &AssistantMessage| {
                messages.push(text_of(message));
            });
        }

        assert_eq!(
            recorder.calls(),
            [
                "pre t1 Task -",
                "pre r1 Read t1",
                "post r1 ok",
                "post t1 error",
            ]
        );
        assert_eq!(messages, ["Delegating.", ""]);
    }

    #[test]
    fn transcript_keeps_paragraphs_and_puts_completions_on_their_own_line() {
        let dir = TempDir::new().unwrap();
        let console = Capture::default();
        let transcript = Arc::new(TranscriptWriter::with_console(
            dir.path().join("transcript.txt"),
            Box::new(console.clone()),
        ));
        let tracker = Arc::new(SubagentTracker::with_sink(
            Arc::clone(&transcript),
            Box::new(JsonlFile::new(dir.path().join("tool_calls.jsonl"))),
        ));
        let hook: Arc<dyn ToolHook> = tracker.clone();
        let hooks = vec![hook];

        let stream = [
            r#"{"type":"assistant","message":{"content":[{"type":"text","text":"Delegating now.\n\n"},{"type":"tool_use","id":"t1","name":"Task","input":{"subagent_type":"financial-analyst","description":"Review"}}]}}"#,
            r#"{"type":"assistant","parent_tool_use_id":"t1","message":{"content":[{"type":"text","text":"Financial review complete."}]}}"#,
            r#"{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"t1","content":"done"}]}}"#,
            r#"{"type":"assistant","message":{"content":[{"type":"text","text":"First paragraph.\n\n"}]}}"#,
            r#"{"type":"assistant","message":{"content":[{"type":"text","text":"Second paragraph."}]}}"#,
        ];
        for line in stream {
            let event = StreamEvent::parse(line).unwrap();
            dispatch(&hooks, &event, &mut |message: &AssistantMessage| {
                process_assistant_message(message, &tracker, &transcript);
            });
        }

        let out = console.contents();
        assert!(
            out.starts_with(
                "Delegating now.\n\n\n[financial-analyst] Started: Review\nFinancial review complete.\n[financial-analyst] Completed in "
            ),
            "{out}"
        );
        assert!(out.ends_with("s\nFirst paragraph.\n\nSecond paragraph."), "{out}");
    }

    #[test]
    fn command_resumes_known_session() {
        let mut runtime = AgentRuntime::new(RuntimeOptions {
            agents: Some("{}".to_string()),
            allowed_tools: vec!["Task".to_string()],
            ..RuntimeOptions::default()
        });

        let args = |runtime: &AgentRuntime| -> Vec<String> {
            runtime
                .build_command("hello")
                .as_std()
                .get_args()
                .map(|a| a.to_string_lossy().to_string())
                .collect()
        };

        let first = args(&runtime);
        assert!(!first.contains(&"--resume".to_string()));
        assert!(first.windows(2).any(|w| w == ["--allowedTools", "Task"]));
        assert_eq!(first[first.len() - 2..], ["-p", "hello"]);

        runtime.session_id = Some("sess-1".to_string());
        let second = args(&runtime);
        assert!(second.windows(2).any(|w| w == ["--resume", "sess-1"]));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn query_runs_a_cli_and_collects_the_turn() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let script = dir.path().join("fake-claude");
        let body = format!(
            "#!/bin/sh\necho 'starting' >&2\ncat <<'EOF'\n{}\nnot json\nEOF\n",
            STREAM.join("\n")
        );
        std::fs::write(&script, body).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let recorder = Arc::new(Recorder::default());
        let mut runtime = AgentRuntime::new(RuntimeOptions {
            claude_bin: script,
            ..RuntimeOptions::default()
        });
        runtime.register_hook(recorder.clone());

        let mut seen = 0;
        let summary = runtime.query("hi", |_| seen += 1).await.unwrap();

        assert!(summary.success);
        assert_eq!(summary.num_turns, Some(3));
        assert_eq!(runtime.session_id(), Some("sess-1"));
        assert_eq!(seen, 2);
        assert_eq!(recorder.calls().len(), 4);
    }

    #[tokio::test]
    async fn missing_binary_is_an_error() {
        let mut runtime = AgentRuntime::new(RuntimeOptions {
            claude_bin: PathBuf::from("/nonexistent/claude-binary"),
            ..RuntimeOptions::default()
        });
        assert!(runtime.query("hi", |_| {}).await.is_err());
    }
}
