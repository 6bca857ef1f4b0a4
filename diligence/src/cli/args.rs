//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Diligence - M&A due diligence with a team of Claude subagents
#[derive(Parser, Debug)]
#[command(name = "diligence")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory holding one subdirectory per session
    #[arg(long, global = true, env = "DILIGENCE_LOGS_DIR", default_value = "logs")]
    pub logs_dir: PathBuf,

    /// Directory holding the lead and subagent prompt files
    #[arg(
        long,
        global = true,
        env = "DILIGENCE_PROMPTS_DIR",
        default_value = "prompts"
    )]
    pub prompts_dir: PathBuf,

    /// Model for the lead agent (e.g., haiku, sonnet, opus)
    #[arg(short, long, global = true, default_value = "haiku")]
    pub model: String,

    /// Claude CLI executable
    #[arg(long, global = true, env = "DILIGENCE_CLAUDE_BIN", default_value = "claude")]
    pub claude_bin: PathBuf,

    /// Subcommand to execute (defaults to chat)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Start an interactive diligence session
    Chat,

    /// List past sessions
    Sessions,

    /// Summarize a past session's tool call log
    Replay {
        /// Session ID (with or without the `session_` prefix) or directory
        session: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_chat_with_default_dirs() {
        let cli = Cli::parse_from(["diligence"]);
        assert_eq!(cli.command, None);
        assert_eq!(cli.model, "haiku");
        assert_eq!(cli.logs_dir, PathBuf::from("logs"));
    }

    #[test]
    fn global_options_after_subcommand() {
        let cli = Cli::parse_from([
            "diligence",
            "replay",
            "20260101_000000_abcdef",
            "--logs-dir",
            "/tmp/x",
        ]);
        assert_eq!(
            cli.command,
            Some(Commands::Replay {
                session: "20260101_000000_abcdef".to_string()
            })
        );
        assert_eq!(cli.logs_dir, PathBuf::from("/tmp/x"));
    }
}
