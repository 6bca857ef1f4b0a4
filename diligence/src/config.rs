//! Startup configuration.
//!
//! Everything the chat command needs is validated here, before any working
//! directory or session directory is created.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::agents::AgentRoster;
use crate::claude::RuntimeOptions;
use crate::cli::Cli;

/// Environment variable holding the Anthropic credential.
pub const API_KEY_VAR: &str = "ANTHROPIC_API_KEY";

/// Optional `KEY=value` file read from the working directory at startup.
pub const ENV_FILE: &str = ".env";

/// Lead agent prompt file inside the prompts directory.
pub const LEAD_PROMPT_FILE: &str = "lead_agent.txt";

/// Directories the diligence workflow reads from and writes to.
pub const WORKING_DIRS: &[&str] = &[
    "files/uploads",
    "files/analysis_notes",
    "files/risk_assessment",
    "files/reports",
];

/// Tools the lead agent may use without prompting.
const LEAD_TOOLS: &[&str] = &["Task"];

/// Problems with the startup configuration.
///
/// These are shown to the user as-is, so messages are full sentences.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(
        "ANTHROPIC_API_KEY not found.\n\
         Set it in a .env file or export it in your shell.\n\
         Get your key at: https://console.anthropic.com/settings/keys"
    )]
    MissingApiKey,

    #[error("Prompt file not found: {}", path.display())]
    MissingPrompt { path: PathBuf },

    #[error("Could not read prompt file {}: {source}", path.display())]
    UnreadablePrompt {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Validated configuration for an interactive session.
#[derive(Debug, Clone)]
pub struct Config {
    pub logs_dir: PathBuf,
    pub model: String,
    pub claude_bin: PathBuf,
    pub lead_prompt: String,
    pub roster: AgentRoster,
}

impl Config {
    /// Check the credential and load every prompt.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        check_api_key(std::env::var_os(API_KEY_VAR))?;

        let lead_prompt = load_prompt(&cli.prompts_dir, LEAD_PROMPT_FILE)?;
        let roster = AgentRoster::load(&cli.prompts_dir)?;

        Ok(Self {
            logs_dir: cli.logs_dir.clone(),
            model: cli.model.clone(),
            claude_bin: cli.claude_bin.clone(),
            lead_prompt,
            roster,
        })
    }

    /// Options for the agent runtime of the lead agent.
    pub fn runtime_options(&self) -> Result<RuntimeOptions> {
        Ok(RuntimeOptions {
            claude_bin: self.claude_bin.clone(),
            model: self.model.clone(),
            system_prompt: Some(self.lead_prompt.clone()),
            agents: Some(self.roster.agents_json()?),
            allowed_tools: LEAD_TOOLS.iter().map(ToString::to_string).collect(),
            setting_sources: Some("project".to_string()),
            working_dir: None,
        })
    }
}

/// Load `dir/.env` into the process environment.
///
/// Variables that are already set keep their value. Returns the file that was
/// read, or `None` when there is no such file.
pub fn load_env_file(dir: &Path) -> Result<Option<PathBuf>> {
    let path = dir.join(ENV_FILE);
    match dotenvy::from_path(&path) {
        Ok(()) => Ok(Some(path)),
        Err(dotenvy::Error::Io(e)) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to load {}", path.display())),
    }
}

/// A credential counts as present only when non-empty.
pub fn check_api_key(value: Option<OsString>) -> Result<(), ConfigError> {
    match value {
        Some(key) if !key.is_empty() => Ok(()),
        _ => Err(ConfigError::MissingApiKey),
    }
}

/// Read a prompt file, trimmed.
pub fn load_prompt(dir: &Path, file: &str) -> Result<String, ConfigError> {
    let path = dir.join(file);
    match std::fs::read_to_string(&path) {
        Ok(text) => Ok(text.trim().to_string()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(ConfigError::MissingPrompt { path }),
        Err(source) => Err(ConfigError::UnreadablePrompt { path, source }),
    }
}

/// Create the workflow directories under `root`.
pub fn prepare_working_dirs(root: &Path) -> Result<()> {
    for dir in WORKING_DIRS {
        let path = root.join(dir);
        std::fs::create_dir_all(&path)
            .with_context(|| format!("Failed to create directory: {}", path.display()))?;
    }
    Ok(())
}
