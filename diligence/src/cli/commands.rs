//! CLI command execution.

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::agents::AgentRoster;
use crate::claude::AgentRuntime;
use crate::config::{load_env_file, prepare_working_dirs, Config};
use crate::processor::process_assistant_message;
use crate::session::Session;
use crate::tracker::{SessionReport, SubagentTracker};
use crate::transcript::TranscriptWriter;

use super::args::{Cli, Commands};

/// Inputs that end the interactive loop (compared lowercased).
const EXIT_WORDS: &[&str] = &["exit", "quit", "q"];

// === Command Execution ===

pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command.clone().unwrap_or(Commands::Chat) {
        Commands::Chat => chat(&cli).await,
        Commands::Sessions => list_sessions(&cli.logs_dir),
        Commands::Replay { session } => replay(&cli.logs_dir, &session),
    }
}

async fn chat(cli: &Cli) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    match load_env_file(&cwd) {
        Ok(Some(path)) => debug!(path = %path.display(), "loaded environment file"),
        Ok(None) => {}
        Err(e) => warn!(error = %format!("{e:#}"), "ignoring environment file"),
    }

    // Configuration problems end the run before anything touches the disk.
    let config = match Config::load(cli) {
        Ok(config) => config,
        Err(e) => {
            println!("\nError: {e}\n");
            return Ok(());
        }
    };
    let options = config.runtime_options()?;
    prepare_working_dirs(&cwd)?;

    let session = Session::create(&config.logs_dir)?;
    let transcript = Arc::new(TranscriptWriter::new(session.transcript_path()));
    let tracker = Arc::new(SubagentTracker::new(Arc::clone(&transcript), &session));

    let mut runtime = AgentRuntime::new(options);
    runtime.register_hook(tracker.clone());
    info!(session = session.id(), model = %config.model, "starting chat");

    print_banner(&config.roster);
    let outcome = chat_loop(&mut runtime, &tracker, &transcript).await;

    transcript.write("\n\nGoodbye!\n", "");
    transcript.close();
    tracker.close();

    println!("\nSession logs saved to: {}", session.dir().display());
    println!("  - Transcript: {}", session.transcript_path().display());
    println!("  - Tool calls: {}", session.tool_log_path().display());
    if let Some(id) = runtime.session_id() {
        println!("  - Claude session: {id}");
    }
    if tracker.write_failures() > 0 {
        eprintln!(
            "Warning: {} tool call record(s) could not be written.",
            tracker.write_failures()
        );
    }

    outcome
}

/// Read prompts until an exit word, EOF or Ctrl-C.
async fn chat_loop(
    runtime: &mut AgentRuntime,
    tracker: &SubagentTracker,
    transcript: &TranscriptWriter,
) -> Result<()> {
    let mut lines = spawn_line_reader(io::BufReader::new(io::stdin()));

    loop {
        print!("\nYou: ");
        std::io::stdout().flush().context("Failed to flush stdout")?;

        let line = tokio::select! {
            line = lines.recv() => line.transpose().context("Failed to read input")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };

        let input = line.trim();
        if is_exit(input) {
            break;
        }

        transcript.write_to_file(&format!("\nYou: {input}\n"));
        transcript.write("\nAgent: ", "");

        let turn = runtime.query(input, |message| {
            process_assistant_message(message, tracker, transcript);
        });
        let summary = tokio::select! {
            summary = turn => summary?,
            _ = tokio::signal::ctrl_c() => {
                log_interrupted(tracker);
                break;
            }
        };

        transcript.write("\n", "");
        if !summary.success {
            warn!(session_id = ?summary.session_id, "agent turn did not complete successfully");
        }
        info!(
            cost_usd = ?summary.cost_usd,
            num_turns = ?summary.num_turns,
            duration_ms = ?summary.duration_ms,
            "turn finished"
        );
    }

    Ok(())
}

/// Read lines from `reader` on a dedicated thread.
///
/// The thread is detached, so a read that never returns cannot hold up the
/// runtime's shutdown.
fn spawn_line_reader<R>(reader: R) -> mpsc::Receiver<io::Result<String>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(1);
    std::thread::spawn(move || {
        for line in reader.lines() {
            let failed = line.is_err();
            if tx.blocking_send(line).is_err() || failed {
                break;
            }
        }
    });
    rx
}

/// Log the delegations a Ctrl-C cut short.
fn log_interrupted(tracker: &SubagentTracker) {
    let now = Utc::now();
    for context in tracker.active_contexts() {
        let chain: Vec<String> = tracker
            .context_stack(&context.invocation_id)
            .into_iter()
            .map(|outer| outer.name)
            .collect();
        warn!(
            subagent = %chain.join(" > "),
            description = context.description.as_deref().unwrap_or("-"),
            running_secs = (now - context.started_at).num_seconds(),
            "delegation interrupted"
        );
    }
    warn!(open_calls = tracker.open_calls(), "interrupted during agent turn");
}

fn is_exit(input: &str) -> bool {
    input.is_empty() || EXIT_WORDS.contains(&input.to_lowercase().as_str())
}

fn print_banner(roster: &AgentRoster) {
    println!("\n{}", "=".repeat(60));
    println!("  M&A Due Diligence Agent");
    println!("{}", "=".repeat(60));
    println!("\nAnalyze documents for M&A transactions and generate");
    println!("comprehensive due diligence reports with risk assessment.");
    println!("\nSubagents:");
    for (name, agent) in roster.agents() {
        println!("  {name:<18} {}", agent.model);
    }
    println!("\nWorkflow:");
    println!("  1. Upload documents to files/uploads/");
    println!("  2. Request diligence review");
    println!("  3. Receive PDF report in files/reports/");
    println!("\nCommands:");
    println!("  /diligence  - Start comprehensive due diligence review");
    println!("  /financial  - Financial-focused analysis");
    println!("  /legal      - Legal/contract-focused analysis");
    println!("  /risk       - Risk assessment of current findings");
    println!("\nType 'exit' to quit.");
}

fn list_sessions(logs_dir: &Path) -> Result<()> {
    let sessions = Session::list(logs_dir)?;
    if sessions.is_empty() {
        println!("No sessions found in {}.", logs_dir.display());
        return Ok(());
    }

    println!("{:<34} {:<10} {:<10}", "SESSION", "RECORDS", "TRANSCRIPT");
    println!("{}", "-".repeat(56));
    for summary in sessions {
        println!(
            "{:<34} {:<10} {:<10}",
            summary.session.id(),
            summary.records,
            if summary.has_transcript { "yes" } else { "no" },
        );
    }
    Ok(())
}

fn replay(logs_dir: &Path, reference: &str) -> Result<()> {
    let session = Session::open(logs_dir, reference)?;
    let log = session.tool_log_path();

    println!("Session: {}", session.id());
    if !log.is_file() {
        println!("No tool calls recorded.");
        return Ok(());
    }

    let report = SessionReport::load(&log)?;
    print!("{}", report.render());
    Ok(())
}
