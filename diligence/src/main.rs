//! Diligence - M&A due diligence with a team of Claude subagents.
//!
//! A lead agent delegates document, financial and legal review to analyst
//! subagents, then hands their findings to a risk assessor and a report
//! writer. Every session records:
//! - a transcript of what was said and which subagents ran (`transcript.txt`)
//! - an audit log with one record per tool call (`tool_calls.jsonl`)

mod agents;
mod claude;
mod cli;
mod config;
mod hooks;
mod models;
mod processor;
mod session;
mod text;
mod tracker;
mod transcript;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use cli::{execute, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();
    execute(cli).await
}
