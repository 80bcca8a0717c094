//! Juggle monitor - Main entry point
//!
//! Runs one session's worker (`<tool> agent run <SESSION_ID>`) and shows its
//! output live, either in a terminal UI or as plain lines.

mod monitor;
mod output_log;
mod plain;
mod tui;

use anyhow::Context;
use clap::{Parser, Subcommand};
use juggle_foundation::{
    JsonSessionStore, MemorySessionStore, MonitorConfig, SessionStore, PROJECT_DIR,
};
use juggle_supervisor::{Bridge, Supervisor, SupervisorConfig};
use monitor::{Monitor, SessionEnricher};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const LOG_FILE: &str = "monitor.log";

/// Juggle monitor - run an agent session and watch its output
#[derive(Parser, Debug)]
#[command(name = "juggle-monitor")]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true, subcommand_negates_reqs = true)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Session to run
    #[arg(required = true)]
    session_id: Option<String>,

    /// Worker executable (overrides config)
    #[arg(long)]
    tool: Option<String>,

    /// Print output lines instead of the terminal UI
    #[arg(long)]
    plain: bool,

    /// Iteration cap shown in the status (overrides config)
    #[arg(long)]
    max_iterations: Option<u32>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the effective configuration as JSON
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    let config = load_config(&args)?;

    if let Some(Command::Config) = args.command {
        println!("{}", serde_json::to_string_pretty(&config.resolved())?);
        return Ok(ExitCode::SUCCESS);
    }

    let session_id = args
        .session_id
        .clone()
        .context("SESSION_ID is required")?;
    let plain = args.plain || !std::io::stdout().is_terminal();
    init_logging(args.debug, plain)?;

    info!(
        session_id = %session_id,
        tool = %config.tool().display(),
        plain,
        "Starting monitor"
    );

    let supervisor = Arc::new(Supervisor::new(SupervisorConfig::from(&config)));
    let (bridge, events) = Bridge::new(supervisor);
    let bridge = bridge.with_enricher(Arc::new(SessionEnricher::new(session_store())));
    let monitor = Monitor::new(session_id, &config);

    let code = if plain {
        plain::run(&bridge, events, monitor).await?
    } else {
        tui::run(&bridge, events, monitor).await?
    };

    Ok(ExitCode::from(u8::try_from(code).unwrap_or(1)))
}

/// Merged file config with command-line overrides on top
fn load_config(args: &Args) -> anyhow::Result<MonitorConfig> {
    let mut config = MonitorConfig::load().context("Failed to load monitor config")?;
    if let Some(tool) = &args.tool {
        config = config.with_tool(tool.clone());
    }
    if let Some(max) = args.max_iterations {
        config = config.with_max_iterations(max);
    }
    config.validate()?;
    Ok(config)
}

fn session_store() -> Box<dyn SessionStore> {
    match JsonSessionStore::current_project() {
        Ok(store) => Box::new(store),
        Err(e) => {
            warn!(error = %e, "Session store unavailable, completion records will be bare");
            Box::new(MemorySessionStore::new())
        }
    }
}

/// TUI mode logs to a file so the screen stays clean; plain mode logs to stderr.
fn init_logging(debug: bool, plain: bool) -> anyhow::Result<()> {
    let log_level = if debug { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    if plain {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
        return Ok(());
    }

    let dir = log_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(LOG_FILE))
        .with_context(|| format!("Failed to open log file in {}", dir.display()))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file)),
        )
        .init();
    Ok(())
}

fn log_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("juggle"))
        .unwrap_or_else(|| PathBuf::from(PROJECT_DIR))
        .join("logs")
}
