//! partywatch - party tracker for Hypixel-style game chat
//!
//! Replays a saved client log, or follows a live one, through the party state
//! machine and prints every party event as it happens.

mod chat_log;
mod config;
mod core;
mod parser;

use crate::core::state::Timestamp;
use crate::core::{AppCore, PartyEvent};
use anyhow::{Context, Result};
use chat_log::{ChatLogReader, LogClock, SourceMessage};
use chrono::Utc;
use clap::{Parser as ClapParser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

#[derive(ClapParser)]
#[command(name = "partywatch")]
#[command(about = "Track party state from game chat logs", long_about = None)]
struct Cli {
    /// Configuration file path (default: ~/.partywatch/config.toml)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Write diagnostics to this file instead of stderr
    #[arg(long, value_name = "FILE", global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a saved log and print the resulting events
    Replay {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Local player's username (overrides config)
        #[arg(short, long)]
        player: Option<String>,

        /// Print events as JSON lines
        #[arg(long)]
        json: bool,

        /// Treat every line as chat text (no game log prefix)
        #[arg(long)]
        plain: bool,
    },
    /// Follow a live log file until interrupted
    Follow {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Local player's username (overrides config)
        #[arg(short, long)]
        player: Option<String>,

        /// Print events as JSON lines
        #[arg(long)]
        json: bool,

        /// Treat every line as chat text (no game log prefix)
        #[arg(long)]
        plain: bool,

        /// How often to check the file for new lines
        #[arg(long, value_name = "MS", default_value_t = 250)]
        poll_ms: u64,
    },
    /// Print whether a line reads as server or player chat
    Classify {
        text: String,

        /// Also print the sender for player lines
        #[arg(long)]
        sender: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = if let Some(config_path) = &cli.config {
        config::Config::load_from_path(config_path)?
    } else {
        config::Config::load()?
    };

    init_logging(&config.logging, cli.log_file.as_deref())?;

    match cli.command {
        Commands::Replay {
            file,
            player,
            json,
            plain,
        } => {
            let mut core = build_core(config, player)?;
            replay(&mut core, &file, json, plain)
        }
        Commands::Follow {
            file,
            player,
            json,
            plain,
            poll_ms,
        } => {
            let core = build_core(config, player)?;
            // Use tokio runtime for async file tailing
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(follow(
                core,
                file,
                json,
                plain,
                std::time::Duration::from_millis(poll_ms),
            ))
        }
        Commands::Classify { text, sender } => {
            let classifier = parser::ChatClassifier::new()?;
            let kind = classifier.classify(&text);
            println!("{}", kind.as_str());
            if sender {
                if let Some(name) = classifier.extract_player_name(&text) {
                    println!("{}", name);
                }
            }
            Ok(())
        }
    }
}

/// Initialize logging (RUST_LOG wins over the config)
fn init_logging(logging: &config::LoggingConfig, log_file: Option<&Path>) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(logging.filter_directives()));

    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .context(format!("Failed to open log file: {:?}", path))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false) // No color codes in log file
                .init();
        }
        None => {
            // stdout carries the events, keep diagnostics off it
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }

    Ok(())
}

fn build_core(config: config::Config, player: Option<String>) -> Result<AppCore> {
    let mut core = AppCore::new(config)?;
    if player.is_some() {
        core.set_local_player(player);
    }
    if core.party.local_player().is_none() {
        tracing::warn!("No local player name set; invites to you and your own joins will be ignored");
    }
    Ok(core)
}

/// Listener that prints each event to stdout
fn event_printer(json: bool) -> impl Fn(&PartyEvent) -> Result<()> + Send + Sync + 'static {
    move |event: &PartyEvent| {
        if json {
            let line = serde_json::to_string(event)
                .context(format!("Failed to serialize {} event", event.name()))?;
            println!("{}", line);
        } else {
            println!("{:<20} {}", event.name(), event);
        }
        Ok(())
    }
}

fn print_summary(core: &mut AppCore, now: Timestamp) {
    if !core.config.summary.enabled {
        return;
    }
    println!();
    for line in core.summary(now) {
        println!("{}", line);
    }
}

fn replay(core: &mut AppCore, file: &Path, json: bool, plain: bool) -> Result<()> {
    let lines = chat_log::read_log(file, plain)?;
    core.add_listener(event_printer(json));

    let mut clock = LogClock::new(Utc::now().date_naive());
    for line in &lines {
        let now = clock.stamp(line.time);
        core.process_line(&line.text, now);
    }

    tracing::info!(
        "Replayed {} lines ({} accepted), in party: {}",
        lines.len(),
        core.lines_processed,
        core.is_in_party()
    );

    if !json {
        print_summary(core, clock.now());
    }
    Ok(())
}

async fn follow(
    mut core: AppCore,
    file: PathBuf,
    json: bool,
    plain: bool,
    poll: std::time::Duration,
) -> Result<()> {
    core.add_listener(event_printer(json));

    let (line_tx, mut line_rx) = mpsc::unbounded_channel::<SourceMessage>();

    // Spawn reader task
    let path = file.clone();
    let reader_handle = tokio::spawn(async move {
        if let Err(e) = chat_log::follow(&path, line_tx, poll).await {
            tracing::error!("Log follower stopped: {:#}", e);
        }
    });

    let mut log_reader = ChatLogReader::new(plain);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            msg = line_rx.recv() => match msg {
                Some(SourceMessage::Line(raw)) => {
                    if let Some(line) = log_reader.feed(&raw) {
                        core.process_line(&line.text, Utc::now());
                    }
                }
                Some(SourceMessage::Truncated) => {
                    tracing::info!("Log file {:?} restarted", file);
                    log_reader = ChatLogReader::new(plain);
                }
                Some(SourceMessage::Closed) | None => {
                    tracing::info!("Log source closed");
                    break;
                }
            },
            _ = &mut ctrl_c => {
                tracing::info!("Interrupted, stopping");
                break;
            }
        }
    }

    reader_handle.abort();

    if !json {
        print_summary(&mut core, Utc::now());
    }
    Ok(())
}
