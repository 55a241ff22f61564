//! Synheart Tracker CLI
//!
//! Send one-off events, replay recorded host signals, inspect configuration.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use synheart_tracker::{
    Clock, EventData, ManualClock, MemoryTransport, Millis, Priority, Signal, SourceConfig,
    TrackOptions, Tracker, TrackerConfig, VERSION,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Quiet time simulated after the last replayed signal so pending timers fire.
const TRAILING_QUIET_MS: Millis = 60_000;

/// Upper bound on timer rounds between two replayed signals.
const MAX_TIMER_STEPS: usize = 10_000;

#[derive(Parser)]
#[command(name = "synheart-track")]
#[command(author = "Synheart")]
#[command(version = VERSION)]
#[command(about = "Behavioral event tracking engine", long_about = None)]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Track a single event and flush it
    Send {
        /// Collector endpoint (overrides the config file)
        #[arg(long)]
        endpoint: Option<String>,

        /// Event name
        #[arg(long)]
        name: String,

        /// Event data as a JSON object
        #[arg(long)]
        data: Option<String>,

        /// Event priority (low, normal, high)
        #[arg(long, default_value = "normal")]
        priority: String,
    },
    /// Replay recorded signals from a JSON-lines file
    Replay {
        /// File with one `{"at": <ms>, "signal": {...}}` object per line
        file: PathBuf,

        /// Collector endpoint (overrides the config file)
        #[arg(long)]
        endpoint: Option<String>,

        /// Print payloads instead of sending them
        #[arg(long)]
        dry_run: bool,

        /// Collectors to run (scroll, input, navigation, performance, errors, exposure, or all)
        #[arg(long, default_value = "all")]
        sources: String,
    },
    /// Show the effective configuration
    Config,
}

/// One line of a replay file.
#[derive(Debug, Deserialize)]
struct ReplayEntry {
    at: Millis,
    signal: Signal,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Send {
            endpoint,
            name,
            data,
            priority,
        } => {
            cmd_send(
                cli.config.as_deref(),
                endpoint,
                name,
                data.as_deref(),
                &priority,
            )
            .await
        }
        Commands::Replay {
            file,
            endpoint,
            dry_run,
            sources,
        } => cmd_replay(cli.config.as_deref(), &file, endpoint, dry_run, &sources).await,
        Commands::Config => cmd_config(cli.config.as_deref()),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn load_config(path: Option<&Path>) -> anyhow::Result<TrackerConfig> {
    match path {
        Some(path) => TrackerConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => TrackerConfig::load_default().context("Failed to load default config"),
    }
}

async fn cmd_send(
    config_path: Option<&Path>,
    endpoint: Option<String>,
    name: String,
    data: Option<&str>,
    priority: &str,
) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(endpoint) = endpoint {
        config.endpoint = endpoint;
    }
    // One explicit event: no automatic collection.
    config.auto_page_view = false;
    config.auto_click = false;
    config.sources = SourceConfig::none();
    config.capture_panics = false;

    let data: EventData = match data {
        Some(json) => serde_json::from_str(json).context("--data must be a JSON object")?,
        None => EventData::new(),
    };
    let priority: Priority = priority.parse().map_err(anyhow::Error::msg)?;

    let tracker = Tracker::new(config).context("Invalid configuration")?;
    tracker.track_with(name, data, TrackOptions::priority(priority));
    let report = tracker.flush().await;

    if report.dropped > 0 {
        bail!(
            "Delivery failed: {} event(s) dropped after retries",
            report.dropped
        );
    }
    println!(
        "Delivered {} event(s) in {} batch(es)",
        report.delivered, report.batches_sent
    );
    Ok(())
}

async fn cmd_replay(
    config_path: Option<&Path>,
    file: &Path,
    endpoint: Option<String>,
    dry_run: bool,
    sources: &str,
) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(endpoint) = endpoint {
        config.endpoint = endpoint;
    }
    if dry_run && config.endpoint.trim().is_empty() {
        config.endpoint = "http://localhost/dry-run".to_string();
    }
    config.sources = SourceConfig::from_csv(sources);
    config.capture_panics = false;

    let entries = read_replay(file)?;
    let start = entries.first().map(|e| e.at).unwrap_or_default();
    let clock = ManualClock::new(start);

    let memory = MemoryTransport::new();
    let builder = Tracker::builder(config).clock(clock.clone());
    let builder = if dry_run {
        builder.transport(memory.clone())
    } else {
        builder
    };
    let tracker = builder.build().context("Invalid configuration")?;

    tracing::info!(signals = entries.len(), file = %file.display(), "Replaying signals");
    tracker.install();
    let mut last = start;
    for entry in entries {
        run_timers_until(&tracker, &clock, entry.at).await;
        tracker.dispatch(entry.signal);
        last = last.max(entry.at);
    }
    run_timers_until(&tracker, &clock, last + TRAILING_QUIET_MS).await;
    tracker.flush().await;
    tracker.uninstall();

    if dry_run {
        for event in memory.events().iter().chain(memory.beacon_events().iter()) {
            println!("{}", serde_json::to_string(event)?);
        }
    }
    eprintln!("{}", tracker.stats().summary());
    Ok(())
}

fn read_replay(file: &Path) -> anyhow::Result<Vec<ReplayEntry>> {
    let handle = std::fs::File::open(file)
        .with_context(|| format!("Failed to open replay file {}", file.display()))?;
    let mut entries = Vec::new();
    for (index, line) in std::io::BufReader::new(handle).lines().enumerate() {
        let line = line.context("Failed to read replay file")?;
        if line.trim().is_empty() {
            continue;
        }
        let entry: ReplayEntry = serde_json::from_str(&line)
            .with_context(|| format!("Invalid replay entry on line {}", index + 1))?;
        entries.push(entry);
    }
    // Stable, so signals recorded at the same instant keep their order.
    entries.sort_by_key(|e| e.at);
    Ok(entries)
}

/// Advance the clock through every timer due up to `until`.
async fn run_timers_until(tracker: &Tracker, clock: &ManualClock, until: Millis) {
    for _ in 0..MAX_TIMER_STEPS {
        match tracker.next_deadline() {
            Some(deadline) if deadline <= until => {
                clock.set(deadline.max(clock.now_ms()));
                tracker.tick().await;
            }
            _ => break,
        }
    }
    clock.set(until.max(clock.now_ms()));
}

fn cmd_config(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(TrackerConfig::default_path);

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {path:?}");
    if let Err(e) = config.validate() {
        println!("Warning: {e}");
    }
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
