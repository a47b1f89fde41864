use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use pingtube::config::Config;
use pingtube::feed::HttpFeedSource;
use pingtube::http::build_client;
use pingtube::notify::DiscordNotifier;
use pingtube::poll::PollCycle;
use pingtube::state::StateStore;
use pingtube::stats::StatsTracker;

#[derive(Parser, Debug)]
#[command(name = "pingtube", about = "Announce new feed entries to a Discord webhook")]
struct Args {
    /// Path to the config file (.toml, or legacy .json)
    #[arg(long, env = "PINGTUBE_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    /// Run a single poll cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let timeout = Duration::from_secs(config.request_timeout_seconds);
    let client = build_client(timeout).context("Failed to build HTTP client")?;

    let source = HttpFeedSource::new(client.clone()).with_timeout(timeout);
    let notifier = DiscordNotifier::from_config(client.clone(), &config);
    if notifier.is_none() {
        tracing::warn!("No discord_webhook_url configured, new entries will only be logged");
    }

    let store = StateStore::new(&config.state_file);
    let states = store
        .load(Utc::now())
        .with_context(|| format!("Failed to load state from {}", config.state_file.display()))?;

    let stats = StatsTracker::new(&config.stats_dir);
    let poll = PollCycle::new(config.feeds.clone(), source, notifier, store, stats);

    tracing::info!(
        interval_secs = config.interval_seconds,
        feeds = config.feeds.len(),
        "Starting pingtube"
    );

    if args.once {
        let mut states = states;
        let report = poll.run_cycle(&mut states).await;
        tracing::info!(
            new = report.new_entries,
            failed = report.feeds_failed,
            persisted = report.persisted,
            "Single cycle complete"
        );
        if !report.persisted {
            anyhow::bail!("State was not persisted");
        }
        return Ok(());
    }

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C, running until killed");
            std::future::pending::<()>().await;
        }
    };
    poll.run(states, Duration::from_secs(config.interval_seconds), shutdown)
        .await;

    Ok(())
}
