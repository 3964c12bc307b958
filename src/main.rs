use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nostr_core::RelayClient;
use nostr_recap::config::{validate_relay_url, Config};
use nostr_recap::engine::{self, SnapshotOrigin, StatsRequest};
use nostr_recap::progress::ProgressUpdate;
use nostr_recap::publish::publish_snapshot;
use nostr_recap::{reconcile, report};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "recap")]
#[command(about = "Year-in-review activity statistics for Nostr identities")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (default: ~/.nostr-recap/config.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Log level override (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute activity stats for an identity
    Stats {
        /// npub or hex pubkey
        subject: String,

        /// Window start: unix seconds or YYYY-MM-DD
        #[arg(long)]
        since: Option<String>,

        /// Window end (exclusive): unix seconds or YYYY-MM-DD
        #[arg(long)]
        until: Option<String>,

        /// Calendar year at the configured activity offset
        #[arg(long, conflicts_with_all = ["since", "until"])]
        year: Option<i32>,

        /// Relay to query (repeatable, replaces the configured set)
        #[arg(long = "relay")]
        relays: Vec<String>,

        /// Ignore previously published snapshots
        #[arg(long)]
        force_refresh: bool,

        /// Sign and publish the computed snapshot
        #[arg(long)]
        publish: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List recently published snapshots
    Recent {
        /// Maximum number of authors to show
        #[arg(long, default_value_t = 20)]
        limit: usize,

        /// Relay to query (repeatable, replaces the configured set)
        #[arg(long = "relay")]
        relays: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    init_logging(cli.log_level.as_deref().unwrap_or(&config.logging.level))?;
    config.validate().context("Configuration validation failed")?;

    match cli.command {
        Commands::Stats {
            subject,
            since,
            until,
            year,
            relays,
            force_refresh,
            publish,
            json,
        } => {
            let offset = config.stats.activity_timezone_offset_minutes;
            let period = report::resolve_period(since.as_deref(), until.as_deref(), year, offset)?;
            let relays = pick_relays(relays, &config)?;
            let keys = if publish { config.load_keys()? } else { None };

            let request = StatsRequest::new(subject, relays.clone(), period).force_refresh(force_refresh);
            request.validate()?;

            let client = RelayClient::new(keys, relays.clone(), config.fetch_timeout()).await;

            let (tx, mut rx) = mpsc::unbounded_channel::<ProgressUpdate>();
            let progress = tokio::spawn(async move {
                while let Some(update) = rx.recv().await {
                    info!("[{:>3}%] {}", update.percent, update.message);
                }
            });

            let result = engine::compute(&client, &config, &request, &tx).await;
            drop(tx);
            let _ = progress.await;
            let stats = result?;

            if json {
                report::print_report_json(&stats)?;
            } else {
                report::print_report(&stats, offset);
            }

            if publish {
                if let SnapshotOrigin::Cached { event_id, .. } = &stats.origin {
                    info!("Snapshot already published as {event_id}, skipping publish");
                } else {
                    let created_at = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0);
                    let outcome = publish_snapshot(&client, &stats.snapshot, &relays, created_at).await?;
                    if !json {
                        report::print_publish_outcome(&outcome);
                    }
                }
            }

            client.disconnect().await;
        }
        Commands::Recent { limit, relays, json } => {
            let relays = pick_relays(relays, &config)?;
            let client = RelayClient::new(None, relays.clone(), config.fetch_timeout()).await;
            let records = reconcile::list_recent(&client, &relays, limit).await;

            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                report::print_recent(&records, config.stats.activity_timezone_offset_minutes);
            }

            client.disconnect().await;
        }
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config).context("Failed to serialize config")?);
        }
    }

    Ok(())
}

fn pick_relays(cli_relays: Vec<String>, config: &Config) -> Result<Vec<String>> {
    if cli_relays.is_empty() {
        if config.relays.default.is_empty() {
            warn!("No relays configured");
        }
        return Ok(config.relays.default.clone());
    }
    for relay in &cli_relays {
        validate_relay_url(relay)?;
    }
    Ok(cli_relays)
}

fn init_logging(level: &str) -> Result<()> {
    let filter = match level.to_lowercase().as_str() {
        "error" => tracing::Level::ERROR,
        "warn" => tracing::Level::WARN,
        "info" => tracing::Level::INFO,
        "debug" => tracing::Level::DEBUG,
        "trace" => tracing::Level::TRACE,
        _ => tracing::Level::INFO,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter.to_string())),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false)
                .compact(),
        )
        .init();

    Ok(())
}
