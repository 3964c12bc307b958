//! Configuration types for nostr-recap.

use recap_stats::StatsConfig;
use serde::{Deserialize, Serialize};

// ── Identity ────────────────────────────────────────────────────

/// Default config directory name under `$HOME`.
pub const APP_DIR_NAME: &str = ".nostr-recap";

/// Environment variable holding an nsec (or hex secret), overriding the
/// identity file.
pub const NSEC_ENV: &str = "RECAP_NSEC";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub relays: RelaysConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub stats: StatsConfig,
    #[serde(default)]
    pub percentile: PercentileConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

// ── Relays ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelaysConfig {
    /// Relays queried when the request names none.
    #[serde(default = "default_relays")]
    pub default: Vec<String>,
    /// Per-relay fetch timeout.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

impl Default for RelaysConfig {
    fn default() -> Self {
        Self {
            default: default_relays(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

pub fn default_relays() -> Vec<String> {
    vec![
        "wss://relay.damus.io".to_string(),
        "wss://nos.lol".to_string(),
        "wss://relay.primal.net".to_string(),
        "wss://relay.snort.social".to_string(),
    ]
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

// ── Identity file ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IdentityConfig {
    /// JSON file with an `nsec` field. A missing file means read-only.
    #[serde(default = "default_nsec_file")]
    pub nsec_file: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            nsec_file: default_nsec_file(),
        }
    }
}

fn default_nsec_file() -> String {
    format!("~/{APP_DIR_NAME}/identity.json")
}

// ── Percentile ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PercentileConfig {
    /// Maximum number of published records fetched for the population.
    #[serde(default = "default_population_limit")]
    pub population_limit: usize,
    /// Only compare against snapshots computed over the same relay set.
    #[serde(default = "default_true")]
    pub match_relays: bool,
    /// Only compare against snapshots computed over the same window.
    #[serde(default)]
    pub match_period: bool,
}

impl Default for PercentileConfig {
    fn default() -> Self {
        Self {
            population_limit: default_population_limit(),
            match_relays: true,
            match_period: false,
        }
    }
}

fn default_population_limit() -> usize {
    500
}

fn default_true() -> bool {
    true
}

// ── Logging ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
