//! Loading, validating and resolving configuration.

pub mod schema;

pub use schema::{
    Config, IdentityConfig, LoggingConfig, PercentileConfig, RelaysConfig, APP_DIR_NAME, NSEC_ENV,
};

use anyhow::{Context, Result};
use nostr_sdk::prelude::Keys;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Largest accepted activity offset, in minutes (UTC-14 .. UTC+14).
const MAX_OFFSET_MINUTES: i32 = 14 * 60;

/// `~/.nostr-recap/config.toml`, if a home directory is known.
pub fn default_config_path() -> Option<PathBuf> {
    directories::UserDirs::new().map(|dirs| dirs.home_dir().join(APP_DIR_NAME).join("config.toml"))
}

impl Config {
    /// Load from an explicit path, or from the default location. A missing
    /// default file yields the built-in defaults; a missing explicit file
    /// is an error.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => match default_config_path() {
                Some(default) if default.exists() => Self::load_from_file(&default.to_string_lossy())?,
                _ => {
                    tracing::debug!("No config file found, using defaults");
                    Self::default()
                }
            },
        };
        config.expand_paths();
        Ok(config)
    }

    pub fn load_from_file(path: &str) -> Result<Self> {
        let expanded_path = shellexpand::tilde(path);
        let content = fs::read_to_string(expanded_path.as_ref())
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML config")
    }

    pub fn expand_paths(&mut self) {
        self.identity.nsec_file = shellexpand::tilde(&self.identity.nsec_file).to_string();
    }

    pub fn validate(&self) -> Result<()> {
        for relay in &self.relays.default {
            validate_relay_url(relay)?;
        }

        let offset = self.stats.activity_timezone_offset_minutes;
        if offset.abs() > MAX_OFFSET_MINUTES {
            anyhow::bail!("activity_timezone_offset_minutes must be within ±{MAX_OFFSET_MINUTES}, got {offset}");
        }

        if self.relays.fetch_timeout_secs == 0 {
            anyhow::bail!("fetch_timeout_secs must be greater than 0");
        }

        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.relays.fetch_timeout_secs)
    }

    /// Signing keys from `RECAP_NSEC` or the identity file. `Ok(None)`
    /// means no identity is configured and the engine runs read-only.
    pub fn load_keys(&self) -> Result<Option<Keys>> {
        let secret = self.resolve_secret(std::env::var(NSEC_ENV).ok())?;
        secret
            .map(|s| Keys::parse(s.trim()).context("Invalid secret key"))
            .transpose()
    }

    fn resolve_secret(&self, env_value: Option<String>) -> Result<Option<String>> {
        if let Some(secret) = env_value.filter(|s| !s.trim().is_empty()) {
            return Ok(Some(secret));
        }

        let path = Path::new(&self.identity.nsec_file);
        if !path.exists() {
            tracing::debug!("No identity file at {}, running read-only", path.display());
            return Ok(None);
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read identity file: {}", self.identity.nsec_file))?;
        let json: Value = serde_json::from_str(&content).context("Failed to parse identity JSON")?;
        let nsec = json
            .get("nsec")
            .and_then(|v| v.as_str())
            .context("Identity file must contain 'nsec' field")?;

        Ok(Some(nsec.to_string()))
    }
}

/// Accept only `ws://` and `wss://` URLs.
pub fn validate_relay_url(url: &str) -> Result<()> {
    if !url.starts_with("wss://") && !url.starts_with("ws://") {
        anyhow::bail!("Relay URL must start with ws:// or wss://: {url}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use recap_stats::AffinityAlgorithm;
    use std::io::Write;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.relays.fetch_timeout_secs, 30);
        assert_eq!(config.stats.activity_timezone_offset_minutes, 540);
        assert_eq!(config.percentile.population_limit, 500);
        assert!(config.percentile.match_relays);
        assert!(!config.percentile.match_period);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::from_toml(
            r#"
            [relays]
            default = ["wss://nos.lol"]

            [stats]
            affinity_algorithm = "weighted_sum"

            [percentile]
            match_relays = false
            match_period = true
            "#,
        )
        .unwrap();
        assert_eq!(config.relays.default, vec!["wss://nos.lol"]);
        assert_eq!(config.relays.fetch_timeout_secs, 30);
        assert_eq!(config.stats.affinity_algorithm, AffinityAlgorithm::WeightedSum);
        assert_eq!(config.stats.top_posts, 3);
        assert!(!config.percentile.match_relays);
        assert!(config.percentile.match_period);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn rejects_non_websocket_relays() {
        let config = Config::from_toml("[relays]\ndefault = [\"https://nos.lol\"]").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_offset() {
        let config = Config::from_toml("[stats]\nactivity_timezone_offset_minutes = 900").unwrap();
        assert!(config.validate().is_err());

        let config = Config::from_toml("[stats]\nactivity_timezone_offset_minutes = -600").unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        assert!(Config::load(Some("/nonexistent/nostr-recap.toml")).is_err());
    }

    #[test]
    fn env_secret_wins_over_file() {
        let config = Config {
            identity: IdentityConfig {
                nsec_file: "/nonexistent/identity.json".to_string(),
            },
            ..Default::default()
        };
        assert_eq!(config.resolve_secret(None).unwrap(), None);
        assert_eq!(
            config.resolve_secret(Some("nsec1abc".to_string())).unwrap(),
            Some("nsec1abc".to_string())
        );
        assert_eq!(config.resolve_secret(Some("  ".to_string())).unwrap(), None);
    }

    #[test]
    fn identity_file_is_read() {
        let keys = Keys::generate();
        let secret = keys.secret_key().to_secret_hex();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"nsec": "{secret}"}}"#).unwrap();

        let config = Config {
            identity: IdentityConfig {
                nsec_file: file.path().to_string_lossy().to_string(),
            },
            ..Default::default()
        };
        assert_eq!(config.resolve_secret(None).unwrap(), Some(secret.clone()));

        let parsed = Keys::parse(&secret).unwrap();
        assert_eq!(parsed.public_key(), keys.public_key());
    }

    #[test]
    fn identity_file_without_nsec_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"npub": "x"}}"#).unwrap();

        let config = Config {
            identity: IdentityConfig {
                nsec_file: file.path().to_string_lossy().to_string(),
            },
            ..Default::default()
        };
        assert!(config.resolve_secret(None).is_err());
    }
}
