//! Configuration file parser for the watcher.
//!
//! Unlike most optional settings files, the config is required: it carries the
//! feed list, so a missing file is a startup error. Both TOML (default) and the
//! older JSON layout (`config.json`) are accepted, chosen by file extension.
//! Unknown keys are accepted but logged as warnings, since they are usually typos.
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::util::validate_feed_url;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing config file: {0}")]
    Missing(PathBuf),

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid JSON in config file: {0}")]
    Json(#[from] serde_json::Error),

    /// SEC-014: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level watcher configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
///
/// SEC-015: Custom Debug impl masks `discord_webhook_url`, which embeds the
/// webhook token in its path.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seconds to sleep between poll cycles.
    pub interval_seconds: u64,

    /// Feed URLs in processing order.
    pub feeds: Vec<String>,

    /// Discord webhook to announce new entries on. `None` = log only.
    pub discord_webhook_url: Option<String>,

    /// Dedup state document. Relative paths resolve against the config file's directory.
    pub state_file: PathBuf,

    /// Directory holding one stats document per feed.
    pub stats_dir: PathBuf,

    /// Upper bound for each feed fetch and each webhook call.
    pub request_timeout_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval_seconds: 300,
            feeds: Vec::new(),
            discord_webhook_url: None,
            state_file: PathBuf::from("seen.json"),
            stats_dir: PathBuf::from("stats"),
            request_timeout_seconds: 30,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("interval_seconds", &self.interval_seconds)
            .field("feeds", &self.feeds)
            .field(
                "discord_webhook_url",
                &self.discord_webhook_url.as_ref().map(|_| "[REDACTED]"),
            )
            .field("state_file", &self.state_file)
            .field("stats_dir", &self.stats_dir)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .finish()
    }
}

const KNOWN_KEYS: [&str; 6] = [
    "interval_seconds",
    "feeds",
    "discord_webhook_url",
    "state_file",
    "stats_dir",
    "request_timeout_seconds",
];

impl Config {
    /// SEC-014: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load and validate configuration.
    ///
    /// - Missing file → `Err(ConfigError::Missing)`
    /// - `.json` extension → parsed as JSON, anything else as TOML
    /// - Invalid syntax or wrong types → `Err(ConfigError::Toml | Json)`
    /// - Semantically invalid values → `Err(ConfigError::Invalid)`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::Missing(path.to_path_buf()));
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::Missing(path.to_path_buf()));
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let mut config = if is_json {
            Self::from_json(&content)?
        } else {
            Self::from_toml(&content)?
        };

        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
        config.resolve_paths(base_dir);
        config.validate()?;

        tracing::info!(
            path = %path.display(),
            feeds = config.feeds.len(),
            interval_seconds = config.interval_seconds,
            notify = config.discord_webhook_url.is_some(),
            "Loaded configuration"
        );
        Ok(config)
    }

    fn from_toml(content: &str) -> Result<Self, ConfigError> {
        if let Ok(raw) = content.parse::<toml::Table>() {
            warn_unknown_keys(raw.keys().map(String::as_str));
        }
        Ok(toml::from_str(content)?)
    }

    fn from_json(content: &str) -> Result<Self, ConfigError> {
        if let Ok(serde_json::Value::Object(raw)) = serde_json::from_str(content) {
            warn_unknown_keys(raw.keys().map(String::as_str));
        }
        Ok(serde_json::from_str(content)?)
    }

    fn resolve_paths(&mut self, base_dir: &Path) {
        if self.state_file.is_relative() {
            self.state_file = base_dir.join(&self.state_file);
        }
        if self.stats_dir.is_relative() {
            self.stats_dir = base_dir.join(&self.stats_dir);
        }
    }

    /// Check value ranges and feed URLs, dropping duplicate feeds.
    fn validate(&mut self) -> Result<(), ConfigError> {
        if self.interval_seconds == 0 {
            return Err(ConfigError::Invalid(
                "interval_seconds must be greater than 0".to_string(),
            ));
        }
        if self.request_timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_seconds must be greater than 0".to_string(),
            ));
        }

        for feed in &self.feeds {
            validate_feed_url(feed)
                .map_err(|e| ConfigError::Invalid(format!("feed '{}': {}", feed, e)))?;
        }

        if let Some(webhook) = &self.discord_webhook_url {
            // Don't echo the URL back; it contains the webhook token.
            validate_feed_url(webhook)
                .map_err(|e| ConfigError::Invalid(format!("discord_webhook_url: {}", e)))?;
        }

        let mut seen = HashSet::new();
        self.feeds.retain(|feed| {
            let first = seen.insert(feed.clone());
            if !first {
                tracing::warn!(feed = %feed, "Duplicate feed in config, ignoring");
            }
            first
        });

        if self.feeds.is_empty() {
            tracing::warn!("No feeds configured, every cycle will be empty");
        }

        Ok(())
    }
}

fn warn_unknown_keys<'a>(keys: impl Iterator<Item = &'a str>) {
    for key in keys {
        if !KNOWN_KEYS.contains(&key) {
            tracing::warn!(key = %key, "Unknown key in config file, ignoring");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
