//! Cache configuration.
//!
//! Values come from the environment at startup and are passed into the
//! cache explicitly; nothing is read from global state afterwards.

use std::str::FromStr;
use std::time::Duration;

use crate::error::BridgeError;

pub const ENV_CACHE_MAX_ITEMS: &str = "NOTEBRIDGE_CACHE_MAX_ITEMS";
pub const ENV_CACHE_TTL_SECS: &str = "NOTEBRIDGE_CACHE_TTL_SECS";
pub const ENV_REFRESH_INTERVAL_MINS: &str = "NOTEBRIDGE_REFRESH_INTERVAL_MINS";
pub const ENV_REFRESH_CONCURRENCY: &str = "NOTEBRIDGE_REFRESH_CONCURRENCY";
pub const ENV_REPAIR_ENABLED: &str = "NOTEBRIDGE_REPAIR_ENABLED";
pub const ENV_REPAIR_DRY_RUN: &str = "NOTEBRIDGE_REPAIR_DRY_RUN";
pub const ENV_MAX_REPAIRS_PER_RUN: &str = "NOTEBRIDGE_MAX_REPAIRS_PER_RUN";
pub const ENV_LOWERCASE_TAGS: &str = "NOTEBRIDGE_LOWERCASE_TAGS";
pub const ENV_RETRY_ATTEMPTS: &str = "NOTEBRIDGE_RETRY_ATTEMPTS";
pub const ENV_RETRY_DELAY_MS: &str = "NOTEBRIDGE_RETRY_DELAY_MS";

/// Longest accepted refresh period.
pub const MAX_REFRESH_INTERVAL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Tuning knobs for the vault cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of notes held in the content cache.
    pub content_max_items: usize,
    /// Sliding expiry for content cache entries.
    pub content_ttl: Duration,
    /// Period of the background refresh.
    pub refresh_interval: Duration,
    /// Maximum in-flight per-file fetches during a refresh.
    pub refresh_concurrency: usize,
    pub repair_enabled: bool,
    /// Log repair plans instead of writing them.
    pub repair_dry_run: bool,
    /// Applied repairs allowed per refresh pass.
    pub max_repairs_per_run: usize,
    pub lowercase_tags: bool,
    /// Attempts per source call when the failure is transient (1 = no retry).
    pub retry_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            content_max_items: 500,
            content_ttl: Duration::from_secs(600),
            refresh_interval: Duration::from_secs(10 * 60),
            refresh_concurrency: 5,
            repair_enabled: false,
            repair_dry_run: true,
            max_repairs_per_run: 10,
            lowercase_tags: false,
            retry_attempts: 3,
            retry_delay: Duration::from_millis(250),
        }
    }
}

impl CacheConfig {
    /// Load configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Config`] for unparsable or out-of-range values.
    pub fn from_env() -> Result<Self, BridgeError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup. Unset keys keep
    /// their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Config`] for unparsable or out-of-range values.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, BridgeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = parse_var::<usize>(&lookup, ENV_CACHE_MAX_ITEMS)? {
            config.content_max_items = v;
        }
        if let Some(v) = parse_var::<u64>(&lookup, ENV_CACHE_TTL_SECS)? {
            config.content_ttl = Duration::from_secs(v);
        }
        if let Some(v) = parse_var::<u64>(&lookup, ENV_REFRESH_INTERVAL_MINS)? {
            config.refresh_interval = Duration::from_secs(v.saturating_mul(60));
        }
        if let Some(v) = parse_var::<usize>(&lookup, ENV_REFRESH_CONCURRENCY)? {
            config.refresh_concurrency = v;
        }
        if let Some(v) = parse_bool(&lookup, ENV_REPAIR_ENABLED)? {
            config.repair_enabled = v;
        }
        if let Some(v) = parse_bool(&lookup, ENV_REPAIR_DRY_RUN)? {
            config.repair_dry_run = v;
        }
        if let Some(v) = parse_var::<usize>(&lookup, ENV_MAX_REPAIRS_PER_RUN)? {
            config.max_repairs_per_run = v;
        }
        if let Some(v) = parse_bool(&lookup, ENV_LOWERCASE_TAGS)? {
            config.lowercase_tags = v;
        }
        if let Some(v) = parse_var::<u32>(&lookup, ENV_RETRY_ATTEMPTS)? {
            config.retry_attempts = v;
        }
        if let Some(v) = parse_var::<u64>(&lookup, ENV_RETRY_DELAY_MS)? {
            config.retry_delay = Duration::from_millis(v);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Config`] naming the first offending setting.
    pub fn validate(&self) -> Result<(), BridgeError> {
        let checks = [
            (self.content_max_items == 0, ENV_CACHE_MAX_ITEMS),
            (self.content_ttl.is_zero(), ENV_CACHE_TTL_SECS),
            (self.refresh_interval.is_zero(), ENV_REFRESH_INTERVAL_MINS),
            (self.refresh_concurrency == 0, ENV_REFRESH_CONCURRENCY),
            (self.retry_attempts == 0, ENV_RETRY_ATTEMPTS),
        ];
        for (invalid, key) in checks {
            if invalid {
                return Err(BridgeError::Config(format!("{key} must be greater than 0")));
            }
        }
        if self.refresh_interval > MAX_REFRESH_INTERVAL {
            return Err(BridgeError::Config(format!(
                "{ENV_REFRESH_INTERVAL_MINS} must be at most {} minutes",
                MAX_REFRESH_INTERVAL.as_secs() / 60
            )));
        }
        Ok(())
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, BridgeError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<T>()
        .map(Some)
        .map_err(|e| BridgeError::Config(format!("{key}={raw:?}: {e}")))
}

fn parse_bool(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<bool>, BridgeError> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "" => Ok(None),
        "true" | "1" | "yes" | "on" => Ok(Some(true)),
        "false" | "0" | "no" | "off" => Ok(Some(false)),
        other => Err(BridgeError::Config(format!(
            "{key}={other:?}: expected a boolean"
        ))),
    }
}
