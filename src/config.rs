use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::env;
use std::time::Duration;

pub const PRICE_API_BASE_URL: &str = "PRICE_API_BASE_URL";
pub const PRICE_API_MIN_INTERVAL_MS: &str = "PRICE_API_MIN_INTERVAL_MS";
pub const PRICE_API_MAX_RETRIES: &str = "PRICE_API_MAX_RETRIES";
pub const PRICE_API_BACKOFF_BASE_MS: &str = "PRICE_API_BACKOFF_BASE_MS";
pub const PRICE_API_TIMEOUT_SECS: &str = "PRICE_API_TIMEOUT_SECS";
pub const PRICE_API_USER_AGENT: &str = "PRICE_API_USER_AGENT";

const SETTING_KEYS: [&str; 6] = [
    PRICE_API_BASE_URL,
    PRICE_API_MIN_INTERVAL_MS,
    PRICE_API_MAX_RETRIES,
    PRICE_API_BACKOFF_BASE_MS,
    PRICE_API_TIMEOUT_SECS,
    PRICE_API_USER_AGENT,
];

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";
const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Settings for talking to the historical price provider.
#[derive(Debug, Clone)]
pub struct DataClientSettings {
    pub base_url: String,
    pub min_request_interval: Duration,
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for DataClientSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            min_request_interval: Duration::from_millis(2000),
            max_retries: 3,
            backoff_base: Duration::from_millis(1000),
            request_timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl DataClientSettings {
    /// Overlays any present keys onto the defaults. Absent keys keep their default.
    pub fn from_settings_map(settings: &HashMap<String, String>) -> Result<Self> {
        let mut resolved = Self::default();

        if let Some(base_url) = optional_setting(settings, PRICE_API_BASE_URL) {
            if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                return Err(anyhow!(
                    "Setting {} must be an http(s) URL (value: {})",
                    PRICE_API_BASE_URL,
                    base_url
                ));
            }
            resolved.base_url = base_url.trim_end_matches('/').to_string();
        }
        if optional_setting(settings, PRICE_API_MIN_INTERVAL_MS).is_some() {
            resolved.min_request_interval =
                Duration::from_millis(require_setting_u64(settings, PRICE_API_MIN_INTERVAL_MS, 0)?);
        }
        if optional_setting(settings, PRICE_API_MAX_RETRIES).is_some() {
            let retries = require_setting_u64(settings, PRICE_API_MAX_RETRIES, 0)?;
            resolved.max_retries = u32::try_from(retries).map_err(|_| {
                anyhow!(
                    "Setting {} is out of range (value: {})",
                    PRICE_API_MAX_RETRIES,
                    retries
                )
            })?;
        }
        if optional_setting(settings, PRICE_API_BACKOFF_BASE_MS).is_some() {
            resolved.backoff_base =
                Duration::from_millis(require_setting_u64(settings, PRICE_API_BACKOFF_BASE_MS, 0)?);
        }
        if optional_setting(settings, PRICE_API_TIMEOUT_SECS).is_some() {
            resolved.request_timeout =
                Duration::from_secs(require_setting_u64(settings, PRICE_API_TIMEOUT_SECS, 1)?);
        }
        if let Some(user_agent) = optional_setting(settings, PRICE_API_USER_AGENT) {
            resolved.user_agent = user_agent.to_string();
        }

        Ok(resolved)
    }

    pub fn from_env() -> Result<Self> {
        let settings: HashMap<String, String> = SETTING_KEYS
            .iter()
            .filter_map(|key| env::var(key).ok().map(|value| (key.to_string(), value)))
            .collect();
        Self::from_settings_map(&settings)
    }
}

fn optional_setting<'a>(settings: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    settings
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

fn require_setting<'a>(settings: &'a HashMap<String, String>, key: &str) -> Result<&'a str> {
    optional_setting(settings, key).ok_or_else(|| anyhow!("Missing required setting {}", key))
}

fn require_setting_u64(settings: &HashMap<String, String>, key: &str, min: u64) -> Result<u64> {
    let raw = require_setting(settings, key)?;
    let value = raw
        .parse::<f64>()
        .map_err(|_| anyhow!("Setting {} must be a number (value: {})", key, raw))?;
    if !value.is_finite() {
        return Err(anyhow!("Setting {} must be finite (value: {})", key, raw));
    }
    if value.fract() != 0.0 {
        return Err(anyhow!(
            "Setting {} must be an integer (value: {})",
            key,
            raw
        ));
    }
    if value < min as f64 {
        return Err(anyhow!(
            "Setting {} must be >= {} (value: {})",
            key,
            min,
            raw
        ));
    }
    Ok(value as u64)
}
