//! Configuration system for the quartermaster
//!
//! Settings come from an optional JSON file under `~/.quartermaster` and are
//! then overridden by environment variables (typically loaded from `.env`).

use crate::error::{ConfigError, Result};
use serde::de::{self, Deserializer, Unexpected, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

pub const ENV_TOKEN: &str = "DISCORD_BOT_TOKEN";
pub const ENV_GUILD_ID: &str = "DISCORD_GUILD_ID";
pub const ENV_MAX_RETRIES: &str = "DISCORD_BOT_MAX_RETRIES";
pub const ENV_RETRY_DELAY: &str = "DISCORD_BOT_RETRY_DELAY";
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_DEFAULT_ADMIN: &str = "DEFAULT_ADMIN_DISCORD_ID";

/// Discord connection configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DiscordConfig {
    /// Bot token from the Discord Developer Portal
    #[serde(default)]
    pub token: String,
    /// Guild for instant slash command registration
    #[serde(default)]
    pub guild_id: Option<u64>,
}

/// Reconnect behaviour of the bot runner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Additional connection attempts after the first one
    #[serde(
        default = "default_max_retries",
        deserialize_with = "deserialize_max_retries"
    )]
    pub max_retries: u32,
    /// Whole seconds to wait before each retry
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_secs() -> u64 {
    15
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay_secs(),
        }
    }
}

impl ReconnectConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

/// Relational store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// sqlx connection URL, `sqlite://...` or `sqlite::memory:`
    #[serde(default = "default_database_url")]
    pub url: String,
    /// Pool size
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// How long a caller waits for a pooled connection
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
}

fn default_database_url() -> String {
    format!("sqlite://{}", get_data_dir().join("quartermaster.db").display())
}

fn default_max_connections() -> u32 {
    5
}

fn default_acquire_timeout_ms() -> u64 {
    5_000
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
        }
    }
}

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Discord user promoted to server admin at startup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_admin_discord_id: Option<String>,
}

impl Config {
    /// The bot token, or a fatal configuration error when it is unset
    pub fn require_token(&self) -> std::result::Result<&str, ConfigError> {
        let token = self.discord.token.trim();
        if token.is_empty() {
            return Err(ConfigError::Missing(ENV_TOKEN.to_string()));
        }
        Ok(token)
    }
}

/// Parse `DISCORD_BOT_MAX_RETRIES`. Negative values clamp to zero, values
/// past `u32::MAX` saturate.
pub fn parse_max_retries(raw: &str) -> std::result::Result<u32, ConfigError> {
    let value = raw.trim();
    let (negative, digits) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value.strip_prefix('+').unwrap_or(value)),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid(ENV_MAX_RETRIES, raw));
    }
    if negative {
        return Ok(0);
    }
    Ok(digits.parse().unwrap_or(u32::MAX))
}

/// Same clamping as the environment override, for the config file
fn deserialize_max_retries<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    struct MaxRetries;

    impl Visitor<'_> for MaxRetries {
        type Value = u32;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a whole number of retries")
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<u32, E> {
            Ok(v.clamp(0, u32::MAX as i64) as u32)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<u32, E> {
            Ok(v.min(u32::MAX as u64) as u32)
        }

        // serde_json hands integers wider than u64 over as floats
        fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<u32, E> {
            if !v.is_finite() || v.fract() != 0.0 {
                return Err(E::invalid_value(Unexpected::Float(v), &self));
            }
            Ok(v.clamp(0.0, u32::MAX as f64) as u32)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<u32, E> {
            parse_max_retries(v).map_err(|_| E::invalid_value(Unexpected::Str(v), &self))
        }
    }

    deserializer.deserialize_any(MaxRetries)
}

/// Parse `DISCORD_BOT_RETRY_DELAY` as whole, non-negative seconds.
pub fn parse_retry_delay(raw: &str) -> std::result::Result<u64, ConfigError> {
    raw.trim().parse().map_err(|_| invalid(ENV_RETRY_DELAY, raw))
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
    }
}

/// Get the default config directory
pub fn get_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".quartermaster")
}

/// Get the config file path
pub fn get_config_path() -> PathBuf {
    get_config_dir().join("config.json")
}

/// Get the data directory (database lives here by default)
pub fn get_data_dir() -> PathBuf {
    get_config_dir()
}

/// Read and parse a config file. A missing file is an error.
pub async fn read_config_file(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()).into());
    }

    let contents = fs::read_to_string(path).await?;
    let config: Config = serde_json::from_str(&contents)
        .map_err(|e| ConfigError::Parse(format!("Failed to parse config JSON: {}", e)))?;

    Ok(config)
}

/// Load configuration: config file if present, defaults otherwise, then
/// environment overrides.
pub async fn load_config() -> Result<Config> {
    let path = get_config_path();
    let mut config = match read_config_file(&path).await {
        Ok(config) => config,
        Err(crate::QuartermasterError::Config(ConfigError::NotFound(_))) => {
            tracing::debug!("no config file at {}, using defaults", path.display());
            Config::default()
        }
        Err(e) => return Err(e),
    };

    apply_env_overrides(&mut config)?;
    Ok(config)
}

/// Apply process environment overrides to config
pub fn apply_env_overrides(config: &mut Config) -> std::result::Result<(), ConfigError> {
    apply_overrides_from(config, |key| std::env::var(key).ok())
}

/// Apply overrides from an arbitrary lookup. Blank values count as unset.
pub fn apply_overrides_from<F>(config: &mut Config, lookup: F) -> std::result::Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(token) = get(ENV_TOKEN) {
        config.discord.token = token.trim().to_string();
    }
    if let Some(raw) = get(ENV_GUILD_ID) {
        let id = raw.trim().parse().map_err(|_| invalid(ENV_GUILD_ID, &raw))?;
        config.discord.guild_id = Some(id);
    }
    if let Some(raw) = get(ENV_MAX_RETRIES) {
        config.reconnect.max_retries = parse_max_retries(&raw)?;
    }
    if let Some(raw) = get(ENV_RETRY_DELAY) {
        config.reconnect.retry_delay_secs = parse_retry_delay(&raw)?;
    }
    if let Some(url) = get(ENV_DATABASE_URL) {
        config.database.url = url;
    }
    if let Some(admin) = get(ENV_DEFAULT_ADMIN) {
        config.default_admin_discord_id = Some(admin.trim().to_string());
    }

    Ok(())
}

/// Save configuration to file
pub async fn save_config(config: &Config) -> Result<()> {
    let config_path = get_config_path();

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let json = serde_json::to_string_pretty(config)
        .map_err(|e| ConfigError::Parse(format!("Failed to serialize config: {}", e)))?;

    fs::write(&config_path, json).await?;

    Ok(())
}
