// src/models/config.rs

//! Application configuration structures.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};

/// Environment variable overriding `discord.token`.
pub const ENV_DISCORD_TOKEN: &str = "ANNOUNCER_DISCORD_TOKEN";
/// Environment variable overriding `discord.channel_id`.
pub const ENV_DISCORD_CHANNEL: &str = "ANNOUNCER_DISCORD_CHANNEL";
/// Environment variable overriding the Blackboard session cookie.
pub const ENV_BLACKBOARD_COOKIE: &str = "ANNOUNCER_BLACKBOARD_COOKIE";

/// Longest accepted poll interval (one week).
pub const MAX_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Poll schedule
    #[serde(default)]
    pub poller: PollerConfig,

    /// Where the announcement stream comes from
    #[serde(default)]
    pub source: SourceConfig,

    /// Discord bot settings
    #[serde(default)]
    pub discord: DiscordConfig,

    /// Optional state persistence
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| AppError::config(format!("cannot read {}: {e}", path.display())))?;
        Ok(toml::from_str(&content)?)
    }

    /// Replace secrets with values from the environment, when set.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup(ENV_DISCORD_TOKEN) {
            self.discord.token = token;
        }
        if let Some(channel) = lookup(ENV_DISCORD_CHANNEL) {
            self.discord.channel_id = channel;
        }
        if let (Some(cookie), SourceConfig::Blackboard(bb)) =
            (lookup(ENV_BLACKBOARD_COOKIE), &mut self.source)
        {
            bb.cookie = cookie;
        }
    }

    /// Validate configuration values for basic sanity.
    ///
    /// `notify` is false for dry runs, where Discord settings are unused.
    pub fn validate(&self, notify: bool) -> Result<()> {
        if self.poller.interval_minutes == 0 {
            return Err(AppError::validation("poller.interval_minutes must be > 0"));
        }
        if self.poller.interval_minutes > MAX_INTERVAL_MINUTES {
            return Err(AppError::validation(format!(
                "poller.interval_minutes must be <= {MAX_INTERVAL_MINUTES}"
            )));
        }

        match &self.source {
            SourceConfig::Blackboard(bb) => {
                Url::parse(&bb.base_url).map_err(|e| {
                    AppError::validation(format!("source.base_url is invalid: {e}"))
                })?;
                if bb.user_agent.trim().is_empty() {
                    return Err(AppError::validation("source.user_agent is empty"));
                }
                if bb.timeout_secs == 0 {
                    return Err(AppError::validation("source.timeout_secs must be > 0"));
                }
                if bb.cookie.trim().is_empty() {
                    return Err(AppError::validation(format!(
                        "source.cookie is empty (set it in the config or {ENV_BLACKBOARD_COOKIE})"
                    )));
                }
            }
            SourceConfig::File { path } => {
                if path.as_os_str().is_empty() {
                    return Err(AppError::validation("source.path is empty"));
                }
            }
        }

        if notify {
            if self.discord.token.trim().is_empty() {
                return Err(AppError::validation(format!(
                    "discord.token is empty (set it in the config or {ENV_DISCORD_TOKEN})"
                )));
            }
            if self.discord.channel_id.trim().is_empty() {
                return Err(AppError::validation("discord.channel_id is empty"));
            }
            Url::parse(&self.discord.api_base).map_err(|e| {
                AppError::validation(format!("discord.api_base is invalid: {e}"))
            })?;
        }

        Ok(())
    }
}

/// Poll schedule settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Minutes between two fetches
    #[serde(default = "defaults::interval_minutes")]
    pub interval_minutes: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_minutes: defaults::interval_minutes(),
        }
    }
}

/// Announcement stream source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceConfig {
    /// Live Blackboard stream endpoint
    Blackboard(BlackboardConfig),

    /// A `loadStream` payload saved on disk
    File { path: PathBuf },
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self::Blackboard(BlackboardConfig::default())
    }
}

/// Blackboard stream endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlackboardConfig {
    /// Root of the Blackboard instance
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// `Cookie` header of an authenticated session
    #[serde(default)]
    pub cookie: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Wait between the priming request and the real one
    #[serde(default = "defaults::settle_delay")]
    pub settle_delay_ms: u64,
}

impl Default for BlackboardConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            cookie: String::new(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            settle_delay_ms: defaults::settle_delay(),
        }
    }
}

/// Discord bot settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Bot token from the developer portal
    #[serde(default)]
    pub token: String,

    /// Channel announcements are posted to
    #[serde(default)]
    pub channel_id: String,

    /// REST API root
    #[serde(default = "defaults::api_base")]
    pub api_base: String,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            channel_id: String::new(),
            api_base: defaults::api_base(),
        }
    }
}

/// State persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// JSON file holding seen announcements; in-memory only when unset
    #[serde(default)]
    pub state_file: Option<PathBuf>,
}

mod defaults {
    pub fn interval_minutes() -> u64 {
        1
    }
    pub fn base_url() -> String {
        "https://ntnu.blackboard.com".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:68.0) Gecko/20100101 Firefox/68.0".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn settle_delay() -> u64 {
        2000
    }
    pub fn api_base() -> String {
        "https://discord.com/api/v10".into()
    }
}
