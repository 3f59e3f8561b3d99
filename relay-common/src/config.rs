//! Configuration management for the relay bot.
//!
//! The bot reads a single configuration file at `~/.relay/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Environment variables
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `DISCORD_TOKEN` → discord.bot_token
//! - `DISCORD_OWNER_ID` → discord.owner_id
//! - `RELAY_BACKEND_URL` → backend.endpoint
//! - `RELAY_LOG_LEVEL` → observability.log_level
//! - `RELAY_CHANNEL` → channel

use crate::error::{Error, Result, ResultExt};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new()
        .map_or_else(
            || PathBuf::from(".relay"),
            |dirs| dirs.home_dir().join(".relay"),
        )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Channel selection
// ============================================================================

/// Which inbound channel the binary runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    #[default]
    Discord,
    Cli,
}

impl ChannelKind {
    /// Parse a channel name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "discord" => Some(Self::Discord),
            "cli" => Some(Self::Cli),
            _ => None,
        }
    }
}

// ============================================================================
// Discord
// ============================================================================

/// Discord channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Bot token (prefer `DISCORD_TOKEN` over storing it in the file)
    #[serde(default)]
    pub bot_token: String,

    /// User allowed to run `!resetmemory`
    #[serde(default)]
    pub owner_id: Option<String>,

    /// Only relay messages from this guild
    #[serde(default)]
    pub guild_id: Option<String>,

    /// Allowed user IDs, `*` for everyone
    #[serde(default = "default_allowed_users")]
    pub allowed_users: Vec<String>,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bot_token: String::new(),
            owner_id: None,
            guild_id: None,
            allowed_users: default_allowed_users(),
        }
    }
}

fn default_allowed_users() -> Vec<String> {
    vec!["*".into()]
}

// ============================================================================
// Generation backend
// ============================================================================

/// Text/image generation backend (OpenAI-compatible g4f API).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the backend
    #[serde(default = "default_backend_endpoint")]
    pub endpoint: String,

    /// Chat completion path
    #[serde(default = "default_chat_path")]
    pub chat_path: String,

    /// Image generation path
    #[serde(default = "default_image_path")]
    pub image_path: String,

    /// Model sent with chat requests; empty lets the backend pick
    #[serde(default)]
    pub chat_model: String,

    /// Model sent with image generation requests
    #[serde(default = "default_image_model")]
    pub image_model: String,

    /// HTTP timeout for a backend call in seconds
    #[serde(default = "default_backend_timeout")]
    pub timeout_secs: u64,

    /// Provider-side timeout forwarded in the chat payload
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            endpoint: default_backend_endpoint(),
            chat_path: default_chat_path(),
            image_path: default_image_path(),
            chat_model: String::new(),
            image_model: default_image_model(),
            timeout_secs: default_backend_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl BackendConfig {
    /// Full chat completion URL.
    pub fn chat_url(&self) -> String {
        join_url(&self.endpoint, &self.chat_path)
    }

    /// Full image generation URL.
    pub fn image_url(&self) -> String {
        join_url(&self.endpoint, &self.image_path)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn default_backend_endpoint() -> String {
    "http://localhost:1337".into()
}

fn default_chat_path() -> String {
    "/v1/chat/completions".into()
}

fn default_image_path() -> String {
    "/v1/images/generate".into()
}

fn default_image_model() -> String {
    "flux".into()
}

fn default_backend_timeout() -> u64 {
    600
}

fn default_request_timeout() -> u64 {
    60
}

// ============================================================================
// Conversation
// ============================================================================

/// Conversation history and reply sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Number of most recent turns rendered into the prompt
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Maximum characters per outbound message
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
            max_message_length: default_max_message_length(),
        }
    }
}

fn default_history_window() -> usize {
    5
}

fn default_max_message_length() -> usize {
    1800
}

// ============================================================================
// Observability
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Root
// ============================================================================

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Inbound channel to run
    #[serde(default)]
    pub channel: ChannelKind,

    /// Discord channel
    #[serde(default)]
    pub discord: DiscordConfig,

    /// Generation backend
    #[serde(default)]
    pub backend: BackendConfig,

    /// Conversation settings
    #[serde(default)]
    pub conversation: ConversationConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .context(format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides, then validate it.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("DISCORD_TOKEN") {
            self.discord.bot_token = token;
        }
        if let Some(owner) = lookup("DISCORD_OWNER_ID") {
            if !owner.trim().is_empty() {
                self.discord.owner_id = Some(owner.trim().to_string());
            }
        }
        if let Some(url) = lookup("RELAY_BACKEND_URL") {
            self.backend.endpoint = url;
        }
        if let Some(level) = lookup("RELAY_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(channel) = lookup("RELAY_CHANNEL") {
            match ChannelKind::parse(&channel) {
                Some(kind) => self.channel = kind,
                None => tracing::warn!(value = %channel, "Ignoring unknown RELAY_CHANNEL"),
            }
        }
    }

    /// Check the settings the relay cannot run without.
    pub fn validate(&self) -> Result<()> {
        if self.conversation.history_window == 0 {
            return Err(Error::Config(
                "conversation.history_window must be at least 1".into(),
            ));
        }
        if self.conversation.max_message_length == 0 {
            return Err(Error::Config(
                "conversation.max_message_length must be at least 1".into(),
            ));
        }
        if self.channel == ChannelKind::Discord {
            if !self.discord.enabled {
                return Err(Error::Config(
                    "channel is \"discord\" but discord.enabled is false".into(),
                ));
            }
            if self.discord.bot_token.trim().is_empty() {
                return Err(Error::Config(
                    "discord.bot_token is empty (set DISCORD_TOKEN)".into(),
                ));
            }
        }
        if self.backend.endpoint.trim().is_empty() {
            return Err(Error::Config("backend.endpoint is empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.channel, ChannelKind::Discord);
        assert_eq!(config.conversation.history_window, 5);
        assert_eq!(config.conversation.max_message_length, 1800);
        assert_eq!(config.backend.endpoint, "http://localhost:1337");
        assert_eq!(config.backend.image_model, "flux");
        assert_eq!(config.backend.timeout_secs, 600);
        assert_eq!(config.discord.allowed_users, vec!["*".to_string()]);
    }

    #[test]
    fn test_backend_urls() {
        let backend = BackendConfig::default();
        assert_eq!(
            backend.chat_url(),
            "http://localhost:1337/v1/chat/completions"
        );
        assert_eq!(
            backend.image_url(),
            "http://localhost:1337/v1/images/generate"
        );

        let trailing = BackendConfig {
            endpoint: "http://g4f:1337/".into(),
            ..BackendConfig::default()
        };
        assert_eq!(trailing.chat_url(), "http://g4f:1337/v1/chat/completions");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"conversation": {{"history_window": 8}}, "discord": {{"owner_id": "42"}}}}"#
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.conversation.history_window, 8);
        assert_eq!(config.conversation.max_message_length, 1800);
        assert_eq!(config.discord.owner_id.as_deref(), Some("42"));
        assert!(config.discord.enabled);
    }

    #[test]
    fn test_invalid_file_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let err = Config::load_from(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_overrides(lookup_from(&[
            ("DISCORD_TOKEN", "tok"),
            ("DISCORD_OWNER_ID", " 1234 "),
            ("RELAY_BACKEND_URL", "http://backend:9000"),
            ("RELAY_LOG_LEVEL", "debug"),
            ("RELAY_CHANNEL", "CLI"),
        ]));

        assert_eq!(config.discord.bot_token, "tok");
        assert_eq!(config.discord.owner_id.as_deref(), Some("1234"));
        assert_eq!(config.backend.endpoint, "http://backend:9000");
        assert_eq!(config.observability.log_level, "debug");
        assert_eq!(config.channel, ChannelKind::Cli);
    }

    #[test]
    fn test_unknown_channel_override_is_ignored() {
        let mut config = Config::default();
        config.apply_overrides(lookup_from(&[("RELAY_CHANNEL", "irc")]));
        assert_eq!(config.channel, ChannelKind::Discord);
    }

    #[test]
    fn test_validate() {
        let mut config = Config::default();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.discord.bot_token = "tok".into();
        assert!(config.validate().is_ok());

        config.conversation.max_message_length = 0;
        assert!(config.validate().is_err());

        let cli = Config {
            channel: ChannelKind::Cli,
            ..Config::default()
        };
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_disabled_discord_is_rejected_when_selected() {
        let mut config = Config::default();
        config.discord.bot_token = "tok".into();
        config.discord.enabled = false;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("discord.enabled is false"));

        // irrelevant once another channel is selected
        config.channel = ChannelKind::Cli;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(
            err,
            Error::WithContext { ref source, .. } if matches!(**source, Error::Io(_))
        ));
        assert!(err.to_string().contains("absent.json"));
    }
}
