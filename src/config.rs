//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::relay::DEFAULT_CHANNEL_ID;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub relay: RelayConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_path")]
    pub path: String,

    #[serde(default = "default_channel")]
    pub default_channel: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_path() -> String {
    "/ws".to_string()
}

fn default_channel() -> String {
    DEFAULT_CHANNEL_ID.to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            path: default_path(),
            default_channel: default_channel(),
        }
    }
}

/// Broadcast engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,

    #[serde(default)]
    pub evict_empty_channels: bool,
}

fn default_outbound_buffer() -> usize {
    64
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            outbound_buffer: default_outbound_buffer(),
            evict_empty_channels: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("channel-relay").join("config.toml")),
            Some(PathBuf::from("/etc/channel-relay/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from `lookup`; unparseable values are ignored
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // Server overrides
        if let Some(host) = lookup("RELAY_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("RELAY_PORT").and_then(|s| s.parse().ok()) {
            self.server.port = port;
        }
        if let Some(path) = lookup("RELAY_PATH") {
            self.server.path = path;
        }
        if let Some(channel) = lookup("RELAY_DEFAULT_CHANNEL") {
            self.server.default_channel = channel;
        }

        // Relay overrides
        if let Some(buffer) = lookup("RELAY_OUTBOUND_BUFFER").and_then(|s| s.parse().ok()) {
            self.relay.outbound_buffer = buffer;
        }
        if let Some(evict) = lookup("RELAY_EVICT_EMPTY_CHANNELS").and_then(|s| parse_bool(&s)) {
            self.relay.evict_empty_channels = evict;
        }

        // Logging overrides
        if let Some(level) = lookup("RELAY_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("RELAY_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Channel Relay Configuration
#
# Environment variables override these settings:
# - RELAY_HOST
# - RELAY_PORT
# - RELAY_PATH
# - RELAY_DEFAULT_CHANNEL
# - RELAY_OUTBOUND_BUFFER
# - RELAY_EVICT_EMPTY_CHANNELS
# - RELAY_LOG_LEVEL
# - RELAY_LOG_FORMAT

[server]
# Listener host
host = "0.0.0.0"

# Listener port
port = 8000

# Path of the WebSocket upgrade endpoint
path = "/ws"

# Channel joined by clients that send no channel_id
default_channel = "global"

[relay]
# Frames queued per connection before broadcasts wait for the writer
outbound_buffer = 64

# Remove channels from the registry once their last subscriber leaves
evict_empty_channels = false

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
