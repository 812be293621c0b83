//! Application State
//!
//! Shared state accessible by the upgrade handler.
//! Wrapped in Arc for thread-safe sharing across connection tasks.

use crate::config::Config;
use crate::relay::{ChannelRegistry, RegistryConfig, DEFAULT_CHANNEL_ID};
use std::sync::Arc;

/// Shared application state for all connections
#[derive(Clone)]
pub struct AppState {
    /// Channel registry shared by every connection
    pub registry: Arc<ChannelRegistry>,
    /// Server configuration
    pub config: Arc<ApiConfig>,
}

impl AppState {
    /// Create state with a fresh registry
    pub fn new(config: ApiConfig) -> Self {
        let registry = ChannelRegistry::new(RegistryConfig {
            evict_empty_channels: config.evict_empty_channels,
        });
        Self::with_registry(config, Arc::new(registry))
    }

    /// Create state around an existing registry
    pub fn with_registry(config: ApiConfig, registry: Arc<ChannelRegistry>) -> Self {
        Self {
            registry,
            config: Arc::new(config),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Path of the upgrade endpoint
    pub path: String,
    /// Channel joined when the client names none
    pub default_channel: String,
    /// Frames queued per connection before broadcasts wait
    pub outbound_buffer: usize,
    /// Remove channels once empty
    pub evict_empty_channels: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            path: "/ws".to_string(),
            default_channel: DEFAULT_CHANNEL_ID.to_string(),
            outbound_buffer: 64,
            evict_empty_channels: false,
        }
    }
}

impl ApiConfig {
    /// Create config with custom host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl From<&Config> for ApiConfig {
    fn from(config: &Config) -> Self {
        let path = if config.server.path.starts_with('/') {
            config.server.path.clone()
        } else {
            format!("/{}", config.server.path)
        };

        Self {
            host: config.server.host.clone(),
            port: config.server.port,
            path,
            default_channel: config.server.default_channel.clone(),
            outbound_buffer: config.relay.outbound_buffer,
            evict_empty_channels: config.relay.evict_empty_channels,
        }
    }
}
