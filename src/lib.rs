//! # Channel Relay
//!
//! A realtime message relay: clients open a WebSocket, join a named channel
//! and exchange short text messages that are fanned out to every subscriber
//! of the same channel.
//!
//! ## Features
//!
//! - **Lazy channels**: Created on first reference, exactly once per id
//! - **Failure isolation**: A broken subscriber is dropped without affecting the rest
//! - **Serialized writes**: Each connection has a single writer task
//! - **Optional eviction**: Empty channels can be reclaimed
//!
//! ## Modules
//!
//! - [`relay`]: Channel registry, broadcast engine and connection handling
//! - [`api`]: HTTP router and server with Axum
//! - [`config`]: TOML and environment configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use channel_relay::relay::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = ChannelRegistry::default();
//!
//!     let (handle, mut queue) = ConnectionHandle::new(16);
//!     let channel = registry.join("room-a", handle, User::new(1)).await;
//!
//!     let message = RelayMessage::from_user(&User::new(1), "hello");
//!     channel.broadcast(&message, false).await?;
//!
//!     if let Some(frame) = queue.next_frame().await {
//!         println!("{}", frame);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod relay;

// Re-export top-level types for convenience
pub use relay::{
    BroadcastReport, Channel, ChannelRegistry, ConnectionHandle, RelayError, RelayMessage,
    RelayResult, User, DEFAULT_CHANNEL_ID,
};

pub use api::{build_router, serve, ApiConfig, ApiError, AppState};

pub use config::{Config, ConfigError, LoggingConfig, RelayConfig, ServerConfig};
