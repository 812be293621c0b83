//! Channel Relay Server
//!
//! Run with: cargo run -- [--config <path>] [--host <host>] [--port <port>]
//!
//! # Configuration
//!
//! Settings come from a TOML file (see `--print-config`), then `RELAY_*`
//! environment variables, then command-line flags. `RUST_LOG` takes
//! precedence over the configured log level.

use channel_relay::api::{serve, ApiConfig, AppState};
use channel_relay::config::{generate_default_config, Config, LoggingConfig};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "channel-relay")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Realtime channel relay over WebSocket")]
struct Cli {
    /// Path to a TOML config file (default: standard locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Print a default config file and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.print_config {
        print!("{}", generate_default_config());
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    init_logging(&config.logging);

    tracing::info!("Starting channel relay v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        default_channel = %config.server.default_channel,
        outbound_buffer = config.relay.outbound_buffer,
        evict_empty_channels = config.relay.evict_empty_channels,
        "Relay configuration"
    );

    let api_config = ApiConfig::from(&config);
    let state = AppState::new(api_config.clone());

    if let Err(e) = serve(state, &api_config).await {
        tracing::error!(addr = %api_config.addr(), error = %e, "Relay server failed");
        return Err(e.into());
    }

    tracing::info!("Channel relay stopped");
    Ok(())
}

/// Initialize tracing from the logging config
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("channel_relay={},tower_http=info", logging.level))
    });

    let registry = tracing_subscriber::registry().with(filter);

    if logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
