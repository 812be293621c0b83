//! Relay HTTP surface
//!
//! HTTP layer for the relay, built with Axum. Exposes a single endpoint:
//!
//! - `GET /ws?user_id=<n>[&channel_id=<id>]` - WebSocket upgrade
//!
//! A missing or non-numeric `user_id` is rejected with `400 Bad Request`
//! before the upgrade. The path is configurable.
//!
//! # Example
//!
//! ```rust,no_run
//! use channel_relay::api::{serve, ApiConfig, AppState};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ApiConfig::default();
//!     let state = AppState::new(config.clone());
//!     serve(state, &config).await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::{ApiConfig, AppState};

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::relay::relay_handler;

/// Build the router with the upgrade route and middleware
pub fn build_router(state: AppState) -> Router {
    let path = state.config.path.clone();
    let shared_state = Arc::new(state);

    Router::new()
        .route(&path, get(relay_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(shared_state)
}

/// Bind the listener and serve until a shutdown signal arrives.
///
/// Fails if the listening socket cannot be bound.
pub async fn serve(state: AppState, config: &ApiConfig) -> ApiResult<()> {
    let registry = Arc::clone(&state.registry);
    let router = build_router(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Relay listening on {}{}", addr, config.path);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    let stats = registry.stats().await;
    tracing::info!(%stats, "Relay shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use tower::util::ServiceExt;

    fn create_test_app() -> (Router, Arc<crate::relay::ChannelRegistry>) {
        let state = AppState::new(ApiConfig::default());
        let registry = Arc::clone(&state.registry);
        (build_router(state), registry)
    }

    async fn request(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_missing_user_id_rejected() {
        let (app, registry) = create_test_app();

        let (status, body) = request(app, "/ws?channel_id=room-a").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(registry.channel_count().await, 0);
    }

    #[tokio::test]
    async fn test_non_numeric_user_id_rejected() {
        let (app, registry) = create_test_app();

        let (status, body) = request(app, "/ws?user_id=abc&channel_id=room-a").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]["message"].as_str().unwrap().contains("abc"));
        assert_eq!(registry.channel_count().await, 0);
    }

    #[tokio::test]
    async fn test_valid_user_id_without_upgrade_headers() {
        let (app, registry) = create_test_app();

        let (status, body) = request(app, "/ws?user_id=1").await;

        // Identity is accepted; the upgrade extractor is what refuses
        assert!(status.is_client_error());
        assert_ne!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(registry.channel_count().await, 0);
    }

    #[tokio::test]
    async fn test_unknown_path() {
        let (app, _registry) = create_test_app();

        let (status, _) = request(app, "/other?user_id=1").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
