//! Relay error types
//!
//! Errors raised by the channel registry, broadcast engine and codec.
//! None of these are fatal to the process: each one is confined to a single
//! broadcast attempt or a single connection.

use thiserror::Error;

/// Errors that can occur while relaying messages
#[derive(Error, Debug)]
pub enum RelayError {
    /// Message could not be serialized; the broadcast is abandoned
    #[error("Encoding error: {0}")]
    Encoding(#[source] serde_json::Error),

    /// Outbound record could not be parsed
    #[error("Decoding error: {0}")]
    Decoding(#[source] serde_json::Error),
}

/// Failure to hand a frame to a connection's writer
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// The connection's writer has stopped
    #[error("connection {0} is closed")]
    Closed(u64),
}

/// Result type for relay operations
pub type RelayResult<T> = Result<T, RelayError>;
