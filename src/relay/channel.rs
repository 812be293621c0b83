//! Channel
//!
//! A channel owns the subscriber set for one channel id and fans messages
//! out to every subscriber.
//!
//! The subscriber map is only locked to mutate it or to take a snapshot.
//! Sends happen after the lock is released, so a slow peer never holds up
//! joins, leaves or broadcasts elsewhere. A subscriber whose send fails is
//! closed and removed; delivery to the rest continues.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::connection::{ConnectionHandle, ConnectionId};
use super::error::RelayResult;
use super::messages::{RelayMessage, User};

/// A connection handle paired with the user bound to it
#[derive(Debug, Clone)]
pub struct Subscriber {
    pub handle: ConnectionHandle,
    pub user: User,
}

/// Outcome of a single broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Subscribers the frame was handed to
    pub delivered: usize,
    /// Subscribers excluded because they share the sender's user id
    pub skipped: usize,
    /// Subscribers removed after a failed send
    pub dropped: usize,
}

impl fmt::Display for BroadcastReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "delivered={} skipped={} dropped={}",
            self.delivered, self.skipped, self.dropped
        )
    }
}

/// A named group of subscribers
#[derive(Debug)]
pub struct Channel {
    id: String,
    subscribers: RwLock<HashMap<ConnectionId, Subscriber>>,
}

impl Channel {
    /// Create an empty channel
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            subscribers: RwLock::new(HashMap::new()),
        }
    }

    /// Channel id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Add a subscriber. Re-joining with the same handle replaces the user.
    pub async fn join(&self, handle: ConnectionHandle, user: User) {
        let connection_id = handle.id();
        self.subscribers
            .write()
            .await
            .insert(connection_id, Subscriber { handle, user });
    }

    /// Remove a subscriber. Returns false if it was not a member.
    pub async fn leave(&self, connection_id: ConnectionId) -> bool {
        self.subscribers
            .write()
            .await
            .remove(&connection_id)
            .is_some()
    }

    /// Deliver `message` to every current subscriber.
    ///
    /// The message is encoded once up front; an encoding failure aborts the
    /// broadcast before anything is sent. With `exclude_sender` set, every
    /// subscriber whose user id matches the sender is skipped, including the
    /// sender's other connections.
    pub async fn broadcast(
        &self,
        message: &RelayMessage,
        exclude_sender: bool,
    ) -> RelayResult<BroadcastReport> {
        let frame: Arc<str> = match message.encode() {
            Ok(text) => Arc::from(text),
            Err(e) => {
                tracing::error!(channel_id = %self.id, error = %e, "Failed to encode message");
                return Err(e);
            }
        };

        let mut report = BroadcastReport::default();

        let targets: Vec<Subscriber> = {
            let subscribers = self.subscribers.read().await;
            subscribers
                .values()
                .filter(|sub| {
                    let excluded = exclude_sender && sub.user.id == message.user_id;
                    if excluded {
                        report.skipped += 1;
                    }
                    !excluded
                })
                .cloned()
                .collect()
        };

        for sub in targets {
            match sub.handle.send(Arc::clone(&frame)).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    tracing::warn!(
                        channel_id = %self.id,
                        connection_id = sub.handle.id(),
                        user_id = sub.user.id,
                        error = %e,
                        "Dropping subscriber after failed send"
                    );
                    sub.handle.close();
                    self.leave(sub.handle.id()).await;
                    report.dropped += 1;
                }
            }
        }

        tracing::debug!(channel_id = %self.id, %report, "Broadcast message");
        Ok(report)
    }

    /// Number of current subscribers
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// True if nobody is subscribed
    pub async fn is_empty(&self) -> bool {
        self.subscribers.read().await.is_empty()
    }

    /// True if the connection is subscribed
    pub async fn contains(&self, connection_id: ConnectionId) -> bool {
        self.subscribers.read().await.contains_key(&connection_id)
    }
}
