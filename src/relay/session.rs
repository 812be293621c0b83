//! Connection Sessions
//!
//! Tracks one client connection through its lifecycle:
//!
//! ```text
//! Connecting -> Identified -> Joined -> Active -> Closing -> Closed
//! ```
//!
//! Identification happens before the upgrade; a request without a valid
//! numeric `user_id` never gets past `Connecting` and never touches the
//! registry.

use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use super::channel::Channel;
use super::connection::{ConnectionHandle, ConnectionId};
use super::messages::User;
use super::registry::ChannelRegistry;

/// Channel joined by clients that do not name one
pub const DEFAULT_CHANNEL_ID: &str = "global";

/// Query parameters on the upgrade request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectQuery {
    pub user_id: Option<String>,
    pub channel_id: Option<String>,
}

/// Rejection raised while identifying a connection
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("user_id is required")]
    MissingUserId,

    #[error("user_id must be a non-negative integer, got {0:?}")]
    InvalidUserId(String),
}

/// Lifecycle state of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Identified,
    Joined,
    Active,
    Closing,
    Closed,
}

impl ConnectionState {
    /// Whether `next` directly follows this state
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Connecting, Identified)
                | (Identified, Joined)
                | (Identified, Closing)
                | (Joined, Active)
                | (Joined, Closing)
                | (Active, Closing)
                | (Closing, Closed)
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Identified => "identified",
            ConnectionState::Joined => "joined",
            ConnectionState::Active => "active",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Parse a `user_id` token: ASCII digits only, fitting in a u64
pub fn parse_user_id(raw: Option<&str>) -> Result<u64, IdentityError> {
    let raw = match raw {
        Some(raw) if !raw.is_empty() => raw,
        _ => return Err(IdentityError::MissingUserId),
    };

    if !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(IdentityError::InvalidUserId(raw.to_string()));
    }

    raw.parse()
        .map_err(|_| IdentityError::InvalidUserId(raw.to_string()))
}

/// Channel to join: the requested id, or `default` when absent or empty
pub fn resolve_channel_id(raw: Option<&str>, default: &str) -> String {
    match raw {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => default.to_string(),
    }
}

/// One connection's identity, channel and lifecycle state
#[derive(Debug)]
pub struct Session {
    state: ConnectionState,
    user: User,
    channel_id: String,
    membership: Option<(Arc<Channel>, ConnectionId)>,
}

impl Session {
    /// Validate the upgrade query (`Connecting -> Identified`)
    pub fn identify(query: &ConnectQuery, default_channel: &str) -> Result<Self, IdentityError> {
        let user_id = parse_user_id(query.user_id.as_deref())?;

        let mut session = Self {
            state: ConnectionState::Connecting,
            user: User::new(user_id),
            channel_id: resolve_channel_id(query.channel_id.as_deref(), default_channel),
            membership: None,
        };
        session.transition(ConnectionState::Identified);
        Ok(session)
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Identity bound to this connection
    pub fn user(&self) -> &User {
        &self.user
    }

    /// Channel this connection joins
    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// The joined channel, once `Joined`
    pub fn channel(&self) -> Option<&Arc<Channel>> {
        self.membership.as_ref().map(|(channel, _)| channel)
    }

    /// Subscribe to the channel (`Identified -> Joined`)
    pub async fn join(
        &mut self,
        registry: &ChannelRegistry,
        handle: ConnectionHandle,
    ) -> Arc<Channel> {
        let connection_id = handle.id();
        let channel = registry
            .join(&self.channel_id, handle, self.user.clone())
            .await;

        self.membership = Some((Arc::clone(&channel), connection_id));
        self.transition(ConnectionState::Joined);

        tracing::info!(
            user_id = self.user.id,
            channel_id = %self.channel_id,
            connection_id,
            "Connection joined channel"
        );
        channel
    }

    /// Enter the receive loop (`Joined -> Active`)
    pub fn activate(&mut self) {
        self.transition(ConnectionState::Active);
    }

    /// Leave the channel and finish (`-> Closing -> Closed`). Idempotent.
    pub async fn close(&mut self, registry: &ChannelRegistry) {
        if self.state == ConnectionState::Closed {
            return;
        }
        self.transition(ConnectionState::Closing);

        if let Some((channel, connection_id)) = self.membership.take() {
            registry.leave(&channel, connection_id).await;
            tracing::info!(
                user_id = self.user.id,
                channel_id = %self.channel_id,
                connection_id,
                "Connection closed"
            );
        }

        self.transition(ConnectionState::Closed);
    }

    fn transition(&mut self, next: ConnectionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid transition {} -> {}",
            self.state,
            next
        );
        tracing::trace!(user_id = self.user.id, from = %self.state, to = %next, "Connection state");
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(user_id: Option<&str>, channel_id: Option<&str>) -> ConnectQuery {
        ConnectQuery {
            user_id: user_id.map(str::to_string),
            channel_id: channel_id.map(str::to_string),
        }
    }

    #[test]
    fn test_parse_user_id() {
        assert_eq!(parse_user_id(Some("0")), Ok(0));
        assert_eq!(parse_user_id(Some("42")), Ok(42));
        assert_eq!(parse_user_id(Some("007")), Ok(7));
        assert_eq!(parse_user_id(Some("18446744073709551615")), Ok(u64::MAX));
    }

    #[test]
    fn test_parse_user_id_rejects() {
        assert_eq!(parse_user_id(None), Err(IdentityError::MissingUserId));
        assert_eq!(parse_user_id(Some("")), Err(IdentityError::MissingUserId));

        for bad in ["abc", "-1", "+1", " 1", "1.5", "18446744073709551616"] {
            assert_eq!(
                parse_user_id(Some(bad)),
                Err(IdentityError::InvalidUserId(bad.to_string())),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_resolve_channel_id() {
        assert_eq!(resolve_channel_id(Some("room-a"), DEFAULT_CHANNEL_ID), "room-a");
        assert_eq!(resolve_channel_id(Some(""), DEFAULT_CHANNEL_ID), "global");
        assert_eq!(resolve_channel_id(None, "lobby"), "lobby");
    }

    #[test]
    fn test_transitions() {
        use ConnectionState::*;
        assert!(Connecting.can_transition_to(Identified));
        assert!(Active.can_transition_to(Closing));
        assert!(!Connecting.can_transition_to(Joined));
        assert!(!Closed.can_transition_to(Active));
        assert_eq!(Active.to_string(), "active");
    }

    #[test]
    fn test_identify_derives_name_from_parsed_id() {
        let session = Session::identify(&query(Some("007"), None), DEFAULT_CHANNEL_ID).unwrap();
        assert_eq!(session.state(), ConnectionState::Identified);
        assert_eq!(session.user().id, 7);
        assert_eq!(session.user().name, "user7");
    }

    #[test]
    fn test_identify_invalid_never_joins() {
        let result = Session::identify(&query(Some("abc"), Some("room-a")), DEFAULT_CHANNEL_ID);
        assert!(matches!(result, Err(IdentityError::InvalidUserId(_))));
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let registry = ChannelRegistry::default();
        let mut session = Session::identify(&query(Some("1"), None), DEFAULT_CHANNEL_ID).unwrap();
        assert_eq!(session.state(), ConnectionState::Identified);
        assert_eq!(session.user().name, "user1");
        assert_eq!(session.channel_id(), DEFAULT_CHANNEL_ID);
        assert!(session.channel().is_none());

        let (handle, _queue) = ConnectionHandle::new(4);
        let channel = session.join(&registry, handle.clone()).await;
        assert_eq!(session.state(), ConnectionState::Joined);
        assert!(channel.contains(handle.id()).await);

        session.activate();
        assert_eq!(session.state(), ConnectionState::Active);

        session.close(&registry).await;
        assert_eq!(session.state(), ConnectionState::Closed);
        assert!(!channel.contains(handle.id()).await);

        session.close(&registry).await;
        assert_eq!(session.state(), ConnectionState::Closed);
    }
}
