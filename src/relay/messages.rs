//! Relay Message Types
//!
//! Defines the wire record fanned out to channel subscribers.
//!
//! Inbound frames from a client are not structured: the whole frame becomes
//! the `content` of a [`RelayMessage`]. Only outbound frames carry the
//! three-field JSON shape:
//!
//! ```json
//! { "user_id": 1, "user_name": "user1", "content": "hello" }
//! ```

use serde::{Deserialize, Serialize};

use super::error::RelayError;

/// Identity bound to a connection once its `user_id` has been validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Numeric identity supplied by the client
    pub id: u64,
    /// Display name derived from the id
    pub name: String,
}

impl User {
    /// Create a user, deriving the display name from the id
    pub fn new(id: u64) -> Self {
        Self {
            id,
            name: display_name(id),
        }
    }
}

/// Display name for a user id (`"user"` followed by the decimal id).
///
/// Built from the parsed id, not the raw query token, so `007` names `user7`.
pub fn display_name(id: u64) -> String {
    format!("user{}", id)
}

/// A message broadcast to every subscriber of a channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayMessage {
    /// Sender's user id
    pub user_id: u64,
    /// Sender's display name
    pub user_name: String,
    /// Opaque message text
    pub content: String,
}

impl RelayMessage {
    /// Wrap a raw inbound payload as a message from `user`
    pub fn from_user(user: &User, content: impl Into<String>) -> Self {
        Self {
            user_id: user.id,
            user_name: user.name.clone(),
            content: content.into(),
        }
    }

    /// Serialize to the canonical outbound JSON record
    pub fn encode(&self) -> Result<String, RelayError> {
        serde_json::to_string(self).map_err(RelayError::Encoding)
    }

    /// Parse an outbound JSON record
    pub fn decode(text: &str) -> Result<Self, RelayError> {
        serde_json::from_str(text).map_err(RelayError::Decoding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_display_name() {
        let user = User::new(42);
        assert_eq!(user.id, 42);
        assert_eq!(user.name, "user42");
    }

    #[test]
    fn test_encode_exact_shape() {
        let msg = RelayMessage::from_user(&User::new(1), "hello");
        let json = msg.encode().unwrap();
        assert_eq!(json, r#"{"user_id":1,"user_name":"user1","content":"hello"}"#);
    }

    #[test]
    fn test_decode_encoded_message() {
        let msg = RelayMessage {
            user_id: u64::MAX,
            user_name: "user18446744073709551615".to_string(),
            content: "quotes \" and\nnewlines and unicode \u{1F600}".to_string(),
        };
        let decoded = RelayMessage::decode(&msg.encode().unwrap()).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_content_is_opaque() {
        // Content that looks like a message must stay a plain string
        let raw = r#"{"user_id":9,"user_name":"x","content":"y"}"#;
        let msg = RelayMessage::from_user(&User::new(3), raw);
        let value: serde_json::Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();
        assert_eq!(value["user_id"], 3);
        assert_eq!(value["content"], raw);
    }

    #[test]
    fn test_decode_rejects_wrong_shape() {
        assert!(matches!(
            RelayMessage::decode(r#"{"user_id":-1,"user_name":"a","content":"b"}"#),
            Err(RelayError::Decoding(_))
        ));
        assert!(RelayMessage::decode("not json").is_err());
    }
}
