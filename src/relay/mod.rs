//! Channel Relay
//!
//! Realtime fan-out of short text messages between clients that share a
//! channel.
//!
//! ## Architecture
//!
//! - **ChannelRegistry**: Maps channel ids to channels, creating each exactly once
//! - **Channel**: Owns one channel's subscribers and broadcasts to them
//! - **ConnectionHandle**: Serialized outbound path of a single connection
//! - **Session**: Lifecycle of one connection from identification to close
//! - **Handler**: WebSocket upgrade and per-connection loops
//! - **Messages**: The `{user_id, user_name, content}` wire record
//!
//! ## Usage
//!
//! Clients connect to `/ws?user_id=<n>` and optionally `&channel_id=<id>`.
//! Every text frame they send is broadcast to all subscribers of the channel,
//! including the sender.
//!
//! ```javascript
//! // Browser
//! const ws = new WebSocket('ws://localhost:8000/ws?user_id=1&channel_id=room-a');
//!
//! ws.onopen = () => ws.send('hello');
//!
//! ws.onmessage = (event) => {
//!   const msg = JSON.parse(event.data);
//!   console.log(`${msg.user_name}: ${msg.content}`);
//! };
//! ```

mod channel;
mod connection;
mod error;
mod handler;
mod messages;
mod registry;
mod session;

pub use channel::{BroadcastReport, Channel, Subscriber};
pub use connection::{next_connection_id, ConnectionHandle, ConnectionId, OutboundQueue};
pub use error::{RelayError, RelayResult, SendError};
pub use handler::{relay_handler, ConnectRequest};
pub use messages::{display_name, RelayMessage, User};
pub use registry::{ChannelRegistry, RegistryConfig, RegistryStats};
pub use session::{
    parse_user_id, resolve_channel_id, ConnectQuery, ConnectionState, IdentityError, Session,
    DEFAULT_CHANNEL_ID,
};
