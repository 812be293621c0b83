//! Relay Connection Handler
//!
//! Validates the upgrade request, joins the requested channel and runs the
//! per-connection loops: a writer task draining the connection's outbound
//! queue, and a receive loop turning every inbound frame into one broadcast.

use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        FromRequestParts, Query, State,
    },
    http::request::Parts,
    response::Response,
};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;

use super::channel::Channel;
use super::connection::{ConnectionHandle, OutboundQueue};
use super::messages::{RelayMessage, User};
use super::registry::ChannelRegistry;
use super::session::{ConnectQuery, Session};
use crate::api::{ApiError, AppState};

/// How long the writer may take to flush a close frame before it is aborted
const WRITER_CLOSE_GRACE: Duration = Duration::from_secs(1);

/// An identified connection request, extracted before the upgrade
#[derive(Debug)]
pub struct ConnectRequest(pub Session);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for ConnectRequest {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Query(query) = Query::<ConnectQuery>::try_from_uri(&parts.uri)
            .map_err(|e| ApiError::Validation(e.body_text()))?;

        match Session::identify(&query, &state.config.default_channel) {
            Ok(session) => Ok(Self(session)),
            Err(e) => {
                tracing::warn!(error = %e, "Rejected connection request");
                Err(ApiError::Validation(e.to_string()))
            }
        }
    }
}

/// Relay upgrade handler
///
/// Rejects requests without a valid `user_id` with 400 before upgrading.
pub async fn relay_handler(
    ConnectRequest(session): ConnectRequest,
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    let registry = Arc::clone(&state.registry);
    let buffer = state.config.outbound_buffer;

    ws.on_failed_upgrade(|error: axum::Error| {
        tracing::warn!(error = %error, "WebSocket upgrade failed");
    })
    .on_upgrade(move |socket| handle_socket(socket, session, registry, buffer))
}

/// Drive an upgraded connection until it closes
async fn handle_socket(
    socket: WebSocket,
    mut session: Session,
    registry: Arc<ChannelRegistry>,
    buffer: usize,
) {
    let (sender, receiver) = socket.split();
    let (handle, queue) = ConnectionHandle::new(buffer);

    let channel = session.join(&registry, handle.clone()).await;
    let mut send_task = tokio::spawn(write_frames(sender, queue));

    session.activate();
    read_frames(receiver, &handle, session.user(), &channel).await;

    session.close(&registry).await;
    handle.close();

    if tokio::time::timeout(WRITER_CLOSE_GRACE, &mut send_task)
        .await
        .is_err()
    {
        send_task.abort();
    }
}

/// Forward queued frames to the socket until the connection closes
async fn write_frames<S>(mut sink: S, mut queue: OutboundQueue)
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    while let Some(frame) = queue.next_frame().await {
        if let Err(e) = sink.send(Message::Text(frame.to_string())).await {
            tracing::debug!(
                connection_id = queue.id(),
                error = %e,
                "WebSocket send failed, closing connection"
            );
            return;
        }
    }

    let _ = sink.send(Message::Close(None)).await;
    let _ = sink.close().await;
}

/// Broadcast every inbound frame until the peer goes away or the connection
/// is closed by a failed send
async fn read_frames<R, E>(
    mut receiver: R,
    handle: &ConnectionHandle,
    user: &User,
    channel: &Channel,
) where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: std::fmt::Display,
{
    loop {
        let next = tokio::select! {
            next = receiver.next() => next,
            _ = handle.closed() => {
                tracing::debug!(connection_id = handle.id(), "Connection closed by relay");
                return;
            }
        };

        let content = match next {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Binary(bytes))) => String::from_utf8_lossy(&bytes).into_owned(),
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
            Some(Ok(Message::Close(_))) => {
                tracing::debug!(connection_id = handle.id(), "Client requested close");
                return;
            }
            Some(Err(e)) => {
                tracing::warn!(
                    connection_id = handle.id(),
                    error = %e,
                    "WebSocket receive error"
                );
                return;
            }
            None => return,
        };

        let message = RelayMessage::from_user(user, content);
        // Encoding failures are logged by the channel and only cost this message
        let _ = channel.broadcast(&message, false).await;
    }
}
