//! Connection handles
//!
//! A [`ConnectionHandle`] is the outbound side of one client connection as
//! seen by the channels it belongs to. Frames are queued on a bounded mpsc
//! channel and drained by a single writer task, so concurrent broadcasts
//! never write to the same socket at once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use super::error::SendError;

/// Unique identifier for a connection within this process
pub type ConnectionId = u64;

static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Allocate the next connection id
pub fn next_connection_id() -> ConnectionId {
    CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Cloneable handle used to send frames to a connection and to close it
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    sender: mpsc::Sender<Arc<str>>,
    shutdown: Arc<watch::Sender<bool>>,
}

/// Receiving half of a connection handle, owned by the writer task
#[derive(Debug)]
pub struct OutboundQueue {
    id: ConnectionId,
    receiver: mpsc::Receiver<Arc<str>>,
    shutdown: watch::Receiver<bool>,
}

impl ConnectionHandle {
    /// Create a handle and the queue its writer drains.
    ///
    /// `buffer` is the number of frames that may be queued before
    /// [`send`](Self::send) waits for the writer.
    pub fn new(buffer: usize) -> (Self, OutboundQueue) {
        let id = next_connection_id();
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = Self {
            id,
            sender,
            shutdown: Arc::new(shutdown_tx),
        };
        let queue = OutboundQueue {
            id,
            receiver,
            shutdown: shutdown_rx,
        };
        (handle, queue)
    }

    /// Connection id
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a frame for delivery.
    ///
    /// Waits while the queue is full. Fails once the writer has gone away or
    /// the connection has been closed.
    pub async fn send(&self, frame: Arc<str>) -> Result<(), SendError> {
        if self.is_closed() {
            return Err(SendError::Closed(self.id));
        }

        tokio::select! {
            result = self.sender.send(frame) => {
                result.map_err(|_| SendError::Closed(self.id))
            }
            _ = wait_closed(self.shutdown.subscribe()) => Err(SendError::Closed(self.id)),
        }
    }

    /// Signal the connection to shut down. Idempotent.
    pub fn close(&self) {
        self.shutdown.send_replace(true);
    }

    /// True once [`close`](Self::close) was called or the writer stopped
    pub fn is_closed(&self) -> bool {
        *self.shutdown.borrow() || self.sender.is_closed()
    }

    /// Resolves when the connection is closed
    pub async fn closed(&self) {
        tokio::select! {
            _ = wait_closed(self.shutdown.subscribe()) => {}
            _ = self.sender.closed() => {}
        }
    }
}

impl OutboundQueue {
    /// Connection id this queue belongs to
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Next queued frame, or `None` once the connection is closed
    pub async fn next_frame(&mut self) -> Option<Arc<str>> {
        tokio::select! {
            biased;
            _ = wait_closed(self.shutdown.clone()) => None,
            frame = self.receiver.recv() => frame,
        }
    }
}

async fn wait_closed(mut shutdown: watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
