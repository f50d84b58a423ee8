//! Connection registry.
//!
//! The registry is the only authority on which connections receive fan-out.
//! Writers swap in a new map (copy-on-write); readers clone the current `Arc`,
//! so a snapshot taken for one broadcast never changes under it while
//! connections come and go.

use crate::domain::ConnectionId;
use crate::error::SendFailure;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

/// A serialised frame, shared by every connection it is sent to.
pub type Frame = Arc<str>;

/// Outbound side of one viewer connection.
pub trait FrameSink: Send + Sync {
    /// Whether frames can still be handed to this connection.
    fn is_open(&self) -> bool;

    /// Hand a frame over without waiting.
    fn try_send(&self, frame: Frame) -> Result<(), SendFailure>;

    /// Ask the connection to close. Idempotent.
    fn close(&self);
}

/// Immutable view of the registered connections.
pub type ConnectionSnapshot = Arc<HashMap<ConnectionId, Arc<dyn FrameSink>>>;

/// Live viewer connections.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: RwLock<ConnectionSnapshot>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection whose handshake completed.
    pub fn register(&self, sink: Arc<dyn FrameSink>) -> ConnectionId {
        let id = ConnectionId::new();
        let mut guard = self.connections.write();
        let mut next = HashMap::clone(&guard);
        next.insert(id, sink);
        *guard = Arc::new(next);
        let total = guard.len();
        drop(guard);

        info!(connection_id = %id, total, "Viewer connected");
        id
    }

    /// Remove a connection and close its sink.
    ///
    /// Returns `false` if it was already gone; unregistering twice is harmless.
    pub fn unregister(&self, id: ConnectionId) -> bool {
        let removed = {
            let mut guard = self.connections.write();
            if !guard.contains_key(&id) {
                return false;
            }
            let mut next = HashMap::clone(&guard);
            let removed = next.remove(&id);
            *guard = Arc::new(next);
            removed
        };

        match removed {
            Some(sink) => {
                sink.close();
                info!(connection_id = %id, total = self.len(), "Viewer disconnected");
                true
            }
            None => false,
        }
    }

    /// Snapshot of the live set.
    pub fn active_connections(&self) -> ConnectionSnapshot {
        Arc::clone(&self.connections.read())
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.read().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Close every connection and empty the registry. Returns how many were
    /// closed.
    pub fn close_all(&self) -> usize {
        let previous = std::mem::take(&mut *self.connections.write());
        for (id, sink) in previous.iter() {
            debug!(connection_id = %id, "Closing viewer connection");
            sink.close();
        }
        if !previous.is_empty() {
            info!(closed = previous.len(), "Closed all viewer connections");
        }
        previous.len()
    }
}

/// [`FrameSink`] backed by a bounded channel drained by a writer task.
pub struct ChannelSink {
    frames: mpsc::Sender<Frame>,
    close: Mutex<Option<oneshot::Sender<()>>>,
}

/// Receiving half handed to the writer task.
pub struct SinkReceiver {
    pub frames: mpsc::Receiver<Frame>,
    /// Resolves when the sink is closed (or dropped).
    pub closed: oneshot::Receiver<()>,
}

impl ChannelSink {
    /// Create a sink queuing at most `capacity` frames.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero; `RelayConfig::validate` rejects that.
    pub fn channel(capacity: usize) -> (Self, SinkReceiver) {
        let (frames_tx, frames_rx) = mpsc::channel(capacity);
        let (close_tx, close_rx) = oneshot::channel();
        (
            Self {
                frames: frames_tx,
                close: Mutex::new(Some(close_tx)),
            },
            SinkReceiver {
                frames: frames_rx,
                closed: close_rx,
            },
        )
    }
}

impl FrameSink for ChannelSink {
    fn is_open(&self) -> bool {
        self.close.lock().is_some() && !self.frames.is_closed()
    }

    fn try_send(&self, frame: Frame) -> Result<(), SendFailure> {
        if self.close.lock().is_none() {
            return Err(SendFailure::Closed);
        }
        self.frames.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendFailure::Full,
            mpsc::error::TrySendError::Closed(_) => SendFailure::Closed,
        })
    }

    fn close(&self) {
        if let Some(tx) = self.close.lock().take() {
            let _ = tx.send(());
        }
    }
}
