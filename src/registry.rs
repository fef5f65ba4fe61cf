use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};
use ulid::Ulid;

use crate::observer::{ConnectionObserver, TracingObserver};

/// Identity of one live connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Ulid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Frames a viewer may fall behind by before it counts as failed
pub const OUTBOUND_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    /// The receiving half has gone away
    #[error("connection {0} is closed")]
    Closed(ConnectionId),

    /// The viewer stopped draining its queue
    #[error("connection {0} is not keeping up")]
    Full(ConnectionId),
}

/// Cheap, cloneable handle to one viewer's outbound frame queue.
///
/// The session's writer task owns the receiver; once it stops (socket gone),
/// every `send` on the handle fails. The queue is bounded, so a viewer that
/// stalls without closing also starts failing once it is full.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    tx: mpsc::Sender<String>,
}

impl ConnectionHandle {
    /// Create a handle and the receiver its writer should drain
    pub fn new() -> (Self, mpsc::Receiver<String>) {
        Self::with_capacity(OUTBOUND_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Self {
                id: ConnectionId::new(),
                tx,
            },
            rx,
        )
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a frame without waiting
    pub fn send(&self, frame: String) -> Result<(), SendError> {
        self.tx.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => SendError::Full(self.id),
            TrySendError::Closed(_) => SendError::Closed(self.id),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Set of connections believed to be live.
///
/// Membership is keyed by `ConnectionId`, so a connection appears at most once
/// and removal of an absent connection is a no-op.
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, ConnectionHandle>>,
    observer: Arc<dyn ConnectionObserver>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::with_observer(Arc::new(TracingObserver))
    }

    pub fn with_observer(observer: Arc<dyn ConnectionObserver>) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            observer,
        }
    }

    pub fn observer(&self) -> &Arc<dyn ConnectionObserver> {
        &self.observer
    }

    pub async fn register(&self, handle: ConnectionHandle) {
        let id = handle.id();
        let count = {
            let mut connections = self.connections.write().await;
            connections.insert(id, handle);
            connections.len()
        };
        self.observer.connection_registered(id, count);
    }

    /// Returns whether the connection was present
    pub async fn deregister(&self, id: ConnectionId) -> bool {
        let (removed, count) = {
            let mut connections = self.connections.write().await;
            let removed = connections.remove(&id).is_some();
            (removed, connections.len())
        };
        if removed {
            self.observer.connection_deregistered(id, count);
        }
        removed
    }

    pub async fn count(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.connections.read().await.contains_key(&id)
    }

    /// Copy of the current membership, taken under the read lock
    pub async fn snapshot(&self) -> Vec<ConnectionHandle> {
        self.connections.read().await.values().cloned().collect()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
