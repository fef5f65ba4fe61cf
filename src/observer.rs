//! Observability hook for connection lifecycle and delivery events.
//!
//! The registry and broadcaster report through this trait instead of logging
//! directly, so hosts can count failures or export metrics.

use crate::registry::ConnectionId;

pub trait ConnectionObserver: Send + Sync {
    /// A connection joined; `count` is the membership size afterwards
    fn connection_registered(&self, id: ConnectionId, count: usize);

    /// A connection left; `count` is the membership size afterwards
    fn connection_deregistered(&self, id: ConnectionId, count: usize);

    /// Delivering one envelope to one connection failed
    fn delivery_failed(&self, id: ConnectionId, kind: &str);

    /// A broadcast sweep finished
    fn broadcast_completed(&self, kind: &str, delivered: usize, failed: usize) {
        let _ = (kind, delivered, failed);
    }
}

/// Default observer that writes structured `tracing` events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ConnectionObserver for TracingObserver {
    fn connection_registered(&self, id: ConnectionId, count: usize) {
        tracing::info!(connection = %id, count, "WebSocket connected");
    }

    fn connection_deregistered(&self, id: ConnectionId, count: usize) {
        tracing::info!(connection = %id, count, "WebSocket disconnected");
    }

    fn delivery_failed(&self, id: ConnectionId, kind: &str) {
        tracing::warn!(connection = %id, kind, "Failed to deliver envelope, dropping connection");
    }

    fn broadcast_completed(&self, kind: &str, delivered: usize, failed: usize) {
        tracing::debug!(kind, delivered, failed, "Broadcast complete");
    }
}
