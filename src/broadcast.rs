use crate::engine::MemoryEngine;
use crate::protocol::{Envelope, ServerMessage, WELCOME_TEXT};
use crate::registry::{ConnectionHandle, ConnectionId, ConnectionRegistry};
use crate::types::{ActionResult, PetAction, PetState};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Tally of one broadcast sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Fans envelopes out to registered connections.
///
/// Delivery failures never propagate: the failing connection is dropped from
/// the registry and the caller carries on.
#[derive(Clone)]
pub struct Broadcaster {
    registry: Arc<ConnectionRegistry>,
}

impl Broadcaster {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub async fn connection_count(&self) -> usize {
        self.registry.count().await
    }

    /// Deliver one envelope to one connection. Returns whether it was queued.
    pub async fn send_to(&self, conn: &ConnectionHandle, message: impl Into<Envelope>) -> bool {
        let envelope = message.into();
        let Some(frame) = encode(&envelope) else {
            return false;
        };

        match conn.send(frame) {
            Ok(()) => true,
            Err(_) => {
                self.registry
                    .observer()
                    .delivery_failed(conn.id(), envelope.message.kind());
                self.registry.deregister(conn.id()).await;
                false
            }
        }
    }

    /// Deliver one envelope to every member present when the sweep starts.
    ///
    /// Failed members are removed after the sweep, never mid-iteration.
    pub async fn broadcast(&self, message: impl Into<Envelope>) -> BroadcastReport {
        let members = self.registry.snapshot().await;
        if members.is_empty() {
            return BroadcastReport::default();
        }

        let envelope = message.into();
        let kind = envelope.message.kind();
        let Some(frame) = encode(&envelope) else {
            return BroadcastReport::default();
        };

        let observer = self.registry.observer();
        let mut delivered = 0;
        let mut failed: Vec<ConnectionId> = Vec::new();
        for conn in &members {
            match conn.send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(_) => {
                    observer.delivery_failed(conn.id(), kind);
                    failed.push(conn.id());
                }
            }
        }

        for id in &failed {
            self.registry.deregister(*id).await;
        }

        observer.broadcast_completed(kind, delivered, failed.len());
        BroadcastReport {
            delivered,
            failed: failed.len(),
        }
    }

    pub async fn broadcast_state_update(&self, state: Option<PetState>) -> BroadcastReport {
        self.broadcast(ServerMessage::StateUpdate { data: state }).await
    }

    pub async fn broadcast_action_result(
        &self,
        action: PetAction,
        result: &ActionResult,
        response: String,
    ) -> BroadcastReport {
        self.broadcast(ServerMessage::ActionResult {
            action: action.to_string(),
            success: result.success,
            message: result.message.clone(),
            stat_changes: result.stat_changes.clone(),
            response,
        })
        .await
    }

    pub async fn broadcast_chat_message(&self, response: String, mood: String) -> BroadcastReport {
        self.broadcast(ServerMessage::ChatMessage { response, mood }).await
    }

    /// Personal greeting for a newly joined connection
    pub async fn send_welcome(&self, conn: &ConnectionHandle, state: Option<PetState>) -> bool {
        self.send_to(
            conn,
            ServerMessage::Welcome {
                message: WELCOME_TEXT.to_string(),
                data: state,
            },
        )
        .await
    }
}

fn encode(envelope: &Envelope) -> Option<String> {
    match serde_json::to_string(envelope) {
        Ok(frame) => Some(frame),
        Err(e) => {
            tracing::error!("Failed to serialize {} envelope: {}", envelope.message.kind(), e);
            None
        }
    }
}

/// Spawn a background task that decays the pet and pushes the new state to all viewers
pub fn spawn_state_ticker(
    engine: Arc<MemoryEngine>,
    broadcaster: Broadcaster,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // The first tick completes immediately
        interval.tick().await;

        loop {
            interval.tick().await;

            let state = engine.tick().await;

            // Nobody watching, nothing to send
            if broadcaster.connection_count().await == 0 {
                continue;
            }

            broadcaster.broadcast_state_update(state).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::ConnectionObserver;
    use serde_json::Value;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingObserver {
        failures: Mutex<Vec<ConnectionId>>,
        sweeps: Mutex<Vec<(String, usize, usize)>>,
    }

    impl ConnectionObserver for RecordingObserver {
        fn connection_registered(&self, _id: ConnectionId, _count: usize) {}

        fn connection_deregistered(&self, _id: ConnectionId, _count: usize) {}

        fn delivery_failed(&self, id: ConnectionId, _kind: &str) {
            self.failures.lock().unwrap().push(id);
        }

        fn broadcast_completed(&self, kind: &str, delivered: usize, failed: usize) {
            self.sweeps
                .lock()
                .unwrap()
                .push((kind.to_string(), delivered, failed));
        }
    }

    fn setup() -> (Broadcaster, Arc<RecordingObserver>) {
        let observer = Arc::new(RecordingObserver::default());
        let registry = Arc::new(ConnectionRegistry::with_observer(observer.clone()));
        (Broadcaster::new(registry), observer)
    }

    fn frame_type(frame: &str) -> String {
        let value: Value = serde_json::from_str(frame).unwrap();
        value["type"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_broadcast_to_empty_registry() {
        let (broadcaster, observer) = setup();

        let report = broadcaster.broadcast(ServerMessage::Pong).await;

        assert_eq!(report, BroadcastReport::default());
        assert!(observer.sweeps.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_broadcast_isolates_failed_connection() {
        let (broadcaster, observer) = setup();
        let registry = broadcaster.registry().clone();

        let (a, mut rx_a) = ConnectionHandle::new();
        let (b, rx_b) = ConnectionHandle::new();
        let (c, mut rx_c) = ConnectionHandle::new();
        registry.register(a).await;
        registry.register(b.clone()).await;
        registry.register(c).await;
        drop(rx_b);

        let report = broadcaster.broadcast_state_update(None).await;

        assert_eq!(report, BroadcastReport { delivered: 2, failed: 1 });
        assert_eq!(registry.count().await, 2);
        assert!(!registry.contains(b.id()).await);
        assert_eq!(*observer.failures.lock().unwrap(), vec![b.id()]);

        for rx in [&mut rx_a, &mut rx_c] {
            let frame = rx.try_recv().unwrap();
            assert_eq!(frame_type(&frame), "state_update");
            assert!(rx.try_recv().is_err());
        }
    }

    #[tokio::test]
    async fn test_broadcast_drops_stalled_connection() {
        let (broadcaster, observer) = setup();
        let registry = broadcaster.registry().clone();

        let (slow, _rx_slow) = ConnectionHandle::with_capacity(1);
        let (fast, mut rx_fast) = ConnectionHandle::new();
        registry.register(slow.clone()).await;
        registry.register(fast).await;

        let first = broadcaster.broadcast(ServerMessage::Pong).await;
        let second = broadcaster.broadcast(ServerMessage::Pong).await;

        assert_eq!(first, BroadcastReport { delivered: 2, failed: 0 });
        assert_eq!(second, BroadcastReport { delivered: 1, failed: 1 });
        assert!(!registry.contains(slow.id()).await);
        assert_eq!(*observer.failures.lock().unwrap(), vec![slow.id()]);
        assert!(rx_fast.try_recv().is_ok());
        assert!(rx_fast.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_send_to_failure_deregisters() {
        let (broadcaster, observer) = setup();
        let registry = broadcaster.registry().clone();
        let (a, rx_a) = ConnectionHandle::new();
        registry.register(a.clone()).await;
        drop(rx_a);

        assert!(!broadcaster.send_to(&a, ServerMessage::Pong).await);
        assert_eq!(registry.count().await, 0);
        assert_eq!(observer.failures.lock().unwrap().len(), 1);

        // A second failure on the same handle is still harmless
        assert!(!broadcaster.send_to(&a, ServerMessage::Pong).await);
        assert_eq!(registry.count().await, 0);
    }

    #[tokio::test]
    async fn test_send_to_is_personal() {
        let (broadcaster, _observer) = setup();
        let registry = broadcaster.registry().clone();
        let (a, mut rx_a) = ConnectionHandle::new();
        let (b, mut rx_b) = ConnectionHandle::new();
        registry.register(a.clone()).await;
        registry.register(b).await;

        assert!(broadcaster.send_welcome(&a, None).await);

        let frame: Value = serde_json::from_str(&rx_a.try_recv().unwrap()).unwrap();
        assert_eq!(frame["type"], "welcome");
        assert_eq!(frame["message"], WELCOME_TEXT);
        assert!(frame["data"].is_null());
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_action_result_envelope_fields() {
        let (broadcaster, _observer) = setup();
        let (a, mut rx_a) = ConnectionHandle::new();
        broadcaster.registry().register(a).await;

        let result = ActionResult {
            success: true,
            message: "Tama ate happily".to_string(),
            stat_changes: [("hunger".to_string(), -25)].into_iter().collect(),
            new_mood: "😊".to_string(),
        };
        broadcaster
            .broadcast_action_result(PetAction::Feed, &result, "nom".to_string())
            .await;

        let frame: Value = serde_json::from_str(&rx_a.try_recv().unwrap()).unwrap();
        assert_eq!(frame["type"], "action_result");
        assert_eq!(frame["action"], "feed");
        assert_eq!(frame["success"], true);
        assert_eq!(frame["message"], "Tama ate happily");
        assert_eq!(frame["stat_changes"]["hunger"], -25);
        assert_eq!(frame["response"], "nom");
    }

    #[tokio::test]
    async fn test_state_ticker_decays_and_broadcasts() {
        let (broadcaster, _observer) = setup();
        let engine = Arc::new(MemoryEngine::with_pet("Tama"));
        let (a, mut rx_a) = ConnectionHandle::new();
        broadcaster.registry().register(a).await;

        let ticker = spawn_state_ticker(engine, broadcaster, Duration::from_millis(10));
        let frame = tokio::time::timeout(Duration::from_secs(2), rx_a.recv())
            .await
            .unwrap()
            .unwrap();
        ticker.abort();

        let frame: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(frame["type"], "state_update");
        assert_eq!(frame["data"]["hunger"], 52);
    }
}
