use crate::broadcast::Broadcaster;
use crate::engine::PetEngine;
use crate::registry::ConnectionRegistry;
use crate::responder::ResponseGenerator;
use std::sync::Arc;

/// Shared application state handed to every session and HTTP handler
#[derive(Clone)]
pub struct AppState {
    pub broadcaster: Broadcaster,
    pub engine: Arc<dyn PetEngine>,
    pub responder: Arc<dyn ResponseGenerator>,
}

impl AppState {
    pub fn new(engine: Arc<dyn PetEngine>, responder: Arc<dyn ResponseGenerator>) -> Self {
        Self::with_registry(Arc::new(ConnectionRegistry::new()), engine, responder)
    }

    pub fn with_registry(
        registry: Arc<ConnectionRegistry>,
        engine: Arc<dyn PetEngine>,
        responder: Arc<dyn ResponseGenerator>,
    ) -> Self {
        Self {
            broadcaster: Broadcaster::new(registry),
            engine,
            responder,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        self.broadcaster.registry()
    }
}
