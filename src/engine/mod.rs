//! State engine boundary
//!
//! The engine owns the canonical pet state. Handlers only ever call into it
//! through `PetEngine`, one awaited call per action.

mod memory;

use async_trait::async_trait;

use crate::types::{ActionResult, PetAction, PetState};

pub use memory::{EngineConfig, MemoryEngine};

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("No pet exists yet")]
    NoPet,

    #[error("Engine failure: {0}")]
    Internal(String),
}

#[async_trait]
pub trait PetEngine: Send + Sync {
    /// Current snapshot, or `None` before a pet has been created
    async fn get_state(&self) -> EngineResult<Option<PetState>>;

    async fn feed(&self) -> EngineResult<ActionResult>;

    async fn play(&self) -> EngineResult<ActionResult>;

    async fn sleep(&self) -> EngineResult<ActionResult>;

    async fn pet(&self) -> EngineResult<ActionResult>;

    async fn revive(&self) -> EngineResult<ActionResult>;

    /// Replace the current pet with a new one called `name`
    async fn create(&self, name: &str) -> EngineResult<PetState> {
        Err(EngineError::Internal(format!("creating pet {} is not supported", name)))
    }

    /// Discard the current pet and start a fresh one
    async fn reset(&self) -> EngineResult<PetState> {
        Err(EngineError::Internal("reset is not supported".to_string()))
    }
}

impl PetAction {
    /// Run this action against the engine
    pub async fn perform(self, engine: &dyn PetEngine) -> EngineResult<ActionResult> {
        match self {
            PetAction::Feed => engine.feed().await,
            PetAction::Play => engine.play().await,
            PetAction::Sleep => engine.sleep().await,
            PetAction::Pet => engine.pet().await,
            PetAction::Revive => engine.revive().await,
        }
    }
}
