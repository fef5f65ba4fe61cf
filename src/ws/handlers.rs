//! WebSocket message dispatch
//!
//! Parses one inbound frame and routes it. Queries, heartbeats and malformed
//! input are answered to the sender only; anything that changes or narrates
//! the shared pet goes out to every connection.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;

use crate::engine::EngineError;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::registry::ConnectionHandle;
use crate::responder::{ResponderError, TALK};
use crate::state::AppState;
use crate::types::{ActionResult, PetAction, PetState, NEUTRAL_MOOD};

/// Message sent to the client when a collaborator fails mid-dispatch
pub const INTERNAL_ERROR: &str = "Internal server error";

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Responder(#[from] ResponderError),
}

/// Everything produced by one action
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    pub result: ActionResult,
    pub state: Option<PetState>,
    pub response: String,
}

/// Narrative and mood broadcast for one chat turn
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub response: String,
    pub mood: String,
}

/// Handle one raw frame from `conn`. Never fails; every error ends as an envelope.
pub async fn dispatch(state: &AppState, conn: &ConnectionHandle, raw: &str) {
    let message = match ClientMessage::parse(raw) {
        Ok(message) => message,
        Err(e) if e.is_shared() => {
            tracing::info!("Rejected client message: {}", e);
            state
                .broadcaster
                .broadcast(ServerMessage::error(e.to_string()))
                .await;
            return;
        }
        Err(e) => {
            tracing::info!("Rejected client message: {}", e);
            state
                .broadcaster
                .send_to(conn, ServerMessage::error(e.to_string()))
                .await;
            return;
        }
    };

    let outcome = AssertUnwindSafe(handle_message(state, conn, message))
        .catch_unwind()
        .await;

    let failed = match outcome {
        Ok(Ok(())) => false,
        Ok(Err(e)) => {
            tracing::error!("Error handling client message: {}", e);
            true
        }
        Err(_) => {
            tracing::error!("Client message handler panicked");
            true
        }
    };

    if failed {
        state
            .broadcaster
            .send_to(conn, ServerMessage::error(INTERNAL_ERROR))
            .await;
    }
}

/// Route a validated message
pub async fn handle_message(
    state: &AppState,
    conn: &ConnectionHandle,
    message: ClientMessage,
) -> Result<(), DispatchError> {
    match message {
        ClientMessage::Ping => {
            state.broadcaster.send_to(conn, ServerMessage::Pong).await;
        }

        ClientMessage::GetState => {
            let data = state.engine.get_state().await?;
            state
                .broadcaster
                .send_to(conn, ServerMessage::StateUpdate { data })
                .await;
        }

        ClientMessage::Action(action) => {
            perform_action(state, action).await?;
        }

        ClientMessage::Chat { message } => {
            chat(state, &message).await?;
        }
    }

    Ok(())
}

/// Run an action, then broadcast its result followed by the new state
pub async fn perform_action(
    state: &AppState,
    action: PetAction,
) -> Result<ActionOutcome, DispatchError> {
    tracing::info!("Action requested: {}", action);

    let result = action.perform(state.engine.as_ref()).await?;
    let snapshot = state.engine.get_state().await?;
    let response = state
        .responder
        .respond(snapshot.as_ref(), action.as_str(), Some(&result), None)
        .await?;

    // Result first: viewers must never see the new state without its explanation
    state
        .broadcaster
        .broadcast_action_result(action, &result, response.clone())
        .await;
    state
        .broadcaster
        .broadcast_state_update(snapshot.clone())
        .await;

    Ok(ActionOutcome {
        result,
        state: snapshot,
        response,
    })
}

/// Generate the pet's reply to `message` and broadcast it
pub async fn chat(state: &AppState, message: &str) -> Result<ChatReply, DispatchError> {
    let snapshot = state.engine.get_state().await?;
    let response = state
        .responder
        .respond(snapshot.as_ref(), TALK, None, Some(message))
        .await?;
    let mood = snapshot
        .map(|pet| pet.current_mood)
        .unwrap_or_else(|| NEUTRAL_MOOD.to_string());

    state
        .broadcaster
        .broadcast_chat_message(response.clone(), mood.clone())
        .await;

    Ok(ChatReply { response, mood })
}
