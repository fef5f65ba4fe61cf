//! HTTP endpoints mirroring the WebSocket operations.
//!
//! Actions and chat go through the same paths as the WebSocket router, so
//! connected viewers see HTTP-triggered changes too.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::state::AppState;
use crate::types::{PetAction, PetState, StatChanges};
use crate::ws::handlers::{self, DispatchError};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Dispatch(e) => {
                tracing::error!("API request failed: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let detail = match self {
            ApiError::Dispatch(_) => handlers::INTERNAL_ERROR.to_string(),
            other => other.to_string(),
        };
        (status, Json(ErrorBody { detail })).into_response()
    }
}

fn no_pet() -> ApiError {
    ApiError::NotFound("No pet found".to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub pet_exists: bool,
    pub llm_available: bool,
    pub websocket_connections: usize,
}

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let pet_exists = matches!(state.engine.get_state().await, Ok(Some(_)));

    Json(HealthResponse {
        status: "healthy".to_string(),
        pet_exists,
        llm_available: state.responder.is_model_backed(),
        websocket_connections: state.broadcaster.connection_count().await,
    })
}

/// GET /api/pet/state
pub async fn get_pet_state(
    State(state): State<Arc<AppState>>,
) -> Result<Json<PetState>, ApiError> {
    let pet = state
        .engine
        .get_state()
        .await
        .map_err(DispatchError::from)?
        .ok_or_else(no_pet)?;
    Ok(Json(pet))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
    pub stat_changes: StatChanges,
    pub pet: Option<PetState>,
    pub response: String,
}

/// POST /api/pet/{action}
pub async fn pet_action(
    State(state): State<Arc<AppState>>,
    Path(action): Path<String>,
) -> Result<Json<ActionResponse>, ApiError> {
    let action: PetAction = action
        .parse()
        .map_err(|e: crate::types::UnknownAction| ApiError::BadRequest(e.to_string()))?;

    let outcome = handlers::perform_action(&state, action).await?;

    Ok(Json(ActionResponse {
        success: outcome.result.success,
        message: outcome.result.message,
        stat_changes: outcome.result.stat_changes,
        pet: outcome.state,
        response: outcome.response,
    }))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TalkRequest {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TalkResponse {
    pub response: String,
    pub mood: String,
    pub timestamp: String,
}

/// POST /api/pet/talk
pub async fn talk(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TalkRequest>,
) -> Result<Json<TalkResponse>, ApiError> {
    if state
        .engine
        .get_state()
        .await
        .map_err(DispatchError::from)?
        .is_none()
    {
        return Err(no_pet());
    }

    let reply = handlers::chat(&state, request.message.as_deref().unwrap_or_default()).await?;

    Ok(Json(TalkResponse {
        response: reply.response,
        mood: reply.mood,
        timestamp: chrono::Utc::now().to_rfc3339(),
    }))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetResponse {
    pub success: bool,
    pub message: String,
    pub pet: PetState,
    pub response: String,
}

/// POST /api/pet/reset
///
/// Starts a fresh pet and pushes the new state to every viewer.
pub async fn reset_pet(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ResetResponse>, ApiError> {
    let pet = state.engine.reset().await.map_err(DispatchError::from)?;
    let response = state
        .responder
        .respond(
            Some(&pet),
            "create",
            None,
            Some("Game has been reset - I'm starting fresh!"),
        )
        .await
        .map_err(DispatchError::from)?;

    state
        .broadcaster
        .broadcast_state_update(Some(pet.clone()))
        .await;

    Ok(Json(ResetResponse {
        success: true,
        message: "Game reset successfully! Starting fresh.".to_string(),
        pet,
        response,
    }))
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRequest {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateResponse {
    pub success: bool,
    pub message: String,
    pub pet: PetState,
    pub response: String,
}

/// POST /api/pet/create
///
/// Replaces the pet with a newly named one and pushes it to every viewer.
pub async fn create_pet(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateRequest>,
) -> Result<Json<CreateResponse>, ApiError> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("Pet name must not be empty".to_string()));
    }

    let pet = state.engine.create(name).await.map_err(DispatchError::from)?;
    let response = state
        .responder
        .respond(
            Some(&pet),
            "create",
            None,
            Some(&format!("I just named you {}", name)),
        )
        .await
        .map_err(DispatchError::from)?;

    state
        .broadcaster
        .broadcast_state_update(Some(pet.clone()))
        .await;

    Ok(Json(CreateResponse {
        success: true,
        message: format!("Created pet: {}", name),
        pet,
        response,
    }))
}

/// Lifetime counters of the current pet; all `None` before one exists
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PetStats {
    pub name: Option<String>,
    pub age_minutes: Option<i64>,
    pub total_interactions: Option<u64>,
    pub deaths: Option<u32>,
    pub is_alive: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStats {
    pub llm_available: bool,
    pub websocket_connections: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub pet_stats: PetStats,
    pub system_stats: SystemStats,
}

/// GET /api/stats
pub async fn stats(State(state): State<Arc<AppState>>) -> Result<Json<StatsResponse>, ApiError> {
    let pet_stats = state
        .engine
        .get_state()
        .await
        .map_err(DispatchError::from)?
        .map(|pet| PetStats {
            name: Some(pet.name),
            age_minutes: Some(pet.age),
            total_interactions: Some(pet.total_interactions),
            deaths: Some(pet.deaths),
            is_alive: Some(pet.is_alive),
        })
        .unwrap_or_default();

    Ok(Json(StatsResponse {
        pet_stats,
        system_stats: SystemStats {
            llm_available: state.responder.is_model_backed(),
            websocket_connections: state.broadcaster.connection_count().await,
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MemoryEngine;
    use crate::registry::ConnectionHandle;
    use crate::responder::LlmResponder;

    fn test_state(engine: MemoryEngine) -> Arc<AppState> {
        Arc::new(AppState::new(
            Arc::new(engine),
            Arc::new(LlmResponder::offline()),
        ))
    }

    #[tokio::test]
    async fn test_health_counts_connections() {
        let state = test_state(MemoryEngine::with_pet("Tama"));
        let (conn, _rx) = ConnectionHandle::new();
        state.registry().register(conn).await;

        let Json(health) = health(State(state)).await;

        assert!(health.pet_exists);
        assert!(!health.llm_available);
        assert_eq!(health.websocket_connections, 1);
    }

    #[tokio::test]
    async fn test_state_not_found() {
        let state = test_state(MemoryEngine::default());
        let err = get_pet_state(State(state)).await.unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_action_is_bad_request() {
        let state = test_state(MemoryEngine::with_pet("Tama"));
        let err = pet_action(State(state), Path("fly".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_action_broadcasts_to_viewers() {
        let state = test_state(MemoryEngine::with_pet("Tama"));
        let (conn, mut rx) = ConnectionHandle::new();
        state.registry().register(conn).await;

        let Json(body) = pet_action(State(state), Path("pet".to_string()))
            .await
            .unwrap();

        assert!(body.success);
        assert_eq!(body.stat_changes["happiness"], 10);
        assert!(rx.try_recv().unwrap().contains("\"action_result\""));
        assert!(rx.try_recv().unwrap().contains("\"state_update\""));
    }

    #[tokio::test]
    async fn test_reset_returns_fresh_pet() {
        let state = test_state(MemoryEngine::with_pet("Mochi"));

        let Json(body) = reset_pet(State(state)).await.unwrap();

        assert!(body.success);
        assert_eq!(body.pet.name, "Mochi");
        assert_eq!(body.pet.total_interactions, 0);
    }

    #[tokio::test]
    async fn test_create_names_pet_and_broadcasts() {
        let state = test_state(MemoryEngine::with_pet("Tama"));
        let (conn, mut rx) = ConnectionHandle::new();
        state.registry().register(conn).await;

        let Json(body) = create_pet(
            State(state.clone()),
            Json(CreateRequest {
                name: " Mochi ".to_string(),
            }),
        )
        .await
        .unwrap();

        assert!(body.success);
        assert_eq!(body.message, "Created pet: Mochi");
        assert_eq!(body.pet.name, "Mochi");
        assert!(!body.response.is_empty());
        assert_eq!(
            state.engine.get_state().await.unwrap().map(|p| p.name),
            Some("Mochi".to_string())
        );

        let frame = rx.try_recv().unwrap();
        assert!(frame.contains("\"state_update\""));
        assert!(frame.contains("\"Mochi\""));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_create_rejects_blank_name() {
        let state = test_state(MemoryEngine::default());
        let err = create_pet(
            State(state.clone()),
            Json(CreateRequest {
                name: "   ".to_string(),
            }),
        )
        .await
        .unwrap_err();

        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
        assert!(state.engine.get_state().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stats_reports_pet_counters() {
        let state = test_state(MemoryEngine::with_pet("Tama"));
        state.engine.pet().await.unwrap();
        state.engine.feed().await.unwrap();

        let Json(body) = stats(State(state)).await.unwrap();

        assert_eq!(body.pet_stats.name.as_deref(), Some("Tama"));
        assert_eq!(body.pet_stats.total_interactions, Some(2));
        assert_eq!(body.pet_stats.deaths, Some(0));
        assert_eq!(body.pet_stats.is_alive, Some(true));
        assert!(!body.system_stats.llm_available);
        assert_eq!(body.system_stats.websocket_connections, 0);
    }

    #[tokio::test]
    async fn test_stats_without_pet() {
        let state = test_state(MemoryEngine::default());

        let Json(body) = stats(State(state)).await.unwrap();

        assert!(body.pet_stats.name.is_none());
        assert!(body.pet_stats.age_minutes.is_none());
        assert!(body.pet_stats.is_alive.is_none());
    }
}
