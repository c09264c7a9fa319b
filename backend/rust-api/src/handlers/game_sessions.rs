use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use validator::Validate;

use crate::{
    engine::EngineError,
    models::{
        AnswerRequest, AttemptResponse, CreateGameSessionRequest, MarkRequest, OrderingRequest,
        ResolveSpinResponse, SaveRequest, SaveRetryRequest, SpinResponse,
    },
    services::{
        game_session_service::{GameSessionError, GameSessionService},
        AppState,
    },
};

fn status_for(error: &GameSessionError) -> StatusCode {
    match error {
        GameSessionError::NotFound(_) => StatusCode::NOT_FOUND,
        GameSessionError::ContentFetch(_) => StatusCode::BAD_GATEWAY,
        GameSessionError::SaveInterrupted(_) => StatusCode::INTERNAL_SERVER_ERROR,
        GameSessionError::Engine(engine) => match engine {
            EngineError::UnknownParticipant(_) | EngineError::UnknownItem(_) => {
                StatusCode::NOT_FOUND
            }
            EngineError::NoParticipants | EngineError::ContentUnavailable => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            EngineError::WrongInteraction { .. } => StatusCode::BAD_REQUEST,
            e if e.is_conflict() => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

fn into_error(action: &str, error: GameSessionError) -> (StatusCode, String) {
    let status = status_for(&error);
    if status.is_server_error() {
        tracing::error!("Failed to {}: {}", action, error);
    } else {
        tracing::warn!("Refused to {}: {}", action, error);
    }
    (status, error.to_string())
}

pub async fn create_game_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateGameSessionRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    req.validate()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    tracing::info!(
        "Creating {} game session for therapy session {} with {} participants",
        req.game.as_str(),
        req.session_id,
        req.participants.len()
    );

    let service = GameSessionService::new(&state);
    let view = service
        .create(req)
        .await
        .map_err(|e| into_error("create game session", e))?;

    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get_game_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let service = GameSessionService::new(&state);
    let view = service
        .view(&id)
        .await
        .map_err(|e| into_error("get game session", e))?;
    Ok((StatusCode::OK, Json(view)))
}

pub async fn submit_ordering(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<OrderingRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let service = GameSessionService::new(&state);
    let (feedback, session) = service
        .submit_ordering(&id, &req.slots)
        .await
        .map_err(|e| into_error("submit ordering", e))?;
    Ok((StatusCode::OK, Json(AttemptResponse { feedback, session })))
}

pub async fn submit_answer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<AnswerRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    req.validate()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let service = GameSessionService::new(&state);
    let (feedback, session) = service
        .submit_answer(&id, &req.answer)
        .await
        .map_err(|e| into_error("submit answer", e))?;
    Ok((StatusCode::OK, Json(AttemptResponse { feedback, session })))
}

pub async fn mark_response(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<MarkRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let service = GameSessionService::new(&state);
    let (feedback, session) = service
        .mark(&id, req.correct)
        .await
        .map_err(|e| into_error("mark response", e))?;
    Ok((StatusCode::OK, Json(AttemptResponse { feedback, session })))
}

pub async fn spin(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let service = GameSessionService::new(&state);
    let (outcome, session) = service
        .spin(&id)
        .await
        .map_err(|e| into_error("spin", e))?;
    Ok((StatusCode::OK, Json(SpinResponse { outcome, session })))
}

pub async fn resolve_spin(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let service = GameSessionService::new(&state);
    let (resolution, session) = service
        .resolve_spin(&id)
        .await
        .map_err(|e| into_error("resolve spin", e))?;
    Ok((
        StatusCode::OK,
        Json(ResolveSpinResponse {
            resolution,
            session,
        }),
    ))
}

pub async fn save_results(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Option<Json<SaveRequest>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let service = GameSessionService::new(&state);
    let response = service
        .save(&id, req.mode, None)
        .await
        .map_err(|e| into_error("save results", e))?;
    Ok((StatusCode::OK, Json(response)))
}

pub async fn retry_save(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Option<Json<SaveRetryRequest>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let service = GameSessionService::new(&state);
    let response = service
        .retry_save(&id, req.participant_ids, req.mode)
        .await
        .map_err(|e| into_error("retry save", e))?;
    Ok((StatusCode::OK, Json(response)))
}

pub async fn replay(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let service = GameSessionService::new(&state);
    let view = service
        .replay(&id)
        .await
        .map_err(|e| into_error("replay game session", e))?;
    Ok((StatusCode::OK, Json(view)))
}

pub async fn reset(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let service = GameSessionService::new(&state);
    let view = service
        .reset(&id)
        .await
        .map_err(|e| into_error("reset game session", e))?;
    Ok((StatusCode::OK, Json(view)))
}

pub async fn abandon(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let service = GameSessionService::new(&state);
    let response = service
        .abandon(&id)
        .await
        .map_err(|e| into_error("abandon game session", e))?;
    Ok((StatusCode::OK, Json(response)))
}
