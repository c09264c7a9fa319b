use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use validator::Validate;

use crate::{
    models::UpdateSelectionRequest,
    services::{selection_service::SelectionService, AppState},
};

pub async fn get_selection(
    State(state): State<Arc<AppState>>,
    Path(owner_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let service = SelectionService::new(&state);

    match service.get(&owner_id).await {
        Ok(Some(selection)) => Ok((StatusCode::OK, Json(selection))),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            "No session selection stored".to_string(),
        )),
        Err(e) => {
            tracing::error!("Failed to load session selection for {}: {:#}", owner_id, e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

pub async fn put_selection(
    State(state): State<Arc<AppState>>,
    Path(owner_id): Path<String>,
    Json(req): Json<UpdateSelectionRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    req.validate()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let service = SelectionService::new(&state);

    match service.update(&owner_id, req.into()).await {
        Ok(selection) => Ok((StatusCode::OK, Json(selection))),
        Err(e) => {
            tracing::error!("Failed to save session selection for {}: {:#}", owner_id, e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

pub async fn clear_selection(
    State(state): State<Arc<AppState>>,
    Path(owner_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let service = SelectionService::new(&state);

    match service.clear(&owner_id).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(e) => {
            tracing::error!("Failed to clear session selection for {}: {:#}", owner_id, e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}
