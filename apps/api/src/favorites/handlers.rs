//! Axum route handlers for favorites.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::favorites::service;
use crate::models::Favorite;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddFavoriteRequest {
    pub item: String,
}

/// POST /api/v1/consumers/:id/favorites
pub async fn handle_add_favorite(
    State(state): State<AppState>,
    Path(consumer_id): Path<Uuid>,
    Json(request): Json<AddFavoriteRequest>,
) -> Result<(StatusCode, Json<Favorite>), AppError> {
    let favorite = service::add_favorite(
        state.store.as_ref(),
        &state.categorizer,
        consumer_id,
        &request.item,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(favorite)))
}

/// GET /api/v1/consumers/:id/favorites
pub async fn handle_list_favorites(
    State(state): State<AppState>,
    Path(consumer_id): Path<Uuid>,
) -> Result<Json<Vec<Favorite>>, AppError> {
    if state.store.get_consumer(consumer_id).await?.is_none() {
        return Err(AppError::NotFound(format!("consumer {consumer_id}")));
    }
    Ok(Json(state.store.list_favorites(consumer_id).await?))
}

/// DELETE /api/v1/consumers/:id/favorites/:favorite_id
pub async fn handle_delete_favorite(
    State(state): State<AppState>,
    Path((consumer_id, favorite_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    service::delete_favorite(state.store.as_ref(), consumer_id, favorite_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct AutoFavoriteRequest {
    pub item: String,
    pub added_on: Option<DateTime<Utc>>,
}

/// POST /api/v1/consumers/:id/favorites/auto
///
/// Entry point for the purchase-history job. Returns `favorite: null` when the
/// item is already a favorite.
pub async fn handle_auto_favorite(
    State(state): State<AppState>,
    Path(consumer_id): Path<Uuid>,
    Json(request): Json<AutoFavoriteRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let favorite = service::add_auto_favorite(
        state.store.as_ref(),
        &state.categorizer,
        consumer_id,
        &request.item,
        request.added_on.unwrap_or_else(Utc::now),
    )
    .await?;
    Ok(Json(serde_json::json!({ "favorite": favorite })))
}
