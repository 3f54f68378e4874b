//! Axum route handlers for notifications and the live channel.

use axum::{
    extract::{ws::WebSocketUpgrade, Path, State},
    response::Response,
    Json,
};
use uuid::Uuid;

use crate::delivery::session::run_live_session;
use crate::errors::AppError;
use crate::models::Notification;
use crate::state::AppState;

async fn ensure_consumer(state: &AppState, consumer_id: Uuid) -> Result<(), AppError> {
    state
        .store
        .get_consumer(consumer_id)
        .await?
        .map(|_| ())
        .ok_or_else(|| AppError::NotFound(format!("consumer {consumer_id}")))
}

/// GET /api/v1/consumers/:id/live
///
/// Upgrades to a WebSocket that receives `connected` then `new_deal` frames.
pub async fn handle_live(
    State(state): State<AppState>,
    Path(consumer_id): Path<Uuid>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    ensure_consumer(&state, consumer_id).await?;
    let fanout = state.fanout.clone();
    Ok(ws.on_upgrade(move |socket| run_live_session(socket, fanout, consumer_id)))
}

/// GET /api/v1/consumers/:id/notifications
pub async fn handle_list_notifications(
    State(state): State<AppState>,
    Path(consumer_id): Path<Uuid>,
) -> Result<Json<Vec<Notification>>, AppError> {
    ensure_consumer(&state, consumer_id).await?;
    Ok(Json(state.store.list_notifications(consumer_id).await?))
}

/// PATCH /api/v1/consumers/:id/notifications/:notification_id/read
pub async fn handle_mark_read(
    State(state): State<AppState>,
    Path((consumer_id, notification_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<serde_json::Value>, AppError> {
    let found = state
        .store
        .mark_notification_read(consumer_id, notification_id)
        .await?;
    if !found {
        return Err(AppError::NotFound(format!(
            "notification {notification_id} for consumer {consumer_id}"
        )));
    }
    Ok(Json(serde_json::json!({ "id": notification_id, "read": true })))
}
