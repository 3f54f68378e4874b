//! Axum route handlers for registration, geofence settings and retailer lists.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::geo::GeoPoint;
use crate::membership::audit::{Divergence, ReconcileReport};
use crate::models::consumer::{
    validate_auto_add_threshold, validate_center, validate_radius, DEFAULT_RADIUS,
};
use crate::models::{Consumer, MembershipEntry, Retailer};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterConsumerRequest {
    pub name: String,
    pub geofence_center: Option<GeoPoint>,
    pub geofence_radius: Option<f64>,
    pub auto_add_threshold: Option<u8>,
}

#[derive(Debug, Serialize)]
pub struct RegisterConsumerResponse {
    pub consumer: Consumer,
    pub retailers: Vec<MembershipEntry>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRetailerRequest {
    pub name: String,
    #[serde(default)]
    pub address: String,
    pub location: GeoPoint,
}

#[derive(Debug, Serialize)]
pub struct RegisterRetailerResponse {
    pub retailer: Retailer,
    pub consumers_added: usize,
}

#[derive(Debug, Deserialize)]
pub struct UpdateGeofenceRequest {
    pub geofence_center: Option<GeoPoint>,
    pub geofence_radius: f64,
}

#[derive(Debug, Serialize)]
pub struct DivergenceResponse {
    pub divergences: Vec<Divergence>,
    pub unrecovered_sync_failures: u64,
}

fn validate_name(name: &str) -> Result<String, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("name cannot be empty".to_string()));
    }
    Ok(name.to_string())
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/consumers
///
/// Registers a consumer and builds their initial retailer list.
pub async fn handle_register_consumer(
    State(state): State<AppState>,
    Json(request): Json<RegisterConsumerRequest>,
) -> Result<(StatusCode, Json<RegisterConsumerResponse>), AppError> {
    let name = validate_name(&request.name)?;
    let radius = validate_radius(request.geofence_radius.unwrap_or(DEFAULT_RADIUS))?;
    let center = request.geofence_center.map(validate_center).transpose()?;
    let threshold = validate_auto_add_threshold(request.auto_add_threshold.unwrap_or(0))?;

    let mut consumer = Consumer::new(name, center, radius);
    consumer.auto_add_threshold = threshold;
    state.store.insert_consumer(&consumer).await?;

    let retailers = state
        .memberships
        .initialize_consumer_list(consumer.id, center, radius)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterConsumerResponse {
            consumer,
            retailers,
        }),
    ))
}

/// POST /api/v1/retailers
///
/// Registers a retailer location and adds it to every consumer whose geofence covers it.
pub async fn handle_register_retailer(
    State(state): State<AppState>,
    Json(request): Json<RegisterRetailerRequest>,
) -> Result<(StatusCode, Json<RegisterRetailerResponse>), AppError> {
    let name = validate_name(&request.name)?;
    let location = validate_center(request.location)?;

    let retailer = Retailer::new(name, request.address.trim().to_string(), Some(location));
    state.store.insert_retailer(&retailer).await?;

    let added = state
        .memberships
        .initialize_retailer_list(retailer.id, retailer.location)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterRetailerResponse {
            retailer,
            consumers_added: added.len(),
        }),
    ))
}

/// PUT /api/v1/consumers/:id/geofence
pub async fn handle_update_geofence(
    State(state): State<AppState>,
    Path(consumer_id): Path<Uuid>,
    Json(request): Json<UpdateGeofenceRequest>,
) -> Result<Json<Vec<MembershipEntry>>, AppError> {
    let radius = validate_radius(request.geofence_radius)?;
    let center = request.geofence_center.map(validate_center).transpose()?;

    let active = state
        .memberships
        .recompute_on_radius_change(consumer_id, center, radius)
        .await?;
    Ok(Json(active))
}

/// GET /api/v1/consumers/:id/retailers
pub async fn handle_list_retailers(
    State(state): State<AppState>,
    Path(consumer_id): Path<Uuid>,
) -> Result<Json<Vec<MembershipEntry>>, AppError> {
    Ok(Json(state.memberships.get_active_entries(consumer_id).await?))
}

/// POST /api/v1/consumers/:id/retailers/:retailer_id
pub async fn handle_manual_add(
    State(state): State<AppState>,
    Path((consumer_id, retailer_id)): Path<(Uuid, Uuid)>,
) -> Result<(StatusCode, Json<MembershipEntry>), AppError> {
    let entry = state
        .memberships
        .manual_add(consumer_id, retailer_id)
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// DELETE /api/v1/consumers/:id/retailers/:retailer_id
pub async fn handle_manual_remove(
    State(state): State<AppState>,
    Path((consumer_id, retailer_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<MembershipEntry>, AppError> {
    let entry = state
        .memberships
        .manual_remove(consumer_id, retailer_id)
        .await?;
    Ok(Json(entry))
}

/// GET /api/v1/retailers/:id/consumers
///
/// Consumers currently eligible for this retailer's deal notifications.
pub async fn handle_retailer_consumers(
    State(state): State<AppState>,
    Path(retailer_id): Path<Uuid>,
) -> Result<Json<Vec<Uuid>>, AppError> {
    if state.store.get_retailer(retailer_id).await?.is_none() {
        return Err(AppError::NotFound(format!("retailer {retailer_id}")));
    }
    Ok(Json(state.memberships.eligible_consumers(retailer_id).await?))
}

/// GET /api/v1/admin/memberships/divergences
pub async fn handle_divergences(
    State(state): State<AppState>,
) -> Result<Json<DivergenceResponse>, AppError> {
    Ok(Json(DivergenceResponse {
        divergences: state.memberships.find_divergences().await?,
        unrecovered_sync_failures: state.memberships.mirror().unrecovered_failures(),
    }))
}

/// POST /api/v1/admin/memberships/reconcile
pub async fn handle_reconcile(
    State(state): State<AppState>,
) -> Result<Json<ReconcileReport>, AppError> {
    Ok(Json(state.memberships.reconcile_all().await?))
}
