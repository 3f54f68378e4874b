//! Axum route handlers for posting deal items.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::categorizer::text::detect_attributes;
use crate::categorizer::{Attributes, Category};
use crate::deals::discount::{deal_price, tier_for_level};
use crate::errors::AppError;
use crate::models::{DealItem, DealStatus, Retailer};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PostDealRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    pub regular_price: f64,
    pub discount_level: u8,
    pub quantity: i32,
    #[serde(default)]
    pub attributes: Attributes,
}

#[derive(Debug, Serialize)]
pub struct PostDealResponse {
    pub deal: DealItem,
    pub eligible_consumers: usize,
    pub notified: usize,
    pub delivered_live: usize,
}

/// Validates the request and prices the item. No side effects.
pub fn build_deal(retailer: &Retailer, request: PostDealRequest) -> Result<DealItem, AppError> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("name cannot be empty".to_string()));
    }
    let category = Category::from_name(&request.category).ok_or_else(|| {
        AppError::Validation(format!("unknown category '{}'", request.category))
    })?;
    if !request.regular_price.is_finite() || request.regular_price < 0.0 {
        return Err(AppError::Validation(
            "regular_price must be a non-negative number".to_string(),
        ));
    }
    if request.quantity <= 0 {
        return Err(AppError::Validation("quantity must be positive".to_string()));
    }
    let tier = tier_for_level(request.discount_level)?;

    Ok(DealItem {
        id: Uuid::new_v4(),
        retailer_id: retailer.id,
        retailer_name: retailer.name.clone(),
        name: name.to_string(),
        description: request.description,
        category,
        attributes: request.attributes.or_detected(detect_attributes(name)),
        regular_price: request.regular_price,
        discount_level: tier.level,
        retailer_discount_percent: tier.retailer_percent,
        consumer_discount_percent: tier.consumer_percent,
        deal_price: deal_price(request.regular_price, tier.consumer_percent),
        quantity: request.quantity,
        status: DealStatus::Available,
        posted_at: Utc::now(),
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/retailers/:id/items
///
/// Stores the item, then notifies matching consumers in the retailer's list.
pub async fn handle_post_deal(
    State(state): State<AppState>,
    Path(retailer_id): Path<Uuid>,
    Json(request): Json<PostDealRequest>,
) -> Result<Json<PostDealResponse>, AppError> {
    let retailer = state
        .store
        .get_retailer(retailer_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("retailer {retailer_id}")))?;

    let deal = build_deal(&retailer, request)?;
    state.store.insert_deal(&deal).await?;

    let outcome = state.matcher.match_and_notify(&deal).await?;

    Ok(Json(PostDealResponse {
        eligible_consumers: outcome.eligible,
        notified: outcome.notifications.len(),
        delivered_live: outcome.delivery.live,
        deal,
    }))
}

/// GET /api/v1/items/:id
pub async fn handle_get_deal(
    State(state): State<AppState>,
    Path(deal_id): Path<Uuid>,
) -> Result<Json<DealItem>, AppError> {
    state
        .store
        .get_deal(deal_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("item {deal_id}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoPoint;

    fn make_retailer() -> Retailer {
        Retailer::new(
            "Corner Market".to_string(),
            "1 Main St".to_string(),
            Some(GeoPoint::new(40.03, -74.0)),
        )
    }

    fn make_request(name: &str, level: u8) -> PostDealRequest {
        PostDealRequest {
            name: name.to_string(),
            description: String::new(),
            category: "Breakfast & Cereal".to_string(),
            regular_price: 6.0,
            discount_level: level,
            quantity: 12,
            attributes: Attributes::default(),
        }
    }

    #[test]
    fn test_build_deal_prices_and_detects_attributes() {
        let deal = build_deal(&make_retailer(), make_request("Organic Granola", 3)).unwrap();
        assert_eq!(deal.category, Category::BreakfastCereal);
        assert_eq!(deal.consumer_discount_percent, 75.0);
        assert_eq!(deal.retailer_discount_percent, 90.0);
        assert_eq!(deal.deal_price, 1.5);
        assert_eq!(deal.attributes.organic, Some(true));
        assert_eq!(deal.status, DealStatus::Available);
    }

    #[test]
    fn test_request_attributes_override_detection() {
        let mut request = make_request("Organic Granola", 1);
        request.attributes.organic = Some(false);
        let deal = build_deal(&make_retailer(), request).unwrap();
        assert_eq!(deal.attributes.organic, Some(false));
    }

    #[test]
    fn test_rejects_bad_input() {
        let retailer = make_retailer();
        assert!(build_deal(&retailer, make_request("Granola", 5)).is_err());
        assert!(build_deal(&retailer, make_request("  ", 1)).is_err());

        let mut request = make_request("Granola", 1);
        request.category = "Cereal".to_string();
        assert!(matches!(
            build_deal(&retailer, request),
            Err(AppError::Validation(_))
        ));

        let mut request = make_request("Granola", 1);
        request.quantity = 0;
        assert!(build_deal(&retailer, request).is_err());

        let mut request = make_request("Granola", 1);
        request.regular_price = -1.0;
        assert!(build_deal(&retailer, request).is_err());
    }
}
