pub mod health;

use axum::{
    routing::{delete, get, patch, post, put},
    Router,
};

use crate::categorizer::handlers as categories;
use crate::deals::handlers as deals;
use crate::delivery::handlers as delivery;
use crate::favorites::handlers as favorites;
use crate::membership::handlers as membership;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Registration
        .route(
            "/api/v1/consumers",
            post(membership::handle_register_consumer),
        )
        .route(
            "/api/v1/retailers",
            post(membership::handle_register_retailer),
        )
        // Geofence and retailer lists
        .route(
            "/api/v1/consumers/:id/geofence",
            put(membership::handle_update_geofence),
        )
        .route(
            "/api/v1/consumers/:id/retailers",
            get(membership::handle_list_retailers),
        )
        .route(
            "/api/v1/consumers/:id/retailers/:retailer_id",
            post(membership::handle_manual_add).delete(membership::handle_manual_remove),
        )
        .route(
            "/api/v1/retailers/:id/consumers",
            get(membership::handle_retailer_consumers),
        )
        // Favorites
        .route(
            "/api/v1/consumers/:id/favorites",
            get(favorites::handle_list_favorites).post(favorites::handle_add_favorite),
        )
        .route(
            "/api/v1/consumers/:id/favorites/auto",
            post(favorites::handle_auto_favorite),
        )
        .route(
            "/api/v1/consumers/:id/favorites/:favorite_id",
            delete(favorites::handle_delete_favorite),
        )
        // Deal items
        .route("/api/v1/retailers/:id/items", post(deals::handle_post_deal))
        .route("/api/v1/items/:id", get(deals::handle_get_deal))
        // Notifications and live delivery
        .route(
            "/api/v1/consumers/:id/notifications",
            get(delivery::handle_list_notifications),
        )
        .route(
            "/api/v1/consumers/:id/notifications/:notification_id/read",
            patch(delivery::handle_mark_read),
        )
        .route("/api/v1/consumers/:id/live", get(delivery::handle_live))
        // Categories
        .route("/api/v1/categories", get(categories::handle_list_categories))
        .route("/api/v1/categorize", post(categories::handle_categorize))
        // Admin
        .route(
            "/api/v1/admin/memberships/divergences",
            get(membership::handle_divergences),
        )
        .route(
            "/api/v1/admin/memberships/reconcile",
            post(membership::handle_reconcile),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::categorizer::tests::keyword_only_categorizer;
    use crate::membership::RetryPolicy;
    use crate::store::MemoryStore;

    fn make_app() -> Router {
        let retry = RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
        };
        let state = AppState::new(
            Arc::new(MemoryStore::new()),
            keyword_only_categorizer(),
            retry,
            8,
        );
        build_router(state)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(&make_app(), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "dealshaq-api");
    }

    #[tokio::test]
    async fn test_post_deal_notifies_matching_consumer() {
        let app = make_app();
        let (status, retailer) = send(
            &app,
            "POST",
            "/api/v1/retailers",
            Some(json!({"name": "Corner Market", "location": {"lat": 40.03, "lng": -74.0}})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let retailer_id = retailer["retailer"]["id"].as_str().unwrap().to_string();

        let (status, consumer) = send(
            &app,
            "POST",
            "/api/v1/consumers",
            Some(json!({"name": "Dana", "geofence_center": {"lat": 40.0, "lng": -74.0}})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(consumer["retailers"][0]["distance"], 2.07);
        let consumer_id = consumer["consumer"]["id"].as_str().unwrap().to_string();

        let (status, _) = send(
            &app,
            "POST",
            &format!("/api/v1/consumers/{consumer_id}/favorites"),
            Some(json!({"item": "Granola"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, posted) = send(
            &app,
            "POST",
            &format!("/api/v1/retailers/{retailer_id}/items"),
            Some(json!({
                "name": "Organic Granola",
                "category": "Breakfast & Cereal",
                "regular_price": 5.0,
                "discount_level": 1,
                "quantity": 4
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(posted["notified"], 1);
        assert_eq!(posted["deal"]["deal_price"], 2.5);

        let (_, notifications) = send(
            &app,
            "GET",
            &format!("/api/v1/consumers/{consumer_id}/notifications"),
            None,
        )
        .await;
        assert_eq!(
            notifications[0]["message"],
            "New deal on Organic Granola - 50% off at Corner Market!"
        );
        let notification_id = notifications[0]["id"].as_str().unwrap().to_string();

        let (status, _) = send(
            &app,
            "PATCH",
            &format!("/api/v1/consumers/{consumer_id}/notifications/{notification_id}/read"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_list_errors_map_to_status_codes() {
        let app = make_app();
        let (_, retailer) = send(
            &app,
            "POST",
            "/api/v1/retailers",
            Some(json!({"name": "Corner Market", "location": {"lat": 40.03, "lng": -74.0}})),
        )
        .await;
        let retailer_id = retailer["retailer"]["id"].as_str().unwrap().to_string();
        let (_, consumer) = send(
            &app,
            "POST",
            "/api/v1/consumers",
            Some(json!({"name": "Dana", "geofence_center": {"lat": 40.0, "lng": -74.0}})),
        )
        .await;
        let consumer_id = consumer["consumer"]["id"].as_str().unwrap().to_string();
        let pair = format!("/api/v1/consumers/{consumer_id}/retailers/{retailer_id}");

        let (status, body) = send(&app, "POST", &pair, None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "CONFLICT");

        let (status, body) = send(&app, "DELETE", &pair, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["manually_removed"], true);

        let (status, _) = send(&app, "DELETE", &pair, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(
            &app,
            "PUT",
            &format!("/api/v1/consumers/{consumer_id}/geofence"),
            Some(json!({"geofence_radius": 12.0})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_divergence_report_starts_clean() {
        let app = make_app();
        let (status, body) = send(&app, "GET", "/api/v1/admin/memberships/divergences", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["divergences"], json!([]));
        assert_eq!(body["unrecovered_sync_failures"], 0);
    }

    #[tokio::test]
    async fn test_categories_listed_in_table_order() {
        let (_, body) = send(&make_app(), "GET", "/api/v1/categories", None).await;
        let names = body.as_array().unwrap();
        assert_eq!(names.len(), 20);
        assert_eq!(names[0], "Fruits");
        assert_eq!(names[19], "Miscellaneous");
    }
}
