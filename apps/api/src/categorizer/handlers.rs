//! Axum route handlers for the category taxonomy.

use axum::{extract::State, Json};
use serde::Deserialize;

use crate::categorizer::{Categorization, Category};
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CategorizeRequest {
    pub name: String,
}

/// GET /api/v1/categories
pub async fn handle_list_categories() -> Json<Vec<&'static str>> {
    Json(Category::ALL.iter().map(|c| c.name()).collect())
}

/// POST /api/v1/categorize
///
/// Previews how a raw item name would be decomposed and categorized.
pub async fn handle_categorize(
    State(state): State<AppState>,
    Json(request): Json<CategorizeRequest>,
) -> Result<Json<Categorization>, AppError> {
    if request.name.trim().is_empty() {
        return Err(AppError::Validation("name cannot be empty".to_string()));
    }
    Ok(Json(state.categorizer.categorize(&request.name).await))
}
