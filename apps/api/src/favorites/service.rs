//! Favorite creation: validate, categorize, append.

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::categorizer::{Categorization, Categorizer};
use crate::errors::AppError;
use crate::models::Favorite;
use crate::store::{Store, StoreError};

const MAX_FAVORITE_LEN: usize = 200;

fn validate_raw_input(raw_input: &str) -> Result<&str, AppError> {
    let trimmed = raw_input.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation("favorite text cannot be empty".to_string()));
    }
    if trimmed.chars().count() > MAX_FAVORITE_LEN {
        return Err(AppError::Validation(format!(
            "favorite text must be at most {MAX_FAVORITE_LEN} characters"
        )));
    }
    Ok(trimmed)
}

/// A favorite must leave something to match on: at least one generic keyword,
/// and at least one brand keyword when a brand was given.
fn validate_keywords(raw_input: &str, categorization: &Categorization) -> Result<(), AppError> {
    if categorization.generic_keywords.is_empty() {
        return Err(AppError::Validation(format!(
            "'{raw_input}' has no product words to match deals against"
        )));
    }
    if categorization.has_brand && categorization.brand_keywords.is_empty() {
        return Err(AppError::Validation(format!(
            "the brand in '{raw_input}' has no words to match deals against"
        )));
    }
    Ok(())
}

async fn is_duplicate(store: &dyn Store, consumer_id: Uuid, raw_input: &str) -> Result<bool, AppError> {
    Ok(store
        .list_favorites(consumer_id)
        .await?
        .iter()
        .any(|f| f.same_input(raw_input)))
}

async fn require_consumer(store: &dyn Store, consumer_id: Uuid) -> Result<(), AppError> {
    store
        .get_consumer(consumer_id)
        .await?
        .map(|_| ())
        .ok_or_else(|| AppError::NotFound(format!("consumer {consumer_id}")))
}

/// Explicit consumer add. Duplicates (case-insensitive) are a conflict.
pub async fn add_favorite(
    store: &dyn Store,
    categorizer: &Categorizer,
    consumer_id: Uuid,
    raw_input: &str,
) -> Result<Favorite, AppError> {
    let raw_input = validate_raw_input(raw_input)?;
    require_consumer(store, consumer_id).await?;
    if is_duplicate(store, consumer_id, raw_input).await? {
        return Err(AppError::Conflict(format!(
            "'{raw_input}' is already a favorite"
        )));
    }

    let categorization = categorizer.categorize(raw_input).await;
    validate_keywords(raw_input, &categorization)?;
    let favorite = Favorite::from_categorization(consumer_id, raw_input, categorization, None);
    store.insert_favorite(&favorite).await?;

    info!(
        "Consumer {consumer_id} added favorite '{}' ({})",
        favorite.raw_input, favorite.category
    );
    Ok(favorite)
}

/// Purchase-history add. Returns `None` when the name is already a favorite.
pub async fn add_auto_favorite(
    store: &dyn Store,
    categorizer: &Categorizer,
    consumer_id: Uuid,
    raw_input: &str,
    added_on: DateTime<Utc>,
) -> Result<Option<Favorite>, AppError> {
    let raw_input = validate_raw_input(raw_input)?;
    require_consumer(store, consumer_id).await?;
    if is_duplicate(store, consumer_id, raw_input).await? {
        debug!("Auto-favorite '{raw_input}' already present for consumer {consumer_id}");
        return Ok(None);
    }

    let categorization = categorizer.categorize(raw_input).await;
    validate_keywords(raw_input, &categorization)?;
    let favorite =
        Favorite::from_categorization(consumer_id, raw_input, categorization, Some(added_on));
    match store.insert_favorite(&favorite).await {
        Ok(()) => {}
        // Lost a race with a concurrent add of the same name.
        Err(StoreError::Duplicate(_)) => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    info!(
        "Auto-added favorite '{}' for consumer {consumer_id}",
        favorite.raw_input
    );
    Ok(Some(favorite))
}

pub async fn delete_favorite(
    store: &dyn Store,
    consumer_id: Uuid,
    favorite_id: Uuid,
) -> Result<(), AppError> {
    if !store.delete_favorite(consumer_id, favorite_id).await? {
        return Err(AppError::NotFound(format!(
            "favorite {favorite_id} for consumer {consumer_id}"
        )));
    }
    info!("Consumer {consumer_id} deleted favorite {favorite_id}");
    Ok(())
}
