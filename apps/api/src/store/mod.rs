//! Document store abstraction the core reads and writes through.
//!
//! Every method is a single storage round-trip and idempotent per call, so the
//! membership layer can retry mirrored writes without double-applying them.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::categorizer::Category;
use crate::geo::GeoPoint;
use crate::models::{Consumer, DealItem, Favorite, MembershipEntry, Notification, Retailer};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait Store: Send + Sync {
    // Consumers
    async fn insert_consumer(&self, consumer: &Consumer) -> Result<(), StoreError>;
    async fn get_consumer(&self, id: Uuid) -> Result<Option<Consumer>, StoreError>;
    async fn update_geofence(
        &self,
        id: Uuid,
        center: Option<GeoPoint>,
        radius: f64,
    ) -> Result<(), StoreError>;
    async fn list_consumers(&self) -> Result<Vec<Consumer>, StoreError>;

    // Retailers
    async fn insert_retailer(&self, retailer: &Retailer) -> Result<(), StoreError>;
    async fn get_retailer(&self, id: Uuid) -> Result<Option<Retailer>, StoreError>;
    async fn list_retailers(&self) -> Result<Vec<Retailer>, StoreError>;

    // Consumer-Retailer-List (primary)
    /// All entries for the consumer, including manually removed ones, in join order.
    async fn consumer_entries(&self, consumer_id: Uuid)
        -> Result<Vec<MembershipEntry>, StoreError>;
    /// Inserts or overwrites the entry keyed by its retailer id.
    async fn upsert_entry(&self, consumer_id: Uuid, entry: &MembershipEntry)
        -> Result<(), StoreError>;
    async fn replace_entries(
        &self,
        consumer_id: Uuid,
        entries: &[MembershipEntry],
    ) -> Result<(), StoreError>;

    // Both sides as one unit
    /// Whether `replace_memberships` and `upsert_membership` commit the consumer
    /// entries and the retailer-side rows together. When `false` the membership
    /// layer writes the consumer side first and mirrors with retries.
    fn atomic_memberships(&self) -> bool;
    /// Replaces the consumer's entries and sets the consumer's retailer-side rows
    /// to exactly the active ones.
    async fn replace_memberships(
        &self,
        consumer_id: Uuid,
        entries: &[MembershipEntry],
    ) -> Result<(), StoreError>;
    /// Upserts one entry and adds or removes the matching retailer-side row.
    async fn upsert_membership(
        &self,
        consumer_id: Uuid,
        entry: &MembershipEntry,
    ) -> Result<(), StoreError>;

    // Retailer-Consumer-List (derived index)
    async fn retailer_consumers(&self, retailer_id: Uuid) -> Result<Vec<Uuid>, StoreError>;
    async fn add_retailer_consumer(&self, retailer_id: Uuid, consumer_id: Uuid)
        -> Result<(), StoreError>;
    async fn remove_retailer_consumer(
        &self,
        retailer_id: Uuid,
        consumer_id: Uuid,
    ) -> Result<(), StoreError>;
    async fn replace_retailer_consumers(
        &self,
        retailer_id: Uuid,
        consumer_ids: &[Uuid],
    ) -> Result<(), StoreError>;

    // Favorites
    async fn insert_favorite(&self, favorite: &Favorite) -> Result<(), StoreError>;
    async fn list_favorites(&self, consumer_id: Uuid) -> Result<Vec<Favorite>, StoreError>;
    async fn favorites_in_category(
        &self,
        consumer_id: Uuid,
        category: Category,
    ) -> Result<Vec<Favorite>, StoreError>;
    async fn delete_favorite(&self, consumer_id: Uuid, favorite_id: Uuid)
        -> Result<bool, StoreError>;

    // Deal items
    async fn insert_deal(&self, deal: &DealItem) -> Result<(), StoreError>;
    async fn get_deal(&self, id: Uuid) -> Result<Option<DealItem>, StoreError>;

    // Notifications
    async fn insert_notification(&self, notification: &Notification) -> Result<(), StoreError>;
    /// Newest first.
    async fn list_notifications(&self, consumer_id: Uuid)
        -> Result<Vec<Notification>, StoreError>;
    async fn mark_notification_read(
        &self,
        consumer_id: Uuid,
        notification_id: Uuid,
    ) -> Result<bool, StoreError>;
}
