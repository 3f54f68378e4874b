//! PostgreSQL-backed store. Schema lives in `migrations/`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::categorizer::{Attributes, Category};
use crate::geo::GeoPoint;
use crate::models::{
    Consumer, DealItem, DealStatus, Favorite, MembershipEntry, Notification, Retailer,
};
use crate::store::{Store, StoreError};

const UNIQUE_VIOLATION: &str = "23505";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Row types
// ────────────────────────────────────────────────────────────────────────────

fn point(lat: Option<f64>, lng: Option<f64>) -> Option<GeoPoint> {
    match (lat, lng) {
        (Some(lat), Some(lng)) => Some(GeoPoint::new(lat, lng)),
        _ => None,
    }
}

fn parse_category(raw: &str) -> Result<Category, StoreError> {
    raw.parse()
        .map_err(|e| StoreError::Corrupt(format!("{e}")))
}

#[derive(Debug, FromRow)]
struct ConsumerRow {
    id: Uuid,
    name: String,
    center_lat: Option<f64>,
    center_lng: Option<f64>,
    geofence_radius: f64,
    auto_add_threshold: i16,
    created_at: DateTime<Utc>,
}

impl From<ConsumerRow> for Consumer {
    fn from(row: ConsumerRow) -> Self {
        Consumer {
            id: row.id,
            name: row.name,
            geofence_center: point(row.center_lat, row.center_lng),
            geofence_radius: row.geofence_radius,
            auto_add_threshold: u8::try_from(row.auto_add_threshold).unwrap_or(0),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct RetailerRow {
    id: Uuid,
    name: String,
    address: String,
    lat: Option<f64>,
    lng: Option<f64>,
    created_at: DateTime<Utc>,
}

impl From<RetailerRow> for Retailer {
    fn from(row: RetailerRow) -> Self {
        Retailer {
            id: row.id,
            name: row.name,
            address: row.address,
            location: point(row.lat, row.lng),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct EntryRow {
    retailer_id: Uuid,
    retailer_name: String,
    retailer_lat: f64,
    retailer_lng: f64,
    distance: Option<f64>,
    inside_geofence: bool,
    manually_added: bool,
    manually_removed: bool,
    joined_at: DateTime<Utc>,
}

impl From<EntryRow> for MembershipEntry {
    fn from(row: EntryRow) -> Self {
        MembershipEntry {
            retailer_id: row.retailer_id,
            retailer_name: row.retailer_name,
            retailer_location: GeoPoint::new(row.retailer_lat, row.retailer_lng),
            distance: row.distance,
            inside_geofence: row.inside_geofence,
            manually_added: row.manually_added,
            manually_removed: row.manually_removed,
            joined_at: row.joined_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct FavoriteRow {
    id: Uuid,
    consumer_id: Uuid,
    raw_input: String,
    brand: Option<String>,
    generic: String,
    has_brand: bool,
    category: String,
    keywords: Vec<String>,
    brand_keywords: Vec<String>,
    generic_keywords: Vec<String>,
    organic: Option<bool>,
    gluten_free: Option<bool>,
    non_gmo: Option<bool>,
    vegan: Option<bool>,
    auto_added_date: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<FavoriteRow> for Favorite {
    type Error = StoreError;

    fn try_from(row: FavoriteRow) -> Result<Self, Self::Error> {
        Ok(Favorite {
            id: row.id,
            consumer_id: row.consumer_id,
            raw_input: row.raw_input,
            brand: row.brand,
            generic: row.generic,
            has_brand: row.has_brand,
            category: parse_category(&row.category)?,
            keywords: row.keywords,
            brand_keywords: row.brand_keywords,
            generic_keywords: row.generic_keywords,
            attributes: Attributes {
                organic: row.organic,
                gluten_free: row.gluten_free,
                non_gmo: row.non_gmo,
                vegan: row.vegan,
            },
            auto_added_date: row.auto_added_date,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct DealRow {
    id: Uuid,
    retailer_id: Uuid,
    retailer_name: String,
    name: String,
    description: String,
    category: String,
    organic: Option<bool>,
    gluten_free: Option<bool>,
    non_gmo: Option<bool>,
    vegan: Option<bool>,
    regular_price: f64,
    discount_level: i16,
    retailer_discount_percent: f64,
    consumer_discount_percent: f64,
    deal_price: f64,
    quantity: i32,
    status: String,
    posted_at: DateTime<Utc>,
}

impl TryFrom<DealRow> for DealItem {
    type Error = StoreError;

    fn try_from(row: DealRow) -> Result<Self, Self::Error> {
        let status = DealStatus::parse(&row.status)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown deal status '{}'", row.status)))?;
        Ok(DealItem {
            id: row.id,
            retailer_id: row.retailer_id,
            retailer_name: row.retailer_name,
            name: row.name,
            description: row.description,
            category: parse_category(&row.category)?,
            attributes: Attributes {
                organic: row.organic,
                gluten_free: row.gluten_free,
                non_gmo: row.non_gmo,
                vegan: row.vegan,
            },
            regular_price: row.regular_price,
            discount_level: u8::try_from(row.discount_level)
                .map_err(|_| StoreError::Corrupt(format!("bad discount level {}", row.discount_level)))?,
            retailer_discount_percent: row.retailer_discount_percent,
            consumer_discount_percent: row.consumer_discount_percent,
            deal_price: row.deal_price,
            quantity: row.quantity,
            status,
            posted_at: row.posted_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct NotificationRow {
    id: Uuid,
    consumer_id: Uuid,
    deal_id: Uuid,
    message: String,
    read: bool,
    created_at: DateTime<Utc>,
}

impl From<NotificationRow> for Notification {
    fn from(row: NotificationRow) -> Self {
        Notification {
            id: row.id,
            consumer_id: row.consumer_id,
            deal_id: row.deal_id,
            message: row.message,
            read: row.read,
            created_at: row.created_at,
        }
    }
}

fn map_unique_violation(e: sqlx::Error, what: String) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
            return StoreError::Duplicate(what);
        }
    }
    StoreError::Database(e)
}

const ENTRY_COLUMNS: &str = "retailer_id, retailer_name, retailer_lat, retailer_lng, distance, \
     inside_geofence, manually_added, manually_removed, joined_at";

const UPSERT_ENTRY_SQL: &str = r#"
    INSERT INTO consumer_retailer_entries
        (consumer_id, retailer_id, retailer_name, retailer_lat, retailer_lng, distance,
         inside_geofence, manually_added, manually_removed, joined_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
    ON CONFLICT (consumer_id, retailer_id) DO UPDATE SET
        retailer_name = EXCLUDED.retailer_name,
        retailer_lat = EXCLUDED.retailer_lat,
        retailer_lng = EXCLUDED.retailer_lng,
        distance = EXCLUDED.distance,
        inside_geofence = EXCLUDED.inside_geofence,
        manually_added = EXCLUDED.manually_added,
        manually_removed = EXCLUDED.manually_removed,
        joined_at = EXCLUDED.joined_at
"#;

fn bind_entry<'q>(
    query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    consumer_id: Uuid,
    entry: &'q MembershipEntry,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    query
        .bind(consumer_id)
        .bind(entry.retailer_id)
        .bind(&entry.retailer_name)
        .bind(entry.retailer_location.lat)
        .bind(entry.retailer_location.lng)
        .bind(entry.distance)
        .bind(entry.inside_geofence)
        .bind(entry.manually_added)
        .bind(entry.manually_removed)
        .bind(entry.joined_at)
}

#[async_trait]
impl Store for PgStore {
    async fn insert_consumer(&self, consumer: &Consumer) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO consumers
                (id, name, center_lat, center_lng, geofence_radius, auto_add_threshold, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(consumer.id)
        .bind(&consumer.name)
        .bind(consumer.geofence_center.map(|c| c.lat))
        .bind(consumer.geofence_center.map(|c| c.lng))
        .bind(consumer.geofence_radius)
        .bind(i16::from(consumer.auto_add_threshold))
        .bind(consumer.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_consumer(&self, id: Uuid) -> Result<Option<Consumer>, StoreError> {
        let row = sqlx::query_as::<_, ConsumerRow>("SELECT * FROM consumers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Consumer::from))
    }

    async fn update_geofence(
        &self,
        id: Uuid,
        center: Option<GeoPoint>,
        radius: f64,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE consumers SET center_lat = $1, center_lng = $2, geofence_radius = $3 WHERE id = $4",
        )
        .bind(center.map(|c| c.lat))
        .bind(center.map(|c| c.lng))
        .bind(radius)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_consumers(&self) -> Result<Vec<Consumer>, StoreError> {
        let rows = sqlx::query_as::<_, ConsumerRow>(
            "SELECT * FROM consumers ORDER BY created_at, id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Consumer::from).collect())
    }

    async fn insert_retailer(&self, retailer: &Retailer) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO retailers (id, name, address, lat, lng, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(retailer.id)
        .bind(&retailer.name)
        .bind(&retailer.address)
        .bind(retailer.location.map(|l| l.lat))
        .bind(retailer.location.map(|l| l.lng))
        .bind(retailer.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_retailer(&self, id: Uuid) -> Result<Option<Retailer>, StoreError> {
        let row = sqlx::query_as::<_, RetailerRow>("SELECT * FROM retailers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Retailer::from))
    }

    async fn list_retailers(&self) -> Result<Vec<Retailer>, StoreError> {
        let rows = sqlx::query_as::<_, RetailerRow>(
            "SELECT * FROM retailers ORDER BY created_at, id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Retailer::from).collect())
    }

    async fn consumer_entries(
        &self,
        consumer_id: Uuid,
    ) -> Result<Vec<MembershipEntry>, StoreError> {
        let rows = sqlx::query_as::<_, EntryRow>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM consumer_retailer_entries \
             WHERE consumer_id = $1 ORDER BY joined_at, retailer_id"
        ))
        .bind(consumer_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(MembershipEntry::from).collect())
    }

    async fn upsert_entry(
        &self,
        consumer_id: Uuid,
        entry: &MembershipEntry,
    ) -> Result<(), StoreError> {
        bind_entry(sqlx::query(UPSERT_ENTRY_SQL), consumer_id, entry)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn replace_entries(
        &self,
        consumer_id: Uuid,
        entries: &[MembershipEntry],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM consumer_retailer_entries WHERE consumer_id = $1")
            .bind(consumer_id)
            .execute(&mut *tx)
            .await?;

        for entry in entries {
            bind_entry(sqlx::query(UPSERT_ENTRY_SQL), consumer_id, entry)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    fn atomic_memberships(&self) -> bool {
        true
    }

    async fn replace_memberships(
        &self,
        consumer_id: Uuid,
        entries: &[MembershipEntry],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM consumer_retailer_entries WHERE consumer_id = $1")
            .bind(consumer_id)
            .execute(&mut *tx)
            .await?;
        for entry in entries {
            bind_entry(sqlx::query(UPSERT_ENTRY_SQL), consumer_id, entry)
                .execute(&mut *tx)
                .await?;
        }

        let active: Vec<Uuid> = entries
            .iter()
            .filter(|e| e.is_active())
            .map(|e| e.retailer_id)
            .collect();
        sqlx::query(
            "DELETE FROM retailer_consumers WHERE consumer_id = $1 AND NOT (retailer_id = ANY($2))",
        )
        .bind(consumer_id)
        .bind(&active)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            r#"
            INSERT INTO retailer_consumers (retailer_id, consumer_id)
            SELECT UNNEST($1::uuid[]), $2
            ON CONFLICT (retailer_id, consumer_id) DO NOTHING
            "#,
        )
        .bind(&active)
        .bind(consumer_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn upsert_membership(
        &self,
        consumer_id: Uuid,
        entry: &MembershipEntry,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        bind_entry(sqlx::query(UPSERT_ENTRY_SQL), consumer_id, entry)
            .execute(&mut *tx)
            .await?;
        let mirror_sql = if entry.is_active() {
            r#"
            INSERT INTO retailer_consumers (retailer_id, consumer_id)
            VALUES ($1, $2)
            ON CONFLICT (retailer_id, consumer_id) DO NOTHING
            "#
        } else {
            "DELETE FROM retailer_consumers WHERE retailer_id = $1 AND consumer_id = $2"
        };
        sqlx::query(mirror_sql)
            .bind(entry.retailer_id)
            .bind(consumer_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn retailer_consumers(&self, retailer_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        Ok(sqlx::query_scalar(
            "SELECT consumer_id FROM retailer_consumers WHERE retailer_id = $1 ORDER BY consumer_id",
        )
        .bind(retailer_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn add_retailer_consumer(
        &self,
        retailer_id: Uuid,
        consumer_id: Uuid,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO retailer_consumers (retailer_id, consumer_id)
            VALUES ($1, $2)
            ON CONFLICT (retailer_id, consumer_id) DO NOTHING
            "#,
        )
        .bind(retailer_id)
        .bind(consumer_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove_retailer_consumer(
        &self,
        retailer_id: Uuid,
        consumer_id: Uuid,
    ) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM retailer_consumers WHERE retailer_id = $1 AND consumer_id = $2")
            .bind(retailer_id)
            .bind(consumer_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn replace_retailer_consumers(
        &self,
        retailer_id: Uuid,
        consumer_ids: &[Uuid],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM retailer_consumers WHERE retailer_id = $1")
            .bind(retailer_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO retailer_consumers (retailer_id, consumer_id)
            SELECT $1, UNNEST($2::uuid[])
            ON CONFLICT (retailer_id, consumer_id) DO NOTHING
            "#,
        )
        .bind(retailer_id)
        .bind(consumer_ids)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn insert_favorite(&self, favorite: &Favorite) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO favorites
                (id, consumer_id, raw_input, brand, generic, has_brand, category, keywords,
                 brand_keywords, generic_keywords, organic, gluten_free, non_gmo, vegan,
                 auto_added_date, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(favorite.id)
        .bind(favorite.consumer_id)
        .bind(&favorite.raw_input)
        .bind(&favorite.brand)
        .bind(&favorite.generic)
        .bind(favorite.has_brand)
        .bind(favorite.category.name())
        .bind(&favorite.keywords)
        .bind(&favorite.brand_keywords)
        .bind(&favorite.generic_keywords)
        .bind(favorite.attributes.organic)
        .bind(favorite.attributes.gluten_free)
        .bind(favorite.attributes.non_gmo)
        .bind(favorite.attributes.vegan)
        .bind(favorite.auto_added_date)
        .bind(favorite.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            map_unique_violation(
                e,
                format!(
                    "favorite '{}' for consumer {}",
                    favorite.raw_input, favorite.consumer_id
                ),
            )
        })?;
        Ok(())
    }

    async fn list_favorites(&self, consumer_id: Uuid) -> Result<Vec<Favorite>, StoreError> {
        let rows = sqlx::query_as::<_, FavoriteRow>(
            "SELECT * FROM favorites WHERE consumer_id = $1 ORDER BY created_at, id",
        )
        .bind(consumer_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Favorite::try_from).collect()
    }

    async fn favorites_in_category(
        &self,
        consumer_id: Uuid,
        category: Category,
    ) -> Result<Vec<Favorite>, StoreError> {
        let rows = sqlx::query_as::<_, FavoriteRow>(
            "SELECT * FROM favorites WHERE consumer_id = $1 AND category = $2 ORDER BY created_at, id",
        )
        .bind(consumer_id)
        .bind(category.name())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Favorite::try_from).collect()
    }

    async fn delete_favorite(
        &self,
        consumer_id: Uuid,
        favorite_id: Uuid,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM favorites WHERE id = $1 AND consumer_id = $2")
            .bind(favorite_id)
            .bind(consumer_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_deal(&self, deal: &DealItem) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO deal_items
                (id, retailer_id, retailer_name, name, description, category, organic,
                 gluten_free, non_gmo, vegan, regular_price, discount_level,
                 retailer_discount_percent, consumer_discount_percent, deal_price, quantity,
                 status, posted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            "#,
        )
        .bind(deal.id)
        .bind(deal.retailer_id)
        .bind(&deal.retailer_name)
        .bind(&deal.name)
        .bind(&deal.description)
        .bind(deal.category.name())
        .bind(deal.attributes.organic)
        .bind(deal.attributes.gluten_free)
        .bind(deal.attributes.non_gmo)
        .bind(deal.attributes.vegan)
        .bind(deal.regular_price)
        .bind(i16::from(deal.discount_level))
        .bind(deal.retailer_discount_percent)
        .bind(deal.consumer_discount_percent)
        .bind(deal.deal_price)
        .bind(deal.quantity)
        .bind(deal.status.as_str())
        .bind(deal.posted_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_deal(&self, id: Uuid) -> Result<Option<DealItem>, StoreError> {
        let row = sqlx::query_as::<_, DealRow>("SELECT * FROM deal_items WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(DealItem::try_from).transpose()
    }

    async fn insert_notification(&self, notification: &Notification) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO notifications (id, consumer_id, deal_id, message, read, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(notification.id)
        .bind(notification.consumer_id)
        .bind(notification.deal_id)
        .bind(&notification.message)
        .bind(notification.read)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_notifications(
        &self,
        consumer_id: Uuid,
    ) -> Result<Vec<Notification>, StoreError> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            "SELECT * FROM notifications WHERE consumer_id = $1 ORDER BY created_at DESC, id",
        )
        .bind(consumer_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Notification::from).collect())
    }

    async fn mark_notification_read(
        &self,
        consumer_id: Uuid,
        notification_id: Uuid,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE notifications SET read = TRUE WHERE id = $1 AND consumer_id = $2",
        )
        .bind(notification_id)
        .bind(consumer_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
