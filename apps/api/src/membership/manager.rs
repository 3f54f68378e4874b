//! Consumer-Retailer-List maintenance.
//!
//! The consumer side (`consumer_entries`) is the source of truth; the
//! retailer side is an index derived from it. When the store supports it both
//! sides are committed together. Otherwise the consumer side is written first
//! and the index is mirrored through [`MirrorSync`] with retries.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::AppError;
use crate::geo::{distance, GeoPoint};
use crate::models::{Consumer, MembershipEntry, Retailer};
use crate::membership::sync::{MirrorSync, RetryPolicy};
use crate::store::Store;

#[derive(Clone)]
pub struct MembershipManager {
    store: Arc<dyn Store>,
    mirror: MirrorSync,
}

impl MembershipManager {
    pub fn new(store: Arc<dyn Store>, policy: RetryPolicy) -> Self {
        let mirror = MirrorSync::new(store.clone(), policy);
        Self { store, mirror }
    }

    pub fn mirror(&self) -> &MirrorSync {
        &self.mirror
    }

    pub(crate) fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Builds the initial list for a newly registered consumer from every
    /// located retailer inside the geofence. No-op without a center.
    pub async fn initialize_consumer_list(
        &self,
        consumer_id: Uuid,
        center: Option<GeoPoint>,
        radius: f64,
    ) -> Result<Vec<MembershipEntry>, AppError> {
        let Some(center) = center else {
            debug!("Consumer {consumer_id} has no geofence center; list left empty");
            return Ok(Vec::new());
        };

        let now = Utc::now();
        let entries: Vec<MembershipEntry> = self
            .store
            .list_retailers()
            .await?
            .iter()
            .filter_map(|retailer| {
                let location = retailer.location?;
                let d = distance(center, location);
                (d <= radius).then(|| geofence_entry(retailer, location, d, now))
            })
            .collect();

        self.commit_list(consumer_id, &HashSet::new(), &entries).await?;

        info!(
            "Initialized consumer {consumer_id} with {} retailer(s) within {radius} mi",
            entries.len()
        );
        Ok(entries)
    }

    /// Adds a newly registered retailer to every consumer whose geofence
    /// contains `location`. Consumers who previously removed this retailer
    /// by hand stay removed. Returns the consumers that were added.
    pub async fn initialize_retailer_list(
        &self,
        retailer_id: Uuid,
        location: Option<GeoPoint>,
    ) -> Result<Vec<Uuid>, AppError> {
        let retailer = self
            .store
            .get_retailer(retailer_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("retailer {retailer_id}")))?;
        let Some(location) = location else {
            debug!("Retailer {retailer_id} has no location; no consumers to add");
            return Ok(Vec::new());
        };

        let now = Utc::now();
        let mut added = Vec::new();
        for consumer in self.store.list_consumers().await? {
            let Some(center) = consumer.geofence_center else {
                continue;
            };
            let d = distance(center, location);
            if d > consumer.geofence_radius {
                continue;
            }

            let prior = self
                .store
                .consumer_entries(consumer.id)
                .await?
                .into_iter()
                .find(|e| e.retailer_id == retailer_id);
            if prior.as_ref().is_some_and(|e| e.manually_removed) {
                debug!(
                    "Consumer {} removed retailer {retailer_id} by hand; not re-adding",
                    consumer.id
                );
                continue;
            }

            let entry = geofence_entry(&retailer, location, d, now);
            self.commit_entry(consumer.id, &entry).await?;
            added.push(consumer.id);
        }

        info!(
            "Retailer {retailer_id} joined {} consumer list(s)",
            added.len()
        );
        Ok(added)
    }

    /// Persists the new geofence and rebuilds the consumer's list against it.
    /// A `None` center keeps the consumer's current center. Returns the active entries.
    pub async fn recompute_on_radius_change(
        &self,
        consumer_id: Uuid,
        new_center: Option<GeoPoint>,
        new_radius: f64,
    ) -> Result<Vec<MembershipEntry>, AppError> {
        let consumer = self.require_consumer(consumer_id).await?;
        let center = new_center.or(consumer.geofence_center);

        self.store
            .update_geofence(consumer_id, center, new_radius)
            .await?;

        let prior = self.store.consumer_entries(consumer_id).await?;
        let retailers = self.store.list_retailers().await?;
        let entries = recompute_entries(&prior, &retailers, center, new_radius, Utc::now());

        let prior_active: HashSet<Uuid> = prior
            .iter()
            .filter(|e| e.is_active())
            .map(|e| e.retailer_id)
            .collect();
        self.commit_list(consumer_id, &prior_active, &entries).await?;
        let active: Vec<MembershipEntry> =
            entries.into_iter().filter(MembershipEntry::is_active).collect();

        info!(
            "Recomputed consumer {consumer_id} at radius {new_radius} mi: {} active retailer(s)",
            active.len()
        );
        Ok(active)
    }

    /// Explicitly adds a retailer regardless of distance. Clears any prior manual removal.
    pub async fn manual_add(
        &self,
        consumer_id: Uuid,
        retailer_id: Uuid,
    ) -> Result<MembershipEntry, AppError> {
        let consumer = self.require_consumer(consumer_id).await?;
        let retailer = self
            .store
            .get_retailer(retailer_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("retailer {retailer_id}")))?;
        let location = retailer.location.ok_or_else(|| {
            AppError::NotFound(format!("retailer {retailer_id} has no location"))
        })?;

        let prior = self
            .store
            .consumer_entries(consumer_id)
            .await?
            .into_iter()
            .find(|e| e.retailer_id == retailer_id);
        if prior.as_ref().is_some_and(MembershipEntry::is_active) {
            return Err(AppError::Conflict(format!(
                "AlreadyActive: retailer {retailer_id} is already in consumer {consumer_id}'s list"
            )));
        }

        let d = consumer.geofence_center.map(|c| distance(c, location));
        let entry = MembershipEntry {
            retailer_id,
            retailer_name: retailer.name,
            retailer_location: location,
            distance: d,
            inside_geofence: d.is_some_and(|d| d <= consumer.geofence_radius),
            manually_added: true,
            manually_removed: false,
            joined_at: Utc::now(),
        };

        self.commit_entry(consumer_id, &entry).await?;

        info!("Consumer {consumer_id} manually added retailer {retailer_id}");
        Ok(entry)
    }

    /// Marks an active entry as removed. The removal survives radius changes
    /// and retailer re-registration until the consumer adds the retailer again.
    pub async fn manual_remove(
        &self,
        consumer_id: Uuid,
        retailer_id: Uuid,
    ) -> Result<MembershipEntry, AppError> {
        let mut entry = self
            .store
            .consumer_entries(consumer_id)
            .await?
            .into_iter()
            .find(|e| e.retailer_id == retailer_id && e.is_active())
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "retailer {retailer_id} is not in consumer {consumer_id}'s list"
                ))
            })?;

        entry.manually_removed = true;
        self.commit_entry(consumer_id, &entry).await?;

        info!("Consumer {consumer_id} manually removed retailer {retailer_id}");
        Ok(entry)
    }

    pub async fn get_active_entries(
        &self,
        consumer_id: Uuid,
    ) -> Result<Vec<MembershipEntry>, AppError> {
        self.require_consumer(consumer_id).await?;
        Ok(self
            .store
            .consumer_entries(consumer_id)
            .await?
            .into_iter()
            .filter(MembershipEntry::is_active)
            .collect())
    }

    /// Consumers currently indexed for the retailer. Reads the derived index.
    pub async fn eligible_consumers(&self, retailer_id: Uuid) -> Result<Vec<Uuid>, AppError> {
        Ok(self.store.retailer_consumers(retailer_id).await?)
    }

    async fn require_consumer(&self, consumer_id: Uuid) -> Result<Consumer, AppError> {
        self.store
            .get_consumer(consumer_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("consumer {consumer_id}")))
    }

    /// Writes the consumer's full list and brings the index in line with it.
    ///
    /// The mirrored path never detaches a retailer that stays active: only
    /// retailers in `prior_active` that dropped out are removed, and the adds
    /// are idempotent so they also repair earlier failed mirrors.
    async fn commit_list(
        &self,
        consumer_id: Uuid,
        prior_active: &HashSet<Uuid>,
        entries: &[MembershipEntry],
    ) -> Result<(), AppError> {
        if self.store.atomic_memberships() {
            self.store.replace_memberships(consumer_id, entries).await?;
            return Ok(());
        }

        self.store.replace_entries(consumer_id, entries).await?;
        let active: HashSet<Uuid> = entries
            .iter()
            .filter(|e| e.is_active())
            .map(|e| e.retailer_id)
            .collect();
        for retailer_id in prior_active.difference(&active) {
            self.mirror.remove(*retailer_id, consumer_id).await;
        }
        for entry in entries.iter().filter(|e| e.is_active()) {
            self.mirror.add(entry.retailer_id, consumer_id).await;
        }
        Ok(())
    }

    /// Writes one entry and adds or removes the matching index row.
    async fn commit_entry(
        &self,
        consumer_id: Uuid,
        entry: &MembershipEntry,
    ) -> Result<(), AppError> {
        if self.store.atomic_memberships() {
            self.store.upsert_membership(consumer_id, entry).await?;
            return Ok(());
        }

        self.store.upsert_entry(consumer_id, entry).await?;
        if entry.is_active() {
            self.mirror.add(entry.retailer_id, consumer_id).await;
        } else {
            self.mirror.remove(entry.retailer_id, consumer_id).await;
        }
        Ok(())
    }
}

fn geofence_entry(
    retailer: &Retailer,
    location: GeoPoint,
    distance: f64,
    joined_at: DateTime<Utc>,
) -> MembershipEntry {
    MembershipEntry {
        retailer_id: retailer.id,
        retailer_name: retailer.name.clone(),
        retailer_location: location,
        distance: Some(distance),
        inside_geofence: true,
        manually_added: false,
        manually_removed: false,
        joined_at,
    }
}

/// Next list for a consumer after a geofence change.
///
/// Prior entries keep their position, flags and join time:
/// - manually removed entries are kept as removed
/// - manually added entries are kept regardless of distance
/// - geofence entries are kept only while still inside the radius
///
/// Newly eligible retailers are appended in scan order. Without a center no
/// new retailers qualify.
pub(crate) fn recompute_entries(
    prior: &[MembershipEntry],
    retailers: &[Retailer],
    center: Option<GeoPoint>,
    radius: f64,
    now: DateTime<Utc>,
) -> Vec<MembershipEntry> {
    let located: HashMap<Uuid, (&Retailer, GeoPoint)> = retailers
        .iter()
        .filter_map(|r| r.location.map(|loc| (r.id, (r, loc))))
        .collect();
    let measure = |loc: GeoPoint| {
        let d = center.map(|c| distance(c, loc));
        (d, d.is_some_and(|d| d <= radius))
    };

    let mut next = Vec::with_capacity(prior.len());
    let mut seen = HashSet::new();
    for entry in prior {
        seen.insert(entry.retailer_id);
        let mut entry = entry.clone();
        if let Some((retailer, location)) = located.get(&entry.retailer_id) {
            let (d, inside) = measure(*location);
            entry.retailer_name = retailer.name.clone();
            entry.retailer_location = *location;
            entry.distance = d;
            entry.inside_geofence = inside;
        } else {
            entry.inside_geofence = false;
        }
        if entry.manually_removed || entry.manually_added || entry.inside_geofence {
            next.push(entry);
        }
    }

    for retailer in retailers {
        let Some(location) = retailer.location else {
            continue;
        };
        if seen.contains(&retailer.id) {
            continue;
        }
        if let (Some(d), true) = measure(location) {
            next.push(geofence_entry(retailer, location, d, now));
        }
    }
    next
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::time::Duration;

    pub(crate) fn test_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        }
    }

    pub(crate) struct Fixture {
        pub store: Arc<MemoryStore>,
        pub manager: MembershipManager,
    }

    impl Fixture {
        pub(crate) fn new() -> Self {
            let store = Arc::new(MemoryStore::new());
            let manager = MembershipManager::new(store.clone(), test_policy());
            Self { store, manager }
        }

        /// Store that writes the two sides separately, exercising the mirrored path.
        pub(crate) fn split_writes() -> Self {
            let store = Arc::new(MemoryStore::with_split_writes());
            let manager = MembershipManager::new(store.clone(), test_policy());
            Self { store, manager }
        }

        pub(crate) async fn retailer(&self, name: &str, lat: f64, lng: f64) -> Retailer {
            let retailer = Retailer::new(
                name.to_string(),
                "1 Main St".to_string(),
                Some(GeoPoint::new(lat, lng)),
            );
            self.store.insert_retailer(&retailer).await.unwrap();
            self.manager
                .initialize_retailer_list(retailer.id, retailer.location)
                .await
                .unwrap();
            retailer
        }

        pub(crate) async fn consumer(&self, lat: f64, lng: f64, radius: f64) -> Consumer {
            let consumer = Consumer::new(
                "Dana".to_string(),
                Some(GeoPoint::new(lat, lng)),
                radius,
            );
            self.store.insert_consumer(&consumer).await.unwrap();
            self.manager
                .initialize_consumer_list(consumer.id, consumer.geofence_center, radius)
                .await
                .unwrap();
            consumer
        }

        pub(crate) async fn active_ids(&self, consumer_id: Uuid) -> Vec<Uuid> {
            self.manager
                .get_active_entries(consumer_id)
                .await
                .unwrap()
                .iter()
                .map(|e| e.retailer_id)
                .collect()
        }

        pub(crate) async fn indexed(&self, retailer_id: Uuid) -> Vec<Uuid> {
            self.store.retailer_consumers(retailer_id).await.unwrap()
        }
    }

    #[tokio::test]
    async fn test_consumer_registration_picks_up_nearby_retailer() {
        let fx = Fixture::new();
        let near = fx.retailer("Corner Market", 40.03, -74.0).await; // 2.07 mi
        let far = fx.retailer("Far Grocer", 40.2, -74.0).await;

        let consumer = fx.consumer(40.0, -74.0, 3.0).await;

        let entries = fx.manager.get_active_entries(consumer.id).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].retailer_id, near.id);
        assert_eq!(entries[0].distance, Some(2.07));
        assert!(entries[0].inside_geofence);
        assert_eq!(fx.indexed(near.id).await, vec![consumer.id]);
        assert!(fx.indexed(far.id).await.is_empty());
    }

    #[tokio::test]
    async fn test_consumer_without_center_gets_empty_list() {
        let fx = Fixture::new();
        fx.retailer("Corner Market", 40.03, -74.0).await;

        let consumer = Consumer::new("Sam".to_string(), None, 5.0);
        fx.store.insert_consumer(&consumer).await.unwrap();
        let entries = fx
            .manager
            .initialize_consumer_list(consumer.id, None, 5.0)
            .await
            .unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_retailer_registration_reaches_existing_consumers() {
        let fx = Fixture::new();
        let inside = fx.consumer(40.0, -74.0, 3.0).await;
        let outside = fx.consumer(41.0, -74.0, 3.0).await;

        let retailer = fx.retailer("Corner Market", 40.03, -74.0).await;

        assert_eq!(fx.active_ids(inside.id).await, vec![retailer.id]);
        assert!(fx.active_ids(outside.id).await.is_empty());
        assert_eq!(fx.indexed(retailer.id).await, vec![inside.id]);
    }

    #[tokio::test]
    async fn test_retailer_without_location_is_noop() {
        let fx = Fixture::new();
        fx.consumer(40.0, -74.0, 3.0).await;
        let retailer = Retailer::new("Warehouse".to_string(), String::new(), None);
        fx.store.insert_retailer(&retailer).await.unwrap();

        let added = fx
            .manager
            .initialize_retailer_list(retailer.id, None)
            .await
            .unwrap();
        assert!(added.is_empty());
    }

    #[tokio::test]
    async fn test_manual_remove_survives_radius_growth() {
        let fx = Fixture::new();
        let retailer = fx.retailer("Corner Market", 40.03, -74.0).await;
        let consumer = fx.consumer(40.0, -74.0, 3.0).await;

        fx.manager.manual_remove(consumer.id, retailer.id).await.unwrap();
        assert!(fx.active_ids(consumer.id).await.is_empty());
        assert!(fx.indexed(retailer.id).await.is_empty());

        fx.manager
            .recompute_on_radius_change(consumer.id, None, 9.9)
            .await
            .unwrap();
        assert!(fx.active_ids(consumer.id).await.is_empty());
        assert!(fx.indexed(retailer.id).await.is_empty());

        let all = fx.store.consumer_entries(consumer.id).await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].manually_removed);
    }

    #[tokio::test]
    async fn test_manual_remove_survives_retailer_reregistration() {
        let fx = Fixture::new();
        let retailer = fx.retailer("Corner Market", 40.03, -74.0).await;
        let consumer = fx.consumer(40.0, -74.0, 3.0).await;
        fx.manager.manual_remove(consumer.id, retailer.id).await.unwrap();

        let added = fx
            .manager
            .initialize_retailer_list(retailer.id, retailer.location)
            .await
            .unwrap();
        assert!(added.is_empty());
        assert!(fx.active_ids(consumer.id).await.is_empty());
    }

    #[tokio::test]
    async fn test_manual_add_outside_radius_survives_shrink() {
        let fx = Fixture::new();
        let far = fx.retailer("Far Grocer", 40.1, -74.0).await; // ~6.9 mi
        let consumer = fx.consumer(40.0, -74.0, 3.0).await;
        assert!(fx.active_ids(consumer.id).await.is_empty());

        let entry = fx.manager.manual_add(consumer.id, far.id).await.unwrap();
        assert!(entry.manually_added);
        assert!(!entry.inside_geofence);
        assert_eq!(fx.indexed(far.id).await, vec![consumer.id]);

        fx.manager
            .recompute_on_radius_change(consumer.id, None, 0.5)
            .await
            .unwrap();
        assert_eq!(fx.active_ids(consumer.id).await, vec![far.id]);
        assert_eq!(fx.indexed(far.id).await, vec![consumer.id]);
    }

    #[tokio::test]
    async fn test_shrinking_radius_drops_geofence_entries() {
        let fx = Fixture::new();
        let near = fx.retailer("Corner Market", 40.03, -74.0).await;
        let mid = fx.retailer("Mid Market", 40.06, -74.0).await; // ~4.1 mi
        let consumer = fx.consumer(40.0, -74.0, 5.0).await;
        assert_eq!(fx.active_ids(consumer.id).await.len(), 2);

        let active = fx
            .manager
            .recompute_on_radius_change(consumer.id, None, 3.0)
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].retailer_id, near.id);
        assert!(fx.indexed(mid.id).await.is_empty());
        assert_eq!(fx.indexed(near.id).await, vec![consumer.id]);
    }

    #[tokio::test]
    async fn test_recompute_preserves_join_time() {
        let fx = Fixture::new();
        fx.retailer("Corner Market", 40.03, -74.0).await;
        let consumer = fx.consumer(40.0, -74.0, 3.0).await;
        let before = fx.manager.get_active_entries(consumer.id).await.unwrap();

        let after = fx
            .manager
            .recompute_on_radius_change(consumer.id, None, 4.0)
            .await
            .unwrap();
        assert_eq!(before[0].joined_at, after[0].joined_at);
    }

    #[tokio::test]
    async fn test_moving_center_updates_consumer_and_list() {
        let fx = Fixture::new();
        let old = fx.retailer("Old Town", 40.03, -74.0).await;
        let new = fx.retailer("New Town", 41.03, -74.0).await;
        let consumer = fx.consumer(40.0, -74.0, 3.0).await;

        fx.manager
            .recompute_on_radius_change(consumer.id, Some(GeoPoint::new(41.0, -74.0)), 3.0)
            .await
            .unwrap();

        assert_eq!(fx.active_ids(consumer.id).await, vec![new.id]);
        assert!(fx.indexed(old.id).await.is_empty());
        let stored = fx.store.get_consumer(consumer.id).await.unwrap().unwrap();
        assert_eq!(stored.geofence_center, Some(GeoPoint::new(41.0, -74.0)));
    }

    #[tokio::test]
    async fn test_manual_add_conflicts_when_already_active() {
        let fx = Fixture::new();
        let retailer = fx.retailer("Corner Market", 40.03, -74.0).await;
        let consumer = fx.consumer(40.0, -74.0, 3.0).await;

        let err = fx.manager.manual_add(consumer.id, retailer.id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_manual_add_after_removal_restores_entry() {
        let fx = Fixture::new();
        let retailer = fx.retailer("Corner Market", 40.03, -74.0).await;
        let consumer = fx.consumer(40.0, -74.0, 3.0).await;
        fx.manager.manual_remove(consumer.id, retailer.id).await.unwrap();

        let entry = fx.manager.manual_add(consumer.id, retailer.id).await.unwrap();
        assert!(entry.is_active());
        assert!(entry.manually_added);
        assert_eq!(fx.active_ids(consumer.id).await, vec![retailer.id]);
        assert_eq!(fx.store.consumer_entries(consumer.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_manual_add_unknown_or_unlocated_retailer() {
        let fx = Fixture::new();
        let consumer = fx.consumer(40.0, -74.0, 3.0).await;
        let err = fx
            .manager
            .manual_add(consumer.id, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let unlocated = Retailer::new("Warehouse".to_string(), String::new(), None);
        fx.store.insert_retailer(&unlocated).await.unwrap();
        let err = fx
            .manager
            .manual_add(consumer.id, unlocated.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_manual_remove_of_missing_entry_is_not_found() {
        let fx = Fixture::new();
        let retailer = fx.retailer("Corner Market", 40.03, -74.0).await;
        let consumer = fx.consumer(40.0, -74.0, 3.0).await;
        fx.manager.manual_remove(consumer.id, retailer.id).await.unwrap();

        let err = fx
            .manager
            .manual_remove(consumer.id, retailer.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_transient_mirror_failure_is_retried() {
        let fx = Fixture::split_writes();
        let retailer = fx.retailer("Corner Market", 40.03, -74.0).await;
        let consumer = Consumer::new("Lee".to_string(), Some(GeoPoint::new(40.0, -74.0)), 3.0);
        fx.store.insert_consumer(&consumer).await.unwrap();

        fx.store.fail_next_mirror_writes(2);
        fx.manager
            .initialize_consumer_list(consumer.id, consumer.geofence_center, 3.0)
            .await
            .unwrap();

        assert_eq!(fx.indexed(retailer.id).await, vec![consumer.id]);
        assert_eq!(fx.manager.mirror().unrecovered_failures(), 0);
    }

    #[tokio::test]
    async fn test_exhausted_mirror_keeps_primary_then_recompute_heals() {
        let fx = Fixture::split_writes();
        let retailer = fx.retailer("Corner Market", 40.03, -74.0).await;
        let consumer = Consumer::new("Lee".to_string(), Some(GeoPoint::new(40.0, -74.0)), 3.0);
        fx.store.insert_consumer(&consumer).await.unwrap();

        fx.store.fail_next_mirror_writes(3);
        fx.manager
            .initialize_consumer_list(consumer.id, consumer.geofence_center, 3.0)
            .await
            .unwrap();
        assert_eq!(fx.active_ids(consumer.id).await, vec![retailer.id]);
        assert!(fx.indexed(retailer.id).await.is_empty());
        assert_eq!(fx.manager.mirror().unrecovered_failures(), 1);

        fx.manager
            .recompute_on_radius_change(consumer.id, None, 3.0)
            .await
            .unwrap();
        assert_eq!(fx.indexed(retailer.id).await, vec![consumer.id]);
    }

    #[tokio::test]
    async fn test_mirrored_recompute_only_detaches_dropped_retailers() {
        let fx = Fixture::split_writes();
        let near = fx.retailer("Corner Market", 40.03, -74.0).await;
        let mid = fx.retailer("Mid Market", 40.06, -74.0).await;
        let consumer = fx.consumer(40.0, -74.0, 5.0).await;

        fx.manager
            .recompute_on_radius_change(consumer.id, None, 4.5)
            .await
            .unwrap();
        assert_eq!(fx.store.mirror_removals(), 0);
        assert_eq!(fx.indexed(near.id).await, vec![consumer.id]);

        fx.manager
            .recompute_on_radius_change(consumer.id, None, 3.0)
            .await
            .unwrap();
        assert_eq!(fx.store.mirror_removals(), 1);
        assert!(fx.indexed(mid.id).await.is_empty());
        assert_eq!(fx.indexed(near.id).await, vec![consumer.id]);
    }

    #[tokio::test]
    async fn test_atomic_store_commits_both_sides_without_mirroring() {
        let fx = Fixture::new();
        let retailer = fx.retailer("Corner Market", 40.03, -74.0).await;
        let consumer = Consumer::new("Lee".to_string(), Some(GeoPoint::new(40.0, -74.0)), 3.0);
        fx.store.insert_consumer(&consumer).await.unwrap();

        fx.store.fail_next_mirror_writes(5);
        fx.manager
            .initialize_consumer_list(consumer.id, consumer.geofence_center, 3.0)
            .await
            .unwrap();
        fx.manager
            .recompute_on_radius_change(consumer.id, None, 4.0)
            .await
            .unwrap();
        fx.manager.manual_remove(consumer.id, retailer.id).await.unwrap();
        assert!(fx.indexed(retailer.id).await.is_empty());
        fx.manager.manual_add(consumer.id, retailer.id).await.unwrap();

        assert_eq!(fx.indexed(retailer.id).await, vec![consumer.id]);
        assert_eq!(fx.store.mirror_removals(), 0);
        assert_eq!(fx.manager.mirror().unrecovered_failures(), 0);
        // Injected failures only hit the standalone index writes.
        assert!(fx
            .store
            .add_retailer_consumer(retailer.id, consumer.id)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_retailer_exactly_on_radius_is_inside() {
        let fx = Fixture::new();
        let retailer = fx.retailer("Corner Market", 40.03, -74.0).await;

        let consumer = fx.consumer(40.0, -74.0, 2.07).await;

        let entries = fx.manager.get_active_entries(consumer.id).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].distance, Some(2.07));
        assert!(entries[0].inside_geofence);
        assert_eq!(fx.indexed(retailer.id).await, vec![consumer.id]);
        assert_eq!(
            fx.manager.eligible_consumers(retailer.id).await.unwrap(),
            vec![consumer.id]
        );
    }

    #[test]
    fn test_recompute_without_center_keeps_only_manual_entries() {
        let now = Utc::now();
        let retailer = Retailer::new(
            "Corner Market".to_string(),
            String::new(),
            Some(GeoPoint::new(40.03, -74.0)),
        );
        let geofenced = geofence_entry(&retailer, GeoPoint::new(40.03, -74.0), 2.07, now);
        let mut manual = geofenced.clone();
        manual.retailer_id = Uuid::new_v4();
        manual.manually_added = true;

        let next = recompute_entries(&[geofenced, manual.clone()], &[retailer], None, 5.0, now);
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].retailer_id, manual.retailer_id);
        assert!(!next[0].inside_geofence);
    }
}
