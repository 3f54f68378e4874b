//! In-process store backed by tokio `RwLock`ed maps. Used by tests and `STORE=memory` runs.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::categorizer::Category;
use crate::geo::GeoPoint;
use crate::models::{Consumer, DealItem, Favorite, MembershipEntry, Notification, Retailer};
use crate::store::{Store, StoreError};

#[derive(Default)]
struct MemoryState {
    consumers: HashMap<Uuid, Consumer>,
    retailers: HashMap<Uuid, Retailer>,
    consumer_entries: HashMap<Uuid, Vec<MembershipEntry>>,
    retailer_consumers: HashMap<Uuid, BTreeSet<Uuid>>,
    favorites: HashMap<Uuid, Vec<Favorite>>,
    deals: HashMap<Uuid, DealItem>,
    notifications: HashMap<Uuid, Vec<Notification>>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    /// Number of upcoming retailer-side writes that fail with `Unavailable`.
    mirror_failures: AtomicU32,
    failing_favorite_reads: Mutex<HashSet<Uuid>>,
    /// Reports non-atomic membership writes, so callers take the mirrored path.
    split_writes: bool,
    /// Retailer-side single-row removals performed so far.
    mirror_removals: AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with_split_writes() -> Self {
        Self {
            split_writes: true,
            ..Self::default()
        }
    }

    #[cfg(test)]
    pub fn mirror_removals(&self) -> u32 {
        self.mirror_removals.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub fn fail_next_mirror_writes(&self, count: u32) {
        self.mirror_failures.store(count, Ordering::SeqCst);
    }

    #[cfg(test)]
    pub fn fail_favorite_reads_for(&self, consumer_id: Uuid) {
        if let Ok(mut failing) = self.failing_favorite_reads.lock() {
            failing.insert(consumer_id);
        }
    }

    fn injected_mirror_failure(&self) -> Result<(), StoreError> {
        let consumed = self
            .mirror_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match consumed {
            Ok(_) => Err(StoreError::Unavailable(
                "injected retailer-list write failure".to_string(),
            )),
            Err(_) => Ok(()),
        }
    }

    fn injected_favorite_failure(&self, consumer_id: Uuid) -> Result<(), StoreError> {
        let failing = self
            .failing_favorite_reads
            .lock()
            .map(|f| f.contains(&consumer_id))
            .unwrap_or(false);
        if failing {
            return Err(StoreError::Unavailable(format!(
                "injected favorites read failure for {consumer_id}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_consumer(&self, consumer: &Consumer) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.consumers.insert(consumer.id, consumer.clone());
        Ok(())
    }

    async fn get_consumer(&self, id: Uuid) -> Result<Option<Consumer>, StoreError> {
        Ok(self.state.read().await.consumers.get(&id).cloned())
    }

    async fn update_geofence(
        &self,
        id: Uuid,
        center: Option<GeoPoint>,
        radius: f64,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if let Some(consumer) = state.consumers.get_mut(&id) {
            consumer.geofence_center = center;
            consumer.geofence_radius = radius;
        }
        Ok(())
    }

    async fn list_consumers(&self) -> Result<Vec<Consumer>, StoreError> {
        let state = self.state.read().await;
        let mut consumers: Vec<Consumer> = state.consumers.values().cloned().collect();
        consumers.sort_by_key(|c| (c.created_at, c.id));
        Ok(consumers)
    }

    async fn insert_retailer(&self, retailer: &Retailer) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.retailers.insert(retailer.id, retailer.clone());
        Ok(())
    }

    async fn get_retailer(&self, id: Uuid) -> Result<Option<Retailer>, StoreError> {
        Ok(self.state.read().await.retailers.get(&id).cloned())
    }

    async fn list_retailers(&self) -> Result<Vec<Retailer>, StoreError> {
        let state = self.state.read().await;
        let mut retailers: Vec<Retailer> = state.retailers.values().cloned().collect();
        retailers.sort_by_key(|r| (r.created_at, r.id));
        Ok(retailers)
    }

    async fn consumer_entries(
        &self,
        consumer_id: Uuid,
    ) -> Result<Vec<MembershipEntry>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .consumer_entries
            .get(&consumer_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn upsert_entry(
        &self,
        consumer_id: Uuid,
        entry: &MembershipEntry,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let entries = state.consumer_entries.entry(consumer_id).or_default();
        match entries.iter_mut().find(|e| e.retailer_id == entry.retailer_id) {
            Some(existing) => *existing = entry.clone(),
            None => entries.push(entry.clone()),
        }
        Ok(())
    }

    async fn replace_entries(
        &self,
        consumer_id: Uuid,
        entries: &[MembershipEntry],
    ) -> Result<(), StoreError> {
        let mut deduped: Vec<MembershipEntry> = Vec::with_capacity(entries.len());
        for entry in entries {
            match deduped.iter_mut().find(|e| e.retailer_id == entry.retailer_id) {
                Some(existing) => *existing = entry.clone(),
                None => deduped.push(entry.clone()),
            }
        }
        let mut state = self.state.write().await;
        state.consumer_entries.insert(consumer_id, deduped);
        Ok(())
    }

    fn atomic_memberships(&self) -> bool {
        !self.split_writes
    }

    async fn replace_memberships(
        &self,
        consumer_id: Uuid,
        entries: &[MembershipEntry],
    ) -> Result<(), StoreError> {
        let mut deduped: Vec<MembershipEntry> = Vec::with_capacity(entries.len());
        for entry in entries {
            match deduped.iter_mut().find(|e| e.retailer_id == entry.retailer_id) {
                Some(existing) => *existing = entry.clone(),
                None => deduped.push(entry.clone()),
            }
        }
        let active: HashSet<Uuid> = deduped
            .iter()
            .filter(|e| e.is_active())
            .map(|e| e.retailer_id)
            .collect();

        let mut state = self.state.write().await;
        for (retailer_id, set) in state.retailer_consumers.iter_mut() {
            if !active.contains(retailer_id) {
                set.remove(&consumer_id);
            }
        }
        for retailer_id in &active {
            state
                .retailer_consumers
                .entry(*retailer_id)
                .or_default()
                .insert(consumer_id);
        }
        state.consumer_entries.insert(consumer_id, deduped);
        Ok(())
    }

    async fn upsert_membership(
        &self,
        consumer_id: Uuid,
        entry: &MembershipEntry,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let entries = state.consumer_entries.entry(consumer_id).or_default();
        match entries.iter_mut().find(|e| e.retailer_id == entry.retailer_id) {
            Some(existing) => *existing = entry.clone(),
            None => entries.push(entry.clone()),
        }
        let index = state.retailer_consumers.entry(entry.retailer_id).or_default();
        if entry.is_active() {
            index.insert(consumer_id);
        } else {
            index.remove(&consumer_id);
        }
        Ok(())
    }

    async fn retailer_consumers(&self, retailer_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .retailer_consumers
            .get(&retailer_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn add_retailer_consumer(
        &self,
        retailer_id: Uuid,
        consumer_id: Uuid,
    ) -> Result<(), StoreError> {
        self.injected_mirror_failure()?;
        let mut state = self.state.write().await;
        state
            .retailer_consumers
            .entry(retailer_id)
            .or_default()
            .insert(consumer_id);
        Ok(())
    }

    async fn remove_retailer_consumer(
        &self,
        retailer_id: Uuid,
        consumer_id: Uuid,
    ) -> Result<(), StoreError> {
        self.injected_mirror_failure()?;
        self.mirror_removals.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.write().await;
        if let Some(set) = state.retailer_consumers.get_mut(&retailer_id) {
            set.remove(&consumer_id);
        }
        Ok(())
    }

    async fn replace_retailer_consumers(
        &self,
        retailer_id: Uuid,
        consumer_ids: &[Uuid],
    ) -> Result<(), StoreError> {
        self.injected_mirror_failure()?;
        let mut state = self.state.write().await;
        state
            .retailer_consumers
            .insert(retailer_id, consumer_ids.iter().copied().collect());
        Ok(())
    }

    async fn insert_favorite(&self, favorite: &Favorite) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let favorites = state.favorites.entry(favorite.consumer_id).or_default();
        if favorites.iter().any(|f| f.same_input(&favorite.raw_input)) {
            return Err(StoreError::Duplicate(format!(
                "favorite '{}' for consumer {}",
                favorite.raw_input, favorite.consumer_id
            )));
        }
        favorites.push(favorite.clone());
        Ok(())
    }

    async fn list_favorites(&self, consumer_id: Uuid) -> Result<Vec<Favorite>, StoreError> {
        let state = self.state.read().await;
        Ok(state.favorites.get(&consumer_id).cloned().unwrap_or_default())
    }

    async fn favorites_in_category(
        &self,
        consumer_id: Uuid,
        category: Category,
    ) -> Result<Vec<Favorite>, StoreError> {
        self.injected_favorite_failure(consumer_id)?;
        let state = self.state.read().await;
        Ok(state
            .favorites
            .get(&consumer_id)
            .map(|favs| {
                favs.iter()
                    .filter(|f| f.category == category)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn delete_favorite(
        &self,
        consumer_id: Uuid,
        favorite_id: Uuid,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let Some(favorites) = state.favorites.get_mut(&consumer_id) else {
            return Ok(false);
        };
        let before = favorites.len();
        favorites.retain(|f| f.id != favorite_id);
        Ok(favorites.len() < before)
    }

    async fn insert_deal(&self, deal: &DealItem) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.deals.insert(deal.id, deal.clone());
        Ok(())
    }

    async fn get_deal(&self, id: Uuid) -> Result<Option<DealItem>, StoreError> {
        Ok(self.state.read().await.deals.get(&id).cloned())
    }

    async fn insert_notification(&self, notification: &Notification) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state
            .notifications
            .entry(notification.consumer_id)
            .or_default()
            .push(notification.clone());
        Ok(())
    }

    async fn list_notifications(
        &self,
        consumer_id: Uuid,
    ) -> Result<Vec<Notification>, StoreError> {
        let state = self.state.read().await;
        let mut notifications = state
            .notifications
            .get(&consumer_id)
            .cloned()
            .unwrap_or_default();
        notifications.reverse();
        Ok(notifications)
    }

    async fn mark_notification_read(
        &self,
        consumer_id: Uuid,
        notification_id: Uuid,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let found = state
            .notifications
            .get_mut(&consumer_id)
            .and_then(|list| list.iter_mut().find(|n| n.id == notification_id))
            .map(|n| n.read = true)
            .is_some();
        Ok(found)
    }
}
