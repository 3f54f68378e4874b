//! Notification Matcher: decides which eligible consumers hear about a new
//! deal item, persists one notification each, then hands them to the fanout.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::delivery::{DeliveryFanout, DeliveryReport};
use crate::errors::AppError;
use crate::matching::rules::favorite_matches;
use crate::membership::MembershipManager;
use crate::models::{DealItem, Notification};
use crate::store::Store;

#[derive(Debug, Clone, Serialize)]
pub struct MatchOutcome {
    pub eligible: usize,
    pub notifications: Vec<Notification>,
    /// Consumers skipped because their favorites or notification could not be
    /// read or written.
    pub failed: usize,
    pub delivery: DeliveryReport,
}

#[derive(Clone)]
pub struct NotificationMatcher {
    memberships: MembershipManager,
    store: Arc<dyn Store>,
    fanout: Arc<DeliveryFanout>,
}

pub fn notification_message(deal: &DealItem) -> String {
    format!(
        "New deal on {} - {:.0}% off at {}!",
        deal.name, deal.consumer_discount_percent, deal.retailer_name
    )
}

impl NotificationMatcher {
    pub fn new(
        memberships: MembershipManager,
        store: Arc<dyn Store>,
        fanout: Arc<DeliveryFanout>,
    ) -> Self {
        Self {
            memberships,
            store,
            fanout,
        }
    }

    /// Runs once per newly created deal item.
    pub async fn match_and_notify(&self, deal: &DealItem) -> Result<MatchOutcome, AppError> {
        let mut seen = HashSet::new();
        let eligible: Vec<Uuid> = self
            .memberships
            .eligible_consumers(deal.retailer_id)
            .await?
            .into_iter()
            .filter(|id| seen.insert(*id))
            .collect();

        let item_name = deal.name.to_lowercase();
        let mut notifications = Vec::new();
        let mut failed = 0;

        for &consumer_id in &eligible {
            let matched = match self.first_matching_favorite(consumer_id, deal, &item_name).await {
                Ok(matched) => matched,
                Err(e) => {
                    warn!("Skipping consumer {consumer_id} for deal {}: {e}", deal.id);
                    failed += 1;
                    continue;
                }
            };
            let Some(favorite_id) = matched else {
                continue;
            };

            let notification = Notification {
                id: Uuid::new_v4(),
                consumer_id,
                deal_id: deal.id,
                message: notification_message(deal),
                read: false,
                created_at: Utc::now(),
            };
            if let Err(e) = self.store.insert_notification(&notification).await {
                warn!("Failed to store notification for consumer {consumer_id}: {e}");
                failed += 1;
                continue;
            }
            info!(
                "Consumer {consumer_id} notified of deal {} via favorite {favorite_id}",
                deal.id
            );
            notifications.push(notification);
        }

        let delivery = self.fanout.deliver(&notifications, deal).await;
        info!(
            "Deal {} ({}): {} eligible, {} notified, {} failed",
            deal.id,
            deal.category,
            eligible.len(),
            notifications.len(),
            failed
        );

        Ok(MatchOutcome {
            eligible: eligible.len(),
            notifications,
            failed,
            delivery,
        })
    }

    /// First favorite in list order that selects the deal. Malformed
    /// favorites are skipped so the rest of the consumer's list still counts.
    async fn first_matching_favorite(
        &self,
        consumer_id: Uuid,
        deal: &DealItem,
        item_name: &str,
    ) -> Result<Option<Uuid>, AppError> {
        let favorites = self
            .store
            .favorites_in_category(consumer_id, deal.category)
            .await?;
        for favorite in &favorites {
            match favorite_matches(favorite, item_name, &deal.attributes) {
                Ok(true) => return Ok(Some(favorite.id)),
                Ok(false) => {}
                Err(e) => warn!("Consumer {consumer_id}: {e}"),
            }
        }
        Ok(None)
    }
}
