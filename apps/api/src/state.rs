use std::sync::Arc;

use crate::categorizer::Categorizer;
use crate::delivery::DeliveryFanout;
use crate::matching::NotificationMatcher;
use crate::membership::{MembershipManager, RetryPolicy};
use crate::store::Store;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    /// Keyword table plus the optional LLM fallback, built once at startup.
    pub categorizer: Categorizer,
    /// Sole writer of both membership lists.
    pub memberships: MembershipManager,
    pub matcher: NotificationMatcher,
    pub fanout: Arc<DeliveryFanout>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        categorizer: Categorizer,
        retry: RetryPolicy,
        live_channel_capacity: usize,
    ) -> Self {
        let fanout = Arc::new(DeliveryFanout::new(live_channel_capacity));
        let memberships = MembershipManager::new(store.clone(), retry);
        Self {
            matcher: NotificationMatcher::new(memberships.clone(), store.clone(), fanout.clone()),
            memberships,
            store,
            categorizer,
            fanout,
        }
    }
}
