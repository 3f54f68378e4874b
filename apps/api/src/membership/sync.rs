//! Mirrored writes to the Retailer-Consumer-List.
//!
//! The consumer-side list is written first; the retailer-side index is a
//! must-complete follow-up retried with exponential backoff. If every attempt
//! fails the primary write is kept and the failure is logged: the index is
//! briefly missing a consumer until the next recompute or reconcile heals it.
//! Used only when the store cannot commit both sides in one unit.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, warn};
use uuid::Uuid;

use crate::store::{Store, StoreError};

const MAX_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): base, 2×base, 4×base, … capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(factor).min(MAX_BACKOFF)
    }
}

/// Runs `op` until it succeeds or the policy's attempts are exhausted.
pub async fn retry_with_backoff<F, Fut>(
    policy: RetryPolicy,
    what: &str,
    mut op: F,
) -> Result<(), StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), StoreError>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(()) => return Ok(()),
            Err(e) if attempt >= policy.max_attempts => return Err(e),
            Err(e) => {
                let delay = policy.backoff(attempt);
                warn!(
                    "{what} failed (attempt {attempt}/{}): {e}; retrying in {}ms",
                    policy.max_attempts,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Retried retailer-side writes for stores without atomic membership commits.
#[derive(Clone)]
pub struct MirrorSync {
    store: Arc<dyn Store>,
    policy: RetryPolicy,
    unrecovered: Arc<AtomicU64>,
}

impl MirrorSync {
    pub fn new(store: Arc<dyn Store>, policy: RetryPolicy) -> Self {
        Self {
            store,
            policy,
            unrecovered: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Mirrored writes that exhausted their retries since startup.
    pub fn unrecovered_failures(&self) -> u64 {
        self.unrecovered.load(Ordering::Relaxed)
    }

    pub async fn add(&self, retailer_id: Uuid, consumer_id: Uuid) -> bool {
        let what = format!("mirror add consumer {consumer_id} -> retailer {retailer_id}");
        let result = retry_with_backoff(self.policy, &what, || {
            self.store.add_retailer_consumer(retailer_id, consumer_id)
        })
        .await;
        self.settle(&what, result)
    }

    pub async fn remove(&self, retailer_id: Uuid, consumer_id: Uuid) -> bool {
        let what = format!("mirror remove consumer {consumer_id} from retailer {retailer_id}");
        let result = retry_with_backoff(self.policy, &what, || {
            self.store.remove_retailer_consumer(retailer_id, consumer_id)
        })
        .await;
        self.settle(&what, result)
    }

    pub async fn replace(&self, retailer_id: Uuid, consumer_ids: &[Uuid]) -> bool {
        let what = format!("rebuild consumer list of retailer {retailer_id}");
        let result = retry_with_backoff(self.policy, &what, || {
            self.store.replace_retailer_consumers(retailer_id, consumer_ids)
        })
        .await;
        self.settle(&what, result)
    }

    fn settle(&self, what: &str, result: Result<(), StoreError>) -> bool {
        match result {
            Ok(()) => true,
            Err(e) => {
                self.unrecovered.fetch_add(1, Ordering::Relaxed);
                error!(
                    "SYNC FAILURE: {what} gave up after {} attempts: {e}. \
                     Consumer-side list kept; retailer list is stale until the next recompute or reconcile.",
                    self.policy.max_attempts
                );
                false
            }
        }
    }
}
