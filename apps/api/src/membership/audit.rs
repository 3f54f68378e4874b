//! Divergence detection and repair between the two list sides.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::membership::MembershipManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DivergenceKind {
    /// Active on the consumer side, absent from the retailer index.
    MissingFromRetailer,
    /// In the retailer index without an active consumer-side entry.
    StaleInRetailer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Divergence {
    pub consumer_id: Uuid,
    pub retailer_id: Uuid,
    pub kind: DivergenceKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    pub retailers_rebuilt: usize,
    pub retailers_failed: usize,
    pub memberships: usize,
    pub divergences_before: usize,
}

impl MembershipManager {
    /// Expected retailer index derived from every consumer's active entries.
    async fn expected_index(&self) -> Result<BTreeMap<Uuid, BTreeSet<Uuid>>, AppError> {
        let store = self.store();
        let mut expected: BTreeMap<Uuid, BTreeSet<Uuid>> = store
            .list_retailers()
            .await?
            .into_iter()
            .map(|r| (r.id, BTreeSet::new()))
            .collect();
        for consumer in store.list_consumers().await? {
            for entry in store.consumer_entries(consumer.id).await? {
                if entry.is_active() {
                    expected
                        .entry(entry.retailer_id)
                        .or_default()
                        .insert(consumer.id);
                }
            }
        }
        Ok(expected)
    }

    pub async fn find_divergences(&self) -> Result<Vec<Divergence>, AppError> {
        let mut divergences = Vec::new();
        for (retailer_id, expected) in self.expected_index().await? {
            let actual: BTreeSet<Uuid> = self
                .store()
                .retailer_consumers(retailer_id)
                .await?
                .into_iter()
                .collect();
            divergences.extend(expected.difference(&actual).map(|&consumer_id| Divergence {
                consumer_id,
                retailer_id,
                kind: DivergenceKind::MissingFromRetailer,
            }));
            divergences.extend(actual.difference(&expected).map(|&consumer_id| Divergence {
                consumer_id,
                retailer_id,
                kind: DivergenceKind::StaleInRetailer,
            }));
        }
        if !divergences.is_empty() {
            warn!("Found {} list divergence(s)", divergences.len());
        }
        Ok(divergences)
    }

    /// Rebuilds every retailer's index from the consumer side.
    pub async fn reconcile_all(&self) -> Result<ReconcileReport, AppError> {
        let divergences_before = self.find_divergences().await?.len();
        let expected = self.expected_index().await?;

        let mut report = ReconcileReport {
            retailers_rebuilt: 0,
            retailers_failed: 0,
            memberships: 0,
            divergences_before,
        };
        for (retailer_id, consumers) in expected {
            let consumers: Vec<Uuid> = consumers.into_iter().collect();
            if self.mirror().replace(retailer_id, &consumers).await {
                report.retailers_rebuilt += 1;
                report.memberships += consumers.len();
            } else {
                report.retailers_failed += 1;
            }
        }

        info!(
            "Reconciled {} retailer list(s) ({} membership(s), {} failed, {} divergence(s) repaired)",
            report.retailers_rebuilt,
            report.memberships,
            report.retailers_failed,
            report.divergences_before
        );
        Ok(report)
    }
}
