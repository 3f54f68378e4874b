use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;

/// One retailer in a consumer's retailer list. At most one entry per retailer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MembershipEntry {
    pub retailer_id: Uuid,
    pub retailer_name: String,
    pub retailer_location: GeoPoint,
    /// Miles from the consumer's geofence center; `None` when the consumer has no center.
    pub distance: Option<f64>,
    pub inside_geofence: bool,
    pub manually_added: bool,
    pub manually_removed: bool,
    pub joined_at: DateTime<Utc>,
}

impl MembershipEntry {
    /// Removal outranks geofence eligibility and manual adds.
    pub fn is_active(&self) -> bool {
        !self.manually_removed
    }
}
