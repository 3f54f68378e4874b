use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;

/// A retailer ("DRLP"). Only retailers with a location take part in geographic lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Retailer {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub location: Option<GeoPoint>,
    pub created_at: DateTime<Utc>,
}

impl Retailer {
    pub fn new(name: String, address: String, location: Option<GeoPoint>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            address,
            location,
            created_at: Utc::now(),
        }
    }
}
