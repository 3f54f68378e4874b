use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::categorizer::{Attributes, Category};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealStatus {
    Available,
    SoldOut,
}

impl DealStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DealStatus::Available => "available",
            DealStatus::SoldOut => "sold_out",
        }
    }

    pub fn parse(s: &str) -> Option<DealStatus> {
        match s {
            "available" => Some(DealStatus::Available),
            "sold_out" => Some(DealStatus::SoldOut),
            _ => None,
        }
    }
}

/// A retailer-posted surplus-discount item ("RSHD").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealItem {
    pub id: Uuid,
    pub retailer_id: Uuid,
    pub retailer_name: String,
    pub name: String,
    pub description: String,
    pub category: Category,
    pub attributes: Attributes,
    pub regular_price: f64,
    pub discount_level: u8,
    pub retailer_discount_percent: f64,
    pub consumer_discount_percent: f64,
    pub deal_price: f64,
    pub quantity: i32,
    pub status: DealStatus,
    pub posted_at: DateTime<Utc>,
}
