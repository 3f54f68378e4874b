use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::categorizer::{Attributes, Categorization, Category};

/// A consumer's saved item preference, decomposed at creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Favorite {
    pub id: Uuid,
    pub consumer_id: Uuid,
    pub raw_input: String,
    pub brand: Option<String>,
    pub generic: String,
    pub has_brand: bool,
    pub category: Category,
    pub keywords: Vec<String>,
    pub brand_keywords: Vec<String>,
    pub generic_keywords: Vec<String>,
    pub attributes: Attributes,
    /// `None` for explicit adds; set when the purchase-history job added it.
    pub auto_added_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Favorite {
    pub fn from_categorization(
        consumer_id: Uuid,
        raw_input: &str,
        categorization: Categorization,
        auto_added_date: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            consumer_id,
            raw_input: raw_input.trim().to_string(),
            brand: categorization.brand,
            generic: categorization.generic,
            has_brand: categorization.has_brand,
            category: categorization.category,
            keywords: categorization.keywords,
            brand_keywords: categorization.brand_keywords,
            generic_keywords: categorization.generic_keywords,
            attributes: categorization.attributes,
            auto_added_date,
            created_at: Utc::now(),
        }
    }

    pub fn same_input(&self, raw_input: &str) -> bool {
        self.raw_input.trim().to_lowercase() == raw_input.trim().to_lowercase()
    }
}
