//! Discount level → percentage mapping.
//!
//! Retailers pick a level; the consumer-facing discount is lower than the
//! retailer-side one, the difference being the platform's share.

use crate::errors::AppError;
use crate::geo::round2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiscountTier {
    pub level: u8,
    pub retailer_percent: f64,
    pub consumer_percent: f64,
}

const TIERS: [DiscountTier; 3] = [
    DiscountTier {
        level: 1,
        retailer_percent: 60.0,
        consumer_percent: 50.0,
    },
    DiscountTier {
        level: 2,
        retailer_percent: 75.0,
        consumer_percent: 60.0,
    },
    DiscountTier {
        level: 3,
        retailer_percent: 90.0,
        consumer_percent: 75.0,
    },
];

pub fn tier_for_level(level: u8) -> Result<DiscountTier, AppError> {
    TIERS
        .iter()
        .copied()
        .find(|t| t.level == level)
        .ok_or_else(|| {
            AppError::Validation(format!("discount_level must be 1, 2 or 3, got {level}"))
        })
}

pub fn deal_price(regular_price: f64, consumer_percent: f64) -> f64 {
    round2(regular_price * (1.0 - consumer_percent / 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_map_to_percentages() {
        let percents: Vec<(f64, f64)> = (1..=3)
            .map(|l| {
                let t = tier_for_level(l).unwrap();
                (t.consumer_percent, t.retailer_percent)
            })
            .collect();
        assert_eq!(percents, vec![(50.0, 60.0), (60.0, 75.0), (75.0, 90.0)]);
    }

    #[test]
    fn test_unknown_level_rejected() {
        assert!(matches!(tier_for_level(0), Err(AppError::Validation(_))));
        assert!(matches!(tier_for_level(4), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_deal_price_rounds_to_cents() {
        assert_eq!(deal_price(4.0, 50.0), 2.0);
        assert_eq!(deal_price(5.98, 60.0), 2.39);
        assert_eq!(deal_price(3.33, 75.0), 0.83);
        assert_eq!(deal_price(0.0, 60.0), 0.0);
    }
}
