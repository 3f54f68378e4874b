use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::geo::GeoPoint;

pub const MIN_RADIUS: f64 = 0.1;
pub const MAX_RADIUS: f64 = 9.9;
pub const DEFAULT_RADIUS: f64 = 5.0;
/// Purchase-history auto-favoriting: off, or on after 3 or 6 separate purchase days.
pub const AUTO_ADD_THRESHOLDS: [u8; 3] = [0, 3, 6];

/// A deal consumer ("DAC") and their geofence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consumer {
    pub id: Uuid,
    pub name: String,
    pub geofence_center: Option<GeoPoint>,
    pub geofence_radius: f64,
    pub auto_add_threshold: u8,
    pub created_at: DateTime<Utc>,
}

impl Consumer {
    pub fn new(name: String, geofence_center: Option<GeoPoint>, geofence_radius: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            geofence_center,
            geofence_radius,
            auto_add_threshold: 0,
            created_at: Utc::now(),
        }
    }
}

pub fn validate_radius(radius: f64) -> Result<f64, AppError> {
    if !radius.is_finite() || !(MIN_RADIUS..=MAX_RADIUS).contains(&radius) {
        return Err(AppError::Validation(format!(
            "geofence radius must be between {MIN_RADIUS} and {MAX_RADIUS} miles, got {radius}"
        )));
    }
    Ok(radius)
}

pub fn validate_center(center: GeoPoint) -> Result<GeoPoint, AppError> {
    if !center.is_valid() {
        return Err(AppError::Validation(format!(
            "coordinates out of range: lat={}, lng={}",
            center.lat, center.lng
        )));
    }
    Ok(center)
}

pub fn validate_auto_add_threshold(threshold: u8) -> Result<u8, AppError> {
    if !AUTO_ADD_THRESHOLDS.contains(&threshold) {
        return Err(AppError::Validation(format!(
            "auto_add_threshold must be one of 0, 3 or 6, got {threshold}"
        )));
    }
    Ok(threshold)
}
