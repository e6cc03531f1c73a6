//! Activity event and baseline models.

use safehome_core::activity::ActivityEventType;
use safehome_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `activity_events` table.
///
/// `event_type` stays as reported so unknown kinds survive persistence.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ActivityEvent {
    pub id: DbId,
    pub hub_id: DbId,
    pub device_id: Option<DbId>,
    pub event_type: String,
    pub room_name: Option<String>,
    pub sensor_data: serde_json::Value,
    pub is_anomaly: bool,
    pub anomaly_score: f64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ActivityEvent {
    /// The typed event kind, if the hub reported a known one.
    pub fn kind(&self) -> Option<ActivityEventType> {
        self.event_type.parse().ok()
    }
}

/// Insert DTO for a classified event.
#[derive(Debug, Clone)]
pub struct CreateActivityEvent {
    pub hub_id: DbId,
    pub device_id: Option<DbId>,
    pub event_type: String,
    pub room_name: Option<String>,
    pub sensor_data: serde_json::Value,
    pub is_anomaly: bool,
    pub anomaly_score: f64,
    /// Event time as reported by the hub.
    pub created_at: Timestamp,
}

/// A row from the `activity_baselines` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ActivityBaseline {
    pub id: DbId,
    pub hub_id: DbId,
    pub day_of_week: i16,
    pub hour_of_day: i16,
    pub room_name: Option<String>,
    pub avg_motion_events: f64,
    pub std_motion_events: f64,
    pub sample_count: i32,
    pub last_updated: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
