//! Hub and device models.

use safehome_core::hub_config::HubConfig;
use safehome_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `hubs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Hub {
    pub id: DbId,
    /// Resident the hub is installed for.
    pub user_id: Option<DbId>,
    pub serial_number: String,
    pub name: Option<String>,
    pub status: String,
    pub firmware_version: Option<String>,
    pub battery_level: Option<i32>,
    pub is_on_battery: bool,
    pub wifi_strength: Option<i32>,
    pub last_seen_at: Option<Timestamp>,
    pub configuration: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Hub {
    pub fn config(&self) -> HubConfig {
        HubConfig::from_json(&self.configuration)
    }
}

/// DTO for a hub status report.
#[derive(Debug, Clone)]
pub struct UpdateHubStatus {
    pub status: String,
    pub firmware_version: Option<String>,
    pub battery_level: Option<i32>,
    pub is_on_battery: bool,
    pub wifi_strength: Option<i32>,
    pub seen_at: Timestamp,
}

/// Result of applying a status report: the status before and after.
#[derive(Debug, Clone, FromRow)]
pub struct HubStatusChange {
    pub hub_id: DbId,
    pub user_id: Option<DbId>,
    pub previous_status: String,
    pub status: String,
}

impl HubStatusChange {
    /// The report moved the hub into `offline` from any other status.
    pub fn went_offline(&self) -> bool {
        self.status == "offline" && self.previous_status != "offline"
    }
}

/// A row from the `devices` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Device {
    pub id: DbId,
    pub hub_id: DbId,
    pub name: String,
    pub device_category: Option<String>,
    pub room_name: Option<String>,
    /// Free-form; `location` is read by the fridge check.
    pub metadata: serde_json::Value,
    pub battery_level: Option<i32>,
    pub last_activity_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
