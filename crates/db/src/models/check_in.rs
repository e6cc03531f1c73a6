//! Resident check-in model.

use safehome_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `check_ins` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CheckIn {
    pub id: DbId,
    pub user_id: DbId,
    pub hub_id: Option<DbId>,
    pub check_in_type: String,
    pub status: String,
    pub actual_time: Timestamp,
    pub notes: Option<String>,
    pub family_notified: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Insert DTO for a check-in reported by a hub.
#[derive(Debug, Clone)]
pub struct CreateCheckIn {
    pub user_id: DbId,
    pub hub_id: Option<DbId>,
    pub check_in_type: String,
    pub status: String,
    pub actual_time: Timestamp,
}
