//! Repository for the `devices` table.

use safehome_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::hub::Device;

/// Column list for `devices` queries.
const COLUMNS: &str = "id, hub_id, name, device_category, room_name, metadata, battery_level, \
                       last_activity_at, created_at, updated_at";

/// Provides device lookups and activity bookkeeping.
pub struct DeviceRepo;

impl DeviceRepo {
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Device>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM devices WHERE id = $1");
        sqlx::query_as::<_, Device>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Record that the device just reported an event.
    ///
    /// Returns `false` if the device does not exist.
    pub async fn touch_activity(
        pool: &PgPool,
        id: DbId,
        at: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE devices SET last_activity_at = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(at)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn update_battery(
        pool: &PgPool,
        id: DbId,
        battery_level: i32,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE devices SET battery_level = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(battery_level)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
