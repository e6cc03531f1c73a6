//! Repository for the `hubs` table.

use safehome_core::types::DbId;
use sqlx::PgPool;

use crate::models::hub::{Hub, HubStatusChange, UpdateHubStatus};

/// Column list for `hubs` queries.
const COLUMNS: &str = "id, user_id, serial_number, name, status, firmware_version, battery_level, \
                       is_on_battery, wifi_strength, last_seen_at, configuration, \
                       created_at, updated_at";

/// Provides hub lookups and status bookkeeping.
pub struct HubRepo;

impl HubRepo {
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Hub>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM hubs WHERE id = $1");
        sqlx::query_as::<_, Hub>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Online hubs installed for a resident; the inactivity sweep's scope.
    pub async fn list_online_with_resident(pool: &PgPool) -> Result<Vec<Hub>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM hubs \
             WHERE status = 'online' AND user_id IS NOT NULL \
             ORDER BY id"
        );
        sqlx::query_as::<_, Hub>(&query).fetch_all(pool).await
    }

    /// Every hub, for the baseline rebuild.
    pub async fn list_all(pool: &PgPool) -> Result<Vec<Hub>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM hubs ORDER BY id");
        sqlx::query_as::<_, Hub>(&query).fetch_all(pool).await
    }

    /// Apply a status report, returning the status before and after.
    ///
    /// Returns `None` if the hub does not exist.
    pub async fn update_status(
        pool: &PgPool,
        id: DbId,
        update: &UpdateHubStatus,
    ) -> Result<Option<HubStatusChange>, sqlx::Error> {
        sqlx::query_as::<_, HubStatusChange>(
            "WITH prev AS ( \
                SELECT id, status FROM hubs WHERE id = $1 FOR UPDATE \
             ) \
             UPDATE hubs h \
             SET status = $2, \
                 firmware_version = COALESCE($3, h.firmware_version), \
                 battery_level = COALESCE($4, h.battery_level), \
                 is_on_battery = $5, \
                 wifi_strength = COALESCE($6, h.wifi_strength), \
                 last_seen_at = $7, \
                 updated_at = NOW() \
             FROM prev \
             WHERE h.id = prev.id \
             RETURNING h.id AS hub_id, h.user_id, prev.status AS previous_status, h.status",
        )
        .bind(id)
        .bind(&update.status)
        .bind(&update.firmware_version)
        .bind(update.battery_level)
        .bind(update.is_on_battery)
        .bind(update.wifi_strength)
        .bind(update.seen_at)
        .fetch_optional(pool)
        .await
    }
}
