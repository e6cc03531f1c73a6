//! Repository for the `activity_baselines` table.

use safehome_core::baseline::SlotStats;
use safehome_core::types::DbId;
use sqlx::PgPool;

use crate::models::activity::ActivityBaseline;

/// Column list for `activity_baselines` queries.
const COLUMNS: &str = "id, hub_id, day_of_week, hour_of_day, room_name, avg_motion_events, \
                       std_motion_events, sample_count, last_updated, created_at, updated_at";

/// Provides slot lookups and the rebuild upsert for baselines.
pub struct BaselineRepo;

impl BaselineRepo {
    /// The baseline row for one (weekday, hour, room) slot of a hub.
    ///
    /// A `None` room matches the slot for events reported without a room.
    pub async fn find_slot(
        pool: &PgPool,
        hub_id: DbId,
        day_of_week: i16,
        hour_of_day: i16,
        room_name: Option<&str>,
    ) -> Result<Option<ActivityBaseline>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM activity_baselines \
             WHERE hub_id = $1 AND day_of_week = $2 AND hour_of_day = $3 \
               AND room_name IS NOT DISTINCT FROM $4"
        );
        sqlx::query_as::<_, ActivityBaseline>(&query)
            .bind(hub_id)
            .bind(day_of_week)
            .bind(hour_of_day)
            .bind(room_name)
            .fetch_optional(pool)
            .await
    }

    /// All baseline rows for a hub, ordered by slot.
    pub async fn list_for_hub(
        pool: &PgPool,
        hub_id: DbId,
    ) -> Result<Vec<ActivityBaseline>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM activity_baselines \
             WHERE hub_id = $1 \
             ORDER BY day_of_week, hour_of_day, room_name"
        );
        sqlx::query_as::<_, ActivityBaseline>(&query)
            .bind(hub_id)
            .fetch_all(pool)
            .await
    }

    /// Upsert every computed slot for a hub within one transaction.
    ///
    /// Returns the number of rows written.
    pub async fn upsert_slots(
        pool: &PgPool,
        hub_id: DbId,
        slots: &[SlotStats],
    ) -> Result<u64, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let mut written = 0;

        for slot in slots {
            let result = sqlx::query(
                "INSERT INTO activity_baselines \
                    (hub_id, day_of_week, hour_of_day, room_name, \
                     avg_motion_events, std_motion_events, sample_count, last_updated) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, NOW()) \
                 ON CONFLICT ON CONSTRAINT uq_activity_baselines_slot \
                 DO UPDATE SET \
                    avg_motion_events = EXCLUDED.avg_motion_events, \
                    std_motion_events = EXCLUDED.std_motion_events, \
                    sample_count = EXCLUDED.sample_count, \
                    last_updated = NOW(), \
                    updated_at = NOW()",
            )
            .bind(hub_id)
            .bind(slot.day_of_week)
            .bind(slot.hour_of_day)
            .bind(&slot.room_name)
            .bind(slot.avg_motion_events)
            .bind(slot.std_motion_events)
            .bind(slot.sample_count)
            .execute(&mut *tx)
            .await?;
            written += result.rows_affected();
        }

        tx.commit().await?;
        Ok(written)
    }
}
