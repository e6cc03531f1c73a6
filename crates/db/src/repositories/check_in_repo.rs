//! Repository for the `check_ins` table.

use safehome_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::check_in::{CheckIn, CreateCheckIn};

/// Column list for `check_ins` queries.
const COLUMNS: &str = "id, user_id, hub_id, check_in_type, status, actual_time, notes, \
                       family_notified, created_at, updated_at";

/// Provides persistence for resident check-ins.
pub struct CheckInRepo;

impl CheckInRepo {
    pub async fn create(pool: &PgPool, input: &CreateCheckIn) -> Result<CheckIn, sqlx::Error> {
        let query = format!(
            "INSERT INTO check_ins (user_id, hub_id, check_in_type, status, actual_time) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CheckIn>(&query)
            .bind(input.user_id)
            .bind(input.hub_id)
            .bind(&input.check_in_type)
            .bind(&input.status)
            .bind(input.actual_time)
            .fetch_one(pool)
            .await
    }

    /// Status of the latest check-in made through a hub in `[start, end)`.
    pub async fn latest_status_for_hub(
        pool: &PgPool,
        hub_id: DbId,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT status FROM check_ins \
             WHERE hub_id = $1 AND actual_time >= $2 AND actual_time < $3 \
             ORDER BY actual_time DESC, id DESC \
             LIMIT 1",
        )
        .bind(hub_id)
        .bind(start)
        .bind(end)
        .fetch_optional(pool)
        .await
    }
}
