//! Repository for the `activity_events` table.
//!
//! Besides the append path, this answers the hub-scoped "when did X last
//! happen" questions asked by the inactivity sweep.

use safehome_core::activity::ActivityEventType;
use safehome_core::baseline::MotionSample;
use safehome_core::summary::MotionDayStats;
use safehome_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::activity::{ActivityEvent, CreateActivityEvent};

/// Column list for `activity_events` queries.
const COLUMNS: &str = "id, hub_id, device_id, event_type, room_name, sensor_data, \
                       is_anomaly, anomaly_score, created_at, updated_at";

/// Event types that count as signs of life, as a SQL list.
const ACTIVITY_TYPES: &str = "('motion_detected', 'door_opened', 'appliance_on')";

/// Provides append and lookup operations for activity events.
pub struct ActivityEventRepo;

impl ActivityEventRepo {
    /// Append a classified event.
    pub async fn create(
        pool: &PgPool,
        input: &CreateActivityEvent,
    ) -> Result<ActivityEvent, sqlx::Error> {
        let query = format!(
            "INSERT INTO activity_events \
                (hub_id, device_id, event_type, room_name, sensor_data, \
                 is_anomaly, anomaly_score, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ActivityEvent>(&query)
            .bind(input.hub_id)
            .bind(input.device_id)
            .bind(&input.event_type)
            .bind(&input.room_name)
            .bind(&input.sensor_data)
            .bind(input.is_anomaly)
            .bind(input.anomaly_score)
            .bind(input.created_at)
            .fetch_one(pool)
            .await
    }

    /// Most recent event of the given kind for a hub.
    pub async fn last_of_kind(
        pool: &PgPool,
        hub_id: DbId,
        kind: ActivityEventType,
    ) -> Result<Option<ActivityEvent>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM activity_events \
             WHERE hub_id = $1 AND event_type = $2 \
             ORDER BY created_at DESC \
             LIMIT 1"
        );
        sqlx::query_as::<_, ActivityEvent>(&query)
            .bind(hub_id)
            .bind(kind.as_str())
            .fetch_optional(pool)
            .await
    }

    /// Most recent motion, door-open or appliance-on event for a hub.
    pub async fn last_activity(
        pool: &PgPool,
        hub_id: DbId,
    ) -> Result<Option<ActivityEvent>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM activity_events \
             WHERE hub_id = $1 AND event_type IN {ACTIVITY_TYPES} \
             ORDER BY created_at DESC \
             LIMIT 1"
        );
        sqlx::query_as::<_, ActivityEvent>(&query)
            .bind(hub_id)
            .fetch_optional(pool)
            .await
    }

    /// Most recent motion in any room whose name contains "bathroom".
    pub async fn last_bathroom_motion(
        pool: &PgPool,
        hub_id: DbId,
    ) -> Result<Option<ActivityEvent>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM activity_events \
             WHERE hub_id = $1 \
               AND event_type = 'motion_detected' \
               AND room_name ILIKE '%bathroom%' \
             ORDER BY created_at DESC \
             LIMIT 1"
        );
        sqlx::query_as::<_, ActivityEvent>(&query)
            .bind(hub_id)
            .fetch_optional(pool)
            .await
    }

    /// Whether motion was seen outside the bathroom after `since`.
    pub async fn motion_elsewhere_since(
        pool: &PgPool,
        hub_id: DbId,
        since: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS ( \
                SELECT 1 FROM activity_events \
                WHERE hub_id = $1 \
                  AND event_type = 'motion_detected' \
                  AND room_name NOT ILIKE '%bathroom%' \
                  AND created_at > $2 \
             )",
        )
        .bind(hub_id)
        .bind(since)
        .fetch_one(pool)
        .await
    }

    /// Whether any sign of life was recorded at or after `since`.
    pub async fn activity_since(
        pool: &PgPool,
        hub_id: DbId,
        since: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let query = format!(
            "SELECT EXISTS ( \
                SELECT 1 FROM activity_events \
                WHERE hub_id = $1 \
                  AND event_type IN {ACTIVITY_TYPES} \
                  AND created_at >= $2 \
             )"
        );
        sqlx::query_scalar(&query)
            .bind(hub_id)
            .bind(since)
            .fetch_one(pool)
            .await
    }

    /// Whether a fridge door sensor reported `door_opened` after `since`.
    ///
    /// A fridge sensor is a device whose `metadata.location` mentions
    /// "fridge" or "refrigerator".
    pub async fn fridge_opened_since(
        pool: &PgPool,
        hub_id: DbId,
        since: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS ( \
                SELECT 1 FROM activity_events ae \
                JOIN devices d ON ae.device_id = d.id \
                WHERE ae.hub_id = $1 \
                  AND ae.event_type = 'door_opened' \
                  AND ae.created_at > $2 \
                  AND (d.metadata->>'location' ILIKE '%fridge%' \
                       OR d.metadata->>'location' ILIKE '%refrigerator%') \
             )",
        )
        .bind(hub_id)
        .bind(since)
        .fetch_one(pool)
        .await
    }

    /// Motion events since `since`, oldest first, for a baseline rebuild.
    pub async fn motion_samples_since(
        pool: &PgPool,
        hub_id: DbId,
        since: Timestamp,
    ) -> Result<Vec<MotionSample>, sqlx::Error> {
        let rows: Vec<(Timestamp, Option<String>)> = sqlx::query_as(
            "SELECT created_at, room_name FROM activity_events \
             WHERE hub_id = $1 \
               AND event_type = 'motion_detected' \
               AND created_at > $2 \
             ORDER BY created_at",
        )
        .bind(hub_id)
        .bind(since)
        .fetch_all(pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(created_at, room_name)| MotionSample {
                created_at,
                room_name,
            })
            .collect())
    }

    /// Motion figures for a hub between `start` (inclusive) and `end`.
    pub async fn motion_day_stats(
        pool: &PgPool,
        hub_id: DbId,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<MotionDayStats, sqlx::Error> {
        let (first_activity, last_activity, total_motion_events, rooms_visited, anomalies_detected): (
            Option<Timestamp>,
            Option<Timestamp>,
            i64,
            Vec<String>,
            i64,
        ) = sqlx::query_as(
            "SELECT MIN(created_at), MAX(created_at), COUNT(*), \
                    COALESCE(ARRAY_AGG(DISTINCT room_name ORDER BY room_name) \
                             FILTER (WHERE room_name IS NOT NULL AND room_name <> ''), \
                             '{}'::TEXT[]), \
                    COUNT(*) FILTER (WHERE is_anomaly) \
             FROM activity_events \
             WHERE hub_id = $1 \
               AND event_type = 'motion_detected' \
               AND created_at >= $2 AND created_at < $3",
        )
        .bind(hub_id)
        .bind(start)
        .bind(end)
        .fetch_one(pool)
        .await?;

        Ok(MotionDayStats {
            first_activity,
            last_activity,
            total_motion_events,
            rooms_visited,
            anomalies_detected,
        })
    }
}
