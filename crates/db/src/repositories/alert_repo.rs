//! Repository for the `alerts` table.
//!
//! Status changes are conditional single-row updates: each takes the status
//! the caller last observed and only applies if the row still has it, so
//! overlapping sweeps or concurrent acknowledgements cannot clobber each
//! other. A `None` result means the row moved on (or never existed).

use safehome_core::alert::{AlertStatus, AlertType};
use safehome_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::alert::{Alert, AlertHistoryQuery, CreateAlert};

/// Column list for `alerts` queries.
const COLUMNS: &str = "id, user_id, hub_id, activity_event_id, alert_type, severity, title, \
                       message, status, acknowledged_by, acknowledged_at, resolved_by, \
                       resolved_at, resolution_notes, escalation_level, metadata, \
                       created_at, updated_at";

/// Severity rank for ordering; text order would put `medium` first.
const SEVERITY_RANK: &str = "CASE severity \
                                WHEN 'critical' THEN 4 \
                                WHEN 'high' THEN 3 \
                                WHEN 'medium' THEN 2 \
                                ELSE 1 \
                             END";

/// Provides lifecycle operations for alerts.
pub struct AlertRepo;

impl AlertRepo {
    /// Insert a new alert in `active` at escalation level 0.
    pub async fn create(pool: &PgPool, input: &CreateAlert) -> Result<Alert, sqlx::Error> {
        let query = format!(
            "INSERT INTO alerts \
                (user_id, hub_id, activity_event_id, alert_type, severity, title, message, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Alert>(&query)
            .bind(input.user_id)
            .bind(input.hub_id)
            .bind(input.activity_event_id)
            .bind(input.alert_type.as_str())
            .bind(input.severity.as_str())
            .bind(&input.title)
            .bind(&input.message)
            .bind(&input.metadata)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Alert>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM alerts WHERE id = $1");
        sqlx::query_as::<_, Alert>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// An open alert of this type for the resident created after `since`.
    pub async fn find_recent_open(
        pool: &PgPool,
        user_id: DbId,
        alert_type: AlertType,
        since: Timestamp,
    ) -> Result<Option<Alert>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM alerts \
             WHERE user_id = $1 \
               AND alert_type = $2 \
               AND status IN ('active', 'escalated') \
               AND created_at > $3 \
             ORDER BY created_at DESC \
             LIMIT 1"
        );
        sqlx::query_as::<_, Alert>(&query)
            .bind(user_id)
            .bind(alert_type.as_str())
            .bind(since)
            .fetch_optional(pool)
            .await
    }

    /// Active alerts for a resident, most severe then newest first.
    pub async fn list_active(pool: &PgPool, user_id: DbId) -> Result<Vec<Alert>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM alerts \
             WHERE user_id = $1 AND status = 'active' \
             ORDER BY {SEVERITY_RANK} DESC, created_at DESC"
        );
        sqlx::query_as::<_, Alert>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// One page of a resident's alerts (newest first) and the total count.
    pub async fn list_history(
        pool: &PgPool,
        user_id: DbId,
        params: &AlertHistoryQuery,
    ) -> Result<(Vec<Alert>, i64), sqlx::Error> {
        let status = params.status.map(AlertStatus::as_str);
        let query = format!(
            "SELECT {COLUMNS} FROM alerts \
             WHERE user_id = $1 AND ($2::TEXT IS NULL OR status = $2) \
             ORDER BY created_at DESC \
             LIMIT $3 OFFSET $4"
        );
        let alerts = sqlx::query_as::<_, Alert>(&query)
            .bind(user_id)
            .bind(status)
            .bind(params.limit)
            .bind(params.offset)
            .fetch_all(pool)
            .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM alerts \
             WHERE user_id = $1 AND ($2::TEXT IS NULL OR status = $2)",
        )
        .bind(user_id)
        .bind(status)
        .fetch_one(pool)
        .await?;

        Ok((alerts, total))
    }

    /// Open high/critical alerts whose age has reached
    /// `step_minutes * (escalation_level + 1)` and that are below `max_level`.
    pub async fn list_escalation_candidates(
        pool: &PgPool,
        now: Timestamp,
        step_minutes: i64,
        max_level: i32,
    ) -> Result<Vec<Alert>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM alerts \
             WHERE status IN ('active', 'escalated') \
               AND severity IN ('high', 'critical') \
               AND escalation_level < $2 \
               AND created_at <= $1 - make_interval(mins => ($3 * (escalation_level + 1))::INT) \
             ORDER BY created_at"
        );
        sqlx::query_as::<_, Alert>(&query)
            .bind(now)
            .bind(max_level)
            .bind(step_minutes)
            .fetch_all(pool)
            .await
    }

    /// Advance an open alert from `expected_level` to the next level.
    pub async fn escalate(
        pool: &PgPool,
        id: DbId,
        expected_level: i32,
        max_level: i32,
    ) -> Result<Option<Alert>, sqlx::Error> {
        let query = format!(
            "UPDATE alerts \
             SET escalation_level = escalation_level + 1, status = 'escalated', updated_at = NOW() \
             WHERE id = $1 \
               AND status IN ('active', 'escalated') \
               AND escalation_level = $2 \
               AND escalation_level < $3 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Alert>(&query)
            .bind(id)
            .bind(expected_level)
            .bind(max_level)
            .fetch_optional(pool)
            .await
    }

    /// Mark an alert acknowledged if it is still in `expected`.
    pub async fn acknowledge(
        pool: &PgPool,
        id: DbId,
        expected: AlertStatus,
        acknowledged_by: DbId,
    ) -> Result<Option<Alert>, sqlx::Error> {
        let query = format!(
            "UPDATE alerts \
             SET status = 'acknowledged', acknowledged_by = $3, acknowledged_at = NOW(), \
                 updated_at = NOW() \
             WHERE id = $1 AND status = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Alert>(&query)
            .bind(id)
            .bind(expected.as_str())
            .bind(acknowledged_by)
            .fetch_optional(pool)
            .await
    }

    /// Close an alert as `resolved` or `cancelled` if it is still in
    /// `expected`. Both record the actor and notes in the `resolved_*` columns.
    pub async fn close(
        pool: &PgPool,
        id: DbId,
        expected: AlertStatus,
        target: AlertStatus,
        closed_by: DbId,
        notes: Option<&str>,
    ) -> Result<Option<Alert>, sqlx::Error> {
        let query = format!(
            "UPDATE alerts \
             SET status = $3, resolved_by = $4, resolved_at = NOW(), resolution_notes = $5, \
                 updated_at = NOW() \
             WHERE id = $1 AND status = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Alert>(&query)
            .bind(id)
            .bind(expected.as_str())
            .bind(target.as_str())
            .bind(closed_by)
            .bind(notes)
            .fetch_optional(pool)
            .await
    }

    /// Alerts raised for a hub in `[start, end)`, whatever their status.
    pub async fn count_for_hub_between(
        pool: &PgPool,
        hub_id: DbId,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM alerts \
             WHERE hub_id = $1 AND created_at >= $2 AND created_at < $3",
        )
        .bind(hub_id)
        .bind(start)
        .bind(end)
        .fetch_one(pool)
        .await
    }
}
