//! Repository for the `alert_notifications` delivery log.

use safehome_core::channels::NotificationChannel;
use safehome_core::types::DbId;
use sqlx::PgPool;

use crate::models::alert::AlertNotification;

/// Column list for `alert_notifications` queries.
const COLUMNS: &str = "id, alert_id, family_member_id, channel, status, sent_at, delivered_at, \
                       read_at, error_message, retry_count, created_at, updated_at";

/// Provides the pending -> sent/failed bookkeeping for channel sends.
pub struct AlertNotificationRepo;

impl AlertNotificationRepo {
    /// Record a delivery attempt about to be made, returning its ID.
    pub async fn create_pending(
        pool: &PgPool,
        alert_id: DbId,
        family_member_id: DbId,
        channel: NotificationChannel,
    ) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO alert_notifications (alert_id, family_member_id, channel, status) \
             VALUES ($1, $2, $3, 'pending') \
             RETURNING id",
        )
        .bind(alert_id)
        .bind(family_member_id)
        .bind(channel.as_str())
        .fetch_one(pool)
        .await
    }

    pub async fn mark_sent(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE alert_notifications \
             SET status = 'sent', sent_at = NOW(), updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn mark_failed(pool: &PgPool, id: DbId, error: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE alert_notifications \
             SET status = 'failed', error_message = $2, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(error)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Every delivery attempt for an alert, oldest first.
    pub async fn list_for_alert(
        pool: &PgPool,
        alert_id: DbId,
    ) -> Result<Vec<AlertNotification>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM alert_notifications \
             WHERE alert_id = $1 \
             ORDER BY created_at, id"
        );
        sqlx::query_as::<_, AlertNotification>(&query)
            .bind(alert_id)
            .fetch_all(pool)
            .await
    }
}
