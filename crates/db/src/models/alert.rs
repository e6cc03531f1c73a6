//! Alert and alert delivery models.

use safehome_core::alert::{AlertSeverity, AlertStatus, AlertType};
use safehome_core::channels::{DeliveryStatus, NotificationChannel};
use safehome_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Default page size for alert history.
pub const DEFAULT_HISTORY_LIMIT: i64 = 20;

/// A row from the `alerts` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Alert {
    pub id: DbId,
    pub user_id: DbId,
    pub hub_id: Option<DbId>,
    pub activity_event_id: Option<DbId>,
    #[sqlx(try_from = "String")]
    pub alert_type: AlertType,
    #[sqlx(try_from = "String")]
    pub severity: AlertSeverity,
    pub title: String,
    pub message: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: AlertStatus,
    pub acknowledged_by: Option<DbId>,
    pub acknowledged_at: Option<Timestamp>,
    pub resolved_by: Option<DbId>,
    pub resolved_at: Option<Timestamp>,
    pub resolution_notes: Option<String>,
    pub escalation_level: i32,
    pub metadata: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for raising a new alert.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAlert {
    pub user_id: DbId,
    pub hub_id: Option<DbId>,
    pub activity_event_id: Option<DbId>,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub title: String,
    pub message: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Paging and filtering for alert history.
#[derive(Debug, Clone, Deserialize)]
pub struct AlertHistoryQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    pub status: Option<AlertStatus>,
}

fn default_limit() -> i64 {
    DEFAULT_HISTORY_LIMIT
}

impl Default for AlertHistoryQuery {
    fn default() -> Self {
        Self {
            limit: DEFAULT_HISTORY_LIMIT,
            offset: 0,
            status: None,
        }
    }
}

/// One page of alert history plus the unpaged total.
#[derive(Debug, Clone, Serialize)]
pub struct AlertPage {
    pub alerts: Vec<Alert>,
    pub total: i64,
}

/// A row from the `alert_notifications` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct AlertNotification {
    pub id: DbId,
    pub alert_id: DbId,
    pub family_member_id: DbId,
    #[sqlx(try_from = "String")]
    pub channel: NotificationChannel,
    #[sqlx(try_from = "String")]
    pub status: DeliveryStatus,
    pub sent_at: Option<Timestamp>,
    pub delivered_at: Option<Timestamp>,
    pub read_at: Option<Timestamp>,
    pub error_message: Option<String>,
    pub retry_count: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
