#![allow(dead_code)]

use chrono::{DateTime, Utc};
use safehome_core::alert::{AlertSeverity, AlertType};
use safehome_core::types::{DbId, Timestamp};
use safehome_db::models::activity::CreateActivityEvent;
use safehome_db::models::alert::CreateAlert;
use serde_json::json;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Seed rows
// ---------------------------------------------------------------------------

pub async fn seed_user(pool: &PgPool, first_name: &str) -> DbId {
    sqlx::query_scalar(
        "INSERT INTO users (first_name, last_name, email) VALUES ($1, 'Smith', $2) RETURNING id",
    )
    .bind(first_name)
    .bind(format!("{}@example.test", first_name.to_lowercase()))
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn seed_hub(pool: &PgPool, user_id: Option<DbId>, serial: &str) -> DbId {
    sqlx::query_scalar(
        "INSERT INTO hubs (user_id, serial_number, status, wifi_strength) \
         VALUES ($1, $2, 'online', -50) RETURNING id",
    )
    .bind(user_id)
    .bind(serial)
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn seed_device(pool: &PgPool, hub_id: DbId, metadata: serde_json::Value) -> DbId {
    sqlx::query_scalar(
        "INSERT INTO devices (hub_id, name, metadata) VALUES ($1, 'Sensor', $2) RETURNING id",
    )
    .bind(hub_id)
    .bind(metadata)
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn seed_member(
    pool: &PgPool,
    user_id: DbId,
    name: &str,
    is_emergency_contact: bool,
    priority_order: i32,
    phone: Option<&str>,
) -> DbId {
    sqlx::query_scalar(
        "INSERT INTO family_members (user_id, name, is_emergency_contact, priority_order, phone) \
         VALUES ($1, $2, $3, $4, $5) RETURNING id",
    )
    .bind(user_id)
    .bind(name)
    .bind(is_emergency_contact)
    .bind(priority_order)
    .bind(phone)
    .fetch_one(pool)
    .await
    .unwrap()
}

/// A resident with one online hub: `(user_id, hub_id)`.
pub async fn seed_resident(pool: &PgPool) -> (DbId, DbId) {
    let user_id = seed_user(pool, "Pat").await;
    let hub_id = seed_hub(pool, Some(user_id), "SH-0001").await;
    (user_id, hub_id)
}

pub async fn backdate_alert(pool: &PgPool, id: DbId, created_at: Timestamp) {
    sqlx::query("UPDATE alerts SET created_at = $2 WHERE id = $1")
        .bind(id)
        .bind(created_at)
        .execute(pool)
        .await
        .unwrap();
}

// ---------------------------------------------------------------------------
// DTO builders
// ---------------------------------------------------------------------------

pub fn utc(rfc3339: &str) -> Timestamp {
    DateTime::parse_from_rfc3339(rfc3339)
        .unwrap()
        .with_timezone(&Utc)
}

pub fn new_event(
    hub_id: DbId,
    device_id: Option<DbId>,
    event_type: &str,
    room_name: Option<&str>,
    created_at: Timestamp,
) -> CreateActivityEvent {
    CreateActivityEvent {
        hub_id,
        device_id,
        event_type: event_type.to_string(),
        room_name: room_name.map(str::to_string),
        sensor_data: json!({}),
        is_anomaly: false,
        anomaly_score: 0.0,
        created_at,
    }
}

pub fn new_alert(user_id: DbId, hub_id: DbId, alert_type: AlertType, severity: AlertSeverity) -> CreateAlert {
    CreateAlert {
        user_id,
        hub_id: Some(hub_id),
        activity_event_id: None,
        alert_type,
        severity,
        title: alert_type.default_title().to_string(),
        message: None,
        metadata: json!({ "source": "test" }),
    }
}
