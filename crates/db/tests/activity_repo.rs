//! Integration tests for the activity, baseline, check-in and hub queries.

mod common;

use chrono::{Duration, Utc};
use safehome_core::baseline::SlotStats;
use safehome_db::models::check_in::CreateCheckIn;
use safehome_db::models::hub::UpdateHubStatus;
use safehome_db::repositories::{
    ActivityEventRepo, BaselineRepo, CheckInRepo, DeviceRepo, HubRepo,
};
use serde_json::json;
use sqlx::PgPool;

use common::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn slot(room_name: Option<&str>, avg: f64, samples: i32) -> SlotStats {
    SlotStats {
        day_of_week: 1,
        hour_of_day: 8,
        room_name: room_name.map(str::to_string),
        avg_motion_events: avg,
        std_motion_events: 0.5,
        sample_count: samples,
    }
}

async fn count_events(pool: &PgPool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM activity_events")
        .fetch_one(pool)
        .await
        .unwrap()
}

// ---------------------------------------------------------------------------
// Activity events
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_event_for_unknown_device_is_rejected(pool: PgPool) {
    let (_, hub_id) = seed_resident(&pool).await;

    let result = ActivityEventRepo::create(
        &pool,
        &new_event(hub_id, Some(777), "fall_detected", Some("Bedroom"), Utc::now()),
    )
    .await;

    match result {
        Err(sqlx::Error::Database(e)) => assert!(e.is_foreign_key_violation()),
        other => panic!("expected a foreign key violation, got {other:?}"),
    }
    assert_eq!(count_events(&pool).await, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_event_without_device_is_stored(pool: PgPool) {
    let (_, hub_id) = seed_resident(&pool).await;
    let mut input = new_event(hub_id, None, "fall_detected", Some("Bedroom"), utc("2024-01-08T10:00:00Z"));
    input.sensor_data = json!({ "reported_device_id": 777 });
    input.is_anomaly = true;
    input.anomaly_score = 1.0;

    let event = ActivityEventRepo::create(&pool, &input).await.unwrap();

    assert_eq!(event.device_id, None);
    assert_eq!(event.sensor_data["reported_device_id"], 777);
    assert!(event.is_anomaly);
    assert_eq!(event.created_at, utc("2024-01-08T10:00:00Z"));
    assert_eq!(count_events(&pool).await, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_fridge_opened_needs_a_fridge_device(pool: PgPool) {
    let (_, hub_id) = seed_resident(&pool).await;
    let fridge = seed_device(&pool, hub_id, json!({ "location": "Kitchen Fridge" })).await;
    let pantry = seed_device(&pool, hub_id, json!({ "location": "Pantry" })).await;
    let since = utc("2024-01-08T06:00:00Z");

    ActivityEventRepo::create(
        &pool,
        &new_event(hub_id, Some(pantry), "door_opened", Some("Kitchen"), utc("2024-01-08T07:00:00Z")),
    )
    .await
    .unwrap();
    ActivityEventRepo::create(
        &pool,
        &new_event(hub_id, Some(fridge), "door_opened", Some("Kitchen"), utc("2024-01-08T05:00:00Z")),
    )
    .await
    .unwrap();
    assert!(!ActivityEventRepo::fridge_opened_since(&pool, hub_id, since).await.unwrap());

    ActivityEventRepo::create(
        &pool,
        &new_event(hub_id, Some(fridge), "door_opened", Some("Kitchen"), utc("2024-01-08T07:30:00Z")),
    )
    .await
    .unwrap();
    assert!(ActivityEventRepo::fridge_opened_since(&pool, hub_id, since).await.unwrap());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_bathroom_and_activity_lookups(pool: PgPool) {
    let (_, hub_id) = seed_resident(&pool).await;
    let entered = utc("2024-01-08T07:00:00Z");
    for (event_type, room, at) in [
        ("motion_detected", "Main Bathroom", entered),
        ("temperature_change", "Lounge", utc("2024-01-08T07:20:00Z")),
    ] {
        ActivityEventRepo::create(&pool, &new_event(hub_id, None, event_type, Some(room), at))
            .await
            .unwrap();
    }

    let last = ActivityEventRepo::last_bathroom_motion(&pool, hub_id).await.unwrap().unwrap();
    assert_eq!(last.created_at, entered);
    assert!(!ActivityEventRepo::motion_elsewhere_since(&pool, hub_id, entered).await.unwrap());

    // Temperature readings are not signs of life.
    let latest = ActivityEventRepo::last_activity(&pool, hub_id).await.unwrap().unwrap();
    assert_eq!(latest.room_name.as_deref(), Some("Main Bathroom"));
    assert!(!ActivityEventRepo::activity_since(&pool, hub_id, entered + Duration::minutes(1))
        .await
        .unwrap());

    ActivityEventRepo::create(
        &pool,
        &new_event(hub_id, None, "motion_detected", Some("Hallway"), utc("2024-01-08T07:40:00Z")),
    )
    .await
    .unwrap();
    assert!(ActivityEventRepo::motion_elsewhere_since(&pool, hub_id, entered).await.unwrap());
    assert!(ActivityEventRepo::activity_since(&pool, hub_id, entered + Duration::minutes(1))
        .await
        .unwrap());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_motion_day_stats(pool: PgPool) {
    let (_, hub_id) = seed_resident(&pool).await;
    for (event_type, room, at) in [
        ("motion_detected", Some("Kitchen"), "2024-01-08T07:00:00Z"),
        ("motion_detected", Some("Bedroom"), "2024-01-08T09:00:00Z"),
        ("motion_detected", Some("Kitchen"), "2024-01-08T12:00:00Z"),
        ("motion_detected", None, "2024-01-08T13:00:00Z"),
        ("door_opened", Some("Front Door"), "2024-01-08T14:00:00Z"),
        ("motion_detected", Some("Lounge"), "2024-01-09T00:00:00Z"),
    ] {
        ActivityEventRepo::create(&pool, &new_event(hub_id, None, event_type, room, utc(at)))
            .await
            .unwrap();
    }
    let mut anomaly = new_event(hub_id, None, "motion_detected", Some("Hallway"), utc("2024-01-08T03:00:00Z"));
    anomaly.is_anomaly = true;
    anomaly.anomaly_score = 0.6;
    ActivityEventRepo::create(&pool, &anomaly).await.unwrap();

    let stats = ActivityEventRepo::motion_day_stats(
        &pool,
        hub_id,
        utc("2024-01-08T00:00:00Z"),
        utc("2024-01-09T00:00:00Z"),
    )
    .await
    .unwrap();

    assert_eq!(stats.first_activity, Some(utc("2024-01-08T03:00:00Z")));
    assert_eq!(stats.last_activity, Some(utc("2024-01-08T13:00:00Z")));
    assert_eq!(stats.total_motion_events, 5);
    assert_eq!(stats.rooms_visited, vec!["Bedroom", "Hallway", "Kitchen"]);
    assert_eq!(stats.anomalies_detected, 1);

    let empty = ActivityEventRepo::motion_day_stats(
        &pool,
        hub_id,
        utc("2024-01-01T00:00:00Z"),
        utc("2024-01-02T00:00:00Z"),
    )
    .await
    .unwrap();
    assert_eq!(empty.total_motion_events, 0);
    assert!(empty.rooms_visited.is_empty());
    assert_eq!(empty.first_activity, None);
}

// ---------------------------------------------------------------------------
// Baselines
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_baseline_upsert_keeps_one_row_for_a_roomless_slot(pool: PgPool) {
    let (_, hub_id) = seed_resident(&pool).await;

    BaselineRepo::upsert_slots(&pool, hub_id, &[slot(None, 2.0, 3), slot(Some("Kitchen"), 4.0, 3)])
        .await
        .unwrap();
    let written = BaselineRepo::upsert_slots(&pool, hub_id, &[slot(None, 3.5, 4)])
        .await
        .unwrap();
    assert_eq!(written, 1);

    let rows = BaselineRepo::list_for_hub(&pool, hub_id).await.unwrap();
    assert_eq!(rows.len(), 2);

    let roomless = BaselineRepo::find_slot(&pool, hub_id, 1, 8, None).await.unwrap().unwrap();
    assert_eq!(roomless.room_name, None);
    assert_eq!(roomless.avg_motion_events, 3.5);
    assert_eq!(roomless.sample_count, 4);

    let kitchen = BaselineRepo::find_slot(&pool, hub_id, 1, 8, Some("Kitchen"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(kitchen.avg_motion_events, 4.0);

    assert!(BaselineRepo::find_slot(&pool, hub_id, 2, 8, None).await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Check-ins
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_latest_check_in_status_within_window(pool: PgPool) {
    let (user_id, hub_id) = seed_resident(&pool).await;
    for (status, at) in [
        ("late", "2024-01-08T08:00:00Z"),
        ("ok", "2024-01-08T20:00:00Z"),
        ("missed", "2024-01-09T08:00:00Z"),
    ] {
        CheckInRepo::create(
            &pool,
            &CreateCheckIn {
                user_id,
                hub_id: Some(hub_id),
                check_in_type: "manual_hub".to_string(),
                status: status.to_string(),
                actual_time: utc(at),
            },
        )
        .await
        .unwrap();
    }

    let status = CheckInRepo::latest_status_for_hub(
        &pool,
        hub_id,
        utc("2024-01-08T00:00:00Z"),
        utc("2024-01-09T00:00:00Z"),
    )
    .await
    .unwrap();
    assert_eq!(status.as_deref(), Some("ok"));

    let none = CheckInRepo::latest_status_for_hub(
        &pool,
        hub_id,
        utc("2024-01-07T00:00:00Z"),
        utc("2024-01-08T00:00:00Z"),
    )
    .await
    .unwrap();
    assert_eq!(none, None);
}

// ---------------------------------------------------------------------------
// Hubs and devices
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_hub_status_report_returns_previous_status(pool: PgPool) {
    let (user_id, hub_id) = seed_resident(&pool).await;
    let seen_at = utc("2024-01-08T09:00:00Z");

    let change = HubRepo::update_status(
        &pool,
        hub_id,
        &UpdateHubStatus {
            status: "offline".to_string(),
            firmware_version: Some("2.1.0".to_string()),
            battery_level: Some(40),
            is_on_battery: true,
            wifi_strength: None,
            seen_at,
        },
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(change.user_id, Some(user_id));
    assert_eq!(change.previous_status, "online");
    assert!(change.went_offline());

    let hub = HubRepo::find_by_id(&pool, hub_id).await.unwrap().unwrap();
    assert_eq!(hub.wifi_strength, Some(-50));
    assert_eq!(hub.firmware_version.as_deref(), Some("2.1.0"));
    assert_eq!(hub.last_seen_at, Some(seen_at));

    assert!(HubRepo::list_online_with_resident(&pool).await.unwrap().is_empty());
    assert!(HubRepo::update_status(
        &pool,
        404,
        &UpdateHubStatus {
            status: "online".to_string(),
            firmware_version: None,
            battery_level: None,
            is_on_battery: false,
            wifi_strength: None,
            seen_at,
        },
    )
    .await
    .unwrap()
    .is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_device_bookkeeping_reports_missing_devices(pool: PgPool) {
    let (_, hub_id) = seed_resident(&pool).await;
    let device = seed_device(&pool, hub_id, json!({})).await;
    let at = utc("2024-01-08T09:00:00Z");

    assert!(DeviceRepo::touch_activity(&pool, device, at).await.unwrap());
    assert!(DeviceRepo::update_battery(&pool, device, 12).await.unwrap());
    assert!(!DeviceRepo::touch_activity(&pool, 777, at).await.unwrap());

    let found = DeviceRepo::find_by_id(&pool, device).await.unwrap().unwrap();
    assert_eq!(found.last_activity_at, Some(at));
    assert_eq!(found.battery_level, Some(12));
    assert!(DeviceRepo::find_by_id(&pool, 777).await.unwrap().is_none());
}
