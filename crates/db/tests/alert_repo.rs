//! Integration tests for alert lifecycle queries.
//!
//! Exercises the conditional updates and time-window filters against a real
//! database:
//! - Duplicate lookup over open alerts
//! - Escalation candidates and level-keyed escalation
//! - Acknowledge / close only from the expected status
//! - History paging, active ordering and the delivery log

mod common;

use chrono::{Duration, Utc};
use safehome_core::alert::{AlertSeverity, AlertStatus, AlertType};
use safehome_core::channels::{DeliveryStatus, NotificationChannel};
use safehome_db::models::alert::AlertHistoryQuery;
use safehome_db::repositories::{AlertNotificationRepo, AlertRepo, FamilyMemberRepo};
use sqlx::PgPool;

use common::*;

const STEP_MINUTES: i64 = 5;
const MAX_LEVEL: i32 = 3;

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_create_alert_starts_active(pool: PgPool) {
    let (user_id, hub_id) = seed_resident(&pool).await;

    let alert = AlertRepo::create(
        &pool,
        &new_alert(user_id, hub_id, AlertType::FallDetected, AlertSeverity::Critical),
    )
    .await
    .unwrap();

    assert_eq!(alert.status, AlertStatus::Active);
    assert_eq!(alert.escalation_level, 0);
    assert_eq!(alert.severity, AlertSeverity::Critical);
    assert_eq!(alert.title, "Possible Fall Detected");
    assert_eq!(alert.metadata["source"], "test");

    let found = AlertRepo::find_by_id(&pool, alert.id).await.unwrap().unwrap();
    assert_eq!(found.alert_type, AlertType::FallDetected);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_find_recent_open_skips_closed_and_old_alerts(pool: PgPool) {
    let (user_id, hub_id) = seed_resident(&pool).await;
    let responder = seed_user(&pool, "Dana").await;
    let window_start = || Utc::now() - Duration::minutes(15);

    let first = AlertRepo::create(&pool, &new_alert(user_id, hub_id, AlertType::Wandering, AlertSeverity::High))
        .await
        .unwrap();
    let found = AlertRepo::find_recent_open(&pool, user_id, AlertType::Wandering, window_start())
        .await
        .unwrap();
    assert_eq!(found.map(|a| a.id), Some(first.id));

    // Another type never matches.
    assert!(AlertRepo::find_recent_open(&pool, user_id, AlertType::NoEating, window_start())
        .await
        .unwrap()
        .is_none());

    AlertRepo::close(&pool, first.id, AlertStatus::Active, AlertStatus::Resolved, responder, None)
        .await
        .unwrap()
        .unwrap();
    assert!(AlertRepo::find_recent_open(&pool, user_id, AlertType::Wandering, window_start())
        .await
        .unwrap()
        .is_none());

    let old = AlertRepo::create(&pool, &new_alert(user_id, hub_id, AlertType::Wandering, AlertSeverity::High))
        .await
        .unwrap();
    backdate_alert(&pool, old.id, Utc::now() - Duration::minutes(20)).await;
    assert!(AlertRepo::find_recent_open(&pool, user_id, AlertType::Wandering, window_start())
        .await
        .unwrap()
        .is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_escalation_candidates_follow_level_steps(pool: PgPool) {
    let (user_id, hub_id) = seed_resident(&pool).await;
    let high = AlertRepo::create(&pool, &new_alert(user_id, hub_id, AlertType::Wandering, AlertSeverity::High))
        .await
        .unwrap();
    let medium = AlertRepo::create(&pool, &new_alert(user_id, hub_id, AlertType::NoEating, AlertSeverity::Medium))
        .await
        .unwrap();
    backdate_alert(&pool, high.id, Utc::now() - Duration::minutes(6)).await;
    backdate_alert(&pool, medium.id, Utc::now() - Duration::minutes(60)).await;

    let due = AlertRepo::list_escalation_candidates(&pool, Utc::now(), STEP_MINUTES, MAX_LEVEL)
        .await
        .unwrap();
    assert_eq!(due.iter().map(|a| a.id).collect::<Vec<_>>(), vec![high.id]);

    let escalated = AlertRepo::escalate(&pool, high.id, 0, MAX_LEVEL).await.unwrap().unwrap();
    assert_eq!(escalated.escalation_level, 1);
    assert_eq!(escalated.status, AlertStatus::Escalated);

    // Level 1 waits for two steps; a stale level never applies.
    assert!(AlertRepo::list_escalation_candidates(&pool, Utc::now(), STEP_MINUTES, MAX_LEVEL)
        .await
        .unwrap()
        .is_empty());
    assert!(AlertRepo::escalate(&pool, high.id, 0, MAX_LEVEL).await.unwrap().is_none());

    let later = Utc::now() + Duration::minutes(5);
    let due = AlertRepo::list_escalation_candidates(&pool, later, STEP_MINUTES, MAX_LEVEL)
        .await
        .unwrap();
    assert_eq!(due.iter().map(|a| a.id).collect::<Vec<_>>(), vec![high.id]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_escalation_stops_at_max_level(pool: PgPool) {
    let (user_id, hub_id) = seed_resident(&pool).await;
    let alert = AlertRepo::create(&pool, &new_alert(user_id, hub_id, AlertType::FallDetected, AlertSeverity::Critical))
        .await
        .unwrap();
    backdate_alert(&pool, alert.id, Utc::now() - Duration::minutes(60)).await;

    for level in 0..MAX_LEVEL {
        let next = AlertRepo::escalate(&pool, alert.id, level, MAX_LEVEL).await.unwrap().unwrap();
        assert_eq!(next.escalation_level, level + 1);
    }

    assert!(AlertRepo::escalate(&pool, alert.id, MAX_LEVEL, MAX_LEVEL).await.unwrap().is_none());
    assert!(AlertRepo::list_escalation_candidates(&pool, Utc::now(), STEP_MINUTES, MAX_LEVEL)
        .await
        .unwrap()
        .is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_responded_alerts_are_not_escalation_candidates(pool: PgPool) {
    let (user_id, hub_id) = seed_resident(&pool).await;
    let responder = seed_user(&pool, "Dana").await;
    let alert = AlertRepo::create(&pool, &new_alert(user_id, hub_id, AlertType::Wandering, AlertSeverity::High))
        .await
        .unwrap();
    backdate_alert(&pool, alert.id, Utc::now() - Duration::minutes(30)).await;

    AlertRepo::acknowledge(&pool, alert.id, AlertStatus::Active, responder)
        .await
        .unwrap()
        .unwrap();

    assert!(AlertRepo::list_escalation_candidates(&pool, Utc::now(), STEP_MINUTES, MAX_LEVEL)
        .await
        .unwrap()
        .is_empty());
    assert!(AlertRepo::escalate(&pool, alert.id, 0, MAX_LEVEL).await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_status_changes_apply_only_from_expected_status(pool: PgPool) {
    let (user_id, hub_id) = seed_resident(&pool).await;
    let responder = seed_user(&pool, "Dana").await;
    let alert = AlertRepo::create(&pool, &new_alert(user_id, hub_id, AlertType::NoActivity, AlertSeverity::High))
        .await
        .unwrap();

    let acked = AlertRepo::acknowledge(&pool, alert.id, AlertStatus::Active, responder)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(acked.status, AlertStatus::Acknowledged);
    assert_eq!(acked.acknowledged_by, Some(responder));
    assert!(acked.acknowledged_at.is_some());

    assert!(AlertRepo::acknowledge(&pool, alert.id, AlertStatus::Active, responder)
        .await
        .unwrap()
        .is_none());

    let resolved = AlertRepo::close(
        &pool,
        alert.id,
        AlertStatus::Acknowledged,
        AlertStatus::Resolved,
        responder,
        Some("Checked in by phone"),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(resolved.status, AlertStatus::Resolved);
    assert_eq!(resolved.resolved_by, Some(responder));
    assert_eq!(resolved.resolution_notes.as_deref(), Some("Checked in by phone"));

    assert!(AlertRepo::close(
        &pool,
        alert.id,
        AlertStatus::Acknowledged,
        AlertStatus::Cancelled,
        responder,
        None,
    )
    .await
    .unwrap()
    .is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_history_pages_and_filters(pool: PgPool) {
    let (user_id, hub_id) = seed_resident(&pool).await;
    let responder = seed_user(&pool, "Dana").await;
    let mut ids = Vec::new();
    for (minutes_ago, alert_type) in [
        (30, AlertType::NoActivity),
        (20, AlertType::Wandering),
        (10, AlertType::NoEating),
    ] {
        let alert = AlertRepo::create(&pool, &new_alert(user_id, hub_id, alert_type, AlertSeverity::Medium))
            .await
            .unwrap();
        backdate_alert(&pool, alert.id, Utc::now() - Duration::minutes(minutes_ago)).await;
        ids.push(alert.id);
    }
    AlertRepo::close(&pool, ids[0], AlertStatus::Active, AlertStatus::Cancelled, responder, None)
        .await
        .unwrap()
        .unwrap();

    let (page, total) = AlertRepo::list_history(
        &pool,
        user_id,
        &AlertHistoryQuery {
            limit: 2,
            offset: 1,
            status: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(total, 3);
    assert_eq!(page.iter().map(|a| a.id).collect::<Vec<_>>(), vec![ids[1], ids[0]]);

    let (page, total) = AlertRepo::list_history(
        &pool,
        user_id,
        &AlertHistoryQuery {
            limit: 50,
            offset: 0,
            status: Some(AlertStatus::Cancelled),
        },
    )
    .await
    .unwrap();
    assert_eq!(total, 1);
    assert_eq!(page[0].id, ids[0]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_active_alerts_are_ordered_by_severity(pool: PgPool) {
    let (user_id, hub_id) = seed_resident(&pool).await;
    for (alert_type, severity) in [
        (AlertType::NoEating, AlertSeverity::Medium),
        (AlertType::FallDetected, AlertSeverity::Critical),
        (AlertType::Wandering, AlertSeverity::High),
        (AlertType::BatteryCritical, AlertSeverity::Low),
    ] {
        AlertRepo::create(&pool, &new_alert(user_id, hub_id, alert_type, severity))
            .await
            .unwrap();
    }

    let active = AlertRepo::list_active(&pool, user_id).await.unwrap();

    assert_eq!(
        active.iter().map(|a| a.severity).collect::<Vec<_>>(),
        vec![
            AlertSeverity::Critical,
            AlertSeverity::High,
            AlertSeverity::Medium,
            AlertSeverity::Low
        ]
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_hub_alert_count_uses_half_open_window(pool: PgPool) {
    let (user_id, hub_id) = seed_resident(&pool).await;
    for at in ["2024-01-08T00:00:00Z", "2024-01-08T23:59:00Z", "2024-01-09T00:00:00Z"] {
        let alert = AlertRepo::create(&pool, &new_alert(user_id, hub_id, AlertType::Custom, AlertSeverity::Low))
            .await
            .unwrap();
        backdate_alert(&pool, alert.id, utc(at)).await;
    }

    let count = AlertRepo::count_for_hub_between(
        &pool,
        hub_id,
        utc("2024-01-08T00:00:00Z"),
        utc("2024-01-09T00:00:00Z"),
    )
    .await
    .unwrap();

    assert_eq!(count, 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_delivery_log_records_outcomes(pool: PgPool) {
    let (user_id, hub_id) = seed_resident(&pool).await;
    let member = seed_member(&pool, user_id, "Dana", true, 0, Some("+61400000001")).await;
    let alert = AlertRepo::create(&pool, &new_alert(user_id, hub_id, AlertType::FallDetected, AlertSeverity::Critical))
        .await
        .unwrap();

    let push = AlertNotificationRepo::create_pending(&pool, alert.id, member, NotificationChannel::Push)
        .await
        .unwrap();
    let sms = AlertNotificationRepo::create_pending(&pool, alert.id, member, NotificationChannel::Sms)
        .await
        .unwrap();
    AlertNotificationRepo::mark_sent(&pool, push).await.unwrap();
    AlertNotificationRepo::mark_failed(&pool, sms, "gateway timeout").await.unwrap();

    let rows = AlertNotificationRepo::list_for_alert(&pool, alert.id).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].channel, NotificationChannel::Push);
    assert_eq!(rows[0].status, DeliveryStatus::Sent);
    assert!(rows[0].sent_at.is_some());
    assert_eq!(rows[1].status, DeliveryStatus::Failed);
    assert_eq!(rows[1].error_message.as_deref(), Some("gateway timeout"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_family_chain_order(pool: PgPool) {
    let (user_id, _) = seed_resident(&pool).await;
    let alex = seed_member(&pool, user_id, "Alex", false, 0, Some("+61400000003")).await;
    let sam = seed_member(&pool, user_id, "Sam", true, 1, Some("+61400000002")).await;
    let dana = seed_member(&pool, user_id, "Dana", true, 0, Some("  ")).await;

    let chain = FamilyMemberRepo::list_for_user(&pool, user_id).await.unwrap();
    assert_eq!(chain.iter().map(|m| m.id).collect::<Vec<_>>(), vec![dana, sam, alex]);

    let second = FamilyMemberRepo::at_position(&pool, user_id, 1).await.unwrap().unwrap();
    assert_eq!(second.id, sam);
    assert!(FamilyMemberRepo::at_position(&pool, user_id, 3).await.unwrap().is_none());

    // Dana ranks first but has no usable phone.
    let primary = FamilyMemberRepo::primary_emergency_contact(&pool, user_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(primary.id, sam);
}
