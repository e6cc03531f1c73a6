//! Anomaly classification of a single hub event.
//!
//! [`classify`] is pure: the caller supplies the hub configuration and the
//! baseline average (if one exists for the event's slot) and persists the
//! resulting [`AnomalyVerdict`] alongside the event.

use chrono::{DateTime, Datelike, FixedOffset, Timelike};
use serde::Serialize;

use crate::activity::ActivityEventType;
use crate::alert::AlertType;
use crate::hub_config::HubConfig;

/// Score at or above which an event is flagged as an anomaly.
pub const ANOMALY_THRESHOLD: f64 = 0.5;

/// Baseline average below which any motion in the slot is notable.
pub const QUIET_SLOT_AVG: f64 = 0.5;

/// Score assigned by the quiet-slot baseline override.
pub const QUIET_SLOT_SCORE: f64 = 0.4;

/// The fields of an inbound event the classifier looks at.
#[derive(Debug, Clone)]
pub struct ClassifierInput<'a> {
    /// Raw event type as reported; unknown types classify as non-anomalous.
    pub event_type: &'a str,
    pub room_name: Option<&'a str>,
    /// Event time in the hub's reported offset.
    pub timestamp: DateTime<FixedOffset>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyVerdict {
    pub is_anomaly: bool,
    pub anomaly_score: f64,
    pub reason: Option<String>,
    pub suggested_alert: Option<AlertType>,
}

impl AnomalyVerdict {
    fn new(score: f64, reason: Option<&str>, suggested_alert: Option<AlertType>) -> Self {
        let anomaly_score = score.clamp(0.0, 1.0);
        Self {
            is_anomaly: anomaly_score >= ANOMALY_THRESHOLD,
            anomaly_score,
            reason: reason.map(str::to_string),
            suggested_alert,
        }
    }

    pub fn normal() -> Self {
        Self::new(0.0, None, None)
    }
}

/// Baseline slot of an event: `(day_of_week, hour_of_day)` with Sunday = 0.
pub fn baseline_slot(timestamp: &DateTime<FixedOffset>) -> (i16, i16) {
    (
        timestamp.weekday().num_days_from_sunday() as i16,
        timestamp.hour() as i16,
    )
}

/// Score one event.
///
/// `baseline_avg` is the average motion count of the event's
/// (weekday, hour, room) slot, when a baseline row exists.
pub fn classify(
    input: &ClassifierInput<'_>,
    config: &HubConfig,
    baseline_avg: Option<f64>,
) -> AnomalyVerdict {
    let Ok(kind) = input.event_type.parse::<ActivityEventType>() else {
        return AnomalyVerdict::normal();
    };

    let night = config.is_nighttime(input.timestamp.hour());
    let room = input.room_name.map(str::to_lowercase);
    let room = room.as_deref();

    let (score, reason, suggested) = match kind {
        ActivityEventType::MotionDetected if night => {
            if matches!(room, Some("front door") | Some("back door")) {
                (0.8, Some("Unusual nighttime door activity"), Some(AlertType::Wandering))
            } else {
                (0.3, Some("Nighttime activity detected"), None)
            }
        }
        ActivityEventType::DoorOpened
            if night && room.is_some_and(|r| r.contains("front") || r.contains("back")) =>
        {
            (0.9, Some("Exit door opened at night"), Some(AlertType::Wandering))
        }
        ActivityEventType::FallDetected => {
            (1.0, Some("Potential fall detected"), Some(AlertType::FallDetected))
        }
        ActivityEventType::SmokeDetected => {
            (1.0, Some("Smoke detected"), Some(AlertType::SmokeDetected))
        }
        ActivityEventType::CoDetected => {
            (1.0, Some("Carbon monoxide detected"), Some(AlertType::CoDetected))
        }
        ActivityEventType::WaterLeak => {
            (0.9, Some("Water leak detected"), Some(AlertType::WaterLeak))
        }
        ActivityEventType::BatteryLow => {
            (0.5, Some("Device battery low"), Some(AlertType::BatteryCritical))
        }
        ActivityEventType::DeviceOffline => {
            (0.6, Some("Device went offline"), Some(AlertType::DeviceOffline))
        }
        _ => (0.0, None, None),
    };

    // The override only ever applies when the table left the score at zero.
    if score == 0.0
        && kind == ActivityEventType::MotionDetected
        && baseline_avg.is_some_and(|avg| avg < QUIET_SLOT_AVG)
    {
        return AnomalyVerdict::new(
            QUIET_SLOT_SCORE,
            Some(reason.unwrap_or("Unusual activity for this time")),
            None,
        );
    }

    AnomalyVerdict::new(score, reason, suggested)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
