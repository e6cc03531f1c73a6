//! Inactivity pattern rules evaluated by the periodic sweep.
//!
//! The sweep gathers [`InactivityFacts`] from the activity log and hands them
//! to [`evaluate`]. Checks run narrow-before-broad and stop at the first
//! match:
//!
//! 1. `extended_bathroom`
//! 2. `no_morning_activity`
//! 3. `no_activity`
//! 4. `no_eating`

use chrono::{Duration, NaiveTime, Timelike};
use serde::Serialize;

use crate::alert::{AlertSeverity, AlertType};
use crate::hub_config::{HubConfig, MORNING_CHECK_END_HOUR, MORNING_START_HOUR};
use crate::types::Timestamp;

/// The fridge must be opened by this local hour or `no_eating` fires.
pub const EATING_CHECK_HOUR: u32 = 18;

/// Window over which a fridge door opening counts as a meal.
pub const EATING_WINDOW_HOURS: i64 = 24;

/// What the activity log says about one hub at sweep time.
#[derive(Debug, Clone, Default)]
pub struct InactivityFacts {
    /// Most recent motion / door-open / appliance-on event.
    pub last_activity: Option<Timestamp>,
    /// Most recent motion in a room whose name contains "bathroom".
    pub last_bathroom_motion: Option<Timestamp>,
    /// Any motion in a non-bathroom room after `last_bathroom_motion`.
    pub motion_elsewhere_since_bathroom: bool,
    /// Any activity of interest since [`morning_start`].
    pub activity_since_morning_start: bool,
    /// A fridge door opened within [`EATING_WINDOW_HOURS`].
    pub fridge_opened_recently: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InactivityAlert {
    pub alert_type: AlertType,
    pub message: String,
}

impl InactivityAlert {
    /// Severity used when the sweep raises this alert.
    pub fn severity(&self) -> AlertSeverity {
        match self.alert_type {
            AlertType::ExtendedBathroom | AlertType::NoActivity => AlertSeverity::High,
            _ => AlertSeverity::Medium,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InactivityVerdict {
    pub alert: Option<InactivityAlert>,
    pub last_activity: Option<Timestamp>,
}

impl InactivityVerdict {
    pub fn has_alert(&self) -> bool {
        self.alert.is_some()
    }

    fn fire(alert_type: AlertType, message: String, last_activity: Timestamp) -> Self {
        Self {
            alert: Some(InactivityAlert {
                alert_type,
                message,
            }),
            last_activity: Some(last_activity),
        }
    }
}

/// 06:00 on the resident's current local day, as a UTC instant.
pub fn morning_start(now: Timestamp, config: &HubConfig) -> Timestamp {
    let offset = config.utc_offset();
    let local_midnight = now.with_timezone(&offset).date_naive().and_time(NaiveTime::MIN);
    (local_midnight + Duration::hours(MORNING_START_HOUR as i64)
        - Duration::seconds(offset.local_minus_utc() as i64))
    .and_utc()
}

/// Cutoff for the fridge check.
pub fn eating_window_start(now: Timestamp) -> Timestamp {
    now - Duration::hours(EATING_WINDOW_HOURS)
}

/// Decide whether an inactivity alert should fire at `now`.
pub fn evaluate(facts: &InactivityFacts, config: &HubConfig, now: Timestamp) -> InactivityVerdict {
    let Some(last_activity) = facts.last_activity else {
        return InactivityVerdict {
            alert: None,
            last_activity: None,
        };
    };

    let local_hour = now.with_timezone(&config.utc_offset()).hour();

    if let Some(bathroom) = facts.last_bathroom_motion {
        let minutes = (now - bathroom).num_seconds() as f64 / 60.0;
        if !facts.motion_elsewhere_since_bathroom
            && minutes > config.bathroom_timeout_minutes as f64
        {
            return InactivityVerdict::fire(
                AlertType::ExtendedBathroom,
                format!(
                    "No movement detected for {} minutes since bathroom activity",
                    minutes.round() as i64
                ),
                last_activity,
            );
        }
    }

    if local_hour >= config.morning_deadline_hour
        && local_hour < MORNING_CHECK_END_HOUR
        && !facts.activity_since_morning_start
    {
        let since = morning_start(now, config).with_timezone(&config.utc_offset());
        return InactivityVerdict::fire(
            AlertType::NoMorningActivity,
            format!("No morning activity detected since {}", since.format("%H:%M")),
            last_activity,
        );
    }

    let hours = (now - last_activity).num_seconds() as f64 / 3600.0;
    if hours > config.no_activity_hours as f64 {
        return InactivityVerdict::fire(
            AlertType::NoActivity,
            format!("No activity detected for {} hours", hours.round() as i64),
            last_activity,
        );
    }

    if !facts.fridge_opened_recently && local_hour >= EATING_CHECK_HOUR {
        return InactivityVerdict::fire(
            AlertType::NoEating,
            "Refrigerator has not been opened in 24 hours".to_string(),
            last_activity,
        );
    }

    InactivityVerdict {
        alert: None,
        last_activity: Some(last_activity),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::*;

    fn utc(h: u32, m: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2024, 3, 4, h, m, 0).unwrap()
    }

    /// Facts for a resident who is up and about, fridge used, morning active.
    fn busy(now: Timestamp) -> InactivityFacts {
        InactivityFacts {
            last_activity: Some(now - Duration::minutes(10)),
            last_bathroom_motion: None,
            motion_elsewhere_since_bathroom: false,
            activity_since_morning_start: true,
            fridge_opened_recently: true,
        }
    }

    #[test]
    fn no_history_means_no_alert_and_no_last_activity() {
        let verdict = evaluate(&InactivityFacts::default(), &HubConfig::default(), utc(11, 0));
        assert!(!verdict.has_alert());
        assert_eq!(verdict.last_activity, None);
    }

    #[test]
    fn long_bathroom_stay_fires_first() {
        let now = utc(11, 0);
        let facts = InactivityFacts {
            last_activity: Some(now - Duration::minutes(45)),
            last_bathroom_motion: Some(now - Duration::minutes(45)),
            motion_elsewhere_since_bathroom: false,
            // Morning check would also match; bathroom wins.
            activity_since_morning_start: false,
            fridge_opened_recently: false,
        };
        let verdict = evaluate(&facts, &HubConfig::default(), now);
        let alert = verdict.alert.unwrap();
        assert_eq!(alert.alert_type, AlertType::ExtendedBathroom);
        assert_eq!(
            alert.message,
            "No movement detected for 45 minutes since bathroom activity"
        );
        assert_eq!(alert.severity(), AlertSeverity::High);
    }

    #[test]
    fn motion_elsewhere_clears_bathroom_check() {
        let now = utc(15, 0);
        let mut facts = busy(now);
        facts.last_bathroom_motion = Some(now - Duration::minutes(50));
        facts.motion_elsewhere_since_bathroom = true;
        assert!(!evaluate(&facts, &HubConfig::default(), now).has_alert());
    }

    #[test]
    fn bathroom_timeout_is_configurable() {
        let now = utc(15, 0);
        let mut facts = busy(now);
        facts.last_bathroom_motion = Some(now - Duration::minutes(45));
        let relaxed = HubConfig::from_json(&json!({ "bathroom_timeout_minutes": 60 }));
        assert!(!evaluate(&facts, &relaxed, now).has_alert());
        assert!(evaluate(&facts, &HubConfig::default(), now).has_alert());
    }

    #[test]
    fn quiet_morning_fires_between_ten_and_noon() {
        let mut facts = busy(utc(10, 30));
        facts.activity_since_morning_start = false;

        let verdict = evaluate(&facts, &HubConfig::default(), utc(10, 30));
        let alert = verdict.alert.unwrap();
        assert_eq!(alert.alert_type, AlertType::NoMorningActivity);
        assert_eq!(alert.message, "No morning activity detected since 06:00");
        assert_eq!(alert.severity(), AlertSeverity::Medium);

        assert!(!evaluate(&facts, &HubConfig::default(), utc(9, 59)).has_alert());
        assert!(!evaluate(&facts, &HubConfig::default(), utc(12, 0)).has_alert());
    }

    #[test]
    fn long_silence_fires_no_activity() {
        let now = utc(15, 0);
        let mut facts = busy(now);
        facts.last_activity = Some(now - Duration::hours(13));
        let alert = evaluate(&facts, &HubConfig::default(), now).alert.unwrap();
        assert_eq!(alert.alert_type, AlertType::NoActivity);
        assert_eq!(alert.message, "No activity detected for 13 hours");
    }

    #[test]
    fn unused_fridge_fires_only_in_the_evening() {
        let mut facts = busy(utc(18, 0));
        facts.fridge_opened_recently = false;
        let alert = evaluate(&facts, &HubConfig::default(), utc(18, 0)).alert.unwrap();
        assert_eq!(alert.alert_type, AlertType::NoEating);

        let afternoon = evaluate(&facts, &HubConfig::default(), utc(17, 0));
        assert!(!afternoon.has_alert());
        assert!(afternoon.last_activity.is_some());
    }

    #[test]
    fn local_offset_shifts_hour_and_morning_start() {
        // 00:30 UTC is 10:30 in UTC+10.
        let config = HubConfig::from_json(&json!({ "utc_offset_minutes": 600 }));
        let now = utc(0, 30);
        assert_eq!(morning_start(now, &config), Utc.with_ymd_and_hms(2024, 3, 3, 20, 0, 0).unwrap());

        let mut facts = busy(now);
        facts.activity_since_morning_start = false;
        let alert = evaluate(&facts, &config, now).alert.unwrap();
        assert_eq!(alert.alert_type, AlertType::NoMorningActivity);
    }
}
