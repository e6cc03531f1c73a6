//! Per-hub behaviour settings read from the `hubs.configuration` JSON column.
//!
//! The column is opaque to the rest of the platform; only the keys below are
//! interpreted here. Missing or malformed values fall back to the defaults.

use chrono::{FixedOffset, Offset, Utc};
use serde_json::Value;

/// Night mode starts at 22:00 unless configured.
pub const DEFAULT_NIGHT_START_HOUR: u32 = 22;
/// Night mode ends at 06:00 unless configured.
pub const DEFAULT_NIGHT_END_HOUR: u32 = 6;
pub const DEFAULT_BATHROOM_TIMEOUT_MINUTES: i64 = 30;
pub const DEFAULT_NO_ACTIVITY_HOURS: i64 = 12;
/// Hour from which a missing morning routine is reported.
pub const DEFAULT_MORNING_DEADLINE_HOUR: u32 = 10;
/// The morning check stops applying at noon.
pub const MORNING_CHECK_END_HOUR: u32 = 12;
/// "Morning" activity is counted from 06:00 local time.
pub const MORNING_START_HOUR: u32 = 6;

/// Largest accepted UTC offset (UTC+14:00 / UTC-14:00).
const MAX_UTC_OFFSET_MINUTES: i64 = 14 * 60;

#[derive(Debug, Clone, PartialEq)]
pub struct HubConfig {
    pub night_start_hour: u32,
    pub night_end_hour: u32,
    pub bathroom_timeout_minutes: i64,
    pub no_activity_hours: i64,
    pub morning_deadline_hour: u32,
    /// Offset of the resident's local time from UTC, used by the sweeps.
    pub utc_offset_minutes: i32,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            night_start_hour: DEFAULT_NIGHT_START_HOUR,
            night_end_hour: DEFAULT_NIGHT_END_HOUR,
            bathroom_timeout_minutes: DEFAULT_BATHROOM_TIMEOUT_MINUTES,
            no_activity_hours: DEFAULT_NO_ACTIVITY_HOURS,
            morning_deadline_hour: DEFAULT_MORNING_DEADLINE_HOUR,
            utc_offset_minutes: 0,
        }
    }
}

impl HubConfig {
    /// Read the interpreted keys out of a hub's configuration JSON.
    pub fn from_json(value: &Value) -> Self {
        let defaults = Self::default();
        Self {
            night_start_hour: parse_hour(value.get("night_mode_start"))
                .unwrap_or(defaults.night_start_hour),
            night_end_hour: parse_hour(value.get("night_mode_end"))
                .unwrap_or(defaults.night_end_hour),
            bathroom_timeout_minutes: positive_int(value.get("bathroom_timeout_minutes"))
                .unwrap_or(defaults.bathroom_timeout_minutes),
            no_activity_hours: positive_int(value.get("no_activity_hours"))
                .unwrap_or(defaults.no_activity_hours),
            morning_deadline_hour: parse_hour(value.get("morning_activity_deadline"))
                .unwrap_or(defaults.morning_deadline_hour),
            utc_offset_minutes: value
                .get("utc_offset_minutes")
                .and_then(Value::as_i64)
                .filter(|m| m.abs() <= MAX_UTC_OFFSET_MINUTES)
                .and_then(|m| i32::try_from(m).ok())
                .unwrap_or(defaults.utc_offset_minutes),
        }
    }

    /// Whether `hour` (0-23, local) falls inside the night-mode window.
    pub fn is_nighttime(&self, hour: u32) -> bool {
        is_nighttime(hour, self.night_start_hour, self.night_end_hour)
    }

    /// The resident's local offset; UTC when unset.
    pub fn utc_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }
}

/// Night window test. A window whose start is after its end wraps midnight.
pub fn is_nighttime(hour: u32, night_start: u32, night_end: u32) -> bool {
    if night_start <= night_end {
        hour >= night_start && hour < night_end
    } else {
        hour >= night_start || hour < night_end
    }
}

/// Hour component of an `"HH:MM"` string.
fn parse_hour(value: Option<&Value>) -> Option<u32> {
    value
        .and_then(Value::as_str)
        .and_then(|s| s.split(':').next())
        .and_then(|h| h.trim().parse::<u32>().ok())
        .filter(|h| *h < 24)
}

/// A strictly positive whole number (zero falls back to the default).
fn positive_int(value: Option<&Value>) -> Option<i64> {
    value
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
        .filter(|n| *n > 0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn wrapping_window_matches_late_and_early_hours() {
        assert!(is_nighttime(23, 22, 6));
        assert!(is_nighttime(22, 22, 6));
        assert!(is_nighttime(0, 22, 6));
        assert!(is_nighttime(5, 22, 6));
        assert!(!is_nighttime(6, 22, 6));
        assert!(!is_nighttime(12, 22, 6));
    }

    #[test]
    fn non_wrapping_window_is_half_open() {
        assert!(is_nighttime(1, 1, 5));
        assert!(is_nighttime(4, 1, 5));
        assert!(!is_nighttime(5, 1, 5));
        assert!(!is_nighttime(0, 1, 5));
    }

    #[test]
    fn equal_bounds_never_night() {
        for hour in 0..24 {
            assert!(!is_nighttime(hour, 3, 3));
        }
    }

    #[test]
    fn empty_config_uses_defaults() {
        assert_eq!(HubConfig::from_json(&json!({})), HubConfig::default());
        assert_eq!(HubConfig::from_json(&Value::Null), HubConfig::default());
    }

    #[test]
    fn reads_hour_component_of_night_mode_strings() {
        let config = HubConfig::from_json(&json!({
            "night_mode_start": "21:30",
            "night_mode_end": "07:15",
        }));
        assert_eq!(config.night_start_hour, 21);
        assert_eq!(config.night_end_hour, 7);
        assert!(config.is_nighttime(21));
        assert!(!config.is_nighttime(7));
    }

    #[test]
    fn malformed_values_fall_back() {
        let config = HubConfig::from_json(&json!({
            "night_mode_start": "late",
            "night_mode_end": "25:00",
            "bathroom_timeout_minutes": 0,
            "no_activity_hours": "many",
            "utc_offset_minutes": 100000,
        }));
        assert_eq!(config, HubConfig::default());
    }

    #[test]
    fn thresholds_and_offset_are_read() {
        let config = HubConfig::from_json(&json!({
            "bathroom_timeout_minutes": 45,
            "no_activity_hours": 8,
            "morning_activity_deadline": "09:00",
            "utc_offset_minutes": 600,
        }));
        assert_eq!(config.bathroom_timeout_minutes, 45);
        assert_eq!(config.no_activity_hours, 8);
        assert_eq!(config.morning_deadline_hour, 9);
        assert_eq!(config.utc_offset().local_minus_utc(), 600 * 60);
    }
}
