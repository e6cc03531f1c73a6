//! Daily and weekly activity summaries for the family dashboard.
//!
//! A "day" is the resident's local calendar day, taken from the hub's
//! configured UTC offset. Motion figures count `motion_detected` events only.

use chrono::{Duration, FixedOffset, NaiveDate, NaiveTime};
use serde::Serialize;

use crate::messages::CheckInStatus;
use crate::types::Timestamp;

/// Days covered by a weekly summary, today included.
pub const WEEK_DAYS: i64 = 7;

/// Motion figures for one day, as aggregated by the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MotionDayStats {
    pub first_activity: Option<Timestamp>,
    pub last_activity: Option<Timestamp>,
    pub total_motion_events: i64,
    /// Distinct non-empty room names, sorted.
    pub rooms_visited: Vec<String>,
    pub anomalies_detected: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyActivitySummary {
    pub date: NaiveDate,
    pub first_activity: Option<Timestamp>,
    pub last_activity: Option<Timestamp>,
    pub total_motion_events: i64,
    pub rooms_visited: Vec<String>,
    /// Status of the day's latest check-in, if there was one.
    pub check_in_status: Option<String>,
    pub alerts_triggered: i64,
    pub anomalies_detected: i64,
}

impl DailyActivitySummary {
    pub fn new(
        date: NaiveDate,
        motion: MotionDayStats,
        check_in_status: Option<String>,
        alerts_triggered: i64,
    ) -> Self {
        Self {
            date,
            first_activity: motion.first_activity,
            last_activity: motion.last_activity,
            total_motion_events: motion.total_motion_events,
            rooms_visited: motion.rooms_visited,
            check_in_status,
            alerts_triggered,
            anomalies_detected: motion.anomalies_detected,
        }
    }

    pub fn checked_in_ok(&self) -> bool {
        self.check_in_status.as_deref() == Some(CheckInStatus::Ok.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyActivitySummary {
    /// Days whose latest check-in was `ok`.
    pub check_ins_completed: usize,
    pub check_ins_total: usize,
    pub unusual_events: i64,
    /// Oldest day first.
    pub daily_summaries: Vec<DailyActivitySummary>,
}

impl WeeklyActivitySummary {
    pub fn from_days(daily_summaries: Vec<DailyActivitySummary>) -> Self {
        Self {
            check_ins_completed: daily_summaries.iter().filter(|d| d.checked_in_ok()).count(),
            check_ins_total: daily_summaries.len(),
            unusual_events: daily_summaries.iter().map(|d| d.anomalies_detected).sum(),
            daily_summaries,
        }
    }
}

/// UTC bounds `[start, end)` of a local calendar day.
pub fn local_day_bounds(date: NaiveDate, offset: FixedOffset) -> (Timestamp, Timestamp) {
    let midnight = date.and_time(NaiveTime::MIN).and_utc();
    let start = midnight - Duration::seconds(i64::from(offset.local_minus_utc()));
    (start, start + Duration::days(1))
}

/// The local date of `now` at `offset`.
pub fn local_date(now: Timestamp, offset: FixedOffset) -> NaiveDate {
    now.with_timezone(&offset).date_naive()
}

/// The seven local dates ending with `today`, oldest first.
pub fn week_ending(today: NaiveDate) -> Vec<NaiveDate> {
    (0..WEEK_DAYS)
        .rev()
        .map(|back| today - Duration::days(back))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
