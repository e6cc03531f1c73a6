//! Behavioural baseline statistics.
//!
//! A baseline slot is `(day_of_week, hour_of_day, room_name)` in the hub's
//! local time. For each slot the rebuild records the mean number of motion
//! events per day that saw any motion in that slot, and the sample standard
//! deviation of those daily counts.

use std::collections::BTreeMap;

use chrono::{Datelike, FixedOffset, NaiveDate, Timelike};
use serde::Serialize;

use crate::types::Timestamp;

/// History considered by a rebuild.
pub const BASELINE_WINDOW_DAYS: i64 = 30;

/// One motion event as seen by the rebuild.
#[derive(Debug, Clone)]
pub struct MotionSample {
    pub created_at: Timestamp,
    pub room_name: Option<String>,
}

/// Computed statistics for one slot, ready to upsert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotStats {
    pub day_of_week: i16,
    pub hour_of_day: i16,
    pub room_name: Option<String>,
    pub avg_motion_events: f64,
    pub std_motion_events: f64,
    /// Distinct days contributing to the slot.
    pub sample_count: i32,
}

type SlotKey = (i16, i16, Option<String>);

/// Bucket `samples` into slots and compute per-slot statistics.
///
/// Slots come back ordered by day, hour, then room.
pub fn compute_slots(samples: &[MotionSample], offset: FixedOffset) -> Vec<SlotStats> {
    let mut slots: BTreeMap<SlotKey, BTreeMap<NaiveDate, u32>> = BTreeMap::new();

    for sample in samples {
        let local = sample.created_at.with_timezone(&offset);
        let key = (
            local.weekday().num_days_from_sunday() as i16,
            local.hour() as i16,
            sample.room_name.clone(),
        );
        *slots
            .entry(key)
            .or_default()
            .entry(local.date_naive())
            .or_default() += 1;
    }

    slots
        .into_iter()
        .map(|((day_of_week, hour_of_day, room_name), days)| {
            let counts: Vec<f64> = days.values().map(|c| f64::from(*c)).collect();
            SlotStats {
                day_of_week,
                hour_of_day,
                room_name,
                avg_motion_events: mean(&counts),
                std_motion_events: sample_std_dev(&counts),
                sample_count: counts.len() as i32,
            }
        })
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Bessel-corrected standard deviation; zero below two samples.
fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn sample(day: u32, hour: u32, minute: u32, room: Option<&str>) -> MotionSample {
        MotionSample {
            created_at: Utc.with_ymd_and_hms(2024, 1, day, hour, minute, 0).unwrap(),
            room_name: room.map(str::to_string),
        }
    }

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn averages_per_contributing_day() {
        // Two Mondays (Jan 1 and Jan 8): three events then one event at 08:xx.
        let samples = vec![
            sample(1, 8, 0, Some("Kitchen")),
            sample(1, 8, 10, Some("Kitchen")),
            sample(1, 8, 20, Some("Kitchen")),
            sample(8, 8, 5, Some("Kitchen")),
        ];
        let slots = compute_slots(&samples, utc());
        assert_eq!(slots.len(), 1);
        let slot = &slots[0];
        assert_eq!((slot.day_of_week, slot.hour_of_day), (1, 8));
        assert_eq!(slot.sample_count, 2);
        assert_eq!(slot.avg_motion_events, 2.0);
        assert!((slot.std_motion_events - std::f64::consts::SQRT_2).abs() < 1e-9);
    }

    #[test]
    fn single_day_has_zero_spread() {
        let slots = compute_slots(&[sample(2, 14, 0, None)], utc());
        assert_eq!(slots[0].std_motion_events, 0.0);
        assert_eq!(slots[0].room_name, None);
    }

    #[test]
    fn rooms_and_hours_are_separate_slots() {
        let samples = vec![
            sample(1, 8, 0, Some("Kitchen")),
            sample(1, 8, 0, Some("Lounge")),
            sample(1, 9, 0, Some("Kitchen")),
        ];
        let slots = compute_slots(&samples, utc());
        assert_eq!(slots.len(), 3);
        assert!(slots.iter().all(|s| s.avg_motion_events == 1.0));
    }

    #[test]
    fn local_offset_moves_events_across_midnight() {
        // Sunday 23:30 UTC is Monday 09:30 in UTC+10.
        let samples = vec![sample(7, 23, 30, Some("Kitchen"))];
        let plus_ten = FixedOffset::east_opt(10 * 3600).unwrap();
        let slot = &compute_slots(&samples, plus_ten)[0];
        assert_eq!((slot.day_of_week, slot.hour_of_day), (1, 9));
    }
}
