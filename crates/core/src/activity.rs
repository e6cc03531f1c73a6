//! Activity event kinds reported by hub sensors and the room/location
//! matching rules used by the inactivity checks.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Closed set of sensor/device occurrences a hub can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityEventType {
    MotionDetected,
    MotionStopped,
    DoorOpened,
    DoorClosed,
    ButtonPressed,
    BedOccupied,
    BedVacant,
    ApplianceOn,
    ApplianceOff,
    SmokeDetected,
    CoDetected,
    WaterLeak,
    FallDetected,
    TemperatureAlert,
    BatteryLow,
    DeviceOffline,
}

impl ActivityEventType {
    pub const ALL: [ActivityEventType; 16] = [
        Self::MotionDetected,
        Self::MotionStopped,
        Self::DoorOpened,
        Self::DoorClosed,
        Self::ButtonPressed,
        Self::BedOccupied,
        Self::BedVacant,
        Self::ApplianceOn,
        Self::ApplianceOff,
        Self::SmokeDetected,
        Self::CoDetected,
        Self::WaterLeak,
        Self::FallDetected,
        Self::TemperatureAlert,
        Self::BatteryLow,
        Self::DeviceOffline,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::MotionDetected => "motion_detected",
            Self::MotionStopped => "motion_stopped",
            Self::DoorOpened => "door_opened",
            Self::DoorClosed => "door_closed",
            Self::ButtonPressed => "button_pressed",
            Self::BedOccupied => "bed_occupied",
            Self::BedVacant => "bed_vacant",
            Self::ApplianceOn => "appliance_on",
            Self::ApplianceOff => "appliance_off",
            Self::SmokeDetected => "smoke_detected",
            Self::CoDetected => "co_detected",
            Self::WaterLeak => "water_leak",
            Self::FallDetected => "fall_detected",
            Self::TemperatureAlert => "temperature_alert",
            Self::BatteryLow => "battery_low",
            Self::DeviceOffline => "device_offline",
        }
    }

    /// Whether this kind counts as a sign of life for inactivity checks.
    pub fn is_activity_of_interest(self) -> bool {
        ACTIVITY_OF_INTEREST.contains(&self)
    }
}

impl fmt::Display for ActivityEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityEventType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown activity event type '{s}'")))
    }
}

impl TryFrom<String> for ActivityEventType {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Event kinds that count as "the resident is up and about".
pub const ACTIVITY_OF_INTEREST: &[ActivityEventType] = &[
    ActivityEventType::MotionDetected,
    ActivityEventType::DoorOpened,
    ActivityEventType::ApplianceOn,
];

// ---------------------------------------------------------------------------
// Room and location matching
// ---------------------------------------------------------------------------

/// Case-insensitive substring match used for room names and device locations.
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

pub fn is_bathroom(room_name: &str) -> bool {
    contains_ignore_case(room_name, "bathroom")
}

/// A device location that identifies a refrigerator door sensor.
pub fn is_fridge_location(location: &str) -> bool {
    contains_ignore_case(location, "fridge") || contains_ignore_case(location, "refrigerator")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
