//! Inbound hub message contract.
//!
//! Hubs send JSON envelopes of the form
//! `{"type": "event", "payload": {...}}`. Payload fields are camelCase.
//! Fields a hub may omit take the same defaults the intake always applied:
//! status `online`, emergency source `hub_button`, check-in type
//! `manual_hub`, check-in status `ok`, timestamp "now".

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationErrors};

use crate::types::DbId;

fn now() -> DateTime<FixedOffset> {
    Utc::now().fixed_offset()
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum HubMessage {
    Status(HubStatusMessage),
    Event(DeviceEventMessage),
    Emergency(EmergencyMessage),
    Checkin(CheckInMessage),
}

impl HubMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Status(_) => "status",
            Self::Event(_) => "event",
            Self::Emergency(_) => "emergency",
            Self::Checkin(_) => "checkin",
        }
    }

    pub fn hub_id(&self) -> DbId {
        match self {
            Self::Status(m) => m.hub_id,
            Self::Event(m) => m.hub_id,
            Self::Emergency(m) => m.hub_id,
            Self::Checkin(m) => m.hub_id,
        }
    }

    /// Field-level validation of whichever payload this carries.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        match self {
            Self::Status(m) => m.validate(),
            Self::Event(m) => m.validate(),
            Self::Emergency(m) => m.validate(),
            Self::Checkin(m) => m.validate(),
        }
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HubStatus {
    #[default]
    Online,
    Offline,
    Updating,
    Error,
}

impl HubStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Updating => "updating",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct HubStatusMessage {
    pub hub_id: DbId,
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub status: HubStatus,
    #[serde(default)]
    pub firmware_version: Option<String>,
    #[validate(range(min = 0, max = 100))]
    pub battery_level: Option<i32>,
    #[serde(default)]
    pub is_on_battery: bool,
    #[validate(range(min = -100, max = 0))]
    pub wifi_strength: Option<i32>,
    #[serde(default = "now")]
    pub timestamp: DateTime<FixedOffset>,
}

// ---------------------------------------------------------------------------
// Device event
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DeviceEventMessage {
    pub hub_id: DbId,
    pub device_id: Option<DbId>,
    pub device_category: Option<String>,
    /// Kept as reported; unknown kinds are still stored.
    #[validate(length(min = 1, max = 50))]
    pub event_type: String,
    #[validate(length(max = 100))]
    pub room_name: Option<String>,
    #[serde(default = "empty_object")]
    pub sensor_data: serde_json::Value,
    #[validate(range(min = 0, max = 100))]
    pub battery_level: Option<i32>,
    #[serde(default = "now")]
    pub timestamp: DateTime<FixedOffset>,
}

// ---------------------------------------------------------------------------
// Emergency
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmergencySource {
    Pendant,
    #[default]
    HubButton,
    Voice,
    App,
    FallSensor,
}

impl EmergencySource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pendant => "pendant",
            Self::HubButton => "hub_button",
            Self::Voice => "voice",
            Self::App => "app",
            Self::FallSensor => "fall_sensor",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyMessage {
    pub hub_id: DbId,
    pub user_id: DbId,
    #[serde(default)]
    pub source: EmergencySource,
    #[validate(length(max = 100))]
    pub location: Option<String>,
    #[serde(default = "now")]
    pub timestamp: DateTime<FixedOffset>,
}

// ---------------------------------------------------------------------------
// Check-in
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckInType {
    ManualApp,
    #[default]
    ManualHub,
    Voice,
    AutoDetected,
    ReminderResponse,
}

impl CheckInType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ManualApp => "manual_app",
            Self::ManualHub => "manual_hub",
            Self::Voice => "voice",
            Self::AutoDetected => "auto_detected",
            Self::ReminderResponse => "reminder_response",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckInStatus {
    #[default]
    Ok,
    HelpNeeded,
    Missed,
    Late,
}

impl CheckInStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::HelpNeeded => "help_needed",
            Self::Missed => "missed",
            Self::Late => "late",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CheckInMessage {
    pub hub_id: DbId,
    pub user_id: DbId,
    #[serde(rename = "type", default)]
    pub check_in_type: CheckInType,
    #[serde(default)]
    pub status: CheckInStatus,
    #[serde(default = "now")]
    pub timestamp: DateTime<FixedOffset>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_device_event_envelope() {
        let msg: HubMessage = serde_json::from_value(json!({
            "type": "event",
            "payload": {
                "hubId": 7,
                "deviceId": 42,
                "deviceCategory": "motion_sensor",
                "eventType": "motion_detected",
                "roomName": "Front Door",
                "sensorData": { "lux": 3 },
                "batteryLevel": 80,
                "timestamp": "2024-01-01T02:00:00+10:00"
            }
        }))
        .unwrap();

        assert_eq!(msg.kind(), "event");
        assert_eq!(msg.hub_id(), 7);
        let event = assert_matches!(msg, HubMessage::Event(e) => e);
        assert_eq!(event.device_id, Some(42));
        assert_eq!(event.room_name.as_deref(), Some("Front Door"));
        assert_eq!(event.timestamp.offset().local_minus_utc(), 10 * 3600);
    }

    #[test]
    fn omitted_fields_take_intake_defaults() {
        let emergency: HubMessage = serde_json::from_value(json!({
            "type": "emergency",
            "payload": { "hubId": 1, "userId": 2 }
        }))
        .unwrap();
        let emergency = assert_matches!(emergency, HubMessage::Emergency(e) => e);
        assert_eq!(emergency.source, EmergencySource::HubButton);

        let checkin: HubMessage = serde_json::from_value(json!({
            "type": "checkin",
            "payload": { "hubId": 1, "userId": 2 }
        }))
        .unwrap();
        let checkin = assert_matches!(checkin, HubMessage::Checkin(c) => c);
        assert_eq!(checkin.check_in_type, CheckInType::ManualHub);
        assert_eq!(checkin.status, CheckInStatus::Ok);

        let status: HubMessage = serde_json::from_value(json!({
            "type": "status",
            "payload": { "hubId": 1 }
        }))
        .unwrap();
        let status = assert_matches!(status, HubMessage::Status(s) => s);
        assert_eq!(status.status, HubStatus::Online);
        assert!(!status.is_on_battery);
    }

    #[test]
    fn check_in_type_reads_from_type_key() {
        let msg: HubMessage = serde_json::from_value(json!({
            "type": "checkin",
            "payload": { "hubId": 1, "userId": 2, "type": "voice", "status": "help_needed" }
        }))
        .unwrap();
        let checkin = assert_matches!(msg, HubMessage::Checkin(c) => c);
        assert_eq!(checkin.check_in_type, CheckInType::Voice);
        assert_eq!(checkin.status, CheckInStatus::HelpNeeded);
    }

    #[test]
    fn out_of_range_readings_fail_validation() {
        let msg: HubMessage = serde_json::from_value(json!({
            "type": "status",
            "payload": { "hubId": 1, "batteryLevel": 140, "wifiStrength": -40 }
        }))
        .unwrap();
        assert!(msg.validate().is_err());

        let msg: HubMessage = serde_json::from_value(json!({
            "type": "event",
            "payload": { "hubId": 1, "eventType": "" }
        }))
        .unwrap();
        assert!(msg.validate().is_err());
    }

    #[test]
    fn unknown_message_type_is_rejected() {
        let result = serde_json::from_value::<HubMessage>(json!({
            "type": "command",
            "payload": {}
        }));
        assert!(result.is_err());
    }
}
