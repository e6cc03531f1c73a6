//! Family member notification preferences and per-member channel planning.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::alert::{AlertSeverity, AlertType};
use crate::channels::NotificationChannel;

/// Preference flags stored in `family_members.notification_preferences`.
///
/// Keys missing from the stored JSON take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationPreferences {
    pub check_in: bool,
    pub emergency: bool,
    pub activity_alerts: bool,
    pub daily_summary: bool,
    pub push_enabled: bool,
    pub sms_enabled: bool,
    pub email_enabled: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            check_in: true,
            emergency: true,
            activity_alerts: true,
            daily_summary: false,
            push_enabled: true,
            sms_enabled: true,
            email_enabled: false,
        }
    }
}

impl NotificationPreferences {
    /// Lenient parse; anything that is not an object yields the defaults.
    pub fn from_json(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }
}

/// Which preference flag gates an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationCategory {
    Emergency,
    Activity,
}

impl NotificationCategory {
    pub fn for_alert(alert_type: AlertType) -> Self {
        match alert_type {
            AlertType::EmergencyButton
            | AlertType::FallDetected
            | AlertType::SmokeDetected
            | AlertType::CoDetected => Self::Emergency,
            _ => Self::Activity,
        }
    }
}

/// The parts of a family member that decide how they are contacted.
#[derive(Debug, Clone, Copy)]
pub struct Recipient<'a> {
    pub is_emergency_contact: bool,
    pub phone: Option<&'a str>,
    pub email: Option<&'a str>,
    pub preferences: &'a NotificationPreferences,
}

impl Recipient<'_> {
    pub fn has_phone(&self) -> bool {
        self.phone.is_some_and(|p| !p.trim().is_empty())
    }

    pub fn has_email(&self) -> bool {
        self.email.is_some_and(|e| !e.trim().is_empty())
    }
}

/// Whether this member hears about the alert at all.
///
/// Emergency contacts always hear about critical alerts; everyone else goes
/// by their category preference.
pub fn should_notify(
    recipient: &Recipient<'_>,
    alert_type: AlertType,
    severity: AlertSeverity,
) -> bool {
    if severity == AlertSeverity::Critical && recipient.is_emergency_contact {
        return true;
    }
    match NotificationCategory::for_alert(alert_type) {
        NotificationCategory::Emergency => recipient.preferences.emergency,
        NotificationCategory::Activity => recipient.preferences.activity_alerts,
    }
}

/// Every channel this member should be contacted on, in send order.
pub fn plan_channels(recipient: &Recipient<'_>, severity: AlertSeverity) -> Vec<NotificationChannel> {
    let prefs = recipient.preferences;
    let mut channels = Vec::with_capacity(3);

    if prefs.push_enabled {
        channels.push(NotificationChannel::Push);
    }
    if prefs.sms_enabled && recipient.has_phone() {
        channels.push(NotificationChannel::Sms);
    }
    if prefs.email_enabled && recipient.has_email() {
        channels.push(NotificationChannel::Email);
    }
    if severity == AlertSeverity::Critical
        && recipient.has_phone()
        && !channels.contains(&NotificationChannel::Sms)
    {
        channels.push(NotificationChannel::Sms);
    }

    channels
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
