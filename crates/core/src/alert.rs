//! Alert kinds, severities and the alert lifecycle state machine.
//!
//! Transition rules:
//! - `active`       -> `acknowledged`, `resolved`, `cancelled`, `escalated`
//! - `escalated`    -> `acknowledged`, `resolved`, `cancelled`, `escalated`
//! - `acknowledged` -> `resolved`, `cancelled`
//! - `resolved`, `cancelled` are terminal.
//!
//! `acknowledged` halts escalation: the escalation sweep only considers
//! alerts that are still open (`active` or `escalated`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// AlertType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    EmergencyButton,
    FallDetected,
    NoMorningActivity,
    ExtendedBathroom,
    NoActivity,
    Wandering,
    NoEating,
    MedicationMissed,
    SmokeDetected,
    CoDetected,
    WaterLeak,
    DeviceOffline,
    HubOffline,
    BatteryCritical,
    Custom,
}

impl AlertType {
    pub const ALL: [AlertType; 15] = [
        Self::EmergencyButton,
        Self::FallDetected,
        Self::NoMorningActivity,
        Self::ExtendedBathroom,
        Self::NoActivity,
        Self::Wandering,
        Self::NoEating,
        Self::MedicationMissed,
        Self::SmokeDetected,
        Self::CoDetected,
        Self::WaterLeak,
        Self::DeviceOffline,
        Self::HubOffline,
        Self::BatteryCritical,
        Self::Custom,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::EmergencyButton => "emergency_button",
            Self::FallDetected => "fall_detected",
            Self::NoMorningActivity => "no_morning_activity",
            Self::ExtendedBathroom => "extended_bathroom",
            Self::NoActivity => "no_activity",
            Self::Wandering => "wandering",
            Self::NoEating => "no_eating",
            Self::MedicationMissed => "medication_missed",
            Self::SmokeDetected => "smoke_detected",
            Self::CoDetected => "co_detected",
            Self::WaterLeak => "water_leak",
            Self::DeviceOffline => "device_offline",
            Self::HubOffline => "hub_offline",
            Self::BatteryCritical => "battery_critical",
            Self::Custom => "custom",
        }
    }

    /// Default headline used when the pipeline raises an alert on its own.
    pub fn default_title(self) -> &'static str {
        match self {
            Self::EmergencyButton => "EMERGENCY - Help Requested",
            Self::FallDetected => "Possible Fall Detected",
            Self::NoMorningActivity => "No Morning Activity",
            Self::ExtendedBathroom => "Extended Time in Bathroom",
            Self::NoActivity => "No Activity Detected",
            Self::Wandering => "Possible Wandering",
            Self::NoEating => "No Kitchen Activity",
            Self::MedicationMissed => "Medication Missed",
            Self::SmokeDetected => "Smoke Detected",
            Self::CoDetected => "Carbon Monoxide Detected",
            Self::WaterLeak => "Water Leak Detected",
            Self::DeviceOffline => "Device Offline",
            Self::HubOffline => "Hub Offline",
            Self::BatteryCritical => "Device Battery Low",
            Self::Custom => "Alert",
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown alert type '{s}'")))
    }
}

impl TryFrom<String> for AlertType {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ---------------------------------------------------------------------------
// AlertSeverity
// ---------------------------------------------------------------------------

/// Ordered from least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// Anomaly score at or above which a classifier-raised alert is critical.
pub const CRITICAL_SCORE_THRESHOLD: f64 = 0.9;

impl AlertSeverity {
    pub const ALL: [AlertSeverity; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Severity for an alert raised from an anomalous event.
    pub fn from_anomaly_score(score: f64) -> Self {
        if score >= CRITICAL_SCORE_THRESHOLD {
            Self::Critical
        } else {
            Self::High
        }
    }

    /// Only high and critical alerts walk the escalation chain.
    pub fn is_escalatable(self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }

    /// Header colour used by the email template.
    pub fn color(self) -> &'static str {
        match self {
            Self::Low => "#3B82F6",
            Self::Medium => "#F59E0B",
            Self::High => "#EF4444",
            Self::Critical => "#DC2626",
        }
    }
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertSeverity {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown alert severity '{s}'")))
    }
}

impl TryFrom<String> for AlertSeverity {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ---------------------------------------------------------------------------
// AlertStatus + transitions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Active,
    Acknowledged,
    Resolved,
    Cancelled,
    Escalated,
}

/// An operation that moves an alert between statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertAction {
    Acknowledge,
    Resolve,
    Cancel,
    Escalate,
}

impl AlertAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Acknowledge => "acknowledge",
            Self::Resolve => "resolve",
            Self::Cancel => "cancel",
            Self::Escalate => "escalate",
        }
    }

    /// Status an alert lands in after this action succeeds.
    pub fn target(self) -> AlertStatus {
        match self {
            Self::Acknowledge => AlertStatus::Acknowledged,
            Self::Resolve => AlertStatus::Resolved,
            Self::Cancel => AlertStatus::Cancelled,
            Self::Escalate => AlertStatus::Escalated,
        }
    }
}

impl AlertStatus {
    pub const ALL: [AlertStatus; 5] = [
        Self::Active,
        Self::Acknowledged,
        Self::Resolved,
        Self::Cancelled,
        Self::Escalated,
    ];

    /// Statuses still awaiting a response from family.
    pub const OPEN: [AlertStatus; 2] = [Self::Active, Self::Escalated];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Acknowledged => "acknowledged",
            Self::Resolved => "resolved",
            Self::Cancelled => "cancelled",
            Self::Escalated => "escalated",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::Cancelled)
    }

    pub fn is_open(self) -> bool {
        Self::OPEN.contains(&self)
    }

    /// Apply `action` to this status, rejecting moves the lifecycle forbids.
    pub fn transition(self, action: AlertAction) -> Result<AlertStatus, CoreError> {
        let allowed = match (self, action) {
            (Self::Active | Self::Escalated, _) => true,
            (Self::Acknowledged, AlertAction::Resolve | AlertAction::Cancel) => true,
            _ => false,
        };

        if allowed {
            Ok(action.target())
        } else {
            Err(CoreError::InvalidTransition {
                from: self.as_str(),
                action: action.as_str(),
            })
        }
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown alert status '{s}'")))
    }
}

impl TryFrom<String> for AlertStatus {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
