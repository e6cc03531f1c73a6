//! Dedup window and escalation schedule for alerts.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::alert::{AlertSeverity, AlertStatus};
use crate::types::Timestamp;

pub const DEFAULT_DEDUP_WINDOW_MINUTES: i64 = 15;
pub const DEFAULT_ESCALATION_STEP_MINUTES: i64 = 5;
pub const DEFAULT_MAX_ESCALATION_LEVEL: i32 = 3;

/// Escalation level from which critical alerts also get a voice call.
pub const VOICE_ESCALATION_LEVEL: i32 = 2;

/// Timing knobs for alert suppression and escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertPolicy {
    pub dedup_window_minutes: i64,
    pub escalation_step_minutes: i64,
    pub max_escalation_level: i32,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            dedup_window_minutes: DEFAULT_DEDUP_WINDOW_MINUTES,
            escalation_step_minutes: DEFAULT_ESCALATION_STEP_MINUTES,
            max_escalation_level: DEFAULT_MAX_ESCALATION_LEVEL,
        }
    }
}

impl AlertPolicy {
    /// Alerts created after this instant suppress a new one of the same kind.
    pub fn dedup_cutoff(&self, now: Timestamp) -> Timestamp {
        now - Duration::minutes(self.dedup_window_minutes)
    }

    /// Age an alert at `level` must reach before it advances to `level + 1`.
    pub fn escalation_threshold(&self, level: i32) -> Duration {
        Duration::minutes(self.escalation_step_minutes * (i64::from(level) + 1))
    }

    /// Whether an alert with these attributes should advance at `now`.
    pub fn is_escalation_due(
        &self,
        status: AlertStatus,
        severity: AlertSeverity,
        level: i32,
        created_at: Timestamp,
        now: Timestamp,
    ) -> bool {
        status.is_open()
            && severity.is_escalatable()
            && level < self.max_escalation_level
            && now - created_at >= self.escalation_threshold(level)
    }
}

/// Critical alerts at a deep enough level are also phoned through.
pub fn requires_voice(severity: AlertSeverity, new_level: i32) -> bool {
    severity == AlertSeverity::Critical && new_level >= VOICE_ESCALATION_LEVEL
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
