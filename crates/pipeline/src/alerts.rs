//! Alert lifecycle: creation with duplicate suppression, family responses,
//! emergencies and the escalation sweep.
//!
//! Every status change is checked against the lifecycle in
//! [`safehome_core::alert::AlertStatus::transition`] first and then applied as a conditional
//! update keyed on the status that was read, so a response that races
//! another response or a sweep fails with a conflict instead of
//! overwriting it.

use std::sync::Arc;

use chrono::Utc;
use safehome_core::alert::{AlertAction, AlertSeverity, AlertType};
use safehome_core::channels::NotificationChannel;
use safehome_core::error::CoreError;
use safehome_core::escalation::{requires_voice, AlertPolicy};
use safehome_core::messages::EmergencySource;
use safehome_core::types::{DbId, Timestamp};
use safehome_db::models::alert::{
    Alert, AlertHistoryQuery, AlertNotification, AlertPage, CreateAlert,
};
use safehome_events::bus::family_room;
use safehome_events::{AlertEvent, EventBus};
use serde_json::json;

use crate::error::PipelineResult;
use crate::fanout::NotificationFanout;
use crate::store::PipelineStore;

pub const DEFAULT_CANCEL_REASON: &str = "Cancelled by user";

/// What one escalation sweep did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EscalationReport {
    /// Alerts moved up one level.
    pub escalated: Vec<DbId>,
    /// Candidates another sweep or a family response got to first.
    pub skipped: usize,
}

pub struct AlertManager {
    store: Arc<dyn PipelineStore>,
    bus: Arc<EventBus>,
    fanout: NotificationFanout,
    policy: AlertPolicy,
}

impl AlertManager {
    pub fn new(
        store: Arc<dyn PipelineStore>,
        bus: Arc<EventBus>,
        fanout: NotificationFanout,
        policy: AlertPolicy,
    ) -> Self {
        Self {
            store,
            bus,
            fanout,
            policy,
        }
    }

    pub fn policy(&self) -> &AlertPolicy {
        &self.policy
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    /// Create an alert, or return the open one it duplicates.
    ///
    /// A new alert is broadcast to the resident's family room and fanned out
    /// to family members. A suppressed duplicate does neither.
    pub async fn create_alert(&self, input: CreateAlert) -> PipelineResult<Alert> {
        let cutoff = self.policy.dedup_cutoff(Utc::now());
        if let Some(existing) = self
            .store
            .find_recent_open_alert(input.user_id, input.alert_type, cutoff)
            .await?
        {
            tracing::info!(
                alert_id = existing.id,
                user_id = input.user_id,
                alert_type = %input.alert_type,
                "Duplicate alert suppressed"
            );
            return Ok(existing);
        }

        let alert = self.store.insert_alert(&input).await?;
        tracing::warn!(
            alert_id = alert.id,
            user_id = alert.user_id,
            alert_type = %alert.alert_type,
            severity = %alert.severity,
            "Alert created"
        );

        self.broadcast(AlertEvent::New, &alert);
        self.fanout.notify_family_members(&alert).await;

        Ok(alert)
    }

    /// Raise a critical emergency alert and phone the primary emergency
    /// contact directly.
    pub async fn handle_emergency(
        &self,
        user_id: DbId,
        hub_id: Option<DbId>,
        source: EmergencySource,
        location: Option<&str>,
    ) -> PipelineResult<Alert> {
        let message = match location {
            Some(location) => {
                format!("Emergency button pressed via {} in {location}", source.as_str())
            }
            None => format!("Emergency button pressed via {}", source.as_str()),
        };

        let alert = self
            .create_alert(CreateAlert {
                user_id,
                hub_id,
                activity_event_id: None,
                alert_type: AlertType::EmergencyButton,
                severity: AlertSeverity::Critical,
                title: AlertType::EmergencyButton.default_title().to_string(),
                message: Some(message),
                metadata: json!({ "source": source.as_str(), "location": location }),
            })
            .await?;

        self.call_emergency_contact(&alert).await;
        Ok(alert)
    }

    async fn call_emergency_contact(&self, alert: &Alert) {
        let contact = match self.store.primary_emergency_contact(alert.user_id).await {
            Ok(Some(contact)) => contact,
            Ok(None) => {
                tracing::warn!(
                    alert_id = alert.id,
                    user_id = alert.user_id,
                    "No emergency contact with a phone number to call"
                );
                return;
            }
            Err(e) => {
                tracing::error!(alert_id = alert.id, error = %e, "Failed to look up emergency contact");
                return;
            }
        };

        let resident = self.fanout.resident_name(alert.user_id).await;
        let placed = self
            .fanout
            .send_tracked(alert, &contact, NotificationChannel::VoiceCall, resident.as_deref())
            .await;
        if placed {
            tracing::info!(alert_id = alert.id, member_id = contact.id, "Emergency call placed");
        }
    }

    // -----------------------------------------------------------------------
    // Family responses
    // -----------------------------------------------------------------------

    pub async fn acknowledge_alert(&self, alert_id: DbId, by: DbId) -> PipelineResult<Alert> {
        let current = self.load(alert_id).await?;
        current.status.transition(AlertAction::Acknowledge)?;

        let updated = self
            .store
            .acknowledge_alert(alert_id, current.status, by)
            .await?
            .ok_or_else(|| changed_concurrently(alert_id))?;
        tracing::info!(alert_id, acknowledged_by = by, "Alert acknowledged");

        let name = self.actor_name(by).await;
        self.broadcast(
            AlertEvent::Acknowledged,
            &with_actor_name(&updated, "acknowledgedByName", name),
        );
        Ok(updated)
    }

    pub async fn resolve_alert(
        &self,
        alert_id: DbId,
        by: DbId,
        notes: Option<&str>,
    ) -> PipelineResult<Alert> {
        let updated = self.close(alert_id, AlertAction::Resolve, by, notes).await?;
        tracing::info!(alert_id, resolved_by = by, "Alert resolved");

        let name = self.actor_name(by).await;
        self.broadcast(
            AlertEvent::Resolved,
            &with_actor_name(&updated, "resolvedByName", name),
        );
        Ok(updated)
    }

    /// Cancel an alert; the reason lands in `resolution_notes`.
    pub async fn cancel_alert(
        &self,
        alert_id: DbId,
        by: DbId,
        reason: Option<&str>,
    ) -> PipelineResult<Alert> {
        let reason = reason.unwrap_or(DEFAULT_CANCEL_REASON);
        let updated = self
            .close(alert_id, AlertAction::Cancel, by, Some(reason))
            .await?;
        tracing::info!(alert_id, cancelled_by = by, reason, "Alert cancelled");

        self.broadcast(AlertEvent::Cancelled, &updated);
        Ok(updated)
    }

    async fn close(
        &self,
        alert_id: DbId,
        action: AlertAction,
        by: DbId,
        notes: Option<&str>,
    ) -> PipelineResult<Alert> {
        let current = self.load(alert_id).await?;
        let target = current.status.transition(action)?;

        let updated = self
            .store
            .close_alert(alert_id, current.status, target, by, notes)
            .await?
            .ok_or_else(|| changed_concurrently(alert_id))?;
        Ok(updated)
    }

    async fn load(&self, alert_id: DbId) -> PipelineResult<Alert> {
        self.store
            .find_alert(alert_id)
            .await?
            .ok_or_else(|| {
                CoreError::NotFound {
                    entity: "Alert",
                    id: alert_id,
                }
                .into()
            })
    }

    async fn actor_name(&self, user_id: DbId) -> Option<String> {
        match self.store.user_display_name(user_id).await {
            Ok(name) => name,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Failed to resolve responder name");
                None
            }
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Active alerts for a resident, most severe then newest first.
    pub async fn get_active_alerts(&self, user_id: DbId) -> PipelineResult<Vec<Alert>> {
        self.store.list_active_alerts(user_id).await
    }

    pub async fn get_alert_history(
        &self,
        user_id: DbId,
        params: &AlertHistoryQuery,
    ) -> PipelineResult<AlertPage> {
        let (alerts, total) = self.store.list_alert_history(user_id, params).await?;
        Ok(AlertPage { alerts, total })
    }

    /// Delivery log of an alert, one row per (member, channel) attempt.
    pub async fn list_notifications(&self, alert_id: DbId) -> PipelineResult<Vec<AlertNotification>> {
        self.store.list_notifications(alert_id).await
    }

    // -----------------------------------------------------------------------
    // Escalation
    // -----------------------------------------------------------------------

    pub async fn escalate_unacknowledged_alerts(&self) -> PipelineResult<EscalationReport> {
        self.escalate_unacknowledged_alerts_at(Utc::now()).await
    }

    /// Advance every overdue open high/critical alert by one level.
    ///
    /// The family member at the new level's position in the chain gets an
    /// SMS, plus a voice call for critical alerts from level 2. A level
    /// without a member still advances.
    pub async fn escalate_unacknowledged_alerts_at(
        &self,
        now: Timestamp,
    ) -> PipelineResult<EscalationReport> {
        let candidates = self
            .store
            .list_escalation_candidates(
                now,
                self.policy.escalation_step_minutes,
                self.policy.max_escalation_level,
            )
            .await?;

        let mut report = EscalationReport::default();

        for candidate in candidates {
            let Some(alert) = self
                .store
                .escalate_alert(
                    candidate.id,
                    candidate.escalation_level,
                    self.policy.max_escalation_level,
                )
                .await?
            else {
                report.skipped += 1;
                continue;
            };

            tracing::warn!(
                alert_id = alert.id,
                level = alert.escalation_level,
                severity = %alert.severity,
                "Alert escalated"
            );
            self.notify_escalation_contact(&alert).await;
            report.escalated.push(alert.id);
        }

        Ok(report)
    }

    async fn notify_escalation_contact(&self, alert: &Alert) {
        let position = i64::from(alert.escalation_level);
        let member = match self.store.family_member_at(alert.user_id, position).await {
            Ok(Some(member)) => member,
            Ok(None) => {
                tracing::info!(
                    alert_id = alert.id,
                    level = alert.escalation_level,
                    "No family member at this escalation level"
                );
                return;
            }
            Err(e) => {
                tracing::error!(alert_id = alert.id, error = %e, "Failed to load escalation contact");
                return;
            }
        };

        if !member.phone.as_deref().is_some_and(|p| !p.trim().is_empty()) {
            tracing::info!(
                alert_id = alert.id,
                member_id = member.id,
                level = alert.escalation_level,
                "Escalation contact has no phone number, nobody contacted"
            );
            return;
        }

        let resident = self.fanout.resident_name(alert.user_id).await;
        self.fanout
            .send_tracked(alert, &member, NotificationChannel::Sms, resident.as_deref())
            .await;

        if requires_voice(alert.severity, alert.escalation_level) {
            self.fanout
                .send_tracked(alert, &member, NotificationChannel::VoiceCall, resident.as_deref())
                .await;
        }
    }

    // -----------------------------------------------------------------------
    // Broadcast
    // -----------------------------------------------------------------------

    fn broadcast(&self, event: AlertEvent, alert: &Alert) {
        let data = match serde_json::to_value(alert) {
            Ok(data) => data,
            Err(e) => {
                tracing::error!(alert_id = alert.id, error = %e, "Failed to serialize alert");
                return;
            }
        };
        let receivers = self
            .bus
            .broadcast_to_room(family_room(alert.user_id), event.as_str(), data);
        tracing::debug!(alert_id = alert.id, event = event.as_str(), receivers, "Alert broadcast");
    }
}

fn changed_concurrently(alert_id: DbId) -> crate::error::PipelineError {
    CoreError::Conflict(format!("Alert {alert_id} changed while the request was in flight")).into()
}

/// Copy of `alert` whose metadata also carries the responder's name.
fn with_actor_name(alert: &Alert, key: &str, name: Option<String>) -> Alert {
    let mut alert = alert.clone();
    if let Some(name) = name {
        if !alert.metadata.is_object() {
            alert.metadata = json!({});
        }
        if let Some(map) = alert.metadata.as_object_mut() {
            map.insert(key.to_string(), serde_json::Value::String(name));
        }
    }
    alert
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
