//! Notification fan-out.
//!
//! One alert goes to every family member whose preferences (or emergency
//! contact status) admit it, on every channel planned for that member.
//! Members and channels are attempted concurrently. Each attempt is logged
//! as an `alert_notifications` row that starts `pending` and ends `sent` or
//! `failed`; a failure never affects any other attempt.

use std::sync::Arc;

use futures::future::join_all;
use safehome_core::channels::NotificationChannel;
use safehome_core::notification::{plan_channels, should_notify};
use safehome_core::types::DbId;
use safehome_db::models::alert::Alert;
use safehome_db::models::family::FamilyMember;
use safehome_events::{ChannelSender, Delivery};

use crate::store::PipelineStore;

/// Outcome counts of one fan-out.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FanoutReport {
    /// Members that passed the preference check.
    pub members: usize,
    pub sent: usize,
    pub failed: usize,
}

impl FanoutReport {
    pub fn attempted(&self) -> usize {
        self.sent + self.failed
    }
}

pub struct NotificationFanout {
    store: Arc<dyn PipelineStore>,
    sender: Arc<dyn ChannelSender>,
}

impl NotificationFanout {
    pub fn new(store: Arc<dyn PipelineStore>, sender: Arc<dyn ChannelSender>) -> Self {
        Self { store, sender }
    }

    /// Notify the resident's family about `alert`.
    pub async fn notify_family_members(&self, alert: &Alert) -> FanoutReport {
        let members = match self.store.list_family_members(alert.user_id).await {
            Ok(members) => members,
            Err(e) => {
                tracing::error!(alert_id = alert.id, error = %e, "Failed to load family members");
                return FanoutReport::default();
            }
        };

        let resident = self.resident_name(alert.user_id).await;
        let resident_name = resident.as_deref();

        let plans: Vec<(&FamilyMember, Vec<NotificationChannel>)> = members
            .iter()
            .filter_map(|member| {
                let prefs = member.preferences();
                let recipient = member.recipient(&prefs);
                if !should_notify(&recipient, alert.alert_type, alert.severity) {
                    tracing::debug!(
                        alert_id = alert.id,
                        member_id = member.id,
                        "Member opted out of this alert category"
                    );
                    return None;
                }
                Some((member, plan_channels(&recipient, alert.severity)))
            })
            .collect();

        let attempts = plans.iter().flat_map(|(member, channels)| {
            channels
                .iter()
                .map(move |channel| self.send_tracked(alert, member, *channel, resident_name))
        });
        let outcomes = join_all(attempts).await;

        let sent = outcomes.iter().filter(|ok| **ok).count();
        let report = FanoutReport {
            members: plans.len(),
            sent,
            failed: outcomes.len() - sent,
        };

        tracing::info!(
            alert_id = alert.id,
            members = report.members,
            sent = report.sent,
            failed = report.failed,
            "Family notification fan-out complete"
        );
        report
    }

    /// One logged delivery attempt. Returns whether the channel accepted it.
    pub async fn send_tracked(
        &self,
        alert: &Alert,
        member: &FamilyMember,
        channel: NotificationChannel,
        resident_name: Option<&str>,
    ) -> bool {
        let notification_id = match self
            .store
            .create_pending_notification(alert.id, member.id, channel)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(
                    alert_id = alert.id,
                    member_id = member.id,
                    %channel,
                    error = %e,
                    "Failed to record pending notification"
                );
                return false;
            }
        };

        let delivery = Delivery {
            alert,
            member,
            resident_name,
        };

        match self.sender.send(channel, &delivery).await {
            Ok(()) => {
                tracing::debug!(alert_id = alert.id, member_id = member.id, %channel, "Notification sent");
                if let Err(e) = self.store.mark_notification_sent(notification_id).await {
                    tracing::error!(notification_id, error = %e, "Failed to mark notification sent");
                }
                true
            }
            Err(send_err) => {
                tracing::error!(
                    alert_id = alert.id,
                    member_id = member.id,
                    %channel,
                    error = %send_err,
                    "Notification delivery failed"
                );
                let message = send_err.to_string();
                if let Err(e) = self.store.mark_notification_failed(notification_id, &message).await {
                    tracing::error!(notification_id, error = %e, "Failed to mark notification failed");
                }
                false
            }
        }
    }

    /// "First Last" of the resident; lookup failures degrade to no name.
    pub async fn resident_name(&self, user_id: DbId) -> Option<String> {
        match self.store.user_display_name(user_id).await {
            Ok(name) => name,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Failed to resolve resident name");
                None
            }
        }
    }
}
