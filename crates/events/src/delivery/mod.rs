//! Outbound notification channels.
//!
//! Every channel sits behind [`ChannelSender`]: one attempt, reported as
//! success or a [`ChannelError`]. Failures are recorded by the caller on the
//! delivery log and never retried from here.

use async_trait::async_trait;
use safehome_core::channels::NotificationChannel;
use safehome_db::models::alert::Alert;
use safehome_db::models::family::FamilyMember;

pub mod email;
pub mod gateway;
pub mod push;

use email::{EmailDelivery, EmailError};
use gateway::{GatewayDelivery, GatewayError};
use push::PushDelivery;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Why a single channel send did not go out.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// No sender is configured for the channel.
    #[error("{0} channel is not configured")]
    NotConfigured(NotificationChannel),

    /// The member has no address for the channel.
    #[error("Family member has no {0} for {1} delivery")]
    MissingRecipient(&'static str, NotificationChannel),

    /// The alert could not be encoded for the channel.
    #[error("Failed to encode notification payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error(transparent)]
    Email(#[from] EmailError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

// ---------------------------------------------------------------------------
// ChannelSender
// ---------------------------------------------------------------------------

/// Everything a channel needs to contact one family member about one alert.
#[derive(Debug, Clone, Copy)]
pub struct Delivery<'a> {
    pub alert: &'a Alert,
    pub member: &'a FamilyMember,
    /// "First Last" of the resident, when known.
    pub resident_name: Option<&'a str>,
}

impl Delivery<'_> {
    pub fn resident_label(&self) -> &str {
        self.resident_name.unwrap_or("your family member")
    }

    pub fn phone(&self, channel: NotificationChannel) -> Result<&str, ChannelError> {
        self.member
            .phone
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or(ChannelError::MissingRecipient("phone number", channel))
    }

    pub fn email(&self) -> Result<&str, ChannelError> {
        self.member
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or(ChannelError::MissingRecipient("email address", NotificationChannel::Email))
    }
}

/// Uniform "attempt send, report success or failure" contract.
#[async_trait]
pub trait ChannelSender: Send + Sync {
    async fn send(
        &self,
        channel: NotificationChannel,
        delivery: &Delivery<'_>,
    ) -> Result<(), ChannelError>;
}

// ---------------------------------------------------------------------------
// ChannelRouter
// ---------------------------------------------------------------------------

/// Routes each channel to its configured sender.
///
/// Push always exists; email, SMS and voice are optional and report
/// [`ChannelError::NotConfigured`] when absent.
pub struct ChannelRouter {
    push: PushDelivery,
    email: Option<EmailDelivery>,
    sms: Option<GatewayDelivery>,
    voice: Option<GatewayDelivery>,
}

impl ChannelRouter {
    pub fn new(push: PushDelivery) -> Self {
        Self {
            push,
            email: None,
            sms: None,
            voice: None,
        }
    }

    pub fn with_email(mut self, email: EmailDelivery) -> Self {
        self.email = Some(email);
        self
    }

    pub fn with_sms(mut self, sms: GatewayDelivery) -> Self {
        self.sms = Some(sms);
        self
    }

    pub fn with_voice(mut self, voice: GatewayDelivery) -> Self {
        self.voice = Some(voice);
        self
    }

    /// Channels that can actually deliver.
    pub fn configured_channels(&self) -> Vec<NotificationChannel> {
        let mut channels = vec![NotificationChannel::Push];
        if self.sms.is_some() {
            channels.push(NotificationChannel::Sms);
        }
        if self.email.is_some() {
            channels.push(NotificationChannel::Email);
        }
        if self.voice.is_some() {
            channels.push(NotificationChannel::VoiceCall);
        }
        channels
    }
}

#[async_trait]
impl ChannelSender for ChannelRouter {
    async fn send(
        &self,
        channel: NotificationChannel,
        delivery: &Delivery<'_>,
    ) -> Result<(), ChannelError> {
        match channel {
            NotificationChannel::Push => self.push.deliver(delivery),
            NotificationChannel::Email => {
                let email = self.email.as_ref().ok_or(ChannelError::NotConfigured(channel))?;
                email.deliver_alert(delivery.email()?, delivery).await?;
                Ok(())
            }
            NotificationChannel::Sms => {
                let sms = self.sms.as_ref().ok_or(ChannelError::NotConfigured(channel))?;
                sms.deliver(delivery.phone(channel)?, delivery).await?;
                Ok(())
            }
            NotificationChannel::VoiceCall => {
                let voice = self.voice.as_ref().ok_or(ChannelError::NotConfigured(channel))?;
                voice.deliver(delivery.phone(channel)?, delivery).await?;
                Ok(())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Test fixtures
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{TimeZone, Utc};
    use safehome_core::alert::{AlertSeverity, AlertStatus, AlertType};

    use super::*;

    pub fn alert() -> Alert {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 3, 0, 0).unwrap();
        Alert {
            id: 11,
            user_id: 1,
            hub_id: Some(2),
            activity_event_id: None,
            alert_type: AlertType::FallDetected,
            severity: AlertSeverity::Critical,
            title: "Possible Fall Detected".to_string(),
            message: Some("Potential fall detected".to_string()),
            status: AlertStatus::Active,
            acknowledged_by: None,
            acknowledged_at: None,
            resolved_by: None,
            resolved_at: None,
            resolution_notes: None,
            escalation_level: 0,
            metadata: serde_json::json!({}),
            created_at: at,
            updated_at: at,
        }
    }

    pub fn member(family_user_id: Option<i64>, phone: Option<&str>, email: Option<&str>) -> FamilyMember {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        FamilyMember {
            id: 21,
            user_id: 1,
            family_user_id,
            name: "Dana".to_string(),
            relationship: Some("daughter".to_string()),
            phone: phone.map(str::to_string),
            email: email.map(str::to_string),
            is_emergency_contact: true,
            notification_preferences: serde_json::json!({}),
            priority_order: 0,
            avatar: None,
            created_at: at,
            updated_at: at,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
