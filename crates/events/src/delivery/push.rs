//! Push delivery over the real-time bus.
//!
//! A family member with a linked platform account receives a
//! `{type: "alert", data: Alert}` envelope on every connection of that
//! account. Members without an account have nowhere to push to; that is not
//! treated as a failure.

use std::sync::Arc;

use crate::bus::{EventBus, PUSH_MESSAGE_TYPE};
use crate::delivery::{ChannelError, Delivery};

pub struct PushDelivery {
    bus: Arc<EventBus>,
}

impl PushDelivery {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }

    pub fn deliver(&self, delivery: &Delivery<'_>) -> Result<(), ChannelError> {
        let Some(account_id) = delivery.member.family_user_id else {
            tracing::debug!(
                member_id = delivery.member.id,
                alert_id = delivery.alert.id,
                "Family member has no linked account, push skipped"
            );
            return Ok(());
        };

        let data = serde_json::to_value(delivery.alert).map_err(|e| {
            tracing::error!(alert_id = delivery.alert.id, error = %e, "Failed to serialize alert for push");
            ChannelError::Payload(e)
        })?;
        let receivers = self.bus.send_to_user(account_id, PUSH_MESSAGE_TYPE, data);
        tracing::debug!(
            member_id = delivery.member.id,
            account_id,
            alert_id = delivery.alert.id,
            receivers,
            "Push notification published"
        );
        Ok(())
    }
}
