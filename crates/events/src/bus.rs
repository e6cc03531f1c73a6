//! In-process real-time bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish side of the real-time fan-out: alert updates
//! are broadcast to the resident's family room and push notifications are
//! addressed to a single account. Whatever holds client connections
//! subscribes and forwards. It is designed to be shared via `Arc<EventBus>`.

use chrono::{DateTime, Utc};
use safehome_core::types::DbId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// RealtimeMessage
// ---------------------------------------------------------------------------

/// Who a real-time message is for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Audience {
    /// Every client joined to the named room.
    Room(String),
    /// Every connection of one platform account.
    User(DbId),
}

/// Room shared by everyone watching over a resident.
pub fn family_room(user_id: DbId) -> String {
    format!("family:{user_id}")
}

/// Alert lifecycle updates pushed to the family room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertEvent {
    New,
    Acknowledged,
    Resolved,
    Cancelled,
}

impl AlertEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "alert:new",
            Self::Acknowledged => "alert:acknowledged",
            Self::Resolved => "alert:resolved",
            Self::Cancelled => "alert:cancelled",
        }
    }
}

/// Message type used for direct push delivery to an account.
pub const PUSH_MESSAGE_TYPE: &str = "alert";

/// A `{type, data}` envelope plus its addressing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeMessage {
    pub audience: Audience,
    #[serde(rename = "type")]
    pub message_type: String,
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl RealtimeMessage {
    pub fn new(
        audience: Audience,
        message_type: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            audience,
            message_type: message_type.into(),
            data,
            timestamp: Utc::now(),
        }
    }

    /// The wire envelope a client sees.
    pub fn envelope(&self) -> serde_json::Value {
        serde_json::json!({ "type": self.message_type, "data": self.data })
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out bus.
///
/// ```rust
/// use safehome_events::bus::{family_room, EventBus};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.broadcast_to_room(family_room(7), "alert:new", serde_json::json!({}));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<RealtimeMessage>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a message to all current subscribers.
    ///
    /// Returns the number of subscribers that will see it; zero means the
    /// message was dropped.
    pub fn publish(&self, message: RealtimeMessage) -> usize {
        self.sender.send(message).unwrap_or(0)
    }

    pub fn broadcast_to_room(
        &self,
        room: impl Into<String>,
        message_type: &str,
        data: serde_json::Value,
    ) -> usize {
        self.publish(RealtimeMessage::new(
            Audience::Room(room.into()),
            message_type,
            data,
        ))
    }

    pub fn send_to_user(&self, user_id: DbId, message_type: &str, data: serde_json::Value) -> usize {
        self.publish(RealtimeMessage::new(
            Audience::User(user_id),
            message_type,
            data,
        ))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeMessage> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
