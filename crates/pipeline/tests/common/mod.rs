#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use safehome_core::alert::{AlertSeverity, AlertType};
use safehome_core::channels::NotificationChannel;
use safehome_core::escalation::AlertPolicy;
use safehome_core::messages::DeviceEventMessage;
use safehome_core::types::{DbId, Timestamp};
use safehome_db::models::alert::CreateAlert;
use safehome_db::models::family::FamilyMember;
use safehome_db::models::hub::{Device, Hub};
use safehome_db::models::user::User;
use safehome_events::{ChannelError, ChannelSender, Delivery, EventBus, RealtimeMessage};
use safehome_pipeline::{
    ActivitySummaries, AlertManager, BaselineRebuilder, EventPipeline, InactivitySweep,
    MemoryStore, NotificationFanout, PipelineStore,
};
use serde_json::json;
use tokio::sync::broadcast;

pub const RESIDENT: DbId = 1;
pub const RESPONDER: DbId = 2;
pub const HUB: DbId = 10;
pub const SPARE_HUB: DbId = 11;
pub const FRIDGE_SENSOR: DbId = 20;
pub const HALL_SENSOR: DbId = 21;

/// Emergency contact, priority 0.
pub const DANA: DbId = 100;
/// Emergency contact, priority 1, email enabled.
pub const SAM: DbId = 101;
/// Regular relative, priority 0.
pub const ALEX: DbId = 102;

// ---------------------------------------------------------------------------
// Channel double
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    pub alert_id: DbId,
    pub member_id: DbId,
    pub channel: NotificationChannel,
    pub resident_name: Option<String>,
    pub ok: bool,
}

/// Records every send and fails the (member, channel) pairs it is told to.
#[derive(Default)]
pub struct RecordingSender {
    attempts: Mutex<Vec<Attempt>>,
    failing: Mutex<Vec<(DbId, NotificationChannel)>>,
}

impl RecordingSender {
    pub fn fail_for(&self, member_id: DbId, channel: NotificationChannel) {
        self.failing.lock().unwrap().push((member_id, channel));
    }

    pub fn attempts(&self) -> Vec<Attempt> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn attempts_for(&self, alert_id: DbId) -> Vec<Attempt> {
        self.attempts()
            .into_iter()
            .filter(|a| a.alert_id == alert_id)
            .collect()
    }

    pub fn channels_for(&self, alert_id: DbId, member_id: DbId) -> Vec<NotificationChannel> {
        let mut channels: Vec<NotificationChannel> = self
            .attempts_for(alert_id)
            .into_iter()
            .filter(|a| a.member_id == member_id)
            .map(|a| a.channel)
            .collect();
        channels.sort_by_key(|c| c.as_str());
        channels
    }
}

#[async_trait]
impl ChannelSender for RecordingSender {
    async fn send(
        &self,
        channel: NotificationChannel,
        delivery: &Delivery<'_>,
    ) -> Result<(), ChannelError> {
        let fail = self
            .failing
            .lock()
            .unwrap()
            .contains(&(delivery.member.id, channel));
        self.attempts.lock().unwrap().push(Attempt {
            alert_id: delivery.alert.id,
            member_id: delivery.member.id,
            channel,
            resident_name: delivery.resident_name.map(str::to_string),
            ok: !fail,
        });
        if fail {
            Err(ChannelError::NotConfigured(channel))
        } else {
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub bus: Arc<EventBus>,
    pub sender: Arc<RecordingSender>,
    pub alerts: Arc<AlertManager>,
    pub pipeline: EventPipeline,
    pub inactivity: InactivitySweep,
    pub baselines: BaselineRebuilder,
    pub summaries: ActivitySummaries,
}

impl Harness {
    /// Empty store wired to every service.
    pub fn empty() -> Self {
        let store = Arc::new(MemoryStore::new());
        let shared: Arc<dyn PipelineStore> = store.clone();
        let bus = Arc::new(EventBus::default());
        let sender = Arc::new(RecordingSender::default());

        let fanout = NotificationFanout::new(Arc::clone(&shared), sender.clone());
        let alerts = Arc::new(AlertManager::new(
            Arc::clone(&shared),
            Arc::clone(&bus),
            fanout,
            AlertPolicy::default(),
        ));

        Self {
            pipeline: EventPipeline::new(Arc::clone(&shared), Arc::clone(&alerts)),
            inactivity: InactivitySweep::new(Arc::clone(&shared), Arc::clone(&alerts)),
            baselines: BaselineRebuilder::new(Arc::clone(&shared)),
            summaries: ActivitySummaries::new(shared, Arc::clone(&bus)),
            store,
            bus,
            sender,
            alerts,
        }
    }

    /// A resident with an online hub, two devices and three family members.
    pub fn seeded() -> Self {
        let h = Self::empty();
        h.store.add_user(user(RESIDENT, "Pat", "Smith"));
        h.store.add_user(user(RESPONDER, "Dana", "Smith"));
        h.store.add_hub(hub(HUB, Some(RESIDENT), json!({})));
        h.store.add_device(device(FRIDGE_SENSOR, HUB, json!({ "location": "Kitchen Fridge" })));
        h.store.add_device(device(HALL_SENSOR, HUB, json!({})));

        h.store.add_family_member(member(DANA, "Dana", true, 0, Some("+61400000001"), None, json!({})));
        h.store.add_family_member(member(
            SAM,
            "Sam",
            true,
            1,
            Some("+61400000002"),
            Some("sam@example.test"),
            json!({ "email_enabled": true }),
        ));
        h.store.add_family_member(member(
            ALEX,
            "Alex",
            false,
            0,
            Some("+61400000003"),
            Some("alex@example.test"),
            json!({}),
        ));
        h
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeMessage> {
        self.bus.subscribe()
    }
}

/// Every message currently queued on `rx`.
pub fn drain(rx: &mut broadcast::Receiver<RealtimeMessage>) -> Vec<RealtimeMessage> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn epoch() -> Timestamp {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

pub fn user(id: DbId, first: &str, last: &str) -> User {
    User {
        id,
        first_name: first.to_string(),
        last_name: last.to_string(),
        email: format!("{}@example.test", first.to_lowercase()),
        phone: None,
        created_at: epoch(),
        updated_at: epoch(),
    }
}

pub fn hub(id: DbId, user_id: Option<DbId>, configuration: serde_json::Value) -> Hub {
    Hub {
        id,
        user_id,
        serial_number: format!("SH-{id:04}"),
        name: Some("Living room hub".to_string()),
        status: "online".to_string(),
        firmware_version: Some("1.0.0".to_string()),
        battery_level: None,
        is_on_battery: false,
        wifi_strength: Some(-50),
        last_seen_at: Some(epoch()),
        configuration,
        created_at: epoch(),
        updated_at: epoch(),
    }
}

pub fn device(id: DbId, hub_id: DbId, metadata: serde_json::Value) -> Device {
    Device {
        id,
        hub_id,
        name: format!("Sensor {id}"),
        device_category: Some("contact_sensor".to_string()),
        room_name: None,
        metadata,
        battery_level: Some(100),
        last_activity_at: None,
        created_at: epoch(),
        updated_at: epoch(),
    }
}

pub fn member(
    id: DbId,
    name: &str,
    is_emergency_contact: bool,
    priority_order: i32,
    phone: Option<&str>,
    email: Option<&str>,
    preferences: serde_json::Value,
) -> FamilyMember {
    FamilyMember {
        id,
        user_id: RESIDENT,
        family_user_id: None,
        name: name.to_string(),
        relationship: None,
        phone: phone.map(str::to_string),
        email: email.map(str::to_string),
        is_emergency_contact,
        notification_preferences: preferences,
        priority_order,
        avatar: None,
        created_at: epoch(),
        updated_at: epoch(),
    }
}

pub fn new_alert(alert_type: AlertType, severity: AlertSeverity) -> CreateAlert {
    CreateAlert {
        user_id: RESIDENT,
        hub_id: Some(HUB),
        activity_event_id: None,
        alert_type,
        severity,
        title: alert_type.default_title().to_string(),
        message: None,
        metadata: json!({}),
    }
}

pub fn at(rfc3339: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(rfc3339).unwrap()
}

pub fn device_event(
    event_type: &str,
    room: Option<&str>,
    device_id: Option<DbId>,
    timestamp: &str,
) -> DeviceEventMessage {
    DeviceEventMessage {
        hub_id: HUB,
        device_id,
        device_category: None,
        event_type: event_type.to_string(),
        room_name: room.map(str::to_string),
        sensor_data: json!({}),
        battery_level: None,
        timestamp: at(timestamp),
    }
}
