//! Inbound hub message handling.
//!
//! [`EventPipeline::dispatch`] routes each [`HubMessage`] kind to its
//! handler. A device event runs classify, store, and maybe-alert as one
//! unit of work: the event is always persisted before any alert is
//! attempted, and alert failures after that point are logged rather than
//! returned.

use std::sync::Arc;

use chrono::Utc;
use safehome_core::activity::ActivityEventType;
use safehome_core::alert::{AlertSeverity, AlertType};
use safehome_core::anomaly::{baseline_slot, classify, AnomalyVerdict, ClassifierInput};
use safehome_core::error::CoreError;
use safehome_core::messages::{
    CheckInMessage, CheckInStatus, DeviceEventMessage, EmergencyMessage, HubMessage,
    HubStatusMessage,
};
use safehome_core::types::{DbId, Timestamp};
use safehome_db::models::activity::{ActivityEvent, CreateActivityEvent};
use safehome_db::models::alert::{Alert, CreateAlert};
use safehome_db::models::check_in::CreateCheckIn;
use safehome_db::models::hub::UpdateHubStatus;
use serde_json::{json, Map, Value};

use crate::alerts::AlertManager;
use crate::error::PipelineResult;
use crate::store::PipelineStore;

pub const CHECK_IN_HELP_TITLE: &str = "Help Requested via Check-in";

/// `sensor_data` key holding the id of an unregistered reporting device.
pub const REPORTED_DEVICE_KEY: &str = "reported_device_id";

const CHECK_IN_HELP_MESSAGE: &str = "Resident indicated they need help during check-in";

/// Result of ingesting one device event.
#[derive(Debug, Clone)]
pub struct ProcessedEvent {
    pub event: ActivityEvent,
    pub verdict: AnomalyVerdict,
    /// Alert raised for the event, or the open alert it was merged into.
    pub alert: Option<Alert>,
}

pub struct EventPipeline {
    store: Arc<dyn PipelineStore>,
    alerts: Arc<AlertManager>,
}

impl EventPipeline {
    pub fn new(store: Arc<dyn PipelineStore>, alerts: Arc<AlertManager>) -> Self {
        Self { store, alerts }
    }

    /// Validate and handle one hub message.
    ///
    /// Returns the alert the message raised, if any.
    pub async fn dispatch(&self, message: &HubMessage) -> PipelineResult<Option<Alert>> {
        message
            .validate()
            .map_err(|e| CoreError::Validation(e.to_string()))?;

        tracing::debug!(kind = message.kind(), hub_id = message.hub_id(), "Dispatching hub message");

        match message {
            HubMessage::Status(status) => self.handle_status(status).await,
            HubMessage::Event(event) => Ok(self.process_device_event(event).await?.alert),
            HubMessage::Emergency(emergency) => self.handle_emergency(emergency).await.map(Some),
            HubMessage::Checkin(check_in) => self.handle_check_in(check_in).await,
        }
    }

    // -----------------------------------------------------------------------
    // Device events
    // -----------------------------------------------------------------------

    pub async fn process_device_event(
        &self,
        msg: &DeviceEventMessage,
    ) -> PipelineResult<ProcessedEvent> {
        let hub = self
            .store
            .find_hub(msg.hub_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Hub",
                id: msg.hub_id,
            })?;
        let config = hub.config();

        let baseline_avg = if msg.event_type == ActivityEventType::MotionDetected.as_str() {
            let (day_of_week, hour_of_day) = baseline_slot(&msg.timestamp);
            self.store
                .find_baseline_slot(hub.id, day_of_week, hour_of_day, msg.room_name.as_deref())
                .await?
                .map(|b| b.avg_motion_events)
        } else {
            None
        };

        let verdict = classify(
            &ClassifierInput {
                event_type: &msg.event_type,
                room_name: msg.room_name.as_deref(),
                timestamp: msg.timestamp,
            },
            &config,
            baseline_avg,
        );

        let occurred_at = msg.timestamp.with_timezone(&Utc);
        let device_id = match msg.device_id {
            Some(id) if self.is_registered_device(id).await => Some(id),
            Some(id) => {
                tracing::warn!(hub_id = hub.id, device_id = id, "Event from unregistered device");
                None
            }
            None => None,
        };
        let sensor_data = match (msg.device_id, device_id) {
            (Some(reported), None) => with_reported_device(&msg.sensor_data, reported),
            _ => msg.sensor_data.clone(),
        };

        let event = self
            .store
            .insert_activity_event(&CreateActivityEvent {
                hub_id: hub.id,
                device_id,
                event_type: msg.event_type.clone(),
                room_name: msg.room_name.clone(),
                sensor_data,
                is_anomaly: verdict.is_anomaly,
                anomaly_score: verdict.anomaly_score,
                created_at: occurred_at,
            })
            .await?;

        if let Some(device_id) = device_id {
            self.record_device_report(device_id, occurred_at, msg.battery_level)
                .await;
        }

        let alert = match (verdict.is_anomaly, verdict.suggested_alert, hub.user_id) {
            (true, Some(alert_type), Some(user_id)) => {
                self.raise_anomaly_alert(user_id, &event, &verdict, alert_type)
                    .await
            }
            (true, Some(_), None) => {
                tracing::debug!(hub_id = hub.id, event_id = event.id, "Anomaly on hub without a resident");
                None
            }
            _ => None,
        };

        Ok(ProcessedEvent {
            event,
            verdict,
            alert,
        })
    }

    /// Whether `device_id` can be stored as the event's device reference.
    ///
    /// A failed lookup counts as unregistered so the event is still kept.
    async fn is_registered_device(&self, device_id: DbId) -> bool {
        match self.store.find_device(device_id).await {
            Ok(device) => device.is_some(),
            Err(e) => {
                tracing::error!(device_id, error = %e, "Failed to look up reporting device");
                false
            }
        }
    }

    async fn record_device_report(
        &self,
        device_id: DbId,
        at: Timestamp,
        battery_level: Option<i32>,
    ) {
        match self.store.touch_device(device_id, at).await {
            Ok(true) => {}
            Ok(false) => tracing::debug!(device_id, "Device removed before activity was recorded"),
            Err(e) => tracing::error!(device_id, error = %e, "Failed to record device activity"),
        }

        if let Some(level) = battery_level {
            if let Err(e) = self.store.update_device_battery(device_id, level).await {
                tracing::error!(device_id, error = %e, "Failed to update device battery");
            }
        }
    }

    async fn raise_anomaly_alert(
        &self,
        user_id: DbId,
        event: &ActivityEvent,
        verdict: &AnomalyVerdict,
        alert_type: AlertType,
    ) -> Option<Alert> {
        let input = CreateAlert {
            user_id,
            hub_id: Some(event.hub_id),
            activity_event_id: Some(event.id),
            alert_type,
            severity: AlertSeverity::from_anomaly_score(verdict.anomaly_score),
            title: alert_type.default_title().to_string(),
            message: verdict.reason.clone(),
            metadata: json!({
                "room_name": event.room_name,
                "event_type": event.event_type,
                "anomaly_score": verdict.anomaly_score,
            }),
        };

        match self.alerts.create_alert(input).await {
            Ok(alert) => Some(alert),
            Err(e) => {
                tracing::error!(event_id = event.id, error = %e, "Failed to raise alert for anomaly");
                None
            }
        }
    }

    // -----------------------------------------------------------------------
    // Status, emergency, check-in
    // -----------------------------------------------------------------------

    async fn handle_status(&self, msg: &HubStatusMessage) -> PipelineResult<Option<Alert>> {
        let change = self
            .store
            .update_hub_status(
                msg.hub_id,
                &UpdateHubStatus {
                    status: msg.status.as_str().to_string(),
                    firmware_version: msg.firmware_version.clone(),
                    battery_level: msg.battery_level,
                    is_on_battery: msg.is_on_battery,
                    wifi_strength: msg.wifi_strength,
                    seen_at: msg.timestamp.with_timezone(&Utc),
                },
            )
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Hub",
                id: msg.hub_id,
            })?;

        tracing::debug!(
            hub_id = change.hub_id,
            previous = %change.previous_status,
            status = %change.status,
            "Hub status updated"
        );

        let (true, Some(user_id)) = (change.went_offline(), change.user_id) else {
            return Ok(None);
        };

        let label = msg
            .serial_number
            .clone()
            .unwrap_or_else(|| change.hub_id.to_string());
        let input = CreateAlert {
            user_id,
            hub_id: Some(change.hub_id),
            activity_event_id: None,
            alert_type: AlertType::HubOffline,
            severity: AlertSeverity::High,
            title: AlertType::HubOffline.default_title().to_string(),
            message: Some(format!("Hub {label} went offline")),
            metadata: json!({ "previous_status": change.previous_status }),
        };

        match self.alerts.create_alert(input).await {
            Ok(alert) => Ok(Some(alert)),
            Err(e) => {
                tracing::error!(hub_id = change.hub_id, error = %e, "Failed to raise hub offline alert");
                Ok(None)
            }
        }
    }

    async fn handle_emergency(&self, msg: &EmergencyMessage) -> PipelineResult<Alert> {
        tracing::warn!(
            hub_id = msg.hub_id,
            user_id = msg.user_id,
            source = msg.source.as_str(),
            "Emergency reported by hub"
        );
        self.alerts
            .handle_emergency(msg.user_id, Some(msg.hub_id), msg.source, msg.location.as_deref())
            .await
    }

    async fn handle_check_in(&self, msg: &CheckInMessage) -> PipelineResult<Option<Alert>> {
        let check_in = self
            .store
            .insert_check_in(&CreateCheckIn {
                user_id: msg.user_id,
                hub_id: Some(msg.hub_id),
                check_in_type: msg.check_in_type.as_str().to_string(),
                status: msg.status.as_str().to_string(),
                actual_time: msg.timestamp.with_timezone(&Utc),
            })
            .await?;
        tracing::info!(
            check_in_id = check_in.id,
            user_id = msg.user_id,
            status = msg.status.as_str(),
            "Check-in recorded"
        );

        if msg.status != CheckInStatus::HelpNeeded {
            return Ok(None);
        }

        let alert = self
            .alerts
            .create_alert(CreateAlert {
                user_id: msg.user_id,
                hub_id: Some(msg.hub_id),
                activity_event_id: None,
                alert_type: AlertType::Custom,
                severity: AlertSeverity::Medium,
                title: CHECK_IN_HELP_TITLE.to_string(),
                message: Some(CHECK_IN_HELP_MESSAGE.to_string()),
                metadata: json!({ "check_in_id": check_in.id }),
            })
            .await?;
        Ok(Some(alert))
    }
}

/// Sensor data carrying the id an unregistered device reported itself as.
fn with_reported_device(sensor_data: &Value, device_id: DbId) -> Value {
    let mut map = match sensor_data {
        Value::Object(map) => map.clone(),
        Value::Null => Map::new(),
        other => Map::from_iter([("value".to_string(), other.clone())]),
    };
    map.insert(REPORTED_DEVICE_KEY.to_string(), json!(device_id));
    Value::Object(map)
}
