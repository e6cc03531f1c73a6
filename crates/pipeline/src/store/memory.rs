//! In-process [`PipelineStore`].
//!
//! Mirrors the SQL in `safehome-db`: same filters, same orderings, same
//! "update only if still in the expected state" rules, and the same
//! rejection of events that reference a missing hub or device. Used by the test
//! suites and handy for local experiments without a database.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use safehome_core::activity::{is_bathroom, is_fridge_location, ActivityEventType};
use safehome_core::alert::{AlertStatus, AlertType};
use safehome_core::baseline::{MotionSample, SlotStats};
use safehome_core::channels::{DeliveryStatus, NotificationChannel};
use safehome_core::error::CoreError;
use safehome_core::summary::MotionDayStats;
use safehome_core::types::{DbId, Timestamp};
use safehome_db::models::activity::{ActivityBaseline, ActivityEvent, CreateActivityEvent};
use safehome_db::models::alert::{Alert, AlertHistoryQuery, AlertNotification, CreateAlert};
use safehome_db::models::check_in::{CheckIn, CreateCheckIn};
use safehome_db::models::family::FamilyMember;
use safehome_db::models::hub::{Device, Hub, HubStatusChange, UpdateHubStatus};
use safehome_db::models::user::User;

use super::PipelineStore;
use crate::error::PipelineResult;

#[derive(Default)]
struct State {
    next_id: DbId,
    users: BTreeMap<DbId, User>,
    hubs: BTreeMap<DbId, Hub>,
    devices: BTreeMap<DbId, Device>,
    family: Vec<FamilyMember>,
    events: Vec<ActivityEvent>,
    baselines: Vec<ActivityBaseline>,
    alerts: BTreeMap<DbId, Alert>,
    notifications: Vec<AlertNotification>,
    check_ins: Vec<CheckIn>,
}

impl State {
    fn next_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }

    fn hub_events(&self, hub_id: DbId) -> impl Iterator<Item = &ActivityEvent> {
        self.events.iter().filter(move |e| e.hub_id == hub_id)
    }

    fn latest<'a>(events: impl Iterator<Item = &'a ActivityEvent>) -> Option<ActivityEvent> {
        events.max_by_key(|e| (e.created_at, e.id)).cloned()
    }

    fn chain(&self, user_id: DbId) -> Vec<FamilyMember> {
        let mut members: Vec<FamilyMember> = self
            .family
            .iter()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect();
        members.sort_by_key(|m| (!m.is_emergency_contact, m.priority_order, m.id));
        members
    }

    fn notification_mut(&mut self, id: DbId) -> Option<&mut AlertNotification> {
        self.notifications.iter_mut().find(|n| n.id == id)
    }
}

fn is_activity_event(event: &ActivityEvent) -> bool {
    event.kind().is_some_and(ActivityEventType::is_activity_of_interest)
}

fn is_motion(event: &ActivityEvent) -> bool {
    event.kind() == Some(ActivityEventType::MotionDetected)
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -- seeding ------------------------------------------------------------

    pub fn add_user(&self, user: User) {
        self.lock().users.insert(user.id, user);
    }

    pub fn add_hub(&self, hub: Hub) {
        self.lock().hubs.insert(hub.id, hub);
    }

    pub fn add_device(&self, device: Device) {
        self.lock().devices.insert(device.id, device);
    }

    pub fn add_family_member(&self, member: FamilyMember) {
        self.lock().family.push(member);
    }

    // -- inspection ---------------------------------------------------------

    /// Every stored alert, oldest first.
    pub fn alerts(&self) -> Vec<Alert> {
        self.lock().alerts.values().cloned().collect()
    }

    pub fn activity_events(&self) -> Vec<ActivityEvent> {
        self.lock().events.clone()
    }

    pub fn check_ins(&self) -> Vec<CheckIn> {
        self.lock().check_ins.clone()
    }

    pub fn hub(&self, id: DbId) -> Option<Hub> {
        self.lock().hubs.get(&id).cloned()
    }

    pub fn device(&self, id: DbId) -> Option<Device> {
        self.lock().devices.get(&id).cloned()
    }

    /// Overwrite an alert's creation time, for exercising time windows.
    pub fn backdate_alert(&self, id: DbId, created_at: Timestamp) {
        if let Some(alert) = self.lock().alerts.get_mut(&id) {
            alert.created_at = created_at;
        }
    }
}

#[async_trait]
impl PipelineStore for MemoryStore {
    async fn insert_activity_event(
        &self,
        input: &CreateActivityEvent,
    ) -> PipelineResult<ActivityEvent> {
        let mut state = self.lock();
        if !state.hubs.contains_key(&input.hub_id) {
            return Err(CoreError::NotFound {
                entity: "Hub",
                id: input.hub_id,
            }
            .into());
        }
        if let Some(device_id) = input.device_id.filter(|id| !state.devices.contains_key(id)) {
            return Err(CoreError::NotFound {
                entity: "Device",
                id: device_id,
            }
            .into());
        }
        let event = ActivityEvent {
            id: state.next_id(),
            hub_id: input.hub_id,
            device_id: input.device_id,
            event_type: input.event_type.clone(),
            room_name: input.room_name.clone(),
            sensor_data: input.sensor_data.clone(),
            is_anomaly: input.is_anomaly,
            anomaly_score: input.anomaly_score,
            created_at: input.created_at,
            updated_at: Utc::now(),
        };
        state.events.push(event.clone());
        Ok(event)
    }

    async fn last_event_of_kind(
        &self,
        hub_id: DbId,
        kind: ActivityEventType,
    ) -> PipelineResult<Option<ActivityEvent>> {
        let state = self.lock();
        Ok(State::latest(
            state.hub_events(hub_id).filter(|e| e.event_type == kind.as_str()),
        ))
    }

    async fn last_activity(&self, hub_id: DbId) -> PipelineResult<Option<ActivityEvent>> {
        let state = self.lock();
        Ok(State::latest(
            state.hub_events(hub_id).filter(|e| is_activity_event(e)),
        ))
    }

    async fn last_bathroom_motion(&self, hub_id: DbId) -> PipelineResult<Option<ActivityEvent>> {
        let state = self.lock();
        Ok(State::latest(state.hub_events(hub_id).filter(|e| {
            is_motion(e) && e.room_name.as_deref().is_some_and(is_bathroom)
        })))
    }

    async fn motion_elsewhere_since(&self, hub_id: DbId, since: Timestamp) -> PipelineResult<bool> {
        let state = self.lock();
        let found = state.hub_events(hub_id).any(|e| {
            is_motion(e)
                && e.created_at > since
                && e.room_name.as_deref().is_some_and(|r| !is_bathroom(r))
        });
        Ok(found)
    }

    async fn activity_since(&self, hub_id: DbId, since: Timestamp) -> PipelineResult<bool> {
        let state = self.lock();
        let found = state
            .hub_events(hub_id)
            .any(|e| is_activity_event(e) && e.created_at >= since);
        Ok(found)
    }

    async fn fridge_opened_since(&self, hub_id: DbId, since: Timestamp) -> PipelineResult<bool> {
        let state = self.lock();
        let found = state.hub_events(hub_id).any(|e| {
            e.kind() == Some(ActivityEventType::DoorOpened)
                && e.created_at > since
                && e
                    .device_id
                    .and_then(|id| state.devices.get(&id))
                    .and_then(|d| d.metadata.get("location"))
                    .and_then(|l| l.as_str())
                    .is_some_and(is_fridge_location)
        });
        Ok(found)
    }

    async fn motion_samples_since(
        &self,
        hub_id: DbId,
        since: Timestamp,
    ) -> PipelineResult<Vec<MotionSample>> {
        let state = self.lock();
        let mut samples: Vec<MotionSample> = state
            .hub_events(hub_id)
            .filter(|e| is_motion(e) && e.created_at > since)
            .map(|e| MotionSample {
                created_at: e.created_at,
                room_name: e.room_name.clone(),
            })
            .collect();
        samples.sort_by_key(|s| s.created_at);
        Ok(samples)
    }

    async fn motion_day_stats(
        &self,
        hub_id: DbId,
        start: Timestamp,
        end: Timestamp,
    ) -> PipelineResult<MotionDayStats> {
        let state = self.lock();
        let day: Vec<&ActivityEvent> = state
            .hub_events(hub_id)
            .filter(|e| is_motion(e) && e.created_at >= start && e.created_at < end)
            .collect();

        let mut rooms_visited: Vec<String> = day
            .iter()
            .filter_map(|e| e.room_name.clone())
            .filter(|r| !r.is_empty())
            .collect();
        rooms_visited.sort();
        rooms_visited.dedup();

        Ok(MotionDayStats {
            first_activity: day.iter().map(|e| e.created_at).min(),
            last_activity: day.iter().map(|e| e.created_at).max(),
            total_motion_events: day.len() as i64,
            rooms_visited,
            anomalies_detected: day.iter().filter(|e| e.is_anomaly).count() as i64,
        })
    }

    async fn find_baseline_slot(
        &self,
        hub_id: DbId,
        day_of_week: i16,
        hour_of_day: i16,
        room_name: Option<&str>,
    ) -> PipelineResult<Option<ActivityBaseline>> {
        let state = self.lock();
        Ok(state
            .baselines
            .iter()
            .find(|b| {
                b.hub_id == hub_id
                    && b.day_of_week == day_of_week
                    && b.hour_of_day == hour_of_day
                    && b.room_name.as_deref() == room_name
            })
            .cloned())
    }

    async fn list_baselines(&self, hub_id: DbId) -> PipelineResult<Vec<ActivityBaseline>> {
        let state = self.lock();
        let mut rows: Vec<ActivityBaseline> = state
            .baselines
            .iter()
            .filter(|b| b.hub_id == hub_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            (a.day_of_week, a.hour_of_day, &a.room_name).cmp(&(
                b.day_of_week,
                b.hour_of_day,
                &b.room_name,
            ))
        });
        Ok(rows)
    }

    async fn upsert_baseline_slots(
        &self,
        hub_id: DbId,
        slots: &[SlotStats],
    ) -> PipelineResult<u64> {
        let mut state = self.lock();
        let now = Utc::now();

        for slot in slots {
            let existing = state.baselines.iter_mut().find(|b| {
                b.hub_id == hub_id
                    && b.day_of_week == slot.day_of_week
                    && b.hour_of_day == slot.hour_of_day
                    && b.room_name == slot.room_name
            });
            match existing {
                Some(row) => {
                    row.avg_motion_events = slot.avg_motion_events;
                    row.std_motion_events = slot.std_motion_events;
                    row.sample_count = slot.sample_count;
                    row.last_updated = now;
                    row.updated_at = now;
                }
                None => {
                    let id = state.next_id();
                    state.baselines.push(ActivityBaseline {
                        id,
                        hub_id,
                        day_of_week: slot.day_of_week,
                        hour_of_day: slot.hour_of_day,
                        room_name: slot.room_name.clone(),
                        avg_motion_events: slot.avg_motion_events,
                        std_motion_events: slot.std_motion_events,
                        sample_count: slot.sample_count,
                        last_updated: now,
                        created_at: now,
                        updated_at: now,
                    });
                }
            }
        }

        Ok(slots.len() as u64)
    }

    async fn insert_alert(&self, input: &CreateAlert) -> PipelineResult<Alert> {
        let mut state = self.lock();
        let now = Utc::now();
        let alert = Alert {
            id: state.next_id(),
            user_id: input.user_id,
            hub_id: input.hub_id,
            activity_event_id: input.activity_event_id,
            alert_type: input.alert_type,
            severity: input.severity,
            title: input.title.clone(),
            message: input.message.clone(),
            status: AlertStatus::Active,
            acknowledged_by: None,
            acknowledged_at: None,
            resolved_by: None,
            resolved_at: None,
            resolution_notes: None,
            escalation_level: 0,
            metadata: input.metadata.clone(),
            created_at: now,
            updated_at: now,
        };
        state.alerts.insert(alert.id, alert.clone());
        Ok(alert)
    }

    async fn find_alert(&self, id: DbId) -> PipelineResult<Option<Alert>> {
        Ok(self.lock().alerts.get(&id).cloned())
    }

    async fn find_recent_open_alert(
        &self,
        user_id: DbId,
        alert_type: AlertType,
        since: Timestamp,
    ) -> PipelineResult<Option<Alert>> {
        let state = self.lock();
        Ok(state
            .alerts
            .values()
            .filter(|a| {
                a.user_id == user_id
                    && a.alert_type == alert_type
                    && a.status.is_open()
                    && a.created_at > since
            })
            .max_by_key(|a| (a.created_at, a.id))
            .cloned())
    }

    async fn list_active_alerts(&self, user_id: DbId) -> PipelineResult<Vec<Alert>> {
        let state = self.lock();
        let mut alerts: Vec<Alert> = state
            .alerts
            .values()
            .filter(|a| a.user_id == user_id && a.status == AlertStatus::Active)
            .cloned()
            .collect();
        alerts.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(alerts)
    }

    async fn list_alert_history(
        &self,
        user_id: DbId,
        params: &AlertHistoryQuery,
    ) -> PipelineResult<(Vec<Alert>, i64)> {
        let state = self.lock();
        let mut alerts: Vec<Alert> = state
            .alerts
            .values()
            .filter(|a| a.user_id == user_id && params.status.map_or(true, |s| a.status == s))
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = alerts.len() as i64;
        let page = alerts
            .into_iter()
            .skip(params.offset.max(0) as usize)
            .take(params.limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn list_escalation_candidates(
        &self,
        now: Timestamp,
        step_minutes: i64,
        max_level: i32,
    ) -> PipelineResult<Vec<Alert>> {
        let state = self.lock();
        let mut alerts: Vec<Alert> = state
            .alerts
            .values()
            .filter(|a| {
                a.status.is_open()
                    && a.severity.is_escalatable()
                    && a.escalation_level < max_level
                    && a.created_at
                        <= now
                            - Duration::minutes(step_minutes * (i64::from(a.escalation_level) + 1))
            })
            .cloned()
            .collect();
        alerts.sort_by_key(|a| a.created_at);
        Ok(alerts)
    }

    async fn escalate_alert(
        &self,
        id: DbId,
        expected_level: i32,
        max_level: i32,
    ) -> PipelineResult<Option<Alert>> {
        let mut state = self.lock();
        let Some(alert) = state.alerts.get_mut(&id) else {
            return Ok(None);
        };
        if !alert.status.is_open()
            || alert.escalation_level != expected_level
            || alert.escalation_level >= max_level
        {
            return Ok(None);
        }
        alert.escalation_level += 1;
        alert.status = AlertStatus::Escalated;
        alert.updated_at = Utc::now();
        Ok(Some(alert.clone()))
    }

    async fn acknowledge_alert(
        &self,
        id: DbId,
        expected: AlertStatus,
        by: DbId,
    ) -> PipelineResult<Option<Alert>> {
        let mut state = self.lock();
        let Some(alert) = state.alerts.get_mut(&id).filter(|a| a.status == expected) else {
            return Ok(None);
        };
        let now = Utc::now();
        alert.status = AlertStatus::Acknowledged;
        alert.acknowledged_by = Some(by);
        alert.acknowledged_at = Some(now);
        alert.updated_at = now;
        Ok(Some(alert.clone()))
    }

    async fn close_alert(
        &self,
        id: DbId,
        expected: AlertStatus,
        target: AlertStatus,
        by: DbId,
        notes: Option<&str>,
    ) -> PipelineResult<Option<Alert>> {
        let mut state = self.lock();
        let Some(alert) = state.alerts.get_mut(&id).filter(|a| a.status == expected) else {
            return Ok(None);
        };
        let now = Utc::now();
        alert.status = target;
        alert.resolved_by = Some(by);
        alert.resolved_at = Some(now);
        alert.resolution_notes = notes.map(str::to_string);
        alert.updated_at = now;
        Ok(Some(alert.clone()))
    }

    async fn count_hub_alerts(
        &self,
        hub_id: DbId,
        start: Timestamp,
        end: Timestamp,
    ) -> PipelineResult<i64> {
        let state = self.lock();
        let count = state
            .alerts
            .values()
            .filter(|a| a.hub_id == Some(hub_id) && a.created_at >= start && a.created_at < end)
            .count();
        Ok(count as i64)
    }

    async fn create_pending_notification(
        &self,
        alert_id: DbId,
        family_member_id: DbId,
        channel: NotificationChannel,
    ) -> PipelineResult<DbId> {
        let mut state = self.lock();
        let id = state.next_id();
        let now = Utc::now();
        state.notifications.push(AlertNotification {
            id,
            alert_id,
            family_member_id,
            channel,
            status: DeliveryStatus::Pending,
            sent_at: None,
            delivered_at: None,
            read_at: None,
            error_message: None,
            retry_count: 0,
            created_at: now,
            updated_at: now,
        });
        Ok(id)
    }

    async fn mark_notification_sent(&self, id: DbId) -> PipelineResult<()> {
        let mut state = self.lock();
        if let Some(row) = state.notification_mut(id) {
            let now = Utc::now();
            row.status = DeliveryStatus::Sent;
            row.sent_at = Some(now);
            row.updated_at = now;
        }
        Ok(())
    }

    async fn mark_notification_failed(&self, id: DbId, error: &str) -> PipelineResult<()> {
        let mut state = self.lock();
        if let Some(row) = state.notification_mut(id) {
            row.status = DeliveryStatus::Failed;
            row.error_message = Some(error.to_string());
            row.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn list_notifications(&self, alert_id: DbId) -> PipelineResult<Vec<AlertNotification>> {
        let state = self.lock();
        let mut rows: Vec<AlertNotification> = state
            .notifications
            .iter()
            .filter(|n| n.alert_id == alert_id)
            .cloned()
            .collect();
        rows.sort_by_key(|n| (n.created_at, n.id));
        Ok(rows)
    }

    async fn list_family_members(&self, user_id: DbId) -> PipelineResult<Vec<FamilyMember>> {
        Ok(self.lock().chain(user_id))
    }

    async fn family_member_at(
        &self,
        user_id: DbId,
        position: i64,
    ) -> PipelineResult<Option<FamilyMember>> {
        if position < 0 {
            return Ok(None);
        }
        Ok(self.lock().chain(user_id).into_iter().nth(position as usize))
    }

    async fn primary_emergency_contact(
        &self,
        user_id: DbId,
    ) -> PipelineResult<Option<FamilyMember>> {
        let state = self.lock();
        Ok(state
            .family
            .iter()
            .filter(|m| {
                m.user_id == user_id
                    && m.is_emergency_contact
                    && m.phone.as_deref().is_some_and(|p| !p.trim().is_empty())
            })
            .min_by_key(|m| (m.priority_order, m.id))
            .cloned())
    }

    async fn find_hub(&self, id: DbId) -> PipelineResult<Option<Hub>> {
        Ok(self.lock().hubs.get(&id).cloned())
    }

    async fn list_online_hubs_with_resident(&self) -> PipelineResult<Vec<Hub>> {
        let state = self.lock();
        Ok(state
            .hubs
            .values()
            .filter(|h| h.status == "online" && h.user_id.is_some())
            .cloned()
            .collect())
    }

    async fn list_hubs(&self) -> PipelineResult<Vec<Hub>> {
        Ok(self.lock().hubs.values().cloned().collect())
    }

    async fn update_hub_status(
        &self,
        id: DbId,
        update: &UpdateHubStatus,
    ) -> PipelineResult<Option<HubStatusChange>> {
        let mut state = self.lock();
        let Some(hub) = state.hubs.get_mut(&id) else {
            return Ok(None);
        };
        let previous_status = std::mem::replace(&mut hub.status, update.status.clone());
        if update.firmware_version.is_some() {
            hub.firmware_version = update.firmware_version.clone();
        }
        if update.battery_level.is_some() {
            hub.battery_level = update.battery_level;
        }
        hub.is_on_battery = update.is_on_battery;
        if update.wifi_strength.is_some() {
            hub.wifi_strength = update.wifi_strength;
        }
        hub.last_seen_at = Some(update.seen_at);
        hub.updated_at = Utc::now();

        Ok(Some(HubStatusChange {
            hub_id: hub.id,
            user_id: hub.user_id,
            previous_status,
            status: hub.status.clone(),
        }))
    }

    async fn find_device(&self, id: DbId) -> PipelineResult<Option<Device>> {
        Ok(self.lock().devices.get(&id).cloned())
    }

    async fn touch_device(&self, id: DbId, at: Timestamp) -> PipelineResult<bool> {
        let mut state = self.lock();
        let Some(device) = state.devices.get_mut(&id) else {
            return Ok(false);
        };
        device.last_activity_at = Some(at);
        device.updated_at = Utc::now();
        Ok(true)
    }

    async fn update_device_battery(&self, id: DbId, battery_level: i32) -> PipelineResult<bool> {
        let mut state = self.lock();
        let Some(device) = state.devices.get_mut(&id) else {
            return Ok(false);
        };
        device.battery_level = Some(battery_level);
        device.updated_at = Utc::now();
        Ok(true)
    }

    async fn user_display_name(&self, id: DbId) -> PipelineResult<Option<String>> {
        Ok(self.lock().users.get(&id).map(User::display_name))
    }

    async fn insert_check_in(&self, input: &CreateCheckIn) -> PipelineResult<CheckIn> {
        let mut state = self.lock();
        let now = Utc::now();
        let check_in = CheckIn {
            id: state.next_id(),
            user_id: input.user_id,
            hub_id: input.hub_id,
            check_in_type: input.check_in_type.clone(),
            status: input.status.clone(),
            actual_time: input.actual_time,
            notes: None,
            family_notified: false,
            created_at: now,
            updated_at: now,
        };
        state.check_ins.push(check_in.clone());
        Ok(check_in)
    }

    async fn latest_check_in_status(
        &self,
        hub_id: DbId,
        start: Timestamp,
        end: Timestamp,
    ) -> PipelineResult<Option<String>> {
        let state = self.lock();
        Ok(state
            .check_ins
            .iter()
            .filter(|c| c.hub_id == Some(hub_id) && c.actual_time >= start && c.actual_time < end)
            .max_by_key(|c| (c.actual_time, c.id))
            .map(|c| c.status.clone()))
    }
}
