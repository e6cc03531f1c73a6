//! Persistence seam for the pipeline services.
//!
//! [`PipelineStore`] names every query and conditional update the services
//! perform. [`PgStore`] delegates to the `safehome-db` repositories;
//! [`MemoryStore`] answers the same questions from process memory with the
//! same ordering and conditional-update semantics.

use async_trait::async_trait;
use safehome_core::activity::ActivityEventType;
use safehome_core::alert::{AlertStatus, AlertType};
use safehome_core::baseline::{MotionSample, SlotStats};
use safehome_core::channels::NotificationChannel;
use safehome_core::summary::MotionDayStats;
use safehome_core::types::{DbId, Timestamp};
use safehome_db::models::activity::{ActivityBaseline, ActivityEvent, CreateActivityEvent};
use safehome_db::models::alert::{Alert, AlertHistoryQuery, AlertNotification, CreateAlert};
use safehome_db::models::check_in::{CheckIn, CreateCheckIn};
use safehome_db::models::family::FamilyMember;
use safehome_db::models::hub::{Device, Hub, HubStatusChange, UpdateHubStatus};

use crate::error::PipelineResult;

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait PipelineStore: Send + Sync {
    // -- activity events ----------------------------------------------------

    /// Append an event. `device_id`, when set, must name a registered device.
    async fn insert_activity_event(&self, input: &CreateActivityEvent)
        -> PipelineResult<ActivityEvent>;

    async fn last_event_of_kind(
        &self,
        hub_id: DbId,
        kind: ActivityEventType,
    ) -> PipelineResult<Option<ActivityEvent>>;

    /// Most recent motion, door-open or appliance-on event.
    async fn last_activity(&self, hub_id: DbId) -> PipelineResult<Option<ActivityEvent>>;

    async fn last_bathroom_motion(&self, hub_id: DbId) -> PipelineResult<Option<ActivityEvent>>;

    /// Motion in a non-bathroom room strictly after `since`.
    async fn motion_elsewhere_since(&self, hub_id: DbId, since: Timestamp) -> PipelineResult<bool>;

    /// Any activity of interest at or after `since`.
    async fn activity_since(&self, hub_id: DbId, since: Timestamp) -> PipelineResult<bool>;

    /// A fridge door sensor reported `door_opened` strictly after `since`.
    async fn fridge_opened_since(&self, hub_id: DbId, since: Timestamp) -> PipelineResult<bool>;

    async fn motion_samples_since(
        &self,
        hub_id: DbId,
        since: Timestamp,
    ) -> PipelineResult<Vec<MotionSample>>;

    /// Motion figures for a hub in `[start, end)`.
    async fn motion_day_stats(
        &self,
        hub_id: DbId,
        start: Timestamp,
        end: Timestamp,
    ) -> PipelineResult<MotionDayStats>;

    // -- baselines ----------------------------------------------------------

    async fn find_baseline_slot(
        &self,
        hub_id: DbId,
        day_of_week: i16,
        hour_of_day: i16,
        room_name: Option<&str>,
    ) -> PipelineResult<Option<ActivityBaseline>>;

    async fn list_baselines(&self, hub_id: DbId) -> PipelineResult<Vec<ActivityBaseline>>;

    async fn upsert_baseline_slots(&self, hub_id: DbId, slots: &[SlotStats])
        -> PipelineResult<u64>;

    // -- alerts -------------------------------------------------------------

    async fn insert_alert(&self, input: &CreateAlert) -> PipelineResult<Alert>;

    async fn find_alert(&self, id: DbId) -> PipelineResult<Option<Alert>>;

    /// Open alert of this type for the resident created after `since`.
    async fn find_recent_open_alert(
        &self,
        user_id: DbId,
        alert_type: AlertType,
        since: Timestamp,
    ) -> PipelineResult<Option<Alert>>;

    async fn list_active_alerts(&self, user_id: DbId) -> PipelineResult<Vec<Alert>>;

    async fn list_alert_history(
        &self,
        user_id: DbId,
        params: &AlertHistoryQuery,
    ) -> PipelineResult<(Vec<Alert>, i64)>;

    async fn list_escalation_candidates(
        &self,
        now: Timestamp,
        step_minutes: i64,
        max_level: i32,
    ) -> PipelineResult<Vec<Alert>>;

    /// Advance one level if the alert is still open at `expected_level`.
    async fn escalate_alert(
        &self,
        id: DbId,
        expected_level: i32,
        max_level: i32,
    ) -> PipelineResult<Option<Alert>>;

    async fn acknowledge_alert(
        &self,
        id: DbId,
        expected: AlertStatus,
        by: DbId,
    ) -> PipelineResult<Option<Alert>>;

    async fn close_alert(
        &self,
        id: DbId,
        expected: AlertStatus,
        target: AlertStatus,
        by: DbId,
        notes: Option<&str>,
    ) -> PipelineResult<Option<Alert>>;

    /// Alerts raised for a hub in `[start, end)`.
    async fn count_hub_alerts(
        &self,
        hub_id: DbId,
        start: Timestamp,
        end: Timestamp,
    ) -> PipelineResult<i64>;

    // -- delivery log -------------------------------------------------------

    async fn create_pending_notification(
        &self,
        alert_id: DbId,
        family_member_id: DbId,
        channel: NotificationChannel,
    ) -> PipelineResult<DbId>;

    async fn mark_notification_sent(&self, id: DbId) -> PipelineResult<()>;

    async fn mark_notification_failed(&self, id: DbId, error: &str) -> PipelineResult<()>;

    async fn list_notifications(&self, alert_id: DbId) -> PipelineResult<Vec<AlertNotification>>;

    // -- family, hubs, devices, users ---------------------------------------

    /// A resident's family members in chain order.
    async fn list_family_members(&self, user_id: DbId) -> PipelineResult<Vec<FamilyMember>>;

    async fn family_member_at(
        &self,
        user_id: DbId,
        position: i64,
    ) -> PipelineResult<Option<FamilyMember>>;

    async fn primary_emergency_contact(&self, user_id: DbId)
        -> PipelineResult<Option<FamilyMember>>;

    async fn find_hub(&self, id: DbId) -> PipelineResult<Option<Hub>>;

    async fn list_online_hubs_with_resident(&self) -> PipelineResult<Vec<Hub>>;

    async fn list_hubs(&self) -> PipelineResult<Vec<Hub>>;

    async fn update_hub_status(
        &self,
        id: DbId,
        update: &UpdateHubStatus,
    ) -> PipelineResult<Option<HubStatusChange>>;

    async fn find_device(&self, id: DbId) -> PipelineResult<Option<Device>>;

    async fn touch_device(&self, id: DbId, at: Timestamp) -> PipelineResult<bool>;

    async fn update_device_battery(&self, id: DbId, battery_level: i32) -> PipelineResult<bool>;

    async fn user_display_name(&self, id: DbId) -> PipelineResult<Option<String>>;

    async fn insert_check_in(&self, input: &CreateCheckIn) -> PipelineResult<CheckIn>;

    /// Status of the latest check-in through a hub in `[start, end)`.
    async fn latest_check_in_status(
        &self,
        hub_id: DbId,
        start: Timestamp,
        end: Timestamp,
    ) -> PipelineResult<Option<String>>;
}
