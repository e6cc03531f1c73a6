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
use safehome_db::repositories::{
    ActivityEventRepo, AlertNotificationRepo, AlertRepo, BaselineRepo, CheckInRepo, DeviceRepo,
    FamilyMemberRepo, HubRepo, UserRepo,
};
use safehome_db::DbPool;

use super::PipelineStore;
use crate::error::PipelineResult;

/// [`PipelineStore`] backed by PostgreSQL.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl PipelineStore for PgStore {
    async fn insert_activity_event(
        &self,
        input: &CreateActivityEvent,
    ) -> PipelineResult<ActivityEvent> {
        Ok(ActivityEventRepo::create(&self.pool, input).await?)
    }

    async fn last_event_of_kind(
        &self,
        hub_id: DbId,
        kind: ActivityEventType,
    ) -> PipelineResult<Option<ActivityEvent>> {
        Ok(ActivityEventRepo::last_of_kind(&self.pool, hub_id, kind).await?)
    }

    async fn last_activity(&self, hub_id: DbId) -> PipelineResult<Option<ActivityEvent>> {
        Ok(ActivityEventRepo::last_activity(&self.pool, hub_id).await?)
    }

    async fn last_bathroom_motion(&self, hub_id: DbId) -> PipelineResult<Option<ActivityEvent>> {
        Ok(ActivityEventRepo::last_bathroom_motion(&self.pool, hub_id).await?)
    }

    async fn motion_elsewhere_since(&self, hub_id: DbId, since: Timestamp) -> PipelineResult<bool> {
        Ok(ActivityEventRepo::motion_elsewhere_since(&self.pool, hub_id, since).await?)
    }

    async fn activity_since(&self, hub_id: DbId, since: Timestamp) -> PipelineResult<bool> {
        Ok(ActivityEventRepo::activity_since(&self.pool, hub_id, since).await?)
    }

    async fn fridge_opened_since(&self, hub_id: DbId, since: Timestamp) -> PipelineResult<bool> {
        Ok(ActivityEventRepo::fridge_opened_since(&self.pool, hub_id, since).await?)
    }

    async fn motion_samples_since(
        &self,
        hub_id: DbId,
        since: Timestamp,
    ) -> PipelineResult<Vec<MotionSample>> {
        Ok(ActivityEventRepo::motion_samples_since(&self.pool, hub_id, since).await?)
    }

    async fn motion_day_stats(
        &self,
        hub_id: DbId,
        start: Timestamp,
        end: Timestamp,
    ) -> PipelineResult<MotionDayStats> {
        Ok(ActivityEventRepo::motion_day_stats(&self.pool, hub_id, start, end).await?)
    }

    async fn find_baseline_slot(
        &self,
        hub_id: DbId,
        day_of_week: i16,
        hour_of_day: i16,
        room_name: Option<&str>,
    ) -> PipelineResult<Option<ActivityBaseline>> {
        Ok(
            BaselineRepo::find_slot(&self.pool, hub_id, day_of_week, hour_of_day, room_name)
                .await?,
        )
    }

    async fn list_baselines(&self, hub_id: DbId) -> PipelineResult<Vec<ActivityBaseline>> {
        Ok(BaselineRepo::list_for_hub(&self.pool, hub_id).await?)
    }

    async fn upsert_baseline_slots(
        &self,
        hub_id: DbId,
        slots: &[SlotStats],
    ) -> PipelineResult<u64> {
        Ok(BaselineRepo::upsert_slots(&self.pool, hub_id, slots).await?)
    }

    async fn insert_alert(&self, input: &CreateAlert) -> PipelineResult<Alert> {
        Ok(AlertRepo::create(&self.pool, input).await?)
    }

    async fn find_alert(&self, id: DbId) -> PipelineResult<Option<Alert>> {
        Ok(AlertRepo::find_by_id(&self.pool, id).await?)
    }

    async fn find_recent_open_alert(
        &self,
        user_id: DbId,
        alert_type: AlertType,
        since: Timestamp,
    ) -> PipelineResult<Option<Alert>> {
        Ok(AlertRepo::find_recent_open(&self.pool, user_id, alert_type, since).await?)
    }

    async fn list_active_alerts(&self, user_id: DbId) -> PipelineResult<Vec<Alert>> {
        Ok(AlertRepo::list_active(&self.pool, user_id).await?)
    }

    async fn list_alert_history(
        &self,
        user_id: DbId,
        params: &AlertHistoryQuery,
    ) -> PipelineResult<(Vec<Alert>, i64)> {
        Ok(AlertRepo::list_history(&self.pool, user_id, params).await?)
    }

    async fn list_escalation_candidates(
        &self,
        now: Timestamp,
        step_minutes: i64,
        max_level: i32,
    ) -> PipelineResult<Vec<Alert>> {
        Ok(AlertRepo::list_escalation_candidates(&self.pool, now, step_minutes, max_level).await?)
    }

    async fn escalate_alert(
        &self,
        id: DbId,
        expected_level: i32,
        max_level: i32,
    ) -> PipelineResult<Option<Alert>> {
        Ok(AlertRepo::escalate(&self.pool, id, expected_level, max_level).await?)
    }

    async fn acknowledge_alert(
        &self,
        id: DbId,
        expected: AlertStatus,
        by: DbId,
    ) -> PipelineResult<Option<Alert>> {
        Ok(AlertRepo::acknowledge(&self.pool, id, expected, by).await?)
    }

    async fn close_alert(
        &self,
        id: DbId,
        expected: AlertStatus,
        target: AlertStatus,
        by: DbId,
        notes: Option<&str>,
    ) -> PipelineResult<Option<Alert>> {
        Ok(AlertRepo::close(&self.pool, id, expected, target, by, notes).await?)
    }

    async fn count_hub_alerts(
        &self,
        hub_id: DbId,
        start: Timestamp,
        end: Timestamp,
    ) -> PipelineResult<i64> {
        Ok(AlertRepo::count_for_hub_between(&self.pool, hub_id, start, end).await?)
    }

    async fn create_pending_notification(
        &self,
        alert_id: DbId,
        family_member_id: DbId,
        channel: NotificationChannel,
    ) -> PipelineResult<DbId> {
        Ok(
            AlertNotificationRepo::create_pending(&self.pool, alert_id, family_member_id, channel)
                .await?,
        )
    }

    async fn mark_notification_sent(&self, id: DbId) -> PipelineResult<()> {
        Ok(AlertNotificationRepo::mark_sent(&self.pool, id).await?)
    }

    async fn mark_notification_failed(&self, id: DbId, error: &str) -> PipelineResult<()> {
        Ok(AlertNotificationRepo::mark_failed(&self.pool, id, error).await?)
    }

    async fn list_notifications(&self, alert_id: DbId) -> PipelineResult<Vec<AlertNotification>> {
        Ok(AlertNotificationRepo::list_for_alert(&self.pool, alert_id).await?)
    }

    async fn list_family_members(&self, user_id: DbId) -> PipelineResult<Vec<FamilyMember>> {
        Ok(FamilyMemberRepo::list_for_user(&self.pool, user_id).await?)
    }

    async fn family_member_at(
        &self,
        user_id: DbId,
        position: i64,
    ) -> PipelineResult<Option<FamilyMember>> {
        Ok(FamilyMemberRepo::at_position(&self.pool, user_id, position).await?)
    }

    async fn primary_emergency_contact(
        &self,
        user_id: DbId,
    ) -> PipelineResult<Option<FamilyMember>> {
        Ok(FamilyMemberRepo::primary_emergency_contact(&self.pool, user_id).await?)
    }

    async fn find_hub(&self, id: DbId) -> PipelineResult<Option<Hub>> {
        Ok(HubRepo::find_by_id(&self.pool, id).await?)
    }

    async fn list_online_hubs_with_resident(&self) -> PipelineResult<Vec<Hub>> {
        Ok(HubRepo::list_online_with_resident(&self.pool).await?)
    }

    async fn list_hubs(&self) -> PipelineResult<Vec<Hub>> {
        Ok(HubRepo::list_all(&self.pool).await?)
    }

    async fn update_hub_status(
        &self,
        id: DbId,
        update: &UpdateHubStatus,
    ) -> PipelineResult<Option<HubStatusChange>> {
        Ok(HubRepo::update_status(&self.pool, id, update).await?)
    }

    async fn find_device(&self, id: DbId) -> PipelineResult<Option<Device>> {
        Ok(DeviceRepo::find_by_id(&self.pool, id).await?)
    }

    async fn touch_device(&self, id: DbId, at: Timestamp) -> PipelineResult<bool> {
        Ok(DeviceRepo::touch_activity(&self.pool, id, at).await?)
    }

    async fn update_device_battery(&self, id: DbId, battery_level: i32) -> PipelineResult<bool> {
        Ok(DeviceRepo::update_battery(&self.pool, id, battery_level).await?)
    }

    async fn user_display_name(&self, id: DbId) -> PipelineResult<Option<String>> {
        Ok(UserRepo::display_name(&self.pool, id).await?)
    }

    async fn insert_check_in(&self, input: &CreateCheckIn) -> PipelineResult<CheckIn> {
        Ok(CheckInRepo::create(&self.pool, input).await?)
    }

    async fn latest_check_in_status(
        &self,
        hub_id: DbId,
        start: Timestamp,
        end: Timestamp,
    ) -> PipelineResult<Option<String>> {
        Ok(CheckInRepo::latest_status_for_hub(&self.pool, hub_id, start, end).await?)
    }
}
