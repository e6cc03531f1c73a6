//! Family dashboard summaries and the daily summary digest.
//!
//! [`ActivitySummaries::daily_summary`] aggregates one local day of a hub's
//! motion, check-ins and alerts; [`ActivitySummaries::weekly_summary`] rolls
//! up the seven days ending today. The digest pushes yesterday's summary to
//! every family member who opted into `daily_summary` and has a linked
//! account.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use safehome_core::error::CoreError;
use safehome_core::summary::{
    local_date, local_day_bounds, week_ending, DailyActivitySummary, WeeklyActivitySummary,
};
use safehome_core::types::{DbId, Timestamp};
use safehome_db::models::hub::Hub;
use safehome_events::EventBus;

use crate::error::PipelineResult;
use crate::store::PipelineStore;

/// Real-time message type carrying a daily summary.
pub const DAILY_SUMMARY_MESSAGE_TYPE: &str = "daily_summary";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DigestReport {
    pub hubs: usize,
    /// Summaries handed to the bus, one per opted-in member.
    pub delivered: usize,
    pub failures: usize,
}

pub struct ActivitySummaries {
    store: Arc<dyn PipelineStore>,
    bus: Arc<EventBus>,
}

impl ActivitySummaries {
    pub fn new(store: Arc<dyn PipelineStore>, bus: Arc<EventBus>) -> Self {
        Self { store, bus }
    }

    pub async fn daily_summary(
        &self,
        hub_id: DbId,
        date: NaiveDate,
    ) -> PipelineResult<DailyActivitySummary> {
        let hub = self.hub(hub_id).await?;
        self.summarize(&hub, date).await
    }

    pub async fn weekly_summary(&self, hub_id: DbId) -> PipelineResult<WeeklyActivitySummary> {
        self.weekly_summary_at(hub_id, Utc::now()).await
    }

    /// The seven local days ending with the day containing `now`.
    pub async fn weekly_summary_at(
        &self,
        hub_id: DbId,
        now: Timestamp,
    ) -> PipelineResult<WeeklyActivitySummary> {
        let hub = self.hub(hub_id).await?;
        let today = local_date(now, hub.config().utc_offset());

        let mut days = Vec::new();
        for date in week_ending(today) {
            days.push(self.summarize(&hub, date).await?);
        }
        Ok(WeeklyActivitySummary::from_days(days))
    }

    pub async fn publish_daily_summaries(&self) -> PipelineResult<DigestReport> {
        self.publish_daily_summaries_at(Utc::now()).await
    }

    /// Send each opted-in member yesterday's summary for their resident.
    ///
    /// "Yesterday" is local to each hub. A hub that fails is logged and
    /// skipped.
    pub async fn publish_daily_summaries_at(&self, now: Timestamp) -> PipelineResult<DigestReport> {
        let hubs = self.store.list_hubs().await?;
        let mut report = DigestReport::default();

        for hub in hubs.iter().filter(|h| h.user_id.is_some()) {
            report.hubs += 1;
            match self.publish_for_hub(hub, now).await {
                Ok(delivered) => report.delivered += delivered,
                Err(e) => {
                    report.failures += 1;
                    tracing::error!(hub_id = hub.id, error = %e, "Daily summary digest failed");
                }
            }
        }

        tracing::info!(
            hubs = report.hubs,
            delivered = report.delivered,
            failures = report.failures,
            "Daily summary digest complete"
        );
        Ok(report)
    }

    async fn publish_for_hub(&self, hub: &Hub, now: Timestamp) -> PipelineResult<usize> {
        let Some(user_id) = hub.user_id else {
            return Ok(0);
        };

        let accounts: Vec<DbId> = self
            .store
            .list_family_members(user_id)
            .await?
            .into_iter()
            .filter(|m| m.preferences().daily_summary)
            .filter_map(|m| m.family_user_id)
            .collect();
        if accounts.is_empty() {
            return Ok(0);
        }

        let yesterday = local_date(now, hub.config().utc_offset()) - Duration::days(1);
        let summary = self.summarize(hub, yesterday).await?;
        let data = serde_json::to_value(&summary)
            .map_err(|e| CoreError::Internal(format!("Failed to encode daily summary: {e}")))?;

        for account_id in &accounts {
            self.bus
                .send_to_user(*account_id, DAILY_SUMMARY_MESSAGE_TYPE, data.clone());
        }
        tracing::debug!(hub_id = hub.id, %yesterday, members = accounts.len(), "Daily summary sent");
        Ok(accounts.len())
    }

    async fn summarize(&self, hub: &Hub, date: NaiveDate) -> PipelineResult<DailyActivitySummary> {
        let (start, end) = local_day_bounds(date, hub.config().utc_offset());

        let motion = self.store.motion_day_stats(hub.id, start, end).await?;
        let check_in_status = self.store.latest_check_in_status(hub.id, start, end).await?;
        let alerts_triggered = self.store.count_hub_alerts(hub.id, start, end).await?;

        Ok(DailyActivitySummary::new(date, motion, check_in_status, alerts_triggered))
    }

    async fn hub(&self, hub_id: DbId) -> PipelineResult<Hub> {
        self.store
            .find_hub(hub_id)
            .await?
            .ok_or_else(|| {
                CoreError::NotFound {
                    entity: "Hub",
                    id: hub_id,
                }
                .into()
            })
    }
}
