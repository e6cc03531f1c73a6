//! Periodic inactivity checks per hub.

use std::sync::Arc;

use chrono::Utc;
use safehome_core::error::CoreError;
use safehome_core::hub_config::HubConfig;
use safehome_core::inactivity::{
    eating_window_start, evaluate, morning_start, InactivityFacts, InactivityVerdict,
};
use safehome_core::types::{DbId, Timestamp};
use safehome_db::models::alert::CreateAlert;
use safehome_db::models::hub::Hub;
use serde_json::json;

use crate::alerts::AlertManager;
use crate::error::PipelineResult;
use crate::store::PipelineStore;

/// What one sweep over all hubs did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InactivitySweepReport {
    pub hubs_checked: usize,
    /// Alerts raised (or matched by an open duplicate).
    pub alerts: Vec<DbId>,
    pub failures: usize,
}

pub struct InactivitySweep {
    store: Arc<dyn PipelineStore>,
    alerts: Arc<AlertManager>,
}

impl InactivitySweep {
    pub fn new(store: Arc<dyn PipelineStore>, alerts: Arc<AlertManager>) -> Self {
        Self { store, alerts }
    }

    pub async fn check_inactivity(&self, hub_id: DbId) -> PipelineResult<InactivityVerdict> {
        self.check_inactivity_at(hub_id, Utc::now()).await
    }

    /// Evaluate one hub's inactivity rules as of `now`. Raises nothing.
    pub async fn check_inactivity_at(
        &self,
        hub_id: DbId,
        now: Timestamp,
    ) -> PipelineResult<InactivityVerdict> {
        let hub = self
            .store
            .find_hub(hub_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Hub",
                id: hub_id,
            })?;
        let config = hub.config();
        let facts = self.gather_facts(hub_id, &config, now).await?;
        Ok(evaluate(&facts, &config, now))
    }

    async fn gather_facts(
        &self,
        hub_id: DbId,
        config: &HubConfig,
        now: Timestamp,
    ) -> PipelineResult<InactivityFacts> {
        let Some(last) = self.store.last_activity(hub_id).await? else {
            return Ok(InactivityFacts::default());
        };

        let last_bathroom_motion = self
            .store
            .last_bathroom_motion(hub_id)
            .await?
            .map(|e| e.created_at);
        let motion_elsewhere_since_bathroom = match last_bathroom_motion {
            Some(at) => self.store.motion_elsewhere_since(hub_id, at).await?,
            None => false,
        };

        Ok(InactivityFacts {
            last_activity: Some(last.created_at),
            last_bathroom_motion,
            motion_elsewhere_since_bathroom,
            activity_since_morning_start: self
                .store
                .activity_since(hub_id, morning_start(now, config))
                .await?,
            fridge_opened_recently: self
                .store
                .fridge_opened_since(hub_id, eating_window_start(now))
                .await?,
        })
    }

    pub async fn sweep(&self) -> PipelineResult<InactivitySweepReport> {
        self.sweep_at(Utc::now()).await
    }

    /// Check every online hub that has a resident and raise alerts for
    /// positive results. One hub's failure does not stop the others.
    pub async fn sweep_at(&self, now: Timestamp) -> PipelineResult<InactivitySweepReport> {
        let hubs = self.store.list_online_hubs_with_resident().await?;
        let mut report = InactivitySweepReport::default();

        for hub in &hubs {
            report.hubs_checked += 1;
            match self.sweep_hub(hub, now).await {
                Ok(Some(alert_id)) => report.alerts.push(alert_id),
                Ok(None) => {}
                Err(e) => {
                    report.failures += 1;
                    tracing::error!(hub_id = hub.id, error = %e, "Inactivity check failed");
                }
            }
        }

        tracing::debug!(
            hubs = report.hubs_checked,
            alerts = report.alerts.len(),
            failures = report.failures,
            "Inactivity sweep complete"
        );
        Ok(report)
    }

    async fn sweep_hub(&self, hub: &Hub, now: Timestamp) -> PipelineResult<Option<DbId>> {
        let Some(user_id) = hub.user_id else {
            return Ok(None);
        };
        let verdict = self.check_inactivity_at(hub.id, now).await?;
        let Some(finding) = verdict.alert else {
            return Ok(None);
        };

        let alert = self
            .alerts
            .create_alert(CreateAlert {
                user_id,
                hub_id: Some(hub.id),
                activity_event_id: None,
                alert_type: finding.alert_type,
                severity: finding.severity(),
                title: finding.alert_type.default_title().to_string(),
                message: Some(finding.message),
                metadata: json!({ "last_activity": verdict.last_activity }),
            })
            .await?;
        Ok(Some(alert.id))
    }
}
