//! Baseline rebuild from recent motion history.

use std::sync::Arc;

use chrono::{Duration, Utc};
use safehome_core::baseline::{compute_slots, BASELINE_WINDOW_DAYS};
use safehome_core::error::CoreError;
use safehome_core::types::{DbId, Timestamp};

use crate::error::PipelineResult;
use crate::store::PipelineStore;

pub struct BaselineRebuilder {
    store: Arc<dyn PipelineStore>,
}

impl BaselineRebuilder {
    pub fn new(store: Arc<dyn PipelineStore>) -> Self {
        Self { store }
    }

    pub async fn rebuild(&self, hub_id: DbId) -> PipelineResult<u64> {
        self.rebuild_at(hub_id, Utc::now()).await
    }

    /// Recompute every slot seen in the last 30 days and upsert it.
    ///
    /// Slots with no motion in the window keep their previous row. Safe to
    /// re-run; returns the number of slots written.
    pub async fn rebuild_at(&self, hub_id: DbId, now: Timestamp) -> PipelineResult<u64> {
        let hub = self
            .store
            .find_hub(hub_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Hub",
                id: hub_id,
            })?;

        let since = now - Duration::days(BASELINE_WINDOW_DAYS);
        let samples = self.store.motion_samples_since(hub_id, since).await?;
        let slots = compute_slots(&samples, hub.config().utc_offset());
        let written = self.store.upsert_baseline_slots(hub_id, &slots).await?;

        tracing::info!(hub_id, samples = samples.len(), slots = written, "Baseline rebuilt");
        Ok(written)
    }

    /// Rebuild every hub, logging and skipping failures.
    ///
    /// Returns how many hubs were rebuilt.
    pub async fn rebuild_all(&self) -> PipelineResult<usize> {
        let hubs = self.store.list_hubs().await?;
        let mut rebuilt = 0;

        for hub in &hubs {
            match self.rebuild(hub.id).await {
                Ok(_) => rebuilt += 1,
                Err(e) => {
                    tracing::error!(hub_id = hub.id, error = %e, "Baseline rebuild failed");
                }
            }
        }

        Ok(rebuilt)
    }
}
