//! Periodic sweeps.
//!
//! Each job ticks on a `tokio::time::interval` until its
//! [`CancellationToken`] fires. A failed tick is logged and the loop keeps
//! going.

use std::sync::Arc;
use std::time::Duration;

use safehome_pipeline::{ActivitySummaries, AlertManager, BaselineRebuilder, InactivitySweep};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

pub async fn run_escalation(alerts: Arc<AlertManager>, period: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = period.as_secs(), "Escalation job started");
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Escalation job stopping");
                break;
            }
            _ = interval.tick() => {
                match alerts.escalate_unacknowledged_alerts().await {
                    Ok(report) if report.escalated.is_empty() => {
                        tracing::debug!(skipped = report.skipped, "Escalation: nothing due");
                    }
                    Ok(report) => {
                        tracing::info!(
                            escalated = report.escalated.len(),
                            skipped = report.skipped,
                            "Escalation: alerts advanced"
                        );
                    }
                    Err(e) => tracing::error!(error = %e, "Escalation sweep failed"),
                }
            }
        }
    }
}

pub async fn run_inactivity(sweep: Arc<InactivitySweep>, period: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = period.as_secs(), "Inactivity job started");
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Inactivity job stopping");
                break;
            }
            _ = interval.tick() => {
                match sweep.sweep().await {
                    Ok(report) => {
                        tracing::info!(
                            hubs = report.hubs_checked,
                            alerts = report.alerts.len(),
                            failures = report.failures,
                            "Inactivity: sweep complete"
                        );
                    }
                    Err(e) => tracing::error!(error = %e, "Inactivity sweep failed"),
                }
            }
        }
    }
}

pub async fn run_baseline(
    baselines: Arc<BaselineRebuilder>,
    period: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(interval_secs = period.as_secs(), "Baseline job started");
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Baseline job stopping");
                break;
            }
            _ = interval.tick() => {
                match baselines.rebuild_all().await {
                    Ok(hubs) => tracing::info!(hubs, "Baseline: rebuild complete"),
                    Err(e) => tracing::error!(error = %e, "Baseline rebuild failed"),
                }
            }
        }
    }
}

pub async fn run_daily_summary(
    summaries: Arc<ActivitySummaries>,
    period: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(interval_secs = period.as_secs(), "Daily summary job started");
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Daily summary job stopping");
                break;
            }
            _ = interval.tick() => {
                if let Err(e) = summaries.publish_daily_summaries().await {
                    tracing::error!(error = %e, "Daily summary digest failed");
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use safehome_core::escalation::AlertPolicy;
    use safehome_events::{ChannelRouter, EventBus, PushDelivery};
    use safehome_pipeline::{MemoryStore, NotificationFanout, PipelineStore};

    use super::*;

    fn manager() -> Arc<AlertManager> {
        let store: Arc<dyn PipelineStore> = Arc::new(MemoryStore::new());
        let bus = Arc::new(EventBus::default());
        let router = Arc::new(ChannelRouter::new(PushDelivery::new(Arc::clone(&bus))));
        let fanout = NotificationFanout::new(Arc::clone(&store), router);
        Arc::new(AlertManager::new(store, bus, fanout, AlertPolicy::default()))
    }

    #[tokio::test]
    async fn cancelled_job_returns() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        tokio::time::timeout(
            Duration::from_secs(1),
            run_escalation(manager(), Duration::from_secs(60), cancel),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn running_job_stops_on_cancel() {
        let cancel = CancellationToken::new();
        let store: Arc<dyn PipelineStore> = Arc::new(MemoryStore::new());
        let handle = tokio::spawn(run_baseline(
            Arc::new(BaselineRebuilder::new(store)),
            Duration::from_millis(10),
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(30)).await;
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
