mod config;
mod intake;
mod jobs;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use safehome_events::{
    ChannelRouter, EmailConfig, EmailDelivery, EventBus, GatewayConfig, GatewayDelivery,
    PushDelivery,
};
use safehome_pipeline::{
    ActivitySummaries, AlertManager, BaselineRebuilder, EventPipeline, InactivitySweep,
    NotificationFanout, PgStore, PipelineStore,
};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::WorkerConfig;

const DEFAULT_LOG_FILTER: &str = "safehome_worker=debug,safehome_pipeline=debug,safehome_events=info";

/// How long each background task gets to finish after cancellation.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = WorkerConfig::from_env()?;
    init_tracing(config.json_logs);

    tracing::info!("SafeHome worker starting");

    let pool = safehome_db::create_pool(&config.database_url, config.database_max_connections)
        .await
        .context("Failed to connect to database")?;
    safehome_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    tracing::info!("Database connection established");

    safehome_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    // -- services -----------------------------------------------------------

    let bus = Arc::new(EventBus::default());
    let channels = Arc::new(build_channels(&bus)?);
    let store: Arc<dyn PipelineStore> = Arc::new(PgStore::new(pool.clone()));

    let fanout = NotificationFanout::new(Arc::clone(&store), channels);
    let alerts = Arc::new(AlertManager::new(
        Arc::clone(&store),
        Arc::clone(&bus),
        fanout,
        config.policy,
    ));
    let pipeline = Arc::new(EventPipeline::new(Arc::clone(&store), Arc::clone(&alerts)));
    let inactivity = Arc::new(InactivitySweep::new(Arc::clone(&store), Arc::clone(&alerts)));
    let baselines = Arc::new(BaselineRebuilder::new(Arc::clone(&store)));
    let summaries = Arc::new(ActivitySummaries::new(Arc::clone(&store), Arc::clone(&bus)));

    // -- background tasks ---------------------------------------------------

    let cancel = CancellationToken::new();
    let mut handles: Vec<(&'static str, JoinHandle<()>)> = vec![
        (
            "realtime",
            tokio::spawn(log_realtime(bus.subscribe(), cancel.clone())),
        ),
        (
            "escalation",
            tokio::spawn(jobs::run_escalation(
                Arc::clone(&alerts),
                config.escalation_interval,
                cancel.clone(),
            )),
        ),
        (
            "inactivity",
            tokio::spawn(jobs::run_inactivity(
                inactivity,
                config.inactivity_interval,
                cancel.clone(),
            )),
        ),
        (
            "baseline",
            tokio::spawn(jobs::run_baseline(
                baselines,
                config.baseline_interval,
                cancel.clone(),
            )),
        ),
        (
            "daily_summary",
            tokio::spawn(jobs::run_daily_summary(
                summaries,
                config.daily_summary_interval,
                cancel.clone(),
            )),
        ),
    ];

    match config.hub_intake_url.clone() {
        Some(url) => handles.push((
            "intake",
            tokio::spawn(intake::run(url, Arc::clone(&pipeline), cancel.clone())),
        )),
        None => tracing::warn!("HUB_INTAKE_URL not set, hub message intake disabled"),
    }

    tracing::info!(tasks = handles.len(), "Worker running");

    shutdown_signal().await;

    cancel.cancel();
    for (name, handle) in handles {
        match tokio::time::timeout(SHUTDOWN_GRACE, handle).await {
            Ok(Ok(())) => tracing::debug!(task = name, "Task stopped"),
            Ok(Err(e)) => tracing::error!(task = name, error = %e, "Task panicked"),
            Err(_) => tracing::warn!(task = name, "Task did not stop in time"),
        }
    }

    pool.close().await;
    tracing::info!("SafeHome worker stopped");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Push is always on; email and the phone gateways only when configured.
fn build_channels(bus: &Arc<EventBus>) -> anyhow::Result<ChannelRouter> {
    let mut router = ChannelRouter::new(PushDelivery::new(Arc::clone(bus)));

    match EmailConfig::from_env() {
        Some(email) => router = router.with_email(EmailDelivery::new(email)),
        None => tracing::warn!("SMTP_HOST not set, email notifications disabled"),
    }

    let gateway = GatewayConfig::from_env();
    match GatewayDelivery::sms(&gateway).context("Failed to build SMS gateway client")? {
        Some(sms) => router = router.with_sms(sms),
        None => tracing::warn!("SMS_GATEWAY_URL not set, SMS notifications disabled"),
    }
    match GatewayDelivery::voice(&gateway).context("Failed to build voice gateway client")? {
        Some(voice) => router = router.with_voice(voice),
        None => tracing::warn!("VOICE_GATEWAY_URL not set, voice calls disabled"),
    }

    tracing::info!(channels = ?router.configured_channels(), "Notification channels configured");
    Ok(router)
}

/// Log everything published on the bus.
///
/// This process holds no client connections; the log is the record of what
/// a connected dashboard would have received.
async fn log_realtime(
    mut rx: broadcast::Receiver<safehome_events::RealtimeMessage>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            received = rx.recv() => match received {
                Ok(message) => tracing::debug!(
                    audience = ?message.audience,
                    message_type = %message.message_type,
                    "Realtime message published"
                ),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Realtime log lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), shutting down");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        }
    }
}
