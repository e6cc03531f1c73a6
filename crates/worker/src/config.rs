use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context};
use safehome_core::escalation::AlertPolicy;

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    /// WebSocket endpoint delivering hub messages; intake is off when unset.
    pub hub_intake_url: Option<String>,
    pub escalation_interval: Duration,
    pub inactivity_interval: Duration,
    pub baseline_interval: Duration,
    pub daily_summary_interval: Duration,
    pub policy: AlertPolicy,
    pub json_logs: bool,
}

impl WorkerConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                       | Default    |
    /// |-------------------------------|------------|
    /// | `DATABASE_URL`                | (required) |
    /// | `DATABASE_MAX_CONNECTIONS`    | `20`       |
    /// | `HUB_INTAKE_URL`              | (none)     |
    /// | `ESCALATION_INTERVAL_SECS`    | `60`       |
    /// | `INACTIVITY_INTERVAL_SECS`    | `3600`     |
    /// | `BASELINE_INTERVAL_SECS`      | `86400`    |
    /// | `DAILY_SUMMARY_INTERVAL_SECS` | `86400`    |
    /// | `DEDUP_WINDOW_MINUTES`        | `15`       |
    /// | `ESCALATION_STEP_MINUTES`     | `5`        |
    /// | `MAX_ESCALATION_LEVEL`        | `3`        |
    /// | `LOG_FORMAT`                  | `text`     |
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = get("DATABASE_URL").context("DATABASE_URL must be set")?;
        let defaults = AlertPolicy::default();

        let policy = AlertPolicy {
            dedup_window_minutes: parse_or(&get, "DEDUP_WINDOW_MINUTES", defaults.dedup_window_minutes)?,
            escalation_step_minutes: parse_or(
                &get,
                "ESCALATION_STEP_MINUTES",
                defaults.escalation_step_minutes,
            )?,
            max_escalation_level: parse_or(&get, "MAX_ESCALATION_LEVEL", defaults.max_escalation_level)?,
        };
        if policy.escalation_step_minutes <= 0 {
            bail!("ESCALATION_STEP_MINUTES must be positive");
        }
        if policy.dedup_window_minutes < 0 || policy.max_escalation_level < 0 {
            bail!("DEDUP_WINDOW_MINUTES and MAX_ESCALATION_LEVEL must not be negative");
        }

        Ok(Self {
            database_url,
            database_max_connections: parse_or(&get, "DATABASE_MAX_CONNECTIONS", 20)?,
            hub_intake_url: get("HUB_INTAKE_URL"),
            escalation_interval: interval_or(&get, "ESCALATION_INTERVAL_SECS", 60)?,
            inactivity_interval: interval_or(&get, "INACTIVITY_INTERVAL_SECS", 3600)?,
            baseline_interval: interval_or(&get, "BASELINE_INTERVAL_SECS", 86_400)?,
            daily_summary_interval: interval_or(&get, "DAILY_SUMMARY_INTERVAL_SECS", 86_400)?,
            policy,
            json_logs: get("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json")),
        })
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        None => Ok(default),
    }
}

fn interval_or(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default_secs: u64,
) -> anyhow::Result<Duration> {
    let secs: u64 = parse_or(get, key, default_secs)?;
    if secs == 0 {
        bail!("{key} must be at least 1 second");
    }
    Ok(Duration::from_secs(secs))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
