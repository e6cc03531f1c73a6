//! SMS and voice call-outs through an HTTP gateway.
//!
//! [`GatewayDelivery`] POSTs a JSON request to the configured SMS or voice
//! endpoint. Transient failures are retried with exponential backoff
//! (1 s, 2 s) before the attempt is reported as failed.

use std::time::Duration;

use serde::Serialize;

use crate::delivery::Delivery;

/// Retry delays in seconds.
const RETRY_DELAYS_SECS: [u64; 2] = [1, 2];

/// HTTP request timeout for a single gateway call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("Gateway request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The gateway answered with a non-2xx status code.
    #[error("Gateway returned HTTP {0}")]
    HttpStatus(u16),
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayKind {
    Sms,
    Voice,
}

#[derive(Debug, Clone, Default)]
pub struct GatewayConfig {
    pub sms_url: Option<String>,
    pub voice_url: Option<String>,
    pub api_key: Option<String>,
}

impl GatewayConfig {
    /// Load gateway endpoints from the environment.
    ///
    /// | Variable            | Required | Default |
    /// |---------------------|----------|---------|
    /// | `SMS_GATEWAY_URL`   | no       | -       |
    /// | `VOICE_GATEWAY_URL` | no       | -       |
    /// | `GATEWAY_API_KEY`   | no       | -       |
    ///
    /// A channel whose URL is unset stays disabled.
    pub fn from_env() -> Self {
        let non_empty = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        Self {
            sms_url: non_empty("SMS_GATEWAY_URL"),
            voice_url: non_empty("VOICE_GATEWAY_URL"),
            api_key: non_empty("GATEWAY_API_KEY"),
        }
    }
}

// ---------------------------------------------------------------------------
// Request body
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct GatewayRequest<'a> {
    kind: GatewayKind,
    to: &'a str,
    message: String,
    alert_id: i64,
    severity: &'static str,
}

/// Text read out or sent for an alert.
pub fn alert_text(kind: GatewayKind, delivery: &Delivery<'_>) -> String {
    let alert = delivery.alert;
    match kind {
        GatewayKind::Sms => match alert.message.as_deref() {
            Some(message) => format!("SafeHome Alert: {} - {}", alert.title, message),
            None => format!("SafeHome Alert: {}", alert.title),
        },
        GatewayKind::Voice => format!(
            "This is SafeHome with an urgent alert for {}. {}. Please check on them now.",
            delivery.resident_label(),
            alert.title
        ),
    }
}

// ---------------------------------------------------------------------------
// GatewayDelivery
// ---------------------------------------------------------------------------

pub struct GatewayDelivery {
    client: reqwest::Client,
    kind: GatewayKind,
    url: String,
    api_key: Option<String>,
}

impl GatewayDelivery {
    pub fn new(
        kind: GatewayKind,
        url: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            kind,
            url: url.into(),
            api_key,
        })
    }

    /// Build the SMS sender, if an SMS endpoint is configured.
    pub fn sms(config: &GatewayConfig) -> Result<Option<Self>, GatewayError> {
        config
            .sms_url
            .as_deref()
            .map(|url| Self::new(GatewayKind::Sms, url, config.api_key.clone()))
            .transpose()
    }

    /// Build the voice sender, if a voice endpoint is configured.
    pub fn voice(config: &GatewayConfig) -> Result<Option<Self>, GatewayError> {
        config
            .voice_url
            .as_deref()
            .map(|url| Self::new(GatewayKind::Voice, url, config.api_key.clone()))
            .transpose()
    }

    pub fn kind(&self) -> GatewayKind {
        self.kind
    }

    /// Send the alert to `to`, retrying transient failures.
    pub async fn deliver(&self, to: &str, delivery: &Delivery<'_>) -> Result<(), GatewayError> {
        let body = GatewayRequest {
            kind: self.kind,
            to,
            message: alert_text(self.kind, delivery),
            alert_id: delivery.alert.id,
            severity: delivery.alert.severity.as_str(),
        };

        let mut last_err: Option<GatewayError> = None;

        for (attempt, delay_secs) in RETRY_DELAYS_SECS.iter().enumerate() {
            match self.try_send(&body).await {
                Ok(()) => return self.sent(delivery),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        kind = ?self.kind,
                        alert_id = delivery.alert.id,
                        error = %e,
                        "Gateway call failed, retrying"
                    );
                    last_err = Some(e);
                    tokio::time::sleep(Duration::from_secs(*delay_secs)).await;
                }
            }
        }

        match self.try_send(&body).await {
            Ok(()) => self.sent(delivery),
            Err(e) => {
                tracing::error!(
                    kind = ?self.kind,
                    alert_id = delivery.alert.id,
                    error = %e,
                    "Gateway call failed after all retries"
                );
                Err(last_err.unwrap_or(e))
            }
        }
    }

    fn sent(&self, delivery: &Delivery<'_>) -> Result<(), GatewayError> {
        tracing::info!(
            kind = ?self.kind,
            alert_id = delivery.alert.id,
            member_id = delivery.member.id,
            "Gateway call accepted"
        );
        Ok(())
    }

    async fn try_send(&self, body: &GatewayRequest<'_>) -> Result<(), GatewayError> {
        let mut request = self.client.post(&self.url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(GatewayError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
