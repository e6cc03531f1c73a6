//! Alert email delivery via SMTP.
//!
//! [`EmailDelivery`] wraps the `lettre` async SMTP transport to send an HTML
//! alert email to a family member. Configuration is loaded from environment
//! variables; if `SMTP_HOST` is not set, [`EmailConfig::from_env`] returns
//! `None` and the email channel stays disabled.

use chrono::{Datelike, Utc};

use crate::delivery::Delivery;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for email delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    /// SMTP transport-level failure (authentication, connection, etc.).
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    /// The recipient or sender address could not be parsed.
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled.
    #[error("Email build error: {0}")]
    Build(String),
}

// ---------------------------------------------------------------------------
// EmailConfig
// ---------------------------------------------------------------------------

/// Default SMTP port (STARTTLS).
const DEFAULT_SMTP_PORT: u16 = 587;

/// Default sender address when `SMTP_FROM` is not set.
const DEFAULT_FROM_ADDRESS: &str = "alerts@safehome.local";

/// Default dashboard base URL when `FRONTEND_URL` is not set.
const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";

/// Configuration for the SMTP email delivery service.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// SMTP server hostname.
    pub smtp_host: String,
    /// SMTP server port (defaults to 587).
    pub smtp_port: u16,
    /// RFC 5322 "From" address.
    pub from_address: String,
    /// Optional SMTP username.
    pub smtp_user: Option<String>,
    /// Optional SMTP password.
    pub smtp_password: Option<String>,
    /// Base URL of the family dashboard linked from the email.
    pub frontend_url: String,
}

impl EmailConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `None` if `SMTP_HOST` is not set, signalling that email
    /// delivery is not configured and should be skipped.
    ///
    /// | Variable        | Required | Default                 |
    /// |-----------------|----------|-------------------------|
    /// | `SMTP_HOST`     | yes      | -                       |
    /// | `SMTP_PORT`     | no       | `587`                   |
    /// | `SMTP_FROM`     | no       | `alerts@safehome.local` |
    /// | `SMTP_USER`     | no       | -                       |
    /// | `SMTP_PASSWORD` | no       | -                       |
    /// | `FRONTEND_URL`  | no       | `http://localhost:3000` |
    pub fn from_env() -> Option<Self> {
        let smtp_host = std::env::var("SMTP_HOST").ok()?;
        Some(Self {
            smtp_host,
            smtp_port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            from_address: std::env::var("SMTP_FROM")
                .unwrap_or_else(|_| DEFAULT_FROM_ADDRESS.to_string()),
            smtp_user: std::env::var("SMTP_USER").ok(),
            smtp_password: std::env::var("SMTP_PASSWORD").ok(),
            frontend_url: std::env::var("FRONTEND_URL")
                .unwrap_or_else(|_| DEFAULT_FRONTEND_URL.to_string()),
        })
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Subject line for an alert email.
pub fn alert_subject(delivery: &Delivery<'_>) -> String {
    format!("SafeHome Alert: {}", delivery.alert.title)
}

/// HTML body for an alert email.
pub fn render_alert_email(delivery: &Delivery<'_>, frontend_url: &str) -> String {
    let alert = delivery.alert;
    let color = alert.severity.color();
    let dashboard = format!(
        "{}/family/{}",
        frontend_url.trim_end_matches('/'),
        alert.user_id
    );

    format!(
        r#"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; margin: 0; padding: 0;">
  <div style="max-width: 600px; margin: 0 auto;">
    <div style="background: {color}; color: white; padding: 20px; text-align: center;">
      <h1 style="margin: 0;">SafeHome Alert</h1>
    </div>
    <div style="padding: 20px;">
      <p>Hello {member},</p>
      <p>An alert has been triggered for <strong>{resident}</strong>:</p>
      <div style="border-left: 4px solid {color}; background: #f9fafb; padding: 15px; margin: 20px 0;">
        <h2 style="margin: 0 0 10px 0;">{title}</h2>
        <p style="margin: 0 0 10px 0;">{message}</p>
        <p style="margin: 0; color: #6b7280; font-size: 14px;">Severity: {severity} | Time: {time}</p>
      </div>
      <p style="text-align: center;">
        <a href="{dashboard}" style="background: #2563eb; color: white; padding: 12px 24px; text-decoration: none; border-radius: 6px;">View Dashboard</a>
      </p>
    </div>
    <div style="text-align: center; color: #9ca3af; font-size: 12px; padding: 20px;">
      &copy; {year} SafeHome. All rights reserved.
    </div>
  </div>
</body>
</html>"#,
        color = color,
        member = escape_html(&delivery.member.name),
        resident = escape_html(delivery.resident_label()),
        title = escape_html(&alert.title),
        message = escape_html(alert.message.as_deref().unwrap_or_default()),
        severity = alert.severity.as_str().to_uppercase(),
        time = alert.created_at.format("%Y-%m-%d %H:%M UTC"),
        dashboard = escape_html(&dashboard),
        year = Utc::now().year(),
    )
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// EmailDelivery
// ---------------------------------------------------------------------------

/// Sends alert emails via SMTP.
pub struct EmailDelivery {
    config: EmailConfig,
}

impl EmailDelivery {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    /// Send the alert email for `delivery` to `to_email`.
    pub async fn deliver_alert(
        &self,
        to_email: &str,
        delivery: &Delivery<'_>,
    ) -> Result<(), EmailError> {
        use lettre::{
            message::header::ContentType, transport::smtp::authentication::Credentials,
            AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
        };

        let email = Message::builder()
            .from(self.config.from_address.parse()?)
            .to(to_email.parse()?)
            .subject(alert_subject(delivery))
            .header(ContentType::TEXT_HTML)
            .body(render_alert_email(delivery, &self.config.frontend_url))
            .map_err(|e| EmailError::Build(e.to_string()))?;

        let mut transport_builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)?
                .port(self.config.smtp_port);

        if let (Some(user), Some(pass)) = (&self.config.smtp_user, &self.config.smtp_password) {
            transport_builder =
                transport_builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        let mailer = transport_builder.build();
        mailer.send(email).await?;

        tracing::info!(
            to = to_email,
            alert_id = delivery.alert.id,
            member_id = delivery.member.id,
            "Alert email sent"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
