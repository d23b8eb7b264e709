//! Email delivery for scheduled weekly reports.
//!
//! Supports two providers:
//! - `console`: Logs emails to the structured log (development)
//! - `sendgrid`: Sends via the SendGrid API
//!
//! Delivery is strictly out-of-band: success or failure here never feeds
//! back into pipeline or cache state.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

use domain::models::Report;

use crate::config::EmailConfig;

/// Errors that can occur during email operations.
#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Email service not configured")]
    NotConfigured,

    #[error("Failed to send email: {0}")]
    SendFailed(String),

    #[error("Provider error: {0}")]
    ProviderError(String),
}

/// Email message to be sent.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    /// Recipient email address
    pub to: String,
    /// Email subject
    pub subject: String,
    /// Plain text body
    pub body_text: String,
    /// HTML body (optional)
    pub body_html: Option<String>,
}

/// Email service for sending report emails.
#[derive(Clone)]
pub struct EmailService {
    config: Arc<EmailConfig>,
}

impl EmailService {
    /// Creates a new EmailService with the given configuration.
    pub fn new(config: EmailConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Check if email service is enabled.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Send an email message.
    pub async fn send(&self, message: EmailMessage) -> Result<(), EmailError> {
        if !self.config.enabled {
            debug!(
                to = %message.to,
                subject = %message.subject,
                "Email service disabled, skipping send"
            );
            return Ok(());
        }

        match self.config.provider.as_str() {
            "console" => self.send_console(message).await,
            "sendgrid" => self.send_sendgrid(message).await,
            provider => {
                error!(provider = %provider, "Unknown email provider");
                Err(EmailError::NotConfigured)
            }
        }
    }

    /// Console provider - logs email to the structured log.
    async fn send_console(&self, message: EmailMessage) -> Result<(), EmailError> {
        info!(
            to = %message.to,
            subject = %message.subject,
            from = %self.config.sender_email,
            from_name = %self.config.sender_name,
            "Email (console provider)"
        );

        info!(
            body_text = %message.body_text,
            "Email body (plain text)"
        );

        if let Some(html) = &message.body_html {
            debug!(body_html_length = %html.len(), "Email body (HTML)");
        }

        Ok(())
    }

    /// SendGrid provider - sends via SendGrid API.
    async fn send_sendgrid(&self, message: EmailMessage) -> Result<(), EmailError> {
        if self.config.sendgrid_api_key.is_empty() {
            return Err(EmailError::NotConfigured);
        }

        let client = reqwest::Client::new();

        let mut body = serde_json::json!({
            "personalizations": [{
                "to": [{
                    "email": message.to
                }]
            }],
            "from": {
                "email": self.config.sender_email,
                "name": self.config.sender_name
            },
            "subject": message.subject,
            "content": [{
                "type": "text/plain",
                "value": message.body_text
            }]
        });

        if let Some(html) = &message.body_html {
            if let Some(content) = body["content"].as_array_mut() {
                content.push(serde_json::json!({
                    "type": "text/html",
                    "value": html
                }));
            }
        }

        let response = client
            .post("https://api.sendgrid.com/v3/mail/send")
            .header(
                "Authorization",
                format!("Bearer {}", self.config.sendgrid_api_key),
            )
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| EmailError::SendFailed(format!("SendGrid request failed: {}", e)))?;

        if response.status().is_success() {
            info!(
                to = %message.to,
                subject = %message.subject,
                "Email sent via SendGrid"
            );
            Ok(())
        } else {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            error!(
                status = %status,
                error = %error_body,
                "SendGrid API error"
            );
            Err(EmailError::ProviderError(format!(
                "SendGrid returned {}: {}",
                status, error_body
            )))
        }
    }
}

/// Delivery collaborator handed fully-built weekly reports.
#[async_trait]
pub trait ReportDelivery: Send + Sync {
    async fn deliver(
        &self,
        report: &Report,
        recipient: &str,
        org_name: &str,
    ) -> Result<(), EmailError>;
}

/// Delivers weekly reports as email.
pub struct EmailDelivery {
    service: EmailService,
}

impl EmailDelivery {
    pub fn new(service: EmailService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl ReportDelivery for EmailDelivery {
    async fn deliver(
        &self,
        report: &Report,
        recipient: &str,
        org_name: &str,
    ) -> Result<(), EmailError> {
        let period = &report.period_analyzed;
        let subject = format!(
            "Weekly productivity report - {} ({} to {})",
            org_name, period.start_date, period.end_date
        );
        let body_text = render_weekly_body(report, org_name);

        self.service
            .send(EmailMessage {
                to: recipient.to_string(),
                subject,
                body_text,
                body_html: None,
            })
            .await
    }
}

/// Renders the plain-text body of a weekly report email: one line of
/// headline numbers per user, then each user's overall summary.
fn render_weekly_body(report: &Report, org_name: &str) -> String {
    let period = &report.period_analyzed;
    let mut body = format!(
        "Weekly productivity report for {}\nPeriod: {} to {}\n",
        org_name, period.start_date, period.end_date
    );

    for org in &report.organizations {
        for user in &org.users {
            let overall = &user.overall_report;
            body.push_str(&format!(
                "\n{}: {:.1}h active, {:.1}h AFK, {} discrepancies ({} critical)\n",
                user.user_name,
                overall.total_active_hours,
                overall.total_afk_hours,
                overall.total_discrepancies,
                overall.critical_discrepancies,
            ));
            if !overall.summary.is_empty() {
                body.push_str(&format!("  {}\n", overall.summary));
            }
        }
    }

    body
}
