use crate::{
    client::{MailTransport, SmtpClient},
    config::SmtpConfig,
    error::RelayError,
    formatter::SosEmailFormatter,
    metrics::{MetricsRecorder, RelayMetrics},
};
use chrono::Utc;
use hyper::StatusCode;
use sos_alert_common::{is_valid_email, AlertRequestBody, AlertResponse};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Validates SOS requests and forwards them to the mail transport
///
/// One instance is built at startup and shared by every request. Each call
/// is independent: no retries, no deduplication, no state between requests
/// other than the counters.
pub struct SosAlertRelay {
    transport: Arc<dyn MailTransport>,
    formatter: SosEmailFormatter,
    config: SmtpConfig,
    metrics: MetricsRecorder,
}

impl SosAlertRelay {
    pub fn new(config: SmtpConfig, transport: Arc<dyn MailTransport>) -> Result<Self, RelayError> {
        config.validate().map_err(|e| {
            RelayError::Configuration(format!("Config validation failed: {}", e))
        })?;

        let formatter = SosEmailFormatter::new(config.from_name.clone());

        Ok(Self {
            transport,
            formatter,
            config,
            metrics: MetricsRecorder::new(),
        })
    }

    /// Build the relay with a real SMTP client from `config`
    pub fn with_smtp(config: SmtpConfig) -> Result<Self, RelayError> {
        let client = Arc::new(SmtpClient::new(&config)?);
        Self::new(config, client)
    }

    /// Run one request through validation and dispatch, mapping the outcome
    /// onto an HTTP status and response envelope
    pub async fn handle(&self, body: AlertRequestBody) -> (StatusCode, AlertResponse) {
        self.metrics.record_request();

        match self.dispatch(body).await {
            Ok(message_id) => {
                self.metrics.record_delivered();
                (
                    StatusCode::OK,
                    AlertResponse::success(format!(
                        "Alert sent successfully. Message ID: {}",
                        message_id
                    )),
                )
            }
            Err(e @ RelayError::Validation(_)) => {
                warn!("Rejected SOS alert request: {}", e);
                self.metrics.record_rejected();
                (e.status_code(), e.to_response())
            }
            Err(e) => {
                error!("SOS alert dispatch failed: {}", e);
                self.metrics.record_failure(&e.to_string());
                (e.status_code(), e.to_response())
            }
        }
    }

    /// Validate, render and send; returns the transport's message id
    pub async fn dispatch(&self, body: AlertRequestBody) -> Result<String, RelayError> {
        let alert = body.into_alert(Utc::now())?;
        let sender = self.sender()?;

        let email = self.formatter.format_alert(&alert, sender);
        info!(
            recipients = alert.recipients.len(),
            zone = alert.zone.as_deref().unwrap_or("Unknown"),
            has_user = alert.user.is_some(),
            has_measurements = alert.measurements.is_some(),
            "📧 Sending SOS alert"
        );

        let receipt = self.transport.send(&email).await?;

        match receipt.message_id.filter(|id| !id.is_empty()) {
            Some(message_id) => {
                info!("✅ SOS alert sent with message ID {}", message_id);
                Ok(message_id)
            }
            None => {
                error!("No message ID received from SMTP server: {}", receipt.response);
                Err(RelayError::MissingMessageId)
            }
        }
    }

    pub async fn health_check(&self) -> bool {
        match self.transport.health_check().await {
            Ok(healthy) => healthy,
            Err(e) => {
                warn!("Mail transport health check failed: {}", e);
                false
            }
        }
    }

    pub fn metrics(&self) -> RelayMetrics {
        self.metrics.snapshot()
    }

    fn sender(&self) -> Result<&str, RelayError> {
        let sender = self.config.username.as_str();

        if sender.is_empty() {
            return Err(RelayError::Configuration(
                "SMTP_USER not configured".to_string(),
            ));
        }

        if !is_valid_email(sender) {
            return Err(RelayError::Configuration(
                "Invalid sender email configuration".to_string(),
            ));
        }

        Ok(sender)
    }
}
