//! Client side of the SOS button
//!
//! An [`AlertTrigger`] posts one prepared alert to the relay per activation.
//! While a request is in flight further activations are refused, and every
//! failure collapses into the same retry prompt for the operator.

use crate::config::TriggerConfig;
use reqwest::Client;
use sos_alert_common::{AlertRequestBody, AlertResponse, Measurements, UserInfo};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

pub const SUCCESS_ACKNOWLEDGMENT: &str =
    "Emergency alert sent successfully! Authorities have been notified.";
pub const FAILURE_ACKNOWLEDGMENT: &str =
    "Failed to send emergency alert. Please try again or use alternative emergency contacts.";

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("An SOS alert is already being sent")]
    Busy,

    #[error("Failed to create HTTP client: {0}")]
    Client(String),

    #[error("Invalid trigger configuration: {0}")]
    Configuration(String),
}

/// What the operator is shown after an activation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerFeedback {
    Success {
        acknowledgment: String,
        /// Relay confirmation, including the message id
        tracking: String,
    },
    Failure {
        acknowledgment: String,
        /// Underlying cause, for logs only
        reason: String,
    },
}

impl TriggerFeedback {
    pub fn is_success(&self) -> bool {
        matches!(self, TriggerFeedback::Success { .. })
    }

    pub fn acknowledgment(&self) -> &str {
        match self {
            TriggerFeedback::Success { acknowledgment, .. }
            | TriggerFeedback::Failure { acknowledgment, .. } => acknowledgment,
        }
    }
}

pub struct AlertTrigger {
    client: Client,
    endpoint: String,
    payload: AlertRequestBody,
    busy: AtomicBool,
}

/// Clears the busy flag when the activation ends, whatever the outcome
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl AlertTrigger {
    pub fn new(
        endpoint: impl Into<String>,
        payload: AlertRequestBody,
        timeout: Duration,
    ) -> Result<Self, TriggerError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TriggerError::Client(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            payload,
            busy: AtomicBool::new(false),
        })
    }

    pub fn from_config(config: &TriggerConfig) -> Result<Self, TriggerError> {
        config.validate().map_err(TriggerError::Configuration)?;

        Self::new(
            config.endpoint.clone(),
            Self::payload_from_config(config),
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Request body built from the configured recipients, zone, operator
    /// and notes, with the default measurement snapshot
    pub fn payload_from_config(config: &TriggerConfig) -> AlertRequestBody {
        let non_empty = |value: &str| (!value.is_empty()).then(|| value.to_string());
        let user = UserInfo {
            id: non_empty(&config.user_id),
            name: non_empty(&config.user_name),
            email: non_empty(&config.user_email),
            role: non_empty(&config.user_role),
        };

        let mut payload = AlertRequestBody::new(config.recipient_list())
            .with_measurements(&Self::default_measurements())
            .with_user(&user);
        if !config.zone.is_empty() {
            payload = payload.with_zone(config.zone.clone());
        }
        if !config.notes.is_empty() {
            payload = payload.with_notes(config.notes.clone());
        }
        payload
    }

    pub fn default_measurements() -> Measurements {
        [
            ("temperature", "36°C"),
            ("slopeAngle", "34°"),
            ("vibration", "5.2 Hz"),
        ]
        .into_iter()
        .collect()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn payload(&self) -> &AlertRequestBody {
        &self.payload
    }

    /// Send the alert once; refused with [`TriggerError::Busy`] while a
    /// previous activation is still in flight
    pub async fn activate(&self) -> Result<TriggerFeedback, TriggerError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("SOS trigger activated while a request is in flight");
            return Err(TriggerError::Busy);
        }
        let _guard = BusyGuard(&self.busy);

        info!("🚨 Sending emergency alert to {}", self.endpoint);

        let feedback = match self.post_alert().await {
            Ok(response) => {
                info!("✅ {}", response.message);
                TriggerFeedback::Success {
                    acknowledgment: SUCCESS_ACKNOWLEDGMENT.to_string(),
                    tracking: response.message,
                }
            }
            Err(reason) => {
                error!("Error sending SOS alert: {}", reason);
                TriggerFeedback::Failure {
                    acknowledgment: FAILURE_ACKNOWLEDGMENT.to_string(),
                    reason,
                }
            }
        };

        Ok(feedback)
    }

    async fn post_alert(&self) -> Result<AlertResponse, String> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&self.payload)
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;

        let status = response.status();
        let body: AlertResponse = response
            .json()
            .await
            .map_err(|e| format!("Invalid response from relay ({}): {}", status, e))?;

        if !status.is_success() || !body.success {
            let reason = match body.details {
                Some(details) => format!("{} ({}): {}", body.message, status, details),
                None => format!("{} ({})", body.message, status),
            };
            return Err(reason);
        }

        Ok(body)
    }
}
