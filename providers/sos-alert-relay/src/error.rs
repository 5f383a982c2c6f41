//! Error types for the SOS alert relay

use hyper::StatusCode;
use sos_alert_common::{AlertResponse, ValidationError};
use thiserror::Error;

/// What the mail transport reported, as far as it can be told structurally
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Connection,
    Authentication,
    RecipientRejected,
    Unknown,
}

/// Failure raised by a [`crate::client::MailTransport`]
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{detail}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub detail: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn unknown(detail: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Unknown, detail)
    }

    /// Structured kind first, error text second
    pub fn category(&self) -> FailureCategory {
        match self.kind {
            TransportErrorKind::Connection => FailureCategory::ConnectionFailed,
            TransportErrorKind::Authentication => FailureCategory::AuthenticationFailed,
            TransportErrorKind::RecipientRejected => FailureCategory::InvalidAddress,
            TransportErrorKind::Unknown => FailureCategory::from_error_text(&self.detail),
        }
    }
}

/// Display category for a failed dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    ConnectionFailed,
    AuthenticationFailed,
    InvalidAddress,
    Misconfigured,
    Unclassified,
}

impl FailureCategory {
    pub fn from_error_text(text: &str) -> Self {
        if text.contains("SMTP") {
            FailureCategory::ConnectionFailed
        } else if text.contains("EENVELOPE") {
            FailureCategory::InvalidAddress
        } else {
            FailureCategory::Unclassified
        }
    }

    pub fn friendly_message(&self) -> &'static str {
        match self {
            FailureCategory::ConnectionFailed => "Email server connection failed",
            FailureCategory::AuthenticationFailed => "Email server authentication failed",
            FailureCategory::InvalidAddress => "Invalid email address format",
            FailureCategory::Misconfigured => "Email service is not configured correctly",
            FailureCategory::Unclassified => "Failed to process SOS alert",
        }
    }
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Configuration(String),

    #[error("Email send failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Failed to send email - no message ID received")]
    MissingMessageId,
}

impl RelayError {
    /// 400 for rejected input, 500 for everything after validation
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn category(&self) -> Option<FailureCategory> {
        match self {
            RelayError::Validation(_) => None,
            RelayError::Configuration(_) => Some(FailureCategory::Misconfigured),
            RelayError::Transport(e) => Some(e.category()),
            RelayError::MissingMessageId => Some(FailureCategory::Unclassified),
        }
    }

    pub fn to_response(&self) -> AlertResponse {
        match self.category() {
            None => AlertResponse::failure(self.to_string()),
            Some(category) => {
                AlertResponse::failure_with_details(category.friendly_message(), self.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("SMTP connection refused", FailureCategory::ConnectionFailed)]
    #[case("Can't send mail - all recipients were rejected: EENVELOPE", FailureCategory::InvalidAddress)]
    #[case("SMTP EENVELOPE", FailureCategory::ConnectionFailed)]
    #[case("socket hang up", FailureCategory::Unclassified)]
    fn test_text_classification(#[case] text: &str, #[case] expected: FailureCategory) {
        assert_eq!(FailureCategory::from_error_text(text), expected);
    }

    #[test]
    fn test_structured_kind_wins_over_text() {
        let err = TransportError::new(TransportErrorKind::RecipientRejected, "SMTP 550 no such user");
        assert_eq!(err.category(), FailureCategory::InvalidAddress);

        let err = TransportError::unknown("SMTP greeting never arrived");
        assert_eq!(err.category(), FailureCategory::ConnectionFailed);
    }

    #[test]
    fn test_validation_error_maps_to_bad_request() {
        let err = RelayError::from(ValidationError::MissingRecipients);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.to_response(),
            AlertResponse::failure("Missing required fields: emails")
        );
    }

    #[test]
    fn test_transport_error_keeps_raw_detail() {
        let err = RelayError::from(TransportError::unknown("SMTP server closed the connection"));
        let response = err.to_response();

        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!response.success);
        assert_eq!(response.message, "Email server connection failed");
        assert_eq!(
            response.details.as_deref(),
            Some("Email send failed: SMTP server closed the connection")
        );
    }

    #[test]
    fn test_missing_message_id_is_server_error() {
        let err = RelayError::MissingMessageId;
        let response = err.to_response();

        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.message, "Failed to process SOS alert");
        assert_eq!(
            response.details.as_deref(),
            Some("Failed to send email - no message ID received")
        );
    }

    #[test]
    fn test_configuration_error_response() {
        let err = RelayError::Configuration("SMTP_USER not configured".to_string());
        let response = err.to_response();

        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.message, "Email service is not configured correctly");
        assert_eq!(response.details.as_deref(), Some("SMTP_USER not configured"));
    }
}
