//! Validation of SOS alert requests
//!
//! Validation runs in a fixed order and stops at the first failure:
//! recipients present, measurements shape, user shape, then recipient
//! normalisation and address syntax. Nothing here has side effects, so a
//! rejected request never reaches the mail transport.

use crate::types::{value_to_text, AlertRequestBody, Measurements, SosAlert, UserInfo};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use thiserror::Error;

/// Validation errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required fields: emails")]
    MissingRecipients,

    #[error("Invalid measurements data format")]
    InvalidMeasurements,

    #[error("Invalid user data format")]
    InvalidUser,

    #[error("No valid recipient emails provided")]
    NoValidRecipients,

    #[error("Invalid email address(es): {}", .0.join(", "))]
    InvalidRecipients(Vec<String>),
}

/// Validation result type
pub type ValidationResult<T> = Result<T, ValidationError>;

fn email_regex() -> &'static Regex {
    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is a valid regex")
    })
}

/// Basic `local@domain.tld` syntax check
pub fn is_valid_email(email: &str) -> bool {
    email_regex().is_match(email)
}

/// Flatten the `emails` field into trimmed, non-empty addresses
///
/// A single string becomes a one-element list. Non-string entries are
/// dropped. Duplicates are kept.
pub fn normalize_recipients(emails: &Value) -> Vec<String> {
    let candidates: Vec<&Value> = match emails {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };

    candidates
        .into_iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|email| !email.is_empty())
        .map(String::from)
        .collect()
}

/// Whether a JSON value counts as "provided"
///
/// `null`, `false`, `0` and the empty string are treated as absent.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Free-text field as display text; falsy values count as absent
fn optional_text(value: Option<Value>) -> Option<String> {
    value
        .filter(is_truthy)
        .map(|value| value_to_text(&value))
}

impl AlertRequestBody {
    /// Validate the body and stamp it with the server-side `timestamp`
    pub fn into_alert(self, timestamp: DateTime<Utc>) -> ValidationResult<SosAlert> {
        let emails = match self.emails {
            Some(emails) if is_truthy(&emails) => emails,
            _ => return Err(ValidationError::MissingRecipients),
        };

        let measurements = match self.measurements {
            None | Some(Value::Null) => None,
            Some(Value::Object(object)) => Some(Measurements::from_object(&object)),
            Some(_) => return Err(ValidationError::InvalidMeasurements),
        };

        let user = match self.user {
            None | Some(Value::Null) => None,
            Some(Value::Object(object)) => Some(UserInfo::from_object(&object)),
            Some(_) => return Err(ValidationError::InvalidUser),
        };

        let recipients = normalize_recipients(&emails);
        if recipients.is_empty() {
            return Err(ValidationError::NoValidRecipients);
        }

        let invalid: Vec<String> = recipients
            .iter()
            .filter(|email| !is_valid_email(email))
            .cloned()
            .collect();
        if !invalid.is_empty() {
            return Err(ValidationError::InvalidRecipients(invalid));
        }

        Ok(SosAlert {
            recipients,
            zone: optional_text(self.zone),
            measurements,
            user,
            additional_notes: optional_text(self.additional_notes),
            timestamp,
        })
    }
}
