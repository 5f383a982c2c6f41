//! Core types for SOS alerts
//!
//! `AlertRequestBody` is the loosely typed JSON body accepted by the relay
//! route. `SosAlert` is what remains after validation and is the only shape
//! the formatter and the mail transport ever see.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Raw SOS request body as posted by a trigger
///
/// Every field is optional and kept as raw JSON, so a body of any shape
/// deserializes and shape errors surface as validation errors instead of
/// opaque deserialization failures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRequestBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emails: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measurements: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_notes: Option<Value>,
}

impl AlertRequestBody {
    /// Build a request addressed to the given recipients
    pub fn new(recipients: Vec<String>) -> Self {
        Self {
            emails: Some(Value::from(recipients)),
            ..Self::default()
        }
    }

    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = Some(Value::String(zone.into()));
        self
    }

    pub fn with_measurements(mut self, measurements: &Measurements) -> Self {
        self.measurements = Some(measurements.to_value());
        self
    }

    pub fn with_user(mut self, user: &UserInfo) -> Self {
        self.user = serde_json::to_value(user).ok();
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.additional_notes = Some(Value::String(notes.into()));
        self
    }
}

/// Sensor readings keyed by sensor name, in the order they were supplied
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Measurements {
    readings: Vec<(String, String)>,
}

impl Measurements {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a reading, replacing an earlier reading for the same sensor
    pub fn insert(&mut self, sensor: impl Into<String>, reading: impl Into<String>) {
        let sensor = sensor.into();
        let reading = reading.into();
        match self.readings.iter_mut().find(|(name, _)| *name == sensor) {
            Some(existing) => existing.1 = reading,
            None => self.readings.push((sensor, reading)),
        }
    }

    pub fn get(&self, sensor: &str) -> Option<&str> {
        self.readings
            .iter()
            .find(|(name, _)| name == sensor)
            .map(|(_, reading)| reading.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.readings
            .iter()
            .map(|(name, reading)| (name.as_str(), reading.as_str()))
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Readings from a JSON object; non-string values keep their JSON text
    pub fn from_object(object: &Map<String, Value>) -> Self {
        let readings = object
            .iter()
            .map(|(name, value)| (name.clone(), value_to_text(value)))
            .collect();
        Self { readings }
    }

    pub fn to_value(&self) -> Value {
        let object: Map<String, Value> = self
            .readings
            .iter()
            .map(|(name, reading)| (name.clone(), Value::String(reading.clone())))
            .collect();
        Value::Object(object)
    }
}

impl<K, V> FromIterator<(K, V)> for Measurements
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut measurements = Measurements::new();
        for (sensor, reading) in iter {
            measurements.insert(sensor, reading);
        }
        measurements
    }
}

/// Identity of the operator who raised the alert
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl UserInfo {
    /// Pick the identity fields out of a JSON object
    ///
    /// Strings, numbers and booleans are accepted as text. Anything else, and
    /// unknown keys, are ignored.
    pub fn from_object(object: &Map<String, Value>) -> Self {
        let field = |key: &str| match object.get(key) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(v @ (Value::Number(_) | Value::Bool(_))) => Some(v.to_string()),
            _ => None,
        };

        Self {
            id: field("id"),
            name: field("name"),
            email: field("email"),
            role: field("role"),
        }
    }
}

/// A validated SOS alert, ready to be formatted and dispatched
#[derive(Debug, Clone, PartialEq)]
pub struct SosAlert {
    pub recipients: Vec<String>,
    pub zone: Option<String>,
    pub measurements: Option<Measurements>,
    pub user: Option<UserInfo>,
    pub additional_notes: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl SosAlert {
    /// ISO-8601 timestamp with millisecond precision, e.g. `2026-10-17T08:15:30.123Z`
    pub fn iso_timestamp(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Human-readable timestamp, e.g. `10/17/2026, 8:15:30 AM UTC`
    pub fn display_timestamp(&self) -> String {
        format!("{} UTC", self.timestamp.format("%-m/%-d/%Y, %-I:%M:%S %p"))
    }
}

pub(crate) fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
