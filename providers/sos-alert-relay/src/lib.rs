pub mod client;
pub mod config;
pub mod error;
pub mod formatter;
pub mod metrics;
pub mod provider;
pub mod server;
pub mod trigger;

pub use client::{DeliveryReceipt, MailTransport, SmtpClient};
pub use config::{ServerConfig, SmtpConfig, TriggerConfig};
pub use error::{FailureCategory, RelayError, TransportError, TransportErrorKind};
pub use formatter::{SosEmail, SosEmailFormatter};
pub use metrics::RelayMetrics;
pub use provider::SosAlertRelay;
pub use trigger::{AlertTrigger, TriggerError, TriggerFeedback};
