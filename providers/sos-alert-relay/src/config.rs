use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;

pub const DEFAULT_SMTP_PORT: u16 = 587;
pub const DEFAULT_FROM_NAME: &str = "AEGIS Emergency Alert System";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_TRIGGER_ENDPOINT: &str = "http://localhost:3000/api/sos-alert";

/// SMTP connection settings, read once at startup
#[derive(Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    /// Also the sender address of every alert
    #[serde(rename = "user", default)]
    pub username: String,
    #[serde(rename = "pass", default)]
    pub password: String,
    pub from_name: String,
    pub timeout_secs: u64,
    pub accept_invalid_certs: bool,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_SMTP_PORT,
            username: String::new(),
            password: String::new(),
            from_name: DEFAULT_FROM_NAME.to_string(),
            timeout_secs: 30,
            accept_invalid_certs: true,
        }
    }
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &if self.password.is_empty() { "" } else { "***" })
            .field("from_name", &self.from_name)
            .field("timeout_secs", &self.timeout_secs)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .finish()
    }
}

impl SmtpConfig {
    /// Load from `SMTP_*` environment variables (and `.env` when present)
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = Config::builder()
            .set_default("host", "localhost")?
            .set_default("port", DEFAULT_SMTP_PORT as i64)?
            .set_default("user", "")?
            .set_default("pass", "")?
            .set_default("from_name", DEFAULT_FROM_NAME)?
            .set_default("timeout_secs", 30)?
            .set_default("accept_invalid_certs", true)?
            .add_source(Environment::with_prefix("SMTP"))
            .build()?;

        config.try_deserialize()
    }

    /// Checks that the transport can be built at all
    ///
    /// A missing or malformed sender is not a startup error; the relay
    /// reports it per request as a configuration failure.
    pub fn validate(&self) -> Result<(), String> {
        if self.host.trim().is_empty() {
            return Err("SMTP host is required".to_string());
        }

        if self.port == 0 {
            return Err("SMTP port must be greater than 0".to_string());
        }

        if self.timeout_secs == 0 {
            return Err("SMTP timeout must be greater than 0".to_string());
        }

        if self.from_name.trim().is_empty() {
            return Err("Sender display name is required".to_string());
        }

        Ok(())
    }

    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            max_body_bytes: 64 * 1024,
        }
    }
}

impl ServerConfig {
    /// Load from `RELAY_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = Config::builder()
            .set_default("bind_addr", DEFAULT_BIND_ADDR)?
            .set_default("max_body_bytes", 64 * 1024)?
            .add_source(Environment::with_prefix("RELAY"))
            .build()?;

        config.try_deserialize()
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, String> {
        self.bind_addr
            .parse()
            .map_err(|e| format!("Invalid bind address {}: {}", self.bind_addr, e))
    }
}

/// Defaults used by the trigger client when building an alert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    pub endpoint: String,
    /// Comma-separated recipient list
    pub recipients: String,
    pub zone: String,
    pub notes: String,
    pub user_id: String,
    pub user_name: String,
    pub user_email: String,
    pub user_role: String,
    pub timeout_secs: u64,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_TRIGGER_ENDPOINT.to_string(),
            recipients: String::new(),
            zone: "Main Control Room".to_string(),
            notes: "Detected abnormal slope instability".to_string(),
            user_id: String::new(),
            user_name: String::new(),
            user_email: String::new(),
            user_role: "Site Engineer".to_string(),
            timeout_secs: 30,
        }
    }
}

impl TriggerConfig {
    /// Load from `SOS_TRIGGER_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let config = Config::builder()
            .set_default("endpoint", defaults.endpoint)?
            .set_default("recipients", defaults.recipients)?
            .set_default("zone", defaults.zone)?
            .set_default("notes", defaults.notes)?
            .set_default("user_id", defaults.user_id)?
            .set_default("user_name", defaults.user_name)?
            .set_default("user_email", defaults.user_email)?
            .set_default("user_role", defaults.user_role)?
            .set_default("timeout_secs", defaults.timeout_secs)?
            .add_source(Environment::with_prefix("SOS_TRIGGER"))
            .build()?;

        config.try_deserialize()
    }

    pub fn recipient_list(&self) -> Vec<String> {
        self.recipients
            .split(',')
            .map(str::trim)
            .filter(|email| !email.is_empty())
            .map(String::from)
            .collect()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.endpoint.is_empty() {
            return Err("Trigger endpoint is required".to_string());
        }

        if self.recipient_list().is_empty() {
            return Err("At least one recipient is required (SOS_TRIGGER_RECIPIENTS)".to_string());
        }

        if self.timeout_secs == 0 {
            return Err("Trigger timeout must be greater than 0".to_string());
        }

        Ok(())
    }
}
