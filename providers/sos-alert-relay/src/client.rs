use crate::config::SmtpConfig;
use crate::error::{RelayError, TransportError, TransportErrorKind};
use crate::formatter::SosEmail;
use async_trait::async_trait;
use lettre::message::header::{ContentType, Header, HeaderName, HeaderValue};
use lettre::message::{Mailbox, Message};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use std::time::Duration;
use tracing::{debug, error, warn};

/// What the mail server acknowledged for one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    /// `None` when the server did not accept the message
    pub message_id: Option<String>,
    pub response: String,
}

/// Outbound mail seam, so the relay can be exercised without a mail server
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, email: &SosEmail) -> Result<DeliveryReceipt, TransportError>;

    async fn health_check(&self) -> Result<bool, TransportError>;
}

macro_rules! priority_header {
    ($name:ident, $header:literal, $value:literal) => {
        #[derive(Debug, Clone, Copy)]
        struct $name;

        impl Header for $name {
            fn name() -> HeaderName {
                HeaderName::new_from_ascii_str($header)
            }

            fn parse(_s: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
                Ok(Self)
            }

            fn display(&self) -> HeaderValue {
                HeaderValue::new(Self::name(), $value.to_string())
            }
        }
    };
}

priority_header!(XPriority, "X-Priority", "1 (Highest)");
priority_header!(XMsMailPriority, "X-MSMail-Priority", "High");
priority_header!(Importance, "Importance", "High");

/// SMTP submission client shared by every request
pub struct SmtpClient {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpClient {
    /// Opportunistic STARTTLS on the configured port, never implicit TLS
    pub fn new(config: &SmtpConfig) -> Result<Self, RelayError> {
        let tls = TlsParameters::builder(config.host.clone())
            .dangerous_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| RelayError::Configuration(format!("TLS configuration error: {}", e)))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
            .port(config.port)
            .tls(Tls::Opportunistic(tls))
            .timeout(Some(Duration::from_secs(config.timeout_secs)));

        if config.has_credentials() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        } else {
            warn!("SMTP credentials not set, sending unauthenticated");
        }

        Ok(Self {
            transport: builder.build(),
        })
    }

    /// Build the single-part HTML message, all recipients in one `To` header
    pub fn build_message(email: &SosEmail) -> Result<Message, TransportError> {
        let from_address: Address = email.from_address.parse().map_err(|e| {
            TransportError::unknown(format!(
                "Invalid sender address {}: {}",
                email.from_address, e
            ))
        })?;

        let mut builder = Message::builder()
            .from(Mailbox::new(Some(email.from_name.clone()), from_address))
            .subject(email.subject.clone())
            .message_id(Some(email.message_id.clone()))
            .header(ContentType::TEXT_HTML)
            .header(XPriority)
            .header(XMsMailPriority)
            .header(Importance);

        for recipient in &email.to {
            let mailbox: Mailbox = recipient.parse().map_err(|e| {
                TransportError::new(
                    TransportErrorKind::RecipientRejected,
                    format!("Invalid recipient {}: {}", recipient, e),
                )
            })?;
            builder = builder.to(mailbox);
        }

        builder
            .body(email.html.clone())
            .map_err(|e| TransportError::unknown(format!("Failed to build message: {}", e)))
    }
}

#[async_trait]
impl MailTransport for SmtpClient {
    async fn send(&self, email: &SosEmail) -> Result<DeliveryReceipt, TransportError> {
        let message = Self::build_message(email)?;

        let response = self.transport.send(message).await.map_err(|e| {
            error!("SMTP send failed: {}", e);
            classify_smtp_error(&e)
        })?;

        let text = response.message().collect::<Vec<_>>().join(" ");
        debug!("SMTP response {}: {}", response.code(), text);

        Ok(DeliveryReceipt {
            message_id: response
                .is_positive()
                .then(|| email.message_id.clone()),
            response: text,
        })
    }

    async fn health_check(&self) -> Result<bool, TransportError> {
        self.transport.test_connection().await.map_err(|e| {
            warn!("SMTP health check failed: {}", e);
            classify_smtp_error(&e)
        })
    }
}

/// Map a lettre error onto a transport error kind
///
/// Errors without an SMTP status and without a client or response fault are
/// network, TLS or timeout failures.
fn classify_smtp_error(err: &lettre::transport::smtp::Error) -> TransportError {
    let status = err
        .status()
        .and_then(|code| code.to_string().parse::<u16>().ok());

    let kind = match status {
        Some(code) => kind_for_status(code),
        None if err.is_client() || err.is_response() => TransportErrorKind::Unknown,
        None => TransportErrorKind::Connection,
    };

    TransportError::new(kind, err.to_string())
}

fn kind_for_status(code: u16) -> TransportErrorKind {
    match code {
        421 => TransportErrorKind::Connection,
        530 | 534 | 535 | 538 => TransportErrorKind::Authentication,
        501 | 550..=553 => TransportErrorKind::RecipientRejected,
        _ => TransportErrorKind::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email() -> SosEmail {
        SosEmail {
            from_name: "AEGIS Emergency Alert System".to_string(),
            from_address: "alerts@mine-site.example".to_string(),
            to: vec![
                "ops@mine-site.example".to_string(),
                "geo@mine-site.example".to_string(),
            ],
            subject: "SOS Alert - SE Wall".to_string(),
            html: "<p>Zone: SE Wall</p>".to_string(),
            message_id: "<abc123@mine-site.example>".to_string(),
        }
    }

    #[test]
    fn test_build_message_headers() {
        let message = SmtpClient::build_message(&email()).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("To: ops@mine-site.example, geo@mine-site.example"));
        assert!(raw.contains("X-Priority: 1 (Highest)"));
        assert!(raw.contains("X-MSMail-Priority: High"));
        assert!(raw.contains("Importance: High"));
        assert!(raw.contains("Message-ID: <abc123@mine-site.example>"));
        assert!(raw.contains("Content-Type: text/html"));
        assert!(raw.contains("<p>Zone: SE Wall</p>"));
    }

    #[test]
    fn test_build_message_envelope_has_every_recipient() {
        let message = SmtpClient::build_message(&email()).unwrap();
        assert_eq!(message.envelope().to().len(), 2);
    }

    #[test]
    fn test_unparseable_recipient_is_rejected() {
        let mut email = email();
        email.to.push("ops@@mine-site.example".to_string());

        let err = SmtpClient::build_message(&email).unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::RecipientRejected);
        assert!(err.detail.contains("ops@@mine-site.example"));
    }

    #[test]
    fn test_kind_for_status() {
        assert_eq!(kind_for_status(421), TransportErrorKind::Connection);
        assert_eq!(kind_for_status(535), TransportErrorKind::Authentication);
        assert_eq!(kind_for_status(550), TransportErrorKind::RecipientRejected);
        assert_eq!(kind_for_status(553), TransportErrorKind::RecipientRejected);
        assert_eq!(kind_for_status(554), TransportErrorKind::Unknown);
    }

    #[tokio::test]
    async fn test_client_builds_without_connecting() {
        let config = SmtpConfig {
            host: "127.0.0.1".to_string(),
            port: 2525,
            username: "alerts@mine-site.example".to_string(),
            password: "secret".to_string(),
            ..SmtpConfig::default()
        };
        assert!(SmtpClient::new(&config).is_ok());
    }
}
