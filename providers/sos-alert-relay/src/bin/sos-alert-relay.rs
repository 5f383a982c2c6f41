//! # SOS Alert Relay Binary
//!
//! Entry point for the relay server. Configuration is read once from the
//! environment, the SMTP client is built once, and the HTTP server runs
//! until Ctrl-C.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use sos_alert_common::is_valid_email;
use sos_alert_relay::{server, ServerConfig, SmtpConfig, SosAlertRelay};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging with environment filter
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sos_alert_relay=info".parse()?),
        )
        .init();

    info!("🌟 Starting SOS Alert Relay");

    let smtp_config = SmtpConfig::from_env().context("Failed to load SMTP configuration")?;
    let server_config = ServerConfig::from_env().context("Failed to load server configuration")?;

    let flag = |set: bool| if set { "✓ Set" } else { "✗ Missing" };
    info!(
        host = %smtp_config.host,
        port = smtp_config.port,
        user = flag(!smtp_config.username.is_empty()),
        pass = flag(!smtp_config.password.is_empty()),
        "📋 SMTP configuration loaded"
    );

    if smtp_config.username.is_empty() {
        warn!("SMTP_USER not configured; alerts will fail until it is set");
    } else if !is_valid_email(&smtp_config.username) {
        warn!("SMTP_USER is not a valid sender address; alerts will fail");
    }

    let relay = Arc::new(
        SosAlertRelay::with_smtp(smtp_config).context("Failed to create SOS alert relay")?,
    );

    if relay.health_check().await {
        info!("✅ SMTP server reachable");
    } else {
        warn!("SMTP server not reachable at startup; alerts may fail until it recovers");
    }

    server::serve(relay, server_config, async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("🛑 Received shutdown signal");
        }
    })
    .await?;

    info!("👋 SOS Alert Relay shutdown complete");
    Ok(())
}
