//! # SOS Trigger Binary
//!
//! Sends one SOS alert to the relay using `SOS_TRIGGER_*` settings and
//! exits non-zero when the alert was not delivered.

use anyhow::{Context, Result};
use tracing::{error, info};

use sos_alert_relay::{AlertTrigger, TriggerConfig, TriggerFeedback};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sos_alert_relay=info".parse()?),
        )
        .init();

    let config = TriggerConfig::from_env().context("Failed to load trigger configuration")?;
    let trigger = AlertTrigger::from_config(&config).context("Failed to create SOS trigger")?;

    match trigger.activate().await? {
        TriggerFeedback::Success {
            acknowledgment,
            tracking,
        } => {
            info!("{}", acknowledgment);
            info!("{}", tracking);
            Ok(())
        }
        TriggerFeedback::Failure { acknowledgment, .. } => {
            error!("{}", acknowledgment);
            anyhow::bail!("SOS alert was not delivered")
        }
    }
}
