use handlebars::{html_escape, Handlebars};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sos_alert_common::SosAlert;
use tracing::warn;
use uuid::Uuid;

const TEMPLATE_NAME: &str = "sos_alert";

/// A fully rendered SOS email, independent of the transport that sends it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SosEmail {
    pub from_name: String,
    pub from_address: String,
    /// All recipients, sent together in a single `To` header
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
    pub message_id: String,
}

pub struct SosEmailFormatter {
    templates: Handlebars<'static>,
    from_name: String,
}

impl SosEmailFormatter {
    pub fn new(from_name: impl Into<String>) -> Self {
        let mut templates = Handlebars::new();
        templates.set_strict_mode(false);

        if let Err(e) = templates
            .register_template_string(TEMPLATE_NAME, include_str!("../templates/sos_alert.hbs"))
        {
            warn!("Failed to register SOS alert template, using basic HTML: {}", e);
        }

        Self {
            templates,
            from_name: from_name.into(),
        }
    }

    /// Render `alert` into an email sent from `sender`
    pub fn format_alert(&self, alert: &SosAlert, sender: &str) -> SosEmail {
        SosEmail {
            from_name: self.from_name.clone(),
            from_address: sender.to_string(),
            to: alert.recipients.clone(),
            subject: Self::subject(alert),
            html: self.render_html(alert),
            message_id: Self::generate_message_id(sender),
        }
    }

    /// `🚨 URGENT: SOS Alert - <zone> [<ISO timestamp>]`
    pub fn subject(alert: &SosAlert) -> String {
        let zone_text = alert
            .zone
            .as_deref()
            .map(|zone| format!(" - {}", zone))
            .unwrap_or_default();

        format!(
            "🚨 URGENT: SOS Alert{} [{}]",
            zone_text,
            alert.iso_timestamp()
        )
    }

    pub fn measurement_lines(alert: &SosAlert) -> String {
        match &alert.measurements {
            Some(measurements) => measurements
                .iter()
                .map(|(sensor, reading)| format!("  - {}: {}", sensor, reading))
                .collect::<Vec<_>>()
                .join("\n"),
            None => "No measurement data available".to_string(),
        }
    }

    pub fn user_lines(alert: &SosAlert) -> String {
        let Some(user) = &alert.user else {
            return "No user information available".to_string();
        };

        let or_na = |value: &Option<String>| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .unwrap_or("N/A")
                .to_string()
        };

        format!(
            "\n  - ID: {}\n  - Name: {}\n  - Role: {}\n  - Email: {}",
            or_na(&user.id),
            or_na(&user.name),
            or_na(&user.role),
            or_na(&user.email)
        )
    }

    fn render_html(&self, alert: &SosAlert) -> String {
        let context = json!({
            "zone": alert.zone.as_deref().unwrap_or("Unknown"),
            "measurements": Self::measurement_lines(alert),
            "user_info": Self::user_lines(alert),
            "timestamp": alert.display_timestamp(),
            "notes": alert.additional_notes,
        });

        match self.templates.render(TEMPLATE_NAME, &context) {
            Ok(html) => html,
            Err(e) => {
                warn!("SOS alert template render failed, using basic HTML: {}", e);
                Self::generate_basic_html(alert)
            }
        }
    }

    fn generate_basic_html(alert: &SosAlert) -> String {
        let mut html = format!(
            r#"<!DOCTYPE html>
<html>
<body>
  <h1 style="color: #ff0000;">SOS Alert Triggered</h1>
  <p>Zone: {}</p>
  <h2>Measurements</h2>
  <pre>{}</pre>
  <h2>User Information</h2>
  <pre>{}</pre>
  <h2>Timestamp</h2>
  <p>{}</p>"#,
            html_escape(alert.zone.as_deref().unwrap_or("Unknown")),
            html_escape(&Self::measurement_lines(alert)),
            html_escape(&Self::user_lines(alert)),
            html_escape(&alert.display_timestamp())
        );

        if let Some(notes) = &alert.additional_notes {
            html.push_str(&format!(
                "\n  <h2>Additional Notes</h2>\n  <p>{}</p>",
                html_escape(notes)
            ));
        }

        html.push_str("\n</body>\n</html>");
        html
    }

    fn generate_message_id(sender: &str) -> String {
        let domain = sender
            .rsplit_once('@')
            .map(|(_, domain)| domain)
            .filter(|domain| !domain.is_empty())
            .unwrap_or("aegis.local");
        format!("<{}@{}>", Uuid::new_v4(), domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use sos_alert_common::{Measurements, UserInfo};

    fn alert() -> SosAlert {
        SosAlert {
            recipients: vec!["ops@example.com".to_string()],
            zone: Some("SE Wall".to_string()),
            measurements: Some(
                [("temperature", "36°C"), ("slopeAngle", "34°")]
                    .into_iter()
                    .collect::<Measurements>(),
            ),
            user: Some(UserInfo {
                id: Some("1024".to_string()),
                name: Some("Shift Lead".to_string()),
                email: None,
                role: Some("Site Engineer".to_string()),
            }),
            additional_notes: Some("Cracks widening near bench 4".to_string()),
            timestamp: Utc.with_ymd_and_hms(2026, 10, 17, 8, 15, 30).unwrap(),
        }
    }

    #[test]
    fn test_measurement_lines_preserve_order() {
        assert_eq!(
            SosEmailFormatter::measurement_lines(&alert()),
            "  - temperature: 36°C\n  - slopeAngle: 34°"
        );
    }

    #[test]
    fn test_user_lines_default_to_na() {
        let lines = SosEmailFormatter::user_lines(&alert());
        assert!(lines.contains("  - ID: 1024"));
        assert!(lines.contains("  - Email: N/A"));
    }

    #[test]
    fn test_basic_html_escapes_values() {
        let mut alert = alert();
        alert.additional_notes = Some("<script>alert(1)</script>".to_string());

        let html = SosEmailFormatter::generate_basic_html(&alert);
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_message_id_uses_sender_domain() {
        let id = SosEmailFormatter::generate_message_id("alerts@mine-site.example");
        assert!(id.starts_with('<'));
        assert!(id.ends_with("@mine-site.example>"));

        let id = SosEmailFormatter::generate_message_id("broken");
        assert!(id.ends_with("@aegis.local>"));
    }
}
