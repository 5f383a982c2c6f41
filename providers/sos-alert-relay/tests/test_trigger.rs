use serde_json::json;
use sos_alert_common::AlertRequestBody;
use sos_alert_relay::trigger::{FAILURE_ACKNOWLEDGMENT, SUCCESS_ACKNOWLEDGMENT};
use sos_alert_relay::{AlertTrigger, TriggerError, TriggerFeedback};
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

fn payload() -> AlertRequestBody {
    AlertRequestBody::new(vec!["ops@mine-site.example".to_string()])
        .with_zone("SE Wall")
        .with_measurements(&AlertTrigger::default_measurements())
        .with_notes("Detected abnormal slope instability")
}

fn trigger_for(server: &MockServer) -> AlertTrigger {
    AlertTrigger::new(
        format!("{}/api/sos-alert", server.uri()),
        payload(),
        Duration::from_secs(5),
    )
    .unwrap()
}

#[tokio::test]
async fn test_successful_activation() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path("/api/sos-alert"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({
            "emails": ["ops@mine-site.example"],
            "zone": "SE Wall",
            "measurements": {"temperature": "36°C", "slopeAngle": "34°", "vibration": "5.2 Hz"},
            "additionalNotes": "Detected abnormal slope instability"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "Alert sent successfully. Message ID: abc123"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let trigger = trigger_for(&mock_server);
    let feedback = trigger.activate().await.unwrap();

    assert_eq!(
        feedback,
        TriggerFeedback::Success {
            acknowledgment: SUCCESS_ACKNOWLEDGMENT.to_string(),
            tracking: "Alert sent successfully. Message ID: abc123".to_string(),
        }
    );
    assert!(!trigger.is_busy());
}

#[tokio::test]
async fn test_server_error_maps_to_retry_prompt() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path("/api/sos-alert"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "success": false,
            "message": "Email server connection failed",
            "details": "Email send failed: SMTP connection refused"
        })))
        .mount(&mock_server)
        .await;

    let trigger = trigger_for(&mock_server);
    let feedback = trigger.activate().await.unwrap();

    assert!(!feedback.is_success());
    assert_eq!(feedback.acknowledgment(), FAILURE_ACKNOWLEDGMENT);
    match feedback {
        TriggerFeedback::Failure { reason, .. } => {
            assert!(reason.contains("Email server connection failed"));
            assert!(reason.contains("SMTP connection refused"));
        }
        other => panic!("Expected failure feedback, got {:?}", other),
    }
    assert!(!trigger.is_busy());
}

#[tokio::test]
async fn test_validation_error_maps_to_same_retry_prompt() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path("/api/sos-alert"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "success": false,
            "message": "Missing required fields: emails"
        })))
        .mount(&mock_server)
        .await;

    let feedback = trigger_for(&mock_server).activate().await.unwrap();
    assert_eq!(feedback.acknowledgment(), FAILURE_ACKNOWLEDGMENT);
}

#[tokio::test]
async fn test_unparseable_response_is_failure() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path("/api/sos-alert"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&mock_server)
        .await;

    let feedback = trigger_for(&mock_server).activate().await.unwrap();
    assert!(!feedback.is_success());
}

#[tokio::test]
async fn test_unreachable_relay_is_failure() {
    let trigger = AlertTrigger::new(
        "http://127.0.0.1:9/api/sos-alert",
        payload(),
        Duration::from_secs(2),
    )
    .unwrap();

    let feedback = trigger.activate().await.unwrap();
    assert_eq!(feedback.acknowledgment(), FAILURE_ACKNOWLEDGMENT);
    assert!(!trigger.is_busy());
}

#[tokio::test]
async fn test_activation_while_busy_is_refused() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path("/api/sos-alert"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({
                    "success": true,
                    "message": "Alert sent successfully. Message ID: abc123"
                }))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(2)
        .mount(&mock_server)
        .await;

    let trigger = trigger_for(&mock_server);
    let (first, second) = tokio::join!(trigger.activate(), trigger.activate());

    assert!(first.unwrap().is_success());
    assert!(matches!(second, Err(TriggerError::Busy)));

    // Flag is released once the first request completes
    assert!(!trigger.is_busy());
    assert!(trigger.activate().await.is_ok());
}
