//! Integration tests for alert delivery

use reqwest::StatusCode;
use serde_json::{json, Value};

use twinbridge_alert::AlertError;
use twinbridge_core::ports::{IAlertGateway, ALERT_PREAMBLE, ALERT_SUBJECT};

use crate::common::{self, SENDER};

const PAYLOAD: &str = r#"{"errorName":"EmergencyStop","newErrors":1,"deviceName":"Device 1","currentErrors":"'Emergency Stop'","currentErrorCode":1}"#;

#[tokio::test]
async fn test_send_alert_posts_email_request() {
    let (server, gateway) =
        common::setup_email_mock(202, &["ops@example.com", "lead@example.com"]).await;

    gateway.send_alert(PAYLOAD).await.expect("send_alert failed");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(
        body,
        json!({
            "senderAddress": SENDER,
            "recipients": {"to": [
                {"address": "ops@example.com"},
                {"address": "lead@example.com"}
            ]},
            "content": {
                "subject": ALERT_SUBJECT,
                "plainText": format!("{ALERT_PREAMBLE}\n\n{PAYLOAD}")
            }
        })
    );
}

#[tokio::test]
async fn test_rejected_request_carries_status_and_body() {
    let (_server, gateway) = common::setup_email_mock(401, &["ops@example.com"]).await;

    let err = gateway
        .send(&twinbridge_core::ports::Alert::device_error(PAYLOAD))
        .await
        .unwrap_err();

    match err {
        AlertError::Rejected { status, body } => {
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert!(body.contains("Invalid sender"));
        }
        other => panic!("expected Rejected, got {other:?}"),
    }
}

#[tokio::test]
async fn test_no_recipients_sends_nothing() {
    let (server, gateway) = common::setup_email_mock(202, &[]).await;

    let err = gateway.send_alert(PAYLOAD).await.unwrap_err();

    assert!(matches!(
        err.downcast_ref::<AlertError>(),
        Some(AlertError::NoRecipients)
    ));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unreachable_endpoint_is_http_error() {
    let config = common::unreachable_alerts_config(&["ops@example.com"]);
    let gateway = twinbridge_alert::EmailAlertGateway::from_config(&config).unwrap();

    let err = gateway
        .send(&twinbridge_core::ports::Alert::device_error(PAYLOAD))
        .await
        .unwrap_err();

    assert!(matches!(err, AlertError::Http(_)), "got {err:?}");
}

#[tokio::test]
async fn test_stalled_endpoint_times_out() {
    let server = wiremock::MockServer::start().await;
    wiremock::Mock::given(wiremock::matchers::method("POST"))
        .respond_with(
            wiremock::ResponseTemplate::new(202).set_delay(std::time::Duration::from_secs(5)),
        )
        .mount(&server)
        .await;
    let config = common::alerts_config(&server, &["ops@example.com"]);
    let gateway = twinbridge_alert::EmailAlertGateway::with_timeout(
        &config,
        std::time::Duration::from_millis(200),
    )
    .unwrap();

    let started = std::time::Instant::now();
    let err = gateway
        .send(&twinbridge_core::ports::Alert::device_error(PAYLOAD))
        .await
        .unwrap_err();

    match err {
        AlertError::Http(e) => assert!(e.is_timeout(), "expected timeout, got {e}"),
        other => panic!("expected Http timeout, got {other:?}"),
    }
    assert!(started.elapsed() < std::time::Duration::from_secs(4));
}
