//! Shared test helpers for e-mail gateway integration tests

use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use twinbridge_alert::EmailAlertGateway;
use twinbridge_core::config::AlertsConfig;

pub const ACCESS_KEY: &str = "dGVzdC1hY2Nlc3Mta2V5";
pub const SENDER: &str = "DoNotReply@alerts.example.com";

/// Alerts config pointing at `server`
pub fn alerts_config(server: &MockServer, recipients: &[&str]) -> AlertsConfig {
    AlertsConfig {
        connection_string: Some(format!(
            "endpoint={}/;accesskey={ACCESS_KEY}",
            server.uri()
        )),
        sender: Some(SENDER.to_string()),
        recipients: recipients.iter().map(|r| r.to_string()).collect(),
    }
}

/// Alerts config pointing at a local port nothing listens on
pub fn unreachable_alerts_config(recipients: &[&str]) -> AlertsConfig {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);

    AlertsConfig {
        connection_string: Some(format!(
            "endpoint=http://127.0.0.1:{port}/;accesskey={ACCESS_KEY}"
        )),
        sender: Some(SENDER.to_string()),
        recipients: recipients.iter().map(|r| r.to_string()).collect(),
    }
}

/// Starts a mock server answering the send operation with `status`
pub async fn setup_email_mock(status: u16, recipients: &[&str]) -> (MockServer, EmailAlertGateway) {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emails:send"))
        .and(query_param("api-version", "2023-03-31"))
        .and(header("authorization", format!("Bearer {ACCESS_KEY}").as_str()))
        .respond_with(ResponseTemplate::new(status).set_body_string(if status < 300 {
            r#"{"id":"op-1","status":"Running"}"#
        } else {
            r#"{"error":{"code":"Denied","message":"Invalid sender"}}"#
        }))
        .mount(&server)
        .await;

    let gateway = EmailAlertGateway::from_config(&alerts_config(&server, recipients))
        .expect("gateway client builds");
    (server, gateway)
}
