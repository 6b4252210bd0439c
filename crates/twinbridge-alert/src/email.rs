//! HTTP e-mail gateway
//!
//! Sends device alerts through a communication-services e-mail endpoint:
//!
//! ```text
//! POST <endpoint>/emails:send?api-version=2023-03-31
//! Authorization: Bearer <accesskey>
//!
//! {"senderAddress": "...", "recipients": {"to": [{"address": "..."}]},
//!  "content": {"subject": "...", "plainText": "..."}}
//! ```
//!
//! A missing or malformed connection string does not prevent construction; it
//! is reported when an alert is sent, so a broken mail setup never stops the
//! bridge from starting. Every request is bounded by a timeout.

use std::fmt;
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info, warn};

use twinbridge_core::config::AlertsConfig;
use twinbridge_core::ports::{Alert, IAlertGateway};

use crate::error::AlertError;

/// REST API version of the e-mail endpoint
pub const EMAIL_API_VERSION: &str = "2023-03-31";

/// Upper bound on one send request, connection included
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// EmailConnection
// ============================================================================

/// Parsed `endpoint=<url>;accesskey=<key>` connection string
#[derive(Clone, PartialEq, Eq)]
pub struct EmailConnection {
    endpoint: String,
    access_key: String,
}

impl EmailConnection {
    /// Parses a connection string
    ///
    /// Keys are case-insensitive and may appear in any order. Unknown keys are
    /// ignored.
    ///
    /// # Errors
    /// Returns [`AlertError::InvalidConnectionString`] when the endpoint or the
    /// access key is missing, or the endpoint is not an HTTP(S) URL
    pub fn parse(raw: &str) -> Result<Self, AlertError> {
        let mut endpoint = None;
        let mut access_key = None;

        for part in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let Some((key, value)) = part.split_once('=') else {
                return Err(AlertError::InvalidConnectionString(format!(
                    "segment '{part}' is not a key=value pair"
                )));
            };
            match key.trim().to_ascii_lowercase().as_str() {
                "endpoint" => endpoint = Some(value.trim().to_string()),
                "accesskey" => access_key = Some(value.trim().to_string()),
                _ => {}
            }
        }

        let endpoint = endpoint
            .filter(|e| !e.is_empty())
            .ok_or_else(|| AlertError::InvalidConnectionString("missing endpoint".to_string()))?;
        if !endpoint.starts_with("https://") && !endpoint.starts_with("http://") {
            return Err(AlertError::InvalidConnectionString(format!(
                "endpoint must be an HTTP(S) URL: {endpoint}"
            )));
        }
        let access_key = access_key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AlertError::InvalidConnectionString("missing accesskey".to_string()))?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            access_key,
        })
    }

    /// Endpoint URL without a trailing slash
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// URL of the send operation
    pub fn send_url(&self) -> String {
        format!(
            "{}/emails:send?api-version={EMAIL_API_VERSION}",
            self.endpoint
        )
    }
}

impl fmt::Debug for EmailConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailConnection")
            .field("endpoint", &self.endpoint)
            .field("access_key", &"<redacted>")
            .finish()
    }
}

// ============================================================================
// Request body
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendEmailRequest<'a> {
    sender_address: &'a str,
    recipients: Recipients<'a>,
    content: Content<'a>,
}

#[derive(Debug, Serialize)]
struct Recipients<'a> {
    to: Vec<Address<'a>>,
}

#[derive(Debug, Serialize)]
struct Address<'a> {
    address: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Content<'a> {
    subject: &'a str,
    plain_text: &'a str,
}

// ============================================================================
// EmailAlertGateway
// ============================================================================

#[derive(Debug)]
enum ConnectionState {
    Ready(EmailConnection),
    Missing,
    Invalid(String),
}

/// [`IAlertGateway`] delivering alerts by e-mail
#[derive(Debug)]
pub struct EmailAlertGateway {
    client: Client,
    connection: ConnectionState,
    sender: Option<String>,
    recipients: Vec<String>,
}

impl EmailAlertGateway {
    /// Builds the gateway from the `alerts` config section
    ///
    /// An unparseable connection string is logged here and reported again on
    /// every send attempt. Requests time out after [`DEFAULT_SEND_TIMEOUT`].
    ///
    /// # Errors
    /// Returns [`AlertError::Http`] if the HTTP client cannot be built
    pub fn from_config(config: &AlertsConfig) -> Result<Self, AlertError> {
        Self::with_timeout(config, DEFAULT_SEND_TIMEOUT)
    }

    /// Like [`from_config`](Self::from_config) with a custom request timeout
    ///
    /// # Errors
    /// Returns [`AlertError::Http`] if the HTTP client cannot be built
    pub fn with_timeout(config: &AlertsConfig, timeout: Duration) -> Result<Self, AlertError> {
        let connection = match config.connection_string.as_deref() {
            None => ConnectionState::Missing,
            Some(raw) => match EmailConnection::parse(raw) {
                Ok(connection) => ConnectionState::Ready(connection),
                Err(e) => {
                    warn!(error = %e, "E-mail alerts disabled until the connection string is fixed");
                    ConnectionState::Invalid(e.to_string())
                }
            },
        };

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            connection,
            sender: config.sender.clone(),
            recipients: config.recipients.clone(),
        })
    }

    /// Parsed connection, if the configured string was valid
    pub fn connection(&self) -> Option<&EmailConnection> {
        match &self.connection {
            ConnectionState::Ready(connection) => Some(connection),
            _ => None,
        }
    }

    /// Sends `alert` to every configured recipient
    ///
    /// # Errors
    /// - [`AlertError::NoRecipients`] when no recipient is configured
    /// - [`AlertError::MissingConnectionString`] or
    ///   [`AlertError::InvalidConnectionString`] when there is no usable endpoint
    /// - [`AlertError::MissingSender`] when no sender is configured
    /// - [`AlertError::Http`] or [`AlertError::Rejected`] when delivery fails
    pub async fn send(&self, alert: &Alert) -> Result<(), AlertError> {
        if self.recipients.is_empty() {
            return Err(AlertError::NoRecipients);
        }
        let connection = match &self.connection {
            ConnectionState::Ready(connection) => connection,
            ConnectionState::Missing => return Err(AlertError::MissingConnectionString),
            ConnectionState::Invalid(reason) => {
                return Err(AlertError::InvalidConnectionString(reason.clone()))
            }
        };
        let sender = self.sender.as_deref().ok_or(AlertError::MissingSender)?;

        info!(recipients = self.recipients.len(), "Sending alert e-mail");

        let request = SendEmailRequest {
            sender_address: sender,
            recipients: Recipients {
                to: self
                    .recipients
                    .iter()
                    .map(|address| Address { address })
                    .collect(),
            },
            content: Content {
                subject: &alert.subject,
                plain_text: &alert.body,
            },
        };

        let response = self
            .client
            .post(connection.send_url())
            .bearer_auth(&connection.access_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AlertError::Rejected { status, body });
        }

        debug!(status = %status, "Alert e-mail accepted");
        info!("Alert e-mail sent");
        Ok(())
    }
}

#[async_trait::async_trait]
impl IAlertGateway for EmailAlertGateway {
    async fn send_alert(&self, body: &str) -> anyhow::Result<()> {
        self.send(&Alert::device_error(body)).await?;
        Ok(())
    }
}
