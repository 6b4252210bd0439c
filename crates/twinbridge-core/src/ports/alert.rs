//! Alert gateway port (driven/secondary port)
//!
//! This module defines the interface for delivering operator alerts when a
//! device raises new error flags. Implementations may send email, page an
//! on-call rotation or simply record the alert.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because delivery errors are adapter-specific.
//! - Alerts are fire-and-forget; callers log delivery failures and move on.

use serde::{Deserialize, Serialize};

/// Subject line used for every device alert
pub const ALERT_SUBJECT: &str = "!!!DEVICE ERROR OCCURED!!!";

/// Fixed lead-in placed before the error payload in the alert body
pub const ALERT_PREAMBLE: &str =
    "An error has occured on one of your devices. Please, take actions.";

/// An alert to deliver to the configured recipients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub subject: String,
    pub body: String,
}

impl Alert {
    /// Builds the device-error alert around a serialized error payload
    pub fn device_error(payload: impl AsRef<str>) -> Self {
        Self {
            subject: ALERT_SUBJECT.to_string(),
            body: format!("{ALERT_PREAMBLE}\n\n{}", payload.as_ref()),
        }
    }
}

/// Port trait for alert delivery
#[async_trait::async_trait]
pub trait IAlertGateway: Send + Sync {
    /// Delivers an alert whose body is the serialized error payload
    ///
    /// # Arguments
    /// * `body` - Serialized error event payload
    async fn send_alert(&self, body: &str) -> anyhow::Result<()>;
}
