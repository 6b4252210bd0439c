//! Emergency-stop rule
//!
//! Consumes windowed error counts and invokes the `EmergencyStop` method on
//! the device named in each message.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::message::{parse_first_line, MessageDisposition};
use crate::domain::DeviceCommand;
use crate::ports::{IDeviceRegistry, MethodResponse};

/// One windowed error-count result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorBurstReport {
    pub window_end_time: DateTime<Utc>,
    pub connection_device_id: String,
    pub occured_errors: f64,
}

/// Use case stopping devices that raise too many errors
pub struct InvokeEmergencyStopUseCase {
    registry: Arc<dyn IDeviceRegistry + Send + Sync>,
}

impl InvokeEmergencyStopUseCase {
    pub fn new(registry: Arc<dyn IDeviceRegistry + Send + Sync>) -> Self {
        Self { registry }
    }

    /// Handles one raw message body; the message is always completed
    pub async fn handle_message(&self, body: &str) -> MessageDisposition {
        info!(body, "Received error burst message");

        let report: ErrorBurstReport = match parse_first_line(body) {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "Cannot deserialize error burst message");
                return MessageDisposition::Complete;
            }
        };

        if let Err(e) = self.apply(&report).await {
            error!(
                device = %report.connection_device_id,
                error = %e,
                "Failed to invoke emergency stop"
            );
        }
        MessageDisposition::Complete
    }

    /// Invokes the emergency stop for the reported device
    ///
    /// # Errors
    /// Returns an error if the method invocation fails
    pub async fn apply(&self, report: &ErrorBurstReport) -> anyhow::Result<MethodResponse> {
        let device = report.connection_device_id.as_str();
        warn!(device, errors = report.occured_errors, "Invoking emergency stop");

        let response = self
            .registry
            .invoke_method(device, DeviceCommand::EmergencyStop.method_name())
            .await?;
        warn!(device, status = response.status, "Emergency stop invoked");
        Ok(response)
    }
}
