//! Event payloads published to the twin service
//!
//! Both payloads serialize to JSON with camelCase keys.

use serde::{Deserialize, Serialize};

use super::device_error::{ErrorClassifier, ErrorFlags};
use super::newtypes::DeviceName;

/// One telemetry reading of a device
///
/// Built fresh on every telemetry tick and discarded after publishing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySample {
    pub production_status: i64,
    pub workorder_id: String,
    pub good_count: u64,
    pub bad_count: u64,
    pub temperature: f64,
}

impl TelemetrySample {
    /// Attaches the device identity for publishing
    #[must_use]
    pub fn for_device<'a>(&'a self, device: &'a DeviceName) -> TelemetryEvent<'a> {
        TelemetryEvent {
            device_name: device.as_str(),
            sample: self,
        }
    }
}

/// Telemetry event body: `{deviceName, productionStatus, workorderId, goodCount, badCount, temperature}`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryEvent<'a> {
    pub device_name: &'a str,
    #[serde(flatten)]
    pub sample: &'a TelemetrySample,
}

/// Error event body: `{errorName, newErrors, deviceName, currentErrors, currentErrorCode}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEvent {
    /// Names of the newly set flags, `None` when nothing is new
    pub error_name: String,
    /// Number of newly set flags
    pub new_errors: usize,
    pub device_name: String,
    /// Description of every active flag
    pub current_errors: String,
    pub current_error_code: i64,
}

impl ErrorEvent {
    /// Builds the event for a device whose code moved from `previous_code` to `current_code`
    #[must_use]
    pub fn new(device: &DeviceName, previous_code: i64, current_code: i64) -> Self {
        let newly_set = ErrorClassifier::newly_set(previous_code, current_code);
        Self {
            error_name: newly_set.to_string(),
            new_errors: ErrorClassifier::count(newly_set),
            device_name: device.to_string(),
            current_errors: ErrorFlags::decode(current_code).describe(),
            current_error_code: current_code,
        }
    }

    /// Whether the event carries newly set flags and warrants an alert
    #[must_use]
    pub fn has_new_errors(&self) -> bool {
        self.new_errors > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn device() -> DeviceName {
        DeviceName::new("Device 1").unwrap()
    }

    #[test]
    fn telemetry_event_schema() {
        let sample = TelemetrySample {
            production_status: 1,
            workorder_id: "wo-17".to_string(),
            good_count: 120,
            bad_count: 3,
            temperature: 68.5,
        };
        let name = device();
        let value = serde_json::to_value(sample.for_device(&name)).unwrap();
        assert_eq!(
            value,
            json!({
                "deviceName": "Device 1",
                "productionStatus": 1,
                "workorderId": "wo-17",
                "goodCount": 120,
                "badCount": 3,
                "temperature": 68.5
            })
        );
    }

    #[test]
    fn error_event_first_error() {
        let event = ErrorEvent::new(&device(), 0, 1);
        assert_eq!(event.error_name, "EmergencyStop");
        assert_eq!(event.new_errors, 1);
        assert_eq!(event.current_errors, "'Emergency Stop'");
        assert!(event.has_new_errors());
    }

    #[test]
    fn error_event_added_flag() {
        let event = ErrorEvent::new(&device(), 1, 3);
        assert_eq!(event.error_name, "PowerFailure");
        assert_eq!(event.new_errors, 1);
        assert_eq!(event.current_errors, "'Emergency Stop' 'Power Failure'");
        assert_eq!(event.current_error_code, 3);
    }

    #[test]
    fn error_event_cleared_flag() {
        let event = ErrorEvent::new(&device(), 3, 1);
        assert_eq!(event.error_name, "None");
        assert_eq!(event.new_errors, 0);
        assert!(!event.has_new_errors());
    }

    #[test]
    fn error_event_schema() {
        let value = serde_json::to_value(ErrorEvent::new(&device(), 0, 0)).unwrap();
        assert_eq!(
            value,
            json!({
                "errorName": "None",
                "newErrors": 0,
                "deviceName": "Device 1",
                "currentErrors": "'None'",
                "currentErrorCode": 0
            })
        );
    }
}
