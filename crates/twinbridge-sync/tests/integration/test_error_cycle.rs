//! Integration tests for the error cycle
//!
//! Walks one device through 0 → 1 → 3 → 1 and checks the published error
//! events, alerts and reported state at every step.

use twinbridge_core::domain::DeviceField;
use twinbridge_core::ports::DEVICE_ERROR_PROPERTY;
use twinbridge_sync::Cycle;

use crate::common::Harness;

const ID: &str = "device-1";

async fn step(h: &Harness, code: i64) {
    h.plant.set_value(&h.device(1), DeviceField::DeviceError, code);
    assert_eq!(h.scheduler.tick(Cycle::Error).await, 0);
}

#[tokio::test]
async fn test_first_error_raises_event_and_alert() {
    let h = Harness::new(1, 1).bind().await;

    step(&h, 1).await;

    let events = h.error_events(ID);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["errorName"], "EmergencyStop");
    assert_eq!(events[0]["newErrors"], 1);
    assert_eq!(events[0]["deviceName"], "Device 1");
    assert_eq!(events[0]["currentErrors"], "'Emergency Stop'");
    assert_eq!(events[0]["currentErrorCode"], 1);
    assert_eq!(h.alerts.sent().len(), 1);
    assert!(h.alerts.sent()[0].contains("\"errorName\":\"EmergencyStop\""));
    assert_eq!(h.hub.reported(ID).get(DEVICE_ERROR_PROPERTY), Some(&1));
}

#[tokio::test]
async fn test_added_flag_counts_only_the_new_one() {
    let h = Harness::new(1, 1).bind().await;
    step(&h, 1).await;

    step(&h, 3).await;

    let events = h.error_events(ID);
    assert_eq!(events.len(), 2);
    assert_eq!(events[1]["errorName"], "PowerFailure");
    assert_eq!(events[1]["newErrors"], 1);
    assert_eq!(events[1]["currentErrors"], "'Emergency Stop' 'Power Failure'");
    assert_eq!(h.alerts.sent().len(), 2);
    assert_eq!(h.hub.reported(ID).get(DEVICE_ERROR_PROPERTY), Some(&3));
}

#[tokio::test]
async fn test_cleared_flag_syncs_state_without_alert() {
    let h = Harness::new(1, 1).bind().await;
    step(&h, 1).await;
    step(&h, 3).await;

    step(&h, 1).await;

    let events = h.error_events(ID);
    assert_eq!(events.len(), 3);
    assert_eq!(events[2]["errorName"], "None");
    assert_eq!(events[2]["newErrors"], 0);
    assert_eq!(h.alerts.sent().len(), 2);
    assert_eq!(h.hub.reported(ID).get(DEVICE_ERROR_PROPERTY), Some(&1));
}

#[tokio::test]
async fn test_swapped_flags_report_no_new_error() {
    let h = Harness::new(1, 1).bind().await;
    step(&h, 2).await;

    step(&h, 1).await;

    let events = h.error_events(ID);
    assert_eq!(events[1]["newErrors"], 0);
    assert_eq!(h.alerts.sent().len(), 1);
    assert_eq!(h.hub.reported(ID).get(DEVICE_ERROR_PROPERTY), Some(&1));
}

#[tokio::test]
async fn test_steady_error_is_not_republished() {
    let h = Harness::new(1, 1).bind().await;
    step(&h, 4).await;

    step(&h, 4).await;
    step(&h, 4).await;

    assert_eq!(h.error_events(ID).len(), 1);
    assert_eq!(h.alerts.sent().len(), 1);
}

#[tokio::test]
async fn test_one_failing_device_does_not_stop_the_tick() {
    let h = Harness::new(3, 3).bind().await;
    h.plant.fail_reads(&h.device(1), DeviceField::DeviceError, true);
    for i in 1..=3 {
        h.plant.set_value(&h.device(i), DeviceField::DeviceError, 1);
    }

    assert_eq!(h.scheduler.tick(Cycle::Error).await, 1);

    assert!(h.error_events("device-1").is_empty());
    assert_eq!(h.error_events("device-2").len(), 1);
    assert_eq!(h.error_events("device-3").len(), 1);

    h.plant.fail_reads(&h.device(1), DeviceField::DeviceError, false);
    assert_eq!(h.scheduler.tick(Cycle::Error).await, 0);
    assert_eq!(h.error_events("device-1").len(), 1);
}
