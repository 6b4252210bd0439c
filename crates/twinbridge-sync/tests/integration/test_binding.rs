//! Integration tests for fleet binding
//!
//! - Too few connection strings abort before any device is touched
//! - A device failing to initialize is excluded, the others proceed

use twinbridge_core::domain::DeviceField;
use twinbridge_core::ports::{DEVICE_ERROR_PROPERTY, PRODUCTION_RATE_PROPERTY};
use twinbridge_sim::NodeOperation;
use twinbridge_sync::{Cycle, SyncError};

use crate::common::Harness;

#[tokio::test]
async fn test_bind_all_fails_fast_without_enough_connections() {
    let mut h = Harness::new(5, 3);
    let devices = h.devices();
    let connections = h.connections();

    let err = h
        .scheduler
        .bind_all(devices, connections)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SyncError::BindingConfiguration {
            devices: 5,
            connections: 3
        }
    ));
    assert_eq!(h.plant.connections(), 0);
    assert!(h.plant.operations().is_empty());
    assert!(h.hub.device_ids().is_empty());
    assert!(h.scheduler.bindings().is_empty());
}

#[tokio::test]
async fn test_surplus_connections_are_ignored() {
    let h = Harness::new(2, 4).bind().await;

    assert_eq!(h.scheduler.bindings().len(), 2);
    assert_eq!(
        h.hub.device_ids(),
        vec!["device-1".to_string(), "device-2".to_string()]
    );
}

#[tokio::test]
async fn test_failed_device_is_excluded_from_all_cycles() {
    let h = Harness::new(5, 5);
    let failing = h.device(3);
    h.plant.set_offline(&failing, true);
    let h = h.bind().await;

    let bound: Vec<_> = h
        .scheduler
        .bindings()
        .iter()
        .map(|b| b.name().to_string())
        .collect();
    assert_eq!(bound, vec!["Device 1", "Device 2", "Device 4", "Device 5"]);

    // The device recovers, but it is not part of this run
    h.plant.set_offline(&failing, false);
    h.plant.clear_operations();
    for cycle in Cycle::ALL {
        assert_eq!(h.scheduler.tick(cycle).await, 0);
    }

    let touched_failed = h.plant.operations().iter().any(|op| match op {
        NodeOperation::Read(path) | NodeOperation::Write(path, _) => path.contains("Device 3"),
        NodeOperation::Call(object, _) => object.contains("Device 3"),
    });
    assert!(!touched_failed);
    assert!(h.telemetry_events("device-3").is_empty());
    for id in ["device-1", "device-2", "device-4", "device-5"] {
        assert_eq!(h.telemetry_events(id).len(), 1, "{id} should publish telemetry");
    }
}

#[tokio::test]
async fn test_twin_open_failure_excludes_device() {
    let h = Harness::new(3, 3);
    h.hub.fail_open("device-2", true);
    let h = h.bind().await;

    assert_eq!(h.scheduler.bindings().len(), 2);
    assert!(h.hub.reported("device-2").is_empty());
}

#[tokio::test]
async fn test_initialization_syncs_desired_rate_and_reported_state() {
    let h = Harness::new(2, 2);
    h.hub.seed_desired("device-1", PRODUCTION_RATE_PROPERTY, 60);
    h.hub.seed_reported("device-2", DEVICE_ERROR_PROPERTY, 2);
    let h = h.bind().await;

    assert_eq!(
        h.plant.value(&h.device(1), DeviceField::ProductionRate),
        Some(60.into())
    );
    assert_eq!(h.hub.reported("device-1").get(PRODUCTION_RATE_PROPERTY), Some(&60));
    assert_eq!(h.hub.reported("device-2").get(DEVICE_ERROR_PROPERTY), Some(&2));
    assert_eq!(h.hub.reported("device-2").get(PRODUCTION_RATE_PROPERTY), Some(&0));

    // Device 2 still shows no error, so the first error tick reports the clear
    h.scheduler.tick(Cycle::Error).await;
    assert_eq!(h.hub.reported("device-2").get(DEVICE_ERROR_PROPERTY), Some(&0));
    assert!(h.alerts.sent().is_empty());
}
