//! Integration tests for twin callbacks
//!
//! Desired-property patches and method invocations go through the hub's
//! registry side, exactly as the cloud rules deliver them.

use std::sync::Arc;

use twinbridge_core::domain::{DeviceField, NodeValue};
use twinbridge_core::ports::{IDeviceRegistry, METHOD_FAILED, PRODUCTION_RATE_PROPERTY};
use twinbridge_core::usecases::{
    DecreaseProductionRateUseCase, InvokeEmergencyStopUseCase, MessageDisposition,
};
use twinbridge_sim::NodeOperation;
use twinbridge_sync::Cycle;

use crate::common::Harness;

const ID: &str = "device-1";

fn reported_rate(h: &Harness) -> Option<i64> {
    h.hub.reported(ID).get(PRODUCTION_RATE_PROPERTY).copied()
}

#[tokio::test]
async fn test_handlers_registered_on_initialize() {
    let h = Harness::new(1, 1).bind().await;

    assert_eq!(
        h.hub.registered_methods(ID),
        vec!["EmergencyStop".to_string(), "ResetErrorStatus".to_string()]
    );
    assert!(h.hub.has_default_handler(ID));
}

#[tokio::test]
async fn test_desired_rate_round_trip() {
    let h = Harness::new(1, 1).bind().await;

    h.hub
        .update_desired_property(ID, PRODUCTION_RATE_PROPERTY, 70)
        .await
        .unwrap();

    assert_eq!(
        h.plant.value(&h.device(1), DeviceField::ProductionRate),
        Some(NodeValue::Int(70))
    );
    assert_eq!(reported_rate(&h), Some(70));
    assert_eq!(h.scheduler.bindings()[0].last_reported_production_rate().await, 70);

    // The rate cycle sees nothing new
    let pushes = h.hub.reported_updates(ID).len();
    h.scheduler.tick(Cycle::Rate).await;
    assert_eq!(h.hub.reported_updates(ID).len(), pushes);
}

#[tokio::test]
async fn test_unknown_desired_property_is_ignored() {
    let h = Harness::new(1, 1).bind().await;
    let pushes = h.hub.reported_updates(ID).len();

    h.hub
        .update_desired_property(ID, "TargetTemperature", 40)
        .await
        .unwrap();

    assert_eq!(h.hub.reported_updates(ID).len(), pushes);
    assert_eq!(
        h.plant.value(&h.device(1), DeviceField::ProductionRate),
        Some(NodeValue::Int(0))
    );
}

#[tokio::test]
async fn test_local_rate_change_reported_once() {
    let h = Harness::new(1, 1).bind().await;
    let pushes = h.hub.reported_updates(ID).len();
    h.plant.set_value(&h.device(1), DeviceField::ProductionRate, 50);

    h.scheduler.tick(Cycle::Rate).await;
    h.scheduler.tick(Cycle::Rate).await;

    assert_eq!(h.hub.reported_updates(ID).len(), pushes + 1);
    assert_eq!(reported_rate(&h), Some(50));
}

#[tokio::test]
async fn test_desired_rate_waits_for_inflight_rate_tick() {
    let h = Harness::new(1, 1).bind().await;
    h.plant.set_value(&h.device(1), DeviceField::ProductionRate, 30);
    let hold = h.hub.hold_next_reported_update(ID);

    // The tick reads 30 and parks on its reported push
    let tick = h.scheduler.tick(Cycle::Rate);
    tokio::pin!(tick);
    tokio::select! {
        biased;
        _ = &mut tick => panic!("rate tick finished while its push was held"),
        _ = tokio::task::yield_now() => {}
    }

    let release = async {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
        hold.release();
    };
    let (failures, desired, ()) = tokio::join!(
        &mut tick,
        h.hub.update_desired_property(ID, PRODUCTION_RATE_PROPERTY, 80),
        release,
    );
    assert_eq!(failures, 0);
    desired.unwrap();

    let binding = &h.scheduler.bindings()[0];
    assert_eq!(
        h.plant.value(&h.device(1), DeviceField::ProductionRate),
        Some(NodeValue::Int(80))
    );
    assert_eq!(reported_rate(&h), Some(80));
    assert_eq!(binding.last_reported_production_rate().await, 80);
    assert_eq!(h.scheduler.agent().reconcile_rate(binding).await.unwrap(), None);

    // The tick's 30 landed before the callback's 80
    let rates: Vec<_> = h
        .hub
        .reported_updates(ID)
        .iter()
        .filter_map(|patch| patch.get(PRODUCTION_RATE_PROPERTY).copied())
        .collect();
    assert_eq!(rates[rates.len() - 2..], [30, 80]);
}

#[tokio::test]
async fn test_emergency_stop_via_method() {
    let h = Harness::new(1, 1).bind().await;

    let response = h.hub.invoke_method(ID, "EmergencyStop").await.unwrap();

    assert!(response.is_ack());
    assert_eq!(
        h.plant.value(&h.device(1), DeviceField::DeviceError),
        Some(NodeValue::Int(1))
    );
    assert_eq!(
        h.plant.value(&h.device(1), DeviceField::ProductionStatus),
        Some(NodeValue::Int(0))
    );

    h.hub.invoke_method(ID, "ResetErrorStatus").await.unwrap();
    assert_eq!(
        h.plant.value(&h.device(1), DeviceField::DeviceError),
        Some(NodeValue::Int(0))
    );
}

#[tokio::test]
async fn test_unknown_method_acknowledged_without_forwarding() {
    let h = Harness::new(1, 1).bind().await;
    h.plant.clear_operations();

    let response = h.hub.invoke_method(ID, "Reboot").await.unwrap();

    assert!(response.is_ack());
    assert!(!h
        .plant
        .operations()
        .iter()
        .any(|op| matches!(op, NodeOperation::Call(..))));
}

#[tokio::test]
async fn test_method_on_unreachable_device_fails() {
    let h = Harness::new(1, 1).bind().await;
    h.plant.set_offline(&h.device(1), true);

    let response = h.hub.invoke_method(ID, "EmergencyStop").await.unwrap();

    assert_eq!(response.status, METHOD_FAILED);
}

#[tokio::test]
async fn test_quality_rule_lowers_device_rate() {
    let h = Harness::new(1, 1);
    h.hub.seed_desired(ID, PRODUCTION_RATE_PROPERTY, 50);
    let h = h.bind().await;
    let rule = DecreaseProductionRateUseCase::new(Arc::new(h.hub.clone()));

    let body = r#"{"WindowEndTime":"2024-05-01T10:05:00Z","ConnectionDeviceId":"device-1","GoodCount":80.0,"TotalVolume":100.0,"ProcentOfGoodProduction":80.0}"#;
    assert_eq!(rule.handle_message(body).await, MessageDisposition::Complete);

    assert_eq!(h.hub.desired(ID).get(PRODUCTION_RATE_PROPERTY), Some(&40));
    assert_eq!(
        h.plant.value(&h.device(1), DeviceField::ProductionRate),
        Some(NodeValue::Int(40))
    );
    assert_eq!(reported_rate(&h), Some(40));
}

#[tokio::test]
async fn test_error_burst_rule_stops_device() {
    let h = Harness::new(2, 2).bind().await;
    let rule = InvokeEmergencyStopUseCase::new(Arc::new(h.hub.clone()));

    let body = r#"{"WindowEndTime":"2024-05-01T10:05:00Z","ConnectionDeviceId":"device-2","OccuredErrors":4.0}"#;
    assert_eq!(rule.handle_message(body).await, MessageDisposition::Complete);

    assert_eq!(
        h.plant.value(&h.device(2), DeviceField::DeviceError),
        Some(NodeValue::Int(1))
    );
    assert_eq!(
        h.plant.value(&h.device(1), DeviceField::DeviceError),
        Some(NodeValue::Int(0))
    );

    // The error cycle then reports the stop like any other error
    h.scheduler.tick(Cycle::Error).await;
    assert_eq!(h.error_events("device-2").len(), 1);
    assert_eq!(h.alerts.sent().len(), 1);
}
