//! Integration tests for the running fleet
//!
//! Uses paused time so the one-second cycles advance instantly.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use twinbridge_core::domain::DeviceField;
use twinbridge_core::ports::DEVICE_ERROR_PROPERTY;

use crate::common::Harness;

#[tokio::test(start_paused = true)]
async fn test_cycles_tick_until_cancelled() {
    let h = Harness::new(2, 2).bind().await;
    let plant = h.plant.clone();
    let hub = h.hub.clone();
    let scheduler = Arc::new(h.scheduler);
    let shutdown = CancellationToken::new();

    let handle = tokio::spawn({
        let scheduler = scheduler.clone();
        let shutdown = shutdown.clone();
        async move { scheduler.run(shutdown).await }
    });

    tokio::time::sleep(Duration::from_millis(1500)).await;
    plant.set_value(&plant.devices()[1], DeviceField::DeviceError, 8);
    tokio::time::sleep(Duration::from_millis(2000)).await;
    shutdown.cancel();
    handle.await.unwrap();

    for id in ["device-1", "device-2"] {
        let telemetry = hub
            .events(id)
            .iter()
            .filter(|e| e.body_text().contains("workorderId"))
            .count();
        assert!((3..=4).contains(&telemetry), "{id}: {telemetry} telemetry events");
    }
    assert_eq!(hub.reported("device-2").get(DEVICE_ERROR_PROPERTY), Some(&8));
    assert_eq!(h.alerts.sent().len(), 1);

    // Nothing runs after shutdown
    let published = hub.events("device-1").len();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(hub.events("device-1").len(), published);
}

#[tokio::test(start_paused = true)]
async fn test_run_with_no_bindings_stops_on_cancel() {
    let h = Harness::new(0, 0).bind().await;
    let shutdown = CancellationToken::new();
    shutdown.cancel();

    tokio::time::timeout(Duration::from_secs(1), h.scheduler.run(shutdown))
        .await
        .expect("run should return once cancelled");
}
