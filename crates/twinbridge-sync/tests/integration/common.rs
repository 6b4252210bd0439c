//! Shared test helpers for fleet integration tests
//!
//! Builds a [`FleetScheduler`] over a [`SimulatedPlant`] and an
//! [`InMemoryTwinHub`], with an alert gateway that records every alert.

use std::sync::{Arc, Mutex};

use serde_json::Value;
use twinbridge_core::config::{Config, ConfigBuilder};
use twinbridge_core::domain::{DeviceConnectionString, DeviceName};
use twinbridge_core::ports::{EventMessage, IAlertGateway};
use twinbridge_sim::{connection_string, InMemoryTwinHub, SimulatedPlant};
use twinbridge_sync::FleetScheduler;

pub const ENDPOINT: &str = "opc.tcp://localhost:4840/";

/// Alert gateway double
#[derive(Default)]
pub struct RecordingAlerts {
    sent: Mutex<Vec<String>>,
}

impl RecordingAlerts {
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl IAlertGateway for RecordingAlerts {
    async fn send_alert(&self, body: &str) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(body.to_string());
        Ok(())
    }
}

pub struct Harness {
    pub plant: SimulatedPlant,
    pub hub: InMemoryTwinHub,
    pub alerts: Arc<RecordingAlerts>,
    pub scheduler: FleetScheduler,
    pub config: Config,
}

impl Harness {
    /// A plant with `devices` devices and `connections` connection strings
    pub fn new(devices: usize, connections: usize) -> Self {
        let mut builder = ConfigBuilder::new()
            .server_endpoint(ENDPOINT)
            .polling_telemetry_interval_ms(1000)
            .polling_error_interval_ms(1000)
            .polling_rate_interval_ms(1000);
        for i in 1..=connections {
            builder = builder.device_connection_string(connection_string(i));
        }
        let config = builder.build();

        let plant = SimulatedPlant::new(
            &config.server.namespace_prefix,
            &config.server.browse_root,
            devices,
        );
        let hub = InMemoryTwinHub::new();
        let alerts = Arc::new(RecordingAlerts::default());
        let scheduler = FleetScheduler::new(
            &config,
            Arc::new(plant.clone()),
            Arc::new(hub.clone()),
            alerts.clone(),
        );

        Self {
            plant,
            hub,
            alerts,
            scheduler,
            config,
        }
    }

    pub fn devices(&self) -> Vec<DeviceName> {
        self.plant.devices().to_vec()
    }

    pub fn connections(&self) -> Vec<DeviceConnectionString> {
        self.config.device_connections().unwrap()
    }

    pub fn device(&self, index: usize) -> DeviceName {
        self.plant.devices()[index - 1].clone()
    }

    /// Binds every plant device, expecting success
    pub async fn bind(mut self) -> Self {
        let devices = self.devices();
        let connections = self.connections();
        self.scheduler
            .bind_all(devices, connections)
            .await
            .expect("bind_all failed");
        self
    }

    /// Events published for `device_id` that carry an `errorName`
    pub fn error_events(&self, device_id: &str) -> Vec<Value> {
        self.hub
            .events(device_id)
            .iter()
            .map(body)
            .filter(|v| v.get("errorName").is_some())
            .collect()
    }

    /// Events published for `device_id` that carry telemetry
    pub fn telemetry_events(&self, device_id: &str) -> Vec<Value> {
        self.hub
            .events(device_id)
            .iter()
            .map(body)
            .filter(|v| v.get("workorderId").is_some())
            .collect()
    }
}

pub fn body(event: &EventMessage) -> Value {
    serde_json::from_slice(&event.body).expect("event body is JSON")
}
