//! Fleet scheduler - binds the discovered devices and drives the polling cycles
//!
//! ## Flow
//!
//! ```text
//! bind_all ──→ connect node session + open twin ──→ SyncAgent::initialize   (sequential, per device)
//!
//! run ──┬──→ telemetry cycle ──→ publish_telemetry  ─┐
//!       ├──→ error cycle     ──→ reconcile_error    ─┼─ each: all bindings, then sleep
//!       └──→ rate cycle      ──→ reconcile_rate     ─┘
//! ```
//!
//! The binding list is fixed once `bind_all` returns. A failure on one device
//! during a tick is logged and the cycle moves on to the next device; the
//! failed operation is retried on the next tick. All three cycles stop when the
//! shared [`CancellationToken`] is cancelled.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use twinbridge_core::config::{Config, PollingConfig, ServerConfig};
use twinbridge_core::domain::{DeviceConnectionString, DeviceName};
use twinbridge_core::ports::{IAlertGateway, INodeClient, ITwinService};

use crate::agent::SyncAgent;
use crate::binding::DeviceBinding;
use crate::SyncError;

// ============================================================================
// Cycle
// ============================================================================

/// The three independent polling cycles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cycle {
    Telemetry,
    Error,
    Rate,
}

impl Cycle {
    pub const ALL: [Cycle; 3] = [Cycle::Telemetry, Cycle::Error, Cycle::Rate];

    pub const fn name(self) -> &'static str {
        match self {
            Cycle::Telemetry => "telemetry",
            Cycle::Error => "error",
            Cycle::Rate => "rate",
        }
    }

    /// Sleep between two ticks of this cycle
    pub fn interval(self, polling: &PollingConfig) -> Duration {
        match self {
            Cycle::Telemetry => polling.telemetry_interval(),
            Cycle::Error => polling.error_interval(),
            Cycle::Rate => polling.rate_interval(),
        }
    }

    async fn run_once(self, agent: &SyncAgent, binding: &DeviceBinding) -> Result<(), SyncError> {
        match self {
            Cycle::Telemetry => agent.publish_telemetry(binding).await.map(|_| ()),
            Cycle::Error => agent.reconcile_error(binding).await.map(|_| ()),
            Cycle::Rate => agent.reconcile_rate(binding).await.map(|_| ()),
        }
    }
}

/// One pass of `cycle` over every binding
///
/// # Returns
/// The number of devices whose operation failed
async fn tick(cycle: Cycle, agent: &SyncAgent, bindings: &[Arc<DeviceBinding>]) -> usize {
    let mut failures = 0;
    for binding in bindings {
        if let Err(e) = cycle.run_once(agent, binding).await {
            failures += 1;
            warn!(
                cycle = cycle.name(),
                device = %binding.name(),
                error = %e,
                "Device operation failed, retrying next tick"
            );
        }
    }
    failures
}

async fn run_cycle(
    cycle: Cycle,
    interval: Duration,
    agent: SyncAgent,
    bindings: Arc<[Arc<DeviceBinding>]>,
    shutdown: CancellationToken,
) {
    info!(
        cycle = cycle.name(),
        interval_ms = interval.as_millis() as u64,
        devices = bindings.len(),
        "Starting cycle"
    );

    loop {
        tokio::select! {
            _ = tick(cycle, &agent, &bindings) => {}
            _ = shutdown.cancelled() => break,
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.cancelled() => break,
        }
    }

    info!(cycle = cycle.name(), "Cycle stopped");
}

// ============================================================================
// FleetScheduler
// ============================================================================

/// Owns the bound devices and drives the three polling cycles
pub struct FleetScheduler {
    node_client: Arc<dyn INodeClient>,
    twin_service: Arc<dyn ITwinService>,
    agent: SyncAgent,
    server: ServerConfig,
    polling: PollingConfig,
    bindings: Vec<Arc<DeviceBinding>>,
}

impl FleetScheduler {
    /// Creates a scheduler with no bound devices
    ///
    /// # Arguments
    /// * `config` - Server and polling settings are copied out of it
    /// * `node_client` - Opens one node-protocol session per device
    /// * `twin_service` - Opens one twin session per connection string
    /// * `alerts` - Receives alerts for newly raised error flags
    pub fn new(
        config: &Config,
        node_client: Arc<dyn INodeClient>,
        twin_service: Arc<dyn ITwinService>,
        alerts: Arc<dyn IAlertGateway>,
    ) -> Self {
        Self {
            node_client,
            twin_service,
            agent: SyncAgent::new(alerts),
            server: config.server.clone(),
            polling: config.polling.clone(),
            bindings: Vec::new(),
        }
    }

    /// Pairs each discovered device with the connection string at the same
    /// position and initializes it
    ///
    /// Devices that fail to connect or initialize are logged and excluded.
    /// Surplus connection strings are ignored.
    ///
    /// # Errors
    /// Returns [`SyncError::BindingConfiguration`] before touching any device
    /// when there are fewer connection strings than devices
    pub async fn bind_all(
        &mut self,
        devices: Vec<DeviceName>,
        connections: Vec<DeviceConnectionString>,
    ) -> Result<&[Arc<DeviceBinding>], SyncError> {
        if devices.len() > connections.len() {
            return Err(SyncError::BindingConfiguration {
                devices: devices.len(),
                connections: connections.len(),
            });
        }

        info!(devices = devices.len(), "Binding devices");
        for (device, connection) in devices.into_iter().zip(connections) {
            match self.bind_one(device, &connection).await {
                Ok(binding) => self.bindings.push(binding),
                Err(e) => error!(error = %e, "Device excluded from this run"),
            }
        }
        info!(active = self.bindings.len(), "Fleet bound");

        Ok(&self.bindings)
    }

    async fn bind_one(
        &self,
        device: DeviceName,
        connection: &DeviceConnectionString,
    ) -> Result<Arc<DeviceBinding>, SyncError> {
        let physical = self
            .node_client
            .connect(&self.server.endpoint)
            .await
            .map_err(|e| SyncError::DeviceInitialization {
                device: device.clone(),
                source: e.context(format!("connect to {}", self.server.endpoint)),
            })?;
        let twin = self
            .twin_service
            .open(connection)
            .await
            .map_err(|e| SyncError::DeviceInitialization {
                device: device.clone(),
                source: e.context(format!("open twin {}", connection.device_id())),
            })?;

        let binding = Arc::new(DeviceBinding::new(
            device,
            &self.server.namespace_prefix,
            physical,
            twin,
        ));
        self.agent.initialize(&binding).await?;
        Ok(binding)
    }

    /// Active bindings, in discovery order
    pub fn bindings(&self) -> &[Arc<DeviceBinding>] {
        &self.bindings
    }

    pub fn agent(&self) -> &SyncAgent {
        &self.agent
    }

    /// Runs a single pass of `cycle` over every binding
    ///
    /// # Returns
    /// The number of devices whose operation failed
    pub async fn tick(&self, cycle: Cycle) -> usize {
        tick(cycle, &self.agent, &self.bindings).await
    }

    /// Runs the three cycles concurrently until `shutdown` is cancelled
    pub async fn run(&self, shutdown: CancellationToken) {
        let bindings: Arc<[Arc<DeviceBinding>]> = self.bindings.clone().into();

        let handles: Vec<_> = Cycle::ALL
            .into_iter()
            .map(|cycle| {
                tokio::spawn(run_cycle(
                    cycle,
                    cycle.interval(&self.polling),
                    self.agent.clone(),
                    bindings.clone(),
                    shutdown.clone(),
                ))
            })
            .collect();

        for (cycle, handle) in Cycle::ALL.into_iter().zip(handles) {
            if let Err(e) = handle.await {
                error!(cycle = cycle.name(), error = %e, "Cycle task terminated abnormally");
            }
        }
    }
}
