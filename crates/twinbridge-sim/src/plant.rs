//! Simulated node-protocol server
//!
//! Exposes `Device 1..N` under `<namespace_prefix>=Device <i>`, each with the
//! nine standard fields. Value nodes hold a [`NodeValue`]; `EmergencyStop`
//! and `ResetErrorStatus` are remote procedures acting on `DeviceError`.
//!
//! All sessions opened from one [`SimulatedPlant`] share the same node table.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, bail};
use tracing::debug;

use twinbridge_core::domain::{
    DeviceCommand, DeviceField, DeviceName, ErrorFlag, NodeInfo, NodePath, NodeValue,
};
use twinbridge_core::ports::{INodeClient, INodeSession};

/// Fields holding values; the remaining fields are procedures
const VALUE_FIELDS: [DeviceField; 7] = [
    DeviceField::ProductionStatus,
    DeviceField::WorkorderId,
    DeviceField::GoodCount,
    DeviceField::BadCount,
    DeviceField::Temperature,
    DeviceField::DeviceError,
    DeviceField::ProductionRate,
];

/// One recorded interaction with the plant
#[derive(Debug, Clone, PartialEq)]
pub enum NodeOperation {
    Read(String),
    Write(String, NodeValue),
    /// Object path, method path
    Call(String, String),
}

#[derive(Default)]
struct PlantState {
    nodes: BTreeMap<String, NodeValue>,
    offline: HashSet<DeviceName>,
    failing_reads: HashSet<String>,
    failing_endpoints: HashSet<String>,
    operations: Vec<NodeOperation>,
    connections: usize,
    ticks: u64,
}

struct Plant {
    namespace_prefix: String,
    browse_root: String,
    devices: Vec<DeviceName>,
    state: Mutex<PlantState>,
}

impl Plant {
    fn lock(&self) -> MutexGuard<'_, PlantState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn root(&self, device: &DeviceName) -> NodePath {
        NodePath::device_root(&self.namespace_prefix, device)
    }

    fn path(&self, device: &DeviceName, field: DeviceField) -> String {
        self.root(device).field(field).as_str().to_string()
    }

    /// The device a path belongs to, if any
    fn owner(&self, path: &str) -> Option<&DeviceName> {
        self.devices.iter().find(|device| {
            let root = self.root(device);
            path == root.as_str()
                || path
                    .strip_prefix(root.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }

    fn ensure_online(&self, state: &PlantState, path: &str) -> anyhow::Result<()> {
        match self.owner(path) {
            Some(device) if state.offline.contains(device) => {
                bail!("device '{device}' is not responding")
            }
            _ => Ok(()),
        }
    }
}

/// In-memory node-protocol server
#[derive(Clone)]
pub struct SimulatedPlant {
    inner: Arc<Plant>,
}

impl SimulatedPlant {
    /// Creates a plant with `device_count` devices named `Device 1..N`
    pub fn new(namespace_prefix: &str, browse_root: &str, device_count: usize) -> Self {
        let devices: Vec<DeviceName> = (1..=device_count)
            .filter_map(|i| DeviceName::new(format!("Device {i}")).ok())
            .collect();

        let plant = Plant {
            namespace_prefix: namespace_prefix.to_string(),
            browse_root: browse_root.to_string(),
            devices,
            state: Mutex::new(PlantState::default()),
        };

        {
            let mut state = plant.lock();
            for (i, device) in plant.devices.iter().enumerate() {
                let initial = [
                    (DeviceField::ProductionStatus, NodeValue::Int(1)),
                    (DeviceField::WorkorderId, NodeValue::Text(format!("wo-{:04}", i + 1))),
                    (DeviceField::GoodCount, NodeValue::Int(0)),
                    (DeviceField::BadCount, NodeValue::Int(0)),
                    (DeviceField::Temperature, NodeValue::Float(20.0)),
                    (DeviceField::DeviceError, NodeValue::Int(0)),
                    (DeviceField::ProductionRate, NodeValue::Int(0)),
                ];
                for (field, value) in initial {
                    state.nodes.insert(plant.path(device, field), value);
                }
            }
        }

        Self {
            inner: Arc::new(plant),
        }
    }

    /// Devices exposed by the plant, in browse order
    pub fn devices(&self) -> &[DeviceName] {
        &self.inner.devices
    }

    /// Current value of a device node
    pub fn value(&self, device: &DeviceName, field: DeviceField) -> Option<NodeValue> {
        self.inner
            .lock()
            .nodes
            .get(&self.inner.path(device, field))
            .cloned()
    }

    /// Overwrites a device node, as the device itself would
    pub fn set_value(&self, device: &DeviceName, field: DeviceField, value: impl Into<NodeValue>) {
        let path = self.inner.path(device, field);
        self.inner.lock().nodes.insert(path, value.into());
    }

    /// Makes every node operation on `device` fail
    pub fn set_offline(&self, device: &DeviceName, offline: bool) {
        let mut state = self.inner.lock();
        if offline {
            state.offline.insert(device.clone());
        } else {
            state.offline.remove(device);
        }
    }

    /// Makes reads of one node fail
    pub fn fail_reads(&self, device: &DeviceName, field: DeviceField, fail: bool) {
        let path = self.inner.path(device, field);
        let mut state = self.inner.lock();
        if fail {
            state.failing_reads.insert(path);
        } else {
            state.failing_reads.remove(&path);
        }
    }

    /// Makes connection attempts to `endpoint` fail
    pub fn fail_endpoint(&self, endpoint: &str, fail: bool) {
        let mut state = self.inner.lock();
        if fail {
            state.failing_endpoints.insert(endpoint.to_string());
        } else {
            state.failing_endpoints.remove(endpoint);
        }
    }

    /// Every recorded operation, oldest first
    pub fn operations(&self) -> Vec<NodeOperation> {
        self.inner.lock().operations.clone()
    }

    pub fn clear_operations(&self) {
        self.inner.lock().operations.clear();
    }

    /// Number of successful connections
    pub fn connections(&self) -> usize {
        self.inner.lock().connections
    }

    /// Moves every running device one production step forward
    ///
    /// Good parts grow with the production rate, every fifth step yields a bad
    /// part and the temperature oscillates with the load.
    pub fn advance(&self) {
        let mut state = self.inner.lock();
        state.ticks += 1;
        let ticks = state.ticks;

        for device in &self.inner.devices {
            if state.offline.contains(device) {
                continue;
            }
            let get = |state: &PlantState, field| {
                state
                    .nodes
                    .get(&self.inner.path(device, field))
                    .and_then(|v| v.as_i64().ok())
                    .unwrap_or(0)
            };
            if get(&*state, DeviceField::ProductionStatus) != 1 {
                continue;
            }
            let rate = get(&*state, DeviceField::ProductionRate).max(0);
            let good = get(&*state, DeviceField::GoodCount) + 1 + rate / 10;
            let bad = get(&*state, DeviceField::BadCount) + i64::from(ticks % 5 == 0);
            let temperature = 20.0 + (ticks % 10) as f64 * 0.5 + rate as f64 * 0.1;

            for (field, value) in [
                (DeviceField::GoodCount, NodeValue::Int(good)),
                (DeviceField::BadCount, NodeValue::Int(bad)),
                (DeviceField::Temperature, NodeValue::Float(temperature)),
            ] {
                state.nodes.insert(self.inner.path(device, field), value);
            }
        }
    }
}

#[async_trait::async_trait]
impl INodeClient for SimulatedPlant {
    async fn connect(&self, endpoint: &str) -> anyhow::Result<Arc<dyn INodeSession>> {
        let mut state = self.inner.lock();
        if state.failing_endpoints.contains(endpoint) {
            bail!("connection to {endpoint} refused");
        }
        state.connections += 1;
        debug!(endpoint, "Simulated plant session opened");
        Ok(Arc::new(PlantSession {
            plant: self.inner.clone(),
        }))
    }
}

/// A session on the simulated plant
struct PlantSession {
    plant: Arc<Plant>,
}

#[async_trait::async_trait]
impl INodeSession for PlantSession {
    async fn read_node(&self, path: &NodePath) -> anyhow::Result<NodeValue> {
        let mut state = self.plant.lock();
        state.operations.push(NodeOperation::Read(path.to_string()));
        self.plant.ensure_online(&state, path.as_str())?;
        if state.failing_reads.contains(path.as_str()) {
            bail!("read of {path} timed out");
        }
        state
            .nodes
            .get(path.as_str())
            .cloned()
            .ok_or_else(|| anyhow!("unknown node {path}"))
    }

    async fn write_node(&self, path: &NodePath, value: NodeValue) -> anyhow::Result<()> {
        let mut state = self.plant.lock();
        state
            .operations
            .push(NodeOperation::Write(path.to_string(), value.clone()));
        self.plant.ensure_online(&state, path.as_str())?;
        match state.nodes.get_mut(path.as_str()) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => bail!("unknown node {path}"),
        }
    }

    async fn call_method(
        &self,
        object: &NodePath,
        method: &NodePath,
    ) -> anyhow::Result<Vec<NodeValue>> {
        let mut state = self.plant.lock();
        state
            .operations
            .push(NodeOperation::Call(object.to_string(), method.to_string()));
        self.plant.ensure_online(&state, method.as_str())?;

        let device = self
            .plant
            .devices
            .iter()
            .find(|d| self.plant.root(d) == *object)
            .ok_or_else(|| anyhow!("unknown object {object}"))?
            .clone();
        let command = DeviceCommand::ALL
            .into_iter()
            .find(|c| self.plant.path(&device, c.field()) == method.as_str())
            .ok_or_else(|| anyhow!("unknown method {method}"))?;

        let error_path = self.plant.path(&device, DeviceField::DeviceError);
        match command {
            DeviceCommand::EmergencyStop => {
                let code = state
                    .nodes
                    .get(&error_path)
                    .and_then(|v| v.as_i64().ok())
                    .unwrap_or(0);
                let stopped = code | i64::from(ErrorFlag::EmergencyStop.bit());
                state.nodes.insert(error_path, NodeValue::Int(stopped));
                state.nodes.insert(
                    self.plant.path(&device, DeviceField::ProductionStatus),
                    NodeValue::Int(0),
                );
            }
            DeviceCommand::ResetErrorStatus => {
                state.nodes.insert(error_path, NodeValue::Int(0));
            }
        }
        Ok(Vec::new())
    }

    async fn browse_children(&self, root: &NodePath) -> anyhow::Result<Vec<NodeInfo>> {
        if root.as_str() == self.plant.browse_root {
            return Ok(self
                .plant
                .devices
                .iter()
                .map(|device| NodeInfo {
                    path: self.plant.root(device),
                    display_name: device.to_string(),
                })
                .collect());
        }

        if let Some(device) = self.plant.devices.iter().find(|d| self.plant.root(d) == *root) {
            return Ok(VALUE_FIELDS
                .iter()
                .map(|field| NodeInfo {
                    path: root.field(*field),
                    display_name: field.to_string(),
                })
                .chain(DeviceCommand::ALL.iter().map(|command| NodeInfo {
                    path: self.plant.root(device).field(command.field()),
                    display_name: command.to_string(),
                }))
                .collect());
        }

        bail!("unknown node {root}")
    }
}
