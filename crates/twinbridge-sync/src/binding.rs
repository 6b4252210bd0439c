//! Device binding - one physical device paired with its twin
//!
//! A [`DeviceBinding`] is created once per discovered device at fleet
//! initialization and shared (via `Arc`) between the polling cycles and the
//! twin callbacks for the rest of the run.
//!
//! The two cached scalars hold what the cloud currently believes, not what the
//! device currently has. They change only after a successful twin push (or the
//! initial twin read). Each sits behind its own async mutex: the error code is
//! touched by the error cycle alone, the production rate by the rate cycle and
//! the desired-property callback, which must not interleave.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use twinbridge_core::domain::{DeviceField, DeviceName, NodePath, NodeValue};
use twinbridge_core::ports::{INodeSession, ITwinSession};

use crate::SyncError;

pub struct DeviceBinding {
    name: DeviceName,
    root: NodePath,
    physical: Arc<dyn INodeSession>,
    twin: Arc<dyn ITwinSession>,
    last_error_code: Mutex<i64>,
    last_production_rate: Mutex<i64>,
}

impl DeviceBinding {
    /// Creates a binding whose node root is `<namespace_prefix>=<name>`
    pub fn new(
        name: DeviceName,
        namespace_prefix: &str,
        physical: Arc<dyn INodeSession>,
        twin: Arc<dyn ITwinSession>,
    ) -> Self {
        let root = NodePath::device_root(namespace_prefix, &name);
        Self {
            name,
            root,
            physical,
            twin,
            last_error_code: Mutex::new(0),
            last_production_rate: Mutex::new(0),
        }
    }

    pub fn name(&self) -> &DeviceName {
        &self.name
    }

    /// Root node of the device
    pub fn root(&self) -> &NodePath {
        &self.root
    }

    /// Address of one of the device's nodes
    pub fn node(&self, field: DeviceField) -> NodePath {
        self.root.field(field)
    }

    pub fn physical(&self) -> &Arc<dyn INodeSession> {
        &self.physical
    }

    pub fn twin(&self) -> &Arc<dyn ITwinSession> {
        &self.twin
    }

    /// Reads one node of the device
    ///
    /// # Errors
    /// Returns [`SyncError::Transient`] if the node cannot be read
    pub async fn read_field(&self, field: DeviceField) -> Result<NodeValue, SyncError> {
        self.physical
            .read_node(&self.node(field))
            .await
            .map_err(|e| SyncError::transient(&self.name, format!("read {field}"), e))
    }

    /// Writes one node of the device
    ///
    /// # Errors
    /// Returns [`SyncError::Transient`] if the node cannot be written
    pub async fn write_field(&self, field: DeviceField, value: NodeValue) -> Result<(), SyncError> {
        self.physical
            .write_node(&self.node(field), value)
            .await
            .map_err(|e| SyncError::transient(&self.name, format!("write {field}"), e))
    }

    /// Last error code the cloud has seen
    pub async fn last_reported_error_code(&self) -> i64 {
        *self.last_error_code.lock().await
    }

    /// Last production rate the cloud has seen
    pub async fn last_reported_production_rate(&self) -> i64 {
        *self.last_production_rate.lock().await
    }

    /// Exclusive access to the cached error code
    pub(crate) async fn error_code(&self) -> MutexGuard<'_, i64> {
        self.last_error_code.lock().await
    }

    /// Exclusive access to the cached production rate
    ///
    /// Held for the whole read-push-update sequence of a rate operation.
    pub(crate) async fn production_rate(&self) -> MutexGuard<'_, i64> {
        self.last_production_rate.lock().await
    }
}

impl fmt::Debug for DeviceBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceBinding")
            .field("name", &self.name)
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}
