//! twinbridge Sync - Device to twin synchronization engine
//!
//! Provides:
//! - Per-device bindings caching what the cloud last saw
//! - Telemetry publishing and error/rate reconciliation
//! - Desired-property and command callbacks from the twin
//! - A fleet scheduler driving three independent polling cycles
//!
//! ## Modules
//!
//! - [`binding`] - One physical device paired with its twin
//! - [`agent`] - Per-device read/compare/publish/apply operations
//! - [`handlers`] - Twin callbacks routed back into the agent
//! - [`scheduler`] - Fleet binding and the polling cycles

pub mod agent;
pub mod binding;
pub mod handlers;
pub mod scheduler;

pub use agent::SyncAgent;
pub use binding::DeviceBinding;
pub use scheduler::{Cycle, FleetScheduler};

use thiserror::Error;
use twinbridge_core::domain::{errors::DomainError, DeviceName};

/// Errors that can occur while binding or synchronizing devices
#[derive(Debug, Error)]
pub enum SyncError {
    /// Fewer connection strings than discovered devices
    #[error("{devices} devices discovered but only {connections} connection strings configured")]
    BindingConfiguration { devices: usize, connections: usize },

    /// A device could not be connected or initialized and is excluded from the run
    #[error("Device '{device}' failed to initialize: {source:#}")]
    DeviceInitialization {
        device: DeviceName,
        #[source]
        source: anyhow::Error,
    },

    /// A single node or twin call failed; the next tick tries again
    #[error("Device '{device}': {operation} failed: {source:#}")]
    Transient {
        device: DeviceName,
        operation: String,
        #[source]
        source: anyhow::Error,
    },

    /// The alert gateway could not deliver an alert
    #[error("Alert for device '{device}' was not delivered: {source:#}")]
    AlertDelivery {
        device: DeviceName,
        #[source]
        source: anyhow::Error,
    },

    /// A node held a value of an unexpected shape
    #[error("Invalid node value: {0}")]
    InvalidNodeValue(#[from] DomainError),
}

impl SyncError {
    pub(crate) fn transient(
        device: &DeviceName,
        operation: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        SyncError::Transient {
            device: device.clone(),
            operation: operation.into(),
            source: source.into(),
        }
    }

    /// Converts any per-operation failure raised during initialization
    pub(crate) fn into_initialization(self, device: &DeviceName) -> Self {
        let source = match self {
            SyncError::DeviceInitialization { .. } => return self,
            SyncError::Transient {
                operation, source, ..
            } => source.context(operation),
            SyncError::AlertDelivery { source, .. } => source,
            SyncError::InvalidNodeValue(e) => anyhow::Error::new(e),
            SyncError::BindingConfiguration { .. } => anyhow::Error::new(self),
        };
        SyncError::DeviceInitialization {
            device: device.clone(),
            source,
        }
    }
}
