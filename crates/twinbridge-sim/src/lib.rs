//! twinbridge Sim - In-memory backends for the node-protocol and twin ports
//!
//! Provides:
//! - [`SimulatedPlant`]: a node-protocol server exposing `Device 1..N`
//! - [`InMemoryTwinHub`]: a twin hub with service-side registry access
//!
//! Both record every interaction and accept injected failures, so they serve
//! the daemon's simulation mode and the end-to-end tests alike.

pub mod hub;
pub mod plant;

pub use hub::{InMemoryTwinHub, ReportedUpdateHold};
pub use plant::{NodeOperation, SimulatedPlant};

/// Connection string of the `index`-th simulated device (1-based)
///
/// The device id on the hub is `device-<index>`.
pub fn connection_string(index: usize) -> String {
    format!(
        "HostName=simulated-hub.azure-devices.net;DeviceId=device-{index};SharedAccessKey=c2ltdWxhdGVkLWtleQ=="
    )
}
