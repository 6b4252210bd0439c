//! Device registry port (driven/secondary port)
//!
//! Service-side view of the twin hub used by the rule handlers: reading and
//! patching a device's desired properties and invoking its methods by device
//! identifier.

use super::twin_service::{MethodResponse, PropertySet};

/// Port trait for service-side twin management
#[async_trait::async_trait]
pub trait IDeviceRegistry: Send + Sync {
    /// Desired properties of a device, `None` when the device is unknown
    async fn get_desired_properties(&self, device_id: &str)
        -> anyhow::Result<Option<PropertySet>>;

    /// Sets one desired property on a device twin
    async fn update_desired_property(
        &self,
        device_id: &str,
        name: &str,
        value: i64,
    ) -> anyhow::Result<()>;

    /// Invokes a method on a device
    async fn invoke_method(&self, device_id: &str, method: &str)
        -> anyhow::Result<MethodResponse>;
}
