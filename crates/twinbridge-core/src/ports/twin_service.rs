//! Twin service port (driven/secondary port)
//!
//! This module defines the interface to the cloud device-twin service: the
//! desired/reported property sets of one device, its remote-invocable methods
//! and its device-to-cloud event stream.
//!
//! ## Design Notes
//!
//! - Property values exchanged by this system are integers, so property sets
//!   are modelled as `BTreeMap<String, i64>`.
//! - Callbacks are trait objects registered on the session; the adapter calls
//!   them from its own task whenever the cloud side changes something.

use std::collections::BTreeMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::domain::newtypes::DeviceConnectionString;

/// Reported/desired property name holding the device error bitmask
pub const DEVICE_ERROR_PROPERTY: &str = "DeviceError";

/// Reported/desired property name holding the production rate
pub const PRODUCTION_RATE_PROPERTY: &str = "ProductionRate";

/// A set of twin properties
pub type PropertySet = BTreeMap<String, i64>;

// ============================================================================
// Method invocation DTOs
// ============================================================================

/// Status code acknowledging a method invocation
pub const METHOD_ACK: i32 = 0;

/// Status code reporting that a method could not be forwarded to the device
pub const METHOD_FAILED: i32 = 500;

/// A remote method invocation arriving from the twin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodRequest {
    /// Method name as invoked by the cloud
    pub name: String,
    /// Raw JSON payload, if any
    pub payload: Option<String>,
}

impl MethodRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: None,
        }
    }
}

/// Response returned to the twin for a method invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodResponse {
    pub status: i32,
}

impl MethodResponse {
    /// Acknowledgement response
    #[must_use]
    pub const fn ack() -> Self {
        Self { status: METHOD_ACK }
    }

    /// Failure response
    #[must_use]
    pub const fn failed() -> Self {
        Self {
            status: METHOD_FAILED,
        }
    }

    #[must_use]
    pub const fn is_ack(&self) -> bool {
        self.status == METHOD_ACK
    }
}

// ============================================================================
// EventMessage
// ============================================================================

/// A device-to-cloud event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMessage {
    pub message_id: Uuid,
    pub body: Vec<u8>,
    pub content_type: String,
    pub content_encoding: String,
}

impl EventMessage {
    /// Builds a UTF-8 JSON event from a serializable payload
    ///
    /// # Errors
    /// Returns an error if the payload cannot be serialized
    pub fn json<T: serde::Serialize + ?Sized>(payload: &T) -> serde_json::Result<Self> {
        Ok(Self {
            message_id: Uuid::new_v4(),
            body: serde_json::to_vec(payload)?,
            content_type: "application/json".to_string(),
            content_encoding: "utf-8".to_string(),
        })
    }

    /// The body as text (lossy)
    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

// ============================================================================
// Callback traits
// ============================================================================

/// Receives desired-property patches pushed by the twin
#[async_trait::async_trait]
pub trait IDesiredPropertyHandler: Send + Sync {
    async fn on_desired_properties(&self, patch: PropertySet);
}

/// Handles one remote method invocation
#[async_trait::async_trait]
pub trait IMethodHandler: Send + Sync {
    async fn handle(&self, request: MethodRequest) -> MethodResponse;
}

// ============================================================================
// Service and session traits
// ============================================================================

/// Port trait for opening device twin sessions
#[async_trait::async_trait]
pub trait ITwinService: Send + Sync {
    /// Opens the twin session identified by `connection`
    async fn open(
        &self,
        connection: &DeviceConnectionString,
    ) -> anyhow::Result<Arc<dyn ITwinSession>>;
}

/// An open session with one device twin
#[async_trait::async_trait]
pub trait ITwinSession: Send + Sync {
    /// Current reported property set
    async fn get_reported_properties(&self) -> anyhow::Result<PropertySet>;

    /// Current desired property set
    async fn get_desired_properties(&self) -> anyhow::Result<PropertySet>;

    /// Merges `patch` into the reported property set
    async fn update_reported_properties(&self, patch: &PropertySet) -> anyhow::Result<()>;

    /// Registers the callback fired on desired-property changes
    async fn on_desired_property_changed(
        &self,
        handler: Arc<dyn IDesiredPropertyHandler>,
    ) -> anyhow::Result<()>;

    /// Registers the handler for the method called `name`
    async fn register_method_handler(
        &self,
        name: &str,
        handler: Arc<dyn IMethodHandler>,
    ) -> anyhow::Result<()>;

    /// Registers the handler for methods without a dedicated handler
    async fn register_default_method_handler(
        &self,
        handler: Arc<dyn IMethodHandler>,
    ) -> anyhow::Result<()>;

    /// Publishes a device-to-cloud event
    async fn send_event(&self, event: &EventMessage) -> anyhow::Result<()>;
}
