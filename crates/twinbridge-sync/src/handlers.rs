//! Twin callbacks routed back into the [`SyncAgent`]
//!
//! Registered on each twin session during [`SyncAgent::initialize`]. Each
//! handler owns a clone of the agent and the binding it serves.

use std::sync::Arc;

use tracing::{info, warn};

use twinbridge_core::ports::{
    IDesiredPropertyHandler, IMethodHandler, MethodRequest, MethodResponse, PropertySet,
    PRODUCTION_RATE_PROPERTY,
};

use crate::agent::SyncAgent;
use crate::binding::DeviceBinding;

/// Applies desired-property patches pushed by the twin
pub struct DesiredPropertiesHandler {
    agent: SyncAgent,
    binding: Arc<DeviceBinding>,
}

impl DesiredPropertiesHandler {
    pub fn new(agent: SyncAgent, binding: Arc<DeviceBinding>) -> Self {
        Self { agent, binding }
    }
}

#[async_trait::async_trait]
impl IDesiredPropertyHandler for DesiredPropertiesHandler {
    async fn on_desired_properties(&self, patch: PropertySet) {
        let device = self.binding.name();
        let Some(&rate) = patch.get(PRODUCTION_RATE_PROPERTY) else {
            info!(
                device = %device,
                keys = ?patch.keys().collect::<Vec<_>>(),
                "Desired properties carry no known key, ignoring"
            );
            return;
        };

        if let Err(e) = self.agent.on_desired_rate_changed(&self.binding, rate).await {
            warn!(device = %device, rate, error = %e, "Failed to apply desired production rate");
        }
    }
}

/// Answers remote method invocations, named or not
pub struct CommandHandler {
    agent: SyncAgent,
    binding: Arc<DeviceBinding>,
}

impl CommandHandler {
    pub fn new(agent: SyncAgent, binding: Arc<DeviceBinding>) -> Self {
        Self { agent, binding }
    }
}

#[async_trait::async_trait]
impl IMethodHandler for CommandHandler {
    async fn handle(&self, request: MethodRequest) -> MethodResponse {
        self.agent.on_command(&self.binding, &request.name).await
    }
}
