//! Sync agent - per-device read/compare/publish/apply operations
//!
//! The [`SyncAgent`] holds no per-device state of its own; everything mutable
//! lives in the [`DeviceBinding`] it is handed. One agent serves the whole
//! fleet and is cheap to clone into the cycle tasks and twin callbacks.
//!
//! ## Operations
//!
//! | Operation | Direction | Touches cache |
//! |---|---|---|
//! | [`initialize`](SyncAgent::initialize) | twin → device, device → twin | both |
//! | [`publish_telemetry`](SyncAgent::publish_telemetry) | device → twin (event) | no |
//! | [`reconcile_error`](SyncAgent::reconcile_error) | device → twin (event, alert, reported) | error code |
//! | [`reconcile_rate`](SyncAgent::reconcile_rate) | device → twin (reported) | production rate |
//! | [`on_desired_rate_changed`](SyncAgent::on_desired_rate_changed) | twin → device, device → twin | production rate |
//! | [`on_command`](SyncAgent::on_command) | twin → device (method call) | no |

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use twinbridge_core::domain::{
    DeviceCommand, DeviceField, DomainError, ErrorEvent, NodeValue, TelemetrySample,
};
use twinbridge_core::ports::{
    EventMessage, IAlertGateway, MethodResponse, PropertySet, DEVICE_ERROR_PROPERTY,
    PRODUCTION_RATE_PROPERTY,
};

use crate::binding::DeviceBinding;
use crate::handlers::{CommandHandler, DesiredPropertiesHandler};
use crate::SyncError;

#[derive(Clone)]
pub struct SyncAgent {
    alerts: Arc<dyn IAlertGateway>,
}

impl SyncAgent {
    pub fn new(alerts: Arc<dyn IAlertGateway>) -> Self {
        Self { alerts }
    }

    // ========================================================================
    // Initialization
    // ========================================================================

    /// Brings a freshly bound device into the active state
    ///
    /// 1. Reads the desired production rate (0 when absent) and writes it to the device
    /// 2. Reads the last reported error code (0 when absent)
    /// 3. Reports `{DeviceError, ProductionRate}` and seeds the binding's cache
    /// 4. Registers the desired-property callback, the two command handlers and
    ///    the default handler for unknown commands
    ///
    /// # Errors
    /// Any failure is returned as [`SyncError::DeviceInitialization`]; the
    /// caller excludes the device from the run.
    pub async fn initialize(&self, binding: &Arc<DeviceBinding>) -> Result<(), SyncError> {
        self.try_initialize(binding)
            .await
            .map_err(|e| e.into_initialization(binding.name()))
    }

    async fn try_initialize(&self, binding: &Arc<DeviceBinding>) -> Result<(), SyncError> {
        let device = binding.name();
        let twin = binding.twin();

        let desired = twin
            .get_desired_properties()
            .await
            .map_err(|e| SyncError::transient(device, "read desired properties", e))?;
        let rate = desired.get(PRODUCTION_RATE_PROPERTY).copied().unwrap_or(0);

        binding
            .write_field(DeviceField::ProductionRate, NodeValue::Int(rate))
            .await?;

        let reported = twin
            .get_reported_properties()
            .await
            .map_err(|e| SyncError::transient(device, "read reported properties", e))?;
        let error_code = reported.get(DEVICE_ERROR_PROPERTY).copied().unwrap_or(0);

        {
            let mut cached_code = binding.error_code().await;
            let mut cached_rate = binding.production_rate().await;
            let patch = PropertySet::from([
                (DEVICE_ERROR_PROPERTY.to_string(), error_code),
                (PRODUCTION_RATE_PROPERTY.to_string(), rate),
            ]);
            twin.update_reported_properties(&patch)
                .await
                .map_err(|e| SyncError::transient(device, "update reported properties", e))?;
            *cached_code = error_code;
            *cached_rate = rate;
        }

        twin.on_desired_property_changed(Arc::new(DesiredPropertiesHandler::new(
            self.clone(),
            binding.clone(),
        )))
        .await
        .map_err(|e| SyncError::transient(device, "register desired-property callback", e))?;

        let commands = Arc::new(CommandHandler::new(self.clone(), binding.clone()));
        for command in DeviceCommand::ALL {
            twin.register_method_handler(command.method_name(), commands.clone())
                .await
                .map_err(|e| {
                    SyncError::transient(device, format!("register method {command}"), e)
                })?;
        }
        twin.register_default_method_handler(commands)
            .await
            .map_err(|e| SyncError::transient(device, "register default method handler", e))?;

        info!(
            device = %device,
            production_rate = rate,
            error_code,
            "Device initialized"
        );
        Ok(())
    }

    // ========================================================================
    // Polling operations
    // ========================================================================

    /// Reads the telemetry nodes and publishes them as an event
    ///
    /// Published on every call, changed or not.
    pub async fn publish_telemetry(
        &self,
        binding: &DeviceBinding,
    ) -> Result<TelemetrySample, SyncError> {
        let device = binding.name();
        let sample = TelemetrySample {
            production_status: binding
                .read_field(DeviceField::ProductionStatus)
                .await?
                .as_i64()?,
            workorder_id: binding.read_field(DeviceField::WorkorderId).await?.as_text(),
            good_count: read_count(binding, DeviceField::GoodCount).await?,
            bad_count: read_count(binding, DeviceField::BadCount).await?,
            temperature: binding
                .read_field(DeviceField::Temperature)
                .await?
                .as_f64()?,
        };

        let message = EventMessage::json(&sample.for_device(device))
            .map_err(|e| SyncError::transient(device, "serialize telemetry", e))?;
        debug!(device = %device, payload = %message.body_text(), "Publishing telemetry");
        binding
            .twin()
            .send_event(&message)
            .await
            .map_err(|e| SyncError::transient(device, "send telemetry event", e))?;

        Ok(sample)
    }

    /// Compares the device error code against what the cloud last saw
    ///
    /// On a change: publishes an error event, alerts when new flags appeared,
    /// reports the new code and only then updates the cache. Alert delivery
    /// failures are logged and never abort the operation.
    ///
    /// # Returns
    /// The published event, or `None` when the code is unchanged
    pub async fn reconcile_error(
        &self,
        binding: &DeviceBinding,
    ) -> Result<Option<ErrorEvent>, SyncError> {
        let device = binding.name();
        let mut cached = binding.error_code().await;

        let current = binding.read_field(DeviceField::DeviceError).await?.as_i64()?;
        if current == *cached {
            return Ok(None);
        }

        let event = ErrorEvent::new(device, *cached, current);
        let message = EventMessage::json(&event)
            .map_err(|e| SyncError::transient(device, "serialize error event", e))?;
        binding
            .twin()
            .send_event(&message)
            .await
            .map_err(|e| SyncError::transient(device, "send error event", e))?;

        if event.has_new_errors() {
            if let Err(e) = self.alerts.send_alert(&message.body_text()).await {
                let err = SyncError::AlertDelivery {
                    device: device.clone(),
                    source: e,
                };
                error!(device = %device, error = %err, "Failed to deliver device alert");
            }
        }

        let patch = PropertySet::from([(DEVICE_ERROR_PROPERTY.to_string(), current)]);
        binding
            .twin()
            .update_reported_properties(&patch)
            .await
            .map_err(|e| SyncError::transient(device, "report DeviceError", e))?;

        info!(
            device = %device,
            previous = *cached,
            code = current,
            new_errors = %event.error_name,
            "Device error state changed"
        );
        *cached = current;
        Ok(Some(event))
    }

    /// Reports the device production rate when it differs from what the cloud last saw
    ///
    /// # Returns
    /// The newly reported rate, or `None` when unchanged
    pub async fn reconcile_rate(&self, binding: &DeviceBinding) -> Result<Option<i64>, SyncError> {
        let device = binding.name();
        let mut cached = binding.production_rate().await;

        let current = binding
            .read_field(DeviceField::ProductionRate)
            .await?
            .as_i64()?;
        if current == *cached {
            return Ok(None);
        }

        report_rate(binding, current).await?;
        info!(device = %device, previous = *cached, rate = current, "Production rate changed");
        *cached = current;
        Ok(Some(current))
    }

    // ========================================================================
    // Twin callbacks
    // ========================================================================

    /// Applies a desired production rate: device first, then the twin, then the cache
    pub async fn on_desired_rate_changed(
        &self,
        binding: &DeviceBinding,
        new_rate: i64,
    ) -> Result<(), SyncError> {
        let mut cached = binding.production_rate().await;

        binding
            .write_field(DeviceField::ProductionRate, NodeValue::Int(new_rate))
            .await?;
        report_rate(binding, new_rate).await?;

        info!(device = %binding.name(), rate = new_rate, "Applied desired production rate");
        *cached = new_rate;
        Ok(())
    }

    /// Executes a remote command
    ///
    /// Known commands are forwarded to the device's remote procedure. Unknown
    /// names are acknowledged without forwarding.
    pub async fn on_command(&self, binding: &DeviceBinding, method_name: &str) -> MethodResponse {
        let device = binding.name();
        let Some(command) = DeviceCommand::parse(method_name) else {
            warn!(device = %device, method = method_name, "Unknown command, acknowledging");
            return MethodResponse::ack();
        };

        match binding
            .physical()
            .call_method(binding.root(), &binding.node(command.field()))
            .await
        {
            Ok(_) => {
                info!(device = %device, command = %command, "Command executed");
                MethodResponse::ack()
            }
            Err(e) => {
                let err = SyncError::transient(device, format!("call {command}"), e);
                error!(device = %device, error = %err, "Command failed");
                MethodResponse::failed()
            }
        }
    }
}

/// Reads a counter node, rejecting negative values
async fn read_count(binding: &DeviceBinding, field: DeviceField) -> Result<u64, SyncError> {
    let value = binding.read_field(field).await?;
    let count = value.as_i64()?;
    u64::try_from(count).map_err(|_| {
        SyncError::InvalidNodeValue(DomainError::InvalidNodeValue {
            expected: format!("non-negative {field}"),
            actual: value.to_string(),
        })
    })
}

async fn report_rate(binding: &DeviceBinding, rate: i64) -> Result<(), SyncError> {
    let patch = PropertySet::from([(PRODUCTION_RATE_PROPERTY.to_string(), rate)]);
    binding
        .twin()
        .update_reported_properties(&patch)
        .await
        .map_err(|e| SyncError::transient(binding.name(), "report ProductionRate", e))
}
