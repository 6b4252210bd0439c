//! Production-rate decrease rule
//!
//! Consumes windowed production-quality results. When the share of good
//! production for a device falls below the acceptable threshold, the desired
//! production rate of that device is lowered by a fixed step.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::message::{parse_first_line, MessageDisposition};
use crate::ports::{IDeviceRegistry, PRODUCTION_RATE_PROPERTY};

/// Below this percentage of good production the rate is decreased
pub const MIN_ACCEPTABLE_GOOD_PERCENT: f64 = 90.0;

/// Points removed from the desired rate per decrease
pub const RATE_DECREASE_STEP: i64 = 10;

/// One windowed production-quality result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProductionQualityReport {
    pub window_end_time: DateTime<Utc>,
    pub connection_device_id: String,
    pub good_count: f64,
    pub total_volume: f64,
    pub procent_of_good_production: f64,
}

/// Result of applying the rule to one report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// Quality is acceptable, nothing to do
    Acceptable,
    /// Desired rate lowered to the contained value
    Decreased(i64),
    /// Rate is already too low to decrease
    AtMinimum,
    /// Device or its desired rate does not exist
    MissingProperty,
}

/// Use case lowering the desired production rate of poorly performing devices
pub struct DecreaseProductionRateUseCase {
    registry: Arc<dyn IDeviceRegistry + Send + Sync>,
}

impl DecreaseProductionRateUseCase {
    pub fn new(registry: Arc<dyn IDeviceRegistry + Send + Sync>) -> Self {
        Self { registry }
    }

    /// Handles one raw message body
    ///
    /// The message is always completed: malformed bodies and registry failures
    /// are logged so the message is never redelivered.
    pub async fn handle_message(&self, body: &str) -> MessageDisposition {
        info!(body, "Received production quality message");

        let report: ProductionQualityReport = match parse_first_line(body) {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "Cannot deserialize production quality message");
                return MessageDisposition::Complete;
            }
        };

        if let Err(e) = self.apply(&report).await {
            error!(
                device = %report.connection_device_id,
                error = %e,
                "Failed to decrease desired production rate"
            );
        }
        MessageDisposition::Complete
    }

    /// Applies the rule to a parsed report
    ///
    /// # Errors
    /// Returns an error if the registry cannot be read or updated
    pub async fn apply(&self, report: &ProductionQualityReport) -> anyhow::Result<RateDecision> {
        let device = report.connection_device_id.as_str();
        if report.procent_of_good_production >= MIN_ACCEPTABLE_GOOD_PERCENT {
            return Ok(RateDecision::Acceptable);
        }

        warn!(
            device,
            good_percent = report.procent_of_good_production,
            "Decreasing production rate"
        );

        let current = self
            .registry
            .get_desired_properties(device)
            .await?
            .and_then(|desired| desired.get(PRODUCTION_RATE_PROPERTY).copied());

        let Some(rate) = current else {
            error!(
                device,
                "Device has no desired ProductionRate or does not exist"
            );
            return Ok(RateDecision::MissingProperty);
        };

        let new_rate = rate - RATE_DECREASE_STEP;
        if new_rate < 0 {
            warn!(device, rate, "Production rate cannot be decreased further");
            return Ok(RateDecision::AtMinimum);
        }

        self.registry
            .update_desired_property(device, PRODUCTION_RATE_PROPERTY, new_rate)
            .await?;
        warn!(device, rate = new_rate, "Desired production rate changed");
        Ok(RateDecision::Decreased(new_rate))
    }
}
