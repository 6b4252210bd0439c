//! Use cases (interactors) for the cloud-side rules
//!
//! These use cases consume the results of windowed analytics jobs and act on
//! device twins through the [`IDeviceRegistry`](crate::ports::IDeviceRegistry)
//! port.
//!
//! ## Use Cases
//!
//! - [`DecreaseProductionRateUseCase`] - Lower the desired rate of devices producing too much scrap
//! - [`InvokeEmergencyStopUseCase`] - Stop devices raising bursts of errors

pub mod decrease_production_rate;
pub mod invoke_emergency_stop;
pub mod message;

pub use decrease_production_rate::{
    DecreaseProductionRateUseCase, ProductionQualityReport, RateDecision,
};
pub use invoke_emergency_stop::{ErrorBurstReport, InvokeEmergencyStopUseCase};
pub use message::{parse_first_line, MessageDisposition};
