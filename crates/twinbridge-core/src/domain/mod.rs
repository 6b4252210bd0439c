//! Domain entities and business logic
//!
//! This module contains the core domain types for twinbridge:
//! - Device error flags and the error-delta classifier
//! - Node addressing, field catalogue and node values
//! - Newtypes for device names, connection strings and e-mail addresses
//! - Event payloads published to the twin
//! - Domain-specific error types

pub mod device_error;
pub mod errors;
pub mod newtypes;
pub mod node;
pub mod payload;

// Re-export commonly used types
pub use device_error::{ErrorClassifier, ErrorFlag, ErrorFlags};
pub use errors::DomainError;
pub use newtypes::*;
pub use node::{DeviceCommand, DeviceField, NodeInfo, NodePath, NodeValue};
pub use payload::{ErrorEvent, TelemetryEvent, TelemetrySample};
