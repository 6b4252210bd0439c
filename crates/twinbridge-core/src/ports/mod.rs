//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`INodeClient`] / [`INodeSession`] - Node-protocol access to physical devices
//! - [`ITwinService`] / [`ITwinSession`] - Cloud device twins, methods and events
//! - [`IAlertGateway`] - Operator alert delivery
//! - [`IDeviceRegistry`] - Service-side twin management used by rule handlers

pub mod alert;
pub mod device_registry;
pub mod node_client;
pub mod twin_service;

pub use alert::{Alert, IAlertGateway, ALERT_PREAMBLE, ALERT_SUBJECT};
pub use device_registry::IDeviceRegistry;
pub use node_client::{INodeClient, INodeSession};
pub use twin_service::{
    EventMessage, IDesiredPropertyHandler, IMethodHandler, ITwinService, ITwinSession,
    MethodRequest, MethodResponse, PropertySet, DEVICE_ERROR_PROPERTY, METHOD_ACK, METHOD_FAILED,
    PRODUCTION_RATE_PROPERTY,
};
