//! twinbridge Alert - e-mail delivery of device alerts
//!
//! Implements the [`IAlertGateway`](twinbridge_core::ports::IAlertGateway)
//! port on top of a communication-services e-mail REST endpoint.
//!
//! ## Modules
//!
//! - [`email`] - Connection string parsing and the HTTP e-mail gateway
//! - [`error`] - Alert delivery errors

pub mod email;
pub mod error;

pub use email::{EmailAlertGateway, EmailConnection, DEFAULT_SEND_TIMEOUT, EMAIL_API_VERSION};
pub use error::AlertError;
