//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! including validation failures of identifiers and node values.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid device display name
    #[error("Invalid device name: {0}")]
    InvalidDeviceName(String),

    /// Invalid device connection string
    #[error("Invalid connection string: {0}")]
    InvalidConnectionString(String),

    /// Invalid email address format
    #[error("Invalid email format: {0}")]
    InvalidEmail(String),

    /// Invalid node path
    #[error("Invalid node path: {0}")]
    InvalidNodePath(String),

    /// A node value could not be interpreted as the expected type
    #[error("Invalid node value: expected {expected}, got {actual}")]
    InvalidNodeValue {
        /// The type that was expected
        expected: String,
        /// The value that was actually read
        actual: String,
    },

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
