//! Alert delivery errors

use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur when delivering an alert
#[derive(Debug, Error)]
pub enum AlertError {
    /// No recipient addresses are configured
    #[error("There are no recipient addresses configured")]
    NoRecipients,

    /// No sender address is configured
    #[error("No sender address configured")]
    MissingSender,

    /// The alerts section has no connection string
    #[error("No e-mail connection string configured")]
    MissingConnectionString,

    /// The connection string could not be parsed
    #[error("Invalid e-mail connection string: {0}")]
    InvalidConnectionString(String),

    /// The request never reached the server or the response was unreadable
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status
    #[error("E-mail request rejected with {status}: {body}")]
    Rejected { status: StatusCode, body: String },
}
