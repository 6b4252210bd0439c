//! Shared handling of queued analytics messages
//!
//! Analytics jobs deliver their results as message bodies that may hold
//! several lines; the JSON object of interest sits on one of them.

use serde::de::DeserializeOwned;

/// What the caller should do with a consumed message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageDisposition {
    /// Remove the message from the queue
    Complete,
}

/// Deserializes the first line of `body` that parses as `T`
///
/// # Errors
/// Returns the error of the last attempted line when no line parses, or an
/// "empty message body" error for a blank body
pub fn parse_first_line<T: DeserializeOwned>(body: &str) -> Result<T, serde_json::Error> {
    let mut last_error = None;
    for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match serde_json::from_str(line) {
            Ok(parsed) => return Ok(parsed),
            Err(e) => last_error = Some(e),
        }
    }
    Err(last_error.unwrap_or_else(|| {
        <serde_json::Error as serde::de::Error>::custom("empty message body")
    }))
}
