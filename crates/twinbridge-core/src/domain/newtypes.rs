//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for domain identifiers and values.
//! Each newtype ensures data validity at construction time.

use std::fmt::{self, Debug, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

// ============================================================================
// DeviceName
// ============================================================================

/// Display name of a physical device, e.g. `Device 1`
///
/// The name is the stable identity of a device: its node namespace is
/// derived from it and it is attached to every payload the device emits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceName(String);

impl DeviceName {
    /// Create a new DeviceName
    ///
    /// # Errors
    /// Returns error if the name is empty or contains a `/` (the node path separator)
    pub fn new(name: impl Into<String>) -> Result<Self, DomainError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(DomainError::InvalidDeviceName(
                "Device name cannot be empty".to_string(),
            ));
        }
        if name.contains('/') {
            return Err(DomainError::InvalidDeviceName(format!(
                "Device name cannot contain '/': {name}"
            )));
        }
        Ok(Self(name))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for DeviceName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DeviceName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for DeviceName {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<DeviceName> for String {
    fn from(name: DeviceName) -> Self {
        name.0
    }
}

// ============================================================================
// DeviceConnectionString
// ============================================================================

/// Suffix every twin hub host name must carry
const HUB_HOST_SUFFIX: &str = ".azure-devices.net";

/// Connection string binding one device to its twin
///
/// Format: `HostName=<hub>.azure-devices.net;DeviceId=<id>;SharedAccessKey=<base64>`
///
/// `Display` and `Debug` redact the shared access key.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceConnectionString {
    raw: String,
    host_name: String,
    device_id: String,
}

impl DeviceConnectionString {
    /// Parse and validate a connection string
    ///
    /// # Errors
    /// Returns error if a required key is missing or malformed
    pub fn new(raw: impl Into<String>) -> Result<Self, DomainError> {
        let raw = raw.into().trim().to_string();
        if raw.is_empty() {
            return Err(DomainError::InvalidConnectionString(
                "Connection string cannot be empty".to_string(),
            ));
        }

        let mut host_name = None;
        let mut device_id = None;
        let mut access_key = None;

        for part in raw.split(';').filter(|p| !p.is_empty()) {
            let Some((key, value)) = part.split_once('=') else {
                return Err(DomainError::InvalidConnectionString(format!(
                    "Segment is not a Key=Value pair: {part}"
                )));
            };
            match key {
                "HostName" => host_name = Some(value.to_string()),
                "DeviceId" => device_id = Some(value.to_string()),
                "SharedAccessKey" => access_key = Some(value.to_string()),
                _ => {}
            }
        }

        let host_name = host_name.ok_or_else(|| {
            DomainError::InvalidConnectionString("Missing HostName".to_string())
        })?;
        let hub = host_name.strip_suffix(HUB_HOST_SUFFIX).unwrap_or("");
        if hub.is_empty() {
            return Err(DomainError::InvalidConnectionString(format!(
                "HostName must be <hub>{HUB_HOST_SUFFIX}: {host_name}"
            )));
        }

        let device_id = device_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| DomainError::InvalidConnectionString("Missing DeviceId".to_string()))?;

        let access_key = access_key.unwrap_or_default();
        if access_key.len() < 2 || !access_key.ends_with('=') {
            return Err(DomainError::InvalidConnectionString(format!(
                "SharedAccessKey must be a padded base64 value for device {device_id}"
            )));
        }

        Ok(Self {
            raw,
            host_name,
            device_id,
        })
    }

    /// Twin hub host name
    #[must_use]
    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    /// Device identifier registered on the hub
    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// The full connection string, including the secret
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.raw
    }
}

impl Display for DeviceConnectionString {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HostName={};DeviceId={};SharedAccessKey=***",
            self.host_name, self.device_id
        )
    }
}

impl Debug for DeviceConnectionString {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceConnectionString({self})")
    }
}

impl FromStr for DeviceConnectionString {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for DeviceConnectionString {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<DeviceConnectionString> for String {
    fn from(conn: DeviceConnectionString) -> Self {
        conn.raw
    }
}

// ============================================================================
// Email type
// ============================================================================

/// Validated email address (RFC 5322 basic validation)
///
/// Performs basic structural validation:
/// - Contains exactly one @
/// - Has non-empty local part
/// - Has non-empty domain with at least one dot
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// Create a new validated Email
    ///
    /// # Errors
    /// Returns error if the email format is invalid
    pub fn new(email: impl Into<String>) -> Result<Self, DomainError> {
        let email = email.into();
        Self::validate(&email)?;
        Ok(Self(email.to_lowercase()))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(email: &str) -> Result<(), DomainError> {
        let Some((local, domain)) = email.split_once('@') else {
            return Err(DomainError::InvalidEmail(format!(
                "Email must contain an '@': {email}"
            )));
        };

        if domain.contains('@') {
            return Err(DomainError::InvalidEmail(format!(
                "Email must contain exactly one '@': {email}"
            )));
        }

        if local.is_empty() || local.len() > 64 {
            return Err(DomainError::InvalidEmail(format!(
                "Email local part must be 1-64 characters: {email}"
            )));
        }

        if !local
            .chars()
            .all(|c| c.is_alphanumeric() || ".+-_".contains(c))
        {
            return Err(DomainError::InvalidEmail(format!(
                "Email local part contains invalid characters: {email}"
            )));
        }

        if !domain.contains('.') {
            return Err(DomainError::InvalidEmail(format!(
                "Email domain must contain at least one dot: {email}"
            )));
        }

        for label in domain.split('.') {
            if label.is_empty()
                || label.starts_with('-')
                || label.ends_with('-')
                || !label.chars().all(|c| c.is_alphanumeric() || c == '-')
            {
                return Err(DomainError::InvalidEmail(format!(
                    "Email domain label is invalid: {email}"
                )));
            }
        }

        Ok(())
    }
}

impl Display for Email {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Email {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Email {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

// ============================================================================
// Tests
// ============================================================================
