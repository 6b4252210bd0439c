//! Node addressing and values
//!
//! Physical devices expose their state as named nodes. A device's nodes live
//! under a root derived from its display name:
//!
//! ```text
//! <namespace-prefix>=<device name>/<field>
//! ns=2;s=Device 1/ProductionRate
//! ```

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::DeviceName;

// ============================================================================
// NodePath
// ============================================================================

/// Address of a node on the node-protocol server
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodePath(String);

impl NodePath {
    /// Create a new NodePath
    ///
    /// # Errors
    /// Returns error if the path is empty
    pub fn new(path: impl Into<String>) -> Result<Self, DomainError> {
        let path = path.into();
        if path.trim().is_empty() {
            return Err(DomainError::InvalidNodePath(
                "Node path cannot be empty".to_string(),
            ));
        }
        Ok(Self(path))
    }

    /// Root node of a device: `<namespace_prefix>=<name>`
    #[must_use]
    pub fn device_root(namespace_prefix: &str, name: &DeviceName) -> Self {
        Self(format!("{namespace_prefix}={name}"))
    }

    /// Child node of this path: `<self>/<field>`
    #[must_use]
    pub fn field(&self, field: DeviceField) -> Self {
        Self(format!("{}/{}", self.0, field.as_str()))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for NodePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for NodePath {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<NodePath> for String {
    fn from(path: NodePath) -> Self {
        path.0
    }
}

// ============================================================================
// DeviceField
// ============================================================================

/// Named nodes every device exposes under its root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceField {
    ProductionStatus,
    WorkorderId,
    GoodCount,
    BadCount,
    Temperature,
    DeviceError,
    ProductionRate,
    EmergencyStop,
    ResetErrorStatus,
}

impl DeviceField {
    /// Every field, in declaration order
    pub const ALL: [DeviceField; 9] = [
        DeviceField::ProductionStatus,
        DeviceField::WorkorderId,
        DeviceField::GoodCount,
        DeviceField::BadCount,
        DeviceField::Temperature,
        DeviceField::DeviceError,
        DeviceField::ProductionRate,
        DeviceField::EmergencyStop,
        DeviceField::ResetErrorStatus,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            DeviceField::ProductionStatus => "ProductionStatus",
            DeviceField::WorkorderId => "WorkorderId",
            DeviceField::GoodCount => "GoodCount",
            DeviceField::BadCount => "BadCount",
            DeviceField::Temperature => "Temperature",
            DeviceField::DeviceError => "DeviceError",
            DeviceField::ProductionRate => "ProductionRate",
            DeviceField::EmergencyStop => "EmergencyStop",
            DeviceField::ResetErrorStatus => "ResetErrorStatus",
        }
    }
}

impl Display for DeviceField {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// DeviceCommand
// ============================================================================

/// Remote commands the twin can invoke on a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceCommand {
    EmergencyStop,
    ResetErrorStatus,
}

impl DeviceCommand {
    /// Commands registered as named method handlers
    pub const ALL: [DeviceCommand; 2] = [DeviceCommand::EmergencyStop, DeviceCommand::ResetErrorStatus];

    /// Resolves a method name; unknown names yield `None`
    #[must_use]
    pub fn parse(method_name: &str) -> Option<Self> {
        match method_name {
            "EmergencyStop" => Some(DeviceCommand::EmergencyStop),
            "ResetErrorStatus" => Some(DeviceCommand::ResetErrorStatus),
            _ => None,
        }
    }

    /// Method name as registered on the twin
    #[must_use]
    pub const fn method_name(self) -> &'static str {
        self.field().as_str()
    }

    /// Remote procedure node this command forwards to
    #[must_use]
    pub const fn field(self) -> DeviceField {
        match self {
            DeviceCommand::EmergencyStop => DeviceField::EmergencyStop,
            DeviceCommand::ResetErrorStatus => DeviceField::ResetErrorStatus,
        }
    }
}

impl Display for DeviceCommand {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.method_name())
    }
}

// ============================================================================
// NodeValue
// ============================================================================

/// A value read from or written to a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl NodeValue {
    /// Interprets the value as an integer
    ///
    /// Whole floats and numeric text are accepted.
    ///
    /// # Errors
    /// Returns [`DomainError::InvalidNodeValue`] for anything else
    pub fn as_i64(&self) -> Result<i64, DomainError> {
        match self {
            NodeValue::Int(v) => Ok(*v),
            NodeValue::Float(v) if v.fract() == 0.0 && v.is_finite() => Ok(*v as i64),
            NodeValue::Text(s) => s.trim().parse().map_err(|_| self.mismatch("integer")),
            _ => Err(self.mismatch("integer")),
        }
    }

    /// Interprets the value as a float
    ///
    /// # Errors
    /// Returns [`DomainError::InvalidNodeValue`] for non-numeric values
    pub fn as_f64(&self) -> Result<f64, DomainError> {
        match self {
            NodeValue::Int(v) => Ok(*v as f64),
            NodeValue::Float(v) => Ok(*v),
            NodeValue::Text(s) => s.trim().parse().map_err(|_| self.mismatch("float")),
            NodeValue::Bool(_) => Err(self.mismatch("float")),
        }
    }

    /// Textual form of the value
    #[must_use]
    pub fn as_text(&self) -> String {
        self.to_string()
    }

    fn mismatch(&self, expected: &str) -> DomainError {
        DomainError::InvalidNodeValue {
            expected: expected.to_string(),
            actual: self.to_string(),
        }
    }
}

impl Display for NodeValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            NodeValue::Bool(v) => write!(f, "{v}"),
            NodeValue::Int(v) => write!(f, "{v}"),
            NodeValue::Float(v) => write!(f, "{v}"),
            NodeValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<i64> for NodeValue {
    fn from(v: i64) -> Self {
        NodeValue::Int(v)
    }
}

impl From<i32> for NodeValue {
    fn from(v: i32) -> Self {
        NodeValue::Int(i64::from(v))
    }
}

impl From<bool> for NodeValue {
    fn from(v: bool) -> Self {
        NodeValue::Bool(v)
    }
}

impl From<f64> for NodeValue {
    fn from(v: f64) -> Self {
        NodeValue::Float(v)
    }
}

impl From<&str> for NodeValue {
    fn from(v: &str) -> Self {
        NodeValue::Text(v.to_string())
    }
}

impl From<String> for NodeValue {
    fn from(v: String) -> Self {
        NodeValue::Text(v)
    }
}

// ============================================================================
// NodeInfo
// ============================================================================

/// A node returned by browsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    /// Address of the node
    pub path: NodePath,
    /// Display name attribute of the node
    pub display_name: String,
}
