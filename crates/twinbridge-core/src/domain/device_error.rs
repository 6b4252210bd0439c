//! Device error bitmask classification
//!
//! A device reports its error state as an integer bitmask where every bit is
//! an independent condition. This module decodes those codes into
//! [`ErrorFlags`] and computes which flags are new between two codes.
//!
//! ## Delta policy
//!
//! "New" errors are computed by integer subtraction of the two codes, not by
//! `current & !previous`. A code that stays flat or goes down yields no new
//! errors even when one flag cleared while another appeared:
//!
//! ```text
//! previous  current  delta  newly set
//!     0        1       1    {EmergencyStop}
//!     1        3       2    {PowerFailure}
//!     3        1      -2    {}
//!     2        1      -1    {}   (EmergencyStop appeared, PowerFailure cleared)
//! ```
//!
//! Both the error event schema and alerting depend on this behaviour.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// Highest error code covered by the modeled flags
pub const MAX_MODELED_CODE: i64 = 0b1111;

/// A single device error condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ErrorFlag {
    EmergencyStop,
    PowerFailure,
    SensorFailure,
    Unknown,
}

impl ErrorFlag {
    /// All flags in bit order
    pub const ALL: [ErrorFlag; 4] = [
        ErrorFlag::EmergencyStop,
        ErrorFlag::PowerFailure,
        ErrorFlag::SensorFailure,
        ErrorFlag::Unknown,
    ];

    /// The bit this flag occupies in an error code
    #[must_use]
    pub const fn bit(self) -> u8 {
        match self {
            ErrorFlag::EmergencyStop => 1,
            ErrorFlag::PowerFailure => 2,
            ErrorFlag::SensorFailure => 4,
            ErrorFlag::Unknown => 8,
        }
    }

    /// Identifier form, e.g. `EmergencyStop`
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            ErrorFlag::EmergencyStop => "EmergencyStop",
            ErrorFlag::PowerFailure => "PowerFailure",
            ErrorFlag::SensorFailure => "SensorFailure",
            ErrorFlag::Unknown => "Unknown",
        }
    }

    /// Human-readable form, e.g. `Emergency Stop`
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            ErrorFlag::EmergencyStop => "Emergency Stop",
            ErrorFlag::PowerFailure => "Power Failure",
            ErrorFlag::SensorFailure => "Sensor Failure",
            ErrorFlag::Unknown => "Unknown",
        }
    }
}

impl Display for ErrorFlag {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A set of [`ErrorFlag`]s
///
/// The empty set means "no error" and renders as `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ErrorFlags(u8);

impl ErrorFlags {
    /// The empty set
    pub const NONE: ErrorFlags = ErrorFlags(0);

    /// Decodes a raw device error code
    ///
    /// Codes above [`MAX_MODELED_CODE`] keep their low four bits and always
    /// contain [`ErrorFlag::Unknown`]. Negative codes decode to `{Unknown}`.
    #[must_use]
    pub fn decode(code: i64) -> Self {
        if code < 0 {
            return Self(ErrorFlag::Unknown.bit());
        }
        let mut bits = (code & MAX_MODELED_CODE) as u8;
        if code > MAX_MODELED_CODE {
            bits |= ErrorFlag::Unknown.bit();
        }
        Self(bits)
    }

    /// Returns true if `flag` is in the set
    #[must_use]
    pub const fn contains(self, flag: ErrorFlag) -> bool {
        self.0 & flag.bit() != 0
    }

    /// Adds `flag` to the set
    pub fn insert(&mut self, flag: ErrorFlag) {
        self.0 |= flag.bit();
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of flags in the set
    #[must_use]
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// The set as a bitmask
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Iterates the flags in bit order
    pub fn iter(self) -> impl Iterator<Item = ErrorFlag> {
        ErrorFlag::ALL.into_iter().filter(move |f| self.contains(*f))
    }

    /// Human description with each flag quoted, e.g. `'Emergency Stop' 'Power Failure'`
    ///
    /// The empty set is described as `'None'`.
    #[must_use]
    pub fn describe(self) -> String {
        if self.is_empty() {
            return "'None'".to_string();
        }
        self.iter()
            .map(|f| format!("'{}'", f.label()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Display for ErrorFlags {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("None");
        }
        let names: Vec<&str> = self.iter().map(ErrorFlag::name).collect();
        f.write_str(&names.join(", "))
    }
}

impl FromIterator<ErrorFlag> for ErrorFlags {
    fn from_iter<I: IntoIterator<Item = ErrorFlag>>(iter: I) -> Self {
        let mut flags = ErrorFlags::NONE;
        for flag in iter {
            flags.insert(flag);
        }
        flags
    }
}

/// Pure classification of device error codes
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Decodes `code` into its flags
    #[must_use]
    pub fn decode(code: i64) -> ErrorFlags {
        ErrorFlags::decode(code)
    }

    /// Flags considered newly set when the code moves from `previous` to `current`
    ///
    /// Uses the arithmetic delta described in the module docs.
    #[must_use]
    pub fn newly_set(previous: i64, current: i64) -> ErrorFlags {
        let delta = current.saturating_sub(previous);
        if delta <= 0 {
            return ErrorFlags::NONE;
        }
        ErrorFlags::decode(delta)
    }

    /// Number of newly set flags; an alert is warranted when this is non-zero
    #[must_use]
    pub fn count(newly_set: ErrorFlags) -> usize {
        newly_set.len()
    }
}
