//! Error types for calibration relay operations
//!
//! Only startup failures surface to the host. Everything that can go wrong
//! inside a send attempt is contained and logged by the broadcaster.

use std::fmt;
use std::io;

use thiserror::Error;

/// Result type alias for calibration relay operations
pub type Result<T> = std::result::Result<T, CalibrationError>;

/// Collaborator the broadcaster cannot start without
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingDependency {
    /// No connection notifier was supplied
    ConnectionNotifier,

    /// No tokio runtime was supplied and none is current
    Runtime,
}

impl fmt::Display for MissingDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionNotifier => write!(f, "connection notifier"),
            Self::Runtime => write!(f, "tokio runtime"),
        }
    }
}

/// Calibration relay error enumeration
#[derive(Debug, Error)]
pub enum CalibrationError {
    /// Required collaborator missing at startup
    #[error("Configuration error: missing required {0}")]
    Configuration(MissingDependency),

    /// Payload length does not fit the signed 32-bit length field
    #[error("Frame too large: payload of {size} bytes exceeds {max}")]
    FrameTooLarge { size: usize, max: usize },

    /// Message name length cannot be encoded in the string prefix
    #[error("Message name too long: {len} bytes")]
    NameTooLong { len: usize },

    /// I/O fault while reading an artifact
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl CalibrationError {
    /// True for errors raised by `CalibrationBroadcasterBuilder::start`
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}
