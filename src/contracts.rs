//! Core data structures for the calibration relay
//!
//! The artifact is opaque: nothing here interprets its contents. The only
//! structure the relay imposes is the wire frame built by the transmitter.

use bytes::Bytes;

/// CalibrationArtifact - Raw calibration bytes produced on the device
///
/// Typically the JSON written by the calibration tool, but the relay never
/// parses it. Cloning is cheap: the bytes are reference counted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CalibrationArtifact {
    bytes: Bytes,
}

impl CalibrationArtifact {
    /// Wrap raw artifact bytes
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self { bytes: bytes.into() }
    }

    /// Artifact contents
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Length of the artifact in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Zero-length artifacts are valid and framed with N = 0
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Consume the artifact, returning the underlying buffer
    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }
}

impl From<Vec<u8>> for CalibrationArtifact {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<&'static [u8]> for CalibrationArtifact {
    fn from(bytes: &'static [u8]) -> Self {
        Self::new(bytes)
    }
}

/// ConnectionEvent - A new connection now exists
///
/// The id is informational only (logging); the broadcaster does not read
/// anything else from the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionEvent {
    pub connection_id: u64,
}

impl ConnectionEvent {
    pub fn new(connection_id: u64) -> Self {
        Self { connection_id }
    }
}

/// Handle for a registered connection-established handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

/// Result of a single send attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Frame of `frame_len` bytes handed to the notifier
    Sent { frame_len: usize },

    /// Store reported the artifact absent
    NoArtifact,

    /// Store read faulted; treated as absent
    ReadFailed,

    /// Artifact too large for the length field
    Rejected,

    /// Host offers no artifact store, attempt is a no-op
    Disabled,
}

impl SendOutcome {
    /// True only when a frame reached the notifier
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent { .. })
    }
}
