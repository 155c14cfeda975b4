//! Calibration Relay - Calibration payload producer for spectator view
//!
//! **Creator**: Shayan Golmezerji
//! **License**: Creative Commons Attribution 4.0 International (CC BY 4.0)
//!
//! Sends the device's calibration artifact to the compositor as soon as a
//! connection exists, and again on every reconnection, so a compositor that
//! restarts always receives the current calibration.
//!
//! # Design Principles
//! - The artifact is an opaque blob, never parsed
//! - Wire frame compatible with .NET `BinaryWriter` readers
//! - Transport and storage are collaborators behind traits
//! - Connection callbacks never block on I/O

pub mod errors;
pub mod contracts;
pub mod transmitter;
pub mod notifier;
pub mod store;
pub mod broadcaster;

pub use broadcaster::{CalibrationBroadcaster, CalibrationBroadcasterBuilder, SendStats, SendStrategy};
pub use contracts::{CalibrationArtifact, ConnectionEvent, SendOutcome, SubscriptionId};
pub use errors::{CalibrationError, MissingDependency, Result};
pub use notifier::{ConnectedHandler, ConnectionHub, ConnectionNotifier};
pub use store::{ArtifactStore, FileArtifactStore, MemoryArtifactStore};
pub use transmitter::Transmitter;

/// Logical artifact name, also written as the message name on the wire
pub const CALIBRATION_DATA_NAME: &str = "CalibrationData";

/// Extension used by the file-backed store
pub const CALIBRATION_FILE_EXTENSION: &str = "json";

/// Largest payload the signed 32-bit length field can describe
pub const MAX_ARTIFACT_SIZE: usize = i32::MAX as usize;

/// Outbound channel capacity for the in-process hub
pub const OUTBOUND_CHANNEL_CAPACITY: usize = 16;
