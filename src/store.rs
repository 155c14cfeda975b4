//! Artifact store port and its file-backed and in-memory adapters
//!
//! The trait returns boxed futures so stores can be held as
//! `Arc<dyn ArtifactStore>` and selected at runtime.

use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use parking_lot::RwLock;
use tracing::trace;

use crate::contracts::CalibrationArtifact;
use crate::errors::Result;

/// Boxed future returned by `ArtifactStore::try_read`
pub type ReadFuture<'a> = Pin<Box<dyn Future<Output = Result<Option<CalibrationArtifact>>> + Send + 'a>>;

/// Port for the platform storage subsystem
pub trait ArtifactStore: Send + Sync {
    /// Read the artifact stored under `name`
    ///
    /// `Ok(None)` when it does not exist; `Err` only for genuine I/O faults.
    fn try_read<'a>(&'a self, name: &'a str) -> ReadFuture<'a>;
}

/// File-backed store: artifact `name` lives at `<root>/<name>.<extension>`
///
/// On device this points at the folder the calibration tool writes
/// `CalibrationData.json` into.
#[derive(Debug, Clone)]
pub struct FileArtifactStore {
    root: PathBuf,
    extension: String,
}

impl FileArtifactStore {
    /// Create a store rooted at `root` using the default `json` extension
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extension: crate::CALIBRATION_FILE_EXTENSION.to_string(),
        }
    }

    /// Set the file extension (empty for none)
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Root directory of the store
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path the artifact `name` is read from
    pub fn path_for(&self, name: &str) -> PathBuf {
        let path = self.root.join(name);
        if self.extension.is_empty() {
            path
        } else {
            path.with_extension(&self.extension)
        }
    }
}

impl ArtifactStore for FileArtifactStore {
    fn try_read<'a>(&'a self, name: &'a str) -> ReadFuture<'a> {
        Box::pin(async move {
            let path = self.path_for(name);
            match tokio::fs::read(&path).await {
                Ok(contents) => {
                    trace!(path = %path.display(), bytes = contents.len(), "artifact read");
                    Ok(Some(CalibrationArtifact::from(contents)))
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    trace!(path = %path.display(), "artifact not found");
                    Ok(None)
                }
                Err(e) => Err(e.into()),
            }
        })
    }
}

/// In-memory store
///
/// Useful when calibration data arrives over another channel; replacing an
/// entry is picked up by the next send attempt.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    artifacts: RwLock<HashMap<String, CalibrationArtifact>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an artifact, returning the previous one
    pub fn put(
        &self,
        name: impl Into<String>,
        artifact: impl Into<CalibrationArtifact>,
    ) -> Option<CalibrationArtifact> {
        self.artifacts.write().insert(name.into(), artifact.into())
    }

    /// Remove an artifact
    pub fn remove(&self, name: &str) -> Option<CalibrationArtifact> {
        self.artifacts.write().remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.artifacts.read().contains_key(name)
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn try_read<'a>(&'a self, name: &'a str) -> ReadFuture<'a> {
        let artifact = self.artifacts.read().get(name).cloned();
        Box::pin(async move { Ok(artifact) })
    }
}
