//! Artifact sinks
//!
//! Generated configuration goes through an [`ArtifactSink`] so the renderers
//! never touch the filesystem directly.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use crate::errors::DeployerError;
use crate::filesys::file::File;

/// Destination for generated artifacts
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Create or truncate `path` and write `content` in full
    async fn write(&self, path: &Path, content: &str) -> Result<(), DeployerError>;
}

/// Sink writing straight to the local filesystem
#[derive(Debug, Clone, Default)]
pub struct FsSink;

impl FsSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ArtifactSink for FsSink {
    async fn write(&self, path: &Path, content: &str) -> Result<(), DeployerError> {
        debug!("Writing {} bytes to {}", content.len(), path.display());
        File::new(path)
            .write_string(content)
            .await
            .map_err(|e| DeployerError::WriteError {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
    }
}

/// In-memory sink, keeps every file and the order they were written in
#[derive(Debug, Default)]
pub struct MemorySink {
    files: Mutex<BTreeMap<PathBuf, String>>,
    order: Mutex<Vec<PathBuf>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Content of the file at `path`, if it was written
    pub fn get(&self, path: impl AsRef<Path>) -> Option<String> {
        self.files
            .lock()
            .ok()
            .and_then(|files| files.get(path.as_ref()).cloned())
    }

    /// Paths in write order (a rewritten path appears twice)
    pub fn write_order(&self) -> Vec<PathBuf> {
        self.order.lock().map(|o| o.clone()).unwrap_or_default()
    }

    /// Number of distinct files
    pub fn len(&self) -> usize {
        self.files.lock().map(|f| f.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ArtifactSink for MemorySink {
    async fn write(&self, path: &Path, content: &str) -> Result<(), DeployerError> {
        let mut files = self
            .files
            .lock()
            .map_err(|e| DeployerError::Internal(format!("sink lock poisoned: {}", e)))?;
        files.insert(path.to_path_buf(), content.to_string());
        drop(files);

        let mut order = self
            .order
            .lock()
            .map_err(|e| DeployerError::Internal(format!("sink lock poisoned: {}", e)))?;
        order.push(path.to_path_buf());
        Ok(())
    }
}
