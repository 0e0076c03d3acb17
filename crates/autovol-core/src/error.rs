//! Error types for scan setup and artifact persistence.
//!
//! Failures scoped to a single plugin are never represented here; they are
//! recorded as [`crate::runner::PluginStatus`] data and the run continues.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors that stop a scan.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The memory dump does not exist.
    #[error("memory dump not found: {}", .path.display())]
    DumpNotFound { path: PathBuf },

    /// The memory dump path exists but is not a regular file.
    #[error("memory dump is not a regular file: {}", .path.display())]
    DumpNotAFile { path: PathBuf },

    /// The output root or run directory could not be created.
    #[error("failed to create run directory {}: {source}", .path.display())]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A plugin artifact could not be written.
    #[error("failed to write artifact {}: {source}", .path.display())]
    ArtifactWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The run summary could not be serialized or written.
    #[error("failed to write run summary {}: {reason}", .path.display())]
    SummaryWrite { path: PathBuf, reason: String },

    /// A plugin worker task panicked or was cancelled.
    #[error("plugin worker failed: {0}")]
    WorkerJoin(String),
}

impl ScanError {
    /// Whether this error happened before any plugin was invoked.
    pub fn is_setup(&self) -> bool {
        matches!(
            self,
            ScanError::DumpNotFound { .. }
                | ScanError::DumpNotAFile { .. }
                | ScanError::DirectoryCreation { .. }
        )
    }
}

/// Convenience result alias.
pub type ScanResult<T> = std::result::Result<T, ScanError>;
