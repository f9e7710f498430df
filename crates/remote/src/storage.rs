use std::path::Path;
use std::time::Duration;

use crate::RemotePath;

/// Raw failure reported by a transport.
///
/// Transports report what they observed; interpretation happens in
/// [`classify`](crate::classify).
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("HTTP {status} {reason}")]
    Status { status: u16, reason: String },

    #[error("not found: {0}")]
    NotFound(RemotePath),

    #[error("already exists: {0}")]
    AlreadyExists(RemotePath),

    #[error("parent directory missing: {0}")]
    ParentMissing(RemotePath),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport received something it cannot interpret at all.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl RemoteError {
    /// Shorthand for an HTTP status failure.
    pub fn status(status: u16, reason: impl Into<String>) -> Self {
        Self::Status {
            status,
            reason: reason.into(),
        }
    }
}

/// Capability set of a hierarchical remote store.
///
/// Every call is synchronous and bounded by the transport's own timeout.
/// Implementations must be shareable across threads: concurrent publishes
/// may drive the same handle.
pub trait RemoteStorage: Send + Sync {
    /// Returns whether an object or directory exists at `path`.
    fn exists(&self, path: &RemotePath) -> Result<bool, RemoteError>;

    /// Creates a single directory. The parent must already exist.
    ///
    /// Fails (typically with [`RemoteError::AlreadyExists`] or HTTP 405)
    /// when the directory is already present.
    fn mkdir(&self, path: &RemotePath) -> Result<(), RemoteError>;

    /// Uploads the local file at `local` to `remote`.
    fn upload_file(&self, remote: &RemotePath, local: &Path) -> Result<(), RemoteError>;

    /// Atomically moves `from` to `to`.
    ///
    /// With `overwrite == false` an existing destination is an error.
    /// Reports [`RemoteError::ParentMissing`] (or HTTP 409) when the
    /// destination directory does not exist.
    fn rename(&self, from: &RemotePath, to: &RemotePath, overwrite: bool)
    -> Result<(), RemoteError>;

    /// Deletes the object or directory at `path`.
    fn delete(&self, path: &RemotePath) -> Result<(), RemoteError>;

    /// Free space on the store in bytes. Negative means "not supported".
    fn free_space_bytes(&self) -> Result<i64, RemoteError>;
}
