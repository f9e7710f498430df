use std::path::{Path, PathBuf};

use davpush_remote::{PathError, RemotePath};

/// Suffix appended to the final name while an upload is in flight.
pub const TEMP_SUFFIX: &str = ".tmp";

/// Errors produced when building a [`PublishRequest`].
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("empty file name")]
    EmptyName,

    #[error("invalid file name: {0}")]
    InvalidName(String),

    #[error(transparent)]
    Path(#[from] PathError),
}

/// One file to publish. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    source: PathBuf,
    remote_dir: RemotePath,
    file_name: String,
    final_path: RemotePath,
    temp_path: RemotePath,
    overwrite: bool,
    delete_local: bool,
}

impl PublishRequest {
    /// Builds a request to publish `source` as `remote_dir/file_name`.
    ///
    /// The name must be a single path segment.
    pub fn new(
        source: impl Into<PathBuf>,
        remote_dir: RemotePath,
        file_name: impl Into<String>,
    ) -> Result<Self, RequestError> {
        let file_name = file_name.into();
        if file_name.is_empty() {
            return Err(RequestError::EmptyName);
        }
        if file_name.contains('/') || file_name == "." || file_name == ".." {
            return Err(RequestError::InvalidName(file_name));
        }

        let final_path = remote_dir.join(&file_name)?;
        let temp_path = remote_dir.join(&format!("{file_name}{TEMP_SUFFIX}"))?;

        Ok(Self {
            source: source.into(),
            remote_dir,
            file_name,
            final_path,
            temp_path,
            overwrite: false,
            delete_local: false,
        })
    }

    /// Replace an existing object at the final path.
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Remove the local source once the remote copy is committed.
    pub fn with_delete_local(mut self, delete_local: bool) -> Self {
        self.delete_local = delete_local;
        self
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn remote_dir(&self) -> &RemotePath {
        &self.remote_dir
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn final_path(&self) -> &RemotePath {
        &self.final_path
    }

    pub fn temp_path(&self) -> &RemotePath {
        &self.temp_path
    }

    pub fn overwrite(&self) -> bool {
        self.overwrite
    }

    pub fn delete_local(&self) -> bool {
        self.delete_local
    }
}
