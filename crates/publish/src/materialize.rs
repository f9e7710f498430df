//! Remote directory materialization.

use davpush_remote::{ErrorKind, RemotePath, RemoteStorage};
use tracing::{debug, error};

use crate::config::RemoteClientConfig;
use crate::error::RemoteFailure;

/// Errors produced while ensuring a remote directory exists.
#[derive(Debug, thiserror::Error)]
pub enum MaterializeError {
    /// The store root itself is absent: the configuration is wrong.
    #[error("remote root not found, check the server settings")]
    RootMissing,

    /// The deepest directory that could not be checked or created.
    #[error("failed to ensure directory {path}: {error}")]
    Remote {
        path: RemotePath,
        error: RemoteFailure,
    },
}

/// Ensures a directory and all its ancestors exist on the store.
pub struct PathMaterializer<'a> {
    storage: &'a dyn RemoteStorage,
    check_existence: bool,
}

impl<'a> PathMaterializer<'a> {
    pub fn new(storage: &'a dyn RemoteStorage) -> Self {
        Self {
            storage,
            check_existence: true,
        }
    }

    /// Honors the configuration's existence-check switch.
    pub fn for_config(storage: &'a dyn RemoteStorage, config: &RemoteClientConfig) -> Self {
        Self {
            storage,
            check_existence: !config.disable_existence_check,
        }
    }

    /// Makes sure `path` exists, creating missing ancestors parent-first.
    ///
    /// Idempotent: an existing directory is a no-op, and a directory created
    /// concurrently by someone else counts as success.
    pub fn ensure_directory(&self, path: &RemotePath) -> Result<(), MaterializeError> {
        if self.check_existence {
            self.ensure_checked(path)
        } else {
            self.ensure_blind(path)
        }
    }

    fn ensure_checked(&self, path: &RemotePath) -> Result<(), MaterializeError> {
        if self.exists(path)? {
            debug!(path = %path, "directory found");
            return Ok(());
        }

        let Some(parent) = path.parent() else {
            error!("remote root not found, something is wrong with the server settings");
            return Err(MaterializeError::RootMissing);
        };

        debug!(path = %path, "directory not found, checking parent");
        self.ensure_checked(&parent)?;
        self.create(path)
    }

    /// Creates every ancestor top-down without querying existence.
    fn ensure_blind(&self, path: &RemotePath) -> Result<(), MaterializeError> {
        for dir in path.ancestors().iter().skip(1) {
            self.create(dir)?;
        }
        Ok(())
    }

    fn exists(&self, path: &RemotePath) -> Result<bool, MaterializeError> {
        self.storage
            .exists(path)
            .map_err(|e| MaterializeError::Remote {
                path: path.clone(),
                error: e.into(),
            })
    }

    fn create(&self, path: &RemotePath) -> Result<(), MaterializeError> {
        let failure = match self.storage.mkdir(path) {
            Ok(()) => {
                debug!(path = %path, "directory created");
                return Ok(());
            }
            Err(e) => RemoteFailure::from(e),
        };

        // WebDAV answers MKCOL on an existing collection with 405.
        let already_there = matches!(
            &failure,
            RemoteFailure::Classified(c)
                if matches!(c.kind, ErrorKind::AlreadyExists | ErrorKind::MethodNotAllowed)
        );
        if already_there && (!self.check_existence || self.exists(path)?) {
            debug!(path = %path, "directory already present");
            return Ok(());
        }

        Err(MaterializeError::Remote {
            path: path.clone(),
            error: failure,
        })
    }
}
