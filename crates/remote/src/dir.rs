//! Directory-backed store for targets mounted into the local filesystem
//! (davfs2 mounts, NAS shares).

use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{RemoteError, RemotePath, RemoteStorage};

/// [`RemoteStorage`] over a local directory tree rooted at `root`.
///
/// Free space is only reported when a quota is configured; otherwise the
/// store answers with the "unsupported" sentinel (`-1`).
#[derive(Debug, Clone)]
pub struct DirStorage {
    root: PathBuf,
    quota: Option<u64>,
}

impl DirStorage {
    /// Creates a store rooted at `root`. The directory is not touched until
    /// the first call.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            quota: None,
        }
    }

    /// Limits the store to `bytes`; uploads beyond it fail with HTTP 507.
    pub fn with_quota(mut self, bytes: u64) -> Self {
        self.quota = Some(bytes);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &RemotePath) -> PathBuf {
        let mut full = self.root.clone();
        for segment in path.segments() {
            full.push(segment);
        }
        full
    }

    fn used_bytes(&self) -> io::Result<u64> {
        dir_size(&self.root)
    }

    fn require_parent(&self, path: &RemotePath) -> Result<(), RemoteError> {
        let parent = path.parent().unwrap_or_else(RemotePath::root);
        if self.resolve(&parent).is_dir() {
            Ok(())
        } else {
            Err(RemoteError::ParentMissing(parent))
        }
    }
}

fn dir_size(path: &Path) -> io::Result<u64> {
    let mut total = 0;
    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        let meta = entry.metadata()?;
        if meta.is_dir() {
            total += dir_size(&entry.path())?;
        } else {
            total += meta.len();
        }
    }
    Ok(total)
}

impl RemoteStorage for DirStorage {
    fn exists(&self, path: &RemotePath) -> Result<bool, RemoteError> {
        Ok(self.resolve(path).try_exists()?)
    }

    fn mkdir(&self, path: &RemotePath) -> Result<(), RemoteError> {
        let target = self.resolve(path);
        match std::fs::create_dir(&target) {
            Ok(()) => {
                debug!(path = %path, "created directory");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(RemoteError::AlreadyExists(path.clone()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(RemoteError::ParentMissing(
                path.parent().unwrap_or_else(RemotePath::root),
            )),
            Err(e) => Err(e.into()),
        }
    }

    fn upload_file(&self, remote: &RemotePath, local: &Path) -> Result<(), RemoteError> {
        self.require_parent(remote)?;

        if let Some(quota) = self.quota {
            let size = std::fs::metadata(local)?.len();
            if self.used_bytes()? + size > quota {
                return Err(RemoteError::status(507, "Insufficient Storage"));
            }
        }

        let target = self.resolve(remote);
        let written = std::fs::copy(local, &target)?;
        debug!(remote = %remote, bytes = written, "stored file");
        Ok(())
    }

    fn rename(
        &self,
        from: &RemotePath,
        to: &RemotePath,
        overwrite: bool,
    ) -> Result<(), RemoteError> {
        let src = self.resolve(from);
        if !src.try_exists()? {
            return Err(RemoteError::NotFound(from.clone()));
        }
        self.require_parent(to)?;

        let dst = self.resolve(to);
        if !overwrite && dst.try_exists()? {
            return Err(RemoteError::AlreadyExists(to.clone()));
        }

        std::fs::rename(&src, &dst)?;
        Ok(())
    }

    fn delete(&self, path: &RemotePath) -> Result<(), RemoteError> {
        let target = self.resolve(path);
        let meta = match std::fs::symlink_metadata(&target) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(RemoteError::NotFound(path.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        if meta.is_dir() {
            std::fs::remove_dir_all(&target)?;
        } else {
            std::fs::remove_file(&target)?;
        }
        Ok(())
    }

    fn free_space_bytes(&self) -> Result<i64, RemoteError> {
        match self.quota {
            None => Ok(-1),
            Some(quota) => {
                let free = quota.saturating_sub(self.used_bytes()?);
                Ok(i64::try_from(free).unwrap_or(i64::MAX))
            }
        }
    }
}
