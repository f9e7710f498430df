//! Transport selection from the configured server URL.

use std::path::PathBuf;

use davpush_host::{SessionError, Settings, StorageFactory};
use davpush_remote::{DirStorage, RemoteStorage, WebDavStorage};

/// Factory handed to the publish session.
pub fn factory() -> StorageFactory {
    Box::new(open)
}

/// Opens the store behind `settings.server`.
///
/// `http://` and `https://` URLs open a WebDAV client using the configured
/// credentials, timeout and certificate check. `file://` URLs and absolute
/// paths open a locally mounted directory.
pub fn open(settings: &Settings) -> Result<Box<dyn RemoteStorage>, SessionError> {
    let config = settings.to_client_config()?;
    let server = config.host.as_str();

    if is_http(server) {
        let storage = WebDavStorage::new(config.webdav_options())
            .map_err(|e| SessionError::Storage(e.to_string()))?;
        tracing::debug!(server, "using WebDAV store");
        return Ok(Box::new(storage));
    }

    let root = mount_root(server).ok_or_else(|| {
        SessionError::Storage(format!(
            "unsupported server {server:?}, expected an http(s):// URL, a file:// URL or an absolute path"
        ))
    })?;

    tracing::debug!(root = %root.display(), "using mounted directory store");
    Ok(Box::new(DirStorage::new(root)))
}

fn is_http(server: &str) -> bool {
    let lower = server.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn mount_root(server: &str) -> Option<PathBuf> {
    let path = server.strip_prefix("file://").unwrap_or(server);
    if path.starts_with('/') {
        Some(PathBuf::from(path))
    } else {
        None
    }
}
