//! Connectivity probing.

use std::io::Write;

use davpush_remote::{ClassifiedError, ErrorKind, RemoteError, RemotePath, RemoteStorage, classify};
use rand::Rng;
use tracing::{debug, info, warn};

use crate::config::{ProbeStrategy, RemoteClientConfig};
use crate::outcome::ConnectivityResult;

/// Name prefix of the disposable objects written by a round-trip probe.
pub const PROBE_PREFIX: &str = ".davpush-probe-";

const TOKEN_BYTES: usize = 16;

/// Random 32-character lowercase hex token naming a probe object.
fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill(&mut bytes);
    hex::encode(bytes)
}

/// Verifies that the store is reachable and usable.
///
/// Never fails: every problem, including protocol defects, is reported
/// through [`ConnectivityResult::error`].
pub struct ConnectivityProbe<'a> {
    storage: &'a dyn RemoteStorage,
    config: &'a RemoteClientConfig,
}

impl<'a> ConnectivityProbe<'a> {
    pub fn new(storage: &'a dyn RemoteStorage, config: &'a RemoteClientConfig) -> Self {
        Self { storage, config }
    }

    pub fn probe(&self) -> ConnectivityResult {
        let strategy = self.config.effective_probe();
        debug!(host = %self.config.host, ?strategy, "probing remote");

        let result = match strategy {
            ProbeStrategy::Full => self.full(),
            ProbeStrategy::RoundTrip => self.round_trip(),
            ProbeStrategy::Skip => {
                warn!("connectivity check disabled, assuming remote is reachable");
                return ConnectivityResult::assumed(self.config);
            }
        };

        match result {
            Ok(free) => {
                info!(host = %self.config.host, "remote storage reachable");
                ConnectivityResult::reachable(self.config, free)
            }
            Err(error) => {
                warn!(host = %self.config.host, kind = %error.kind, "{}", error.message);
                if let Some(hint) = error.hint() {
                    warn!("{hint}");
                }
                ConnectivityResult::unreachable(self.config, error)
            }
        }
    }

    fn full(&self) -> Result<Option<i64>, ClassifiedError> {
        let root = RemotePath::root();
        if !self.storage.exists(&root).map_err(|e| classify(&e))? {
            return Err(ClassifiedError::new(
                ErrorKind::NotFound,
                "server did not return the remote root, check the server settings",
            ));
        }

        if !self.config.check_space {
            return Ok(None);
        }

        let free = self.storage.free_space_bytes().map_err(|e| classify(&e))?;
        if free < 0 {
            debug!("remote does not report free space");
        }
        Ok(Some(free))
    }

    /// Writes a uniquely named object into the scratch directory and
    /// removes it again. A failed removal fails the probe: the object
    /// would otherwise be left behind unnoticed.
    fn round_trip(&self) -> Result<Option<i64>, ClassifiedError> {
        let token = generate_token();
        let target = self
            .config
            .scratch_dir
            .join(&format!("{PROBE_PREFIX}{token}"))
            .map_err(|e| ClassifiedError::new(ErrorKind::BadRequest, e.to_string()))?;

        let mut payload = tempfile::NamedTempFile::new().map_err(local_io)?;
        payload.write_all(token.as_bytes()).map_err(local_io)?;
        payload.flush().map_err(local_io)?;

        debug!(path = %target, "writing probe object");
        self.storage
            .upload_file(&target, payload.path())
            .map_err(|e| classify(&e))?;

        self.storage.delete(&target).map_err(|e| {
            warn!(path = %target, "probe object could not be removed");
            classify(&e)
        })?;

        Ok(None)
    }
}

fn local_io(e: std::io::Error) -> ClassifiedError {
    classify(&RemoteError::Io(e))
}
