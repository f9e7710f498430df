//! Transport-facing configuration borrowed by the pipeline for one call.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use davpush_remote::{RemotePath, WebDavOptions};
use serde::{Deserialize, Serialize};

/// Default per-request timeout, matching the plugin default.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Basic-auth credentials for the remote store.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// How connectivity is verified before a transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStrategy {
    /// Existence check on `/`, plus a free-space query when space checking
    /// is enabled.
    #[default]
    Full,
    /// Write and delete a disposable object.
    RoundTrip,
    /// No check at all; the store is assumed reachable.
    Skip,
}

/// Client configuration for one remote store.
///
/// Owned by the caller. Any change produces a new [`fingerprint`], which
/// invalidates previously obtained connectivity results.
///
/// [`fingerprint`]: RemoteClientConfig::fingerprint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteClientConfig {
    pub host: String,
    pub credentials: Option<Credentials>,
    pub timeout: Duration,
    pub verify_tls: bool,
    /// Some servers misbehave on existence queries; when set, the pipeline
    /// never issues them.
    pub disable_existence_check: bool,
    pub check_space: bool,
    pub probe: ProbeStrategy,
    /// Directory receiving round-trip probe objects.
    pub scratch_dir: RemotePath,
    /// Delete the temporary object when a publish fails after the upload
    /// started.
    pub cleanup_temp_on_failure: bool,
}

impl RemoteClientConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            credentials: None,
            timeout: DEFAULT_TIMEOUT,
            verify_tls: true,
            disable_existence_check: false,
            check_space: true,
            probe: ProbeStrategy::Full,
            scratch_dir: RemotePath::root(),
            cleanup_temp_on_failure: true,
        }
    }

    /// Stable hash over every field.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }

    /// The strategy actually used: a full check needs existence queries, so
    /// it degrades to a round-trip when those are disabled.
    pub fn effective_probe(&self) -> ProbeStrategy {
        match self.probe {
            ProbeStrategy::Full if self.disable_existence_check => ProbeStrategy::RoundTrip,
            other => other,
        }
    }

    /// Connection settings for a WebDAV transport at `host`.
    pub fn webdav_options(&self) -> WebDavOptions {
        let (username, password) = match &self.credentials {
            Some(c) => (Some(c.username.clone()), Some(c.password.clone())),
            None => (None, None),
        };
        WebDavOptions {
            base_url: self.host.clone(),
            username,
            password,
            timeout: self.timeout,
            verify_tls: self.verify_tls,
        }
    }
}
