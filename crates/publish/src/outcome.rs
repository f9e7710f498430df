//! Results reported back to the caller.

use std::fmt;

use davpush_remote::{ClassifiedError, ErrorKind, RemotePath};
use serde::Serialize;

use crate::config::RemoteClientConfig;
use crate::format::format_size;

/// Pipeline step at which a publish stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishStage {
    Source,
    Probe,
    Capacity,
    Materialize,
    Upload,
    Commit,
}

impl fmt::Display for PublishStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Source => "source check",
            Self::Probe => "connectivity probe",
            Self::Capacity => "capacity check",
            Self::Materialize => "directory setup",
            Self::Upload => "upload",
            Self::Commit => "commit",
        })
    }
}

/// Why a publish did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PublishFailure {
    /// The local file disappeared before it could be read.
    #[error("source file vanished before upload")]
    SourceVanished,

    #[error("local I/O error: {message}")]
    LocalIo { message: String },

    #[error("insufficient remote space: need {}, {} free", human(.required), human(.free))]
    InsufficientSpace { required: u64, free: u64 },

    #[error("remote root not found, check the server settings")]
    RootMissing,

    #[error("{stage} failed: {error}")]
    Remote {
        stage: PublishStage,
        error: ClassifiedError,
    },
}

fn human(bytes: &u64) -> String {
    format_size(*bytes)
}

impl PublishFailure {
    /// Classified remote kind, if the failure came from the store.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Remote { error, .. } => Some(error.kind),
            _ => None,
        }
    }

    pub fn stage(&self) -> PublishStage {
        match self {
            Self::SourceVanished | Self::LocalIo { .. } => PublishStage::Source,
            Self::InsufficientSpace { .. } => PublishStage::Capacity,
            Self::RootMissing => PublishStage::Materialize,
            Self::Remote { stage, .. } => *stage,
        }
    }
}

/// Result of one publish. Produced exactly once per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<PublishFailure>,
    pub message: String,
    pub bytes_transferred: u64,
    pub remote_path: RemotePath,
}

impl TransferOutcome {
    pub(crate) fn succeeded(remote_path: RemotePath, bytes: u64) -> Self {
        Self {
            success: true,
            failure: None,
            message: format!("uploaded {} to {remote_path}", format_size(bytes)),
            bytes_transferred: bytes,
            remote_path,
        }
    }

    pub(crate) fn failed(remote_path: RemotePath, failure: PublishFailure) -> Self {
        Self::failed_with_message(remote_path, failure.to_string(), failure)
    }

    pub(crate) fn failed_with_message(
        remote_path: RemotePath,
        message: String,
        failure: PublishFailure,
    ) -> Self {
        Self {
            success: false,
            failure: Some(failure),
            message,
            bytes_transferred: 0,
            remote_path,
        }
    }
}

/// Outcome of a connectivity probe. Valid only for the configuration it
/// was computed under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectivityResult {
    pub reachable: bool,
    /// `false` when the check was skipped and reachability is assumed.
    pub verified: bool,
    /// Raw free-space answer; negative means the server cannot report it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub free_space_bytes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ClassifiedError>,
    #[serde(skip)]
    pub config_fingerprint: u64,
}

impl ConnectivityResult {
    pub(crate) fn reachable(config: &RemoteClientConfig, free_space_bytes: Option<i64>) -> Self {
        Self {
            reachable: true,
            verified: true,
            free_space_bytes,
            error: None,
            config_fingerprint: config.fingerprint(),
        }
    }

    pub(crate) fn assumed(config: &RemoteClientConfig) -> Self {
        Self {
            verified: false,
            ..Self::reachable(config, None)
        }
    }

    pub(crate) fn unreachable(config: &RemoteClientConfig, error: ClassifiedError) -> Self {
        Self {
            reachable: false,
            verified: true,
            free_space_bytes: None,
            error: Some(error),
            config_fingerprint: config.fingerprint(),
        }
    }

    /// Whether this result was computed under `config`.
    pub fn is_current(&self, config: &RemoteClientConfig) -> bool {
        self.config_fingerprint == config.fingerprint()
    }

    /// Reported free space, if the server supports reporting it.
    pub fn known_free_space(&self) -> Option<u64> {
        self.free_space_bytes.and_then(|free| u64::try_from(free).ok())
    }
}
