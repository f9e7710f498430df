//! Publish orchestrator.

use std::fs;
use std::io;

use davpush_remote::{ClassifiedError, ErrorKind, RemotePath, RemoteStorage, classify};
use tracing::{debug, error, info, warn};

use crate::capacity::{CapacityDecision, CapacityGuard};
use crate::config::RemoteClientConfig;
use crate::error::{PublishError, RemoteFailure};
use crate::format::format_size;
use crate::materialize::{MaterializeError, PathMaterializer};
use crate::outcome::{ConnectivityResult, PublishFailure, PublishStage, TransferOutcome};
use crate::probe::ConnectivityProbe;
use crate::request::PublishRequest;

/// Drives one file through probe, capacity, materialize, upload and commit.
///
/// Borrows the transport and configuration for the duration of the call;
/// holds no state of its own, so one handle may serve concurrent publishes.
pub struct TransferPublisher<'a> {
    storage: &'a dyn RemoteStorage,
    config: &'a RemoteClientConfig,
}

impl<'a> TransferPublisher<'a> {
    pub fn new(storage: &'a dyn RemoteStorage, config: &'a RemoteClientConfig) -> Self {
        Self { storage, config }
    }

    /// Standalone connectivity check under the current configuration.
    pub fn probe(&self) -> ConnectivityResult {
        ConnectivityProbe::new(self.storage, self.config).probe()
    }

    /// Publishes `req`, probing the store first.
    ///
    /// Remote failures are reported in the returned outcome. `Err` is
    /// reserved for protocol defects the classifier cannot interpret.
    pub fn publish(&self, req: &PublishRequest) -> Result<TransferOutcome, PublishError> {
        self.run(req, Prior::Absent)
    }

    /// Like [`publish`](Self::publish), reusing `probe` when it is reachable
    /// and was computed under the current configuration.
    pub fn publish_with_probe(
        &self,
        req: &PublishRequest,
        probe: &ConnectivityResult,
    ) -> Result<TransferOutcome, PublishError> {
        self.run(req, Prior::Cached(probe))
    }

    /// Publishes with a probe the caller ran just before under the same
    /// configuration. The store is not probed again: an unreachable
    /// result fails at the probe stage and reported free space feeds the
    /// capacity gate directly.
    pub fn publish_after_probe(
        &self,
        req: &PublishRequest,
        probe: &ConnectivityResult,
    ) -> Result<TransferOutcome, PublishError> {
        self.run(req, Prior::Fresh(probe))
    }

    fn run(&self, req: &PublishRequest, prior: Prior<'_>) -> Result<TransferOutcome, PublishError> {
        let target = req.final_path().clone();

        // Source
        let bytes = match fs::metadata(req.source()) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(
                    source = %req.source().display(),
                    "source file vanished before upload"
                );
                return Ok(TransferOutcome::failed(target, PublishFailure::SourceVanished));
            }
            Err(e) => {
                return Ok(self.fail(
                    target,
                    PublishFailure::LocalIo {
                        message: e.to_string(),
                    },
                ));
            }
        };

        // Probe
        let fresh;
        let (probe, probed_now) = match prior {
            Prior::Fresh(p) => (p, true),
            Prior::Cached(p) if p.reachable && p.is_current(self.config) => {
                debug!("reusing connectivity result");
                (p, false)
            }
            _ => {
                fresh = self.probe();
                (&fresh, true)
            }
        };
        if !probe.reachable {
            let error = probe.error.clone().unwrap_or_else(|| {
                ClassifiedError::new(ErrorKind::Unknown(None), "remote storage unreachable")
            });
            return Ok(self.fail(
                target,
                PublishFailure::Remote {
                    stage: PublishStage::Probe,
                    error,
                },
            ));
        }

        // Capacity. A reused probe's free space may be outdated.
        if self.config.check_space {
            let decision = match probe.free_space_bytes {
                Some(free) if probed_now => CapacityGuard::decide(bytes, free),
                _ => match CapacityGuard::new(self.storage).check_capacity(bytes) {
                    Ok(decision) => decision,
                    Err(failure) => {
                        return self.remote_failure(target, PublishStage::Capacity, failure);
                    }
                },
            };
            if let CapacityDecision::Insufficient { free } = decision {
                return Ok(self.fail(
                    target,
                    PublishFailure::InsufficientSpace {
                        required: bytes,
                        free,
                    },
                ));
            }
        }

        // Materialize
        let materializer = PathMaterializer::for_config(self.storage, self.config);
        if let Err(e) = materializer.ensure_directory(req.remote_dir()) {
            return match e {
                MaterializeError::RootMissing => Ok(self.fail(target, PublishFailure::RootMissing)),
                MaterializeError::Remote {
                    error: RemoteFailure::Protocol(source),
                    ..
                } => Err(PublishError::Protocol {
                    stage: PublishStage::Materialize,
                    source,
                }),
                MaterializeError::Remote {
                    path,
                    error: RemoteFailure::Classified(error),
                } => {
                    let message = format!("failed to create directory {path}: {error}");
                    error!(path = %path, kind = %error.kind, "{message}");
                    Ok(TransferOutcome::failed_with_message(
                        target,
                        message,
                        PublishFailure::Remote {
                            stage: PublishStage::Materialize,
                            error,
                        },
                    ))
                }
            };
        }

        // Upload
        debug!(
            source = %req.source().display(),
            temp = %req.temp_path(),
            size = %format_size(bytes),
            "uploading"
        );
        if let Err(e) = self.storage.upload_file(req.temp_path(), req.source()) {
            self.abort_after_upload(req);
            return self.remote_failure(target, PublishStage::Upload, e.into());
        }

        // Commit
        if let Err(e) = self
            .storage
            .rename(req.temp_path(), req.final_path(), req.overwrite())
        {
            self.abort_after_upload(req);
            return match RemoteFailure::from(e) {
                RemoteFailure::Classified(error) if error.kind == ErrorKind::ParentMissing => {
                    let message = format!(
                        "parent directory vanished before {} could be committed",
                        req.final_path()
                    );
                    error!(path = %target, "{message}");
                    Ok(TransferOutcome::failed_with_message(
                        target,
                        message,
                        PublishFailure::Remote {
                            stage: PublishStage::Commit,
                            error,
                        },
                    ))
                }
                other => self.remote_failure(target, PublishStage::Commit, other),
            };
        }

        info!(path = %target, size = %format_size(bytes), "upload complete");

        // Cleanup
        if req.delete_local() {
            match fs::remove_file(req.source()) {
                Ok(()) => info!(source = %req.source().display(), "deleted local file"),
                Err(e) => warn!(
                    source = %req.source().display(),
                    error = %e,
                    "failed to delete local file"
                ),
            }
        }

        Ok(TransferOutcome::succeeded(target, bytes))
    }

    fn fail(&self, target: RemotePath, failure: PublishFailure) -> TransferOutcome {
        error!(path = %target, stage = %failure.stage(), "{failure}");
        TransferOutcome::failed(target, failure)
    }

    fn remote_failure(
        &self,
        target: RemotePath,
        stage: PublishStage,
        failure: RemoteFailure,
    ) -> Result<TransferOutcome, PublishError> {
        match failure {
            RemoteFailure::Classified(error) => {
                Ok(self.fail(target, PublishFailure::Remote { stage, error }))
            }
            RemoteFailure::Protocol(source) => {
                error!(path = %target, %stage, error = %source, "unexpected response from remote");
                Err(PublishError::Protocol { stage, source })
            }
        }
    }

    /// Removes the temporary object after a failed upload or commit.
    /// Cleanup problems are logged only.
    fn abort_after_upload(&self, req: &PublishRequest) {
        if !self.config.cleanup_temp_on_failure {
            return;
        }
        match self.storage.delete(req.temp_path()) {
            Ok(()) => debug!(temp = %req.temp_path(), "removed temporary upload"),
            Err(e) if classify(&e).kind == ErrorKind::NotFound => {}
            Err(e) => warn!(
                temp = %req.temp_path(),
                error = %e,
                "failed to remove temporary upload"
            ),
        }
    }
}

/// Connectivity result handed in by the caller.
#[derive(Clone, Copy)]
enum Prior<'p> {
    Absent,
    Cached(&'p ConnectivityResult),
    Fresh(&'p ConnectivityResult),
}
