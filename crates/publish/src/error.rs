//! Publish error types.

use davpush_remote::{ClassifiedError, RemoteError, classify};

use crate::outcome::PublishStage;

/// A failed remote call as seen by a pipeline component.
///
/// Everything the classifier can interpret becomes `Classified`; protocol
/// defects are kept raw so they can propagate to the caller.
#[derive(Debug, thiserror::Error)]
pub enum RemoteFailure {
    #[error("{0}")]
    Classified(ClassifiedError),

    #[error(transparent)]
    Protocol(RemoteError),
}

impl From<RemoteError> for RemoteFailure {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Protocol(_) => Self::Protocol(err),
            other => Self::Classified(classify(&other)),
        }
    }
}

/// Errors that escape [`TransferPublisher::publish`](crate::TransferPublisher::publish).
///
/// Ordinary remote failures are reported inside the outcome; only protocol
/// defects end up here.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("protocol error during {stage}: {source}")]
    Protocol {
        stage: PublishStage,
        source: RemoteError,
    },
}
