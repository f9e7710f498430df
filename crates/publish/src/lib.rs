//! Reliable publish of local files to a remote hierarchical store.
//!
//! This crate holds the publish protocol only; the transport is any
//! [`RemoteStorage`](davpush_remote::RemoteStorage) implementation and the
//! caller decides which files to publish and where.
//!
//! # Pipeline
//!
//! 1. **Source**: resolve the local file size
//! 2. **Probe**: confirm the store is reachable ([`ConnectivityProbe`])
//! 3. **Capacity**: optional free-space gate ([`CapacityGuard`])
//! 4. **Materialize**: create missing directories ([`PathMaterializer`])
//! 5. **Upload**: transfer to `<name>.tmp`
//! 6. **Commit**: atomic rename to the final name
//! 7. **Cleanup**: optionally delete the local source

pub mod capacity;
pub mod config;
pub mod error;
pub mod format;
pub mod materialize;
pub mod outcome;
pub mod probe;
pub mod publisher;
pub mod request;

#[cfg(test)]
pub(crate) mod testing;

pub use capacity::{CapacityDecision, CapacityGuard};
pub use config::{Credentials, ProbeStrategy, RemoteClientConfig};
pub use error::{PublishError, RemoteFailure};
pub use format::format_size;
pub use materialize::{MaterializeError, PathMaterializer};
pub use outcome::{ConnectivityResult, PublishFailure, PublishStage, TransferOutcome};
pub use probe::{ConnectivityProbe, PROBE_PREFIX};
pub use publisher::TransferPublisher;
pub use request::{PublishRequest, RequestError, TEMP_SUFFIX};
