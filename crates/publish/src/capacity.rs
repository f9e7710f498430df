//! Free-space gate run before any remote mutation.

use davpush_remote::RemoteStorage;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::RemoteFailure;
use crate::format::format_size;

/// Result of comparing a file size against the store's free space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum CapacityDecision {
    Sufficient { free: u64 },
    Insufficient { free: u64 },
    /// The server cannot report free space. The upload proceeds.
    Unknown,
}

impl CapacityDecision {
    pub fn allows_upload(&self) -> bool {
        !matches!(self, Self::Insufficient { .. })
    }
}

pub struct CapacityGuard<'a> {
    storage: &'a dyn RemoteStorage,
}

impl<'a> CapacityGuard<'a> {
    pub fn new(storage: &'a dyn RemoteStorage) -> Self {
        Self { storage }
    }

    /// Queries the store and compares against `required` bytes.
    pub fn check_capacity(&self, required: u64) -> Result<CapacityDecision, RemoteFailure> {
        let free = self.storage.free_space_bytes()?;
        Ok(Self::decide(required, free))
    }

    /// Pure decision on an already known free-space answer.
    ///
    /// Insufficient only when `free < required`; a file exactly the size of
    /// the free space passes.
    pub fn decide(required: u64, reported_free: i64) -> CapacityDecision {
        let Ok(free) = u64::try_from(reported_free) else {
            warn!("remote does not report free space, skipping capacity check");
            return CapacityDecision::Unknown;
        };

        if free < required {
            info!(
                required = %format_size(required),
                free = %format_size(free),
                "not enough space on remote storage"
            );
            CapacityDecision::Insufficient { free }
        } else {
            info!(
                required = %format_size(required),
                free = %format_size(free),
                "remote storage has enough space"
            );
            CapacityDecision::Sufficient { free }
        }
    }
}
