//! Host events and their mapping to publish requests.

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};
use davpush_publish::{PublishRequest, RequestError};
use davpush_remote::PathError;
use serde::{Deserialize, Serialize};

use crate::naming;
use crate::settings::Settings;

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("invalid strftime template: {0}")]
    Template(String),

    #[error("invalid remote path: {0}")]
    Path(#[from] PathError),

    #[error(transparent)]
    Request(#[from] RequestError),
}

/// A local file the host produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HostEvent {
    /// A settings/data backup archive was written.
    BackupCreated { path: PathBuf, name: String },
    /// A timelapse render finished.
    TimelapseDone { path: PathBuf, name: String },
    /// A file was added to local storage (e.g. an uploaded print file).
    FileAdded { path: PathBuf, name: String },
}

impl HostEvent {
    pub fn backup(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = default_name(&path);
        Self::BackupCreated { path, name }
    }

    pub fn timelapse(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = default_name(&path);
        Self::TimelapseDone { path, name }
    }

    pub fn file_added(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = default_name(&path);
        Self::FileAdded { path, name }
    }

    pub fn source(&self) -> &Path {
        match self {
            Self::BackupCreated { path, .. }
            | Self::TimelapseDone { path, .. }
            | Self::FileAdded { path, .. } => path,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::BackupCreated { name, .. }
            | Self::TimelapseDone { name, .. }
            | Self::FileAdded { name, .. } => name,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::BackupCreated { .. } => "backup",
            Self::TimelapseDone { .. } => "timelapse",
            Self::FileAdded { .. } => "upload",
        }
    }

    /// Builds the publish request for this event, or `None` when the
    /// event type is disabled in `settings`.
    pub fn to_request<Tz>(
        &self,
        settings: &Settings,
        now: &DateTime<Tz>,
    ) -> Result<Option<PublishRequest>, EventError>
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        let events = &settings.events;
        let (enabled, dir_override) = match self {
            Self::BackupCreated { .. } => (events.backups, &events.backup_path),
            Self::TimelapseDone { .. } => (events.timelapses, &events.timelapse_path),
            Self::FileAdded { .. } => (events.uploads, &events.upload_path),
        };
        if !enabled {
            return Ok(None);
        }

        let dir_template = dir_override.as_deref().unwrap_or(&settings.upload_path);
        let remote_dir = naming::remote_dir(dir_template, now)?;

        let fallback = if self.name().is_empty() {
            default_name(self.source())
        } else {
            self.name().to_string()
        };
        let name = naming::file_name(
            settings.upload_name.as_deref(),
            self.source(),
            &fallback,
            now,
        )?;

        let request = PublishRequest::new(self.source(), remote_dir, name)?
            .with_overwrite(settings.overwrite)
            .with_delete_local(settings.delete_after_upload);
        Ok(Some(request))
    }
}

fn default_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
