//! Persistent host settings.
//!
//! Stored as TOML at `~/.config/davpush/settings.toml` unless overridden
//! with `DAVPUSH_CONFIG`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use davpush_publish::{Credentials, ProbeStrategy, RemoteClientConfig};
use davpush_remote::{PathError, RemotePath};
use serde::{Deserialize, Serialize};

/// Environment variable overriding the settings file location.
pub const CONFIG_ENV: &str = "DAVPUSH_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid settings file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("no server configured")]
    MissingServer,

    #[error("invalid scratch path: {0}")]
    ScratchPath(#[from] PathError),
}

/// When connectivity is probed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeCadence {
    /// Before every publish.
    PerPublish,
    /// Once per configuration, again after a failed publish.
    #[default]
    PerEpoch,
}

/// Host settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Server URL. Nothing is published until this is set.
    #[serde(default)]
    pub server: Option<String>,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_true")]
    pub verify_certificate: bool,

    /// Remote directory, strftime template.
    #[serde(default = "default_upload_path")]
    pub upload_path: String,

    /// Remote file name, strftime template. The source extension is
    /// appended. Unset keeps the source name.
    #[serde(default)]
    pub upload_name: Option<String>,

    #[serde(default = "default_true")]
    pub check_space: bool,

    /// Disable for servers that misbehave on existence queries.
    #[serde(default = "default_true")]
    pub check_directories: bool,

    #[serde(default)]
    pub probe: ProbeStrategy,

    #[serde(default)]
    pub probe_cadence: ProbeCadence,

    /// Directory receiving round-trip probe objects.
    #[serde(default = "default_upload_path")]
    pub scratch_path: String,

    #[serde(default)]
    pub overwrite: bool,

    #[serde(default)]
    pub delete_after_upload: bool,

    #[serde(default = "default_true")]
    pub cleanup_temp_on_failure: bool,

    #[serde(default)]
    pub events: EventSettings,
}

/// Which host events trigger a publish, and where they go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSettings {
    #[serde(default = "default_true")]
    pub backups: bool,

    #[serde(default)]
    pub timelapses: bool,

    #[serde(default)]
    pub uploads: bool,

    /// Per-event directory templates; fall back to `upload_path`.
    #[serde(default)]
    pub backup_path: Option<String>,

    #[serde(default)]
    pub timelapse_path: Option<String>,

    #[serde(default)]
    pub upload_path: Option<String>,
}

fn default_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_upload_path() -> String {
    "/".into()
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            backups: true,
            timelapses: false,
            uploads: false,
            backup_path: None,
            timelapse_path: None,
            upload_path: None,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: None,
            username: None,
            password: None,
            timeout: default_timeout(),
            verify_certificate: true,
            upload_path: default_upload_path(),
            upload_name: None,
            check_space: true,
            check_directories: true,
            probe: ProbeStrategy::default(),
            probe_cadence: ProbeCadence::default(),
            scratch_path: default_upload_path(),
            overwrite: false,
            delete_after_upload: false,
            cleanup_temp_on_failure: true,
            events: EventSettings::default(),
        }
    }
}

impl Settings {
    /// Loads settings from the default location, writing defaults if the
    /// file does not exist yet.
    pub fn load() -> Result<Self, SettingsError> {
        Self::load_from(&settings_path())
    }

    pub fn save(&self) -> Result<(), SettingsError> {
        self.save_to(&settings_path())
    }

    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let settings: Settings = toml::from_str(&content)?;
            tracing::debug!(path = %path.display(), "settings loaded");
            Ok(settings)
        } else {
            let settings = Settings::default();
            settings.save_to(path)?;
            Ok(settings)
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        // The file may hold a password.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "settings saved");
        Ok(())
    }

    /// Builds the client configuration the publisher runs under.
    pub fn to_client_config(&self) -> Result<RemoteClientConfig, SettingsError> {
        let host = match self.server.as_deref() {
            Some(server) if !server.trim().is_empty() => server.trim(),
            _ => return Err(SettingsError::MissingServer),
        };

        let mut config = RemoteClientConfig::new(host);
        config.credentials = self.username.as_ref().map(|username| Credentials {
            username: username.clone(),
            password: self.password.clone().unwrap_or_default(),
        });
        config.timeout = Duration::from_secs(self.timeout);
        config.verify_tls = self.verify_certificate;
        config.disable_existence_check = !self.check_directories;
        config.check_space = self.check_space;
        config.probe = self.probe;
        config.scratch_dir = RemotePath::parse(&self.scratch_path)?;
        config.cleanup_temp_on_failure = self.cleanup_temp_on_failure;
        Ok(config)
    }
}

/// Settings file location: `$DAVPUSH_CONFIG`, else the per-user config dir.
pub fn settings_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return PathBuf::from(path);
    }

    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("davpush").join("settings.toml")
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home)
            .join(".config")
            .join("davpush")
            .join("settings.toml")
    }
}
