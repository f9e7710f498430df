//! Long-lived publish session owned by the host.

use chrono::Local;
use davpush_publish::{
    ConnectivityResult, PublishError, RemoteClientConfig, TransferOutcome, TransferPublisher,
};
use davpush_remote::RemoteStorage;
use tracing::{debug, info, warn};

use crate::events::{EventError, HostEvent};
use crate::settings::{ProbeCadence, Settings, SettingsError};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Event(#[from] EventError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error("failed to open remote storage: {0}")]
    Storage(String),
}

/// Builds a transport handle for the given settings.
pub type StorageFactory =
    Box<dyn Fn(&Settings) -> Result<Box<dyn RemoteStorage>, SessionError> + Send + Sync>;

/// Owns the transport handle and the connectivity state for one
/// configuration epoch.
///
/// A new epoch starts with every [`reconfigure`](Self::reconfigure): the
/// handle is rebuilt and any cached probe is dropped.
pub struct PublishSession {
    settings: Settings,
    config: RemoteClientConfig,
    storage: Box<dyn RemoteStorage>,
    factory: StorageFactory,
    probe: Option<ConnectivityResult>,
}

impl PublishSession {
    pub fn new(settings: Settings, factory: StorageFactory) -> Result<Self, SessionError> {
        let config = settings.to_client_config()?;
        let storage = factory(&settings)?;
        info!(host = %config.host, "publish session opened");
        Ok(Self {
            settings,
            config,
            storage,
            factory,
            probe: None,
        })
    }

    /// Applies new settings. On error the previous epoch stays active.
    pub fn reconfigure(&mut self, settings: Settings) -> Result<(), SessionError> {
        let config = settings.to_client_config()?;
        let storage = (self.factory)(&settings)?;

        if config.fingerprint() != self.config.fingerprint() {
            debug!("configuration changed, connectivity state reset");
        }
        self.settings = settings;
        self.config = config;
        self.storage = storage;
        self.probe = None;
        info!(host = %self.config.host, "publish session reconfigured");
        Ok(())
    }

    /// Probes the store now and remembers the result for this epoch.
    pub fn test_connection(&mut self) -> ConnectivityResult {
        let result = TransferPublisher::new(self.storage.as_ref(), &self.config).probe();
        self.probe = Some(result.clone());
        result
    }

    /// Publishes the file behind `event`. `Ok(None)` when the event type
    /// is disabled.
    pub fn handle_event(
        &mut self,
        event: &HostEvent,
    ) -> Result<Option<TransferOutcome>, SessionError> {
        let Some(request) = event.to_request(&self.settings, &Local::now())? else {
            debug!(event = event.label(), "event type disabled, ignoring");
            return Ok(None);
        };

        info!(
            event = event.label(),
            source = %event.source().display(),
            target = %request.final_path(),
            "publishing"
        );

        let publisher = TransferPublisher::new(self.storage.as_ref(), &self.config);
        let outcome = match self.settings.probe_cadence {
            ProbeCadence::PerPublish => publisher.publish(&request)?,
            ProbeCadence::PerEpoch => {
                let (probe, outcome) = match self.probe.take() {
                    Some(p) if p.reachable && p.is_current(&self.config) => {
                        let outcome = publisher.publish_with_probe(&request, &p)?;
                        (p, outcome)
                    }
                    _ => {
                        let p = publisher.probe();
                        let outcome = publisher.publish_after_probe(&request, &p)?;
                        (p, outcome)
                    }
                };
                // A failed publish forces a fresh probe next time.
                if outcome.success {
                    self.probe = Some(probe);
                }
                outcome
            }
        };

        if !outcome.success {
            warn!(event = event.label(), "{}", outcome.message);
        }
        Ok(Some(outcome))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn config(&self) -> &RemoteClientConfig {
        &self.config
    }

    /// Connectivity result cached for the current epoch, if any.
    pub fn cached_probe(&self) -> Option<&ConnectivityResult> {
        self.probe.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use davpush_remote::{DirStorage, RemoteError, RemotePath};
    use std::path::Path;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Directory store that counts root existence checks.
    struct CountingStorage {
        inner: DirStorage,
        root_checks: Arc<AtomicUsize>,
    }

    impl RemoteStorage for CountingStorage {
        fn exists(&self, path: &RemotePath) -> Result<bool, RemoteError> {
            if path.is_root() {
                self.root_checks.fetch_add(1, Ordering::SeqCst);
            }
            self.inner.exists(path)
        }
        fn mkdir(&self, path: &RemotePath) -> Result<(), RemoteError> {
            self.inner.mkdir(path)
        }
        fn upload_file(&self, remote: &RemotePath, local: &Path) -> Result<(), RemoteError> {
            self.inner.upload_file(remote, local)
        }
        fn rename(
            &self,
            from: &RemotePath,
            to: &RemotePath,
            overwrite: bool,
        ) -> Result<(), RemoteError> {
            self.inner.rename(from, to, overwrite)
        }
        fn delete(&self, path: &RemotePath) -> Result<(), RemoteError> {
            self.inner.delete(path)
        }
        fn free_space_bytes(&self) -> Result<i64, RemoteError> {
            self.inner.free_space_bytes()
        }
    }

    struct Fixture {
        local: tempfile::TempDir,
        remote: tempfile::TempDir,
        root_checks: Arc<AtomicUsize>,
        builds: Arc<AtomicUsize>,
    }

    impl Fixture {
        fn new() -> Self {
            let remote = tempfile::tempdir().unwrap();
            std::fs::create_dir(remote.path().join("backups")).unwrap();
            Self {
                local: tempfile::tempdir().unwrap(),
                remote,
                root_checks: Arc::new(AtomicUsize::new(0)),
                builds: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn settings(&self) -> Settings {
            let mut s = Settings::default();
            s.server = Some(format!("file://{}", self.remote.path().display()));
            s.upload_path = "/backups".into();
            s
        }

        fn factory(&self) -> StorageFactory {
            let root_checks = Arc::clone(&self.root_checks);
            let builds = Arc::clone(&self.builds);
            Box::new(move |settings: &Settings| {
                builds.fetch_add(1, Ordering::SeqCst);
                let server = settings.server.clone().unwrap_or_default();
                let root = server.trim_start_matches("file://").to_string();
                let storage: Box<dyn RemoteStorage> = Box::new(CountingStorage {
                    inner: DirStorage::new(root),
                    root_checks: Arc::clone(&root_checks),
                });
                Ok::<_, SessionError>(storage)
            })
        }

        fn backup(&self, name: &str) -> HostEvent {
            let path = self.local.path().join(name);
            std::fs::write(&path, b"backup").unwrap();
            HostEvent::backup(path)
        }

        fn root_checks(&self) -> usize {
            self.root_checks.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn publishes_backup_event() {
        let fx = Fixture::new();
        let mut session = PublishSession::new(fx.settings(), fx.factory()).unwrap();

        let outcome = session.handle_event(&fx.backup("a.zip")).unwrap().unwrap();

        assert!(outcome.success, "{}", outcome.message);
        assert!(fx.remote.path().join("backups/a.zip").is_file());
    }

    #[test]
    fn disabled_event_returns_none() {
        let fx = Fixture::new();
        let mut session = PublishSession::new(fx.settings(), fx.factory()).unwrap();

        let path = fx.local.path().join("print.mp4");
        std::fs::write(&path, b"movie").unwrap();
        assert!(
            session
                .handle_event(&HostEvent::timelapse(path))
                .unwrap()
                .is_none()
        );
        assert_eq!(fx.root_checks(), 0);
    }

    #[test]
    fn per_epoch_probes_once() {
        let fx = Fixture::new();
        let mut session = PublishSession::new(fx.settings(), fx.factory()).unwrap();

        session.handle_event(&fx.backup("a.zip")).unwrap();
        session.handle_event(&fx.backup("b.zip")).unwrap();

        assert_eq!(fx.root_checks(), 1);
        assert!(session.cached_probe().is_some());
    }

    #[test]
    fn per_publish_probes_every_time() {
        let fx = Fixture::new();
        let mut settings = fx.settings();
        settings.probe_cadence = ProbeCadence::PerPublish;
        let mut session = PublishSession::new(settings, fx.factory()).unwrap();

        session.handle_event(&fx.backup("a.zip")).unwrap();
        session.handle_event(&fx.backup("b.zip")).unwrap();

        assert_eq!(fx.root_checks(), 2);
    }

    #[test]
    fn test_connection_result_is_reused() {
        let fx = Fixture::new();
        let mut session = PublishSession::new(fx.settings(), fx.factory()).unwrap();

        assert!(session.test_connection().reachable);
        session.handle_event(&fx.backup("a.zip")).unwrap();

        assert_eq!(fx.root_checks(), 1);
    }

    #[test]
    fn reconfigure_invalidates_probe_and_rebuilds_handle() {
        let fx = Fixture::new();
        let mut session = PublishSession::new(fx.settings(), fx.factory()).unwrap();
        session.test_connection();

        let mut settings = fx.settings();
        settings.timeout = 10;
        session.reconfigure(settings).unwrap();

        assert!(session.cached_probe().is_none());
        assert_eq!(fx.builds.load(Ordering::SeqCst), 2);

        session.handle_event(&fx.backup("a.zip")).unwrap();
        assert_eq!(fx.root_checks(), 2);
    }

    #[test]
    fn failed_reconfigure_keeps_previous_epoch() {
        let fx = Fixture::new();
        let mut session = PublishSession::new(fx.settings(), fx.factory()).unwrap();
        session.test_connection();

        let mut broken = fx.settings();
        broken.server = None;
        assert!(matches!(
            session.reconfigure(broken),
            Err(SessionError::Settings(SettingsError::MissingServer))
        ));
        assert!(session.cached_probe().is_some());
        assert!(session.settings().server.is_some());
    }

    #[test]
    fn failed_publish_forces_new_probe() {
        let fx = Fixture::new();
        let mut session = PublishSession::new(fx.settings(), fx.factory()).unwrap();

        let missing = HostEvent::backup(fx.local.path().join("gone.zip"));
        let outcome = session.handle_event(&missing).unwrap().unwrap();
        assert!(!outcome.success);
        assert!(session.cached_probe().is_none());

        session.handle_event(&fx.backup("a.zip")).unwrap();
        assert_eq!(fx.root_checks(), 2);
    }

    #[test]
    fn unreachable_store_is_checked_once_per_publish() {
        let fx = Fixture::new();
        let mut settings = fx.settings();
        let gone = fx.remote.path().join("unmounted");
        settings.server = Some(format!("file://{}", gone.display()));
        let mut session = PublishSession::new(settings, fx.factory()).unwrap();

        let outcome = session.handle_event(&fx.backup("a.zip")).unwrap().unwrap();

        assert!(!outcome.success);
        assert_eq!(fx.root_checks(), 1);
        assert!(session.cached_probe().is_none());
    }
}
