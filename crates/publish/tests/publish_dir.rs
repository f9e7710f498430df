//! End-to-end publishes against a directory-backed store.

use std::fs;
use std::path::Path;

use davpush_publish::{
    PROBE_PREFIX, ProbeStrategy, PublishFailure, PublishRequest, PublishStage, RemoteClientConfig,
    TransferPublisher,
};
use davpush_remote::{DirStorage, ErrorKind, RemotePath};

fn write_source(dir: &Path, name: &str, contents: &[u8]) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn config() -> RemoteClientConfig {
    RemoteClientConfig::new("file:///mnt/share")
}

#[test]
fn publishes_into_fresh_tree() {
    let local = tempfile::tempdir().unwrap();
    let remote = tempfile::tempdir().unwrap();
    let src = write_source(local.path(), "backup.zip", b"archive bytes");

    let storage = DirStorage::new(remote.path());
    let config = config();
    let req = PublishRequest::new(
        &src,
        RemotePath::parse("/backups/2024-01").unwrap(),
        "backup.zip",
    )
    .unwrap();

    let outcome = TransferPublisher::new(&storage, &config)
        .publish(&req)
        .unwrap();

    assert!(outcome.success, "{}", outcome.message);
    let stored = remote.path().join("backups/2024-01/backup.zip");
    assert_eq!(fs::read(stored).unwrap(), b"archive bytes");
    assert!(!remote.path().join("backups/2024-01/backup.zip.tmp").exists());
    assert!(src.exists());
}

#[test]
fn quota_blocks_before_any_directory_is_created() {
    let local = tempfile::tempdir().unwrap();
    let remote = tempfile::tempdir().unwrap();
    let src = write_source(local.path(), "big.mp4", &[7u8; 2048]);

    let storage = DirStorage::new(remote.path()).with_quota(1024);
    let config = config();
    let req = PublishRequest::new(&src, RemotePath::parse("/timelapse").unwrap(), "big.mp4")
        .unwrap();

    let outcome = TransferPublisher::new(&storage, &config)
        .publish(&req)
        .unwrap();

    assert_eq!(
        outcome.failure,
        Some(PublishFailure::InsufficientSpace {
            required: 2048,
            free: 1024
        })
    );
    assert!(!remote.path().join("timelapse").exists());
}

#[test]
fn existing_file_needs_overwrite() {
    let local = tempfile::tempdir().unwrap();
    let remote = tempfile::tempdir().unwrap();
    fs::write(remote.path().join("part.gcode"), b"old").unwrap();
    let src = write_source(local.path(), "part.gcode", b"new");

    let storage = DirStorage::new(remote.path());
    let config = config();
    let publisher = TransferPublisher::new(&storage, &config);

    let req = PublishRequest::new(&src, RemotePath::root(), "part.gcode").unwrap();
    let outcome = publisher.publish(&req).unwrap();
    let failure = outcome.failure.unwrap();
    assert_eq!(failure.stage(), PublishStage::Commit);
    assert_eq!(failure.kind(), Some(ErrorKind::AlreadyExists));
    assert_eq!(fs::read(remote.path().join("part.gcode")).unwrap(), b"old");
    assert!(!remote.path().join("part.gcode.tmp").exists());

    let outcome = publisher.publish(&req.with_overwrite(true)).unwrap();
    assert!(outcome.success);
    assert_eq!(fs::read(remote.path().join("part.gcode")).unwrap(), b"new");
}

#[test]
fn missing_root_is_a_configuration_error() {
    let local = tempfile::tempdir().unwrap();
    let remote = tempfile::tempdir().unwrap();
    let src = write_source(local.path(), "a.zip", b"x");

    let storage = DirStorage::new(remote.path().join("not-mounted"));
    let config = config();
    let req = PublishRequest::new(&src, RemotePath::parse("/a").unwrap(), "a.zip").unwrap();

    let outcome = TransferPublisher::new(&storage, &config)
        .publish(&req)
        .unwrap();

    let failure = outcome.failure.unwrap();
    assert_eq!(failure.stage(), PublishStage::Probe);
    assert_eq!(failure.kind(), Some(ErrorKind::NotFound));
}

#[test]
fn round_trip_probe_leaves_nothing_behind() {
    let remote = tempfile::tempdir().unwrap();
    fs::create_dir(remote.path().join("scratch")).unwrap();

    let storage = DirStorage::new(remote.path());
    let mut config = config();
    config.probe = ProbeStrategy::RoundTrip;
    config.scratch_dir = RemotePath::parse("/scratch").unwrap();

    let result = TransferPublisher::new(&storage, &config).probe();

    assert!(result.reachable);
    assert!(result.verified);
    let leftovers: Vec<_> = fs::read_dir(remote.path().join("scratch"))
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().starts_with(PROBE_PREFIX))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn blind_mode_materializes_without_existence_checks() {
    let local = tempfile::tempdir().unwrap();
    let remote = tempfile::tempdir().unwrap();
    fs::create_dir(remote.path().join("prints")).unwrap();
    let src = write_source(local.path(), "cube.gcode", b"G28");

    let storage = DirStorage::new(remote.path());
    let mut config = config();
    config.disable_existence_check = true;
    let req = PublishRequest::new(&src, RemotePath::parse("/prints/2024").unwrap(), "cube.gcode")
        .unwrap()
        .with_delete_local(true);

    let outcome = TransferPublisher::new(&storage, &config)
        .publish(&req)
        .unwrap();

    assert!(outcome.success, "{}", outcome.message);
    assert!(remote.path().join("prints/2024/cube.gcode").is_file());
    assert!(!src.exists());
}
