// Rotation tests: archive contents, archive-then-delete, failed seal leaves period intact

mod common;

use common::{at, file_names, zip_entries};
use netprobe::archive::{self, ArchiveError};
use netprobe::period::{Period, Stamp};
use netprobe::rotation::{RotationError, RotationManager};
use std::time::Duration;
use tempfile::TempDir;

fn manager(dir: &TempDir, secs: u64) -> RotationManager {
    RotationManager::new(
        dir.path().join("data"),
        dir.path().join("sending"),
        Duration::from_secs(secs),
    )
}

#[test]
fn rotation_is_due_after_interval() {
    let dir = TempDir::new().unwrap();
    let rotation = manager(&dir, 1000);
    let period = rotation.open_period(at(9, 0, 0)).unwrap();
    assert!(!rotation.is_due(&period, at(9, 16, 39)));
    assert!(rotation.is_due(&period, at(9, 16, 40)));
}

#[test]
fn rotate_seals_both_files_and_opens_fresh_period() {
    let dir = TempDir::new().unwrap();
    let rotation = manager(&dir, 60);
    let period = rotation.open_period(at(9, 0, 0)).unwrap();
    std::fs::write(period.probe_path(), "{\"kind\":\"ping\"}\n").unwrap();
    std::fs::write(period.losses_path(), "{}").unwrap();

    let rotated = rotation.rotate(&period, at(9, 1, 0)).unwrap();
    assert_eq!(
        rotated.sealed.archive.file_name().unwrap().to_string_lossy(),
        "archive_2026-03-14_09-00-00.zip"
    );
    assert_eq!(
        zip_entries(&rotated.sealed.archive),
        vec![
            "losses_2026-03-14_09-00-00.json".to_string(),
            "probe_2026-03-14_09-00-00.jsonl".to_string()
        ]
    );
    assert!(!period.probe_path().exists());
    assert!(!period.losses_path().exists());

    assert_eq!(rotated.next.stamp().as_str(), "2026-03-14_09-01-00");
    assert_eq!(std::fs::read_to_string(rotated.next.losses_path()).unwrap(), "{}");
    assert_eq!(std::fs::read(rotated.next.probe_path()).unwrap().len(), 0);
}

#[test]
fn missing_loss_summary_is_tolerated() {
    let dir = TempDir::new().unwrap();
    let rotation = manager(&dir, 60);
    let period = rotation.open_period(at(9, 0, 0)).unwrap();
    std::fs::remove_file(period.losses_path()).unwrap();

    let rotated = rotation.rotate(&period, at(9, 1, 0)).unwrap();
    assert_eq!(
        zip_entries(&rotated.sealed.archive),
        vec!["probe_2026-03-14_09-00-00.jsonl".to_string()]
    );
}

#[test]
fn unwritable_pending_dir_leaves_period_untouched() {
    let dir = TempDir::new().unwrap();
    let data_dir = dir.path().join("data");
    let pending_dir = dir.path().join("sending");
    let rotation = RotationManager::new(data_dir.clone(), pending_dir.clone(), Duration::from_secs(60));
    let period = rotation.open_period(at(9, 0, 0)).unwrap();
    std::fs::write(period.probe_path(), "line one\nline two\n").unwrap();
    std::fs::write(period.losses_path(), "{\"2026-03-14 09:00\":{\"packets\":2,\"reached\":1,\"losses\":50.0}}").unwrap();
    let probe_before = std::fs::read(period.probe_path()).unwrap();
    let losses_before = std::fs::read(period.losses_path()).unwrap();

    // Pending directory replaced by a plain file: nothing can be published there.
    std::fs::remove_dir_all(&pending_dir).unwrap();
    std::fs::write(&pending_dir, b"not a directory").unwrap();

    let err = rotation.rotate(&period, at(9, 1, 0)).unwrap_err();
    assert!(matches!(err, RotationError::Open(_)));
    assert_eq!(std::fs::read(period.probe_path()).unwrap(), probe_before);
    assert_eq!(std::fs::read(period.losses_path()).unwrap(), losses_before);
    assert_eq!(
        file_names(&data_dir),
        vec![
            "losses_2026-03-14_09-00-00.json".to_string(),
            "probe_2026-03-14_09-00-00.jsonl".to_string()
        ]
    );

    // Next check succeeds once the directory is back.
    std::fs::remove_file(&pending_dir).unwrap();
    let rotated = rotation.rotate(&period, at(9, 2, 0)).unwrap();
    assert!(rotated.sealed.archive.exists());
    assert!(!period.probe_path().exists());
}

#[test]
fn seal_failure_discards_successor_files() {
    let dir = TempDir::new().unwrap();
    let data_dir = dir.path().join("data");
    let pending_dir = dir.path().join("sending");
    let rotation = RotationManager::new(data_dir.clone(), pending_dir.clone(), Duration::from_secs(60));
    let period = rotation.open_period(at(9, 0, 0)).unwrap();
    std::fs::write(period.probe_path(), "{\"kind\":\"ping\"}\n{\"kind\":\"trace\"}\n").unwrap();
    std::fs::write(period.losses_path(), "{\"2026-03-14 09:00\":{\"packets\":12,\"reached\":1,\"losses\":91.67}}").unwrap();
    let probe_before = std::fs::read(period.probe_path()).unwrap();
    let losses_before = std::fs::read(period.losses_path()).unwrap();

    // A directory squatting on the temp archive name makes the zip write fail.
    std::fs::create_dir(pending_dir.join(".archive_2026-03-14_09-00-00.zip.partial")).unwrap();

    let err = rotation.rotate(&period, at(9, 1, 0)).unwrap_err();
    assert!(matches!(err, RotationError::Seal { .. }));
    assert_eq!(
        file_names(&data_dir),
        vec![
            "losses_2026-03-14_09-00-00.json".to_string(),
            "probe_2026-03-14_09-00-00.jsonl".to_string()
        ]
    );
    assert_eq!(std::fs::read(period.probe_path()).unwrap(), probe_before);
    assert_eq!(std::fs::read(period.losses_path()).unwrap(), losses_before);
    assert!(!pending_dir.join("archive_2026-03-14_09-00-00.zip").exists());
}

#[test]
fn existing_archive_is_never_overwritten() {
    let dir = TempDir::new().unwrap();
    let pending_dir = dir.path().join("sending");
    std::fs::create_dir_all(&pending_dir).unwrap();
    let stamp = Stamp::parse("2026-03-14_09-00-00").unwrap();
    let existing = pending_dir.join("archive_2026-03-14_09-00-00.zip");
    std::fs::write(&existing, b"original").unwrap();

    let src = dir.path().join("probe_2026-03-14_09-00-00.jsonl");
    std::fs::write(&src, b"data").unwrap();
    let err = archive::seal(&pending_dir, &stamp, &[src.clone()]).unwrap_err();
    assert!(matches!(err, ArchiveError::AlreadyExists(_)));
    assert_eq!(std::fs::read(&existing).unwrap(), b"original");
    assert!(src.exists());
}

#[test]
fn new_period_skips_stamp_with_existing_archive() {
    let dir = TempDir::new().unwrap();
    let data_dir = dir.path().join("data");
    let pending_dir = dir.path().join("sending");
    std::fs::create_dir_all(&pending_dir).unwrap();
    std::fs::write(pending_dir.join("archive_2026-03-14_09-00-00.zip"), b"sealed").unwrap();

    let period = Period::open(&data_dir, &pending_dir, at(9, 0, 0), None).unwrap();
    assert_eq!(period.stamp().as_str(), "2026-03-14_09-00-01");
}
