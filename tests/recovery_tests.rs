// Startup reconciliation tests: orphan sealing, discard when archived, idempotence

mod common;

use common::{file_names, zip_entries};
use netprobe::recovery::{RecoveryDirs, reconcile};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct Dirs {
    _root: TempDir,
    data: PathBuf,
    pending: PathBuf,
    delivered: PathBuf,
}

fn dirs() -> Dirs {
    let root = TempDir::new().unwrap();
    let data = root.path().join("data");
    let pending = root.path().join("sending");
    let delivered = root.path().join("delivered");
    for d in [&data, &pending, &delivered] {
        std::fs::create_dir_all(d).unwrap();
    }
    Dirs {
        _root: root,
        data,
        pending,
        delivered,
    }
}

impl Dirs {
    fn recovery(&self) -> RecoveryDirs<'_> {
        RecoveryDirs {
            data_dir: &self.data,
            pending_dir: &self.pending,
            delivered_dir: Some(&self.delivered),
        }
    }
}

fn touch(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    path
}

#[test]
fn orphaned_period_is_sealed() {
    let d = dirs();
    touch(&d.data, "probe_2026-03-14_08-00-00.jsonl", "{}\n");
    touch(&d.data, "losses_2026-03-14_08-00-00.json", "{}");

    let report = reconcile(&d.recovery()).unwrap();
    assert_eq!(report.sealed.len(), 1);
    assert_eq!(report.sealed[0].as_str(), "2026-03-14_08-00-00");
    assert!(file_names(&d.data).is_empty());

    let archive = d.pending.join("archive_2026-03-14_08-00-00.zip");
    assert_eq!(
        zip_entries(&archive),
        vec![
            "losses_2026-03-14_08-00-00.json".to_string(),
            "probe_2026-03-14_08-00-00.jsonl".to_string()
        ]
    );
}

#[test]
fn each_stamp_gets_its_own_archive() {
    let d = dirs();
    touch(&d.data, "probe_2026-03-14_08-00-00.jsonl", "a\n");
    touch(&d.data, "probe_2026-03-14_08-16-40.jsonl", "b\n");
    touch(&d.data, "losses_2026-03-14_08-16-40.json", "{}");

    let report = reconcile(&d.recovery()).unwrap();
    assert_eq!(report.sealed.len(), 2);
    assert_eq!(
        file_names(&d.pending),
        vec![
            "archive_2026-03-14_08-00-00.zip".to_string(),
            "archive_2026-03-14_08-16-40.zip".to_string()
        ]
    );
    assert_eq!(
        zip_entries(&d.pending.join("archive_2026-03-14_08-00-00.zip")),
        vec!["probe_2026-03-14_08-00-00.jsonl".to_string()]
    );
}

#[test]
fn orphans_in_pending_dir_are_sealed_too() {
    let d = dirs();
    touch(&d.pending, "probe_2026-03-14_08-00-00.jsonl", "a\n");

    let report = reconcile(&d.recovery()).unwrap();
    assert_eq!(report.sealed.len(), 1);
    assert_eq!(
        file_names(&d.pending),
        vec!["archive_2026-03-14_08-00-00.zip".to_string()]
    );
}

#[test]
fn already_archived_orphans_are_discarded() {
    let d = dirs();
    let archive = touch(&d.pending, "archive_2026-03-14_08-00-00.zip", "sealed");
    touch(&d.data, "probe_2026-03-14_08-00-00.jsonl", "late copy\n");

    let report = reconcile(&d.recovery()).unwrap();
    assert!(report.sealed.is_empty());
    assert_eq!(report.discarded.len(), 1);
    assert!(file_names(&d.data).is_empty());
    assert_eq!(std::fs::read_to_string(&archive).unwrap(), "sealed");
}

#[test]
fn delivered_archive_counts_as_existing() {
    let d = dirs();
    touch(&d.delivered, "archive_2026-03-14_08-00-00.zip", "sent");
    touch(&d.data, "losses_2026-03-14_08-00-00.json", "{}");

    let report = reconcile(&d.recovery()).unwrap();
    assert_eq!(report.discarded.len(), 1);
    assert!(file_names(&d.pending).is_empty());
    assert!(file_names(&d.data).is_empty());
}

#[test]
fn temp_files_are_removed_and_unrelated_files_kept() {
    let d = dirs();
    touch(&d.pending, ".archive_2026-03-14_08-00-00.zip.partial", "half");
    touch(&d.data, ".losses_2026-03-14_08-00-00.json.tmp", "{\"2026");
    touch(&d.data, "notes.txt", "keep me");

    let report = reconcile(&d.recovery()).unwrap();
    assert_eq!(report.temp_removed, 2);
    assert!(report.sealed.is_empty());
    assert_eq!(file_names(&d.data), vec!["notes.txt".to_string()]);
    assert!(file_names(&d.pending).is_empty());
}

#[test]
fn second_pass_is_a_noop() {
    let d = dirs();
    touch(&d.data, "probe_2026-03-14_08-00-00.jsonl", "{}\n");
    touch(&d.pending, ".archive_2026-03-14_07-00-00.zip.partial", "half");

    let first = reconcile(&d.recovery()).unwrap();
    assert!(!first.is_noop());
    let pending_after_first = file_names(&d.pending);

    let second = reconcile(&d.recovery()).unwrap();
    assert!(second.is_noop());
    assert_eq!(file_names(&d.pending), pending_after_first);
}

#[test]
fn missing_directories_are_created() {
    let root = TempDir::new().unwrap();
    let data = root.path().join("fresh/data");
    let pending = root.path().join("fresh/sending");
    let report = reconcile(&RecoveryDirs {
        data_dir: &data,
        pending_dir: &pending,
        delivered_dir: None,
    })
    .unwrap();
    assert!(report.is_noop());
    assert!(data.is_dir());
    assert!(pending.is_dir());
}

#[test]
fn period_without_data_is_dropped_not_archived() {
    let d = dirs();
    // Successor opened right before a crash: empty log and empty summary.
    touch(&d.data, "probe_2026-03-14_08-16-40.jsonl", "");
    touch(&d.data, "losses_2026-03-14_08-16-40.json", "{}");

    let report = reconcile(&d.recovery()).unwrap();
    assert_eq!(report.dropped_empty.len(), 1);
    assert_eq!(report.dropped_empty[0].as_str(), "2026-03-14_08-16-40");
    assert!(report.sealed.is_empty());
    assert!(file_names(&d.data).is_empty());
    assert!(file_names(&d.pending).is_empty());

    assert!(reconcile(&d.recovery()).unwrap().is_noop());
}

#[test]
fn summary_with_buckets_is_sealed_even_with_empty_log() {
    let d = dirs();
    touch(&d.data, "probe_2026-03-14_08-00-00.jsonl", "");
    touch(
        &d.data,
        "losses_2026-03-14_08-00-00.json",
        "{\"2026-03-14 08:00\":{\"packets\":2,\"reached\":1,\"losses\":50.0}}",
    );

    let report = reconcile(&d.recovery()).unwrap();
    assert_eq!(report.sealed.len(), 1);
    assert!(report.dropped_empty.is_empty());
    assert_eq!(
        file_names(&d.pending),
        vec!["archive_2026-03-14_08-00-00.zip".to_string()]
    );
}
