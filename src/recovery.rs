// Startup orphan reconciliation: seal period files a previous run left behind.
// Runs once before the monitor starts. Idempotent: a second pass finds nothing to do.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

use crate::archive;
use crate::losses::LossMap;
use crate::period::{FileKind, Stamp, archive_path};

/// What one reconciliation pass did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Stamps sealed into a new archive.
    pub sealed: Vec<Stamp>,
    /// Stamps whose orphans were dropped because an archive already existed.
    pub discarded: Vec<Stamp>,
    /// Stamps whose seal failed; their files are left for the next start.
    pub failed: Vec<Stamp>,
    /// Stamps whose files held no data (a period opened just before a crash); removed unsealed.
    pub dropped_empty: Vec<Stamp>,
    /// Half-written temp files removed.
    pub temp_removed: usize,
}

impl RecoveryReport {
    pub fn is_noop(&self) -> bool {
        self.sealed.is_empty()
            && self.discarded.is_empty()
            && self.failed.is_empty()
            && self.dropped_empty.is_empty()
            && self.temp_removed == 0
    }
}

/// Directories inspected by reconciliation.
#[derive(Debug, Clone)]
pub struct RecoveryDirs<'a> {
    pub data_dir: &'a Path,
    pub pending_dir: &'a Path,
    /// Archives moved here count as existing.
    pub delivered_dir: Option<&'a Path>,
}

#[instrument(skip(dirs), fields(data_dir = %dirs.data_dir.display(), pending_dir = %dirs.pending_dir.display()))]
pub fn reconcile(dirs: &RecoveryDirs<'_>) -> anyhow::Result<RecoveryReport> {
    std::fs::create_dir_all(dirs.data_dir)?;
    std::fs::create_dir_all(dirs.pending_dir)?;

    let mut report = RecoveryReport::default();
    let mut orphans: BTreeMap<Stamp, Vec<PathBuf>> = BTreeMap::new();

    for dir in [dirs.data_dir, dirs.pending_dir] {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if archive::is_partial(&name) || is_summary_temp(&name) {
                match std::fs::remove_file(entry.path()) {
                    Ok(()) => report.temp_removed += 1,
                    Err(e) => warn!(error = %e, file = %name, "failed to remove temp file"),
                }
                continue;
            }
            if let Some((FileKind::Probe | FileKind::Losses, stamp)) =
                FileKind::parse_file_name(&name)
            {
                orphans.entry(stamp).or_default().push(entry.path());
            }
        }
    }

    for (stamp, files) in orphans {
        if archive_exists(dirs, &stamp) {
            let leftover = archive::remove_files(&files);
            if leftover.is_empty() {
                info!(stamp = %stamp, files = files.len(), "archive exists, orphans discarded");
            }
            report.discarded.push(stamp);
            continue;
        }
        if holds_no_data(&files) {
            archive::remove_files(&files);
            info!(stamp = %stamp, "empty orphan period dropped");
            report.dropped_empty.push(stamp);
            continue;
        }
        match archive::seal(dirs.pending_dir, &stamp, &files) {
            Ok(sealed) => {
                info!(
                    stamp = %stamp,
                    archive = %sealed.archive.display(),
                    files = sealed.packed.len(),
                    "orphan period sealed"
                );
                report.sealed.push(stamp);
            }
            Err(e) => {
                warn!(error = %e, stamp = %stamp, operation = "recover_seal", "failed to seal orphan period");
                report.failed.push(stamp);
            }
        }
    }

    Ok(report)
}

fn archive_exists(dirs: &RecoveryDirs<'_>, stamp: &Stamp) -> bool {
    archive_path(dirs.pending_dir, stamp).exists()
        || dirs
            .delivered_dir
            .is_some_and(|d| archive_path(d, stamp).exists())
}

/// Empty probe log and a loss summary without buckets.
fn holds_no_data(files: &[PathBuf]) -> bool {
    files.iter().all(|path| {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match FileKind::parse_file_name(&name) {
            Some((FileKind::Probe, _)) => std::fs::metadata(path).is_ok_and(|m| m.len() == 0),
            Some((FileKind::Losses, _)) => LossMap::load(path).is_ok_and(|m| m.is_empty()),
            _ => false,
        }
    })
}

/// `.losses_<stamp>.json.tmp` left by an interrupted summary write.
fn is_summary_temp(name: &str) -> bool {
    name.strip_prefix('.')
        .and_then(|n| n.strip_suffix(".tmp"))
        .and_then(FileKind::parse_file_name)
        .is_some_and(|(kind, _)| kind == FileKind::Losses)
}
