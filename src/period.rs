// Active period: stamp, on-disk file naming, probe log append.
// Layout: data_dir/probe_<stamp>.jsonl, data_dir/losses_<stamp>.json, pending_dir/archive_<stamp>.zip

use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone};
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::models::ProbeRecord;

const STAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Filesystem-safe period identifier. Lexicographic order matches creation order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Stamp(String);

impl Stamp {
    pub fn from_time(at: DateTime<Local>) -> Self {
        Stamp(at.format(STAMP_FORMAT).to_string())
    }

    /// Accepts only strings in stamp format, so stray files never yield a stamp.
    pub fn parse(s: &str) -> Option<Self> {
        NaiveDateTime::parse_from_str(s, STAMP_FORMAT).ok()?;
        Some(Stamp(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn to_time(&self) -> Option<DateTime<Local>> {
        let naive = NaiveDateTime::parse_from_str(&self.0, STAMP_FORMAT).ok()?;
        Local.from_local_datetime(&naive).earliest()
    }

    fn next(&self) -> Option<Self> {
        self.to_time()
            .map(|t| Stamp::from_time(t + Duration::seconds(1)))
    }
}

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Files a period owns, plus the archive it is sealed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Probe,
    Losses,
    Archive,
}

impl FileKind {
    const ALL: [FileKind; 3] = [FileKind::Probe, FileKind::Losses, FileKind::Archive];

    pub fn prefix(self) -> &'static str {
        match self {
            FileKind::Probe => "probe_",
            FileKind::Losses => "losses_",
            FileKind::Archive => "archive_",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            FileKind::Probe => ".jsonl",
            FileKind::Losses => ".json",
            FileKind::Archive => ".zip",
        }
    }

    pub fn file_name(self, stamp: &Stamp) -> String {
        format!("{}{}{}", self.prefix(), stamp, self.extension())
    }

    /// Splits `<prefix><stamp><ext>` back into kind and stamp.
    pub fn parse_file_name(name: &str) -> Option<(FileKind, Stamp)> {
        FileKind::ALL.into_iter().find_map(|kind| {
            let stamp = name
                .strip_prefix(kind.prefix())?
                .strip_suffix(kind.extension())?;
            Some((kind, Stamp::parse(stamp)?))
        })
    }
}

pub fn archive_path(pending_dir: &Path, stamp: &Stamp) -> PathBuf {
    pending_dir.join(FileKind::Archive.file_name(stamp))
}

/// The active collection window and its two files.
#[derive(Debug, Clone)]
pub struct Period {
    stamp: Stamp,
    started_at: DateTime<Local>,
    probe_path: PathBuf,
    losses_path: PathBuf,
}

impl Period {
    /// Creates empty probe log and loss summary for a new period starting at `now`.
    /// The stamp is advanced past any stamp already used in `data_dir` or `pending_dir`.
    pub fn open(
        data_dir: &Path,
        pending_dir: &Path,
        now: DateTime<Local>,
        after: Option<&Stamp>,
    ) -> std::io::Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        std::fs::create_dir_all(pending_dir)?;

        let mut stamp = Stamp::from_time(now);
        loop {
            let taken = after.is_some_and(|prev| &stamp <= prev)
                || archive_path(pending_dir, &stamp).exists()
                || data_dir.join(FileKind::Probe.file_name(&stamp)).exists()
                || data_dir.join(FileKind::Losses.file_name(&stamp)).exists();
            if !taken {
                break;
            }
            stamp = stamp.next().ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("cannot advance stamp {}", stamp),
                )
            })?;
        }

        let probe_path = data_dir.join(FileKind::Probe.file_name(&stamp));
        let losses_path = data_dir.join(FileKind::Losses.file_name(&stamp));
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&probe_path)?;
        std::fs::write(&losses_path, b"{}")?;
        tracing::info!(stamp = %stamp, dir = %data_dir.display(), "period opened");

        Ok(Self {
            stamp,
            started_at: now,
            probe_path,
            losses_path,
        })
    }

    pub fn stamp(&self) -> &Stamp {
        &self.stamp
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    pub fn probe_path(&self) -> &Path {
        &self.probe_path
    }

    pub fn losses_path(&self) -> &Path {
        &self.losses_path
    }

    pub fn files(&self) -> [PathBuf; 2] {
        [self.probe_path.clone(), self.losses_path.clone()]
    }

    /// Appends one record as a single JSON line and flushes it to disk.
    pub fn append(&self, record: &ProbeRecord) -> std::io::Result<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.probe_path)?;
        file.write_all(&line)?;
        file.sync_data()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_round_trip_through_parse() {
        let stamp = Stamp::parse("2026-03-01_12-30-05").unwrap();
        for kind in FileKind::ALL {
            let name = kind.file_name(&stamp);
            assert_eq!(FileKind::parse_file_name(&name), Some((kind, stamp.clone())));
        }
    }

    #[test]
    fn parse_rejects_foreign_files() {
        assert!(FileKind::parse_file_name("probe_notastamp.jsonl").is_none());
        assert!(FileKind::parse_file_name(".losses_2026-03-01_12-30-05.json.tmp").is_none());
        assert!(FileKind::parse_file_name("archive_2026-03-01_12-30-05.zip.partial").is_none());
        assert!(FileKind::parse_file_name("notes.txt").is_none());
    }

    #[test]
    fn next_stamp_is_one_second_later() {
        let stamp = Stamp::parse("2026-03-01_12-30-59").unwrap();
        assert_eq!(stamp.next().unwrap().as_str(), "2026-03-01_12-31-00");
    }
}
