// Rotation: seal the active period into an archive once rotation_secs have elapsed,
// then start a fresh period. A failed seal leaves the period in place for the next check.

use chrono::{DateTime, Local};
use std::path::PathBuf;
use std::time::Duration;
use tracing::instrument;

use crate::archive::{self, ArchiveError, Sealed};
use crate::period::Period;

#[derive(Debug, thiserror::Error)]
pub enum RotationError {
    #[error("seal period {stamp}: {source}")]
    Seal {
        stamp: String,
        #[source]
        source: ArchiveError,
    },
    #[error("open next period: {0}")]
    Open(#[from] std::io::Error),
}

/// Period handed over after a successful rotation.
#[derive(Debug)]
pub struct Rotated {
    pub sealed: Sealed,
    pub next: Period,
}

#[derive(Debug, Clone)]
pub struct RotationManager {
    data_dir: PathBuf,
    pending_dir: PathBuf,
    interval: Duration,
}

impl RotationManager {
    pub fn new(data_dir: PathBuf, pending_dir: PathBuf, interval: Duration) -> Self {
        Self {
            data_dir,
            pending_dir,
            interval,
        }
    }

    /// Opens the first period of this run.
    pub fn open_period(&self, now: DateTime<Local>) -> std::io::Result<Period> {
        Period::open(&self.data_dir, &self.pending_dir, now, None)
    }

    pub fn is_due(&self, period: &Period, now: DateTime<Local>) -> bool {
        (now - period.started_at())
            .to_std()
            .is_ok_and(|elapsed| elapsed >= self.interval)
    }

    /// Opens the successor, then seals `period`. On error the period's files are untouched
    /// and the successor is discarded, so the caller keeps writing to `period`.
    #[instrument(skip(self, period), fields(stamp = %period.stamp()))]
    pub fn rotate(&self, period: &Period, now: DateTime<Local>) -> Result<Rotated, RotationError> {
        let next = Period::open(&self.data_dir, &self.pending_dir, now, Some(period.stamp()))?;
        let sealed = match archive::seal(&self.pending_dir, period.stamp(), &period.files()) {
            Ok(sealed) => sealed,
            Err(source) => {
                archive::remove_files(&next.files());
                return Err(RotationError::Seal {
                    stamp: period.stamp().to_string(),
                    source,
                });
            }
        };
        tracing::info!(
            archive = %sealed.archive.display(),
            files = sealed.packed.len(),
            next = %next.stamp(),
            "period sealed"
        );
        Ok(Rotated { sealed, next })
    }
}
