// Upload queue: the pending directory is the queue. An archive present there is undelivered;
// it is removed (deleted or moved to delivered_dir) only after the transport confirms success.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::time::{Duration, interval};
use tracing::{debug, info, instrument, warn};

use crate::period::FileKind;
use crate::transport::{Transport, TransportError};

/// Outcome of one pass over the pending directory.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DrainReport {
    pub delivered: Vec<String>,
    pub failed: Vec<String>,
}

pub struct UploadQueue {
    pending_dir: PathBuf,
    delivered_dir: Option<PathBuf>,
    transport: Arc<dyn Transport>,
    upload_timeout: Duration,
}

impl UploadQueue {
    pub fn new(
        pending_dir: PathBuf,
        delivered_dir: Option<PathBuf>,
        transport: Arc<dyn Transport>,
        upload_timeout: Duration,
    ) -> Self {
        Self {
            pending_dir,
            delivered_dir,
            transport,
            upload_timeout,
        }
    }

    pub fn pending_dir(&self) -> &Path {
        &self.pending_dir
    }

    /// Sealed archives awaiting delivery, oldest stamp first.
    pub fn pending(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut archives = Vec::new();
        for entry in std::fs::read_dir(&self.pending_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let is_archive = matches!(
                FileKind::parse_file_name(&name.to_string_lossy()),
                Some((FileKind::Archive, _))
            );
            if is_archive && entry.file_type()?.is_file() {
                archives.push(entry.path());
            }
        }
        archives.sort();
        Ok(archives)
    }

    /// Tries every pending archive once. Failures leave the archive in place for the next pass.
    #[instrument(skip(self), fields(pending_dir = %self.pending_dir.display()))]
    pub async fn drain_once(&self) -> std::io::Result<DrainReport> {
        let archives = self.pending()?;
        let mut report = DrainReport::default();
        if archives.is_empty() {
            return Ok(report);
        }
        info!(count = archives.len(), "archives pending delivery");

        for path in archives {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            match self.deliver(&path, &name).await {
                Ok(()) => match self.release(&path, &name) {
                    Ok(()) => {
                        info!(archive = %name, "archive delivered");
                        report.delivered.push(name);
                    }
                    Err(e) => {
                        // Uploaded but still pending: it will be sent again next pass.
                        warn!(error = %e, archive = %name, operation = "release", "failed to remove delivered archive");
                        report.failed.push(name);
                    }
                },
                Err(e) => {
                    warn!(error = %e, archive = %name, operation = "upload", "delivery failed, will retry");
                    report.failed.push(name);
                }
            }
        }
        Ok(report)
    }

    async fn deliver(&self, path: &Path, name: &str) -> Result<(), TransportError> {
        let bytes = tokio::fs::read(path).await?;
        match tokio::time::timeout(self.upload_timeout, self.transport.upload(name, bytes)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(self.upload_timeout)),
        }
    }

    fn release(&self, path: &Path, name: &str) -> std::io::Result<()> {
        match &self.delivered_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                std::fs::rename(path, dir.join(name))
            }
            None => std::fs::remove_file(path),
        }
    }
}

/// Polls the pending directory every `poll_interval` until shutdown.
pub fn spawn(
    queue: UploadQueue,
    poll_interval: Duration,
    mut shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = interval(poll_interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    match queue.drain_once().await {
                        Ok(report) if !report.delivered.is_empty() || !report.failed.is_empty() => {
                            debug!(
                                delivered = report.delivered.len(),
                                failed = report.failed.len(),
                                "sender pass complete"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!(error = %e, operation = "scan_pending", "failed to scan pending directory");
                        }
                    }
                }
                _ = &mut shutdown_rx => {
                    debug!("Sender shutting down");
                    break;
                }
            }
        }
    })
}
