use anyhow::Result;
use netprobe::*;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;
    tracing::info!(
        version = version::VERSION,
        host = %app_config.host,
        data_dir = %app_config.paths.data_dir.display(),
        pending_dir = %app_config.paths.pending_dir.display(),
        "starting {}",
        version::NAME
    );

    let transport = Arc::new(
        transport::HttpTransport::from_config(&app_config)
            .map_err(|e| anyhow::anyhow!("transport: {}", e))?,
    );
    tracing::info!(url = transport.url(), "upload target");

    let paths = app_config.paths.clone();
    let report = tokio::task::spawn_blocking(move || {
        recovery::reconcile(&recovery::RecoveryDirs {
            data_dir: &paths.data_dir,
            pending_dir: &paths.pending_dir,
            delivered_dir: paths.delivered_dir.as_deref(),
        })
    })
    .await??;
    if !report.is_noop() {
        tracing::info!(
            sealed = report.sealed.len(),
            discarded = report.discarded.len(),
            failed = report.failed.len(),
            dropped_empty = report.dropped_empty.len(),
            temp_removed = report.temp_removed,
            "recovery complete"
        );
    }

    let clock: Arc<dyn clock::Clock> = Arc::new(clock::SystemClock);
    let platform = prober::detect_platform();
    tracing::info!(platform = platform.name(), "probe platform detected");
    let prober = Arc::new(prober::SystemProber::new(
        platform,
        clock.clone(),
        Duration::from_secs(app_config.timing.probe_timeout_secs),
    ));

    let rotation = rotation::RotationManager::new(
        app_config.paths.data_dir.clone(),
        app_config.paths.pending_dir.clone(),
        Duration::from_secs(app_config.timing.rotation_secs),
    );
    let monitor = monitor::Monitor::new(
        monitor::MonitorConfig::from_app(&app_config),
        prober,
        clock,
        rotation,
    )?;

    let queue = sender::UploadQueue::new(
        app_config.paths.pending_dir.clone(),
        app_config.paths.delivered_dir.clone(),
        transport,
        Duration::from_secs(app_config.timing.timeouts.upload_secs),
    );

    let (monitor_shutdown_tx, monitor_shutdown_rx) = tokio::sync::oneshot::channel();
    let (sender_shutdown_tx, sender_shutdown_rx) = tokio::sync::oneshot::channel();
    let monitor_handle = monitor::spawn(monitor, monitor_shutdown_rx);
    let sender_handle = sender::spawn(
        queue,
        Duration::from_secs(app_config.timing.sender_check_secs),
        sender_shutdown_rx,
    );

    shutdown_signal().await;
    tracing::info!("Received shutdown signal");
    let _ = monitor_shutdown_tx.send(());
    let _ = sender_shutdown_tx.send(());
    let _ = monitor_handle.await;
    let _ = sender_handle.await;

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
