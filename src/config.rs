// Application config: TOML file, serde defaults, validation, env fallbacks for upload target.

use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Target host for liveness probes and path traces.
    pub host: String,
    pub paths: PathsConfig,
    pub ping: PingConfig,
    pub timing: TimingConfig,
    pub upload: UploadConfig,
    pub losses: LossesConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "1.1.1.1".into(),
            paths: PathsConfig::default(),
            ping: PingConfig::default(),
            timing: TimingConfig::default(),
            upload: UploadConfig::default(),
            losses: LossesConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Active period files (`probe_<stamp>.jsonl`, `losses_<stamp>.json`).
    pub data_dir: PathBuf,
    /// Sealed archives awaiting delivery.
    pub pending_dir: PathBuf,
    /// When set, delivered archives are moved here instead of deleted.
    pub delivered_dir: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".into(),
            pending_dir: "sending".into(),
            delivered_dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PingConfig {
    pub standard: StandardPingConfig,
    pub check: CheckPingConfig,
    pub continuous: ContinuousPingConfig,
}

/// Regular liveness probe issued every tick.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StandardPingConfig {
    pub packet_count: u32,
    /// Tick interval in seconds.
    pub delay: u64,
}

impl Default for StandardPingConfig {
    fn default() -> Self {
        Self {
            packet_count: 2,
            delay: 10,
        }
    }
}

/// Heavier confirmation probe issued when a standard probe loses packets.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CheckPingConfig {
    pub packet_count: u32,
}

impl Default for CheckPingConfig {
    fn default() -> Self {
        Self { packet_count: 10 }
    }
}

/// Probe repeated while waiting for the connection to come back.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContinuousPingConfig {
    pub packet_count: u32,
    /// Pause between attempts in seconds (0 = back-to-back).
    pub delay: u64,
}

impl Default for ContinuousPingConfig {
    fn default() -> Self {
        Self {
            packet_count: 1,
            delay: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub timeouts: TimeoutsConfig,
    pub trace_check_secs: u64,
    pub rotation_secs: u64,
    pub sender_check_secs: u64,
    /// Upper bound for a single ping/traceroute subprocess.
    pub probe_timeout_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            timeouts: TimeoutsConfig::default(),
            trace_check_secs: 300,
            rotation_secs: 1000,
            sender_check_secs: 60,
            probe_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeoutsConfig {
    pub connect_secs: u64,
    pub upload_secs: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            connect_secs: 10,
            upload_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub endpoint: String,
    /// Collector-side identifier of this probe; falls back to env `ROOM` (or `room`).
    pub room: Option<u32>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://monitor.slavapmk.ru".into(),
            room: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LossesConfig {
    /// Drop minute buckets without loss when the minute closes.
    pub prune_lossless: bool,
}

impl Default for LossesConfig {
    fn default() -> Self {
        Self {
            prune_lossless: true,
        }
    }
}

impl AppConfig {
    /// Load from `CONFIG_FILE` (default `config.toml`). A missing file means all defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let mut config = match std::fs::read_to_string(&path) {
            Ok(s) => toml::from_str(&s)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path, "config file not found, using defaults");
                AppConfig::default()
            }
            Err(e) => return Err(e.into()),
        };
        config.apply_env_fallbacks();
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_fallbacks(&mut self) {
        if self.upload.room.is_none()
            && let Some(room) = ["ROOM", "room"]
                .into_iter()
                .find_map(|key| std::env::var(key).ok())
                .and_then(|r| r.trim().parse().ok())
        {
            self.upload.room = Some(room);
        }
        if self.upload.endpoint.is_empty()
            && let Ok(endpoint) = std::env::var("UPLOAD_SERVER")
        {
            self.upload.endpoint = endpoint;
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.host.trim().is_empty(), "host must be non-empty");
        anyhow::ensure!(
            self.paths.data_dir != self.paths.pending_dir,
            "paths.data_dir and paths.pending_dir must differ, both are {}",
            self.paths.data_dir.display()
        );
        anyhow::ensure!(
            self.ping.standard.packet_count > 0,
            "ping.standard.packet_count must be > 0, got {}",
            self.ping.standard.packet_count
        );
        anyhow::ensure!(
            self.ping.standard.delay > 0,
            "ping.standard.delay must be > 0, got {}",
            self.ping.standard.delay
        );
        anyhow::ensure!(
            self.ping.check.packet_count > 0,
            "ping.check.packet_count must be > 0, got {}",
            self.ping.check.packet_count
        );
        anyhow::ensure!(
            self.ping.continuous.packet_count > 0,
            "ping.continuous.packet_count must be > 0, got {}",
            self.ping.continuous.packet_count
        );
        anyhow::ensure!(
            self.timing.trace_check_secs > 0,
            "timing.trace_check_secs must be > 0, got {}",
            self.timing.trace_check_secs
        );
        anyhow::ensure!(
            self.timing.rotation_secs > 0,
            "timing.rotation_secs must be > 0, got {}",
            self.timing.rotation_secs
        );
        anyhow::ensure!(
            self.timing.sender_check_secs > 0,
            "timing.sender_check_secs must be > 0, got {}",
            self.timing.sender_check_secs
        );
        anyhow::ensure!(
            self.timing.probe_timeout_secs > 0,
            "timing.probe_timeout_secs must be > 0, got {}",
            self.timing.probe_timeout_secs
        );
        anyhow::ensure!(
            self.timing.timeouts.connect_secs > 0,
            "timing.timeouts.connect_secs must be > 0, got {}",
            self.timing.timeouts.connect_secs
        );
        anyhow::ensure!(
            self.timing.timeouts.upload_secs > 0,
            "timing.timeouts.upload_secs must be > 0, got {}",
            self.timing.timeouts.upload_secs
        );
        anyhow::ensure!(
            self.upload.endpoint.starts_with("http://")
                || self.upload.endpoint.starts_with("https://"),
            "upload.endpoint must be an http(s) URL, got {:?}",
            self.upload.endpoint
        );
        Ok(())
    }
}
