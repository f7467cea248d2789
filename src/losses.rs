// Loss accounting: per-minute sent/reached counters for the active period.
// The summary file is a JSON object keyed by "YYYY-MM-DD HH:MM" -> {packets, reached, losses}.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

/// Minute key format of the loss summary.
pub const MINUTE_FORMAT: &str = "%Y-%m-%d %H:%M";

pub fn minute_key(at: DateTime<Local>) -> String {
    at.format(MINUTE_FORMAT).to_string()
}

/// `round(100 * (sent - reached) / sent, 2)`, or 0 when nothing was sent.
pub fn loss_percent(packets: u64, reached: u64) -> f64 {
    if packets == 0 {
        return 0.0;
    }
    let lost = packets.saturating_sub(reached) as f64;
    (10_000.0 * lost / packets as f64).round() / 100.0
}

/// Counters for one calendar minute. `losses` is derived on serialization and ignored on load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BucketRepr", into = "BucketRepr")]
pub struct MinuteBucket {
    packets: u64,
    reached: u64,
}

impl MinuteBucket {
    pub fn new(packets: u64, reached: u64) -> Self {
        Self { packets, reached }
    }

    pub fn packets(&self) -> u64 {
        self.packets
    }

    pub fn reached(&self) -> u64 {
        self.reached
    }

    pub fn losses(&self) -> f64 {
        loss_percent(self.packets, self.reached)
    }

    pub fn has_loss(&self) -> bool {
        self.reached < self.packets
    }

    fn record(&mut self, sent: u64, reached: u64) {
        self.packets += sent;
        self.reached += reached.min(sent);
    }
}

#[derive(Serialize, Deserialize)]
struct BucketRepr {
    packets: u64,
    reached: u64,
    #[serde(default)]
    losses: f64,
}

impl From<BucketRepr> for MinuteBucket {
    fn from(r: BucketRepr) -> Self {
        MinuteBucket::new(r.packets, r.reached)
    }
}

impl From<MinuteBucket> for BucketRepr {
    fn from(b: MinuteBucket) -> Self {
        BucketRepr {
            packets: b.packets,
            reached: b.reached,
            losses: b.losses(),
        }
    }
}

/// Minute buckets of one period, ordered by minute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LossMap {
    buckets: BTreeMap<String, MinuteBucket>,
}

impl LossMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one observation to the bucket for `minute`, creating it if absent.
    /// Every call is a new observation; nothing is deduplicated.
    pub fn update(&mut self, minute: &str, sent: u64, reached: u64) -> MinuteBucket {
        let bucket = self.buckets.entry(minute.to_string()).or_default();
        bucket.record(sent, reached);
        *bucket
    }

    pub fn get(&self, minute: &str) -> Option<&MinuteBucket> {
        self.buckets.get(minute)
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MinuteBucket)> {
        self.buckets.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Compaction at minute rollover: drops `minute` if it saw no loss. Buckets with loss are kept.
    /// Returns true when the bucket was dropped.
    pub fn prune_lossless(&mut self, minute: &str) -> bool {
        match self.buckets.get(minute) {
            Some(bucket) if !bucket.has_loss() => {
                self.buckets.remove(minute);
                true
            }
            _ => false,
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let bytes = std::fs::read(path)?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Writes the summary next to `path` and renames it into place, so a crash leaves
    /// either the previous or the new summary, never a truncated one.
    pub fn persist(&self, path: &Path) -> std::io::Result<()> {
        let tmp = temp_path(path);
        let json = serde_json::to_vec_pretty(self)?;
        {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(&json)?;
            file.sync_data()?;
        }
        std::fs::rename(&tmp, path)
    }
}

/// `.<name>.tmp` in the same directory; the leading dot keeps it out of stamp scans.
pub fn temp_path(path: &Path) -> std::path::PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp", name))
}
