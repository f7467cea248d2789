// Probe result models: one JSON line per record in the active probe log

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use super::NetworkInfo;

/// Outcome of one liveness probe (`ping -c N`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub stamp: DateTime<Local>,
    pub host: String,
    /// Packets requested for this probe.
    pub sent: u32,
    /// Round-trip time of every echo that came back, in order.
    pub times_ms: Vec<f64>,
    /// Mean of `times_ms` rounded to 2 decimals; `None` when nothing came back.
    pub avg_ms: Option<f64>,
    #[serde(default)]
    pub raw: String,
    #[serde(default)]
    pub network_info: NetworkInfo,
}

impl ProbeResult {
    pub fn new(stamp: DateTime<Local>, host: &str, sent: u32, times_ms: Vec<f64>) -> Self {
        let avg_ms = average_ms(&times_ms);
        Self {
            stamp,
            host: host.to_string(),
            sent,
            times_ms,
            avg_ms,
            raw: String::new(),
            network_info: NetworkInfo::default(),
        }
    }

    /// Result for a probe that could not run at all; counts as total loss.
    pub fn failed(stamp: DateTime<Local>, host: &str, sent: u32, reason: String) -> Self {
        Self {
            raw: reason,
            ..Self::new(stamp, host, sent, Vec::new())
        }
    }

    pub fn with_raw(mut self, raw: String) -> Self {
        self.raw = raw;
        self
    }

    pub fn with_network_info(mut self, network_info: NetworkInfo) -> Self {
        self.network_info = network_info;
        self
    }

    /// Echo replies observed; capped at `sent` so duplicate replies never read as negative loss.
    pub fn reached(&self) -> u32 {
        (self.times_ms.len() as u32).min(self.sent)
    }

    pub fn is_complete(&self) -> bool {
        self.reached() >= self.sent
    }
}

fn average_ms(times: &[f64]) -> Option<f64> {
    if times.is_empty() {
        return None;
    }
    let avg = times.iter().sum::<f64>() / times.len() as f64;
    Some((avg * 100.0).round() / 100.0)
}

/// One hop of a path trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hop {
    pub hop: u32,
    pub ip: Option<String>,
    pub host: Option<String>,
}

/// Outcome of one path trace (`traceroute` / `tracert`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceResult {
    pub stamp: DateTime<Local>,
    pub host: String,
    pub hops: Vec<Hop>,
    #[serde(default)]
    pub raw: String,
    #[serde(default)]
    pub network_info: NetworkInfo,
}

impl TraceResult {
    pub fn new(stamp: DateTime<Local>, host: &str, hops: Vec<Hop>) -> Self {
        Self {
            stamp,
            host: host.to_string(),
            hops,
            raw: String::new(),
            network_info: NetworkInfo::default(),
        }
    }
}

/// Why a probe was issued; kept in the log so the collector can reconstruct escalations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeTier {
    Standard,
    Check,
    Continuous,
    /// Trace fired by the escalation itself.
    Escalation,
    /// Trace fired by the periodic timer.
    Periodic,
}

/// A line of the probe log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProbeRecord {
    Ping {
        tier: ProbeTier,
        #[serde(flatten)]
        result: ProbeResult,
    },
    Trace {
        tier: ProbeTier,
        #[serde(flatten)]
        result: TraceResult,
    },
}

impl ProbeRecord {
    pub fn is_trace(&self) -> bool {
        matches!(self, ProbeRecord::Trace { .. })
    }
}
