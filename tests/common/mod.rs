// Shared test helpers: scripted prober, scripted transport, manual clock

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};
use netprobe::clock::Clock;
use netprobe::models::{Hop, ProbeRecord, ProbeResult, TraceResult};
use netprobe::monitor::MonitorConfig;
use netprobe::prober::Prober;
use netprobe::transport::{Transport, TransportError};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn at(h: u32, m: u32, s: u32) -> DateTime<Local> {
    Local
        .with_ymd_and_hms(2026, 3, 14, h, m, s)
        .single()
        .expect("unambiguous local time")
}

#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Local>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Local>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, secs: i64) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::seconds(secs);
    }

    pub fn set(&self, to: DateTime<Local>) {
        *self.now.lock().unwrap() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock().unwrap()
    }
}

/// Replies with scripted reached counts, then full success once the script runs out.
#[derive(Default)]
pub struct ScriptedProber {
    reached: Mutex<VecDeque<u32>>,
    pub pings: Mutex<Vec<u32>>,
    pub traces: AtomicUsize,
    /// Tokio instant at which each ping started.
    pub ping_started: Mutex<Vec<tokio::time::Instant>>,
    clock: Option<(Arc<ManualClock>, i64)>,
    delay: Duration,
    panic_next: AtomicBool,
}

impl ScriptedProber {
    pub fn new(script: &[u32]) -> Self {
        Self {
            reached: Mutex::new(script.iter().copied().collect()),
            ..Default::default()
        }
    }

    /// Each ping moves `clock` forward by `secs`, as a slow probe would.
    pub fn advancing(mut self, clock: Arc<ManualClock>, secs: i64) -> Self {
        self.clock = Some((clock, secs));
        self
    }

    /// Each ping takes `delay` of tokio time.
    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// The next ping panics instead of answering.
    pub fn panic_once(&self) {
        self.panic_next.store(true, Ordering::SeqCst);
    }

    pub fn push(&self, reached: &[u32]) {
        self.reached.lock().unwrap().extend(reached.iter().copied());
    }

    pub fn ping_counts(&self) -> Vec<u32> {
        self.pings.lock().unwrap().clone()
    }

    pub fn ping_starts(&self) -> Vec<tokio::time::Instant> {
        self.ping_started.lock().unwrap().clone()
    }

    pub fn trace_count(&self) -> usize {
        self.traces.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn ping(&self, host: &str, count: u32) -> ProbeResult {
        if self.panic_next.swap(false, Ordering::SeqCst) {
            panic!("scripted prober failure");
        }
        self.ping_started
            .lock()
            .unwrap()
            .push(tokio::time::Instant::now());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some((clock, secs)) = &self.clock {
            clock.advance(*secs);
        }
        self.pings.lock().unwrap().push(count);
        let reached = self
            .reached
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(count)
            .min(count);
        ProbeResult::new(Local::now(), host, count, vec![12.5; reached as usize])
    }

    async fn trace(&self, host: &str) -> TraceResult {
        self.traces.fetch_add(1, Ordering::SeqCst);
        TraceResult::new(
            Local::now(),
            host,
            vec![Hop {
                hop: 1,
                ip: Some("192.168.1.1".into()),
                host: None,
            }],
        )
    }
}

/// Fails the first `failures` uploads, then succeeds.
pub struct ScriptedTransport {
    failures: AtomicUsize,
    pub calls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn failing(failures: usize) -> Self {
        Self {
            failures: AtomicUsize::new(failures),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn upload(&self, name: &str, _bytes: Vec<u8>) -> Result<(), TransportError> {
        self.calls.lock().unwrap().push(name.to_string());
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(TransportError::Config("simulated failure".into()));
        }
        Ok(())
    }
}

/// Never answers; used to exercise the upload timeout.
pub struct HangingTransport;

#[async_trait]
impl Transport for HangingTransport {
    async fn upload(&self, _name: &str, _bytes: Vec<u8>) -> Result<(), TransportError> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

pub fn monitor_config(prune_lossless: bool) -> MonitorConfig {
    MonitorConfig {
        host: "1.1.1.1".into(),
        standard_count: 1,
        tick_interval: Duration::from_secs(10),
        check_count: 10,
        continuous_count: 1,
        continuous_delay: Duration::ZERO,
        trace_interval: Duration::from_secs(3600),
        prune_lossless,
    }
}

pub fn read_records(path: &Path) -> Vec<ProbeRecord> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

pub fn zip_entries(path: &Path) -> Vec<String> {
    let file = std::fs::File::open(path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    let mut names: Vec<String> = (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect();
    names.sort();
    names
}

pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
