// Escalation loop: standard probe every tick, check probe on any loss, trace + continuous
// probing until replies come back. Owns the active period and its minute buckets.

use chrono::{DateTime, Local};
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::time::{Duration, Instant};
use tracing::{Instrument, debug, error, info, warn};

use crate::clock::Clock;
use crate::config::AppConfig;
use crate::losses::{LossMap, minute_key};
use crate::models::{ProbeRecord, ProbeResult, ProbeTier};
use crate::period::{Period, Stamp};
use crate::prober::Prober;
use crate::rotation::RotationManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationState {
    Normal,
    /// A standard probe lost packets; confirming with the check probe.
    Degraded,
    /// Loss confirmed; probing continuously until replies return.
    Recovering,
}

impl std::fmt::Display for EscalationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            EscalationState::Normal => "normal",
            EscalationState::Degraded => "degraded",
            EscalationState::Recovering => "recovering",
        })
    }
}

/// Probe cadence and counts per tier.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub host: String,
    pub standard_count: u32,
    pub tick_interval: Duration,
    pub check_count: u32,
    pub continuous_count: u32,
    pub continuous_delay: Duration,
    pub trace_interval: Duration,
    pub prune_lossless: bool,
}

impl MonitorConfig {
    pub fn from_app(config: &AppConfig) -> Self {
        Self {
            host: config.host.clone(),
            standard_count: config.ping.standard.packet_count,
            tick_interval: Duration::from_secs(config.ping.standard.delay),
            check_count: config.ping.check.packet_count,
            continuous_count: config.ping.continuous.packet_count,
            continuous_delay: Duration::from_secs(config.ping.continuous.delay),
            trace_interval: Duration::from_secs(config.timing.trace_check_secs),
            prune_lossless: config.losses.prune_lossless,
        }
    }
}

/// What happened during one tick.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TickReport {
    /// States entered during the tick, in order. Empty when the standard probe was clean.
    pub transitions: Vec<EscalationState>,
    pub pings: usize,
    pub traces: usize,
    /// Continuous probes issued while recovering.
    pub continuous_attempts: usize,
    /// Stamps sealed by rotation during the tick.
    pub sealed: Vec<Stamp>,
}

pub struct Monitor {
    config: MonitorConfig,
    prober: Arc<dyn Prober>,
    clock: Arc<dyn Clock>,
    rotation: RotationManager,
    period: Period,
    losses: LossMap,
    current_minute: String,
    state: EscalationState,
    /// `None` until the first periodic trace, so the first tick traces.
    last_trace: Option<DateTime<Local>>,
}

impl Monitor {
    /// Opens the first period. Run recovery before this so no orphan shares the directory.
    pub fn new(
        config: MonitorConfig,
        prober: Arc<dyn Prober>,
        clock: Arc<dyn Clock>,
        rotation: RotationManager,
    ) -> std::io::Result<Self> {
        let now = clock.now();
        let period = rotation.open_period(now)?;
        Ok(Self {
            config,
            prober,
            clock,
            rotation,
            period,
            losses: LossMap::new(),
            current_minute: minute_key(now),
            state: EscalationState::Normal,
            last_trace: None,
        })
    }

    pub fn state(&self) -> EscalationState {
        self.state
    }

    pub fn period(&self) -> &Period {
        &self.period
    }

    pub fn losses(&self) -> &LossMap {
        &self.losses
    }

    pub fn tick_interval(&self) -> Duration {
        self.config.tick_interval
    }

    /// One full cycle: standard probe, escalation if needed, periodic trace,
    /// minute rollover, rotation check.
    pub async fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();
        if self.state != EscalationState::Normal {
            warn!(state = %self.state, "previous tick ended mid-escalation, resetting");
            self.state = EscalationState::Normal;
        }

        let standard = self.ping(self.config.standard_count, ProbeTier::Standard, &mut report).await;
        if !standard.is_complete() {
            self.escalate(&standard, &mut report).await;
        }

        self.trace_if_due(&mut report).await;

        let now = self.clock.now();
        if self.roll_minute(&minute_key(now)) {
            self.persist_losses();
        }
        self.rotate_if_due(&mut report);
        report
    }

    async fn escalate(&mut self, standard: &ProbeResult, report: &mut TickReport) {
        self.transition(EscalationState::Degraded, report);
        info!(
            sent = standard.sent,
            reached = standard.reached(),
            "standard probe lost packets, running check probe"
        );
        let check = self.ping(self.config.check_count, ProbeTier::Check, report).await;
        if check.is_complete() {
            self.transition(EscalationState::Normal, report);
            return;
        }

        self.transition(EscalationState::Recovering, report);
        self.trace(ProbeTier::Escalation, report).await;
        info!(
            sent = check.sent,
            reached = check.reached(),
            "loss confirmed, probing continuously until replies return"
        );
        loop {
            let probe = self
                .ping(self.config.continuous_count, ProbeTier::Continuous, report)
                .await;
            report.continuous_attempts += 1;
            self.rotate_if_due(report);
            self.trace_if_due(report).await;
            if probe.reached() > 0 {
                break;
            }
            tokio::time::sleep(self.config.continuous_delay).await;
        }
        info!(attempts = report.continuous_attempts, "connection restored");
        self.transition(EscalationState::Normal, report);
    }

    /// Periodic trace on its own timer, independent of escalation state.
    async fn trace_if_due(&mut self, report: &mut TickReport) {
        let now = self.clock.now();
        let due = self
            .last_trace
            .is_none_or(|last| elapsed_at_least(last, now, self.config.trace_interval));
        if due {
            self.trace(ProbeTier::Periodic, report).await;
            self.last_trace = Some(now);
        }
    }

    fn transition(&mut self, next: EscalationState, report: &mut TickReport) {
        debug!(from = %self.state, to = %next, "state transition");
        self.state = next;
        report.transitions.push(next);
    }

    async fn ping(&mut self, count: u32, tier: ProbeTier, report: &mut TickReport) -> ProbeResult {
        let result = self.prober.ping(&self.config.host, count).await;
        report.pings += 1;
        debug!(
            tier = ?tier,
            sent = count,
            reached = result.reached(),
            avg_ms = ?result.avg_ms,
            "ping"
        );
        self.append(ProbeRecord::Ping {
            tier,
            result: result.clone(),
        });
        self.record(u64::from(count), u64::from(result.reached()));
        result
    }

    async fn trace(&mut self, tier: ProbeTier, report: &mut TickReport) {
        let result = self.prober.trace(&self.config.host).await;
        report.traces += 1;
        debug!(tier = ?tier, hops = result.hops.len(), "trace");
        self.append(ProbeRecord::Trace { tier, result });
    }

    fn append(&self, record: ProbeRecord) {
        if let Err(e) = self.period.append(&record) {
            warn!(
                error = %e,
                path = %self.period.probe_path().display(),
                operation = "append_probe_log",
                "failed to append probe record"
            );
        }
    }

    /// Adds one observation to the current minute and persists the summary immediately.
    fn record(&mut self, sent: u64, reached: u64) {
        let minute = minute_key(self.clock.now());
        self.roll_minute(&minute);
        self.losses.update(&minute, sent, reached);
        self.persist_losses();
    }

    /// Switches to `minute` when it differs from the current one, compacting the closed
    /// minute if pruning is enabled. Returns true when the map changed.
    fn roll_minute(&mut self, minute: &str) -> bool {
        if self.current_minute == minute {
            return false;
        }
        let closed = std::mem::replace(&mut self.current_minute, minute.to_string());
        let pruned = self.config.prune_lossless && self.losses.prune_lossless(&closed);
        if pruned {
            debug!(minute = %closed, "lossless minute pruned");
        }
        pruned
    }

    fn persist_losses(&self) {
        if let Err(e) = self.losses.persist(self.period.losses_path()) {
            warn!(
                error = %e,
                path = %self.period.losses_path().display(),
                operation = "persist_losses",
                "failed to write loss summary"
            );
        }
    }

    fn rotate_if_due(&mut self, report: &mut TickReport) {
        let now = self.clock.now();
        if !self.rotation.is_due(&self.period, now) {
            return;
        }
        match self.rotation.rotate(&self.period, now) {
            Ok(rotated) => {
                report.sealed.push(self.period.stamp().clone());
                self.period = rotated.next;
                self.losses = LossMap::new();
            }
            Err(e) => {
                warn!(
                    error = %e,
                    stamp = %self.period.stamp(),
                    operation = "rotate",
                    "rotation failed, keeping active period"
                );
            }
        }
    }
}

fn elapsed_at_least(since: DateTime<Local>, now: DateTime<Local>, interval: Duration) -> bool {
    (now - since).to_std().is_ok_and(|elapsed| elapsed >= interval)
}

/// Runs ticks at the configured cadence until shutdown. The sleep before the next tick is
/// `tick_interval - elapsed`, so slow probes do not stretch the cadence.
pub fn spawn(
    mut monitor: Monitor,
    mut shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    let span = tracing::span!(tracing::Level::DEBUG, "monitor", host = %monitor.config.host);
    tokio::spawn(
        async move {
            loop {
                let started = Instant::now();
                tokio::select! {
                    outcome = AssertUnwindSafe(monitor.tick()).catch_unwind() => {
                        if outcome.is_err() {
                            error!("monitor tick panicked, continuing with next tick");
                        }
                    }
                    _ = &mut shutdown_rx => {
                        debug!("Monitor shutting down");
                        break;
                    }
                }
                let pause = monitor.tick_interval().saturating_sub(started.elapsed());
                tokio::select! {
                    _ = tokio::time::sleep(pause) => {}
                    _ = &mut shutdown_rx => {
                        debug!("Monitor shutting down");
                        break;
                    }
                }
            }
        }
        .instrument(span),
    )
}
