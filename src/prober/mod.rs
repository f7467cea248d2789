// Probing: liveness (ping) and path trace (traceroute) via OS utilities.
// Per-platform command lines and output parsing are Platform strategies chosen at runtime.

mod interfaces;
mod linux;
mod macos;
mod unix;
mod windows;

pub use interfaces::InterfaceRepo;
pub use linux::Linux;
pub use macos::MacOs;
pub use windows::Windows;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

use crate::clock::Clock;
use crate::models::{Hop, InterfaceKind, ProbeResult, TraceResult};

/// Liveness and path measurements toward a host.
///
/// Implementations never fail: a probe that cannot run yields an empty result,
/// which the caller treats as total loss.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn ping(&self, host: &str, count: u32) -> ProbeResult;
    async fn trace(&self, host: &str) -> TraceResult;
}

/// Program and arguments for one probe invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: &'static str,
    pub args: Vec<String>,
}

/// Link facts a platform can read for an interface beyond what sysinfo reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkState {
    pub is_up: bool,
    /// Bits per second, 0 when unknown.
    pub speed: u64,
}

impl Default for LinkState {
    fn default() -> Self {
        Self {
            is_up: true,
            speed: 0,
        }
    }
}

/// OS-specific probe commands and output parsers.
pub trait Platform: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn ping_command(&self, host: &str, count: u32) -> CommandSpec;

    fn trace_command(&self, host: &str) -> CommandSpec;

    /// Round-trip times (ms) of every reply in ping output.
    fn parse_ping(&self, output: &str) -> Vec<f64>;

    fn parse_trace(&self, output: &str) -> Vec<Hop>;

    fn classify_interface(&self, name: &str) -> InterfaceKind;

    /// Console output to text.
    fn decode(&self, bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes).into_owned()
    }

    fn link_state(&self, _interface: &str) -> LinkState {
        LinkState::default()
    }

    /// `(interface, gateway)` pairs of default routes.
    fn default_gateways(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}

/// Strategy for the platform this process runs on.
pub fn detect_platform() -> Arc<dyn Platform> {
    match std::env::consts::OS {
        "windows" => Arc::new(Windows),
        "macos" => Arc::new(MacOs),
        _ => Arc::new(Linux),
    }
}

/// Prober shelling out to `ping` / `traceroute` (`tracert` on Windows).
pub struct SystemProber {
    platform: Arc<dyn Platform>,
    interfaces: InterfaceRepo,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl SystemProber {
    pub fn new(platform: Arc<dyn Platform>, clock: Arc<dyn Clock>, timeout: Duration) -> Self {
        Self {
            interfaces: InterfaceRepo::new(platform.clone()),
            platform,
            clock,
            timeout,
        }
    }

    async fn run(&self, spec: &CommandSpec) -> Result<String, String> {
        let mut cmd = tokio::process::Command::new(spec.program);
        cmd.args(&spec.args)
            .stdin(std::process::Stdio::null())
            .kill_on_drop(true);
        #[cfg(windows)]
        {
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }
        match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => Ok(self.platform.decode(&output.stdout)),
            Ok(Err(e)) => Err(format!("{} failed to start: {}", spec.program, e)),
            Err(_) => Err(format!(
                "{} timed out after {}s",
                spec.program,
                self.timeout.as_secs()
            )),
        }
    }

    async fn network_info(&self) -> crate::models::NetworkInfo {
        self.interfaces.snapshot().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, operation = "network_info", "interface snapshot failed");
            Default::default()
        })
    }
}

#[async_trait]
impl Prober for SystemProber {
    #[instrument(skip(self), fields(platform = self.platform.name()))]
    async fn ping(&self, host: &str, count: u32) -> ProbeResult {
        let spec = self.platform.ping_command(host, count);
        let result = match self.run(&spec).await {
            Ok(output) => {
                let times = self.platform.parse_ping(&output);
                ProbeResult::new(self.clock.now(), host, count, times).with_raw(output)
            }
            Err(reason) => {
                tracing::warn!(reason = %reason, operation = "ping", "probe did not run");
                ProbeResult::failed(self.clock.now(), host, count, reason)
            }
        };
        result.with_network_info(self.network_info().await)
    }

    #[instrument(skip(self), fields(platform = self.platform.name()))]
    async fn trace(&self, host: &str) -> TraceResult {
        let spec = self.platform.trace_command(host);
        let mut result = match self.run(&spec).await {
            Ok(output) => {
                let hops = self.platform.parse_trace(&output);
                let mut r = TraceResult::new(self.clock.now(), host, hops);
                r.raw = output;
                r
            }
            Err(reason) => {
                tracing::warn!(reason = %reason, operation = "trace", "trace did not run");
                let mut r = TraceResult::new(self.clock.now(), host, Vec::new());
                r.raw = reason;
                r
            }
        };
        result.network_info = self.network_info().await;
        result
    }
}
