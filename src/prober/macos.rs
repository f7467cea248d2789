// macOS strategy: BSD ping/traceroute share the Unix output format.

use super::{CommandSpec, Platform, unix};
use crate::models::{Hop, InterfaceKind};

#[derive(Debug, Clone, Copy, Default)]
pub struct MacOs;

impl Platform for MacOs {
    fn name(&self) -> &'static str {
        "macos"
    }

    fn ping_command(&self, host: &str, count: u32) -> CommandSpec {
        CommandSpec {
            program: "ping",
            args: vec!["-c".into(), count.to_string(), host.into()],
        }
    }

    fn trace_command(&self, host: &str) -> CommandSpec {
        CommandSpec {
            program: "traceroute",
            args: vec![host.into()],
        }
    }

    fn parse_ping(&self, output: &str) -> Vec<f64> {
        unix::parse_ping(output)
    }

    fn parse_trace(&self, output: &str) -> Vec<Hop> {
        unix::parse_trace(output)
    }

    fn classify_interface(&self, name: &str) -> InterfaceKind {
        let lower = name.to_lowercase();
        if lower.contains("wi-fi") || lower.contains("airport") || lower.starts_with("awdl") {
            InterfaceKind::Wifi
        } else if lower.starts_with("en") || lower.starts_with("eth") {
            InterfaceKind::Ethernet
        } else if lower.starts_with("utun") || lower.contains("vpn") {
            InterfaceKind::Vpn
        } else if lower == "lo0" {
            InterfaceKind::Loopback
        } else {
            InterfaceKind::Unknown
        }
    }
}
