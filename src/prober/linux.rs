// Linux strategy: iputils ping, traceroute, /sys/class/net link state, /proc/net/route gateways.

use super::{CommandSpec, LinkState, Platform, unix};
use crate::models::{Hop, InterfaceKind};

#[derive(Debug, Clone, Copy, Default)]
pub struct Linux;

impl Platform for Linux {
    fn name(&self) -> &'static str {
        "linux"
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
        if lower.starts_with("wlan") || lower.starts_with("wifi") || lower.starts_with("wl") {
            InterfaceKind::Wifi
        } else if lower.starts_with("eth") || lower.starts_with("en") {
            InterfaceKind::Ethernet
        } else if lower.starts_with("tun") || lower.starts_with("tap") || lower.contains("vpn")
        {
            InterfaceKind::Vpn
        } else if lower == "lo" {
            InterfaceKind::Loopback
        } else {
            InterfaceKind::Unknown
        }
    }

    fn link_state(&self, interface: &str) -> LinkState {
        LinkState {
            is_up: read_operstate(interface).is_none_or(|s| s != "down"),
            speed: read_interface_speed(interface),
        }
    }

    fn default_gateways(&self) -> Vec<(String, String)> {
        std::fs::read_to_string("/proc/net/route")
            .map(|s| parse_proc_net_route(&s))
            .unwrap_or_default()
    }
}

/// /sys/class/net/<interface>/operstate ("up", "down", "unknown" for loopback).
fn read_operstate(interface: &str) -> Option<String> {
    let path = format!("/sys/class/net/{}/operstate", interface);
    std::fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
}

/// Link speed from /sys/class/net/<interface>/speed in bits per second, or 0 if unavailable.
fn read_interface_speed(interface: &str) -> u64 {
    let path = format!("/sys/class/net/{}/speed", interface);
    if let Ok(content) = std::fs::read_to_string(&path)
        && let Ok(mbps) = content.trim().parse::<i64>()
        && mbps > 0
    {
        return (mbps as u64) * 1_000_000;
    }
    0
}

/// Default routes from /proc/net/route: destination 00000000, gateway as little-endian hex.
fn parse_proc_net_route(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .skip(1)
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() < 3 || cols[1] != "00000000" {
                return None;
            }
            let raw = u32::from_str_radix(cols[2], 16).ok()?;
            let gateway = std::net::Ipv4Addr::from(raw.to_le_bytes());
            Some((cols[0].to_string(), gateway.to_string()))
        })
        .collect()
}
