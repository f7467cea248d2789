// Windows strategy: ping -n / tracert, console output in CP866 with English or Russian labels.

use regex::Regex;
use std::net::IpAddr;
use std::sync::LazyLock;

use super::{CommandSpec, Platform};
use crate::models::{Hop, InterfaceKind};

// "время=14мс", "время<1мс", "time=14ms", "time<1ms"
static PING_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:время|time)[=<]\s*(\d+(?:\.\d+)?)\s*(?:мс|ms)").expect("static regex")
});

// "  2     3 ms     2 ms     3 ms  edge.isp.net [10.0.0.1]"
static TRACE_HOP: LazyLock<Regex> = LazyLock::new(|| {
    let rtt = r"(<?\d+\s*(?:мс|ms)|\*)";
    Regex::new(&format!(r"(?i)^\s*(\d+)\s+{rtt}\s+{rtt}\s+{rtt}\s+(.+?)\s*$")).expect("static regex")
});

#[derive(Debug, Clone, Copy, Default)]
pub struct Windows;

impl Platform for Windows {
    fn name(&self) -> &'static str {
        "windows"
    }

    fn ping_command(&self, host: &str, count: u32) -> CommandSpec {
        CommandSpec {
            program: "ping",
            args: vec!["-n".into(), count.to_string(), host.into()],
        }
    }

    fn trace_command(&self, host: &str) -> CommandSpec {
        CommandSpec {
            program: "tracert",
            args: vec![host.into()],
        }
    }

    fn decode(&self, bytes: &[u8]) -> String {
        decode_cp866(bytes)
    }

    fn parse_ping(&self, output: &str) -> Vec<f64> {
        PING_TIME
            .captures_iter(output)
            .filter_map(|c| c[1].parse().ok())
            .collect()
    }

    fn parse_trace(&self, output: &str) -> Vec<Hop> {
        output
            .lines()
            .filter_map(|line| {
                let caps = TRACE_HOP.captures(line)?;
                let hop: u32 = caps[1].parse().ok()?;
                let timed_out = (2..=4).all(|i| &caps[i] == "*");
                if timed_out {
                    return Some(Hop {
                        hop,
                        ip: None,
                        host: None,
                    });
                }
                let (ip, host) = split_tail(&caps[5]);
                Some(Hop { hop, ip, host })
            })
            .collect()
    }

    fn classify_interface(&self, name: &str) -> InterfaceKind {
        let lower = name.to_lowercase();
        if lower.contains("wi-fi") || lower.contains("wireless") {
            InterfaceKind::Wifi
        } else if lower.contains("ethernet") {
            InterfaceKind::Ethernet
        } else if lower.contains("vpn") || lower.contains("virtual") {
            InterfaceKind::Vpn
        } else if lower.contains("loopback") {
            InterfaceKind::Loopback
        } else {
            InterfaceKind::Unknown
        }
    }
}

/// "name [ip]" or a bare address.
fn split_tail(tail: &str) -> (Option<String>, Option<String>) {
    if let Some((name, rest)) = tail.split_once('[') {
        let ip = rest.trim_end_matches(']').trim();
        let name = name.trim();
        return (
            (!ip.is_empty()).then(|| ip.to_string()),
            (!name.is_empty()).then(|| name.to_string()),
        );
    }
    if tail.parse::<IpAddr>().is_ok() {
        (Some(tail.to_string()), None)
    } else {
        (None, Some(tail.to_string()))
    }
}

/// CP866 (DOS Cyrillic) to UTF-8. Box-drawing and other graphics map to '?'.
fn decode_cp866(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| match b {
            0x00..=0x7F => b as char,
            // А..Я, а..п
            0x80..=0xAF => char::from_u32(0x0410 + (b - 0x80) as u32).unwrap_or('?'),
            // р..я
            0xE0..=0xEF => char::from_u32(0x0440 + (b - 0xE0) as u32).unwrap_or('?'),
            0xF0 => 'Ё',
            0xF1 => 'ё',
            0xFF => ' ',
            _ => '?',
        })
        .collect()
}
