// ping/traceroute output shared by Linux and macOS (iputils, BSD).

use regex::Regex;
use std::net::IpAddr;
use std::sync::LazyLock;

use crate::models::Hop;

// "64 bytes from 1.1.1.1: icmp_seq=1 ttl=57 time=14.2 ms". The summary line
// ("... packet loss, time 1001ms") has no '=' and must not count as a reply.
static PING_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"time[=<]\s*([\d.]+)\s*ms").expect("static regex"));

// " 1  router.lan (192.168.1.1)  0.512 ms ..." or " 3  * * *"
static TRACE_HOP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d+)\s+([^\s(]+)(?:\s+\(([\d.:a-fA-F]+)\))?").expect("static regex")
});

pub(super) fn parse_ping(output: &str) -> Vec<f64> {
    PING_TIME
        .captures_iter(output)
        .filter_map(|c| c[1].parse().ok())
        .collect()
}

pub(super) fn parse_trace(output: &str) -> Vec<Hop> {
    output
        .lines()
        .filter_map(|line| {
            let caps = TRACE_HOP.captures(line)?;
            let hop: u32 = caps[1].parse().ok()?;
            let first = &caps[2];
            let bracketed = caps.get(3).map(|m| m.as_str().to_string());
            let first_is_ip = first.parse::<IpAddr>().is_ok();
            let (ip, host) = match bracketed {
                Some(ip) => (Some(ip), (!first_is_ip).then(|| first.to_string())),
                None if first_is_ip => (Some(first.to_string()), None),
                None if first == "*" => (None, None),
                None => (None, Some(first.to_string())),
            };
            Some(Hop { hop, ip, host })
        })
        .collect()
}
