// Network interface models attached to every probe result

use serde::{Deserialize, Serialize};

/// Interface class inferred from its name; naming conventions differ per platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceKind {
    Wifi,
    Ethernet,
    Vpn,
    Loopback,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceStat {
    pub name: String,
    pub mac: Option<String>,
    pub ipv4: Vec<String>,
    pub ipv6: Vec<String>,
    pub gateway: Option<String>,
    /// Link speed in bits per second, 0 when unknown.
    #[serde(default)]
    pub speed: u64,
    pub is_up: bool,
    pub kind: InterfaceKind,
}

impl InterfaceStat {
    /// Up and carrying either an address or a hardware address.
    pub fn is_working(&self) -> bool {
        self.is_up && (!self.ipv4.is_empty() || self.mac.is_some())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkInfo {
    pub interfaces: Vec<InterfaceStat>,
}
