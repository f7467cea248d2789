// Network interface snapshot via sysinfo, enriched by the platform strategy.

use std::sync::Arc;
use sysinfo::Networks;
use tracing::instrument;

use super::Platform;
use crate::models::{InterfaceStat, NetworkInfo};

pub struct InterfaceRepo {
    networks: Arc<std::sync::Mutex<Networks>>,
    platform: Arc<dyn Platform>,
}

impl InterfaceRepo {
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        Self {
            networks: Arc::new(std::sync::Mutex::new(Networks::new_with_refreshed_list())),
            platform,
        }
    }

    /// Working interfaces only: up, with an IPv4 address or a MAC.
    #[instrument(skip(self), fields(repo = "interfaces", operation = "snapshot"))]
    pub async fn snapshot(&self) -> anyhow::Result<NetworkInfo> {
        let networks = self.networks.clone();
        let platform = self.platform.clone();
        tokio::task::spawn_blocking(move || -> anyhow::Result<NetworkInfo> {
            let mut networks_guard = networks
                .lock()
                .map_err(|e| anyhow::anyhow!("sysinfo networks lock poisoned: {}", e))?;
            networks_guard.refresh(true);
            let gateways = platform.default_gateways();
            let mut interfaces: Vec<InterfaceStat> = networks_guard
                .list()
                .iter()
                .map(|(name, data)| {
                    let link = platform.link_state(name);
                    let mac = data.mac_address();
                    InterfaceStat {
                        name: name.clone(),
                        mac: (!mac.is_unspecified()).then(|| mac.to_string()),
                        ipv4: data
                            .ip_networks()
                            .iter()
                            .filter(|n| n.addr.is_ipv4())
                            .map(|n| n.addr.to_string())
                            .collect(),
                        ipv6: data
                            .ip_networks()
                            .iter()
                            .filter(|n| n.addr.is_ipv6())
                            .map(|n| n.addr.to_string())
                            .collect(),
                        gateway: gateways
                            .iter()
                            .find(|(iface, _)| iface == name)
                            .map(|(_, gw)| gw.clone()),
                        speed: link.speed,
                        is_up: link.is_up,
                        kind: platform.classify_interface(name),
                    }
                })
                .filter(InterfaceStat::is_working)
                .collect();
            interfaces.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(NetworkInfo { interfaces })
        })
        .await
        .map_err(|e| anyhow::anyhow!("sysinfo task join: {}", e))?
    }
}
