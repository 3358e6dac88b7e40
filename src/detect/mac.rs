use super::DeviceDetectionStrategy;
use crate::errors::NetworkDiscoveryError;
use crate::model::NetworkDevice;
use crate::net::{interface, subnet::SubnetPrefix};
use async_trait::async_trait;
use libarp::client::ArpClient;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

/// Best-effort MAC address resolution over ARP.
///
/// Needs raw socket access on the chosen interface; without it every lookup
/// quietly leaves the MAC unset. Unless a fixed interface is given, the
/// interface is chosen per host from the /24 the host belongs to.
pub struct MacAddressStrategy {
    interface_name: Option<String>,
    arp_timeout: Duration,
    attached: Mutex<HashMap<SubnetPrefix, Option<String>>>,
}

impl MacAddressStrategy {
    pub fn new(interface_name: Option<String>, arp_timeout: Duration) -> Self {
        Self {
            interface_name,
            arp_timeout,
            attached: Mutex::new(HashMap::new()),
        }
    }

    /// Interface used to reach `ip`: the fixed one, else the one attached to its /24
    pub fn interface_for(&self, ip: Ipv4Addr) -> Option<String> {
        if let Some(ref name) = self.interface_name {
            return Some(name.clone());
        }

        let subnet = SubnetPrefix::from_ip(ip);
        let mut attached = self.attached.lock().unwrap_or_else(|e| e.into_inner());
        attached
            .entry(subnet)
            .or_insert_with(|| {
                interface::find_network_interface(&subnet).unwrap_or_else(|e| {
                    warn!(network = %subnet.cidr(), "Interface lookup failed: {}", e);
                    None
                })
            })
            .clone()
    }

    async fn resolve(&self, ip: IpAddr) -> Option<String> {
        let IpAddr::V4(ipv4) = ip else {
            return None;
        };
        let iface_name = self.interface_for(ipv4)?;

        let mut client = ArpClient::new_with_iface_name(&iface_name).ok()?;
        match client.ip_to_mac(ipv4, Some(self.arp_timeout)).await {
            Ok(mac) => {
                debug!(%ip, %mac, "MAC address found");
                Some(mac.to_string().to_uppercase())
            }
            Err(_) => None,
        }
    }
}

#[async_trait]
impl DeviceDetectionStrategy for MacAddressStrategy {
    fn name(&self) -> &'static str {
        "ARP MAC address lookup"
    }

    async fn detect(&self, device: &mut NetworkDevice) -> Result<(), NetworkDiscoveryError> {
        device.mac = self.resolve(device.ip).await;
        Ok(())
    }
}
