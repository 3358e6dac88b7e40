use super::classify::classify;
use super::DeviceDetectionStrategy;
use crate::config::ScanConfig;
use crate::errors::NetworkDiscoveryError;
use crate::model::{Capability, NetworkDevice};
use crate::net::probe::HostProber;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::BTreeSet;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

/// Connect-scan of the configured ports, followed by capability mapping and classification
pub struct PortScanStrategy {
    ports: Vec<u16>,
    port_timeout: Duration,
    prober: Arc<dyn HostProber>,
}

impl PortScanStrategy {
    pub fn new(config: &ScanConfig, prober: Arc<dyn HostProber>) -> Self {
        Self {
            ports: config.ports.clone(),
            port_timeout: config.port_timeout(),
            prober,
        }
    }

    /// Try every port at once, each bounded by its own timeout, and return the ones that accepted
    pub async fn scan_ports(&self, ip: IpAddr) -> BTreeSet<u16> {
        stream::iter(self.ports.iter().copied())
            .map(|port| async move {
                match timeout(self.port_timeout, self.prober.is_port_open(ip, port)).await {
                    Ok(true) => {
                        debug!(%ip, port, "Port open");
                        Some(port)
                    }
                    _ => None,
                }
            })
            .buffer_unordered(self.ports.len().max(1))
            .filter_map(|result| async move { result })
            .collect()
            .await
    }
}

#[async_trait]
impl DeviceDetectionStrategy for PortScanStrategy {
    fn name(&self) -> &'static str {
        "TCP connect scan with capability classification"
    }

    async fn detect(&self, device: &mut NetworkDevice) -> Result<(), NetworkDiscoveryError> {
        let open_ports = self.scan_ports(device.ip).await;

        // Written together so the record never holds a partial result
        device.capabilities = Capability::from_ports(&open_ports);
        device.device_type = classify(&open_ports);
        device.open_ports = open_ports;

        Ok(())
    }
}
