use super::DeviceDetectionStrategy;
use crate::constants::UNKNOWN_HOSTNAME;
use crate::errors::NetworkDiscoveryError;
use crate::model::NetworkDevice;
use async_trait::async_trait;
use dns_lookup::lookup_addr;
use std::net::IpAddr;
use std::time::Duration;
use tokio::time::timeout;

/// Reverse DNS name resolution, bounded by a timeout
pub struct HostnameStrategy {
    lookup_timeout: Duration,
}

impl HostnameStrategy {
    pub fn new(lookup_timeout: Duration) -> Self {
        Self { lookup_timeout }
    }

    async fn reverse_dns(&self, ip: IpAddr) -> Option<String> {
        let lookup = tokio::task::spawn_blocking(move || lookup_addr(&ip).ok());
        match timeout(self.lookup_timeout, lookup).await {
            Ok(Ok(Some(name))) if name != ip.to_string() => Some(name),
            _ => None,
        }
    }
}

#[async_trait]
impl DeviceDetectionStrategy for HostnameStrategy {
    fn name(&self) -> &'static str {
        "reverse DNS hostname lookup"
    }

    async fn detect(&self, device: &mut NetworkDevice) -> Result<(), NetworkDiscoveryError> {
        device.name = self
            .reverse_dns(device.ip)
            .await
            .unwrap_or_else(|| UNKNOWN_HOSTNAME.to_string());
        Ok(())
    }
}
