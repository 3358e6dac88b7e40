use crate::config::ScanConfig;
use crate::detect::{
    hostname::HostnameStrategy, mac::MacAddressStrategy, port::PortScanStrategy,
    DeviceDetectionStrategy,
};
use crate::errors::NetworkDiscoveryError;
use crate::model::NetworkDevice;
use crate::net::{
    ping::parallel_liveness_sweep,
    probe::{HostProber, NetworkProber},
    subnet::{resolve_subnet, SubnetPrefix},
};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Discovery pipeline: subnet enumeration, liveness sweep, then every detection
/// strategy against each live host
#[derive(Clone)]
pub struct DiscoveryEngine {
    config: Arc<ScanConfig>,
    prober: Arc<dyn HostProber>,
    strategies: Vec<Arc<dyn DeviceDetectionStrategy>>,
}

impl DiscoveryEngine {
    /// Engine probing the real network, with port scanning, ARP and reverse DNS
    pub fn new(config: ScanConfig) -> Self {
        let prober: Arc<dyn HostProber> = Arc::new(NetworkProber::new(&config));
        let mut strategies: Vec<Arc<dyn DeviceDetectionStrategy>> =
            vec![Arc::new(PortScanStrategy::new(&config, prober.clone()))];

        if config.resolve_mac {
            // Interface is chosen per host network
            strategies.push(Arc::new(MacAddressStrategy::new(None, config.probe_timeout())));
        }

        if config.resolve_hostnames {
            strategies.push(Arc::new(HostnameStrategy::new(config.hostname_timeout())));
        }

        Self {
            config: Arc::new(config),
            prober,
            strategies,
        }
    }

    /// Engine running only the port scanner against a caller-supplied prober
    pub fn with_prober(config: ScanConfig, prober: Arc<dyn HostProber>) -> Self {
        let strategies: Vec<Arc<dyn DeviceDetectionStrategy>> =
            vec![Arc::new(PortScanStrategy::new(&config, prober.clone()))];
        Self {
            config: Arc::new(config),
            prober,
            strategies,
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Set the maximum number of concurrent probes
    pub fn set_concurrency(&mut self, jobs: usize) {
        Arc::make_mut(&mut self.config).max_concurrent_scans = jobs.max(1);
    }

    /// Scan the configured or local /24. Failures are absorbed; the result may be empty.
    pub async fn discover(&self, cancel: &CancellationToken) -> Vec<NetworkDevice> {
        let subnet = resolve_subnet(&self.config);
        self.discover_network(subnet, cancel).await
    }

    /// Scan an explicit /24 and return one record per live host, in no particular order
    #[instrument(skip(self, subnet, cancel), fields(network = %subnet.cidr()))]
    pub async fn discover_network(
        &self,
        subnet: SubnetPrefix,
        cancel: &CancellationToken,
    ) -> Vec<NetworkDevice> {
        let scan_start = Instant::now();
        info!("Starting discovery");

        let hosts = subnet.hosts().into_iter().map(IpAddr::V4).collect();
        let active = parallel_liveness_sweep(hosts, self.prober.as_ref(), &self.config, cancel).await;

        // Single consumer: the map is only visible to this task
        let devices: HashMap<IpAddr, NetworkDevice> = stream::iter(active)
            .map(|(ip, response_time)| self.inspect(ip, Some(response_time)))
            .buffer_unordered(self.config.max_concurrent_scans.max(1))
            .take_until(cancel.cancelled())
            .map(|device| (device.ip, device))
            .collect()
            .await;

        if cancel.is_cancelled() {
            warn!(devices = devices.len(), "Discovery cancelled, returning partial results");
        }
        info!(
            devices = devices.len(),
            elapsed_ms = scan_start.elapsed().as_millis() as u64,
            "Discovery finished"
        );
        devices.into_values().collect()
    }

    /// Inspect a single address without requiring it to pass the liveness sweep
    pub async fn probe_host(&self, ip: IpAddr) -> NetworkDevice {
        let started = Instant::now();
        let alive = matches!(
            timeout(self.config.probe_timeout(), self.prober.is_alive(ip)).await,
            Ok(true)
        );
        let mut device = self.inspect(ip, alive.then(|| started.elapsed())).await;
        device.is_online = alive || !device.open_ports.is_empty();
        device
    }

    /// Run the scan as a background task. `on_complete` is called once with the final list,
    /// also when the scan is cancelled through the returned handle.
    pub fn spawn_discovery<F>(&self, on_complete: F) -> ScanHandle
    where
        F: FnOnce(Vec<NetworkDevice>) + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let engine = self.clone();

        let join = tokio::spawn(async move {
            let devices = engine.discover(&token).await;
            on_complete(devices);
        });

        ScanHandle { cancel, join }
    }

    async fn inspect(&self, ip: IpAddr, response_time: Option<Duration>) -> NetworkDevice {
        let mut device = NetworkDevice::new(ip);
        device.is_online = true;
        device.response_time = response_time;
        device.last_seen = SystemTime::now();

        for strategy in &self.strategies {
            if let Err(e) = strategy.detect(&mut device).await {
                debug!(%ip, strategy = strategy.name(), "Detection failed: {}", e);
            }
        }

        debug!(%ip, device_type = %device.device_type, "Inspected host");
        device
    }
}

/// Handle to a discovery running in the background
pub struct ScanHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl ScanHandle {
    /// Stop probing as soon as possible; hosts already inspected are still reported
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait until the completion callback has run
    pub async fn wait(self) -> Result<(), NetworkDiscoveryError> {
        self.join
            .await
            .map_err(|e| NetworkDiscoveryError::Other(format!("discovery task failed: {}", e)))
    }
}
