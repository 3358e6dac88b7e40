use crate::config::{LivenessMethod, ScanConfig};
use crate::errors::NetworkDiscoveryError;
use async_trait::async_trait;
use futures::stream::{self, FuturesUnordered, StreamExt};
use network_interface::{NetworkInterface, NetworkInterfaceConfig};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use std::time::Duration;
use tokio::time::{timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// /24 subnet enumeration
pub mod subnet {
    use super::*;

    /// The three leading octets of a /24 network
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SubnetPrefix([u8; 3]);

    impl SubnetPrefix {
        pub fn new(a: u8, b: u8, c: u8) -> Self {
            Self([a, b, c])
        }

        /// The /24 that contains `ip`. Hosts on wider or narrower networks are not detected.
        pub fn from_ip(ip: Ipv4Addr) -> Self {
            let [a, b, c, _] = ip.octets();
            Self([a, b, c])
        }

        /// Every usable host address, `.1` through `.254`, in ascending order
        pub fn hosts(&self) -> Vec<Ipv4Addr> {
            let [a, b, c] = self.0;
            (1..=254).map(|d| Ipv4Addr::new(a, b, c, d)).collect()
        }

        pub fn contains(&self, ip: Ipv4Addr) -> bool {
            Self::from_ip(ip) == *self
        }

        pub fn cidr(&self) -> String {
            let [a, b, c] = self.0;
            format!("{}.{}.{}.0/24", a, b, c)
        }
    }

    impl fmt::Display for SubnetPrefix {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let [a, b, c] = self.0;
            write!(f, "{}.{}.{}.", a, b, c)
        }
    }

    /// Accepts `192.168.1.`, `192.168.1` and CIDR notation with a /24 prefix
    impl FromStr for SubnetPrefix {
        type Err = NetworkDiscoveryError;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            let s = s.trim();
            let invalid = || NetworkDiscoveryError::InvalidSubnet(s.to_string());

            let (octets, expected) = match s.split_once('/') {
                Some((base, "24")) => (base, 4),
                Some(_) => {
                    return Err(NetworkDiscoveryError::InvalidSubnet(format!(
                        "{}: only /24 networks are supported",
                        s
                    )))
                }
                None => (s.strip_suffix('.').unwrap_or(s), 3),
            };

            let parts = octets
                .split('.')
                .map(|p| p.parse::<u8>().map_err(|_| invalid()))
                .collect::<Result<Vec<u8>, _>>()?;
            if parts.len() != expected {
                return Err(invalid());
            }

            Ok(Self([parts[0], parts[1], parts[2]]))
        }
    }

    /// First routable IPv4 address of this machine, skipping loopback and virtual interfaces
    pub fn local_ipv4() -> Option<Ipv4Addr> {
        let interfaces = NetworkInterface::show().ok()?;
        interfaces
            .iter()
            .filter(|interface| !interface::is_virtual(&interface.name))
            .flat_map(|interface| interface.addr.iter())
            .find_map(|addr| match addr.ip() {
                IpAddr::V4(ipv4) if !ipv4.is_loopback() && !ipv4.is_unspecified() => Some(ipv4),
                _ => None,
            })
    }

    /// Pick the /24 to scan: explicit override, then the local address, then the fallback range
    pub fn resolve_subnet(config: &ScanConfig) -> SubnetPrefix {
        resolve_subnet_from(config, local_ipv4())
    }

    /// [`resolve_subnet`] with the local address supplied by the caller
    pub fn resolve_subnet_from(config: &ScanConfig, local: Option<Ipv4Addr>) -> SubnetPrefix {
        if let Some(ref subnet) = config.subnet {
            match subnet.parse() {
                Ok(prefix) => return prefix,
                Err(e) => warn!(subnet = %subnet, "Ignoring configured subnet: {}", e),
            }
        }

        if let Some(ip) = local {
            let prefix = SubnetPrefix::from_ip(ip);
            debug!(local_ip = %ip, "Derived subnet {} from local address", prefix);
            return prefix;
        }

        warn!(
            "Could not determine the local address, falling back to {}",
            config.fallback_subnet
        );
        config.fallback_subnet.parse().unwrap_or_else(|e| {
            warn!("Ignoring fallback subnet: {}", e);
            SubnetPrefix::new(192, 168, 1)
        })
    }
}

/// Liveness and port probes
pub mod probe {
    use super::*;
    use std::io::ErrorKind;
    use surge_ping::ping;
    use tokio::net::TcpStream;

    /// Network operations the discovery pipeline depends on.
    ///
    /// Callers bound every call with their own timeout, so implementations may block for as
    /// long as the underlying I/O does.
    #[async_trait]
    pub trait HostProber: Send + Sync {
        /// Whether the host answers at all, regardless of which services it runs
        async fn is_alive(&self, ip: IpAddr) -> bool;

        /// Whether a TCP connect to `port` succeeds
        async fn is_port_open(&self, ip: IpAddr, port: u16) -> bool;
    }

    /// Prober backed by real ICMP and TCP sockets
    pub struct NetworkProber {
        liveness: LivenessMethod,
        liveness_ports: Vec<u16>,
    }

    impl NetworkProber {
        pub fn new(config: &ScanConfig) -> Self {
            Self {
                liveness: config.liveness,
                liveness_ports: config.liveness_ports.clone(),
            }
        }

        async fn icmp_alive(ip: IpAddr) -> bool {
            let payload = [0; 56];
            ping(ip, &payload).await.is_ok()
        }

        async fn tcp_alive(&self, ip: IpAddr) -> bool {
            let mut pending = self
                .liveness_ports
                .iter()
                .map(|&port| async move {
                    match TcpStream::connect((ip, port)).await {
                        Ok(_) => true,
                        Err(e) => e.kind() == ErrorKind::ConnectionRefused,
                    }
                })
                .collect::<FuturesUnordered<_>>();

            while let Some(alive) = pending.next().await {
                if alive {
                    return true;
                }
            }
            false
        }
    }

    #[async_trait]
    impl HostProber for NetworkProber {
        async fn is_alive(&self, ip: IpAddr) -> bool {
            match self.liveness {
                LivenessMethod::Icmp => Self::icmp_alive(ip).await,
                LivenessMethod::Tcp => self.tcp_alive(ip).await,
                LivenessMethod::Auto => {
                    let mut pending = FuturesUnordered::new();
                    pending.push(futures::future::Either::Left(Self::icmp_alive(ip)));
                    pending.push(futures::future::Either::Right(self.tcp_alive(ip)));
                    while let Some(alive) = pending.next().await {
                        if alive {
                            return true;
                        }
                    }
                    false
                }
            }
        }

        async fn is_port_open(&self, ip: IpAddr, port: u16) -> bool {
            TcpStream::connect((ip, port)).await.is_ok()
        }
    }
}

/// Concurrent host discovery
pub mod ping {
    use super::probe::HostProber;
    use super::*;

    /// Probe every host with bounded concurrency and return the ones that answered,
    /// with their response time. Each probe is cut off by `probe_timeout`; a timeout
    /// or error counts as not alive.
    pub async fn parallel_liveness_sweep(
        hosts: Vec<IpAddr>,
        prober: &dyn HostProber,
        config: &ScanConfig,
        cancel: &CancellationToken,
    ) -> Vec<(IpAddr, Duration)> {
        let probe_timeout = config.probe_timeout();
        let total = hosts.len();

        let active: Vec<(IpAddr, Duration)> = stream::iter(hosts)
            .map(|ip| async move {
                let started = Instant::now();
                match timeout(probe_timeout, prober.is_alive(ip)).await {
                    Ok(true) => Some((ip, started.elapsed())),
                    _ => None,
                }
            })
            .buffer_unordered(config.max_concurrent_scans.max(1))
            .take_until(cancel.cancelled())
            .filter_map(|result| async move { result })
            .collect()
            .await;

        info!(probed = total, active = active.len(), "Liveness sweep finished");
        active
    }
}

/// Network interface detection and management utilities
pub mod interface {
    use super::subnet::SubnetPrefix;
    use super::*;

    pub(crate) fn is_virtual(name: &str) -> bool {
        name.starts_with("lo") || name.starts_with("docker") || name.starts_with("veth")
    }

    /// Find the interface attached to `subnet`; ARP cannot reach hosts on other networks
    pub fn find_network_interface(
        subnet: &SubnetPrefix,
    ) -> Result<Option<String>, NetworkDiscoveryError> {
        let interfaces = NetworkInterface::show()?;
        for interface in interfaces {
            let attached = interface.addr.iter().any(|addr| match addr.ip() {
                IpAddr::V4(ipv4) => subnet.contains(ipv4),
                IpAddr::V6(_) => false,
            });
            if attached {
                debug!(interface = %interface.name, network = %subnet.cidr(), "Selected interface");
                return Ok(Some(interface.name));
            }
        }

        debug!(network = %subnet.cidr(), "No interface attached to network");
        Ok(None)
    }

    /// List all available network interfaces and their networks
    pub fn list_network_interfaces() -> Result<(), NetworkDiscoveryError> {
        let interfaces = NetworkInterface::show()?;
        println!("Available network interfaces:");
        for interface in interfaces {
            println!("  Interface: {}", interface.name);
            for addr in &interface.addr {
                if let IpAddr::V4(ipv4) = addr.ip() {
                    if !ipv4.is_loopback() && !ipv4.is_unspecified() {
                        println!(
                            "    IPv4: {} -> Network: {}",
                            ipv4,
                            SubnetPrefix::from_ip(ipv4).cidr()
                        );
                    }
                }
            }
        }
        Ok(())
    }

    /// Get the /24 of a specific interface
    pub fn get_network_from_interface(
        interface_name: &str,
    ) -> Result<SubnetPrefix, NetworkDiscoveryError> {
        let interfaces = NetworkInterface::show()?;
        for interface in interfaces {
            if interface.name == interface_name {
                for addr in &interface.addr {
                    if let IpAddr::V4(ipv4) = addr.ip() {
                        if !ipv4.is_loopback() && !ipv4.is_unspecified() {
                            let subnet = SubnetPrefix::from_ip(ipv4);
                            info!(
                                interface = interface_name,
                                ip = %ipv4,
                                "Calculated network {}",
                                subnet.cidr()
                            );
                            return Ok(subnet);
                        }
                    }
                }
            }
        }
        Err(NetworkDiscoveryError::NetworkInterfaceCustom(format!(
            "Interface '{}' not found or has no valid IPv4 address",
            interface_name
        )))
    }
}
