use crate::constants::*;
use crate::errors::NetworkDiscoveryError;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// How the reachability prober decides whether a host is up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LivenessMethod {
    /// ICMP echo only (needs raw socket privileges on most systems)
    Icmp,
    /// TCP connect against `liveness_ports`; a refusal also counts as alive
    Tcp,
    /// ICMP and TCP raced, the first positive answer wins
    Auto,
}

/// Configuration settings for network scanning and command dispatch
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Ports probed on every live host
    pub ports: Vec<u16>,

    /// Timeout in milliseconds for a single liveness probe
    pub probe_timeout_ms: u64,

    /// Timeout in milliseconds for a single TCP port connect
    pub port_timeout_ms: u64,

    /// Range scanned when the local address cannot be determined
    pub fallback_subnet: String,

    /// Explicit /24 to scan instead of the local one
    pub subnet: Option<String>,

    /// Maximum number of concurrent probes
    pub max_concurrent_scans: usize,

    pub liveness: LivenessMethod,
    pub liveness_ports: Vec<u16>,

    pub resolve_hostnames: bool,
    pub hostname_timeout_ms: u64,

    /// Attempt ARP resolution of MAC addresses
    pub resolve_mac: bool,

    /// Upper bound for a single command dispatch
    pub dispatch_timeout_ms: u64,

    pub http_ports: Vec<u16>,

    pub mqtt_port: u16,
    pub mqtt_client_id: String,
    pub mqtt_topic_prefix: String,

    pub modbus_port: u16,
    pub modbus_unit_id: u8,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            ports: DEFAULT_PORTS.to_vec(),
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
            port_timeout_ms: DEFAULT_PORT_TIMEOUT_MS,
            fallback_subnet: DEFAULT_FALLBACK_SUBNET.to_string(),
            subnet: None,
            max_concurrent_scans: DEFAULT_MAX_CONCURRENT_SCANS,
            liveness: LivenessMethod::Auto,
            liveness_ports: DEFAULT_LIVENESS_PORTS.to_vec(),
            resolve_hostnames: true,
            hostname_timeout_ms: DEFAULT_HOSTNAME_TIMEOUT_MS,
            resolve_mac: true,
            dispatch_timeout_ms: DEFAULT_DISPATCH_TIMEOUT_MS,
            http_ports: DEFAULT_HTTP_PORTS.to_vec(),
            mqtt_port: DEFAULT_MQTT_PORT,
            mqtt_client_id: DEFAULT_MQTT_CLIENT_ID.to_string(),
            mqtt_topic_prefix: DEFAULT_MQTT_TOPIC_PREFIX.to_string(),
            modbus_port: DEFAULT_MODBUS_PORT,
            modbus_unit_id: DEFAULT_MODBUS_UNIT_ID,
        }
    }
}

impl ScanConfig {
    /// Layer an optional config file and `IOTSCOUT_*` environment variables over the defaults
    pub fn load(path: Option<&Path>) -> Result<Self, NetworkDiscoveryError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix("IOTSCOUT")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("ports")
                    .with_list_parse_key("liveness_ports")
                    .with_list_parse_key("http_ports"),
            )
            .build()?
            .try_deserialize::<ScanConfig>()?;

        Ok(config.normalized())
    }

    fn normalized(mut self) -> Self {
        self.max_concurrent_scans = self.max_concurrent_scans.max(1);
        self
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn port_timeout(&self) -> Duration {
        Duration::from_millis(self.port_timeout_ms)
    }

    pub fn hostname_timeout(&self) -> Duration {
        Duration::from_millis(self.hostname_timeout_ms)
    }

    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_millis(self.dispatch_timeout_ms)
    }
}
