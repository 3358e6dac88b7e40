/// Well-known ports probed on every live host
pub const DEFAULT_PORTS: &[u16] = &[
    80,   // HTTP
    443,  // HTTPS
    22,   // SSH
    23,   // Telnet
    1883, // MQTT
    502,  // Modbus/TCP
    554,  // RTSP
    8080, // HTTP-Alt
    8123, // Home Assistant
];

/// Ports tried by the TCP liveness check. A refused connection still proves the host is up.
pub const DEFAULT_LIVENESS_PORTS: &[u16] = &[7, 80, 443, 22];

/// Ports an HTTP command may be sent to, in order of preference
pub const DEFAULT_HTTP_PORTS: &[u16] = &[80, 8080, 8123];

pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_PORT_TIMEOUT_MS: u64 = 500;
pub const DEFAULT_HOSTNAME_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_DISPATCH_TIMEOUT_MS: u64 = 3000;
pub const DEFAULT_MAX_CONCURRENT_SCANS: usize = 64;

/// Range scanned when the local address cannot be determined
pub const DEFAULT_FALLBACK_SUBNET: &str = "192.168.1.";

pub const DEFAULT_MQTT_PORT: u16 = 1883;
pub const DEFAULT_MQTT_CLIENT_ID: &str = "iotscout";
pub const DEFAULT_MQTT_TOPIC_PREFIX: &str = "iotscout";

pub const DEFAULT_MODBUS_PORT: u16 = 502;
pub const DEFAULT_MODBUS_UNIT_ID: u8 = 1;

/// Name given to a device whose address has no reverse DNS entry
pub const UNKNOWN_HOSTNAME: &str = "N/A";

/// Rendered in place of a MAC address that could not be resolved
pub const UNKNOWN_MAC: &str = "unknown";
