use crate::constants::{UNKNOWN_HOSTNAME, UNKNOWN_MAC};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::net::IpAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Represents a discovered network device with all its attributes
#[derive(Debug, Clone, Serialize)]
pub struct NetworkDevice {
    pub name: String,
    pub ip: IpAddr,
    #[serde(serialize_with = "serialize_mac")]
    pub mac: Option<String>,
    pub device_type: DeviceType,
    pub is_online: bool,
    pub last_seen: SystemTime,
    pub open_ports: BTreeSet<u16>,
    pub capabilities: BTreeSet<Capability>,
    pub response_time: Option<Duration>,
}

impl NetworkDevice {
    /// A fresh record for an address, before any detection strategy has run
    pub fn new(ip: IpAddr) -> Self {
        Self {
            name: UNKNOWN_HOSTNAME.to_string(),
            ip,
            mac: None,
            device_type: DeviceType::Unknown,
            is_online: false,
            last_seen: SystemTime::now(),
            open_ports: BTreeSet::new(),
            capabilities: BTreeSet::new(),
            response_time: None,
        }
    }

    pub fn mac_or_unknown(&self) -> &str {
        self.mac.as_deref().unwrap_or(UNKNOWN_MAC)
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

fn serialize_mac<S: Serializer>(mac: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(mac.as_deref().unwrap_or(UNKNOWN_MAC))
}

/// Device classification derived from the set of open ports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DeviceType {
    WebDevice,
    MqttDevice,
    LinuxDevice,
    TelnetDevice,
    Camera,
    HomeAssistant,
    ModbusDevice,
    Unknown,
}

impl DeviceType {
    pub fn label(&self) -> &'static str {
        match self {
            DeviceType::WebDevice => "Web Device",
            DeviceType::MqttDevice => "MQTT Device",
            DeviceType::LinuxDevice => "Linux Device",
            DeviceType::TelnetDevice => "Telnet Device",
            DeviceType::Camera => "Camera",
            DeviceType::HomeAssistant => "Home Assistant",
            DeviceType::ModbusDevice => "Modbus Device",
            DeviceType::Unknown => "Unknown Device",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Protocol inferred from a successful TCP connect to its conventional port
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Capability {
    Http,
    Https,
    Ssh,
    Telnet,
    Mqtt,
    Rtsp,
    Modbus,
}

impl Capability {
    /// Capability advertised by an open port, if the port is a known one
    pub fn for_port(port: u16) -> Option<Capability> {
        match port {
            80 | 8080 | 8123 => Some(Capability::Http),
            443 => Some(Capability::Https),
            22 => Some(Capability::Ssh),
            23 => Some(Capability::Telnet),
            1883 => Some(Capability::Mqtt),
            502 => Some(Capability::Modbus),
            554 => Some(Capability::Rtsp),
            _ => None,
        }
    }

    /// Map a set of open ports onto the capabilities they imply
    pub fn from_ports<'a>(ports: impl IntoIterator<Item = &'a u16>) -> BTreeSet<Capability> {
        ports.into_iter().filter_map(|&p| Capability::for_port(p)).collect()
    }

    pub fn label(&self) -> &'static str {
        match self {
            Capability::Http => "HTTP",
            Capability::Https => "HTTPS",
            Capability::Ssh => "SSH",
            Capability::Telnet => "Telnet",
            Capability::Mqtt => "MQTT",
            Capability::Rtsp => "RTSP",
            Capability::Modbus => "Modbus",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A control instruction addressed to a previously discovered device
#[derive(Debug, Clone)]
pub struct IoTCommand {
    pub device_id: String,
    pub command: String,
    pub parameters: BTreeMap<String, Value>,
    pub timestamp: SystemTime,
}

impl IoTCommand {
    pub fn new(device_id: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            command: command.into(),
            parameters: BTreeMap::new(),
            timestamp: SystemTime::now(),
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default()
    }
}
