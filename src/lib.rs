//! iotscout - local network IoT discovery and control
//!
//! This library provides:
//! - /24 subnet enumeration and concurrent liveness probing
//! - TCP connect scanning of well-known IoT ports
//! - Device classification from open ports
//! - Command dispatch over HTTP, MQTT or Modbus/TCP

pub mod config;
pub mod constants;
pub mod detect;
pub mod dispatch;
pub mod engine;
pub mod errors;
pub mod model;
pub mod net;
pub mod table;

// Re-export commonly used types for convenience
pub use crate::config::{LivenessMethod, ScanConfig};
pub use detect::classify::classify;
pub use detect::port::PortScanStrategy;
pub use detect::DeviceDetectionStrategy;
pub use dispatch::{CommandDispatcher, ProtocolHandler};
pub use engine::{DiscoveryEngine, ScanHandle};
pub use errors::{DispatchError, NetworkDiscoveryError};
pub use model::{Capability, DeviceType, IoTCommand, NetworkDevice};
pub use net::probe::{HostProber, NetworkProber};
pub use net::subnet::SubnetPrefix;
