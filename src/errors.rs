use crate::model::Capability;
use std::time::Duration;
use thiserror::Error;

/// Error types for the fallible setup paths of network discovery
#[derive(Error, Debug)]
pub enum NetworkDiscoveryError {
    #[error("Configuration Error: {0}")]
    ConfigError(#[from] config::ConfigError),

    #[error("Invalid Subnet: {0}")]
    InvalidSubnet(String),

    #[error("I/O Error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Network Interface Error: {0}")]
    NetworkInterfaceWrapped(#[from] network_interface::Error),

    #[error("Network Interface Error: {0}")]
    NetworkInterfaceCustom(String),

    #[error("Dispatch Error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Error: {0}")]
    Other(String),
}

/// Reason a command could not be delivered to a device
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("device {0} exposes no supported control protocol")]
    NoSupportedProtocol(String),

    #[error("command targets {expected} but was dispatched to {actual}")]
    DeviceMismatch { expected: String, actual: String },

    #[error("{0} command timed out after {1:?}")]
    Timeout(Capability, Duration),

    #[error("{0} handler panicked: {1}")]
    HandlerPanicked(Capability, String),

    #[error("missing parameter '{0}'")]
    MissingParameter(&'static str),

    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP request returned status {0}")]
    HttpStatus(u16),

    #[error("invalid request URL: {0}")]
    InvalidUrl(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("MQTT broker refused the connection with return code {0}")]
    MqttRejected(u8),

    #[error("MQTT protocol error: {0}")]
    MqttProtocol(String),

    #[error("Modbus exception code {0:#04x}")]
    ModbusException(u8),

    #[error("Modbus protocol error: {0}")]
    ModbusProtocol(String),
}
