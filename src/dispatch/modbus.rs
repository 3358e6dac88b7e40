use super::ProtocolHandler;
use crate::config::ScanConfig;
use crate::errors::DispatchError;
use crate::model::{Capability, IoTCommand, NetworkDevice};
use async_trait::async_trait;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

const WRITE_SINGLE_COIL: u8 = 0x05;
const WRITE_SINGLE_REGISTER: u8 = 0x06;
const EXCEPTION_FLAG: u8 = 0x80;
const COIL_ON: u16 = 0xFF00;
const COIL_OFF: u16 = 0x0000;

/// A single write derived from a command's parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteRequest {
    Coil { address: u16, on: bool },
    Register { address: u16, value: u16 },
}

impl WriteRequest {
    /// `address` is required; a boolean `value` writes a coil, an integer writes a holding register
    pub fn from_command(command: &IoTCommand) -> Result<Self, DispatchError> {
        let address = match command.parameter("address") {
            None => return Err(DispatchError::MissingParameter("address")),
            Some(value) => as_u16("address", value)?,
        };

        match command.parameter("value") {
            None => Err(DispatchError::MissingParameter("value")),
            Some(Value::Bool(on)) => Ok(WriteRequest::Coil { address, on: *on }),
            Some(value) => Ok(WriteRequest::Register {
                address,
                value: as_u16("value", value)?,
            }),
        }
    }

    /// Function code, address and value: the PDU a compliant slave echoes back
    fn pdu(&self) -> [u8; 5] {
        let (function, address, value) = match *self {
            WriteRequest::Coil { address, on } => {
                (WRITE_SINGLE_COIL, address, if on { COIL_ON } else { COIL_OFF })
            }
            WriteRequest::Register { address, value } => (WRITE_SINGLE_REGISTER, address, value),
        };
        let [a_hi, a_lo] = address.to_be_bytes();
        let [v_hi, v_lo] = value.to_be_bytes();
        [function, a_hi, a_lo, v_hi, v_lo]
    }
}

fn as_u16(name: &'static str, value: &Value) -> Result<u16, DispatchError> {
    value
        .as_u64()
        .and_then(|v| u16::try_from(v).ok())
        .ok_or_else(|| DispatchError::InvalidParameter {
            name,
            reason: format!("expected an integer between 0 and 65535, got {}", value),
        })
}

/// Modbus/TCP application frame: MBAP header followed by the PDU
pub fn encode_frame(transaction_id: u16, unit_id: u8, request: &WriteRequest) -> Vec<u8> {
    let pdu = request.pdu();
    let mut frame = Vec::with_capacity(7 + pdu.len());
    frame.extend_from_slice(&transaction_id.to_be_bytes());
    frame.extend_from_slice(&0u16.to_be_bytes()); // protocol id
    frame.extend_from_slice(&(pdu.len() as u16 + 1).to_be_bytes());
    frame.push(unit_id);
    frame.extend_from_slice(&pdu);
    frame
}

/// Writes a single coil or holding register on a Modbus/TCP device
pub struct ModbusHandler {
    port: u16,
    unit_id: u8,
    next_transaction: AtomicU16,
}

impl ModbusHandler {
    pub fn new(config: &ScanConfig) -> Self {
        Self::with_port(config, config.modbus_port)
    }

    pub fn with_port(config: &ScanConfig, port: u16) -> Self {
        Self {
            port,
            unit_id: config.modbus_unit_id,
            next_transaction: AtomicU16::new(1),
        }
    }

    fn unit_id(&self, command: &IoTCommand) -> Result<u8, DispatchError> {
        match command.parameter("unit_id") {
            None => Ok(self.unit_id),
            Some(value) => value
                .as_u64()
                .and_then(|v| u8::try_from(v).ok())
                .ok_or_else(|| DispatchError::InvalidParameter {
                    name: "unit_id",
                    reason: format!("expected an integer between 0 and 255, got {}", value),
                }),
        }
    }
}

#[async_trait]
impl ProtocolHandler for ModbusHandler {
    fn protocol(&self) -> Capability {
        Capability::Modbus
    }

    async fn send(&self, device: &NetworkDevice, command: &IoTCommand) -> Result<(), DispatchError> {
        let request = WriteRequest::from_command(command)?;
        let unit_id = self.unit_id(command)?;
        let transaction_id = self.next_transaction.fetch_add(1, Ordering::Relaxed);

        let mut stream = TcpStream::connect(SocketAddr::new(device.ip, self.port)).await?;
        debug!(?request, unit_id, transaction_id, "Sending Modbus write");
        stream.write_all(&encode_frame(transaction_id, unit_id, &request)).await?;

        let mut header = [0u8; 7];
        stream.read_exact(&mut header).await?;
        let response_tid = u16::from_be_bytes([header[0], header[1]]);
        let protocol_id = u16::from_be_bytes([header[2], header[3]]);
        let length = u16::from_be_bytes([header[4], header[5]]) as usize;
        if response_tid != transaction_id || protocol_id != 0 || !(2..=254).contains(&length) {
            return Err(DispatchError::ModbusProtocol(format!(
                "malformed response header {:02x?}",
                header
            )));
        }

        let mut pdu = vec![0u8; length - 1];
        stream.read_exact(&mut pdu).await?;

        let expected = request.pdu();
        if pdu[0] == expected[0] | EXCEPTION_FLAG {
            return Err(DispatchError::ModbusException(pdu.get(1).copied().unwrap_or_default()));
        }
        if pdu != expected {
            return Err(DispatchError::ModbusProtocol(format!(
                "response {:02x?} does not echo request {:02x?}",
                pdu, expected
            )));
        }
        Ok(())
    }
}
