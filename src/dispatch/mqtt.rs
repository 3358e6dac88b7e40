use super::ProtocolHandler;
use crate::config::ScanConfig;
use crate::errors::DispatchError;
use crate::model::{Capability, IoTCommand, NetworkDevice};
use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

const CONNECT: u8 = 0x10;
const CONNACK: u8 = 0x20;
const PUBLISH: u8 = 0x30;
const DISCONNECT: [u8; 2] = [0xE0, 0x00];

const PROTOCOL_LEVEL: u8 = 0x04; // MQTT 3.1.1
const CLEAN_SESSION: u8 = 0x02;
const KEEP_ALIVE_SECS: u16 = 30;
const MAX_REMAINING_LENGTH: usize = 268_435_455;

/// Publishes commands to the device's own MQTT broker (3.1.1, QoS 0)
pub struct MqttHandler {
    port: u16,
    client_id: String,
    topic_prefix: String,
}

impl MqttHandler {
    pub fn new(config: &ScanConfig) -> Self {
        Self::with_port(config, config.mqtt_port)
    }

    pub fn with_port(config: &ScanConfig, port: u16) -> Self {
        Self {
            port,
            client_id: config.mqtt_client_id.clone(),
            topic_prefix: config.mqtt_topic_prefix.clone(),
        }
    }

    /// `{prefix}/{ip}/{command}`
    pub fn topic(&self, device: &NetworkDevice, command: &IoTCommand) -> String {
        format!("{}/{}/{}", self.topic_prefix, device.ip, command.command)
    }
}

#[async_trait]
impl ProtocolHandler for MqttHandler {
    fn protocol(&self) -> Capability {
        Capability::Mqtt
    }

    async fn send(&self, device: &NetworkDevice, command: &IoTCommand) -> Result<(), DispatchError> {
        let topic = self.topic(device, command);
        let payload = serde_json::to_vec(&command.parameters)
            .map_err(|e| DispatchError::MqttProtocol(e.to_string()))?;

        let mut stream = TcpStream::connect(SocketAddr::new(device.ip, self.port)).await?;
        stream.write_all(&encode_connect(&self.client_id, KEEP_ALIVE_SECS)?).await?;

        let mut connack = [0u8; 4];
        stream.read_exact(&mut connack).await?;
        if connack[0] != CONNACK || connack[1] != 0x02 {
            return Err(DispatchError::MqttProtocol(format!(
                "expected CONNACK, got {:02x?}",
                &connack[..2]
            )));
        }
        if connack[3] != 0 {
            return Err(DispatchError::MqttRejected(connack[3]));
        }

        debug!(%topic, bytes = payload.len(), "Publishing MQTT command");
        stream.write_all(&encode_publish(&topic, &payload)?).await?;
        stream.write_all(&DISCONNECT).await?;
        stream.shutdown().await?;
        Ok(())
    }
}

/// Variable-length "remaining length" field of the fixed header
pub fn encode_remaining_length(mut len: usize, buf: &mut Vec<u8>) -> Result<(), DispatchError> {
    if len > MAX_REMAINING_LENGTH {
        return Err(DispatchError::MqttProtocol(format!("packet of {} bytes is too large", len)));
    }
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if len == 0 {
            return Ok(());
        }
    }
}

fn encode_str(value: &str, buf: &mut Vec<u8>) -> Result<(), DispatchError> {
    let len = u16::try_from(value.len())
        .map_err(|_| DispatchError::MqttProtocol(format!("string of {} bytes is too long", value.len())))?;
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(value.as_bytes());
    Ok(())
}

fn with_fixed_header(packet_type: u8, body: Vec<u8>) -> Result<Vec<u8>, DispatchError> {
    let mut packet = Vec::with_capacity(body.len() + 5);
    packet.push(packet_type);
    encode_remaining_length(body.len(), &mut packet)?;
    packet.extend_from_slice(&body);
    Ok(packet)
}

pub fn encode_connect(client_id: &str, keep_alive_secs: u16) -> Result<Vec<u8>, DispatchError> {
    let mut body = Vec::new();
    encode_str("MQTT", &mut body)?;
    body.push(PROTOCOL_LEVEL);
    body.push(CLEAN_SESSION);
    body.extend_from_slice(&keep_alive_secs.to_be_bytes());
    encode_str(client_id, &mut body)?;
    with_fixed_header(CONNECT, body)
}

/// QoS 0 publish, so no packet identifier
pub fn encode_publish(topic: &str, payload: &[u8]) -> Result<Vec<u8>, DispatchError> {
    let mut body = Vec::with_capacity(topic.len() + payload.len() + 2);
    encode_str(topic, &mut body)?;
    body.extend_from_slice(payload);
    with_fixed_header(PUBLISH, body)
}
