use super::{pick_port, ProtocolHandler};
use crate::config::ScanConfig;
use crate::errors::DispatchError;
use crate::model::{Capability, IoTCommand, NetworkDevice};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use tracing::debug;

#[derive(Debug, Serialize)]
struct CommandRequest<'a> {
    device_id: &'a str,
    command: &'a str,
    parameters: &'a BTreeMap<String, Value>,
    timestamp_ms: u64,
}

/// Sends commands as `POST /api/{command}` with a JSON body
#[derive(Debug)]
pub struct HttpHandler {
    client: Client,
    ports: Vec<u16>,
}

impl HttpHandler {
    /// Client for devices on the local network, so system proxy settings are ignored
    pub fn new(config: &ScanConfig) -> Result<Self, DispatchError> {
        let client = Client::builder()
            .no_proxy()
            .timeout(config.dispatch_timeout())
            .connect_timeout(config.port_timeout())
            .build()?;
        Ok(Self::with_client(client, config.http_ports.clone()))
    }

    pub fn with_client(client: Client, ports: Vec<u16>) -> Self {
        Self { client, ports }
    }

    fn command_url(&self, device: &NetworkDevice, command: &str) -> Result<Url, DispatchError> {
        let port = pick_port(device, &self.ports)
            .ok_or_else(|| DispatchError::InvalidUrl("no HTTP port configured".to_string()))?;
        let mut url = Url::parse(&format!("http://{}/", SocketAddr::new(device.ip, port)))
            .map_err(|e| DispatchError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| DispatchError::InvalidUrl("cannot-be-a-base URL".to_string()))?
            .clear()
            .push("api")
            .push(command);
        Ok(url)
    }
}

#[async_trait]
impl ProtocolHandler for HttpHandler {
    fn protocol(&self) -> Capability {
        Capability::Http
    }

    async fn send(&self, device: &NetworkDevice, command: &IoTCommand) -> Result<(), DispatchError> {
        let url = self.command_url(device, &command.command)?;
        let request = CommandRequest {
            device_id: &command.device_id,
            command: &command.command,
            parameters: &command.parameters,
            timestamp_ms: command.timestamp_ms(),
        };

        debug!(%url, "Sending HTTP command");
        let response = self.client.post(url).json(&request).send().await?;
        if !response.status().is_success() {
            return Err(DispatchError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;
    use std::net::{IpAddr, Ipv4Addr};

    fn handler_for(server: &mockito::ServerGuard) -> HttpHandler {
        HttpHandler::with_client(Client::new(), vec![server.socket_address().port()])
    }

    fn localhost() -> NetworkDevice {
        NetworkDevice::new(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    #[tokio::test]
    async fn posts_the_command_with_its_parameters() -> Result<(), DispatchError> {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/set_volume")
            .match_header("content-type", "application/json")
            .match_body(Matcher::PartialJson(json!({
                "device_id": "127.0.0.1",
                "command": "set_volume",
                "parameters": { "level": 7 }
            })))
            .with_status(200)
            .create_async()
            .await;

        let command = IoTCommand::new("127.0.0.1", "set_volume").with_parameter("level", 7);
        handler_for(&server).send(&localhost(), &command).await?;

        mock.assert_async().await;
        Ok(())
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/reboot")
            .with_status(503)
            .create_async()
            .await;

        let command = IoTCommand::new("127.0.0.1", "reboot");
        let result = handler_for(&server).send(&localhost(), &command).await;

        assert!(matches!(result, Err(DispatchError::HttpStatus(503))));
    }

    #[test]
    fn command_names_are_percent_encoded() -> Result<(), DispatchError> {
        let handler = HttpHandler::with_client(Client::new(), vec![80, 8080]);
        let mut device = localhost();
        device.open_ports.insert(8080);

        let url = handler.command_url(&device, "turn on/off")?;

        assert_eq!(url.as_str(), "http://127.0.0.1:8080/api/turn%20on%2Foff");
        Ok(())
    }
}
