use crate::config::ScanConfig;
use crate::errors::DispatchError;
use crate::model::{Capability, IoTCommand, NetworkDevice};
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, instrument, warn};

pub mod http;
pub mod modbus;
pub mod mqtt;

pub use http::HttpHandler;
pub use modbus::ModbusHandler;
pub use mqtt::MqttHandler;

/// Order in which a device's capabilities are consulted when picking a handler
pub const DISPATCH_PRIORITY: [Capability; 3] =
    [Capability::Http, Capability::Mqtt, Capability::Modbus];

/// Delivers a command to a device over one protocol
#[async_trait]
pub trait ProtocolHandler: Send + Sync {
    /// Capability a device must advertise for this handler to be selected
    fn protocol(&self) -> Capability;

    async fn send(&self, device: &NetworkDevice, command: &IoTCommand) -> Result<(), DispatchError>;
}

/// Routes commands to the protocol handler matching a device's capabilities
pub struct CommandDispatcher {
    handlers: HashMap<Capability, Arc<dyn ProtocolHandler>>,
    priority: Vec<Capability>,
    dispatch_timeout: Duration,
}

impl CommandDispatcher {
    /// Dispatcher with the HTTP, MQTT and Modbus handlers registered
    pub fn new(config: &ScanConfig) -> Result<Self, DispatchError> {
        let mut dispatcher = Self::empty(config.dispatch_timeout());
        dispatcher.register(Arc::new(HttpHandler::new(config)?));
        dispatcher.register(Arc::new(MqttHandler::new(config)));
        dispatcher.register(Arc::new(ModbusHandler::new(config)));
        Ok(dispatcher)
    }

    /// Dispatcher with no handlers; every dispatch fails until handlers are registered
    pub fn empty(dispatch_timeout: Duration) -> Self {
        Self {
            handlers: HashMap::new(),
            priority: DISPATCH_PRIORITY.to_vec(),
            dispatch_timeout,
        }
    }

    /// Register a handler, replacing any previous one for the same protocol
    pub fn register(&mut self, handler: Arc<dyn ProtocolHandler>) {
        self.handlers.insert(handler.protocol(), handler);
    }

    /// First protocol in priority order that the device advertises and a handler serves
    pub fn select_protocol(&self, device: &NetworkDevice) -> Option<Capability> {
        self.priority
            .iter()
            .copied()
            .find(|p| device.has_capability(*p) && self.handlers.contains_key(p))
    }

    /// Send the command and report which protocol carried it, or why it failed
    #[instrument(skip_all, fields(ip = %device.ip, command = %command.command))]
    pub async fn try_dispatch(
        &self,
        device: &NetworkDevice,
        command: &IoTCommand,
    ) -> Result<Capability, DispatchError> {
        let target = device.ip.to_string();
        if !command.device_id.is_empty() && command.device_id != target {
            return Err(DispatchError::DeviceMismatch {
                expected: command.device_id.clone(),
                actual: target,
            });
        }

        let (protocol, handler) = self
            .select_protocol(device)
            .and_then(|p| self.handlers.get(&p).map(|h| (p, h)))
            .ok_or(DispatchError::NoSupportedProtocol(target))?;

        let send = AssertUnwindSafe(handler.send(device, command)).catch_unwind();
        match timeout(self.dispatch_timeout, send).await {
            Ok(Ok(result)) => result?,
            Ok(Err(panic)) => {
                return Err(DispatchError::HandlerPanicked(protocol, panic_message(panic.as_ref())))
            }
            Err(_) => return Err(DispatchError::Timeout(protocol, self.dispatch_timeout)),
        }

        info!(%protocol, "Command delivered");
        Ok(protocol)
    }

    /// Send the command, logging any failure and reducing the outcome to success or failure.
    /// A panicking handler counts as a failure.
    pub async fn dispatch(&self, device: &NetworkDevice, command: &IoTCommand) -> bool {
        match self.try_dispatch(device, command).await {
            Ok(_) => true,
            Err(e) => {
                warn!(ip = %device.ip, command = %command.command, "Command failed: {}", e);
                false
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Port to contact for a protocol: the first preferred port the device has open,
/// otherwise the first preferred port
pub(crate) fn pick_port(device: &NetworkDevice, preferred: &[u16]) -> Option<u16> {
    preferred
        .iter()
        .copied()
        .find(|p| device.open_ports.contains(p))
        .or_else(|| preferred.first().copied())
}
