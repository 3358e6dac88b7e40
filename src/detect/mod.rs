use crate::errors::NetworkDiscoveryError;
use crate::model::NetworkDevice;
use async_trait::async_trait;

// Submodule declarations
pub mod classify;
pub mod hostname;
pub mod mac;
pub mod port;

/// Device detection strategy trait
///
/// Each strategy implements a specific method for gathering information
/// about a live host (port scanning, MAC address lookup, hostname
/// resolution) and fills in its part of the device record.
#[async_trait]
pub trait DeviceDetectionStrategy: Send + Sync {
    /// Perform detection on the given device, modifying it in place
    /// with any discovered information
    async fn detect(&self, device: &mut NetworkDevice) -> Result<(), NetworkDiscoveryError>;

    /// Return a human-readable name for this detection strategy
    fn name(&self) -> &'static str;
}
