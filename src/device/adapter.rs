//! The capability the session controller drives during the GATT handshake.
//!
//! Every lookup returns `Ok(None)` when the requested object simply is not there (the user cancelled the
//! chooser, the service is absent, ...) and `Err` when the underlying stack failed. The controller maps both
//! onto the handshake stage that was running.

use async_trait::async_trait;

use crate::device::subscription::Subscription;
use crate::device::types::DiscoveryFilter;
use crate::error::DeviceError;

/// Invoked with the raw characteristic value for every notification.
pub type NotifyHandler = Box<dyn Fn(&[u8]) + Send + Sync + 'static>;

/// Invoked when the peripheral drops the GATT connection.
pub type DisconnectHandler = Box<dyn Fn() + Send + Sync + 'static>;

#[async_trait]
pub trait DeviceAdapter: Send + Sync {
    type Device: Send + Sync;
    type Server: Send + Sync;
    type Service: Send + Sync;
    type Characteristic: Send + Sync;

    /// Whether the platform offers Bluetooth LE at all.
    async fn is_available(&self) -> bool;

    async fn discover(&self, filter: &DiscoveryFilter) -> Result<Option<Self::Device>, DeviceError>;

    fn device_name(&self, device: &Self::Device) -> Option<String>;

    /// Registers `handler` for disconnects of `device`. Must be effective once this returns.
    async fn on_disconnect(
        &self,
        device: &Self::Device,
        handler: DisconnectHandler,
    ) -> Result<Subscription, DeviceError>;

    async fn connect_gatt(&self, device: &Self::Device) -> Result<Option<Self::Server>, DeviceError>;

    async fn get_primary_service(
        &self,
        server: &Self::Server,
        service_id: &str,
    ) -> Result<Option<Self::Service>, DeviceError>;

    async fn get_characteristic(
        &self,
        service: &Self::Service,
        characteristic_id: &str,
    ) -> Result<Option<Self::Characteristic>, DeviceError>;

    /// Registers `handler` and then enables notifications on the peripheral.
    async fn enable_notifications(
        &self,
        characteristic: &Self::Characteristic,
        handler: NotifyHandler,
    ) -> Result<Subscription, DeviceError>;

    async fn disconnect(&self, device: &Self::Device) -> Result<(), DeviceError>;
}
