use async_trait::async_trait;
use btleplug::api::{Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter, Service};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use log::{debug, info, warn};
use tokio::spawn;
use tokio::time::{sleep, timeout, Duration};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::device::adapter::{DeviceAdapter, DisconnectHandler, NotifyHandler};
use crate::device::constants::{resolve_uuid, DEFAULT_SCAN_TIMEOUT, POLL_DELAY};
use crate::device::subscription::Subscription;
use crate::device::types::DiscoveryFilter;
use crate::error::DeviceError;

#[derive(Debug, Clone)]
pub struct BtleSettings {
    pub scan_timeout: Duration,
    /// Only accept a peripheral with this local name; plays the role of the user picking a device.
    pub device_name: Option<String>,
}

impl Default for BtleSettings {
    fn default() -> Self {
        BtleSettings {
            scan_timeout: Duration::from_millis(DEFAULT_SCAN_TIMEOUT),
            device_name: None,
        }
    }
}

pub struct BtleDevice {
    adapter: Adapter,
    peripheral: Peripheral,
    name: Option<String>,
}

pub struct BtleServer {
    peripheral: Peripheral,
}

pub struct BtleService {
    peripheral: Peripheral,
    service: Service,
}

pub struct BtleCharacteristic {
    peripheral: Peripheral,
    characteristic: Characteristic,
}

/// [`DeviceAdapter`] on top of the OS bluetooth stack, through btleplug.
pub struct BtleAdapter {
    manager: Manager,
    settings: BtleSettings,
}

fn resolve(id: &str) -> Result<Uuid, DeviceError> {
    resolve_uuid(id).ok_or_else(|| DeviceError::UnknownIdentifier(id.to_string()))
}

impl BtleAdapter {
    pub async fn new(settings: BtleSettings) -> Result<Self, DeviceError> {
        let manager = Manager::new().await?;
        Ok(BtleAdapter { manager, settings })
    }

    fn name_matches(&self, local_name: Option<&String>) -> bool {
        match (&self.settings.device_name, local_name) {
            (None, _) => true,
            (Some(wanted), Some(name)) => wanted.eq_ignore_ascii_case(name),
            (Some(_), None) => false,
        }
    }

    async fn find_peripheral(&self, adapters: &[Adapter], services: &[Uuid]) -> Option<BtleDevice> {
        for adapter in adapters {
            let peripherals = match adapter.peripherals().await {
                Ok(v) => v,
                Err(err) => {
                    warn!("Failed to query BLE adapter for peripherals: {}", err);
                    continue;
                },
            };

            for peripheral in peripherals {
                let properties = match peripheral.properties().await {
                    Err(err) => {
                        warn!("Could not query peripheral for properties: {:?}", err);
                        continue;
                    },
                    Ok(None) => {
                        debug!("Peripheral has no properties");
                        continue;
                    },
                    Ok(Some(properties)) => properties,
                };

                // Some environments ignore the scan filter, so check the advertised services again
                if !services.iter().all(|uuid| properties.services.contains(uuid)) {
                    continue;
                }

                if !self.name_matches(properties.local_name.as_ref()) {
                    debug!("Skipping peripheral {:?}: name does not match", properties.local_name);
                    continue;
                }

                info!(
                    "Using peripheral {} {:?} {} {:?}",
                    properties.address,
                    properties.address_type,
                    properties.local_name.as_deref().unwrap_or("NONE"),
                    properties.services,
                );

                return Some(BtleDevice {
                    adapter: adapter.clone(),
                    peripheral,
                    name: properties.local_name,
                });
            }
        }

        None
    }
}

#[async_trait]
impl DeviceAdapter for BtleAdapter {
    type Device = BtleDevice;
    type Server = BtleServer;
    type Service = BtleService;
    type Characteristic = BtleCharacteristic;

    async fn is_available(&self) -> bool {
        match self.manager.adapters().await {
            Ok(adapters) => !adapters.is_empty(),
            Err(err) => {
                warn!("Failed to list bluetooth adapters: {}", err);
                false
            },
        }
    }

    async fn discover(&self, filter: &DiscoveryFilter) -> Result<Option<BtleDevice>, DeviceError> {
        let services = filter.services.iter()
            .map(|id| resolve(id))
            .collect::<Result<Vec<_>, _>>()?;

        let adapters = self.manager.adapters().await?;
        if adapters.is_empty() {
            return Err(DeviceError::NoAdapter);
        }

        let scan_filter = ScanFilter { services: services.clone() };
        for adapter in &adapters {
            info!("Scanning using adapter {}...", adapter.adapter_info().await.unwrap_or("UNKNOWN".to_string()));
            adapter.start_scan(scan_filter.clone()).await?;
        }

        let search = async {
            loop {
                if let Some(device) = self.find_peripheral(&adapters, &services).await {
                    return device;
                }
                sleep(Duration::from_millis(POLL_DELAY)).await;
            }
        };

        let found = match timeout(self.settings.scan_timeout, search).await {
            Ok(device) => Some(device),
            Err(_) => {
                info!("No matching peripheral found within {}", humantime::format_duration(self.settings.scan_timeout));
                None
            },
        };

        for adapter in &adapters {
            if let Err(err) = adapter.stop_scan().await {
                warn!("Failed to stop scanning: {}", err);
            }
        }

        Ok(found)
    }

    fn device_name(&self, device: &BtleDevice) -> Option<String> {
        device.name.clone().or_else(|| Some(device.peripheral.address().to_string()))
    }

    async fn on_disconnect(&self, device: &BtleDevice, handler: DisconnectHandler) -> Result<Subscription, DeviceError> {
        let mut events = device.adapter.events().await?;
        let id = device.peripheral.id();
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = spawn(async move {
            'mainloop: loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        break 'mainloop;
                    },
                    event = events.next() => match event {
                        Some(CentralEvent::DeviceDisconnected(disconnected)) if disconnected == id => handler(),
                        Some(_) => {},
                        None => {
                            debug!("Adapter event stream ended");
                            break 'mainloop;
                        },
                    },
                }
            }
        });

        Ok(Subscription::with_task(cancel, task))
    }

    async fn connect_gatt(&self, device: &BtleDevice) -> Result<Option<BtleServer>, DeviceError> {
        let peripheral = &device.peripheral;

        if !peripheral.is_connected().await? {
            peripheral.connect().await?;
        }

        if !peripheral.is_connected().await? {
            warn!("Peripheral reports not connected after connecting");
            return Ok(None);
        }

        info!("Connected; Discovering services...");
        peripheral.discover_services().await?;
        Ok(Some(BtleServer { peripheral: peripheral.clone() }))
    }

    async fn get_primary_service(&self, server: &BtleServer, service_id: &str) -> Result<Option<BtleService>, DeviceError> {
        let uuid = resolve(service_id)?;

        Ok(server.peripheral.services().into_iter()
            .find(|service| service.uuid == uuid)
            .map(|service| BtleService { peripheral: server.peripheral.clone(), service }))
    }

    async fn get_characteristic(&self, service: &BtleService, characteristic_id: &str) -> Result<Option<BtleCharacteristic>, DeviceError> {
        let uuid = resolve(characteristic_id)?;

        Ok(service.service.characteristics.iter()
            .find(|characteristic| characteristic.uuid == uuid)
            .map(|characteristic| BtleCharacteristic {
                peripheral: service.peripheral.clone(),
                characteristic: characteristic.clone(),
            }))
    }

    async fn enable_notifications(&self, characteristic: &BtleCharacteristic, handler: NotifyHandler) -> Result<Subscription, DeviceError> {
        let peripheral = characteristic.peripheral.clone();
        let target = characteristic.characteristic.clone();
        let mut notifications = peripheral.notifications().await?;
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = {
            let peripheral = peripheral.clone();
            let target = target.clone();

            spawn(async move {
                'mainloop: loop {
                    tokio::select! {
                        _ = token.cancelled() => {
                            break 'mainloop;
                        },
                        notification = notifications.next() => match notification {
                            Some(data) => {
                                if data.uuid == target.uuid {
                                    handler(&data.value);
                                }
                            },
                            None => {
                                debug!("Notification stream ended");
                                break 'mainloop;
                            },
                        },
                    }
                }

                if let Err(err) = peripheral.unsubscribe(&target).await {
                    debug!("Failed to unsubscribe from {}: {}", target.uuid, err);
                }
            })
        };

        info!("Subscribing to characteristic {:?} {:?}", target.service_uuid, target.uuid);
        if let Err(err) = peripheral.subscribe(&target).await {
            cancel.cancel();
            return Err(err.into());
        }

        Ok(Subscription::with_task(cancel, task))
    }

    async fn disconnect(&self, device: &BtleDevice) -> Result<(), DeviceError> {
        if device.peripheral.is_connected().await? {
            device.peripheral.disconnect().await?;
        }
        Ok(())
    }
}
