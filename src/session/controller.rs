use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use log::{debug, info, warn};
use tokio::sync::watch;

use crate::device::adapter::DeviceAdapter;
use crate::device::constants::{HEART_RATE_MEASUREMENT, HEART_RATE_SERVICE};
use crate::device::subscription::Subscription;
use crate::device::types::{ConnectionState, DiscoveryFilter, HeartRateReading};
use crate::error::{ConnectError, DeviceError};
use crate::session::decode::decode_measurement;
use crate::session::replay::{Replay, ReplayCell};

pub type ReadingSubscriber = Replay<HeartRateReading>;

const UNKNOWN_DEVICE: &str = "(unknown)";

// Written to by the controller and by adapter callbacks. Every state transition goes through the watch
// channel's lock (send_if_modified), which keeps them serialized.
struct SessionShared {
    state: watch::Sender<ConnectionState>,
    readings: ReplayCell<HeartRateReading>,
    // bumped for every handshake and teardown; callbacks from older sessions are ignored
    epoch: AtomicU64,
}

impl SessionShared {
    fn is_current(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) == epoch
    }

    fn handle_disconnect(&self, epoch: u64, lost: &AtomicBool) {
        let changed = self.state.send_if_modified(|state| {
            if !self.is_current(epoch) {
                return false;
            }

            lost.store(true, Ordering::SeqCst);
            let was_connected = state.is_connected();
            *state = ConnectionState::Disconnected;
            was_connected
        });

        if changed {
            info!("Device disconnected");
        }
        else {
            debug!("Disconnect signal while not connected");
        }
    }

    fn handle_notification(&self, epoch: u64, payload: &[u8]) {
        // readings only belong to a session that reached the connected state
        if !self.is_current(epoch) || !self.state.borrow().is_connected() {
            debug!("Dropping notification outside of a connected session");
            return;
        }

        match decode_measurement(payload) {
            Ok(reading) => {
                debug!("Heart rate {}", reading);
                self.readings.publish(reading);
            },
            Err(err) => warn!("Ignoring heart rate notification {:?}: {}", payload, err),
        }
    }

    // false if the device went away (or the session was replaced) while the handshake was running
    fn mark_connected(&self, epoch: u64, lost: &AtomicBool) -> bool {
        let mut connected = false;

        self.state.send_if_modified(|state| {
            if !self.is_current(epoch) || lost.load(Ordering::SeqCst) {
                return false;
            }

            connected = true;
            let changed = !state.is_connected();
            *state = ConnectionState::Connected;
            changed
        });

        connected
    }

    fn mark_disconnected(&self) {
        self.state.send_if_modified(|state| {
            let changed = state.is_connected();
            *state = ConnectionState::Disconnected;
            changed
        });
    }
}

// What the handshake resolved after the GATT connection; kept alive for the whole session.
struct GattLinks<A: DeviceAdapter> {
    _server: A::Server,
    _service: A::Service,
    _characteristic: A::Characteristic,
    disconnect_subscription: Subscription,
    notify_subscription: Subscription,
}

struct ActiveSession<A: DeviceAdapter> {
    device: Arc<A::Device>,
    label: String,
    links: GattLinks<A>,
}

// A device whose handshake is in flight. Still set if the connect() future was dropped half way.
struct PendingDevice<A: DeviceAdapter> {
    device: Arc<A::Device>,
    label: String,
}

fn required<T>(result: Result<Option<T>, DeviceError>) -> Result<T, Option<DeviceError>> {
    match result {
        Ok(Some(value)) => Ok(value),
        Ok(None) => Err(None),
        Err(err) => Err(Some(err)),
    }
}

/// Connects to a heart rate peripheral and publishes its connection state and heart rate.
///
/// The connection state is a current-value stream ([`watch::Receiver`]); the reading stream replays the
/// last reading to late subscribers. Both are read-only for subscribers.
pub struct HeartRateSession<A: DeviceAdapter> {
    adapter: A,
    shared: Arc<SessionShared>,
    active: Option<ActiveSession<A>>,
    pending: Option<PendingDevice<A>>,
}

impl<A: DeviceAdapter> HeartRateSession<A> {
    pub fn new(adapter: A) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);

        HeartRateSession {
            adapter,
            shared: Arc::new(SessionShared {
                state,
                readings: ReplayCell::new(),
                epoch: AtomicU64::new(0),
            }),
            active: None,
            pending: None,
        }
    }

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    pub fn current_state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    pub fn readings(&self) -> ReadingSubscriber {
        self.shared.readings.subscribe()
    }

    pub fn latest_reading(&self) -> Option<HeartRateReading> {
        self.shared.readings.latest()
    }

    /// Name of the device of the current session.
    pub fn device_label(&self) -> Option<&str> {
        self.active.as_ref().map(|session| session.label.as_str())
    }

    /// Runs the full handshake: availability, discovery, GATT connection, service, characteristic and
    /// notifications. Any previous session is torn down first. Fails fast with the error of the first
    /// stage that did not succeed; the state is only set to connected when every stage succeeded.
    pub async fn connect(&mut self) -> Result<(), ConnectError> {
        self.close().await;

        let epoch = self.shared.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let lost = Arc::new(AtomicBool::new(false));

        if !self.adapter.is_available().await {
            warn!("Bluetooth LE is not available");
            return Err(ConnectError::CapabilityUnavailable);
        }

        info!("Requesting a device with service {}...", HEART_RATE_SERVICE);
        let device = required(self.adapter.discover(&DiscoveryFilter::service(HEART_RATE_SERVICE)).await)
            .map_err(|source| ConnectError::NoDeviceSelected { source })?;

        let label = self.adapter.device_name(&device).unwrap_or_else(|| UNKNOWN_DEVICE.to_string());
        let device = Arc::new(device);
        self.pending = Some(PendingDevice { device: device.clone(), label: label.clone() });

        let result = self.handshake(epoch, &lost, &device, &label).await;
        self.pending = None;

        match result {
            Ok(links) => {
                info!("Connected to {}; receiving heart rate notifications", label);
                self.active = Some(ActiveSession { device, label, links });
                Ok(())
            },
            Err(err) => {
                warn!("Handshake failed: {}", err);
                self.release(&device, &label).await;
                Err(err)
            },
        }
    }

    // Every stage from registering the disconnect listener on. The subscriptions registered so far are
    // dropped (and so cancelled) when a stage fails.
    async fn handshake(
        &self,
        epoch: u64,
        lost: &Arc<AtomicBool>,
        device: &A::Device,
        label: &str,
    ) -> Result<GattLinks<A>, ConnectError> {
        let connection_lost = || ConnectError::ConnectionLost { device: label.to_string() };

        // must be in place before connecting so that no disconnect can slip through
        let disconnect_subscription = {
            let shared = self.shared.clone();
            let lost = lost.clone();
            self.adapter.on_disconnect(device, Box::new(move || shared.handle_disconnect(epoch, &lost))).await
                .map_err(|source| ConnectError::GattConnectFailed { device: label.to_string(), source: Some(source) })?
        };

        info!("Connecting to {}...", label);
        let server = required(self.adapter.connect_gatt(device).await)
            .map_err(|source| ConnectError::GattConnectFailed { device: label.to_string(), source })?;

        if lost.load(Ordering::SeqCst) {
            return Err(connection_lost());
        }

        debug!("Resolving service {}", HEART_RATE_SERVICE);
        let service = required(self.adapter.get_primary_service(&server, HEART_RATE_SERVICE).await)
            .map_err(|source| ConnectError::ServiceNotFound {
                device: label.to_string(),
                service: HEART_RATE_SERVICE.to_string(),
                source,
            })?;

        if lost.load(Ordering::SeqCst) {
            return Err(connection_lost());
        }

        debug!("Resolving characteristic {}", HEART_RATE_MEASUREMENT);
        let characteristic = required(self.adapter.get_characteristic(&service, HEART_RATE_MEASUREMENT).await)
            .map_err(|source| ConnectError::CharacteristicNotFound {
                device: label.to_string(),
                characteristic: HEART_RATE_MEASUREMENT.to_string(),
                source,
            })?;

        if lost.load(Ordering::SeqCst) {
            return Err(connection_lost());
        }

        debug!("Enabling notifications");
        let shared = self.shared.clone();
        let notify = Box::new(move |payload: &[u8]| shared.handle_notification(epoch, payload));
        let notify_subscription = self.adapter.enable_notifications(&characteristic, notify).await
            .map_err(|source| ConnectError::SubscriptionFailed { device: label.to_string(), source })?;

        if !self.shared.mark_connected(epoch, lost) {
            return Err(connection_lost());
        }

        Ok(GattLinks {
            _server: server,
            _service: service,
            _characteristic: characteristic,
            disconnect_subscription,
            notify_subscription,
        })
    }

    /// Ends the current session, or a handshake that was interrupted by dropping `connect()`: stops
    /// callbacks, disconnects the device and publishes the disconnected state. The last reading stays
    /// available.
    pub async fn close(&mut self) {
        if let Some(session) = self.active.take() {
            info!("Closing the session with {}", session.label);
            let ActiveSession { device, label, links } = session;
            links.notify_subscription.unsubscribe().await;
            links.disconnect_subscription.unsubscribe().await;
            self.release(&device, &label).await;
        }

        if let Some(pending) = self.pending.take() {
            info!("Cleaning up the interrupted handshake with {}", pending.label);
            self.release(&pending.device, &pending.label).await;
        }
    }

    // Ignores callbacks of the current attempt from here on and disconnects best-effort.
    async fn release(&self, device: &A::Device, label: &str) {
        self.shared.epoch.fetch_add(1, Ordering::SeqCst);

        debug!("Disconnecting from {}", label);
        if let Err(err) = self.adapter.disconnect(device).await {
            warn!("Failed to disconnect from {}: {}", label, err);
        }

        self.shared.mark_disconnected();
    }
}
