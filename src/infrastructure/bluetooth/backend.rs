//! Production backend on btleplug.
//!
//! Implements the capability traits with the cross-platform BLE central
//! stack: scan by advertised service, GATT connect/disconnect, service and
//! characteristic resolution, notification enable/disable, and the
//! asynchronous disconnect event.

use crate::error::SessionError;
use crate::infrastructure::bluetooth::adapter::{GattAdapter, GattLink, LinkEvent};
use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter,
    ValueNotification,
};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::stream::{Stream, StreamExt};
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How often the scan results are polled during discovery.
const SCAN_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// BLE adapter backed by the platform bluetooth stack.
pub struct BtleplugAdapter {
    manager: Manager,
}

impl BtleplugAdapter {
    pub async fn new() -> Result<Self, SessionError> {
        let manager = Manager::new()
            .await
            .map_err(|e| SessionError::AdapterUnavailable(e.to_string()))?;
        Ok(Self { manager })
    }
}

#[async_trait]
impl GattAdapter for BtleplugAdapter {
    async fn discover(
        &self,
        services: &[Uuid],
        timeout: Duration,
    ) -> Result<Box<dyn GattLink>, SessionError> {
        let adapters = self
            .manager
            .adapters()
            .await
            .map_err(|e| SessionError::AdapterUnavailable(e.to_string()))?;
        let adapter = adapters
            .into_iter()
            .next()
            .ok_or_else(|| SessionError::AdapterUnavailable("no adapters present".to_string()))?;

        info!("Starting BLE scan for services: {:?}", services);
        adapter
            .start_scan(ScanFilter {
                services: services.to_vec(),
            })
            .await
            .map_err(|e| SessionError::DiscoveryFailed(e.to_string()))?;

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let peripherals = adapter
                .peripherals()
                .await
                .map_err(|e| SessionError::DiscoveryFailed(e.to_string()))?;

            for peripheral in peripherals {
                let Some(properties) = peripheral
                    .properties()
                    .await
                    .map_err(|e| SessionError::DiscoveryFailed(e.to_string()))?
                else {
                    continue;
                };

                if properties.services.iter().any(|uuid| services.contains(uuid)) {
                    if let Err(e) = adapter.stop_scan().await {
                        debug!("Failed to stop scan cleanly: {}", e);
                    }
                    info!(
                        "Found matching peripheral: {}",
                        properties.local_name.as_deref().unwrap_or("Unknown")
                    );
                    return Ok(Box::new(BtleplugLink::new(adapter, peripheral)));
                }
            }

            if tokio::time::Instant::now() >= deadline {
                if let Err(e) = adapter.stop_scan().await {
                    debug!("Failed to stop scan cleanly: {}", e);
                }
                return Err(SessionError::NoDeviceSelected);
            }

            tokio::time::sleep(SCAN_POLL_INTERVAL).await;
        }
    }
}

/// A discovered peripheral plus its open connection state.
pub struct BtleplugLink {
    adapter: Adapter,
    peripheral: Peripheral,
    subscribed: Vec<Characteristic>,
    events: Option<mpsc::UnboundedReceiver<LinkEvent>>,
    forwarder: Option<JoinHandle<()>>,
}

impl BtleplugLink {
    fn new(adapter: Adapter, peripheral: Peripheral) -> Self {
        Self {
            adapter,
            peripheral,
            subscribed: Vec::new(),
            events: None,
            forwarder: None,
        }
    }
}

#[async_trait]
impl GattLink for BtleplugLink {
    async fn open(&mut self) -> Result<(), SessionError> {
        self.peripheral
            .connect()
            .await
            .map_err(|e| SessionError::LinkFailed(e.to_string()))?;
        self.peripheral
            .discover_services()
            .await
            .map_err(|e| SessionError::LinkFailed(e.to_string()))?;

        let notifications = self
            .peripheral
            .notifications()
            .await
            .map_err(|e| SessionError::LinkFailed(e.to_string()))?;
        let central_events = self
            .adapter
            .events()
            .await
            .map_err(|e| SessionError::LinkFailed(e.to_string()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let peripheral_id = self.peripheral.id();
        self.forwarder = Some(tokio::spawn(forward_events(
            notifications,
            central_events,
            peripheral_id,
            tx,
        )));
        self.events = Some(rx);

        info!("Link established");
        Ok(())
    }

    async fn subscribe(
        &mut self,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<(), SessionError> {
        let resolved_service = self
            .peripheral
            .services()
            .into_iter()
            .find(|s| s.uuid == service)
            .ok_or_else(|| SessionError::SubscriptionFailed {
                characteristic,
                reason: format!("service {} not present on peripheral", service),
            })?;

        let target = resolved_service
            .characteristics
            .iter()
            .find(|c| c.uuid == characteristic)
            .cloned()
            .ok_or_else(|| SessionError::SubscriptionFailed {
                characteristic,
                reason: "characteristic not present in service".to_string(),
            })?;

        self.peripheral
            .subscribe(&target)
            .await
            .map_err(|e| SessionError::SubscriptionFailed {
                characteristic,
                reason: e.to_string(),
            })?;

        debug!("Notifications enabled for {}", characteristic);
        self.subscribed.push(target);
        Ok(())
    }

    async fn unsubscribe_all(&mut self) -> Result<(), SessionError> {
        let mut first_failure = None;
        for characteristic in self.subscribed.drain(..) {
            if let Err(e) = self.peripheral.unsubscribe(&characteristic).await {
                warn!(
                    "Failed to disable notifications for {}: {}",
                    characteristic.uuid, e
                );
                first_failure.get_or_insert(SessionError::SubscriptionFailed {
                    characteristic: characteristic.uuid,
                    reason: e.to_string(),
                });
            }
        }
        match first_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }

        match self.peripheral.is_connected().await {
            Ok(true) => self
                .peripheral
                .disconnect()
                .await
                .map_err(|e| SessionError::LinkFailed(e.to_string())),
            Ok(false) => Ok(()),
            Err(e) => Err(SessionError::LinkFailed(e.to_string())),
        }
    }

    fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<LinkEvent>> {
        self.events.take()
    }
}

/// Merges the notification stream with the central's disconnect events into
/// one ordered channel. Exits once the link is gone or the receiver dropped.
async fn forward_events(
    mut notifications: Pin<Box<dyn Stream<Item = ValueNotification> + Send>>,
    mut central_events: Pin<Box<dyn Stream<Item = CentralEvent> + Send>>,
    peripheral_id: PeripheralId,
    tx: mpsc::UnboundedSender<LinkEvent>,
) {
    loop {
        tokio::select! {
            notification = notifications.next() => match notification {
                Some(n) => {
                    let event = LinkEvent::Notification {
                        characteristic: n.uuid,
                        payload: n.value,
                    };
                    if tx.send(event).is_err() {
                        break;
                    }
                }
                None => {
                    let _ = tx.send(LinkEvent::LinkLost);
                    break;
                }
            },
            event = central_events.next() => match event {
                Some(CentralEvent::DeviceDisconnected(id)) if id == peripheral_id => {
                    let _ = tx.send(LinkEvent::LinkLost);
                    break;
                }
                Some(_) => {}
                None => break,
            },
        }
    }
}
