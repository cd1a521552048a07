//! Device Session
//!
//! Owns exactly one peripheral link and its active subscriptions, and routes
//! inbound notification payloads through the codec into the telemetry store.

use crate::domain::telemetry::TelemetryStore;
use crate::error::SessionError;
use crate::infrastructure::bluetooth::adapter::{GattAdapter, GattLink, LinkEvent};
use crate::infrastructure::bluetooth::protocol;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, trace};
use uuid::Uuid;

/// One peripheral connection and the characteristics notifications are
/// enabled on. Created by discovery, consumed by teardown.
pub struct DeviceSession {
    link: Box<dyn GattLink>,
    subscribed: Vec<Uuid>,
}

impl DeviceSession {
    /// Run discovery filtered to the watch's two telemetry services.
    pub async fn discover(
        adapter: &dyn GattAdapter,
        timeout: Duration,
    ) -> Result<Self, SessionError> {
        let link = adapter
            .discover(
                &[
                    protocol::HEART_RATE_SERVICE,
                    protocol::HEALTH_THERMOMETER_SERVICE,
                ],
                timeout,
            )
            .await?;
        Ok(Self {
            link,
            subscribed: Vec::new(),
        })
    }

    /// Establish the transport-level connection.
    pub async fn open_link(&mut self) -> Result<(), SessionError> {
        self.link.open().await
    }

    /// Enable notifications on one characteristic. Each characteristic is
    /// subscribed independently; a failure here leaves earlier
    /// subscriptions standing for the caller to roll back.
    pub async fn subscribe(
        &mut self,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<(), SessionError> {
        self.link.subscribe(service, characteristic).await?;
        self.subscribed.push(characteristic);
        Ok(())
    }

    /// Disable notifications on everything subscribed. Idempotent.
    pub async fn unsubscribe_all(&mut self) -> Result<(), SessionError> {
        self.subscribed.clear();
        self.link.unsubscribe_all().await
    }

    /// Tear down the transport-level connection. Idempotent.
    pub async fn close(&mut self) -> Result<(), SessionError> {
        self.link.close().await
    }

    /// Characteristics currently subscribed, in subscription order.
    pub fn subscriptions(&self) -> &[Uuid] {
        &self.subscribed
    }

    /// Take the link's event stream for the notification pump.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<LinkEvent>> {
        self.link.take_events()
    }
}

/// Why the event pump stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpExit {
    /// The peripheral dropped the connection.
    LinkLost,
    /// The event channel closed without a link-loss event (backend gone).
    ChannelClosed,
}

/// Drain link events until the link dies, feeding decoded measurements into
/// the store in delivery order.
pub async fn run_event_pump(
    events: &mut mpsc::UnboundedReceiver<LinkEvent>,
    subscribed: &[Uuid],
    store: &TelemetryStore,
) -> PumpExit {
    while let Some(event) = events.recv().await {
        match event {
            LinkEvent::Notification {
                characteristic,
                payload,
            } => route_notification(subscribed, characteristic, &payload, store),
            LinkEvent::LinkLost => return PumpExit::LinkLost,
        }
    }
    PumpExit::ChannelClosed
}

/// Decode one notification and record it. Notifications for characteristics
/// the session never subscribed to are discarded without decoding; malformed
/// payloads are dropped and the session stays up.
fn route_notification(
    subscribed: &[Uuid],
    characteristic: Uuid,
    payload: &[u8],
    store: &TelemetryStore,
) {
    if !subscribed.contains(&characteristic) {
        trace!("Dropping notification for unsubscribed {}", characteristic);
        return;
    }

    match protocol::decode(characteristic, payload) {
        Ok(measurement) => {
            trace!("Recorded {:?}", measurement);
            store.record(measurement);
        }
        Err(e) => {
            debug!("Dropping malformed notification for {}: {}", characteristic, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::measurement::Measurement;
    use btleplug::api::bleuuid::uuid_from_u16;

    #[test]
    fn test_route_records_subscribed_notification() {
        let store = TelemetryStore::new();
        let subscribed = [protocol::HEART_RATE_MEASUREMENT];
        route_notification(
            &subscribed,
            protocol::HEART_RATE_MEASUREMENT,
            &[0x00, 0x48],
            &store,
        );
        assert_eq!(store.latest_heart_rate(), Some(72));
    }

    #[test]
    fn test_route_discards_unsubscribed_notification() {
        let store = TelemetryStore::new();
        // Session subscribed to temperature only; a heart-rate payload
        // must not be decoded.
        let subscribed = [protocol::TEMPERATURE_MEASUREMENT];
        route_notification(
            &subscribed,
            protocol::HEART_RATE_MEASUREMENT,
            &[0x00, 0x48],
            &store,
        );
        assert_eq!(store.latest_heart_rate(), None);
    }

    #[test]
    fn test_route_discards_unknown_characteristic() {
        let store = TelemetryStore::new();
        let subscribed = [protocol::HEART_RATE_MEASUREMENT];
        route_notification(&subscribed, uuid_from_u16(0x2A19), &[0x64], &store);
        assert_eq!(store.latest_heart_rate(), None);
    }

    #[test]
    fn test_route_drops_malformed_payload_without_recording() {
        let store = TelemetryStore::new();
        let subscribed = [protocol::HEART_RATE_MEASUREMENT];
        store.record(Measurement::HeartRate(70));
        route_notification(
            &subscribed,
            protocol::HEART_RATE_MEASUREMENT,
            &[0x01, 0x48],
            &store,
        );
        // Truncated payload: the previous reading stays latest.
        assert_eq!(store.latest_heart_rate(), Some(70));
        assert_eq!(store.heart_rate_history().len(), 1);
    }

    #[tokio::test]
    async fn test_pump_exits_on_link_loss() {
        let store = TelemetryStore::new();
        let subscribed = [protocol::HEART_RATE_MEASUREMENT];
        let (tx, mut rx) = mpsc::unbounded_channel();

        tx.send(LinkEvent::Notification {
            characteristic: protocol::HEART_RATE_MEASUREMENT,
            payload: vec![0x00, 0x50],
        })
        .unwrap();
        tx.send(LinkEvent::LinkLost).unwrap();

        let exit = run_event_pump(&mut rx, &subscribed, &store).await;
        assert_eq!(exit, PumpExit::LinkLost);
        assert_eq!(store.latest_heart_rate(), Some(80));
    }

    #[tokio::test]
    async fn test_pump_exits_when_channel_closes() {
        let store = TelemetryStore::new();
        let (tx, mut rx) = mpsc::unbounded_channel::<LinkEvent>();
        drop(tx);
        let exit = run_event_pump(&mut rx, &[], &store).await;
        assert_eq!(exit, PumpExit::ChannelClosed);
    }
}
