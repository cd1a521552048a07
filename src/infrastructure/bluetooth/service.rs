//! Smartwatch Service
//!
//! Public connect/disconnect lifecycle for one watch session. Sequences
//! discovery, link establishment, and both telemetry subscriptions, and
//! guarantees teardown back to `Disconnected` on any failure, caller
//! disconnect, or peripheral-initiated link loss.

use crate::domain::settings::Settings;
use crate::domain::telemetry::TelemetryStore;
use crate::error::SessionError;
use crate::infrastructure::bluetooth::adapter::{GattAdapter, LinkEvent};
use crate::infrastructure::bluetooth::protocol;
use crate::infrastructure::bluetooth::session::{self, DeviceSession, PumpExit};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, SystemTime};
use tokio::sync::{mpsc, Mutex as TokioMutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Where the session is in its lifecycle.
///
/// Exactly one peripheral link exists while the state is `Connecting`,
/// `Subscribing`, or `Ready`; none otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Subscribing,
    Ready,
    Disconnecting,
}

struct ActiveSession {
    session: DeviceSession,
    pump: JoinHandle<()>,
}

struct Shared {
    state: StdMutex<SessionState>,
    /// Serializes connect/disconnect/link-loss handling; also owns the live
    /// session between transitions.
    active: TokioMutex<Option<ActiveSession>>,
    /// Set by `disconnect()`, checked by an in-flight `connect()` between
    /// suspension points.
    disconnect_requested: AtomicBool,
}

impl Shared {
    fn set_state(&self, state: SessionState) {
        debug!("Session state -> {:?}", state);
        *self.state.lock().unwrap() = state;
    }
}

/// Driver for one smartwatch session.
///
/// All transitions are serialized; concurrent `connect`/`disconnect` calls
/// queue behind each other. The session does not tear itself down on drop:
/// call [`disconnect`](Self::disconnect) before discarding it.
pub struct SmartwatchService {
    adapter: Arc<dyn GattAdapter>,
    store: TelemetryStore,
    shared: Arc<Shared>,
    discovery_timeout: Duration,
}

impl SmartwatchService {
    pub fn new(adapter: Arc<dyn GattAdapter>, settings: &Settings) -> Self {
        Self {
            adapter,
            store: TelemetryStore::new(),
            shared: Arc::new(Shared {
                state: StdMutex::new(SessionState::Disconnected),
                active: TokioMutex::new(None),
                disconnect_requested: AtomicBool::new(false),
            }),
            discovery_timeout: Duration::from_millis(settings.discovery_timeout_ms),
        }
    }

    /// Discover the watch, open the link, and subscribe to both telemetry
    /// characteristics.
    ///
    /// Idempotent: called while not `Disconnected` it does nothing and
    /// returns the current state. On any failure the session is back in
    /// `Disconnected` with no link or subscription left standing.
    pub async fn connect(&self) -> Result<SessionState, SessionError> {
        let mut active = self.shared.active.lock().await;

        let current = self.state();
        if current != SessionState::Disconnected {
            debug!("connect() ignored in state {:?}", current);
            return Ok(current);
        }

        self.shared.disconnect_requested.store(false, Ordering::SeqCst);
        self.shared.set_state(SessionState::Connecting);

        let mut session =
            match DeviceSession::discover(self.adapter.as_ref(), self.discovery_timeout).await {
                Ok(session) => session,
                Err(e) => {
                    warn!("Discovery failed: {}", e);
                    self.shared.set_state(SessionState::Disconnected);
                    return Err(e);
                }
            };
        if self.cancel_requested() {
            // Nothing opened yet, nothing to tear down.
            self.shared.set_state(SessionState::Disconnected);
            return Err(SessionError::Cancelled);
        }

        if let Err(e) = session.open_link().await {
            warn!("Link establishment failed: {}", e);
            self.shared.set_state(SessionState::Disconnected);
            return Err(e);
        }
        if self.cancel_requested() {
            self.abort_connect(&mut session, false).await;
            return Err(SessionError::Cancelled);
        }

        self.shared.set_state(SessionState::Subscribing);

        if let Err(e) = session
            .subscribe(
                protocol::HEART_RATE_SERVICE,
                protocol::HEART_RATE_MEASUREMENT,
            )
            .await
        {
            warn!("Heart-rate subscription failed: {}", e);
            self.abort_connect(&mut session, false).await;
            return Err(e);
        }
        if self.cancel_requested() {
            self.abort_connect(&mut session, true).await;
            return Err(SessionError::Cancelled);
        }

        if let Err(e) = session
            .subscribe(
                protocol::HEALTH_THERMOMETER_SERVICE,
                protocol::TEMPERATURE_MEASUREMENT,
            )
            .await
        {
            warn!("Temperature subscription failed: {}", e);
            // Partial subscription is never left standing.
            self.abort_connect(&mut session, true).await;
            return Err(e);
        }
        if self.cancel_requested() {
            self.abort_connect(&mut session, true).await;
            return Err(SessionError::Cancelled);
        }

        let Some(events) = session.take_events() else {
            self.abort_connect(&mut session, true).await;
            return Err(SessionError::LinkFailed(
                "link produced no event stream".to_string(),
            ));
        };
        let subscriptions = session.subscriptions().to_vec();
        let pump = tokio::spawn(watch_link(
            self.shared.clone(),
            self.store.clone(),
            events,
            subscriptions,
        ));

        *active = Some(ActiveSession { session, pump });
        self.shared.set_state(SessionState::Ready);
        info!("Session ready, telemetry flowing");
        Ok(SessionState::Ready)
    }

    /// Tear the session down to `Disconnected`, unconditionally.
    ///
    /// Teardown failures are logged, never propagated: the goal state is
    /// always reached. A no-op when already disconnected. If a `connect()`
    /// is in flight, it is abandoned at its next step boundary and this
    /// call completes after it settles.
    pub async fn disconnect(&self) {
        self.shared.disconnect_requested.store(true, Ordering::SeqCst);
        let mut active = self.shared.active.lock().await;

        let Some(mut act) = active.take() else {
            debug!("disconnect() with no active session");
            return;
        };

        self.shared.set_state(SessionState::Disconnecting);
        act.pump.abort();

        if let Err(e) = act.session.unsubscribe_all().await {
            warn!("Teardown: failed to disable notifications: {}", e);
        }
        if let Err(e) = act.session.close().await {
            warn!("Teardown: failed to close link: {}", e);
        }

        self.store.clear();
        self.shared.set_state(SessionState::Disconnected);
        info!("Disconnected from watch");
    }

    /// True iff the session is `Ready` and telemetry is flowing.
    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Ready
    }

    pub fn state(&self) -> SessionState {
        *self.shared.state.lock().unwrap()
    }

    pub fn latest_heart_rate(&self) -> Option<u16> {
        self.store.latest_heart_rate()
    }

    pub fn latest_temperature_f(&self) -> Option<f32> {
        self.store.latest_temperature_f()
    }

    pub fn heart_rate_history(&self) -> Vec<(SystemTime, u16)> {
        self.store.heart_rate_history()
    }

    pub fn temperature_history(&self) -> Vec<(SystemTime, f32)> {
        self.store.temperature_history()
    }

    fn cancel_requested(&self) -> bool {
        self.shared.disconnect_requested.load(Ordering::SeqCst)
    }

    /// Roll back a partially-established connection. Failures are logged
    /// only; the state always lands on `Disconnected`.
    async fn abort_connect(&self, session: &mut DeviceSession, unsubscribe: bool) {
        if unsubscribe {
            if let Err(e) = session.unsubscribe_all().await {
                warn!("Rollback: failed to disable notifications: {}", e);
            }
        }
        if let Err(e) = session.close().await {
            warn!("Rollback: failed to close link: {}", e);
        }
        self.shared.set_state(SessionState::Disconnected);
    }
}

/// Pumps link events into the store until the link dies, then runs the same
/// unconditional teardown path as `disconnect()`. Last-known readings are
/// retained so callers can still query them after an unexpected drop.
async fn watch_link(
    shared: Arc<Shared>,
    store: TelemetryStore,
    mut events: mpsc::UnboundedReceiver<LinkEvent>,
    subscriptions: Vec<Uuid>,
) {
    let exit = session::run_event_pump(&mut events, &subscriptions, &store).await;
    match exit {
        PumpExit::LinkLost => warn!("Link lost, tearing session down"),
        PumpExit::ChannelClosed => warn!("Link event stream closed unexpectedly"),
    }

    let mut active = shared.active.lock().await;
    let Some(mut act) = active.take() else {
        // disconnect() won the race and already tore everything down.
        return;
    };

    if let Err(e) = act.session.unsubscribe_all().await {
        warn!("Link-loss teardown: failed to disable notifications: {}", e);
    }
    if let Err(e) = act.session.close().await {
        warn!("Link-loss teardown: failed to close link: {}", e);
    }
    shared.set_state(SessionState::Disconnected);
}
