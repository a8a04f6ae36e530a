// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the plc-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! PLC connection manager
//!
//! [`ConnectionManager`] owns the transport handle and the connection state
//! machine:
//!
//! ```text
//! Disconnected --connect ok--> Connected --transport fault--> Disconnected (auto-reconnect)
//!      ^  |                        |
//!      |  +--connect failed--------+--disconnect()--> ManuallyDisconnected
//!      +----------------------------------------------------- connect() --+
//! ```
//!
//! A transport fault demotes the state to `Disconnected` and spawns a
//! background reconnection task that retries every `retry_interval` until it
//! succeeds or is cancelled. Every explicit `connect()` or `disconnect()`
//! bumps a connection epoch; a reconnection loop started under an older epoch
//! stops at its next check and can never overwrite the newer state.
//!
//! State and transport are only written while the link lock is held, after the
//! epoch has been checked, so readers always see the outcome of the most
//! recent operation.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use log::{debug, error, info, warn};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};

use super::transport::{RegisterTransport, TransportConnector, TransportError};

/// Register read by the liveness check
pub const LIVENESS_REGISTER: u16 = 0;

/// Default delay between two reconnection attempts
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Longest single sleep inside a retry wait, cancellation is checked in between
const WAIT_SLICE: Duration = Duration::from_secs(1);

/// Connection state as seen by the scheduler and the renderers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    Disconnected,
    Connected,
    Reconnecting,
    ManuallyDisconnected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connected => "Connected",
            ConnectionState::Reconnecting => "Reconnecting...",
            ConnectionState::ManuallyDisconnected => "Manually Disconnected",
        };
        f.write_str(text)
    }
}

/// Failure of a register read
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReadError {
    /// No transport is available, the read was not attempted
    #[error("not connected to the PLC")]
    NotConnected,

    /// The PLC refused the request; the connection is unaffected
    #[error("PLC rejected read of register {address}: {code}")]
    Protocol { address: u16, code: String },

    /// The link broke during the read; reconnection has been started
    #[error("transport fault while reading register {address}: {reason}")]
    TransportFault { address: u16, reason: String },
}

struct Link {
    transport: Option<Box<dyn RegisterTransport>>,
}

/// State and fault flag, always written together
#[derive(Debug, Clone, Copy)]
struct Status {
    state: ConnectionState,
    /// Set when the current `Disconnected` state comes from a fault
    faulted: bool,
}

struct ReconnectTask {
    epoch: u64,
    handle: JoinHandle<()>,
}

struct Shared {
    connector: Arc<dyn TransportConnector>,
    retry_interval: Duration,
    link: AsyncMutex<Link>,
    /// Last address passed to `connect`, kept across disconnects
    target: Mutex<Option<(String, u16)>>,
    status: RwLock<Status>,
    epoch: AtomicU64,
    reconnect: Mutex<Option<ReconnectTask>>,
}

/// Owner of the PLC link and of its state machine.
///
/// Cloning is cheap and every clone drives the same connection.
#[derive(Clone)]
pub struct ConnectionManager {
    shared: Arc<Shared>,
}

impl ConnectionManager {
    /// Create a disconnected manager.
    ///
    /// ### Parameters
    ///
    /// * `connector` - Factory used for every connection attempt
    /// * `retry_interval` - Delay between two background reconnection attempts
    pub fn new(connector: Arc<dyn TransportConnector>, retry_interval: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                connector,
                retry_interval,
                link: AsyncMutex::new(Link { transport: None }),
                target: Mutex::new(None),
                status: RwLock::new(Status {
                    state: ConnectionState::Disconnected,
                    faulted: false,
                }),
                epoch: AtomicU64::new(0),
                reconnect: Mutex::new(None),
            }),
        }
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.status().state
    }

    fn status(&self) -> Status {
        *self
            .shared
            .status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Human readable status for display.
    pub fn status_label(&self) -> &'static str {
        let status = self.status();
        match status.state {
            ConnectionState::Connected => "Connected to PLC",
            ConnectionState::Reconnecting => "Reconnecting...",
            ConnectionState::Disconnected if status.faulted => "Connection Lost - Reconnecting",
            ConnectionState::Disconnected | ConnectionState::ManuallyDisconnected => {
                "Disconnected"
            }
        }
    }

    /// Whether a background reconnection sequence is currently running
    pub fn is_reconnecting(&self) -> bool {
        let slot = self
            .shared
            .reconnect
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        slot.as_ref().is_some_and(|task| {
            task.epoch == self.current_epoch() && !task.handle.is_finished()
        })
    }

    /// Connect to `host:port`, replacing any existing link.
    ///
    /// This supersedes any running reconnection sequence. It does not start a
    /// new one on failure; see [`ConnectionManager::ensure_reconnecting`].
    ///
    /// ### Returns
    ///
    /// `true` if the link is up and the state is `Connected`
    pub async fn connect(&self, host: &str, port: u16) -> bool {
        let epoch = self.shared.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.cancel_reconnection();

        let mut link = self.shared.link.lock().await;
        *self.target() = Some((host.to_string(), port));
        self.open_locked(&mut link, epoch).await
    }

    /// Close the link and stop reconnecting until the next [`connect`](Self::connect).
    pub async fn disconnect(&self) {
        self.shared.epoch.fetch_add(1, Ordering::SeqCst);
        self.cancel_reconnection();

        let mut link = self.shared.link.lock().await;
        if let Some(mut transport) = link.transport.take() {
            transport.close().await;
        }
        self.set_state(ConnectionState::ManuallyDisconnected, false);
        info!("Manually disconnected from PLC");
    }

    /// Read `count` holding registers starting at `address`.
    ///
    /// ### Errors
    ///
    /// * [`ReadError::NotConnected`] when the state is not `Connected`
    /// * [`ReadError::Protocol`] when the PLC answers with an exception;
    ///   the state is left untouched
    /// * [`ReadError::TransportFault`] when the link broke; the state drops
    ///   to `Disconnected` and background reconnection starts
    pub async fn read_registers(&self, address: u16, count: u16) -> Result<Vec<u16>, ReadError> {
        if !self.is_connected() {
            return Err(ReadError::NotConnected);
        }

        let mut link = self.shared.link.lock().await;
        let epoch = self.current_epoch();
        let Some(transport) = link.transport.as_mut() else {
            return Err(ReadError::NotConnected);
        };

        match transport.read_holding_registers(address, count).await {
            Ok(words) => Ok(words),
            Err(TransportError::Exception(code)) => Err(ReadError::Protocol { address, code }),
            Err(TransportError::Fault(reason)) => {
                warn!(
                    "PLC connection lost while reading register {}: {}",
                    address, reason
                );
                if let Some(mut broken) = link.transport.take() {
                    broken.close().await;
                }
                self.handle_fault(epoch);
                Err(ReadError::TransportFault { address, reason })
            }
        }
    }

    /// Lightweight read detecting a silently dropped link.
    ///
    /// An exception response still proves the PLC is reachable. A transport
    /// fault is handled exactly like one during [`read_registers`](Self::read_registers).
    pub async fn check_liveness(&self) -> bool {
        match self.read_registers(LIVENESS_REGISTER, 1).await {
            Ok(_) | Err(ReadError::Protocol { .. }) => true,
            Err(ReadError::NotConnected) | Err(ReadError::TransportFault { .. }) => false,
        }
    }

    /// Start background reconnection if the link is down and a target is known.
    ///
    /// No-op while connected, after a manual disconnect, before any
    /// [`connect`](Self::connect), or while a sequence for the current epoch
    /// is already running.
    pub fn ensure_reconnecting(&self) {
        if self.state() != ConnectionState::Disconnected {
            return;
        }
        if self.target().is_none() {
            debug!("No PLC address known yet, not reconnecting");
            return;
        }
        self.start_reconnection();
    }

    fn target(&self) -> std::sync::MutexGuard<'_, Option<(String, u16)>> {
        self.shared
            .target
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn current_epoch(&self) -> u64 {
        self.shared.epoch.load(Ordering::SeqCst)
    }

    fn set_state(&self, state: ConnectionState, faulted: bool) {
        self.update_status(state, |_| faulted);
    }

    /// Change the state, leaving the fault flag as it is.
    fn set_state_keeping_fault(&self, state: ConnectionState) {
        self.update_status(state, |faulted| faulted);
    }

    fn update_status(&self, state: ConnectionState, faulted: impl FnOnce(bool) -> bool) {
        let mut current = self
            .shared
            .status
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if current.state != state {
            debug!("PLC connection state: {:?} -> {:?}", current.state, state);
        }
        current.faulted = faulted(current.faulted);
        current.state = state;
    }

    /// Must be called with the link lock held.
    fn handle_fault(&self, epoch: u64) {
        if epoch != self.current_epoch() || self.state() == ConnectionState::ManuallyDisconnected {
            return;
        }
        self.set_state(ConnectionState::Disconnected, true);
        info!("Starting reconnection attempts...");
        self.start_reconnection();
    }

    /// Replace the transport with a freshly opened one. Must be called with
    /// the link lock held.
    async fn open_locked(&self, link: &mut Link, epoch: u64) -> bool {
        if let Some(mut old) = link.transport.take() {
            old.close().await;
        }
        let Some((host, port)) = self.target().clone() else {
            warn!("No PLC address configured, cannot connect");
            return false;
        };

        match self.shared.connector.open(&host, port).await {
            Ok(mut transport) => {
                if epoch != self.current_epoch() {
                    debug!("Discarding link to {}:{} opened by a superseded attempt", host, port);
                    transport.close().await;
                    return false;
                }
                link.transport = Some(transport);
                self.set_state(ConnectionState::Connected, false);
                info!("Connected to PLC at {}:{}", host, port);
                true
            }
            Err(e) => {
                if epoch == self.current_epoch() {
                    self.set_state_keeping_fault(ConnectionState::Disconnected);
                }
                error!("Could not connect to PLC at {}:{}: {}", host, port, e);
                false
            }
        }
    }

    fn start_reconnection(&self) {
        let epoch = self.current_epoch();
        let mut slot = self
            .shared
            .reconnect
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(task) = slot.as_ref() {
            if task.epoch == epoch && !task.handle.is_finished() {
                debug!("Reconnection already in progress");
                return;
            }
        }
        if let Some(stale) = slot.take() {
            stale.handle.abort();
        }

        let manager = self.clone();
        let handle = tokio::spawn(async move { manager.reconnect_loop(epoch).await });
        *slot = Some(ReconnectTask { epoch, handle });
    }

    fn cancel_reconnection(&self) {
        let mut slot = self
            .shared
            .reconnect
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = slot.take() {
            debug!("Cancelling reconnection sequence (epoch {})", task.epoch);
            task.handle.abort();
        }
    }

    fn is_cancelled(&self, epoch: u64) -> bool {
        epoch != self.current_epoch() || self.state() == ConnectionState::ManuallyDisconnected
    }

    async fn reconnect_loop(self, epoch: u64) {
        let interval = self.shared.retry_interval;
        loop {
            {
                let mut link = self.shared.link.lock().await;
                if self.is_cancelled(epoch) {
                    debug!("Reconnection sequence cancelled");
                    return;
                }
                let Some((host, port)) = self.target().clone() else {
                    warn!("No PLC address to reconnect to");
                    return;
                };
                info!("Attempting to reconnect to PLC at {}:{}", host, port);
                self.set_state_keeping_fault(ConnectionState::Reconnecting);

                if self.open_locked(&mut link, epoch).await {
                    info!("Reconnection successful!");
                    return;
                }
            }

            info!("Reconnection failed. Retrying in {:?}...", interval);
            let deadline = Instant::now() + interval;
            loop {
                if self.is_cancelled(epoch) {
                    debug!("Reconnection sequence cancelled");
                    return;
                }
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                sleep((deadline - now).min(WAIT_SLICE)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modbus::decoder::decode_register_pair;
    use crate::modbus::transport::fake::FakeConnector;

    const RETRY: Duration = Duration::from_secs(5);

    fn manager(connector: &FakeConnector) -> ConnectionManager {
        ConnectionManager::new(Arc::new(connector.clone()), RETRY)
    }

    fn set_target(manager: &ConnectionManager) {
        *manager.target() = Some(("plc".to_string(), 502));
    }

    #[tokio::test]
    async fn test_initial_state_is_disconnected() {
        let connector = FakeConnector::default();
        let manager = manager(&connector);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(
            manager.read_registers(0, 2).await,
            Err(ReadError::NotConnected)
        );
        assert!(connector.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_connect_and_read() {
        let connector = FakeConnector::default();
        connector.set_f32(100, 21.5);
        let manager = manager(&connector);

        assert!(manager.connect("plc", 502).await);
        assert_eq!(manager.state(), ConnectionState::Connected);
        assert_eq!(manager.status_label(), "Connected to PLC");

        let words = manager.read_registers(100, 2).await.unwrap();
        assert_eq!(decode_register_pair(&words), Ok(21.5));
    }

    #[tokio::test]
    async fn test_failed_connect_is_disconnected_without_retry() {
        let connector = FakeConnector::with_script(&[false]);
        let manager = manager(&connector);

        assert!(!manager.connect("plc", 502).await);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(!manager.is_reconnecting());
        assert_eq!(connector.attempts().len(), 1);
    }

    #[tokio::test]
    async fn test_exception_response_keeps_connection() {
        let connector = FakeConnector::default();
        let manager = manager(&connector);
        assert!(manager.connect("plc", 502).await);

        let result = manager.read_registers(40, 2).await;
        assert!(matches!(result, Err(ReadError::Protocol { address: 40, .. })));
        assert_eq!(manager.state(), ConnectionState::Connected);
        assert!(!manager.is_reconnecting());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_fault_starts_reconnection() {
        let connector = FakeConnector::default();
        connector.set_f32(0, 1.0);
        let manager = manager(&connector);
        assert!(manager.connect("plc", 502).await);

        connector.push_outcomes(&[false]);
        connector.inject_fault();
        let result = manager.read_registers(0, 2).await;
        assert!(matches!(result, Err(ReadError::TransportFault { .. })));
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(manager.status_label(), "Connection Lost - Reconnecting");
        assert!(manager.is_reconnecting());

        // First background attempt fails, the second one after the interval succeeds
        sleep(Duration::from_millis(10)).await;
        assert_eq!(connector.attempts().len(), 2);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(manager.status_label(), "Connection Lost - Reconnecting");

        sleep(RETRY).await;
        assert_eq!(connector.attempts().len(), 3);
        assert_eq!(manager.state(), ConnectionState::Connected);
        assert!(manager.read_registers(0, 2).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnection_attempts_are_spaced_by_retry_interval() {
        let connector = FakeConnector::with_script(&[false, false, true]);
        let manager = manager(&connector);
        set_target(&manager);

        let start = Instant::now();
        manager.ensure_reconnecting();

        sleep(Duration::from_millis(10)).await;
        assert_eq!(connector.attempts().len(), 1);
        assert_eq!(manager.state(), ConnectionState::Disconnected);

        sleep(RETRY).await;
        assert_eq!(connector.attempts().len(), 2);
        assert_eq!(manager.state(), ConnectionState::Disconnected);

        sleep(RETRY).await;
        assert_eq!(connector.attempts().len(), 3);
        assert_eq!(manager.state(), ConnectionState::Connected);

        let attempts = connector.attempts();
        let tolerance = Duration::from_millis(5);
        assert!(attempts[0] - start <= tolerance);
        for pair in attempts.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(gap >= RETRY && gap <= RETRY + tolerance, "gap {:?}", gap);
        }

        // Nothing more once connected
        sleep(RETRY * 4).await;
        assert_eq!(connector.attempts().len(), 3);
        assert!(!manager.is_reconnecting());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_cancels_reconnection() {
        let connector = FakeConnector::with_script(&[false; 10]);
        let manager = manager(&connector);
        set_target(&manager);

        manager.ensure_reconnecting();
        sleep(Duration::from_millis(10)).await;
        assert_eq!(connector.attempts().len(), 1);

        manager.disconnect().await;
        assert_eq!(manager.state(), ConnectionState::ManuallyDisconnected);
        assert_eq!(manager.status_label(), "Disconnected");

        sleep(RETRY * 6).await;
        assert_eq!(connector.attempts().len(), 1);
        assert_eq!(manager.state(), ConnectionState::ManuallyDisconnected);

        // A manual disconnect never triggers reconnection on its own
        manager.ensure_reconnecting();
        sleep(RETRY * 2).await;
        assert_eq!(connector.attempts().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_starting_reconnection_twice_is_noop() {
        let connector = FakeConnector::with_script(&[false; 10]);
        let manager = manager(&connector);
        set_target(&manager);

        manager.ensure_reconnecting();
        manager.ensure_reconnecting();
        sleep(Duration::from_millis(10)).await;
        manager.ensure_reconnecting();
        assert_eq!(connector.attempts().len(), 1);

        sleep(RETRY).await;
        assert_eq!(connector.attempts().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_foreground_connect_supersedes_background_loop() {
        // Background attempt fails, manual connect succeeds
        let connector = FakeConnector::with_script(&[false, true]);
        let manager = manager(&connector);
        set_target(&manager);

        manager.ensure_reconnecting();
        sleep(Duration::from_millis(10)).await;
        assert_eq!(connector.attempts().len(), 1);

        assert!(manager.connect("plc", 502).await);
        assert_eq!(manager.state(), ConnectionState::Connected);
        assert!(!manager.is_reconnecting());

        // The stale loop must not open another link or touch the state
        sleep(RETRY * 3).await;
        assert_eq!(connector.attempts().len(), 2);
        assert_eq!(manager.state(), ConnectionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_reconnection_before_any_connect() {
        let connector = FakeConnector::default();
        let manager = manager(&connector);

        for _ in 0..3 {
            manager.ensure_reconnecting();
            assert!(!manager.is_reconnecting());
            sleep(RETRY).await;
        }
        assert!(connector.attempts().is_empty());
        assert_eq!(manager.status_label(), "Disconnected");
    }

    #[tokio::test(start_paused = true)]
    async fn test_fault_flag_survives_reconnecting_state() {
        let connector = FakeConnector::default();
        let manager = manager(&connector);
        assert!(manager.connect("plc", 502).await);

        connector.push_outcomes(&[false; 3]);
        connector.inject_fault();
        assert!(manager.read_registers(0, 2).await.is_err());

        manager.set_state_keeping_fault(ConnectionState::Reconnecting);
        assert!(manager.status().faulted);
        manager.set_state_keeping_fault(ConnectionState::Disconnected);
        assert_eq!(manager.status_label(), "Connection Lost - Reconnecting");

        manager.disconnect().await;
        assert!(!manager.status().faulted);
        assert_eq!(manager.status_label(), "Disconnected");
    }

    #[tokio::test]
    async fn test_liveness_check() {
        let connector = FakeConnector::default();
        let manager = manager(&connector);
        assert!(!manager.check_liveness().await);

        assert!(manager.connect("plc", 502).await);
        // Register 0 is not mapped: an exception still proves the PLC answers
        assert!(manager.check_liveness().await);
        assert_eq!(manager.state(), ConnectionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_liveness_fault_is_a_transport_fault() {
        let connector = FakeConnector::default();
        let manager = manager(&connector);
        assert!(manager.connect("plc", 502).await);

        connector.push_outcomes(&[false; 5]);
        connector.inject_fault();
        assert!(!manager.check_liveness().await);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(manager.is_reconnecting());
        manager.disconnect().await;
    }
}
