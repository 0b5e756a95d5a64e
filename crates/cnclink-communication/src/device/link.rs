//! Device link lifecycle and shared state

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cnclink_core::{
    ConnectionStatus, Error, EventBus, EventBusConfig, EventQueue, LinkEvent, MachineStatus,
    Result, Subscription, SubscriptionId, TransportError,
};

use super::{reader, LinkConfig};
use crate::communication::serial::SerialConnector;
use crate::communication::{ConnectionParams, Connector, Transport};
use crate::firmware::grbl::{StatusParser, STATUS_QUERY};

/// How long `fail_session` waits on the lifecycle lock before rechecking
const LIFECYCLE_RETRY: Duration = Duration::from_millis(20);

/// A transport tagged with the session that opened it
pub(crate) struct OpenTransport {
    pub(crate) session: u64,
    pub(crate) transport: Box<dyn Transport>,
}

/// State shared by the link handle, the reader thread and the services
pub(crate) struct LinkInner {
    pub(crate) config: LinkConfig,
    connector: Box<dyn Connector>,
    /// Open transport; holding this lock is the right to read the device.
    /// Only usable while its session is current.
    pub(crate) transport: Mutex<Option<OpenTransport>>,
    /// Serialises connect and disconnect
    lifecycle: Mutex<()>,
    /// Bumped whenever a session ends; the reader exits when it moves
    session: AtomicU64,
    connection: RwLock<ConnectionStatus>,
    status: RwLock<MachineStatus>,
    port: RwLock<Option<String>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    pub(crate) queue: Arc<EventQueue>,
    pub(crate) bus: Arc<EventBus>,
}

impl LinkInner {
    pub(crate) fn current_session(&self) -> u64 {
        self.session.load(Ordering::SeqCst)
    }

    pub(crate) fn is_session(&self, session: u64) -> bool {
        self.current_session() == session
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.connection.read().is_connected()
    }

    pub(crate) fn status(&self) -> MachineStatus {
        self.status.read().clone()
    }

    /// Turn one device line into events, in wire order.
    ///
    /// Every line is echoed as a `DeviceLine`; a status frame that changes the
    /// device state is followed by a `StatusChanged` carrying the full snapshot.
    pub(crate) fn process_line(&self, line: &str) {
        tracing::debug!("<< {}", line);

        let mut events = vec![LinkEvent::device_line(line)];
        if let Some(update) = StatusParser::parse(line) {
            let mut status = self.status.write();
            if status.apply(&update) {
                tracing::info!("Machine state changed to {}", status.state);
                events.push(LinkEvent::status_changed(status.clone()));
            }
        }

        self.queue.extend(events);
    }

    fn open_session(self: &Arc<Self>) -> Result<String> {
        let Some(port) = self.connector.discover(self.config.port.as_deref()) else {
            return Err(self.record_failure(TransportError::NoPortDiscovered));
        };

        tracing::info!("Opening {} at {} baud", port, self.config.baud_rate);
        let params = ConnectionParams::new(port.as_str(), self.config.baud_rate)
            .with_timeout(self.config.read_timeout);
        let mut transport = self
            .connector
            .open(&params)
            .map_err(|e| self.record_failure(e))?;

        if !self.config.settle_delay.is_zero() {
            tracing::debug!("Waiting {:?} for device to settle", self.config.settle_delay);
            thread::sleep(self.config.settle_delay);
        }

        if let Err(e) = transport.clear_buffers() {
            let _ = transport.close();
            return Err(self.record_failure(e));
        }

        let session = self.current_session();
        *self.transport.lock() = Some(OpenTransport { session, transport });
        *self.connection.write() = ConnectionStatus::connected(&port);
        self.status.write().connected = true;
        *self.port.write() = Some(port.clone());
        self.queue.push(LinkEvent::connection_changed(true));

        match reader::spawn(Arc::clone(self), session) {
            Ok(handle) => *self.reader.lock() = Some(handle),
            Err(e) => {
                tracing::error!("Failed to start reader thread: {}", e);
                self.shutdown_session(ConnectionStatus::failed(&e));
                return Err(Error::Io(e));
            }
        }

        tracing::info!("Connected to {}", port);
        Ok(port)
    }

    /// Record a failed connection attempt and hand the error back
    fn record_failure(&self, error: TransportError) -> Error {
        tracing::error!("Connection failed: {}", error);
        *self.connection.write() = ConnectionStatus::failed(&error);
        Error::Transport(error)
    }

    /// End `session` after a transport failure, unless it already ended.
    ///
    /// Polls the lifecycle lock instead of blocking on it: a disconnect that
    /// holds the lock may be joining the very thread that called this.
    pub(crate) fn fail_session(&self, session: u64, error: &TransportError) {
        while self.is_session(session) {
            if let Some(_guard) = self.lifecycle.try_lock_for(LIFECYCLE_RETRY) {
                if self.is_session(session) {
                    tracing::error!("Transport failed, disconnecting: {}", error);
                    self.shutdown_session(ConnectionStatus::failed(error));
                }
                return;
            }
        }
    }

    /// Close the current session. Caller holds the lifecycle lock.
    fn shutdown_session(&self, status: ConnectionStatus) {
        self.session.fetch_add(1, Ordering::SeqCst);

        if let Some(handle) = self.reader.lock().take() {
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                tracing::warn!("Reader thread panicked");
            }
        }

        if let Some(mut open) = self.transport.lock().take() {
            if let Err(e) = open.transport.close() {
                tracing::warn!("Error closing {}: {}", open.transport.name(), e);
            }
        }

        let was_connected = self.connection.read().is_connected();
        *self.connection.write() = status;
        self.status.write().connected = false;
        *self.port.write() = None;

        if was_connected {
            self.queue.push(LinkEvent::connection_changed(false));
        }
    }
}

/// Handle to the device link
///
/// Cheap to clone; all clones share one connection, one machine status
/// snapshot, one event queue and one event bus.
#[derive(Clone)]
pub struct DeviceLink {
    pub(crate) inner: Arc<LinkInner>,
}

impl DeviceLink {
    /// Create a link that opens transports through `connector`
    pub fn new(config: LinkConfig, connector: impl Connector + 'static) -> Self {
        let bus = EventBus::with_config(EventBusConfig {
            drain_interval: config.drain_interval,
        });

        Self {
            inner: Arc::new(LinkInner {
                config,
                connector: Box::new(connector),
                transport: Mutex::new(None),
                lifecycle: Mutex::new(()),
                session: AtomicU64::new(0),
                connection: RwLock::new(ConnectionStatus::disconnected()),
                status: RwLock::new(MachineStatus::new()),
                port: RwLock::new(None),
                reader: Mutex::new(None),
                queue: Arc::new(EventQueue::new()),
                bus: Arc::new(bus),
            }),
        }
    }

    /// Create a link over real serial ports
    pub fn serial(config: LinkConfig) -> Self {
        Self::new(config, SerialConnector)
    }

    /// Discover, open and settle the device, start the reader and issue an
    /// initial status query.
    ///
    /// Returns the port connected to. Already connected is a no-op success.
    /// Blocks for the settle delay plus the initial query window.
    ///
    /// The initial query runs outside the lifecycle lock. If a `disconnect`
    /// ends the new session before the query is written, the connect still
    /// succeeds and the link is left disconnected.
    pub fn connect(&self) -> Result<String> {
        let (port, session) = {
            let _guard = self.inner.lifecycle.lock();
            if self.inner.is_connected() {
                if let Some(port) = self.port() {
                    tracing::debug!("Already connected to {}", port);
                    return Ok(port);
                }
            }
            let port = self.inner.open_session()?;
            (port, self.inner.current_session())
        };

        match self.send_command(STATUS_QUERY, self.inner.config.initial_query_window) {
            Ok(_) => Ok(port),
            Err(Error::NotConnected) if !self.inner.is_session(session) => {
                tracing::info!("Session on {} ended before the initial status query", port);
                Ok(port)
            }
            Err(e) => Err(e),
        }
    }

    /// Stop the reader and close the transport.
    ///
    /// Returns within about one read timeout, or one correlation window if a
    /// command is in flight. Safe to call when already disconnected.
    pub fn disconnect(&self) {
        let _guard = self.inner.lifecycle.lock();
        if !self.inner.is_connected() && self.inner.transport.lock().is_none() {
            return;
        }
        tracing::info!("Disconnecting");
        self.inner.shutdown_session(ConnectionStatus::disconnected());
    }

    /// Check if the link is connected
    pub fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    /// Connection state and detail (including the last error)
    pub fn connection_status(&self) -> ConnectionStatus {
        self.inner.connection.read().clone()
    }

    /// Current machine status snapshot
    pub fn status(&self) -> MachineStatus {
        self.inner.status()
    }

    /// Port of the open session
    pub fn port(&self) -> Option<String> {
        self.inner.port.read().clone()
    }

    /// Register a subscriber.
    ///
    /// The new channel first receives a `StatusChanged` with the current
    /// snapshot; after that it sees whole drain cycles only.
    pub fn subscribe(&self) -> Subscription {
        let (sender, receiver) = tokio::sync::mpsc::unbounded_channel();
        // Receiver is alive, send cannot fail
        let _ = sender.send(LinkEvent::status_changed(self.status()));
        let id = self.inner.bus.register(sender);
        Subscription { id, receiver }
    }

    /// Remove a subscriber; false if it was not registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.bus.unsubscribe(id)
    }

    /// Number of registered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.inner.bus.subscriber_count()
    }

    /// Event bus fed by this link
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.inner.bus
    }

    /// Queue the reader and correlator append to
    pub fn queue(&self) -> &Arc<EventQueue> {
        &self.inner.queue
    }

    /// Link configuration
    pub fn config(&self) -> &LinkConfig {
        &self.inner.config
    }
}

impl std::fmt::Debug for DeviceLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceLink")
            .field("connection", &self.connection_status())
            .field("port", &self.port())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
