//! Streaming Session
//!
//! The public face of the crate. A [`Session`] owns one logical stream
//! connection: a subscription registry shared with the caller, and one
//! background worker thread that drives the connection state machine
//! under a reconnect supervisor.
//!
//! Threading model: `run` spawns the worker, `stop` joins it. Handler
//! invocations happen synchronously on the worker thread in frame
//! order. `subscribe` and `unsubscribe` are safe from any thread,
//! including from inside a handler; registry mutation never holds the
//! lock across a network send.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use thiserror::Error;
use tracing::{trace, warn};

use crate::application::ports::{Connector, Protocol, Transport};
use crate::domain::channel::ChannelKind;
use crate::domain::streaming::StreamEvent;
use crate::domain::subscription::{SubscriptionRegistry, Symbol, WILDCARD};
use crate::infrastructure::config::Credentials;
use crate::infrastructure::websocket::WebSocketConnector;

mod machine;
/// Reconnect backoff configuration and delay schedule.
pub mod reconnect;
mod supervisor;

pub use reconnect::ReconnectConfig;

// =============================================================================
// Lifecycle
// =============================================================================

/// Lifecycle state of a session's current connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No connection; between attempts or before `run`.
    Idle,
    /// Transport connect in progress.
    Connecting,
    /// Connected; greeting validated where the variant expects one.
    Connected,
    /// Credentials acknowledged.
    Authenticated,
    /// Subscriptions replayed; read loop active.
    Running,
    /// Shutdown requested; worker winding down.
    Closing,
}

// =============================================================================
// Configuration and Errors
// =============================================================================

/// Optional session knobs.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Override the variant's default endpoint URL.
    pub endpoint: Option<String>,
    /// Reconnect backoff schedule.
    pub reconnect: ReconnectConfig,
}

/// Caller errors, reported synchronously.
///
/// Connection-level failures never appear here; the supervisor retries
/// them silently.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// The channel kind is not served by this protocol variant.
    #[error("channel {kind:?} is not supported by the {variant} stream")]
    UnsupportedChannel {
        /// Requested channel kind.
        kind: ChannelKind,
        /// Variant name.
        variant: &'static str,
    },
}

// =============================================================================
// Shared Worker State
// =============================================================================

/// State shared between the caller-facing [`Session`] handle and the
/// worker thread.
pub(crate) struct Shared {
    pub(crate) protocol: Arc<dyn Protocol>,
    pub(crate) connector: Arc<dyn Connector>,
    pub(crate) credentials: Credentials,
    pub(crate) endpoint: String,
    pub(crate) registry: SubscriptionRegistry,
    pub(crate) reconnect: ReconnectConfig,
    state: Mutex<LifecycleState>,
    shutdown: Mutex<bool>,
    shutdown_signal: Condvar,
    transport: Mutex<Option<Arc<dyn Transport>>>,
}

impl Shared {
    fn state(&self) -> LifecycleState {
        *self.state.lock()
    }

    fn set_state(&self, next: LifecycleState) {
        let mut state = self.state.lock();
        if *state != next {
            trace!(from = ?*state, to = ?next, "session state transition");
            *state = next;
        }
    }

    fn is_shutdown(&self) -> bool {
        *self.shutdown.lock()
    }

    fn request_shutdown(&self) {
        *self.shutdown.lock() = true;
        self.shutdown_signal.notify_all();
    }

    fn rearm(&self) {
        *self.shutdown.lock() = false;
    }

    /// Wait out a backoff delay, returning `true` if shutdown was
    /// requested before or during the wait.
    fn wait_for_shutdown(&self, timeout: Duration) -> bool {
        let mut shutdown = self.shutdown.lock();
        if !*shutdown {
            let _ = self.shutdown_signal.wait_for(&mut shutdown, timeout);
        }
        *shutdown
    }

    /// Publish the attempt's transport so `stop` and `subscribe` can
    /// reach it. Closes it straight away when shutdown already raced in.
    fn install_transport(&self, transport: &Arc<dyn Transport>) {
        *self.transport.lock() = Some(Arc::clone(transport));
        if self.is_shutdown() {
            transport.close();
        }
    }

    fn current_transport(&self) -> Option<Arc<dyn Transport>> {
        self.transport.lock().clone()
    }

    /// Close and forget the attempt's transport.
    fn drop_transport(&self) {
        if let Some(transport) = self.transport.lock().take() {
            transport.close();
        }
    }

    /// Close the transport without forgetting it or touching the
    /// shutdown flag.
    fn close_transport(&self) {
        if let Some(transport) = self.transport.lock().as_ref() {
            transport.close();
        }
    }
}

// =============================================================================
// Session
// =============================================================================

/// One long-lived logical stream connection.
///
/// Construct with a protocol variant and credentials, register handlers
/// with [`subscribe`](Self::subscribe), then call [`run`](Self::run).
/// The session reconnects on any failure until [`stop`](Self::stop).
pub struct Session {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    /// Create a session over the default TLS websocket transport.
    #[must_use]
    pub fn new(protocol: impl Protocol + 'static, credentials: Credentials) -> Self {
        Self::with_config(protocol, credentials, SessionConfig::default())
    }

    /// Create a session with explicit configuration.
    #[must_use]
    pub fn with_config(
        protocol: impl Protocol + 'static,
        credentials: Credentials,
        config: SessionConfig,
    ) -> Self {
        Self::with_connector(
            Arc::new(protocol),
            Arc::new(WebSocketConnector::new()),
            credentials,
            config,
        )
    }

    /// Create a session over a caller-supplied connector.
    ///
    /// This is the seam for in-process transports in tests and for
    /// callers with their own socket stack.
    #[must_use]
    pub fn with_connector(
        protocol: Arc<dyn Protocol>,
        connector: Arc<dyn Connector>,
        credentials: Credentials,
        config: SessionConfig,
    ) -> Self {
        let endpoint = config
            .endpoint
            .unwrap_or_else(|| protocol.endpoint().to_string());
        Self {
            shared: Arc::new(Shared {
                protocol,
                connector,
                credentials,
                endpoint,
                registry: SubscriptionRegistry::new(),
                reconnect: config.reconnect,
                state: Mutex::new(LifecycleState::Idle),
                shutdown: Mutex::new(false),
                shutdown_signal: Condvar::new(),
                transport: Mutex::new(None),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.shared.state()
    }

    /// Register `handler` for `kind` on `symbols`.
    ///
    /// An empty symbol list registers a wildcard handler covering every
    /// symbol without an exact-match handler of its own. Re-registering
    /// a symbol replaces its handler. When the session is already
    /// running, the full subscription snapshot is re-sent to the server
    /// from the calling thread; a send failure is logged and left for
    /// the supervisor to repair.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::UnsupportedChannel`] if the variant does
    /// not serve `kind`.
    pub fn subscribe<F>(
        &self,
        kind: ChannelKind,
        symbols: &[Symbol],
        handler: F,
    ) -> Result<(), SessionError>
    where
        F: Fn(StreamEvent) + Send + Sync + 'static,
    {
        self.ensure_supported(kind)?;
        self.shared.registry.register(kind, symbols, Arc::new(handler));

        if self.shared.state() == LifecycleState::Running {
            self.send_snapshot();
        }
        Ok(())
    }

    /// Remove handlers for `kind` on `symbols`.
    ///
    /// An empty symbol list removes the wildcard handler. When the
    /// session is running, a targeted unsubscribe frame listing exactly
    /// the removed symbols is sent; other registrations are untouched.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::UnsupportedChannel`] if the variant does
    /// not serve `kind`.
    pub fn unsubscribe(&self, kind: ChannelKind, symbols: &[Symbol]) -> Result<(), SessionError> {
        self.ensure_supported(kind)?;
        self.shared.registry.unregister(kind, symbols);

        if self.shared.state() == LifecycleState::Running {
            let removed: Vec<Symbol> = if symbols.is_empty() {
                vec![WILDCARD.to_string()]
            } else {
                symbols.to_vec()
            };
            match self.shared.protocol.unsubscribe_frame(kind, &removed) {
                Ok(Some(frame)) => {
                    if let Some(transport) = self.shared.current_transport() {
                        if let Err(err) = transport.send(&frame) {
                            warn!(error = %err, "unsubscribe frame send failed");
                        }
                    }
                }
                Ok(None) => {}
                Err(err) => warn!(error = %err, "unsubscribe frame encode failed"),
            }
        }
        Ok(())
    }

    /// Start the background worker.
    ///
    /// Idempotent: calling `run` while the worker is alive is a no-op.
    /// After `stop`, `run` starts a fresh worker with the registry
    /// intact.
    pub fn run(&self) {
        let mut worker = self.worker.lock();
        if let Some(handle) = worker.as_ref() {
            if !handle.is_finished() {
                return;
            }
        }
        if let Some(handle) = worker.take() {
            let _ = handle.join();
        }

        self.shared.rearm();
        self.shared.set_state(LifecycleState::Idle);
        let shared = Arc::clone(&self.shared);
        *worker = Some(std::thread::spawn(move || supervisor::run(&shared)));
    }

    /// Stop the session and wait for the worker to exit.
    ///
    /// Sets the shutdown flag, closes the transport to unblock a
    /// pending read, and joins the worker. No handler runs after `stop`
    /// returns.
    pub fn stop(&self) {
        self.shared.request_shutdown();
        if self.shared.state() != LifecycleState::Idle {
            self.shared.set_state(LifecycleState::Closing);
        }
        self.shared.drop_transport();

        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
        self.shared.set_state(LifecycleState::Idle);
    }

    /// Close the current transport without requesting shutdown.
    ///
    /// The supervisor treats the dropped connection like any other
    /// failure and reconnects.
    pub fn close(&self) {
        self.shared.close_transport();
    }

    fn ensure_supported(&self, kind: ChannelKind) -> Result<(), SessionError> {
        if self.shared.protocol.supports(kind) {
            Ok(())
        } else {
            Err(SessionError::UnsupportedChannel {
                kind,
                variant: self.shared.protocol.name(),
            })
        }
    }

    /// Re-send the full subscription snapshot on the live transport.
    fn send_snapshot(&self) {
        let Some(transport) = self.shared.current_transport() else {
            return;
        };
        let snapshot = self.shared.registry.snapshot();
        match self.shared.protocol.subscribe_frame(&snapshot) {
            Ok(Some(frame)) => {
                if let Err(err) = transport.send(&frame) {
                    warn!(error = %err, "subscribe frame send failed");
                }
            }
            Ok(None) => {}
            Err(err) => warn!(error = %err, "subscribe frame encode failed"),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("variant", &self.shared.protocol.name())
            .field("endpoint", &self.shared.endpoint)
            .field("state", &self.shared.state())
            .finish_non_exhaustive()
    }
}
