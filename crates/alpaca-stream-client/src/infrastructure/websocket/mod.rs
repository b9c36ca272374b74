//! Blocking TLS Websocket Transport
//!
//! Adapter implementing the [`Connector`] and [`Transport`] ports over a
//! synchronous `tungstenite` websocket. One session worker thread blocks
//! in `receive`; `send` and `close` remain callable from other threads:
//!
//! - The socket sits behind a mutex. `receive` reads with a short TCP
//!   read timeout and releases the lock between polls, so a concurrent
//!   `send` waits at most one poll interval.
//! - `close` never touches the mutex. It shuts down a pre-cloned handle
//!   of the underlying TCP stream, which fails the blocked read and
//!   unblocks the worker.
//!
//! A [`HeartbeatMonitor`] rides along with each connection: the receive
//! loop pings the server on a fixed cadence and fails the read when the
//! server goes silent, so the session supervisor reconnects instead of
//! polling a dead socket forever.

mod heartbeat;

pub use heartbeat::{HeartbeatAction, HeartbeatConfig, HeartbeatMonitor};

use std::net::{Shutdown, TcpStream};
use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

use crate::application::ports::{Connector, Transport, TransportError, WireFrame};

/// How long a single socket read blocks before the lock is released for
/// pending senders.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

static INIT_CRYPTO: Once = Once::new();

/// Install the process-wide rustls crypto provider once.
fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        // Fails only when another provider is already installed, which
        // is fine.
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

// =============================================================================
// Connector
// =============================================================================

/// Opens TLS websocket connections.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    poll_interval: Duration,
    heartbeat: HeartbeatConfig,
}

impl WebSocketConnector {
    /// Create a connector with default poll interval and heartbeat.
    #[must_use]
    pub fn new() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            heartbeat: HeartbeatConfig::default(),
        }
    }

    /// Override the receive poll interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Override the heartbeat configuration.
    #[must_use]
    pub fn with_heartbeat(mut self, heartbeat: HeartbeatConfig) -> Self {
        self.heartbeat = heartbeat;
        self
    }
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for WebSocketConnector {
    fn connect(&self, url: &str) -> Result<Arc<dyn Transport>, TransportError> {
        init_crypto();

        let (socket, response) = tungstenite::connect(url)
            .map_err(|err| TransportError::ConnectFailed(err.to_string()))?;
        debug!(url, status = %response.status(), "websocket connected");

        let raw = match socket.get_ref() {
            MaybeTlsStream::Plain(stream) => stream.try_clone(),
            MaybeTlsStream::Rustls(tls) => tls.get_ref().try_clone(),
            _ => {
                return Err(TransportError::ConnectFailed(
                    "unsupported TLS stream type".to_string(),
                ));
            }
        }
        .map_err(|err| TransportError::ConnectFailed(err.to_string()))?;

        raw.set_read_timeout(Some(self.poll_interval))
            .map_err(|err| TransportError::ConnectFailed(err.to_string()))?;

        Ok(Arc::new(WebSocketTransport {
            socket: Mutex::new(socket),
            raw,
            closed: AtomicBool::new(false),
            heartbeat: Mutex::new(HeartbeatMonitor::new(self.heartbeat.clone())),
        }))
    }
}

// =============================================================================
// Transport
// =============================================================================

/// A connected websocket.
pub struct WebSocketTransport {
    socket: Mutex<WebSocket<MaybeTlsStream<TcpStream>>>,
    raw: TcpStream,
    closed: AtomicBool,
    heartbeat: Mutex<HeartbeatMonitor>,
}

impl std::fmt::Debug for WebSocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketTransport")
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl Transport for WebSocketTransport {
    fn send(&self, frame: &WireFrame) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        let message = match frame {
            WireFrame::Text(text) => Message::text(text.clone()),
            WireFrame::Binary(bytes) => Message::binary(bytes.clone()),
        };
        self.socket
            .lock()
            .send(message)
            .map_err(|err| match err {
                tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                    TransportError::Closed
                }
                other => TransportError::Send(other.to_string()),
            })
    }

    fn receive(&self) -> Result<WireFrame, TransportError> {
        loop {
            if self.closed.load(Ordering::SeqCst) {
                return Err(TransportError::Closed);
            }

            let mut socket = self.socket.lock();
            match socket.read() {
                Ok(Message::Text(text)) => {
                    self.heartbeat.lock().record_activity();
                    return Ok(WireFrame::Text(text.to_string()));
                }
                Ok(Message::Binary(bytes)) => {
                    self.heartbeat.lock().record_activity();
                    return Ok(WireFrame::Binary(bytes.to_vec()));
                }
                // tungstenite queues the pong reply itself; nothing to
                // surface.
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {
                    self.heartbeat.lock().record_activity();
                }
                Ok(Message::Close(frame)) => {
                    trace!(?frame, "close frame from peer");
                    drop(socket);
                    self.close();
                    return Err(TransportError::Closed);
                }
                Err(tungstenite::Error::Io(err))
                    if matches!(
                        err.kind(),
                        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                    ) =>
                {
                    let action = self.heartbeat.lock().poll();
                    match action {
                        HeartbeatAction::Wait => {}
                        HeartbeatAction::SendPing => {
                            trace!("sending heartbeat ping");
                            if let Err(err) = socket.send(Message::Ping(tungstenite::Bytes::new()))
                            {
                                debug!(error = %err, "heartbeat ping failed");
                            }
                        }
                        HeartbeatAction::Timeout => {
                            drop(socket);
                            self.close();
                            return Err(TransportError::Receive(
                                "heartbeat timeout: no traffic from server".to_string(),
                            ));
                        }
                    }
                    // Poll tick; release the lock so senders get a turn.
                    drop(socket);
                }
                Err(
                    tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed,
                ) => return Err(TransportError::Closed),
                Err(other) => {
                    if self.closed.load(Ordering::SeqCst) {
                        return Err(TransportError::Closed);
                    }
                    return Err(TransportError::Receive(other.to_string()));
                }
            }
        }
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        // Bypasses the socket mutex on purpose: the worker may hold it
        // inside a blocked read.
        if let Err(err) = self.raw.shutdown(Shutdown::Both) {
            trace!(error = %err, "tcp shutdown after close");
        }
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.close();
    }
}
