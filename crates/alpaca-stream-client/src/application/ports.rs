//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following the
//! Hexagonal Architecture pattern. The session engine is written entirely
//! against these traits; infrastructure supplies the adapters.
//!
//! ## Driven Ports (Outbound)
//!
//! - [`Connector`] / [`Transport`]: message-framed socket to the stream
//!   endpoint (TLS negotiated by the time `connect` returns)
//! - [`StreamCodec`]: decodes one wire frame into control messages and
//!   typed events
//! - [`Protocol`]: the per-variant value object carrying the endpoint,
//!   handshake style, supported channels, and control-frame encoding

use std::sync::Arc;

use thiserror::Error;

use crate::domain::channel::ChannelKind;
use crate::domain::streaming::StreamEvent;
use crate::domain::subscription::Symbol;

// =============================================================================
// Wire Frames
// =============================================================================

/// One complete message exchanged with the transport.
///
/// Most streams are JSON text; the options stream is MessagePack binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireFrame {
    /// UTF-8 text frame.
    Text(String),
    /// Binary frame.
    Binary(Vec<u8>),
}

// =============================================================================
// Transport Port
// =============================================================================

/// Errors surfaced by a [`Transport`] or [`Connector`].
#[derive(Debug, Error)]
pub enum TransportError {
    /// Opening the connection failed (DNS, TCP, TLS, or websocket
    /// handshake).
    #[error("connection failed: {0}")]
    ConnectFailed(String),

    /// A frame could not be written.
    #[error("send failed: {0}")]
    Send(String),

    /// A frame could not be read.
    #[error("receive failed: {0}")]
    Receive(String),

    /// The connection is closed; reads and writes cannot proceed.
    #[error("connection closed")]
    Closed,
}

/// A connected, message-framed, thread-safe transport.
///
/// `send` may be called from any thread, including while another thread
/// is blocked in `receive`. `close` is the cancellation mechanism: it
/// unblocks a pending `receive`, which then returns
/// [`TransportError::Closed`].
pub trait Transport: Send + Sync {
    /// Write one frame.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the frame cannot be written or the
    /// connection is closed.
    fn send(&self, frame: &WireFrame) -> Result<(), TransportError>;

    /// Block until one frame arrives.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] once the connection is closed
    /// (locally or by the peer), or another [`TransportError`] on read
    /// failure.
    fn receive(&self) -> Result<WireFrame, TransportError>;

    /// Close the connection. Idempotent; safe from any thread.
    fn close(&self);
}

/// Opens transports to a stream endpoint.
pub trait Connector: Send + Sync {
    /// Connect to `url`, completing TCP, TLS, and websocket handshakes.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ConnectFailed`] if any handshake step
    /// fails.
    fn connect(&self, url: &str) -> Result<Arc<dyn Transport>, TransportError>;
}

// =============================================================================
// Codec Port
// =============================================================================

/// Errors surfaced by a [`StreamCodec`] or control-frame encoder.
#[derive(Debug, Error)]
pub enum CodecError {
    /// JSON encoding/decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// The frame is not a recognizable envelope.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// An outbound frame could not be encoded.
    #[error("encode error: {0}")]
    Encode(String),
}

/// A control or meta message consumed by the engine, never dispatched to
/// handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// The endpoint's unsolicited connection greeting.
    Connected,
    /// Authentication acknowledged.
    Authenticated,
    /// Authentication explicitly rejected.
    AuthRejected {
        /// Server error code, when the stream provides one.
        code: Option<i32>,
        /// Human-readable rejection reason.
        message: String,
    },
    /// Subscription acknowledgement.
    Subscription,
    /// Listen acknowledgement (trade-updates stream).
    Listening,
    /// Server-reported error outside the auth phase.
    ServerError {
        /// Server error code.
        code: i32,
        /// Error message.
        message: String,
    },
}

/// One decoded element of an inbound frame.
#[derive(Debug)]
pub enum InboundMessage {
    /// Control/meta message, consumed by the engine.
    Control(ControlMessage),
    /// Data event, dispatched to the matching handler.
    Event(StreamEvent),
}

/// Decodes inbound wire frames.
pub trait StreamCodec: Send + Sync {
    /// Decode one frame into zero or more messages.
    ///
    /// A malformed element inside an otherwise valid frame is skipped,
    /// not fatal; only an unparseable envelope is an error.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] when the frame is not a recognizable
    /// envelope.
    fn decode(&self, frame: &WireFrame) -> Result<Vec<InboundMessage>, CodecError>;
}

// =============================================================================
// Protocol Port
// =============================================================================

/// The per-variant value object the engine is parameterized with.
///
/// One engine plus one implementation of this trait per stream family
/// (equities, crypto, options, news, trade updates) replaces a class
/// hierarchy of near-identical clients.
pub trait Protocol: Send + Sync {
    /// Variant name for logs.
    fn name(&self) -> &'static str;

    /// Default websocket endpoint URL.
    fn endpoint(&self) -> &str;

    /// Whether the endpoint sends an unsolicited "connected" greeting
    /// that must be validated before authenticating.
    fn expects_greeting(&self) -> bool;

    /// Whether `kind` can be subscribed on this variant.
    fn supports(&self, kind: ChannelKind) -> bool;

    /// Codec for inbound frames.
    fn codec(&self) -> &dyn StreamCodec;

    /// Build the authentication frame.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] if serialization fails.
    fn auth_frame(&self, key: &str, secret: &str) -> Result<WireFrame, CodecError>;

    /// Build a subscribe frame from a full registry snapshot.
    ///
    /// Returns `Ok(None)` when there is nothing to subscribe (an empty
    /// snapshot, or a variant that keeps its channel set on the listen
    /// frame instead).
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] if serialization fails.
    fn subscribe_frame(
        &self,
        snapshot: &[(ChannelKind, Vec<Symbol>)],
    ) -> Result<Option<WireFrame>, CodecError>;

    /// Build an unsubscribe frame listing exactly `symbols` under `kind`.
    ///
    /// Returns `Ok(None)` for variants without unsubscribe support (the
    /// trade-updates stream).
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] if serialization fails.
    fn unsubscribe_frame(
        &self,
        kind: ChannelKind,
        symbols: &[Symbol],
    ) -> Result<Option<WireFrame>, CodecError>;
}
