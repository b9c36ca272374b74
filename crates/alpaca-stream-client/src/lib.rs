#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::default_trait_access
    )
)]

//! Alpaca Stream Client - Streaming Session Engine
//!
//! A callback-driven websocket client for Alpaca's push-based streams:
//! equities, crypto, options, news, and account trade updates. One
//! [`Session`] owns one long-lived logical connection. It performs the
//! connect → authenticate → subscribe handshake, demultiplexes the tagged
//! message stream to per-symbol, per-channel handlers, and transparently
//! reconnects on any failure until [`Session::stop`] is called.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Channel kinds, event payloads, subscription registry
//!   - `channel`: Stream channel taxonomy and wire tags
//!   - `streaming`: Typed event records (trades, quotes, bars, ...)
//!   - `subscription`: (channel, symbol) → handler registry with wildcard
//!     fallback
//!
//! - **Application**: Session engine and port definitions
//!   - `ports`: Interfaces for transport, codec, and protocol variant
//!   - `session`: Handshake state machine, reconnect supervisor, public API
//!
//! - **Infrastructure**: Adapters and wire protocol
//!   - `alpaca`: Wire messages, JSON/MessagePack codecs, protocol variants
//!   - `config`: Credentials, feeds, trading environment
//!   - `websocket`: Blocking TLS websocket transport
//!
//! # Example
//!
//! ```no_run
//! use alpaca_stream_client::{
//!     ChannelKind, Credentials, ProtocolVariant, Session, StreamPayload,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let credentials = Credentials::new("key", "secret")?;
//! let session = Session::new(ProtocolVariant::equities(Default::default()), credentials);
//!
//! session.subscribe(ChannelKind::Trades, &["AAPL".into()], |event| {
//!     if let StreamPayload::Trade(trade) = event.payload {
//!         println!("{} traded at {}", event.symbol, trade.price);
//!     }
//! })?;
//!
//! session.run();
//! // ... later:
//! session.stop();
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Channel taxonomy, event types, subscription registry.
pub mod domain;

/// Application layer - Session engine and port definitions.
pub mod application;

/// Infrastructure layer - Wire protocol, codecs, websocket transport.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::channel::ChannelKind;
pub use domain::streaming::{
    BarMessage, LuldMessage, NewsMessage, OrderSide, OrderUpdate, OrderbookLevel,
    OrderbookMessage, QuoteMessage, StatusMessage, StreamEvent, StreamPayload, TradeMessage,
    TradeUpdateEvent, TradeUpdateMessage,
};
pub use domain::subscription::{Handler, SubscriptionRegistry, Symbol, WILDCARD};

// Ports (for custom transports and test doubles)
pub use application::ports::{
    CodecError, Connector, ControlMessage, InboundMessage, Protocol, StreamCodec, Transport,
    TransportError, WireFrame,
};

// Session API
pub use application::session::reconnect::{ReconnectConfig, ReconnectPolicy};
pub use application::session::{LifecycleState, Session, SessionConfig, SessionError};

// Infrastructure config
pub use infrastructure::config::{ConfigError, Credentials, Environment, Feed, OptionsFeed};

// Protocol variants and transport
pub use infrastructure::alpaca::variant::ProtocolVariant;
pub use infrastructure::websocket::{HeartbeatConfig, WebSocketConnector};
