//! Infrastructure Layer - Adapters and wire protocol.
//!
//! This layer contains the concrete implementations of the port
//! interfaces defined in the application layer.

/// Alpaca wire messages, codecs, control-frame encoding, and protocol
/// variants.
pub mod alpaca;

/// Credentials, market data feeds, and trading environment.
pub mod config;

/// Blocking TLS websocket transport.
pub mod websocket;
