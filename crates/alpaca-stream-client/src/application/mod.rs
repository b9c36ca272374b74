//! Application Layer - Session engine and port definitions.
//!
//! This layer contains the session state machine, its reconnect
//! supervisor, and the port interfaces that define how the engine talks
//! to transports and wire codecs.

/// Port interfaces for transport, codec, and protocol variant.
pub mod ports;

/// Session engine: public API, state machine, reconnect supervisor.
pub mod session;
