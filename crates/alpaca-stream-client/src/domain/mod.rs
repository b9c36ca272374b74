//! Domain Layer - Core streaming types and subscription logic.
//!
//! This layer contains the channel taxonomy, the typed event records
//! produced by the codecs, and the handler registry. All types here are
//! pure Rust with serialization support and no transport dependencies.

/// Stream channel taxonomy and wire tags.
pub mod channel;

/// Typed event records (quotes, trades, bars, orderbooks, news, ...).
pub mod streaming;

/// Handler registry keyed by (channel, symbol) with wildcard fallback.
pub mod subscription;
