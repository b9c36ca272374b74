//! Control and Outbound Wire Messages
//!
//! Handshake acknowledgements read from the stream and the request frames
//! the client sends. Data records live in [`crate::domain::streaming`];
//! this module is only the protocol plumbing around them.
//!
//! # Handshake Acknowledgements
//!
//! Market data streams:
//! ```json
//! {"T":"success","msg":"connected"}
//! {"T":"success","msg":"authenticated"}
//! {"T":"error","code":402,"msg":"auth failed"}
//! ```
//!
//! Trade-updates stream:
//! ```json
//! {"stream":"authorization","data":{"status":"authorized","action":"authenticate"}}
//! {"stream":"listening","data":{"streams":["trade_updates"]}}
//! ```

use serde::{Deserialize, Serialize};

use crate::domain::channel::ChannelKind;
use crate::domain::subscription::Symbol;

// =============================================================================
// Inbound Control Messages
// =============================================================================

/// Success acknowledgement on market data streams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessMessage {
    /// Acknowledged step: "connected" or "authenticated".
    pub msg: SuccessKind,
}

/// Kind of success acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuccessKind {
    /// Initial connection established.
    Connected,
    /// Authentication successful.
    Authenticated,
}

/// Error frame with code and description.
///
/// # Error Codes
/// - 400: Invalid syntax
/// - 401: Not authenticated
/// - 402: Auth failed
/// - 403: Already authenticated
/// - 404: Auth timeout
/// - 405: Symbol limit exceeded
/// - 406: Connection limit exceeded
/// - 407: Slow client
/// - 408: Insufficient subscription
/// - 500: Internal error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    /// Error code.
    pub code: i32,

    /// Error message.
    pub msg: String,
}

impl ErrorMessage {
    /// Check if this error belongs to the authentication phase.
    #[must_use]
    pub const fn is_auth_error(&self) -> bool {
        matches!(self.code, 401..=404)
    }
}

/// Authorization response on the trade-updates stream.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthorizationMessage {
    /// Authorization data.
    pub data: AuthorizationData,
}

/// Authorization response payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthorizationData {
    /// Status: "authorized" or "unauthorized".
    pub status: String,
}

impl AuthorizationMessage {
    /// Check if authorization succeeded.
    #[must_use]
    pub fn is_authorized(&self) -> bool {
        self.data.status == "authorized"
    }
}

// =============================================================================
// Outbound Messages (Client -> Server)
// =============================================================================

/// Authentication request for market data streams.
///
/// `{"action":"auth","key":"...","secret":"..."}`
#[derive(Debug, Clone, Serialize)]
pub struct AuthRequest {
    /// Action: "auth".
    pub action: &'static str,

    /// API key.
    pub key: String,

    /// API secret.
    pub secret: String,
}

impl AuthRequest {
    /// Create a new authentication request.
    #[must_use]
    pub const fn new(key: String, secret: String) -> Self {
        Self {
            action: "auth",
            key,
            secret,
        }
    }
}

/// Authentication request for the trade-updates stream.
///
/// `{"action":"authenticate","data":{"key_id":"...","secret_key":"..."}}`
#[derive(Debug, Clone, Serialize)]
pub struct TradeAuthRequest {
    /// Action: "authenticate".
    pub action: &'static str,

    /// Credential envelope.
    pub data: TradeAuthData,
}

/// Credential envelope for [`TradeAuthRequest`].
#[derive(Debug, Clone, Serialize)]
pub struct TradeAuthData {
    /// API key.
    pub key_id: String,

    /// API secret.
    pub secret_key: String,
}

impl TradeAuthRequest {
    /// Create a new trade-stream authentication request.
    #[must_use]
    pub const fn new(key: String, secret: String) -> Self {
        Self {
            action: "authenticate",
            data: TradeAuthData {
                key_id: key,
                secret_key: secret,
            },
        }
    }
}

/// Subscribe/unsubscribe request for market data streams.
///
/// Channel kinds with no symbols are omitted from the serialized frame
/// entirely.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SubscriptionRequest {
    /// Action: "subscribe" or "unsubscribe".
    pub action: &'static str,

    /// Trade symbols.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trades: Vec<Symbol>,

    /// Quote symbols.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub quotes: Vec<Symbol>,

    /// Minute bar symbols.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bars: Vec<Symbol>,

    /// Updated bar symbols.
    #[serde(skip_serializing_if = "Vec::is_empty", rename = "updatedBars")]
    pub updated_bars: Vec<Symbol>,

    /// Daily bar symbols.
    #[serde(skip_serializing_if = "Vec::is_empty", rename = "dailyBars")]
    pub daily_bars: Vec<Symbol>,

    /// Orderbook symbols.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub orderbooks: Vec<Symbol>,

    /// Trading status symbols.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub statuses: Vec<Symbol>,

    /// LULD symbols.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub lulds: Vec<Symbol>,

    /// News symbols.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub news: Vec<Symbol>,
}

impl SubscriptionRequest {
    /// Create an empty subscribe request.
    #[must_use]
    pub fn subscribe() -> Self {
        Self {
            action: "subscribe",
            ..Default::default()
        }
    }

    /// Create an empty unsubscribe request.
    #[must_use]
    pub fn unsubscribe() -> Self {
        Self {
            action: "unsubscribe",
            ..Default::default()
        }
    }

    /// Set the symbol list for `kind`.
    ///
    /// Trade updates have no subscribe-frame field; setting them here is
    /// a no-op (the listen frame carries that channel).
    #[must_use]
    pub fn with(mut self, kind: ChannelKind, symbols: Vec<Symbol>) -> Self {
        match kind {
            ChannelKind::Trades => self.trades = symbols,
            ChannelKind::Quotes => self.quotes = symbols,
            ChannelKind::Bars => self.bars = symbols,
            ChannelKind::UpdatedBars => self.updated_bars = symbols,
            ChannelKind::DailyBars => self.daily_bars = symbols,
            ChannelKind::Orderbooks => self.orderbooks = symbols,
            ChannelKind::Statuses => self.statuses = symbols,
            ChannelKind::Lulds => self.lulds = symbols,
            ChannelKind::News => self.news = symbols,
            ChannelKind::TradeUpdates => {}
        }
        self
    }

    /// Check whether the request addresses no symbols at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
            && self.quotes.is_empty()
            && self.bars.is_empty()
            && self.updated_bars.is_empty()
            && self.daily_bars.is_empty()
            && self.orderbooks.is_empty()
            && self.statuses.is_empty()
            && self.lulds.is_empty()
            && self.news.is_empty()
    }
}

/// Listen request for the trade-updates stream.
///
/// `{"action":"listen","data":{"streams":["trade_updates"]}}`
#[derive(Debug, Clone, Serialize)]
pub struct ListenRequest {
    /// Action: "listen".
    pub action: &'static str,

    /// Stream list envelope.
    pub data: ListenData,
}

/// Stream list for [`ListenRequest`].
#[derive(Debug, Clone, Serialize)]
pub struct ListenData {
    /// Streams to listen to.
    pub streams: Vec<String>,
}

impl ListenRequest {
    /// Create a listen request for trade updates.
    #[must_use]
    pub fn trade_updates() -> Self {
        Self {
            action: "listen",
            data: ListenData {
                streams: vec!["trade_updates".to_string()],
            },
        }
    }
}
