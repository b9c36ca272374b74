//! Typed Stream Event Records
//!
//! Canonical records for every data channel the client can subscribe to,
//! plus the [`StreamEvent`] envelope handed to handlers. Field names map
//! Alpaca's terse wire schema (single-letter keys, RFC-3339 timestamps)
//! onto readable Rust names; one record covers a channel across all
//! protocol variants, with `Option` fields for per-variant extras.
//!
//! # Wire Format (JSON)
//!
//! ```json
//! [{"T":"t","S":"AAPL","p":190.5,"s":10,"t":"2024-01-15T10:00:01Z"}]
//! ```
//!
//! The options stream carries the same shapes MessagePack-encoded; the
//! codec normalizes both into these records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::channel::ChannelKind;
use crate::domain::subscription::Symbol;

// =============================================================================
// Stream Event Envelope
// =============================================================================

/// One decoded event, addressed to a (channel, symbol) handler.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    /// Channel this event arrived on.
    pub kind: ChannelKind,
    /// Symbol the event applies to (`*` when the message carries none).
    pub symbol: Symbol,
    /// Decoded payload, or the raw JSON value in raw-passthrough mode.
    pub payload: StreamPayload,
}

/// Payload of a [`StreamEvent`].
#[derive(Debug, Clone, PartialEq)]
pub enum StreamPayload {
    /// Executed trade.
    Trade(TradeMessage),
    /// Top-of-book quote.
    Quote(QuoteMessage),
    /// OHLCV bar (minute, updated, or daily depending on the channel).
    Bar(BarMessage),
    /// Orderbook snapshot or delta.
    Orderbook(OrderbookMessage),
    /// Trading status change.
    Status(StatusMessage),
    /// Limit Up / Limit Down band update.
    Luld(LuldMessage),
    /// News article.
    News(Box<NewsMessage>),
    /// Order lifecycle event (boxed due to size).
    TradeUpdate(Box<TradeUpdateMessage>),
    /// Un-interpreted payload, produced in raw-passthrough mode.
    Raw(serde_json::Value),
}

// =============================================================================
// Market Data Records
// =============================================================================

/// Executed trade.
///
/// # Wire Format (JSON)
/// ```json
/// {"T":"t","i":96921,"S":"AAPL","x":"D","p":126.55,"s":1,
///  "t":"2021-02-22T15:51:44.208Z","c":["@","I"],"z":"C"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeMessage {
    /// Ticker symbol.
    #[serde(rename = "S")]
    pub symbol: String,

    /// Trade ID, unique per exchange per day (equities only).
    #[serde(rename = "i", default)]
    pub trade_id: Option<i64>,

    /// Exchange code where the trade executed.
    #[serde(rename = "x", default)]
    pub exchange: Option<String>,

    /// Trade price.
    #[serde(rename = "p")]
    pub price: Decimal,

    /// Trade size; fractional for crypto.
    #[serde(rename = "s")]
    pub size: Decimal,

    /// Trade timestamp.
    #[serde(rename = "t")]
    pub timestamp: DateTime<Utc>,

    /// Condition codes; a single string on the options stream.
    #[serde(rename = "c", default, deserialize_with = "string_or_seq")]
    pub conditions: Vec<String>,

    /// Tape: "A" (NYSE), "B" (regional), "C" (NASDAQ). Equities only.
    #[serde(rename = "z", default)]
    pub tape: Option<String>,

    /// Taker side: "B", "S", or "-" (crypto only).
    #[serde(rename = "tks", default)]
    pub taker_side: Option<String>,
}

/// Top-of-book quote (NBBO for equities).
///
/// # Wire Format (JSON)
/// ```json
/// {"T":"q","S":"AMD","bx":"U","bp":87.66,"bs":1,"ax":"Q","ap":87.68,
///  "as":4,"t":"2021-02-22T15:51:45.335689322Z","c":["R"],"z":"C"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteMessage {
    /// Ticker symbol.
    #[serde(rename = "S")]
    pub symbol: String,

    /// Bid exchange code.
    #[serde(rename = "bx", default)]
    pub bid_exchange: Option<String>,

    /// Bid price.
    #[serde(rename = "bp")]
    pub bid_price: Decimal,

    /// Bid size.
    #[serde(rename = "bs")]
    pub bid_size: Decimal,

    /// Ask exchange code.
    #[serde(rename = "ax", default)]
    pub ask_exchange: Option<String>,

    /// Ask price.
    #[serde(rename = "ap")]
    pub ask_price: Decimal,

    /// Ask size.
    #[serde(rename = "as")]
    pub ask_size: Decimal,

    /// Quote timestamp.
    #[serde(rename = "t")]
    pub timestamp: DateTime<Utc>,

    /// Condition codes; a single string on the options stream.
    #[serde(rename = "c", default, deserialize_with = "string_or_seq")]
    pub conditions: Vec<String>,

    /// Tape (equities only).
    #[serde(rename = "z", default)]
    pub tape: Option<String>,
}

/// OHLCV bar. The channel (`Bars`, `UpdatedBars`, `DailyBars`) tells the
/// aggregation period apart; the record shape is identical.
///
/// # Wire Format (JSON)
/// ```json
/// {"T":"b","S":"SPY","o":388.985,"h":389.13,"l":388.975,"c":389.12,
///  "v":49378,"n":461,"vw":389.062639,"t":"2021-02-22T19:15:00Z"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarMessage {
    /// Ticker symbol.
    #[serde(rename = "S")]
    pub symbol: String,

    /// Open price.
    #[serde(rename = "o")]
    pub open: Decimal,

    /// High price.
    #[serde(rename = "h")]
    pub high: Decimal,

    /// Low price.
    #[serde(rename = "l")]
    pub low: Decimal,

    /// Close price.
    #[serde(rename = "c")]
    pub close: Decimal,

    /// Volume; fractional for crypto.
    #[serde(rename = "v")]
    pub volume: Decimal,

    /// Number of trades in the bar.
    #[serde(rename = "n", default)]
    pub trade_count: Option<i64>,

    /// Volume-weighted average price.
    #[serde(rename = "vw", default)]
    pub vwap: Option<Decimal>,

    /// Bar timestamp (start of the bar period).
    #[serde(rename = "t")]
    pub timestamp: DateTime<Utc>,
}

/// One price level of an orderbook message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderbookLevel {
    /// Price of the level.
    #[serde(rename = "p")]
    pub price: Decimal,

    /// Size at the level; zero removes the level.
    #[serde(rename = "s")]
    pub size: Decimal,
}

/// Orderbook snapshot or delta (crypto stream).
///
/// # Wire Format (JSON)
/// ```json
/// {"T":"o","S":"BTC/USD","t":"2022-05-10T15:00:00Z",
///  "b":[{"p":30000.1,"s":1.5}],"a":[{"p":30001.0,"s":0.4}],"r":true}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderbookMessage {
    /// Trading pair symbol.
    #[serde(rename = "S")]
    pub symbol: String,

    /// Message timestamp.
    #[serde(rename = "t")]
    pub timestamp: DateTime<Utc>,

    /// Bid levels.
    #[serde(rename = "b", default)]
    pub bids: Vec<OrderbookLevel>,

    /// Ask levels.
    #[serde(rename = "a", default)]
    pub asks: Vec<OrderbookLevel>,

    /// True when this message is a full snapshot replacing prior state.
    #[serde(rename = "r", default)]
    pub reset: bool,
}

/// Trading status change (halts, resumptions).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusMessage {
    /// Ticker symbol.
    #[serde(rename = "S")]
    pub symbol: String,

    /// Status code, e.g. "T" (trading) or "H" (halted).
    #[serde(rename = "sc", default)]
    pub status_code: Option<String>,

    /// Status message text.
    #[serde(rename = "sm", default)]
    pub status_message: Option<String>,

    /// Reason code for the status change.
    #[serde(rename = "rc", default)]
    pub reason_code: Option<String>,

    /// Reason message explaining the change.
    #[serde(rename = "rm", default)]
    pub reason_message: Option<String>,

    /// Status timestamp.
    #[serde(rename = "t", default)]
    pub timestamp: Option<DateTime<Utc>>,

    /// Tape.
    #[serde(rename = "z", default)]
    pub tape: Option<String>,
}

/// Limit Up / Limit Down price band update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LuldMessage {
    /// Ticker symbol.
    #[serde(rename = "S")]
    pub symbol: String,

    /// Upper price band.
    #[serde(rename = "u")]
    pub limit_up: Decimal,

    /// Lower price band.
    #[serde(rename = "d")]
    pub limit_down: Decimal,

    /// Band indicator code.
    #[serde(rename = "i", default)]
    pub indicator: Option<String>,

    /// Band timestamp.
    #[serde(rename = "t")]
    pub timestamp: DateTime<Utc>,

    /// Tape.
    #[serde(rename = "z", default)]
    pub tape: Option<String>,
}

/// News article from the news stream.
///
/// News messages reference a list of symbols; the codec addresses the
/// event to the first listed symbol (or the wildcard when the list is
/// empty) and the registry's exact-before-wildcard rule does the rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsMessage {
    /// Article ID.
    pub id: i64,

    /// Headline.
    pub headline: String,

    /// Author name.
    #[serde(default)]
    pub author: Option<String>,

    /// Article summary.
    #[serde(default)]
    pub summary: Option<String>,

    /// Full article content (HTML).
    #[serde(default)]
    pub content: Option<String>,

    /// Symbols the article references.
    #[serde(default)]
    pub symbols: Vec<String>,

    /// Source outlet.
    #[serde(default)]
    pub source: Option<String>,

    /// Canonical article URL.
    #[serde(default)]
    pub url: Option<String>,

    /// Creation timestamp.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    /// Last-update timestamp.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Trade Update Records (trading stream)
// =============================================================================

/// Order event types on the trade-updates stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeUpdateEvent {
    /// Order received.
    New,
    /// Order completely filled.
    Fill,
    /// Order partially filled.
    PartialFill,
    /// Order canceled.
    Canceled,
    /// Order expired.
    Expired,
    /// Order done for the day.
    DoneForDay,
    /// Order replaced by another order.
    Replaced,
    /// Order rejected.
    Rejected,
    /// Order pending submission.
    PendingNew,
    /// Order stopped.
    Stopped,
    /// Cancel request pending.
    PendingCancel,
    /// Replace request pending.
    PendingReplace,
    /// Order calculated.
    Calculated,
    /// Order suspended.
    Suspended,
    /// Replace request rejected.
    OrderReplaceRejected,
    /// Cancel request rejected.
    OrderCancelRejected,
}

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    /// Buy order.
    Buy,
    /// Sell order.
    Sell,
}

/// Order snapshot embedded in a trade update.
///
/// Quantities and prices arrive as strings on this stream and are kept
/// verbatim; parse on use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderUpdate {
    /// Order ID.
    pub id: String,

    /// Client-provided order ID.
    pub client_order_id: String,

    /// Ticker symbol.
    pub symbol: String,

    /// Order side.
    pub side: OrderSide,

    /// Order type (`market`, `limit`, ...).
    #[serde(rename = "type")]
    pub order_type: String,

    /// Current order status.
    pub status: String,

    /// Order quantity; absent for notional orders.
    #[serde(default)]
    pub qty: Option<String>,

    /// Filled quantity.
    pub filled_qty: String,

    /// Average fill price.
    #[serde(default)]
    pub filled_avg_price: Option<String>,

    /// Limit price.
    #[serde(default)]
    pub limit_price: Option<String>,

    /// Stop price.
    #[serde(default)]
    pub stop_price: Option<String>,

    /// Creation timestamp.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    /// Last-update timestamp.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,

    /// Fill timestamp.
    #[serde(default)]
    pub filled_at: Option<DateTime<Utc>>,
}

/// Order lifecycle event from the trade-updates stream.
///
/// # Wire Format (JSON)
/// ```json
/// {"stream":"trade_updates","data":{"event":"fill","order":{...},
///  "timestamp":"2021-09-17T22:19:33Z","price":"150.50","qty":"10"}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeUpdateMessage {
    /// Event type (fill, canceled, ...).
    pub event: TradeUpdateEvent,

    /// Order snapshot after the event.
    pub order: OrderUpdate,

    /// Event timestamp.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,

    /// Position quantity after the fill.
    #[serde(default)]
    pub position_qty: Option<String>,

    /// Fill price (fill events).
    #[serde(default)]
    pub price: Option<String>,

    /// Fill quantity (fill events).
    #[serde(default)]
    pub qty: Option<String>,

    /// Execution ID (fill events).
    #[serde(default)]
    pub execution_id: Option<String>,
}

// =============================================================================
// Serde Helpers
// =============================================================================

/// Accepts `"A"`, `["A","B"]`, or `null` for condition codes; the options
/// stream sends a bare string where equities send an array.
fn string_or_seq<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrSeq {
        One(String),
        Many(Vec<String>),
    }

    match Option::<StringOrSeq>::deserialize(deserializer)? {
        None => Ok(Vec::new()),
        Some(StringOrSeq::One(s)) => Ok(vec![s]),
        Some(StringOrSeq::Many(v)) => Ok(v),
    }
}
