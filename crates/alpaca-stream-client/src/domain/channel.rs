//! Stream Channel Taxonomy
//!
//! Every inbound message on an Alpaca stream carries a single-letter `T`
//! tag (or a `stream` name on the trade-updates socket) identifying its
//! channel. Subscribe frames address the same channels by a per-kind JSON
//! field name. This module maps between the three representations.

// =============================================================================
// Channel Kind
// =============================================================================

/// A class of inbound stream message that can be subscribed independently.
///
/// Each protocol variant supports a fixed subset of kinds; registering a
/// handler for an unsupported kind is rejected at call time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    /// Executed trades.
    Trades,
    /// Top-of-book quotes (NBBO for equities).
    Quotes,
    /// Minute bars (OHLCV).
    Bars,
    /// Corrections to previously emitted minute bars.
    UpdatedBars,
    /// Daily bars.
    DailyBars,
    /// Orderbook snapshots and deltas (crypto only).
    Orderbooks,
    /// Trading status changes (halts, resumptions).
    Statuses,
    /// Limit Up / Limit Down band updates.
    Lulds,
    /// News articles.
    News,
    /// Order lifecycle events from the trading stream.
    TradeUpdates,
}

impl ChannelKind {
    /// All channel kinds, in subscribe-frame field order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Trades,
            Self::Quotes,
            Self::Bars,
            Self::UpdatedBars,
            Self::DailyBars,
            Self::Orderbooks,
            Self::Statuses,
            Self::Lulds,
            Self::News,
            Self::TradeUpdates,
        ]
    }

    /// JSON field name used for this kind in subscribe/unsubscribe frames.
    #[must_use]
    pub const fn field_name(self) -> &'static str {
        match self {
            Self::Trades => "trades",
            Self::Quotes => "quotes",
            Self::Bars => "bars",
            Self::UpdatedBars => "updatedBars",
            Self::DailyBars => "dailyBars",
            Self::Orderbooks => "orderbooks",
            Self::Statuses => "statuses",
            Self::Lulds => "lulds",
            Self::News => "news",
            // Trade updates are addressed via a listen frame, not a
            // subscribe frame; the name only shows up in logs.
            Self::TradeUpdates => "trade_updates",
        }
    }

    /// Map an inbound message tag to its channel kind.
    ///
    /// Returns `None` for control tags (`success`, `error`, `subscription`)
    /// and for tags this client does not recognize.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "t" => Some(Self::Trades),
            "q" => Some(Self::Quotes),
            "b" => Some(Self::Bars),
            "u" => Some(Self::UpdatedBars),
            "d" => Some(Self::DailyBars),
            "o" => Some(Self::Orderbooks),
            "s" => Some(Self::Statuses),
            "l" => Some(Self::Lulds),
            "n" => Some(Self::News),
            "trade_updates" => Some(Self::TradeUpdates),
            _ => None,
        }
    }
}
