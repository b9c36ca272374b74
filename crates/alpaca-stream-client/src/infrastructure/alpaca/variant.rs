//! Protocol Variants
//!
//! One value object per Alpaca stream family. A [`ProtocolVariant`]
//! bundles the endpoint URL, handshake expectations, supported channels,
//! control-frame encoder, and inbound codec; the session engine is
//! parameterized with one of these instead of subclassing a client per
//! family.
//!
//! | Variant       | Endpoint                                             | Encoding    |
//! |---------------|------------------------------------------------------|-------------|
//! | equities      | `wss://stream.data.alpaca.markets/v2/{feed}`         | JSON        |
//! | crypto        | `wss://stream.data.alpaca.markets/v1beta3/crypto/us` | JSON        |
//! | options       | `wss://stream.data.alpaca.markets/v1beta1/{feed}`    | MessagePack |
//! | news          | `wss://stream.data.alpaca.markets/v1beta1/news`      | JSON        |
//! | trade updates | `wss://{api,paper-api}.alpaca.markets/stream`        | JSON        |

use std::sync::Arc;

use crate::application::ports::{CodecError, Protocol, StreamCodec, WireFrame};
use crate::domain::channel::ChannelKind;
use crate::domain::subscription::Symbol;
use crate::infrastructure::config::{Environment, Feed, OptionsFeed};

use super::codec::{JsonCodec, MsgPackCodec};
use super::control::{AuthStyle, ControlEncoder, ControlEncoding};

// =============================================================================
// Subscribe Style
// =============================================================================

/// How a variant expresses its channel set to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubscribeStyle {
    /// Per-kind symbol arrays in subscribe/unsubscribe frames.
    Channels,
    /// A single listen frame; no per-symbol addressing, no unsubscribe.
    Listen,
}

// =============================================================================
// Protocol Variant
// =============================================================================

/// One stream family's protocol description.
pub struct ProtocolVariant {
    name: &'static str,
    endpoint: String,
    expects_greeting: bool,
    supported: &'static [ChannelKind],
    subscribe_style: SubscribeStyle,
    encoding: ControlEncoding,
    encoder: ControlEncoder,
    codec: Arc<dyn StreamCodec>,
}

impl std::fmt::Debug for ProtocolVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolVariant")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .field("expects_greeting", &self.expects_greeting)
            .field("supported", &self.supported)
            .finish_non_exhaustive()
    }
}

impl ProtocolVariant {
    /// Equity market data stream for `feed`.
    #[must_use]
    pub fn equities(feed: Feed) -> Self {
        Self {
            name: "equities",
            endpoint: format!("wss://stream.data.alpaca.markets/v2/{}", feed.as_str()),
            expects_greeting: true,
            supported: &[
                ChannelKind::Trades,
                ChannelKind::Quotes,
                ChannelKind::Bars,
                ChannelKind::UpdatedBars,
                ChannelKind::DailyBars,
                ChannelKind::Statuses,
                ChannelKind::Lulds,
            ],
            subscribe_style: SubscribeStyle::Channels,
            encoding: ControlEncoding::Json,
            encoder: ControlEncoder::new(ControlEncoding::Json, AuthStyle::KeySecret),
            codec: Arc::new(JsonCodec::new()),
        }
    }

    /// Crypto market data stream (US locale).
    #[must_use]
    pub fn crypto() -> Self {
        Self {
            name: "crypto",
            endpoint: "wss://stream.data.alpaca.markets/v1beta3/crypto/us".to_string(),
            expects_greeting: true,
            supported: &[
                ChannelKind::Trades,
                ChannelKind::Quotes,
                ChannelKind::Bars,
                ChannelKind::UpdatedBars,
                ChannelKind::DailyBars,
                ChannelKind::Orderbooks,
            ],
            subscribe_style: SubscribeStyle::Channels,
            encoding: ControlEncoding::Json,
            encoder: ControlEncoder::new(ControlEncoding::Json, AuthStyle::KeySecret),
            codec: Arc::new(JsonCodec::new()),
        }
    }

    /// Options market data stream for `feed` (MessagePack encoded).
    #[must_use]
    pub fn options(feed: OptionsFeed) -> Self {
        Self {
            name: "options",
            endpoint: format!("wss://stream.data.alpaca.markets/v1beta1/{}", feed.as_str()),
            expects_greeting: true,
            supported: &[ChannelKind::Trades, ChannelKind::Quotes],
            subscribe_style: SubscribeStyle::Channels,
            encoding: ControlEncoding::MsgPack,
            encoder: ControlEncoder::new(ControlEncoding::MsgPack, AuthStyle::KeySecret),
            codec: Arc::new(MsgPackCodec::new()),
        }
    }

    /// News stream.
    #[must_use]
    pub fn news() -> Self {
        Self {
            name: "news",
            endpoint: "wss://stream.data.alpaca.markets/v1beta1/news".to_string(),
            expects_greeting: true,
            supported: &[ChannelKind::News],
            subscribe_style: SubscribeStyle::Channels,
            encoding: ControlEncoding::Json,
            encoder: ControlEncoder::new(ControlEncoding::Json, AuthStyle::KeySecret),
            codec: Arc::new(JsonCodec::new()),
        }
    }

    /// Order-update stream for the given trading environment.
    ///
    /// This socket sends no connection greeting, authenticates with the
    /// envelope frame, and carries exactly one channel selected by a
    /// listen frame.
    #[must_use]
    pub fn trade_updates(environment: Environment) -> Self {
        let host = match environment {
            Environment::Paper => "paper-api.alpaca.markets",
            Environment::Live => "api.alpaca.markets",
        };
        Self {
            name: "trade_updates",
            endpoint: format!("wss://{host}/stream"),
            expects_greeting: false,
            supported: &[ChannelKind::TradeUpdates],
            subscribe_style: SubscribeStyle::Listen,
            encoding: ControlEncoding::Json,
            encoder: ControlEncoder::new(ControlEncoding::Json, AuthStyle::Envelope),
            codec: Arc::new(JsonCodec::new()),
        }
    }

    /// Switch the variant to raw passthrough: data payloads reach
    /// handlers as [`crate::StreamPayload::Raw`] instead of typed
    /// records.
    #[must_use]
    pub fn raw_payloads(mut self) -> Self {
        self.codec = match self.encoding {
            ControlEncoding::Json => Arc::new(JsonCodec::raw()),
            ControlEncoding::MsgPack => Arc::new(MsgPackCodec::raw()),
        };
        self
    }
}

impl Protocol for ProtocolVariant {
    fn name(&self) -> &'static str {
        self.name
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn expects_greeting(&self) -> bool {
        self.expects_greeting
    }

    fn supports(&self, kind: ChannelKind) -> bool {
        self.supported.contains(&kind)
    }

    fn codec(&self) -> &dyn StreamCodec {
        self.codec.as_ref()
    }

    fn auth_frame(&self, key: &str, secret: &str) -> Result<WireFrame, CodecError> {
        self.encoder.auth_frame(key, secret)
    }

    fn subscribe_frame(
        &self,
        snapshot: &[(ChannelKind, Vec<Symbol>)],
    ) -> Result<Option<WireFrame>, CodecError> {
        match self.subscribe_style {
            SubscribeStyle::Channels => self.encoder.subscribe_frame(snapshot),
            SubscribeStyle::Listen => {
                let wants_updates = snapshot
                    .iter()
                    .any(|(kind, _)| *kind == ChannelKind::TradeUpdates);
                if wants_updates {
                    self.encoder.listen_frame().map(Some)
                } else {
                    Ok(None)
                }
            }
        }
    }

    fn unsubscribe_frame(
        &self,
        kind: ChannelKind,
        symbols: &[Symbol],
    ) -> Result<Option<WireFrame>, CodecError> {
        match self.subscribe_style {
            SubscribeStyle::Channels => self.encoder.unsubscribe_frame(kind, symbols),
            SubscribeStyle::Listen => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(
        ProtocolVariant::equities(Feed::Iex),
        "wss://stream.data.alpaca.markets/v2/iex";
        "equities iex"
    )]
    #[test_case(
        ProtocolVariant::equities(Feed::Sip),
        "wss://stream.data.alpaca.markets/v2/sip";
        "equities sip"
    )]
    #[test_case(
        ProtocolVariant::crypto(),
        "wss://stream.data.alpaca.markets/v1beta3/crypto/us";
        "crypto"
    )]
    #[test_case(
        ProtocolVariant::options(OptionsFeed::Opra),
        "wss://stream.data.alpaca.markets/v1beta1/opra";
        "options opra"
    )]
    #[test_case(
        ProtocolVariant::options(OptionsFeed::Indicative),
        "wss://stream.data.alpaca.markets/v1beta1/indicative";
        "options indicative"
    )]
    #[test_case(
        ProtocolVariant::news(),
        "wss://stream.data.alpaca.markets/v1beta1/news";
        "news"
    )]
    #[test_case(
        ProtocolVariant::trade_updates(Environment::Paper),
        "wss://paper-api.alpaca.markets/stream";
        "trade updates paper"
    )]
    #[test_case(
        ProtocolVariant::trade_updates(Environment::Live),
        "wss://api.alpaca.markets/stream";
        "trade updates live"
    )]
    fn endpoint_urls(variant: ProtocolVariant, expected: &str) {
        assert_eq!(variant.endpoint(), expected);
    }

    #[test]
    fn equities_channel_support() {
        let variant = ProtocolVariant::equities(Feed::Iex);
        assert!(variant.supports(ChannelKind::Trades));
        assert!(variant.supports(ChannelKind::Lulds));
        assert!(!variant.supports(ChannelKind::Orderbooks));
        assert!(!variant.supports(ChannelKind::News));
        assert!(!variant.supports(ChannelKind::TradeUpdates));
    }

    #[test]
    fn crypto_supports_orderbooks_not_statuses() {
        let variant = ProtocolVariant::crypto();
        assert!(variant.supports(ChannelKind::Orderbooks));
        assert!(!variant.supports(ChannelKind::Statuses));
    }

    #[test]
    fn options_supports_trades_and_quotes_only() {
        let variant = ProtocolVariant::options(OptionsFeed::Indicative);
        assert!(variant.supports(ChannelKind::Trades));
        assert!(variant.supports(ChannelKind::Quotes));
        assert!(!variant.supports(ChannelKind::Bars));
    }

    #[test]
    fn trade_updates_skips_greeting() {
        let variant = ProtocolVariant::trade_updates(Environment::Paper);
        assert!(!variant.expects_greeting());
        assert!(ProtocolVariant::equities(Feed::Iex).expects_greeting());
    }

    #[test]
    fn trade_updates_subscribes_via_listen_frame() {
        let variant = ProtocolVariant::trade_updates(Environment::Paper);
        let snapshot = vec![(ChannelKind::TradeUpdates, vec!["*".to_string()])];
        let frame = variant.subscribe_frame(&snapshot).unwrap().unwrap();
        match frame {
            WireFrame::Text(text) => assert!(text.contains(r#""action":"listen""#)),
            WireFrame::Binary(_) => panic!("expected text frame"),
        }
    }

    #[test]
    fn trade_updates_has_no_unsubscribe() {
        let variant = ProtocolVariant::trade_updates(Environment::Paper);
        let frame = variant
            .unsubscribe_frame(ChannelKind::TradeUpdates, &["*".to_string()])
            .unwrap();
        assert!(frame.is_none());
    }

    #[test]
    fn options_control_frames_are_msgpack() {
        let variant = ProtocolVariant::options(OptionsFeed::Opra);
        let frame = variant.auth_frame("k", "s").unwrap();
        assert!(matches!(frame, WireFrame::Binary(_)));
    }

    #[test]
    fn raw_payloads_swaps_codec() {
        let variant = ProtocolVariant::equities(Feed::Iex).raw_payloads();
        let messages = variant
            .codec()
            .decode(&WireFrame::Text(
                r#"[{"T":"t","S":"AAPL","p":"garbage"}]"#.to_string(),
            ))
            .unwrap();
        assert_eq!(messages.len(), 1);
    }
}
