//! Inbound Frame Decoding
//!
//! Two codecs over one dispatch path: [`JsonCodec`] for the text streams
//! and [`MsgPackCodec`] for the binary options stream. MessagePack frames
//! are normalized into `serde_json::Value` first, so tag dispatch and
//! record parsing are shared.
//!
//! A frame is either a JSON array of elements or a single object. Each
//! element carries a `T` tag (market data streams) or a `stream` name
//! (trade-updates stream). Malformed elements are logged and skipped;
//! only an unparseable envelope fails the whole frame.

use serde_json::Value;
use tracing::{trace, warn};

use crate::application::ports::{CodecError, ControlMessage, InboundMessage, StreamCodec, WireFrame};
use crate::domain::channel::ChannelKind;
use crate::domain::streaming::{StreamEvent, StreamPayload};
use crate::domain::subscription::WILDCARD;

use super::messages::{AuthorizationMessage, ErrorMessage, SuccessKind, SuccessMessage};

// =============================================================================
// JSON Codec
// =============================================================================

/// Codec for the JSON text streams (equities, crypto, news, trade
/// updates).
#[derive(Debug, Clone, Copy)]
pub struct JsonCodec {
    raw: bool,
}

impl JsonCodec {
    /// Create a codec producing typed payloads.
    #[must_use]
    pub const fn new() -> Self {
        Self { raw: false }
    }

    /// Create a codec that passes data payloads through undecoded.
    ///
    /// Control messages are still interpreted; handlers receive
    /// [`StreamPayload::Raw`].
    #[must_use]
    pub const fn raw() -> Self {
        Self { raw: true }
    }
}

impl Default for JsonCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamCodec for JsonCodec {
    fn decode(&self, frame: &WireFrame) -> Result<Vec<InboundMessage>, CodecError> {
        let value: Value = match frame {
            WireFrame::Text(text) => serde_json::from_str(text)?,
            WireFrame::Binary(bytes) => {
                let text = std::str::from_utf8(bytes)
                    .map_err(|err| CodecError::Malformed(format!("invalid UTF-8: {err}")))?;
                serde_json::from_str(text)?
            }
        };
        decode_envelope(&value, self.raw)
    }
}

// =============================================================================
// MessagePack Codec
// =============================================================================

/// Codec for the MessagePack binary options stream.
#[derive(Debug, Clone, Copy)]
pub struct MsgPackCodec {
    raw: bool,
}

impl MsgPackCodec {
    /// Create a codec producing typed payloads.
    #[must_use]
    pub const fn new() -> Self {
        Self { raw: false }
    }

    /// Create a codec that passes data payloads through undecoded.
    #[must_use]
    pub const fn raw() -> Self {
        Self { raw: true }
    }
}

impl Default for MsgPackCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamCodec for MsgPackCodec {
    fn decode(&self, frame: &WireFrame) -> Result<Vec<InboundMessage>, CodecError> {
        let bytes = match frame {
            WireFrame::Binary(bytes) => bytes.as_slice(),
            WireFrame::Text(text) => text.as_bytes(),
        };
        let packed: rmpv::Value = rmp_serde::from_slice(bytes)
            .map_err(|err| CodecError::Malformed(format!("invalid MessagePack: {err}")))?;
        let value: Value = rmpv::ext::from_value(packed)
            .map_err(|err| CodecError::Malformed(format!("non-JSON MessagePack value: {err}")))?;
        decode_envelope(&value, self.raw)
    }
}

// =============================================================================
// Shared Dispatch
// =============================================================================

fn decode_envelope(value: &Value, raw: bool) -> Result<Vec<InboundMessage>, CodecError> {
    let elements: &[Value] = match value {
        Value::Array(items) => items,
        Value::Object(_) => std::slice::from_ref(value),
        other => {
            return Err(CodecError::Malformed(format!(
                "expected object or array, got {other}"
            )));
        }
    };

    let mut messages = Vec::with_capacity(elements.len());
    for element in elements {
        match decode_element(element, raw) {
            Ok(Some(message)) => messages.push(message),
            Ok(None) => {}
            Err(err) => {
                warn!(error = %err, element = %element, "skipping malformed stream element");
            }
        }
    }
    Ok(messages)
}

fn decode_element(element: &Value, raw: bool) -> Result<Option<InboundMessage>, CodecError> {
    if let Some(tag) = element.get("T").and_then(Value::as_str) {
        return decode_tagged(tag, element, raw);
    }
    if let Some(stream) = element.get("stream").and_then(Value::as_str) {
        return decode_stream(stream, element, raw);
    }
    Err(CodecError::Malformed(
        "element carries neither a T tag nor a stream name".to_string(),
    ))
}

/// Decode a `T`-tagged element from the market data streams.
fn decode_tagged(tag: &str, element: &Value, raw: bool) -> Result<Option<InboundMessage>, CodecError> {
    match tag {
        "success" => {
            let msg: SuccessMessage = serde_json::from_value(element.clone())?;
            let control = match msg.msg {
                SuccessKind::Connected => ControlMessage::Connected,
                SuccessKind::Authenticated => ControlMessage::Authenticated,
            };
            Ok(Some(InboundMessage::Control(control)))
        }
        "error" => {
            let msg: ErrorMessage = serde_json::from_value(element.clone())?;
            Ok(Some(InboundMessage::Control(ControlMessage::ServerError {
                code: msg.code,
                message: msg.msg,
            })))
        }
        "subscription" => Ok(Some(InboundMessage::Control(ControlMessage::Subscription))),
        _ => {
            let Some(kind) = ChannelKind::from_tag(tag) else {
                trace!(tag, "ignoring unrecognized stream tag");
                return Ok(None);
            };
            decode_data(kind, element, raw).map(Some)
        }
    }
}

/// Decode a `stream`-named element from the trade-updates socket.
fn decode_stream(stream: &str, element: &Value, raw: bool) -> Result<Option<InboundMessage>, CodecError> {
    match stream {
        "authorization" => {
            let msg: AuthorizationMessage = serde_json::from_value(element.clone())?;
            let control = if msg.is_authorized() {
                ControlMessage::Authenticated
            } else {
                ControlMessage::AuthRejected {
                    code: None,
                    message: format!("authorization status: {}", msg.data.status),
                }
            };
            Ok(Some(InboundMessage::Control(control)))
        }
        "listening" => Ok(Some(InboundMessage::Control(ControlMessage::Listening))),
        "trade_updates" => {
            let data = element
                .get("data")
                .ok_or_else(|| CodecError::Malformed("trade update without data".to_string()))?;
            let payload = if raw {
                StreamPayload::Raw(data.clone())
            } else {
                StreamPayload::TradeUpdate(Box::new(serde_json::from_value(data.clone())?))
            };
            let symbol = data
                .pointer("/order/symbol")
                .and_then(Value::as_str)
                .unwrap_or(WILDCARD)
                .to_string();
            Ok(Some(InboundMessage::Event(StreamEvent {
                kind: ChannelKind::TradeUpdates,
                symbol,
                payload,
            })))
        }
        _ => {
            trace!(stream, "ignoring unrecognized stream name");
            Ok(None)
        }
    }
}

fn decode_data(kind: ChannelKind, element: &Value, raw: bool) -> Result<InboundMessage, CodecError> {
    let symbol = event_symbol(kind, element);
    let payload = if raw {
        StreamPayload::Raw(element.clone())
    } else {
        typed_payload(kind, element)?
    };
    Ok(InboundMessage::Event(StreamEvent {
        kind,
        symbol,
        payload,
    }))
}

/// Symbol the event is addressed to. News messages carry a symbol list
/// instead of an `S` field; the first entry wins, the wildcard stands in
/// for an empty list.
fn event_symbol(kind: ChannelKind, element: &Value) -> String {
    if kind == ChannelKind::News {
        return element
            .get("symbols")
            .and_then(Value::as_array)
            .and_then(|symbols| symbols.first())
            .and_then(Value::as_str)
            .unwrap_or(WILDCARD)
            .to_string();
    }
    element
        .get("S")
        .and_then(Value::as_str)
        .unwrap_or(WILDCARD)
        .to_string()
}

fn typed_payload(kind: ChannelKind, element: &Value) -> Result<StreamPayload, CodecError> {
    let element = element.clone();
    let payload = match kind {
        ChannelKind::Trades => StreamPayload::Trade(serde_json::from_value(element)?),
        ChannelKind::Quotes => StreamPayload::Quote(serde_json::from_value(element)?),
        ChannelKind::Bars | ChannelKind::UpdatedBars | ChannelKind::DailyBars => {
            StreamPayload::Bar(serde_json::from_value(element)?)
        }
        ChannelKind::Orderbooks => StreamPayload::Orderbook(serde_json::from_value(element)?),
        ChannelKind::Statuses => StreamPayload::Status(serde_json::from_value(element)?),
        ChannelKind::Lulds => StreamPayload::Luld(serde_json::from_value(element)?),
        ChannelKind::News => StreamPayload::News(Box::new(serde_json::from_value(element)?)),
        ChannelKind::TradeUpdates => {
            StreamPayload::TradeUpdate(Box::new(serde_json::from_value(element)?))
        }
    };
    Ok(payload)
}
