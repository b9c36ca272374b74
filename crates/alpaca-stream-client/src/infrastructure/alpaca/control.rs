//! Outbound Control-Frame Encoding
//!
//! Builds the auth, subscribe, unsubscribe, and listen frames a session
//! sends, in the encoding the variant's endpoint expects. The two axes
//! that actually differ between stream families live here as small enums
//! instead of per-family client code.

use serde::Serialize;

use crate::application::ports::{CodecError, WireFrame};
use crate::domain::channel::ChannelKind;
use crate::domain::subscription::Symbol;

use super::messages::{AuthRequest, ListenRequest, SubscriptionRequest, TradeAuthRequest};

// =============================================================================
// Encoding Axes
// =============================================================================

/// Wire encoding for outbound control frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEncoding {
    /// JSON text frames.
    Json,
    /// MessagePack binary frames (options stream).
    MsgPack,
}

/// Shape of the authentication frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStyle {
    /// `{"action":"auth","key":...,"secret":...}` (market data streams).
    KeySecret,
    /// `{"action":"authenticate","data":{"key_id":...,"secret_key":...}}`
    /// (trade-updates stream).
    Envelope,
}

// =============================================================================
// Control Encoder
// =============================================================================

/// Encoder for one variant's outbound control frames.
#[derive(Debug, Clone, Copy)]
pub struct ControlEncoder {
    encoding: ControlEncoding,
    auth_style: AuthStyle,
}

impl ControlEncoder {
    /// Create an encoder with the given encoding and auth style.
    #[must_use]
    pub const fn new(encoding: ControlEncoding, auth_style: AuthStyle) -> Self {
        Self {
            encoding,
            auth_style,
        }
    }

    /// Build the authentication frame.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] if serialization fails.
    pub fn auth_frame(&self, key: &str, secret: &str) -> Result<WireFrame, CodecError> {
        match self.auth_style {
            AuthStyle::KeySecret => {
                self.encode(&AuthRequest::new(key.to_string(), secret.to_string()))
            }
            AuthStyle::Envelope => {
                self.encode(&TradeAuthRequest::new(key.to_string(), secret.to_string()))
            }
        }
    }

    /// Build a subscribe frame covering a full registry snapshot.
    ///
    /// Returns `Ok(None)` when the snapshot addresses no symbols.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] if serialization fails.
    pub fn subscribe_frame(
        &self,
        snapshot: &[(ChannelKind, Vec<Symbol>)],
    ) -> Result<Option<WireFrame>, CodecError> {
        let mut request = SubscriptionRequest::subscribe();
        for (kind, symbols) in snapshot {
            request = request.with(*kind, symbols.clone());
        }
        if request.is_empty() {
            return Ok(None);
        }
        self.encode(&request).map(Some)
    }

    /// Build an unsubscribe frame listing exactly `symbols` under `kind`.
    ///
    /// Returns `Ok(None)` when `symbols` is empty or `kind` has no
    /// subscribe-frame field.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] if serialization fails.
    pub fn unsubscribe_frame(
        &self,
        kind: ChannelKind,
        symbols: &[Symbol],
    ) -> Result<Option<WireFrame>, CodecError> {
        let request = SubscriptionRequest::unsubscribe().with(kind, symbols.to_vec());
        if request.is_empty() {
            return Ok(None);
        }
        self.encode(&request).map(Some)
    }

    /// Build the listen frame for the trade-updates stream.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] if serialization fails.
    pub fn listen_frame(&self) -> Result<WireFrame, CodecError> {
        self.encode(&ListenRequest::trade_updates())
    }

    fn encode<T: Serialize>(&self, value: &T) -> Result<WireFrame, CodecError> {
        match self.encoding {
            ControlEncoding::Json => serde_json::to_string(value)
                .map(WireFrame::Text)
                .map_err(|err| CodecError::Encode(err.to_string())),
            ControlEncoding::MsgPack => rmp_serde::to_vec_named(value)
                .map(WireFrame::Binary)
                .map_err(|err| CodecError::Encode(err.to_string())),
        }
    }
}
