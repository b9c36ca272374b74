//! Alpaca Wire Protocol
//!
//! Everything specific to Alpaca's streaming wire format:
//!
//! - **messages**: Control acknowledgements and outbound request frames
//! - **codec**: JSON and MessagePack inbound decoding
//! - **control**: Outbound control-frame encoding
//! - **variant**: Per-stream protocol variant tables

pub mod codec;
pub mod control;
pub mod messages;
pub mod variant;

pub use codec::{JsonCodec, MsgPackCodec};
pub use control::{AuthStyle, ControlEncoder, ControlEncoding};
pub use messages::{
    AuthRequest, ErrorMessage, ListenRequest, SubscriptionRequest, SuccessKind, SuccessMessage,
    TradeAuthRequest,
};
pub use variant::ProtocolVariant;
