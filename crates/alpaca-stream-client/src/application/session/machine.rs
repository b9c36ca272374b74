//! Connection State Machine
//!
//! A single connection attempt: connect, validate the greeting,
//! authenticate, replay the subscription snapshot, then pump the read
//! loop until the transport fails or shutdown closes it. Errors return
//! control to the supervisor; nothing here retries.

use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::application::ports::{
    CodecError, ControlMessage, InboundMessage, Transport, TransportError,
};

use super::{LifecycleState, Shared};

/// Why a connection attempt ended.
#[derive(Debug, Error)]
pub(super) enum AttemptError {
    /// Transport-level failure (connect, read, or write).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Handshake produced the wrong acknowledgement, or none.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server rejected the credentials.
    #[error("authentication rejected: {0}")]
    AuthRejected(String),

    /// A handshake frame could not be decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Drive one connection attempt to completion.
///
/// `Ok(())` means the read loop was ended by a requested shutdown; any
/// other exit is an error for the supervisor to handle.
pub(super) fn run_attempt(shared: &Shared) -> Result<(), AttemptError> {
    let protocol = shared.protocol.as_ref();

    shared.set_state(LifecycleState::Connecting);
    let transport = shared.connector.connect(&shared.endpoint)?;
    shared.install_transport(&transport);
    if shared.is_shutdown() {
        // stop() raced the connect; the freshly installed transport was
        // already closed by install_transport in that case.
        return Ok(());
    }

    if protocol.expects_greeting() {
        match next_control(shared, transport.as_ref())? {
            ControlMessage::Connected => {}
            other => {
                return Err(AttemptError::Protocol(format!(
                    "expected connection greeting, got {other:?}"
                )));
            }
        }
    }
    shared.set_state(LifecycleState::Connected);

    let auth = protocol.auth_frame(shared.credentials.key(), shared.credentials.secret())?;
    transport.send(&auth)?;
    match next_control(shared, transport.as_ref())? {
        ControlMessage::Authenticated => {}
        ControlMessage::AuthRejected { code, message } => {
            return Err(AttemptError::AuthRejected(format!(
                "{message} (code {code:?})"
            )));
        }
        ControlMessage::ServerError { code, message } => {
            return Err(AttemptError::AuthRejected(format!(
                "{message} (code {code})"
            )));
        }
        other => {
            return Err(AttemptError::Protocol(format!(
                "expected authentication acknowledgement, got {other:?}"
            )));
        }
    }
    shared.set_state(LifecycleState::Authenticated);

    let version = shared.registry.version();
    let snapshot = shared.registry.snapshot();
    if let Some(frame) = protocol.subscribe_frame(&snapshot)? {
        transport.send(&frame)?;
    }
    shared.set_state(LifecycleState::Running);
    debug!(variant = protocol.name(), "stream running");

    // A subscribe call landing between the snapshot and the Running
    // transition saw a pre-Running state and sent nothing itself; replay
    // the current snapshot if the registry moved.
    if shared.registry.version() != version {
        if let Some(frame) = protocol.subscribe_frame(&shared.registry.snapshot())? {
            transport.send(&frame)?;
        }
    }

    read_loop(shared, transport.as_ref())
}

/// Pump frames until the transport fails or shutdown closes it.
fn read_loop(shared: &Shared, transport: &dyn Transport) -> Result<(), AttemptError> {
    loop {
        let frame = match transport.receive() {
            Ok(frame) => frame,
            Err(TransportError::Closed) if shared.is_shutdown() => return Ok(()),
            Err(err) => return Err(err.into()),
        };

        let messages = match shared.protocol.codec().decode(&frame) {
            Ok(messages) => messages,
            Err(err) => {
                // A frame that is not even an envelope is dropped whole;
                // the connection itself is still healthy.
                warn!(error = %err, "dropping undecodable frame");
                continue;
            }
        };

        for message in messages {
            match message {
                InboundMessage::Control(control) => consume_control(&control),
                InboundMessage::Event(event) => {
                    if shared.is_shutdown() {
                        return Ok(());
                    }
                    match shared.registry.resolve(event.kind, &event.symbol) {
                        Some(handler) => handler(event),
                        None => {
                            trace!(
                                kind = ?event.kind,
                                symbol = %event.symbol,
                                "event without a registered handler"
                            );
                        }
                    }
                }
            }
        }
    }
}

/// Control messages arriving mid-stream are informational.
fn consume_control(control: &ControlMessage) {
    match control {
        ControlMessage::ServerError { code, message } => {
            warn!(code, message, "server error on stream");
        }
        other => debug!(control = ?other, "stream control message"),
    }
}

/// Read frames until one yields a control message.
///
/// Data events arriving before the handshake completes are not expected
/// from the server and are skipped.
fn next_control(
    shared: &Shared,
    transport: &dyn Transport,
) -> Result<ControlMessage, AttemptError> {
    loop {
        let frame = transport.receive()?;
        for message in shared.protocol.codec().decode(&frame)? {
            match message {
                InboundMessage::Control(control) => return Ok(control),
                InboundMessage::Event(event) => {
                    trace!(kind = ?event.kind, "data event during handshake, skipping");
                }
            }
        }
    }
}
