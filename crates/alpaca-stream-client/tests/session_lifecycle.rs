//! Session Lifecycle Integration Tests
//!
//! Drives the handshake, dispatch, reconnect, and shutdown paths end to
//! end through an in-process fake transport; no sockets involved.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use rust_decimal::Decimal;

use alpaca_stream_client::{
    ChannelKind, CodecError, Connector, Credentials, Environment, Feed, LifecycleState, Protocol,
    ProtocolVariant, ReconnectConfig, Session, SessionConfig, SessionError, StreamCodec,
    StreamEvent, StreamPayload, Symbol, Transport, TransportError, WireFrame,
};

/// Install the test log subscriber; `RUST_LOG` controls verbosity.
fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

const CONNECTED_ACK: &str = r#"[{"T":"success","msg":"connected"}]"#;
const AUTH_ACK: &str = r#"[{"T":"success","msg":"authenticated"}]"#;
const AUTH_REJECTED: &str = r#"[{"T":"error","code":402,"msg":"auth failed"}]"#;

// =============================================================================
// Fake Transport
// =============================================================================

/// What the fake transport does once its scripted frames run out.
#[derive(Clone, Copy)]
enum Drain {
    /// Block until more frames are pushed or the transport is closed.
    Block,
    /// Fail the read, simulating a dropped connection.
    Error,
    /// Fail the read the way the websocket transport reports a
    /// heartbeat timeout on a silently dead connection.
    Stall,
}

struct FakeState {
    queue: VecDeque<WireFrame>,
    closed: bool,
}

struct FakeTransport {
    state: Mutex<FakeState>,
    arrived: Condvar,
    sent: Mutex<Vec<WireFrame>>,
    drain: Drain,
}

impl FakeTransport {
    fn new(scripted: &[&str], drain: Drain) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FakeState {
                queue: scripted
                    .iter()
                    .map(|text| WireFrame::Text((*text).to_string()))
                    .collect(),
                closed: false,
            }),
            arrived: Condvar::new(),
            sent: Mutex::new(Vec::new()),
            drain,
        })
    }

    /// Feed one more inbound frame to a live transport.
    fn push(&self, text: &str) {
        self.state
            .lock()
            .queue
            .push_back(WireFrame::Text(text.to_string()));
        self.arrived.notify_all();
    }

    fn sent_json(&self) -> Vec<serde_json::Value> {
        self.sent
            .lock()
            .iter()
            .map(|frame| match frame {
                WireFrame::Text(text) => serde_json::from_str(text).unwrap(),
                WireFrame::Binary(bytes) => rmp_serde::from_slice(bytes).unwrap(),
            })
            .collect()
    }

    fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }
}

impl Transport for FakeTransport {
    fn send(&self, frame: &WireFrame) -> Result<(), TransportError> {
        if self.state.lock().closed {
            return Err(TransportError::Closed);
        }
        self.sent.lock().push(frame.clone());
        Ok(())
    }

    fn receive(&self) -> Result<WireFrame, TransportError> {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return Err(TransportError::Closed);
            }
            if let Some(frame) = state.queue.pop_front() {
                return Ok(frame);
            }
            match self.drain {
                Drain::Error => {
                    return Err(TransportError::Receive("connection reset".to_string()));
                }
                Drain::Stall => {
                    return Err(TransportError::Receive(
                        "heartbeat timeout: no traffic from server".to_string(),
                    ));
                }
                Drain::Block => self.arrived.wait(&mut state),
            }
        }
    }

    fn close(&self) {
        self.state.lock().closed = true;
        self.arrived.notify_all();
    }
}

// =============================================================================
// Fake Connector
// =============================================================================

struct FakeConnector {
    transports: Mutex<VecDeque<Arc<FakeTransport>>>,
    connects: AtomicUsize,
}

impl FakeConnector {
    fn new(transports: Vec<Arc<FakeTransport>>) -> Arc<Self> {
        Arc::new(Self {
            transports: Mutex::new(transports.into()),
            connects: AtomicUsize::new(0),
        })
    }

    fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl Connector for FakeConnector {
    fn connect(&self, _url: &str) -> Result<Arc<dyn Transport>, TransportError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.transports
            .lock()
            .pop_front()
            .map(|transport| transport as Arc<dyn Transport>)
            .ok_or_else(|| TransportError::ConnectFailed("no route to host".to_string()))
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn fast_config() -> SessionConfig {
    SessionConfig {
        endpoint: None,
        reconnect: ReconnectConfig {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(10),
            multiplier: 1.0,
            jitter_factor: 0.0,
            max_attempts: 0,
        },
    }
}

fn equities_session(transports: Vec<Arc<FakeTransport>>) -> (Session, Arc<FakeConnector>) {
    init_tracing();
    let connector = FakeConnector::new(transports);
    let session = Session::with_connector(
        Arc::new(ProtocolVariant::equities(Feed::Iex)),
        Arc::clone(&connector) as Arc<dyn Connector>,
        Credentials::new("test-key", "test-secret").unwrap(),
        fast_config(),
    );
    (session, connector)
}

/// Poll `condition` for up to two seconds.
fn wait_for(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

fn collect_events() -> (Arc<Mutex<Vec<StreamEvent>>>, impl Fn(StreamEvent) + Send + Sync) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    (events, move |event| sink.lock().push(event))
}

// =============================================================================
// Tests
// =============================================================================

#[test]
fn trade_event_reaches_handler() {
    let transport = FakeTransport::new(&[CONNECTED_ACK, AUTH_ACK], Drain::Block);
    let (session, _connector) = equities_session(vec![Arc::clone(&transport)]);
    let (events, handler) = collect_events();

    session
        .subscribe(ChannelKind::Trades, &["AAPL".to_string()], handler)
        .unwrap();
    session.run();

    assert!(wait_for(|| session.state() == LifecycleState::Running));
    transport.push(r#"[{"T":"t","S":"AAPL","p":190.5,"s":10,"t":"2024-01-15T10:00:01Z"}]"#);
    assert!(wait_for(|| events.lock().len() == 1));

    let events = events.lock();
    assert_eq!(events[0].symbol, "AAPL");
    match &events[0].payload {
        StreamPayload::Trade(trade) => {
            assert_eq!(trade.price, "190.5".parse::<Decimal>().unwrap());
            assert_eq!(trade.size, Decimal::from(10));
        }
        other => panic!("unexpected payload: {other:?}"),
    }
    drop(events);

    session.stop();
    assert_eq!(session.state(), LifecycleState::Idle);
}

#[test]
fn handshake_sends_auth_before_subscribe() {
    let transport = FakeTransport::new(&[CONNECTED_ACK, AUTH_ACK], Drain::Block);
    let (session, _connector) = equities_session(vec![Arc::clone(&transport)]);

    session
        .subscribe(ChannelKind::Trades, &["AAPL".to_string()], |_| {})
        .unwrap();
    session.run();
    assert!(wait_for(|| transport.sent_count() >= 2));
    session.stop();

    let sent = transport.sent_json();
    assert_eq!(sent[0]["action"], "auth");
    assert_eq!(sent[0]["key"], "test-key");
    assert_eq!(sent[1]["action"], "subscribe");
    assert_eq!(sent[1]["trades"], serde_json::json!(["AAPL"]));
    let auth_frames = sent.iter().filter(|f| f["action"] == "auth").count();
    assert_eq!(auth_frames, 1);
}

#[test]
fn empty_registry_sends_no_subscribe_frame() {
    let transport = FakeTransport::new(&[CONNECTED_ACK, AUTH_ACK], Drain::Block);
    let (session, _connector) = equities_session(vec![Arc::clone(&transport)]);

    session.run();
    assert!(wait_for(|| session.state() == LifecycleState::Running));
    session.stop();

    let sent = transport.sent_json();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["action"], "auth");
}

#[test]
fn reconnect_replays_full_snapshot() {
    let first = FakeTransport::new(&[CONNECTED_ACK, AUTH_ACK], Drain::Error);
    let second = FakeTransport::new(&[CONNECTED_ACK, AUTH_ACK], Drain::Block);
    let (session, connector) =
        equities_session(vec![Arc::clone(&first), Arc::clone(&second)]);

    session
        .subscribe(ChannelKind::Trades, &["AAPL".to_string()], |_| {})
        .unwrap();
    // Empty symbol list registers the quote wildcard.
    session.subscribe(ChannelKind::Quotes, &[], |_| {}).unwrap();
    session.run();

    assert!(wait_for(|| connector.connect_count() == 2));
    assert!(wait_for(|| second.sent_count() >= 2));
    session.stop();

    let sent = second.sent_json();
    assert_eq!(sent[1]["action"], "subscribe");
    assert_eq!(sent[1]["trades"], serde_json::json!(["AAPL"]));
    assert_eq!(sent[1]["quotes"], serde_json::json!(["*"]));
}

#[test]
fn subscribe_while_running_resends_snapshot() {
    let transport = FakeTransport::new(&[CONNECTED_ACK, AUTH_ACK], Drain::Block);
    let (session, _connector) = equities_session(vec![Arc::clone(&transport)]);

    session
        .subscribe(ChannelKind::Trades, &["AAPL".to_string()], |_| {})
        .unwrap();
    session.run();
    assert!(wait_for(|| session.state() == LifecycleState::Running));
    let before = transport.sent_count();

    session
        .subscribe(ChannelKind::Quotes, &["MSFT".to_string()], |_| {})
        .unwrap();
    assert!(wait_for(|| transport.sent_count() > before));
    session.stop();

    let sent = transport.sent_json();
    let frame = sent.last().unwrap();
    assert_eq!(frame["action"], "subscribe");
    assert_eq!(frame["trades"], serde_json::json!(["AAPL"]));
    assert_eq!(frame["quotes"], serde_json::json!(["MSFT"]));
}

#[test]
fn unsubscribe_sends_targeted_frame() {
    let transport = FakeTransport::new(&[CONNECTED_ACK, AUTH_ACK], Drain::Block);
    let (session, _connector) = equities_session(vec![Arc::clone(&transport)]);
    let (events, handler) = collect_events();

    session
        .subscribe(
            ChannelKind::Trades,
            &["A".to_string(), "B".to_string()],
            handler,
        )
        .unwrap();
    session.run();
    assert!(wait_for(|| session.state() == LifecycleState::Running));
    let before = transport.sent_count();

    session
        .unsubscribe(ChannelKind::Trades, &["B".to_string()])
        .unwrap();
    assert!(wait_for(|| transport.sent_count() > before));

    let sent = transport.sent_json();
    let frame = sent.last().unwrap();
    assert_eq!(frame["action"], "unsubscribe");
    assert_eq!(frame["trades"], serde_json::json!(["B"]));

    // B no longer dispatches; A still does.
    transport.push(r#"[{"T":"t","S":"B","p":1,"s":1,"t":"2024-01-15T10:00:01Z"}]"#);
    transport.push(r#"[{"T":"t","S":"A","p":2,"s":1,"t":"2024-01-15T10:00:02Z"}]"#);
    assert!(wait_for(|| !events.lock().is_empty()));
    session.stop();

    let events = events.lock();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].symbol, "A");
}

#[test]
fn auth_rejection_is_retried() {
    let rejected = FakeTransport::new(&[CONNECTED_ACK, AUTH_REJECTED], Drain::Block);
    let rejected_again = FakeTransport::new(&[CONNECTED_ACK, AUTH_REJECTED], Drain::Block);
    let accepted = FakeTransport::new(&[CONNECTED_ACK, AUTH_ACK], Drain::Block);
    let (session, connector) = equities_session(vec![rejected, rejected_again, accepted]);

    session.run();
    assert!(wait_for(|| connector.connect_count() == 3));
    assert!(wait_for(|| session.state() == LifecycleState::Running));
    session.stop();
}

#[test]
fn no_dispatch_after_stop() {
    let transport = FakeTransport::new(&[CONNECTED_ACK, AUTH_ACK], Drain::Block);
    let (session, _connector) = equities_session(vec![Arc::clone(&transport)]);
    let (events, handler) = collect_events();

    session
        .subscribe(ChannelKind::Trades, &["AAPL".to_string()], handler)
        .unwrap();
    session.run();
    assert!(wait_for(|| session.state() == LifecycleState::Running));
    session.stop();

    transport.push(r#"[{"T":"t","S":"AAPL","p":1,"s":1,"t":"2024-01-15T10:00:01Z"}]"#);
    std::thread::sleep(Duration::from_millis(50));
    assert!(events.lock().is_empty());
}

#[test]
fn run_is_idempotent() {
    let transport = FakeTransport::new(&[CONNECTED_ACK, AUTH_ACK], Drain::Block);
    let (session, connector) = equities_session(vec![Arc::clone(&transport)]);

    session.run();
    session.run();
    assert!(wait_for(|| session.state() == LifecycleState::Running));
    session.run();
    session.stop();

    assert_eq!(connector.connect_count(), 1);
    let sent = transport.sent_json();
    assert_eq!(
        sent.iter().filter(|f| f["action"] == "auth").count(),
        1
    );
}

#[test]
fn unsupported_channel_is_rejected_synchronously() {
    let (session, connector) = equities_session(vec![]);
    let result = session.subscribe(ChannelKind::Orderbooks, &[], |_| {});
    assert!(matches!(
        result,
        Err(SessionError::UnsupportedChannel { .. })
    ));
    assert_eq!(connector.connect_count(), 0);
}

#[test]
fn malformed_element_does_not_poison_frame() {
    let transport = FakeTransport::new(&[CONNECTED_ACK, AUTH_ACK], Drain::Block);
    let (session, _connector) = equities_session(vec![Arc::clone(&transport)]);
    let (events, handler) = collect_events();

    session
        .subscribe(ChannelKind::Trades, &["AAPL".to_string()], handler)
        .unwrap();
    session.run();
    assert!(wait_for(|| session.state() == LifecycleState::Running));

    transport.push(
        r#"[{"T":"t","S":"AAPL"},
            {"T":"t","S":"AAPL","p":5,"s":1,"t":"2024-01-15T10:00:01Z"}]"#,
    );
    assert!(wait_for(|| events.lock().len() == 1));
    session.stop();
}

#[test]
fn trade_updates_handshake_uses_listen_frame() {
    init_tracing();
    let transport = FakeTransport::new(
        &[
            r#"{"stream":"authorization","data":{"status":"authorized","action":"authenticate"}}"#,
            r#"{"stream":"listening","data":{"streams":["trade_updates"]}}"#,
        ],
        Drain::Block,
    );
    let connector = FakeConnector::new(vec![Arc::clone(&transport)]);
    let session = Session::with_connector(
        Arc::new(ProtocolVariant::trade_updates(Environment::Paper)),
        Arc::clone(&connector) as Arc<dyn Connector>,
        Credentials::new("test-key", "test-secret").unwrap(),
        fast_config(),
    );
    let (events, handler) = collect_events();

    session
        .subscribe(ChannelKind::TradeUpdates, &[], handler)
        .unwrap();
    session.run();
    assert!(wait_for(|| transport.sent_count() >= 2));

    let sent = transport.sent_json();
    assert_eq!(sent[0]["action"], "authenticate");
    assert_eq!(sent[0]["data"]["key_id"], "test-key");
    assert_eq!(sent[1]["action"], "listen");
    assert_eq!(sent[1]["data"]["streams"], serde_json::json!(["trade_updates"]));

    transport.push(
        r#"{"stream":"trade_updates","data":{"event":"fill","price":"150.50","qty":"10",
            "order":{"id":"o1","client_order_id":"c1","symbol":"AAPL","side":"buy",
                     "type":"market","status":"filled","filled_qty":"10"}}}"#,
    );
    assert!(wait_for(|| events.lock().len() == 1));
    session.stop();

    let events = events.lock();
    assert_eq!(events[0].kind, ChannelKind::TradeUpdates);
    assert_eq!(events[0].symbol, "AAPL");
}

#[test]
fn close_without_stop_triggers_reconnect() {
    let first = FakeTransport::new(&[CONNECTED_ACK, AUTH_ACK], Drain::Block);
    let second = FakeTransport::new(&[CONNECTED_ACK, AUTH_ACK], Drain::Block);
    let (session, connector) = equities_session(vec![Arc::clone(&first), second]);

    session.run();
    assert!(wait_for(|| session.state() == LifecycleState::Running));

    session.close();
    assert!(wait_for(|| connector.connect_count() == 2));
    assert!(wait_for(|| session.state() == LifecycleState::Running));
    session.stop();
}

#[test]
fn stalled_connection_triggers_reconnect() {
    let first = FakeTransport::new(&[CONNECTED_ACK, AUTH_ACK], Drain::Stall);
    let second = FakeTransport::new(&[CONNECTED_ACK, AUTH_ACK], Drain::Block);
    let (session, connector) = equities_session(vec![Arc::clone(&first), Arc::clone(&second)]);

    session
        .subscribe(ChannelKind::Trades, &["AAPL".to_string()], |_| {})
        .unwrap();
    session.run();

    // The watchdog surfaces the dead connection as a receive error; the
    // supervisor dials again and replays the snapshot.
    assert!(wait_for(|| connector.connect_count() == 2));
    assert!(wait_for(|| second.sent_count() >= 2));
    session.stop();

    let sent = second.sent_json();
    assert_eq!(sent[1]["action"], "subscribe");
    assert_eq!(sent[1]["trades"], serde_json::json!(["AAPL"]));
}

// =============================================================================
// Handshake Race
// =============================================================================

/// Wraps a variant and pauses the first subscribe-frame build until the
/// test releases it, holding the handshake open at a known point.
struct GatedProtocol {
    inner: ProtocolVariant,
    building: (Mutex<bool>, Condvar),
    released: (Mutex<bool>, Condvar),
    gated: AtomicBool,
}

impl GatedProtocol {
    fn new(inner: ProtocolVariant) -> Arc<Self> {
        Arc::new(Self {
            inner,
            building: (Mutex::new(false), Condvar::new()),
            released: (Mutex::new(false), Condvar::new()),
            gated: AtomicBool::new(false),
        })
    }

    fn wait_until_building(&self) {
        let (lock, signal) = &self.building;
        let mut flag = lock.lock();
        while !*flag {
            signal.wait(&mut flag);
        }
    }

    fn release_build(&self) {
        let (lock, signal) = &self.released;
        *lock.lock() = true;
        signal.notify_all();
    }
}

impl Protocol for GatedProtocol {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn endpoint(&self) -> &str {
        self.inner.endpoint()
    }

    fn expects_greeting(&self) -> bool {
        self.inner.expects_greeting()
    }

    fn supports(&self, kind: ChannelKind) -> bool {
        self.inner.supports(kind)
    }

    fn codec(&self) -> &dyn StreamCodec {
        self.inner.codec()
    }

    fn auth_frame(&self, key: &str, secret: &str) -> Result<WireFrame, CodecError> {
        self.inner.auth_frame(key, secret)
    }

    fn subscribe_frame(
        &self,
        snapshot: &[(ChannelKind, Vec<Symbol>)],
    ) -> Result<Option<WireFrame>, CodecError> {
        if !self.gated.swap(true, Ordering::SeqCst) {
            let (lock, signal) = &self.building;
            *lock.lock() = true;
            signal.notify_all();

            let (lock, signal) = &self.released;
            let mut flag = lock.lock();
            while !*flag {
                signal.wait(&mut flag);
            }
        }
        self.inner.subscribe_frame(snapshot)
    }

    fn unsubscribe_frame(
        &self,
        kind: ChannelKind,
        symbols: &[Symbol],
    ) -> Result<Option<WireFrame>, CodecError> {
        self.inner.unsubscribe_frame(kind, symbols)
    }
}

#[test]
fn subscribe_during_handshake_is_flushed_after_running() {
    init_tracing();
    let transport = FakeTransport::new(&[CONNECTED_ACK, AUTH_ACK], Drain::Block);
    let connector = FakeConnector::new(vec![Arc::clone(&transport)]);
    let protocol = GatedProtocol::new(ProtocolVariant::equities(Feed::Iex));
    let session = Session::with_connector(
        Arc::clone(&protocol) as Arc<dyn Protocol>,
        Arc::clone(&connector) as Arc<dyn Connector>,
        Credentials::new("test-key", "test-secret").unwrap(),
        fast_config(),
    );

    session
        .subscribe(ChannelKind::Trades, &["AAPL".to_string()], |_| {})
        .unwrap();
    session.run();

    // The worker is mid-handshake, building a subscribe frame from a
    // snapshot that predates the next call.
    protocol.wait_until_building();
    session
        .subscribe(ChannelKind::Quotes, &["MSFT".to_string()], |_| {})
        .unwrap();
    protocol.release_build();

    // The late registration is flushed right after Running rather than
    // waiting for the next reconnect.
    assert!(wait_for(|| transport.sent_count() >= 3));
    session.stop();

    let sent = transport.sent_json();
    assert_eq!(sent[1]["action"], "subscribe");
    assert_eq!(sent[1]["trades"], serde_json::json!(["AAPL"]));
    assert!(sent[1].get("quotes").is_none());
    let last = sent.last().unwrap();
    assert_eq!(last["action"], "subscribe");
    assert_eq!(last["trades"], serde_json::json!(["AAPL"]));
    assert_eq!(last["quotes"], serde_json::json!(["MSFT"]));
}
