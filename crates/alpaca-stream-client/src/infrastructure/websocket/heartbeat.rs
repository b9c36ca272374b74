//! Connection Heartbeat
//!
//! Liveness watchdog for the blocking transport. A NAT mapping or
//! half-open TCP connection can die without ever producing a socket
//! error; without active pinging the read loop would poll a dead socket
//! forever. The monitor requests a websocket ping on a fixed cadence and
//! declares the connection dead when no inbound traffic (pong or
//! otherwise) arrives within the timeout after a ping.
//!
//! The monitor is clock-driven, not thread-driven: the transport's
//! receive loop consults it on every poll tick and acts on the returned
//! [`HeartbeatAction`].

use std::time::{Duration, Instant};

/// Configuration for heartbeat behavior.
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// Interval between ping messages.
    pub ping_interval: Duration,
    /// Timeout for inbound traffic after a ping before the connection
    /// is considered dead.
    pub pong_timeout: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(20),
            pong_timeout: Duration::from_secs(20),
        }
    }
}

/// What the transport should do on this poll tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatAction {
    /// Connection looks healthy; keep polling.
    Wait,
    /// The ping interval elapsed; send a ping frame.
    SendPing,
    /// No traffic arrived within the timeout; the connection is dead.
    Timeout,
}

/// Per-connection liveness state.
#[derive(Debug)]
pub struct HeartbeatMonitor {
    config: HeartbeatConfig,
    last_ping: Instant,
    waiting_for_pong: bool,
}

impl HeartbeatMonitor {
    /// Create a monitor for a freshly opened connection.
    #[must_use]
    pub fn new(config: HeartbeatConfig) -> Self {
        Self {
            config,
            last_ping: Instant::now(),
            waiting_for_pong: false,
        }
    }

    /// Record inbound traffic of any kind.
    ///
    /// Data frames count as liveness just as pongs do; a stream busy
    /// with market data never times out.
    pub fn record_activity(&mut self) {
        self.waiting_for_pong = false;
    }

    /// Evaluate the connection on a poll tick.
    pub fn poll(&mut self) -> HeartbeatAction {
        self.poll_at(Instant::now())
    }

    fn poll_at(&mut self, now: Instant) -> HeartbeatAction {
        if self.waiting_for_pong
            && now.duration_since(self.last_ping) >= self.config.pong_timeout
        {
            return HeartbeatAction::Timeout;
        }
        if now.duration_since(self.last_ping) >= self.config.ping_interval {
            self.last_ping = now;
            self.waiting_for_pong = true;
            return HeartbeatAction::SendPing;
        }
        HeartbeatAction::Wait
    }
}
