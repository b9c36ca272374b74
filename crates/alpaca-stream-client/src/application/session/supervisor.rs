//! Reconnect Supervisor
//!
//! Wraps the state machine in a retry loop. Every attempt failure closes
//! the transport, waits out the backoff delay, and starts over from
//! connect; only a shutdown request or an exhausted attempt limit ends
//! the loop. Failures are logged, never surfaced to the caller; the
//! session's contract is to stay up until `stop`.

use tracing::{error, info, warn};

use super::machine::run_attempt;
use super::reconnect::ReconnectPolicy;
use super::{LifecycleState, Shared};

/// Worker-thread entry point.
pub(super) fn run(shared: &Shared) {
    let mut policy = ReconnectPolicy::new(shared.reconnect.clone());
    info!(
        variant = shared.protocol.name(),
        endpoint = %shared.endpoint,
        "session worker started"
    );

    loop {
        if shared.is_shutdown() {
            break;
        }

        match run_attempt(shared) {
            Ok(()) => break,
            Err(err) => {
                // A connection that made it to the read loop earns a
                // fresh backoff schedule.
                if shared.state() == LifecycleState::Running {
                    policy.reset();
                }
                shared.drop_transport();
                shared.set_state(LifecycleState::Idle);

                if shared.is_shutdown() {
                    break;
                }

                let Some(delay) = policy.next_delay() else {
                    error!(
                        variant = shared.protocol.name(),
                        attempts = policy.attempt_count(),
                        "reconnect attempts exhausted, giving up"
                    );
                    break;
                };
                warn!(
                    error = %err,
                    variant = shared.protocol.name(),
                    attempt = policy.attempt_count(),
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "stream attempt failed, reconnecting"
                );
                if shared.wait_for_shutdown(delay) {
                    break;
                }
            }
        }
    }

    shared.drop_transport();
    shared.set_state(LifecycleState::Idle);
    info!(variant = shared.protocol.name(), "session worker exited");
}
