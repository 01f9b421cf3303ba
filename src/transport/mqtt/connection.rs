//! Pure connection state management for the MQTT connection manager
//!
//! This module holds the lifecycle state, the fixed retry gate and the
//! per-tick decision function. None of it performs I/O, so the whole state
//! machine can be exercised without a session.

use std::time::Duration;

/// Fixed spacing between connect attempts
pub const RETRY_INTERVAL: Duration = Duration::from_millis(5000);

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Link up or down, no MQTT session
    #[default]
    Disconnected,
    /// A connect call is in progress
    Connecting,
    /// MQTT session established
    Connected,
}

/// What a single scheduler pass should do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAction {
    /// Network link is down; nothing to do until it returns
    LinkDown,
    /// Session is live; service it
    Pump,
    /// Session was live but the client no longer reports it connected
    SessionLost,
    /// Disconnected and the retry interval has not elapsed
    Wait,
    /// Disconnected and eligible for a new attempt
    Attempt,
}

/// Whether a new attempt is allowed at `now_ms`
///
/// The interval is measured from the previous attempt regardless of its
/// outcome. With no previous attempt the first one is allowed immediately.
pub fn retry_due(last_attempt_ms: Option<u64>, now_ms: u64) -> bool {
    match last_attempt_ms {
        None => true,
        Some(last) => now_ms.saturating_sub(last) >= RETRY_INTERVAL.as_millis() as u64,
    }
}

/// Decide what a tick does (pure function)
pub fn next_action(
    link_up: bool,
    state: ConnectionState,
    session_connected: bool,
    last_attempt_ms: Option<u64>,
    now_ms: u64,
) -> TickAction {
    if !link_up {
        return TickAction::LinkDown;
    }

    if state == ConnectionState::Connected {
        return if session_connected {
            TickAction::Pump
        } else {
            TickAction::SessionLost
        };
    }

    if retry_due(last_attempt_ms, now_ms) {
        TickAction::Attempt
    } else {
        TickAction::Wait
    }
}

/// Counters describing the connection history
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    /// Calls into the session's connect
    pub connect_attempts: u64,
    /// Connect calls that did not establish a session
    pub connect_failures: u64,
    /// Eligible ticks skipped because a credential resolved empty
    pub credential_stalls: u64,
    pub successful_connects: u64,
    /// Established sessions that dropped
    pub sessions_lost: u64,
    pub subscribe_failures: u64,
    /// Handler invocations performed by the router
    pub messages_dispatched: u64,
    /// When the retry timer was last armed (attempt, credential stall or
    /// session loss)
    pub last_attempt_ms: Option<u64>,
}
