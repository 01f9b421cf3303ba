//! Transport layer for the connection manager
//!
//! [`MqttSession`] is the seam between the connection manager and the MQTT
//! client library. The manager only ever talks to this trait, which lets the
//! real `rumqttc` adapter and the test fakes be swapped freely.

use rumqttc::{QoS, Transport};
use std::fmt;
use std::time::Duration;

pub mod mqtt;
pub mod tls;

/// Status of the underlying client, using the classic MQTT client codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No CONNACK within the connect timeout (-4)
    ConnectionTimeout,
    /// An established session broke (-3)
    ConnectionLost,
    /// Network or TLS failure while connecting (-2)
    ConnectFailed,
    /// Never connected or cleanly closed (-1)
    Disconnected,
    /// Session established (0)
    Connected,
    /// Broker rejected the protocol version (1)
    BadProtocol,
    /// Broker rejected the client identifier (2)
    BadClientId,
    /// Broker unavailable (3)
    Unavailable,
    /// Broker rejected the username or password (4)
    BadCredentials,
    /// Client not authorized (5)
    Unauthorized,
}

impl SessionState {
    pub fn code(self) -> i8 {
        match self {
            SessionState::ConnectionTimeout => -4,
            SessionState::ConnectionLost => -3,
            SessionState::ConnectFailed => -2,
            SessionState::Disconnected => -1,
            SessionState::Connected => 0,
            SessionState::BadProtocol => 1,
            SessionState::BadClientId => 2,
            SessionState::Unavailable => 3,
            SessionState::BadCredentials => 4,
            SessionState::Unauthorized => 5,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::ConnectionTimeout => "connection timeout",
            SessionState::ConnectionLost => "connection lost",
            SessionState::ConnectFailed => "connect failed",
            SessionState::Disconnected => "disconnected",
            SessionState::Connected => "connected",
            SessionState::BadProtocol => "bad protocol",
            SessionState::BadClientId => "bad client id",
            SessionState::Unavailable => "unavailable",
            SessionState::BadCredentials => "bad credentials",
            SessionState::Unauthorized => "unauthorized",
        };
        write!(f, "{name} ({})", self.code())
    }
}

/// MQTT client operations the connection manager delegates to
///
/// All calls happen on the scheduler's single execution context. `connect`
/// may block up to the implementation's connect timeout; everything else
/// must return promptly.
pub trait MqttSession {
    /// Record the broker address used by subsequent connects
    fn set_server(&mut self, host: &str, port: u16);

    /// Record the keepalive interval used by subsequent connects
    fn set_keep_alive(&mut self, keep_alive: Duration);

    /// Install the (TLS) transport used by subsequent connects
    fn set_transport(&mut self, transport: Transport);

    /// Open a session; `true` once the broker accepted it
    fn connect(&mut self, client_id: &str, username: &str, password: &str) -> bool;

    /// Request a broker subscription; `true` if the request was issued
    fn subscribe(&mut self, topic: &str, qos: QoS) -> bool;

    /// Send a message; `true` if it was handed to the client
    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> bool;

    /// Service reads, writes and keepalive once, delivering every inbound
    /// message to `on_message` before returning
    fn pump(&mut self, on_message: &mut dyn FnMut(&str, &[u8]));

    /// Whether the session is currently established
    fn is_connected(&self) -> bool;

    /// Last known client status
    fn state(&self) -> SessionState;
}
