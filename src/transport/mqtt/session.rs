//! [`MqttSession`] backed by the synchronous `rumqttc` client
//!
//! A fresh `Client`/`Connection` pair is created for every connect. The
//! connect call blocks on the connection until the broker answers with a
//! CONNACK or the connect timeout expires. `pump` then drives the
//! connection's event loop with short bounded reads, which is what moves
//! inbound packets, queued requests and keepalive pings.

use crate::transport::{MqttSession, SessionState};
use rumqttc::{
    Client, ConnectReturnCode, Connection, ConnectionError, Event, MqttOptions, Packet, QoS,
    RecvTimeoutError, Transport,
};
use std::time::{Duration, Instant};
use tracing::debug;

const REQUEST_CAPACITY: usize = 10;
/// Upper bound on events handled by a single pump
const MAX_EVENTS_PER_PUMP: usize = 64;
/// Wait per read inside a pump; an idle connection costs one of these per tick
const PUMP_READ_TIMEOUT: Duration = Duration::from_millis(1);

struct Link {
    client: Client,
    connection: Connection,
}

pub struct RumqttSession {
    host: String,
    port: u16,
    keep_alive: Duration,
    transport: Option<Transport>,
    connect_timeout: Duration,
    link: Option<Link>,
    state: SessionState,
}

impl RumqttSession {
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            host: String::new(),
            port: 0,
            keep_alive: Duration::from_secs(30),
            transport: None,
            connect_timeout,
            link: None,
            state: SessionState::Disconnected,
        }
    }

    fn options(&self, client_id: &str, username: &str, password: &str) -> MqttOptions {
        let mut options = MqttOptions::new(client_id, self.host.clone(), self.port);
        options
            .set_keep_alive(self.keep_alive)
            .set_credentials(username, password)
            .set_clean_session(true);
        if let Some(transport) = &self.transport {
            options.set_transport(transport.clone());
        }
        options
    }

    fn drop_link(&mut self, state: SessionState) {
        self.link = None;
        self.state = state;
    }
}

fn state_for_return_code(code: ConnectReturnCode) -> SessionState {
    match code {
        ConnectReturnCode::Success => SessionState::Connected,
        ConnectReturnCode::RefusedProtocolVersion => SessionState::BadProtocol,
        ConnectReturnCode::BadClientId => SessionState::BadClientId,
        ConnectReturnCode::ServiceUnavailable => SessionState::Unavailable,
        ConnectReturnCode::BadUserNamePassword => SessionState::BadCredentials,
        ConnectReturnCode::NotAuthorized => SessionState::Unauthorized,
    }
}

impl MqttSession for RumqttSession {
    fn set_server(&mut self, host: &str, port: u16) {
        self.host = host.to_string();
        self.port = port;
    }

    fn set_keep_alive(&mut self, keep_alive: Duration) {
        self.keep_alive = keep_alive;
    }

    fn set_transport(&mut self, transport: Transport) {
        self.transport = Some(transport);
    }

    fn connect(&mut self, client_id: &str, username: &str, password: &str) -> bool {
        self.link = None;

        // rumqttc refuses identifiers with a leading space
        if client_id.starts_with(' ') {
            self.state = SessionState::BadClientId;
            return false;
        }

        let (client, mut connection) =
            Client::new(self.options(client_id, username, password), REQUEST_CAPACITY);
        let deadline = Instant::now() + self.connect_timeout;

        self.state = loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break SessionState::ConnectionTimeout;
            }
            match connection.recv_timeout(remaining) {
                Ok(Ok(Event::Incoming(Packet::ConnAck(ack)))) => {
                    break state_for_return_code(ack.code)
                }
                Ok(Ok(_)) => continue,
                Ok(Err(ConnectionError::ConnectionRefused(code))) => {
                    break state_for_return_code(code)
                }
                Ok(Err(error)) => {
                    debug!(%error, "MQTT connect error");
                    break SessionState::ConnectFailed;
                }
                Err(RecvTimeoutError::Timeout) => break SessionState::ConnectionTimeout,
                Err(RecvTimeoutError::Disconnected) => break SessionState::ConnectFailed,
            }
        };

        if self.state == SessionState::Connected {
            self.link = Some(Link { client, connection });
            true
        } else {
            false
        }
    }

    fn subscribe(&mut self, topic: &str, qos: QoS) -> bool {
        match self.link.as_mut() {
            Some(link) => link.client.try_subscribe(topic, qos).is_ok(),
            None => false,
        }
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> bool {
        match self.link.as_mut() {
            Some(link) => link
                .client
                .try_publish(topic, QoS::AtMostOnce, retain, payload.to_vec())
                .is_ok(),
            None => false,
        }
    }

    fn pump(&mut self, on_message: &mut dyn FnMut(&str, &[u8])) {
        let Some(link) = self.link.as_mut() else {
            return;
        };

        let mut lost = None;
        for _ in 0..MAX_EVENTS_PER_PUMP {
            match link.connection.recv_timeout(PUMP_READ_TIMEOUT) {
                Ok(Ok(Event::Incoming(Packet::Publish(publish)))) => {
                    on_message(&publish.topic, &publish.payload);
                }
                Ok(Ok(Event::Incoming(Packet::Disconnect))) => {
                    lost = Some(SessionState::Disconnected);
                    break;
                }
                Ok(Ok(_)) => {}
                Ok(Err(error)) => {
                    debug!(%error, "MQTT connection error");
                    lost = Some(SessionState::ConnectionLost);
                    break;
                }
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => {
                    lost = Some(SessionState::ConnectionLost);
                    break;
                }
            }
        }

        if let Some(state) = lost {
            self.drop_link(state);
        }
    }

    fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    fn state(&self) -> SessionState {
        self.state
    }
}
