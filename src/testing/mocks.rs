//! Mock implementations for testing
//!
//! [`FakeSession`] stands in for the MQTT client and [`ManualClock`] for the
//! wall clock, so connection behavior can be driven tick by tick without a
//! broker or real time passing.

use crate::clock::Clock;
use crate::transport::{MqttSession, SessionState};
use rumqttc::{QoS, Transport};
use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

pub type PublishedMessage = (String, Vec<u8>, bool);

/// Scriptable in-memory MQTT session
#[derive(Debug)]
pub struct FakeSession {
    server: Option<(String, u16)>,
    keep_alive: Option<Duration>,
    transport_is_tls: Option<bool>,
    connect_results: VecDeque<bool>,
    default_connect_result: bool,
    failure_state: SessionState,
    subscribe_result: bool,
    connect_calls: Vec<(String, String, String)>,
    subscribe_calls: Vec<(String, QoS)>,
    published: Vec<PublishedMessage>,
    inbound: VecDeque<(String, Vec<u8>)>,
    pump_calls: usize,
    connected: bool,
    state: SessionState,
}

impl Default for FakeSession {
    fn default() -> Self {
        Self {
            server: None,
            keep_alive: None,
            transport_is_tls: None,
            connect_results: VecDeque::new(),
            default_connect_result: true,
            failure_state: SessionState::ConnectFailed,
            subscribe_result: true,
            connect_calls: Vec::new(),
            subscribe_calls: Vec::new(),
            published: Vec::new(),
            inbound: VecDeque::new(),
            pump_calls: 0,
            connected: false,
            state: SessionState::Disconnected,
        }
    }
}

impl FakeSession {
    /// Session whose connects always succeed
    pub fn new() -> Self {
        Self::default()
    }

    /// Session whose connects always fail, as with an unreachable broker
    pub fn unreachable() -> Self {
        Self {
            default_connect_result: false,
            ..Default::default()
        }
    }

    /// Outcomes for the next connects; afterwards the default applies
    pub fn with_connect_results(mut self, results: impl IntoIterator<Item = bool>) -> Self {
        self.connect_results.extend(results);
        self
    }

    /// State reported after a failed connect (default: connect failed)
    pub fn with_failure_state(mut self, state: SessionState) -> Self {
        self.failure_state = state;
        self
    }

    pub fn with_subscribe_result(mut self, result: bool) -> Self {
        self.subscribe_result = result;
        self
    }

    /// Queue a message for delivery on the next pump
    pub fn inject_message(&mut self, topic: impl Into<String>, payload: impl Into<Vec<u8>>) {
        self.inbound.push_back((topic.into(), payload.into()));
    }

    /// Simulate the broker or network dropping an established session
    pub fn drop_connection(&mut self) {
        self.connected = false;
        self.state = SessionState::ConnectionLost;
    }

    pub fn server(&self) -> Option<(&str, u16)> {
        self.server.as_ref().map(|(host, port)| (host.as_str(), *port))
    }

    pub fn keep_alive(&self) -> Option<Duration> {
        self.keep_alive
    }

    pub fn transport_is_tls(&self) -> Option<bool> {
        self.transport_is_tls
    }

    pub fn connect_count(&self) -> usize {
        self.connect_calls.len()
    }

    /// `(client_id, username, password)` for every connect call
    pub fn connect_calls(&self) -> &[(String, String, String)] {
        &self.connect_calls
    }

    pub fn subscribe_calls(&self) -> &[(String, QoS)] {
        &self.subscribe_calls
    }

    pub fn published(&self) -> &[PublishedMessage] {
        &self.published
    }

    pub fn pump_calls(&self) -> usize {
        self.pump_calls
    }

    pub fn pending_inbound(&self) -> usize {
        self.inbound.len()
    }
}

impl MqttSession for FakeSession {
    fn set_server(&mut self, host: &str, port: u16) {
        self.server = Some((host.to_string(), port));
    }

    fn set_keep_alive(&mut self, keep_alive: Duration) {
        self.keep_alive = Some(keep_alive);
    }

    fn set_transport(&mut self, transport: Transport) {
        self.transport_is_tls = Some(matches!(transport, Transport::Tls(_)));
    }

    fn connect(&mut self, client_id: &str, username: &str, password: &str) -> bool {
        self.connect_calls.push((
            client_id.to_string(),
            username.to_string(),
            password.to_string(),
        ));

        let success = self
            .connect_results
            .pop_front()
            .unwrap_or(self.default_connect_result);
        self.connected = success;
        self.state = if success {
            SessionState::Connected
        } else {
            self.failure_state
        };
        success
    }

    fn subscribe(&mut self, topic: &str, qos: QoS) -> bool {
        self.subscribe_calls.push((topic.to_string(), qos));
        self.connected && self.subscribe_result
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> bool {
        if !self.connected {
            return false;
        }
        self.published
            .push((topic.to_string(), payload.to_vec(), retain));
        true
    }

    fn pump(&mut self, on_message: &mut dyn FnMut(&str, &[u8])) {
        self.pump_calls += 1;
        if !self.connected {
            return;
        }
        while let Some((topic, payload)) = self.inbound.pop_front() {
            on_message(&topic, &payload);
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn state(&self) -> SessionState {
        self.state
    }
}

/// Hand-driven clock; clones share the same time
#[derive(Debug, Clone, Default)]
pub struct ManualClock(Rc<Cell<u64>>);

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self(Rc::new(Cell::new(start_ms)))
    }

    pub fn advance(&self, by: Duration) {
        let by = u64::try_from(by.as_millis()).unwrap_or(u64::MAX);
        self.0.set(self.0.get().saturating_add(by));
    }

    pub fn set(&self, now_ms: u64) {
        self.0.set(now_ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.0.get()
    }
}
