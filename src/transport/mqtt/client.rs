//! Impure coordination for the MQTT connection manager
//!
//! [`ConnectionManager`] owns the session, the link observer, the clock and
//! the topic router. Each call to [`ConnectionManager::tick`] asks the pure
//! decision function in [`super::connection`] what to do, then performs that
//! one step against the session.

use super::connection::{next_action, ConnectionState, ConnectionStats, TickAction};
use super::message_handler::TopicRouter;
use crate::clock::Clock;
use crate::config::{BrokerConfig, TlsConfig};
use crate::credentials::Credentials;
use crate::error::{DynamicMqttError, DynamicMqttResult};
use crate::link::LinkStatus;
use crate::mqtt_span;
use crate::transport::tls::{apply_tls_config, backend_for, TlsMode};
use crate::transport::MqttSession;
use rumqttc::QoS;
use tracing::{debug, info, warn};

/// Keeps a single MQTT session alive over an intermittent link
pub struct ConnectionManager<S, L, C> {
    session: S,
    link: L,
    clock: C,
    broker: Option<BrokerConfig>,
    tls: TlsConfig,
    credentials: Credentials,
    router: TopicRouter,
    state: ConnectionState,
    last_attempt_ms: Option<u64>,
    tls_mode: Option<TlsMode>,
    stats: ConnectionStats,
}

impl<S, L, C> ConnectionManager<S, L, C>
where
    S: MqttSession,
    L: LinkStatus,
    C: Clock,
{
    pub fn new(session: S, link: L, clock: C) -> Self {
        Self {
            session,
            link,
            clock,
            broker: None,
            tls: TlsConfig::default(),
            credentials: Credentials::default(),
            router: TopicRouter::new(),
            state: ConnectionState::Disconnected,
            last_attempt_ms: None,
            tls_mode: None,
            stats: ConnectionStats::default(),
        }
    }

    /// Store broker, TLS and credential settings. No I/O happens here and
    /// credentials are not resolved.
    ///
    /// Only the broker address is checked (non-empty host, non-zero port);
    /// any keepalive is accepted.
    pub fn configure(
        &mut self,
        broker: BrokerConfig,
        tls: TlsConfig,
        credentials: Credentials,
    ) -> DynamicMqttResult<()> {
        if self.is_initialized() {
            return Err(DynamicMqttError::AlreadyInitialized);
        }
        broker.validate()?;

        self.broker = Some(broker);
        self.tls = tls;
        self.credentials = credentials;
        Ok(())
    }

    /// Bind `handler` to messages arriving on exactly `topic`
    ///
    /// Registrations made after a connect take effect on the broker at the
    /// next reconnect.
    pub fn register_subscription<F>(&mut self, topic: impl Into<String>, handler: F)
    where
        F: FnMut(&str, &str) + 'static,
    {
        let topic = topic.into();
        debug!(topic = %topic, "Registered subscription");
        self.router.register(topic, handler);
    }

    /// One-time transport setup: broker address, keepalive and TLS mode
    pub fn initialize(&mut self) -> DynamicMqttResult<TlsMode> {
        if self.is_initialized() {
            return Err(DynamicMqttError::AlreadyInitialized);
        }
        let broker = self.broker.as_ref().ok_or(DynamicMqttError::NotConfigured)?;

        self.session.set_server(&broker.host, broker.port);
        self.session.set_keep_alive(broker.keep_alive());

        let mut backend = backend_for(self.tls.backend);
        let mode = apply_tls_config(backend.as_mut(), &self.tls);
        self.session.set_transport(backend.transport());

        info!(
            host = %broker.host,
            port = broker.port,
            keepalive_secs = broker.keepalive_secs,
            tls_mode = ?mode,
            subscriptions = self.router.len(),
            "MQTT connection manager initialized"
        );

        self.tls_mode = Some(mode);
        Ok(mode)
    }

    /// Run one scheduler pass
    pub fn tick(&mut self) {
        if !self.is_initialized() {
            return;
        }

        let now = self.clock.now_ms();
        let action = next_action(
            self.link.is_connected(),
            self.state,
            self.session.is_connected(),
            self.last_attempt_ms,
            now,
        );

        match action {
            TickAction::LinkDown | TickAction::Wait => {}
            TickAction::Pump => self.pump_session(),
            TickAction::SessionLost => self.handle_session_lost(now),
            TickAction::Attempt => self.ensure_connected(now),
        }
    }

    /// Publish `payload` on `topic`; `false` when no session is established
    pub fn publish(&mut self, topic: &str, payload: impl AsRef<[u8]>, retain: bool) -> bool {
        if self.state != ConnectionState::Connected || !self.session.is_connected() {
            return false;
        }
        self.session.publish(topic, payload.as_ref(), retain)
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.tls_mode.is_some()
    }

    /// TLS mode chosen by [`initialize`](Self::initialize)
    pub fn tls_mode(&self) -> Option<TlsMode> {
        self.tls_mode
    }

    pub fn stats(&self) -> ConnectionStats {
        ConnectionStats {
            last_attempt_ms: self.last_attempt_ms,
            ..self.stats.clone()
        }
    }

    pub fn router(&self) -> &TopicRouter {
        &self.router
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    fn pump_session(&mut self) {
        let router = &mut self.router;
        let stats = &mut self.stats;
        self.session.pump(&mut |topic, payload| {
            let fired = router.dispatch(topic, payload);
            stats.messages_dispatched += fired as u64;
            debug!(topic, bytes = payload.len(), handlers = fired, "Message dispatched");
        });
    }

    fn handle_session_lost(&mut self, now: u64) {
        let state = self.session.state();
        warn!(state = %state, code = state.code(), "MQTT session lost");

        self.state = ConnectionState::Disconnected;
        self.last_attempt_ms = Some(now);
        self.stats.sessions_lost += 1;
    }

    fn ensure_connected(&mut self, now: u64) {
        self.last_attempt_ms = Some(now);

        let resolved = self.credentials.resolve();
        if !resolved.is_complete() {
            self.stats.credential_stalls += 1;
            warn!(
                client_id_present = !resolved.client_id.is_empty(),
                username_present = !resolved.username.is_empty(),
                password_present = !resolved.password.is_empty(),
                "MQTT credentials incomplete; not connecting"
            );
            return;
        }

        let Some(broker) = self.broker.as_ref() else {
            return;
        };
        let span = mqtt_span!(operation = "connect", host = %broker.host, port = broker.port);
        let _guard = span.enter();

        info!(
            host = %broker.host,
            port = broker.port,
            username = %resolved.username,
            "Connecting to MQTT broker"
        );

        self.state = ConnectionState::Connecting;
        self.stats.connect_attempts += 1;

        if self
            .session
            .connect(&resolved.client_id, &resolved.username, &resolved.password)
        {
            self.state = ConnectionState::Connected;
            self.stats.successful_connects += 1;
            info!(client_id = %resolved.client_id, "MQTT connected");
            self.subscribe_all();
        } else {
            self.state = ConnectionState::Disconnected;
            self.stats.connect_failures += 1;
            let state = self.session.state();
            warn!(state = %state, code = state.code(), "MQTT connect failed");
        }
    }

    fn subscribe_all(&mut self) {
        for topic in self.router.distinct_topics() {
            if self.session.subscribe(topic, QoS::AtLeastOnce) {
                info!(topic, "Subscribed");
            } else {
                self.stats.subscribe_failures += 1;
                warn!(topic, "Subscribe failed");
            }
        }
    }
}
