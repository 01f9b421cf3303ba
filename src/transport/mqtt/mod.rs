//! MQTT connection management
//!
//! The module is split so the decision logic can be tested without I/O:
//!
//! - [`connection`] - Pure connection state, retry gate and per-tick decision
//! - [`message_handler`] - Pure exact-match topic routing
//! - [`client`] - The connection manager that applies those decisions
//! - [`session`] - `rumqttc` adapter for the [`MqttSession`](crate::transport::MqttSession) seam
//!
//! # Usage
//!
//! ```rust,no_run
//! use dynamic_mqtt::config::{BrokerConfig, TlsConfig};
//! use dynamic_mqtt::credentials::{Credentials, DeferredString};
//! use dynamic_mqtt::transport::mqtt::{ConnectionManager, RumqttSession};
//! use dynamic_mqtt::{AlwaysUp, MonotonicClock};
//! use std::time::Duration;
//!
//! let session = RumqttSession::new(Duration::from_secs(5));
//! let mut manager = ConnectionManager::new(session, AlwaysUp, MonotonicClock::new());
//! manager.configure(
//!     BrokerConfig::new("broker.example.com"),
//!     TlsConfig::insecure(),
//!     Credentials::new(
//!         DeferredString::literal("device-1"),
//!         DeferredString::from_env("MQTT_USERNAME"),
//!         DeferredString::from_env("MQTT_PASSWORD"),
//!     ),
//! )?;
//! manager.register_subscription("devices/device-1/cmd", |topic, payload| {
//!     println!("{topic}: {payload}");
//! });
//! manager.initialize()?;
//!
//! for _ in 0..1_000 {
//!     manager.tick();
//!     std::thread::sleep(Duration::from_millis(16));
//! }
//! # Ok::<(), dynamic_mqtt::DynamicMqttError>(())
//! ```

pub mod client;
pub mod connection;
pub mod message_handler;
pub mod session;

pub use client::ConnectionManager;
pub use connection::{
    next_action, retry_due, ConnectionState, ConnectionStats, TickAction, RETRY_INTERVAL,
};
pub use message_handler::{MessageHandler, Subscription, TopicRouter};
pub use session::RumqttSession;
