//! Dynamic MQTT - TLS MQTT connection manager
//!
//! Keeps a single MQTT session alive over an intermittently available
//! network link, driven by a cooperative `tick()` from the host's main loop.
//!
//! # Overview
//!
//! - Fixed 5 second reconnect interval, measured from the previous attempt
//! - Credentials resolved at connect time; no attempt while any is empty
//! - TLS with either a pinned CA certificate or insecure mode
//! - QoS 1 subscriptions re-issued on every connect
//! - Exact-match topic routing to registered handlers
//!
//! # Quick Start
//!
//! ```rust
//! use dynamic_mqtt::config::{BrokerConfig, TlsConfig};
//! use dynamic_mqtt::credentials::{Credentials, DeferredString};
//! use dynamic_mqtt::testing::{FakeSession, ManualClock};
//! use dynamic_mqtt::{AlwaysUp, ConnectionManager, ConnectionState};
//!
//! let mut manager = ConnectionManager::new(FakeSession::new(), AlwaysUp, ManualClock::new(0));
//! manager.configure(
//!     BrokerConfig::new("broker.local"),
//!     TlsConfig::insecure(),
//!     Credentials::new(
//!         DeferredString::literal("device-1"),
//!         DeferredString::literal("user"),
//!         DeferredString::literal("secret"),
//!     ),
//! )?;
//! manager.register_subscription("devices/device-1/cmd", |_topic, _payload| {});
//! manager.initialize()?;
//!
//! manager.tick();
//! assert_eq!(manager.state(), ConnectionState::Connected);
//! assert!(manager.publish("devices/device-1/status", "online", true));
//! # Ok::<(), dynamic_mqtt::DynamicMqttError>(())
//! ```

pub mod clock;
pub mod config;
pub mod credentials;
pub mod error;
pub mod link;
pub mod observability;
pub mod testing;
pub mod transport;

pub use clock::{Clock, MonotonicClock};
pub use config::DynamicMqttConfig;
pub use credentials::{Credentials, DeferredString};
pub use error::{DynamicMqttError, DynamicMqttResult};
pub use link::{AlwaysUp, LinkFlag, LinkStatus};
pub use transport::mqtt::{ConnectionManager, ConnectionState, ConnectionStats, TopicRouter};
pub use transport::tls::{TlsBackend, TlsMode};
pub use transport::{MqttSession, SessionState};
