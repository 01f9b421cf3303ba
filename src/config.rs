//! Configuration for the dynamic MQTT connection manager
//!
//! Loaded from a TOML file with the sections `[broker]`, `[tls]`,
//! `[credentials]`, `[runtime]` and any number of `[[on_message]]` entries.
//! Credentials stay unresolved here; they become [`DeferredString`] values
//! that are only evaluated when a connection is attempted.

use crate::credentials::{Credentials, DeferredString};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default MQTT-over-TLS port
pub const DEFAULT_PORT: u16 = 8883;
/// Default keepalive interval in seconds
pub const DEFAULT_KEEPALIVE_SECS: u16 = 30;
/// Accepted keepalive range in seconds
pub const KEEPALIVE_RANGE: std::ops::RangeInclusive<u16> = 10..=120;

/// Top-level configuration file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DynamicMqttConfig {
    pub broker: BrokerConfig,
    #[serde(default)]
    pub tls: TlsConfig,
    #[serde(default)]
    pub credentials: CredentialsSection,
    #[serde(default)]
    pub runtime: RuntimeSection,
    #[serde(default)]
    pub on_message: Vec<OnMessageConfig>,
}

/// Broker address and session keepalive
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BrokerConfig {
    /// Broker hostname or IP
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u16,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_keepalive_secs() -> u16 {
    DEFAULT_KEEPALIVE_SECS
}

impl BrokerConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            keepalive_secs: DEFAULT_KEEPALIVE_SECS,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_keepalive_secs(mut self, keepalive_secs: u16) -> Self {
        self.keepalive_secs = keepalive_secs;
        self
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(u64::from(self.keepalive_secs))
    }

    /// Check the address only: host non-empty, port non-zero
    ///
    /// The keepalive range is a configuration-file rule and is checked by
    /// [`DynamicMqttConfig::validate`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::InvalidBroker(
                "broker host must not be empty".to_string(),
            ));
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        Ok(())
    }
}

/// Which TLS backend implementation handles certificate trust
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TlsBackendKind {
    /// PEM string handed to the client library and parsed when connecting
    #[default]
    CaString,
    /// PEM parsed into a trust-anchor list during setup
    TrustAnchors,
}

/// Transport security settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TlsConfig {
    /// Skip certificate validation entirely
    #[serde(default)]
    pub insecure: bool,
    /// Inline CA certificate in PEM format
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<String>,
    /// Path to a CA certificate PEM file, read when the config is loaded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert_file: Option<PathBuf>,
    #[serde(default)]
    pub backend: TlsBackendKind,
}

impl TlsConfig {
    pub fn insecure() -> Self {
        Self {
            insecure: true,
            ..Default::default()
        }
    }

    pub fn with_ca_cert(ca_cert_pem: impl Into<String>) -> Self {
        Self {
            ca_cert: Some(ca_cert_pem.into()),
            ..Default::default()
        }
    }

    pub fn with_backend(mut self, backend: TlsBackendKind) -> Self {
        self.backend = backend;
        self
    }
}

/// Where a credential value comes from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum CredentialSource {
    /// Simple form: `username = "device"`
    Literal(String),
    /// Environment form: `username = { env = "MQTT_USER" }`
    Env { env: String },
}

impl CredentialSource {
    fn to_deferred(&self) -> DeferredString {
        match self {
            CredentialSource::Literal(value) => DeferredString::literal(value.clone()),
            CredentialSource::Env { env } => DeferredString::from_env(env.clone()),
        }
    }
}

/// Credentials section; missing values resolve to empty strings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CredentialsSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<CredentialSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<CredentialSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<CredentialSource>,
}

impl CredentialsSection {
    /// Build deferred credentials; nothing is read from the environment yet
    pub fn to_credentials(&self) -> Credentials {
        let deferred = |source: &Option<CredentialSource>| {
            source
                .as_ref()
                .map(CredentialSource::to_deferred)
                .unwrap_or_default()
        };
        Credentials::new(
            deferred(&self.client_id),
            deferred(&self.username),
            deferred(&self.password),
        )
    }
}

/// Host loop settings for the binary
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuntimeSection {
    /// Delay between scheduler passes in milliseconds (default: 16)
    #[serde(default = "default_loop_interval_ms")]
    pub loop_interval_ms: u64,
    /// Upper bound on a single blocking connect attempt (default: 5000)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_loop_interval_ms() -> u64 {
    16
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            loop_interval_ms: default_loop_interval_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl RuntimeSection {
    pub fn loop_interval(&self) -> Duration {
        Duration::from_millis(self.loop_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Level at which the binary logs messages received on a topic
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageLogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
}

/// A topic subscription declared in the configuration file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OnMessageConfig {
    pub topic: String,
    #[serde(default)]
    pub log_level: MessageLogLevel,
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Failed to read CA certificate file {path}: {source}")]
    CaCertRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid broker: {0}")]
    InvalidBroker(String),
    #[error("Broker port must be between 1 and 65535")]
    InvalidPort,
    #[error("Keepalive of {0}s is outside the accepted range of 10..=120 seconds")]
    KeepAliveOutOfRange(u16),
    #[error("Subscription #{0} has an empty topic")]
    EmptyTopic(usize),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl DynamicMqttConfig {
    /// Load configuration from a TOML file, reading `tls.ca_cert_file` if set
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;
        config.load_ca_cert_file()?;
        Ok(config)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: DynamicMqttConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.broker.validate()?;

        if !KEEPALIVE_RANGE.contains(&self.broker.keepalive_secs) {
            return Err(ConfigError::KeepAliveOutOfRange(self.broker.keepalive_secs));
        }

        if self.tls.ca_cert.is_some() && self.tls.ca_cert_file.is_some() {
            return Err(ConfigError::InvalidConfig(
                "tls.ca_cert and tls.ca_cert_file are mutually exclusive".to_string(),
            ));
        }

        if let Some(index) = self
            .on_message
            .iter()
            .position(|entry| entry.topic.is_empty())
        {
            return Err(ConfigError::EmptyTopic(index));
        }

        Ok(())
    }

    fn load_ca_cert_file(&mut self) -> Result<(), ConfigError> {
        if let Some(path) = self.tls.ca_cert_file.take() {
            let pem = std::fs::read_to_string(&path).map_err(|source| ConfigError::CaCertRead {
                path: path.clone(),
                source,
            })?;
            self.tls.ca_cert = Some(pem);
        }
        Ok(())
    }

    /// Copy of the configuration safe to print: literal passwords are masked
    /// and inline certificates are elided
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if let Some(CredentialSource::Literal(password)) = &mut copy.credentials.password {
            *password = "***".to_string();
        }
        if copy.tls.ca_cert.is_some() {
            copy.tls.ca_cert = Some("<PEM elided>".to_string());
        }
        copy
    }
}
