//! Error types for the dynamic MQTT connection manager
//!
//! Errors only surface on the setup path (configuration loading and
//! [`ConnectionManager::initialize`](crate::ConnectionManager::initialize)).
//! Everything that goes wrong inside the tick loop is logged and retried.

use crate::config::ConfigError;
use crate::transport::tls::TlsError;
use thiserror::Error;

/// Main error type for connection manager setup
#[derive(Debug, Error)]
pub enum DynamicMqttError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("TLS error: {0}")]
    Tls(#[from] TlsError),

    #[error("Connection manager has not been configured with a broker")]
    NotConfigured,

    #[error("Connection manager is already initialized")]
    AlreadyInitialized,
}

/// Result type for connection manager setup operations
pub type DynamicMqttResult<T> = Result<T, DynamicMqttError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_converts() {
        let error: DynamicMqttError = ConfigError::InvalidPort.into();
        assert!(matches!(error, DynamicMqttError::Config(_)));
        assert!(error.to_string().starts_with("Configuration error"));
    }

    #[test]
    fn test_tls_error_converts() {
        let error: DynamicMqttError = TlsError::NoCertificates.into();
        assert!(matches!(error, DynamicMqttError::Tls(_)));
        assert!(error.to_string().contains("certificate"));
    }

    #[test]
    fn test_lifecycle_error_display() {
        assert_eq!(
            DynamicMqttError::AlreadyInitialized.to_string(),
            "Connection manager is already initialized"
        );
        assert!(DynamicMqttError::NotConfigured
            .to_string()
            .contains("not been configured"));
    }
}
