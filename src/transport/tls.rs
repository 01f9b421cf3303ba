//! TLS backends for the MQTT transport
//!
//! Two interchangeable backends implement the same `set_insecure` /
//! `set_trust_root` contract:
//!
//! - [`TrustAnchorBackend`] parses the CA PEM into a trust-anchor list during
//!   setup, so malformed certificates are reported immediately.
//! - [`CaStringBackend`] keeps the PEM text and hands it to the client
//!   library, which parses it when a connection is made.
//!
//! Insecure mode always wins over a configured CA.

use crate::config::{TlsBackendKind, TlsConfig};
use rumqttc::tokio_rustls::rustls;
use rumqttc::{TlsConfiguration, Transport};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// TLS setup errors
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("Failed to read PEM data: {0}")]
    Pem(#[from] std::io::Error),
    #[error("No usable certificate found in CA PEM")]
    NoCertificates,
}

/// How certificate validation was resolved during setup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    /// Certificate validation bypassed
    Insecure,
    /// Broker certificate validated against the configured CA
    CaPinned,
    /// Validation enabled with no trusted roots; handshakes will fail
    NoTrustRoots,
}

/// Certificate trust configuration for the transport
pub trait TlsBackend {
    /// Short tag used in log lines
    fn name(&self) -> &'static str;

    /// Disable certificate chain validation
    fn set_insecure(&mut self);

    /// Trust the certificate(s) in `ca_pem`
    fn set_trust_root(&mut self, ca_pem: &str) -> Result<(), TlsError>;

    /// Transport reflecting the current trust configuration
    fn transport(&self) -> Transport;
}

/// Create the backend selected in configuration
pub fn backend_for(kind: TlsBackendKind) -> Box<dyn TlsBackend> {
    match kind {
        TlsBackendKind::CaString => Box::new(CaStringBackend::default()),
        TlsBackendKind::TrustAnchors => Box::new(TrustAnchorBackend::default()),
    }
}

/// Resolve the TLS mode from configuration and apply it to `backend`
///
/// A missing or unusable CA is only a warning: the failure surfaces later as
/// a connect error, which leaves room for late certificate provisioning.
pub fn apply_tls_config(backend: &mut dyn TlsBackend, config: &TlsConfig) -> TlsMode {
    let name = backend.name();

    if config.insecure {
        backend.set_insecure();
        warn!(backend = name, "TLS insecure mode enabled (no cert validation)");
        return TlsMode::Insecure;
    }

    match config.ca_cert.as_deref().filter(|pem| !pem.trim().is_empty()) {
        Some(pem) => match backend.set_trust_root(pem) {
            Ok(()) => {
                info!(backend = name, "TLS CA cert set");
                TlsMode::CaPinned
            }
            Err(error) => {
                warn!(backend = name, %error, "CA cert rejected; TLS validation may fail");
                TlsMode::NoTrustRoots
            }
        },
        None => {
            warn!(backend = name, "No CA cert provided; TLS validation may fail");
            TlsMode::NoTrustRoots
        }
    }
}

/// Backend that parses the CA into a trust-anchor list up front
#[derive(Debug, Clone, Default)]
pub struct TrustAnchorBackend {
    insecure: bool,
    anchors: Option<RootCertStore>,
}

impl TrustAnchorBackend {
    /// Number of trust anchors currently installed
    pub fn anchor_count(&self) -> usize {
        self.anchors.as_ref().map_or(0, RootCertStore::len)
    }
}

impl TlsBackend for TrustAnchorBackend {
    fn name(&self) -> &'static str {
        "trust-anchors"
    }

    fn set_insecure(&mut self) {
        self.insecure = true;
    }

    fn set_trust_root(&mut self, ca_pem: &str) -> Result<(), TlsError> {
        let certs = rustls_pemfile::certs(&mut ca_pem.as_bytes())
            .collect::<Result<Vec<CertificateDer<'static>>, _>>()?;

        let mut anchors = RootCertStore::empty();
        let (added, _ignored) = anchors.add_parsable_certificates(certs);
        if added == 0 {
            return Err(TlsError::NoCertificates);
        }

        self.anchors = Some(anchors);
        Ok(())
    }

    fn transport(&self) -> Transport {
        if self.insecure {
            return insecure_transport();
        }
        let roots = self.anchors.clone().unwrap_or_else(RootCertStore::empty);
        rustls_transport(roots)
    }
}

/// Backend that passes the CA text through to the client library
#[derive(Debug, Clone, Default)]
pub struct CaStringBackend {
    insecure: bool,
    ca_pem: Option<String>,
}

impl CaStringBackend {
    pub fn ca_pem(&self) -> Option<&str> {
        self.ca_pem.as_deref()
    }
}

impl TlsBackend for CaStringBackend {
    fn name(&self) -> &'static str {
        "ca-string"
    }

    fn set_insecure(&mut self) {
        self.insecure = true;
    }

    fn set_trust_root(&mut self, ca_pem: &str) -> Result<(), TlsError> {
        self.ca_pem = Some(ca_pem.to_string());
        Ok(())
    }

    fn transport(&self) -> Transport {
        if self.insecure {
            return insecure_transport();
        }
        match &self.ca_pem {
            Some(pem) => Transport::tls_with_config(TlsConfiguration::Simple {
                ca: pem.as_bytes().to_vec(),
                alpn: None,
                client_auth: None,
            }),
            None => rustls_transport(RootCertStore::empty()),
        }
    }
}

fn rustls_transport(roots: RootCertStore) -> Transport {
    let config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    Transport::tls_with_config(TlsConfiguration::Rustls(Arc::new(config)))
}

fn insecure_transport() -> Transport {
    let config = ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(NoCertificateVerification))
        .with_no_client_auth();
    Transport::tls_with_config(TlsConfiguration::Rustls(Arc::new(config)))
}

/// Accepts any server certificate
#[derive(Debug)]
struct NoCertificateVerification;

impl ServerCertVerifier for NoCertificateVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::ECDSA_NISTP521_SHA512,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ED25519,
        ]
    }
}
