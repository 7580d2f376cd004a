//! TLS for store connections.
//!
//! `ssl_mode` follows PostgreSQL's `sslmode` names. Only the modes that make
//! sense for a one-shot loader are accepted: no `prefer`/`allow` fallback.

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tokio_postgres::config::SslMode as PgSslMode;
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{info, warn};

use crate::error::{GoodsError, Result};

/// How the loader secures its PostgreSQL connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SslMode {
    #[default]
    Disable,
    /// Encrypt, but accept any server certificate.
    Require,
    VerifyCa,
    VerifyFull,
}

impl SslMode {
    /// Parse an `ssl_mode` setting (case-insensitive; empty means disable).
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "" | "disable" => Ok(SslMode::Disable),
            "require" => Ok(SslMode::Require),
            "verify-ca" => Ok(SslMode::VerifyCa),
            "verify-full" => Ok(SslMode::VerifyFull),
            other => Err(GoodsError::Config(format!(
                "Invalid ssl_mode '{}'. Valid values: disable, require, verify-ca, verify-full",
                other
            ))),
        }
    }

    pub fn requires_tls(self) -> bool {
        self != SslMode::Disable
    }

    /// The matching tokio-postgres setting. TLS modes never fall back to plaintext.
    pub fn pg_ssl_mode(self) -> PgSslMode {
        if self.requires_tls() {
            PgSslMode::Require
        } else {
            PgSslMode::Disable
        }
    }

    /// Connector for deadpool-postgres, or None when TLS is disabled.
    pub fn connector(self) -> Option<MakeRustlsConnect> {
        match self {
            SslMode::Disable => None,
            SslMode::Require => {
                warn!(
                    "ssl_mode=require does not verify the server certificate; \
                     use verify-full to protect the database credentials"
                );
                Some(MakeRustlsConnect::new(unverified_client_config()))
            }
            SslMode::VerifyCa | SslMode::VerifyFull => {
                // rustls always checks the hostname, so verify-ca is as strict as verify-full.
                info!("TLS enabled with certificate verification ({:?})", self);
                let mut roots = RootCertStore::empty();
                roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
                let config = ClientConfig::builder()
                    .with_root_certificates(roots)
                    .with_no_client_auth();
                Some(MakeRustlsConnect::new(config))
            }
        }
    }
}

fn unverified_client_config() -> ClientConfig {
    let builder = ClientConfig::builder();
    let verifier = AcceptAnyServerCert {
        provider: builder.crypto_provider().clone(),
    };
    builder
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(verifier))
        .with_no_client_auth()
}

/// Skips the certificate chain check but still verifies handshake signatures.
#[derive(Debug)]
struct AcceptAnyServerCert {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
