//! TLS setup for the broker connection.

use std::path::Path;
use std::sync::Arc;

use rumqttc::tokio_rustls::rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use rumqttc::tokio_rustls::rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rumqttc::tokio_rustls::rustls::{self, ClientConfig, DigitallySignedStruct, SignatureScheme};
use rumqttc::TlsConfiguration;
use tracing::warn;

use crate::config::{ClientAuth, TlsMode};
use crate::error::{Result, TransportError};

/// Build the `rumqttc` TLS configuration for `mode`, or `None` for plain TCP.
pub fn tls_configuration(mode: &TlsMode) -> Result<Option<TlsConfiguration>> {
    match mode {
        TlsMode::Disabled => Ok(None),
        TlsMode::Verified {
            ca_cert,
            client_auth,
        } => {
            let ca = read_material(ca_cert)?;
            let client_auth = client_auth
                .as_ref()
                .map(|ClientAuth { cert, key }| -> Result<(Vec<u8>, Vec<u8>)> {
                    Ok((read_material(cert)?, read_material(key)?))
                })
                .transpose()?;
            Ok(Some(TlsConfiguration::Simple {
                ca,
                alpn: None,
                client_auth,
            }))
        }
        TlsMode::Insecure => {
            warn!("TLS certificate verification is disabled");
            Ok(Some(TlsConfiguration::Rustls(Arc::new(
                insecure_client_config(),
            ))))
        }
    }
}

fn read_material(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| TransportError::Tls {
        path: path.to_path_buf(),
        source,
    })
}

fn insecure_client_config() -> ClientConfig {
    ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert))
        .with_no_client_auth()
}

/// Accepts every server certificate and signature.
#[derive(Debug)]
struct AcceptAnyServerCert;

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
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
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
