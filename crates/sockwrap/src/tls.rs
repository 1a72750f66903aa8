#![forbid(unsafe_code)]

//! Blocking TLS on top of `std::net::TcpStream`.
//!
//! The handshake is driven to completion before a [`Stream`] is handed back,
//! so callers see either a ready encrypted stream or a construction error.

use std::fmt;
use std::io;
use std::net::TcpStream;
use std::ops::DerefMut;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{
    ClientConfig, ClientConnection, ConnectionCommon, RootCertStore, ServerConfig,
    ServerConnection, StreamOwned,
};

use crate::error::ConnError;
use crate::stream::Stream;

fn provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// Client-side TLS settings.
#[derive(Clone)]
pub struct TlsConfig {
    config: Arc<ClientConfig>,
}

impl TlsConfig {
    /// Verify servers against the platform's root certificates.
    pub fn client_default() -> Result<Self, ConnError> {
        let mut roots = RootCertStore::empty();
        for cert in rustls_native_certs::load_native_certs().map_err(ConnError::RootStore)? {
            // platform stores routinely carry a few certificates webpki rejects
            if let Err(e) = roots.add(cert) {
                tracing::debug!(error = %e, "skipping unusable platform root certificate");
            }
        }
        Self::with_roots(roots)
    }

    /// Verify servers against the CA certificates in a PEM bundle.
    pub fn client_with_ca_pem(ca_pem: &[u8]) -> Result<Self, ConnError> {
        let mut roots = RootCertStore::empty();
        for cert in rustls_pemfile::certs(&mut &ca_pem[..]) {
            roots.add(cert.map_err(ConnError::Pem)?)?;
        }
        if roots.is_empty() {
            return Err(ConnError::Pem(io::Error::new(
                io::ErrorKind::InvalidData,
                "no certificates found",
            )));
        }
        Self::with_roots(roots)
    }

    /// Accept any server certificate. Only for testing.
    pub fn client_insecure() -> Result<Self, ConnError> {
        let provider = provider();
        let config = ClientConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoVerifier(provider)))
            .with_no_client_auth();
        Ok(Self {
            config: Arc::new(config),
        })
    }

    fn with_roots(roots: RootCertStore) -> Result<Self, ConnError> {
        let config = ClientConfig::builder_with_provider(provider())
            .with_safe_default_protocol_versions()?
            .with_root_certificates(roots)
            .with_no_client_auth();
        Ok(Self {
            config: Arc::new(config),
        })
    }

    /// Run the client handshake over `tcp`, verifying the server as `server_name`.
    pub fn connect(&self, mut tcp: TcpStream, server_name: &str) -> Result<Stream, ConnError> {
        let name = ServerName::try_from(server_name.to_string())
            .map_err(|_| ConnError::InvalidServerName(server_name.to_string()))?;
        let mut conn = ClientConnection::new(self.config.clone(), name)?;
        handshake(&mut conn, &mut tcp).map_err(|source| ConnError::Handshake {
            server_name: server_name.to_string(),
            source,
        })?;
        tracing::debug!(server_name, "tls client handshake complete");
        Ok(Stream::TlsClient(Box::new(StreamOwned::new(conn, tcp))))
    }
}

impl fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsConfig").finish_non_exhaustive()
    }
}

/// Server-side TLS settings for accepted sockets.
#[derive(Clone)]
pub struct TlsAcceptor {
    config: Arc<ServerConfig>,
}

impl TlsAcceptor {
    /// Build from a PEM certificate chain and its PEM private key.
    pub fn from_pem(cert_pem: &[u8], key_pem: &[u8]) -> Result<Self, ConnError> {
        let certs = rustls_pemfile::certs(&mut &cert_pem[..])
            .collect::<Result<Vec<_>, _>>()
            .map_err(ConnError::Pem)?;
        let key = rustls_pemfile::private_key(&mut &key_pem[..])
            .map_err(ConnError::Pem)?
            .ok_or_else(|| {
                ConnError::Pem(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "no private key found",
                ))
            })?;
        let config = ServerConfig::builder_with_provider(provider())
            .with_safe_default_protocol_versions()?
            .with_no_client_auth()
            .with_single_cert(certs, key)?;
        Ok(Self {
            config: Arc::new(config),
        })
    }

    /// Run the server handshake over an accepted socket.
    pub fn accept(&self, mut tcp: TcpStream) -> Result<Stream, ConnError> {
        let peer = tcp
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown peer".to_string());
        let mut conn = ServerConnection::new(self.config.clone())?;
        handshake(&mut conn, &mut tcp).map_err(|source| ConnError::Handshake {
            server_name: peer.clone(),
            source,
        })?;
        tracing::debug!(%peer, "tls server handshake complete");
        Ok(Stream::TlsServer(Box::new(StreamOwned::new(conn, tcp))))
    }
}

impl fmt::Debug for TlsAcceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsAcceptor").finish_non_exhaustive()
    }
}

fn handshake<C, D>(conn: &mut C, tcp: &mut TcpStream) -> io::Result<()>
where
    C: DerefMut<Target = ConnectionCommon<D>>,
{
    while conn.is_handshaking() {
        conn.complete_io(tcp)?;
    }
    // our final flight (client Finished, session tickets) may still be queued
    if conn.wants_write() {
        conn.complete_io(tcp)?;
    }
    Ok(())
}

#[derive(Debug)]
struct NoVerifier(Arc<CryptoProvider>);

impl ServerCertVerifier for NoVerifier {
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
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
