// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! TLS connections to the intake, built on rustls.
//!
//! With `verify_fqdn` on, the server chain is checked against the platform's
//! native root certificates and the configured host name. With it off, any
//! certificate is accepted. That mode exists for test and internal endpoints.

use crate::client::{Connection, Connector};
use crate::config::Config;
use crate::error::ConfigError;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, ClientConnection, DigitallySignedStruct, RootCertStore, SignatureScheme, StreamOwned};
use std::io::{self, ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub host: String,
    pub port: u16,
    pub verify_fqdn: bool,
    pub connect_timeout: Duration,
    pub write_timeout: Duration,
}

impl From<&Config> for TlsConfig {
    fn from(config: &Config) -> Self {
        Self {
            host: config.le_host.clone(),
            port: config.le_port,
            verify_fqdn: config.verify_fqdn,
            connect_timeout: config.connect_timeout,
            write_timeout: config.write_timeout,
        }
    }
}

/// Opens TLS-over-TCP connections to one intake endpoint.
#[derive(Debug, Clone)]
pub struct TlsConnector {
    config: TlsConfig,
    client_config: Arc<ClientConfig>,
    server_name: ServerName<'static>,
}

impl TlsConnector {
    pub fn new(config: TlsConfig) -> Result<Self, ConfigError> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let builder = ClientConfig::builder_with_provider(Arc::clone(&provider))
            .with_safe_default_protocol_versions()
            .map_err(|e| ConfigError::Tls(e.to_string()))?;

        let client_config = if config.verify_fqdn {
            builder
                .with_root_certificates(native_roots()?)
                .with_no_client_auth()
        } else {
            debug!("Certificate verification disabled for {}", config.host);
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate { provider }))
                .with_no_client_auth()
        };

        let server_name = ServerName::try_from(config.host.clone())
            .map_err(|e| ConfigError::Tls(format!("invalid host '{}': {e}", config.host)))?;

        Ok(Self {
            config,
            client_config: Arc::new(client_config),
            server_name,
        })
    }

    fn connect_tcp(&self) -> io::Result<TcpStream> {
        let mut last_error = None;
        for addr in (self.config.host.as_str(), self.config.port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, self.config.connect_timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    debug!("Failed to connect to {addr}: {e}");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| {
            io::Error::new(
                ErrorKind::NotFound,
                format!("{} did not resolve to any address", self.config.host),
            )
        }))
    }
}

impl Connector for TlsConnector {
    type Connection = TlsConnection;

    fn connect(&self) -> io::Result<TlsConnection> {
        let sock = self.connect_tcp()?;
        sock.set_nodelay(true)?;
        sock.set_write_timeout(Some(self.config.write_timeout))?;
        // the handshake reads too; bound it by the same timeout
        sock.set_read_timeout(Some(self.config.write_timeout))?;

        let conn = ClientConnection::new(Arc::clone(&self.client_config), self.server_name.clone())
            .map_err(|e| io::Error::new(ErrorKind::InvalidData, e))?;
        let mut stream = StreamOwned::new(conn, sock);
        while stream.conn.is_handshaking() {
            stream.conn.complete_io(&mut stream.sock)?;
        }

        debug!(
            "TLS session established with {} ({:?})",
            self.endpoint(),
            stream.conn.protocol_version()
        );
        Ok(TlsConnection { stream })
    }

    fn endpoint(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }
}

pub struct TlsConnection {
    stream: StreamOwned<ClientConnection, TcpStream>,
}

impl Write for TlsConnection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

impl Read for TlsConnection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Connection for TlsConnection {
    fn shutdown(&mut self) -> io::Result<()> {
        self.stream.conn.send_close_notify();
        while self.stream.conn.wants_write() {
            self.stream.conn.write_tls(&mut self.stream.sock)?;
        }
        self.stream.sock.shutdown(std::net::Shutdown::Both)
    }
}

fn native_roots() -> Result<RootCertStore, ConfigError> {
    let mut roots = RootCertStore::empty();
    let native_certs = rustls_native_certs::load_native_certs();
    for err in &native_certs.errors {
        debug!("Error while loading native certificates: {err}");
    }

    let mut valid_count = 0;
    for cert in native_certs.certs {
        match roots.add(cert) {
            Ok(()) => valid_count += 1,
            Err(err) => {
                debug!("Failed to parse certificate: {:?}", err);
            }
        }
    }
    if valid_count == 0 {
        return Err(ConfigError::Tls(
            "No valid certificates found in native root store".to_string(),
        ));
    }
    debug!("Loaded {valid_count} native root certificates");
    Ok(roots)
}

/// Accepts any server certificate while still checking handshake signatures.
#[derive(Debug)]
struct AcceptAnyCertificate {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyCertificate {
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
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
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
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
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
