//! TLS transport built on rustls.
//!
//! The TLS handshake runs to completion inside [`TlsTransport::connect`] with
//! socket timeouts applied; afterwards the socket is switched to non-blocking
//! mode and records are pumped on demand.

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::{CertificateDer, ServerName};
use rustls::{ClientConfig, ClientConnection, RootCertStore};

use super::Transport;
use crate::error::{Error, Result};

/// Explicit TLS initialization: the trust anchors and client settings shared
/// by every `wss://` connection that uses it.
#[derive(Clone)]
pub struct TlsContext {
    config: Arc<ClientConfig>,
}

impl fmt::Debug for TlsContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsContext").finish_non_exhaustive()
    }
}

impl TlsContext {
    /// Trust the bundled Mozilla root set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TlsConfig`] if the client configuration cannot be built.
    pub fn with_webpki_roots() -> Result<Self> {
        let roots = RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        Self::from_root_store(roots)
    }

    /// Trust the certificates in a PEM bundle on disk, such as `cacert.pem`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TlsConfig`] if the file is unreadable, holds no
    /// certificates, or holds a certificate rustls rejects.
    pub fn from_ca_file(path: impl AsRef<Path>) -> Result<Self> {
        let certs = load_certs_from_file(path.as_ref())?;
        Self::from_certs(certs)
    }

    /// Trust the certificates in an in-memory PEM bundle.
    ///
    /// # Errors
    ///
    /// As for [`Self::from_ca_file`].
    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        let certs = read_certs(&mut BufReader::new(pem))?;
        Self::from_certs(certs)
    }

    /// Trust exactly the given root store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TlsConfig`] if the ring provider rejects the default
    /// protocol versions.
    pub fn from_root_store(roots: RootCertStore) -> Result<Self> {
        let config = ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::TlsConfig(e.to_string()))?
        .with_root_certificates(roots)
        .with_no_client_auth();
        Ok(Self::from_client_config(Arc::new(config)))
    }

    /// Use a fully custom rustls configuration.
    #[must_use]
    pub fn from_client_config(config: Arc<ClientConfig>) -> Self {
        Self { config }
    }

    fn from_certs(certs: Vec<CertificateDer<'static>>) -> Result<Self> {
        let mut roots = RootCertStore::empty();
        for cert in certs {
            roots
                .add(cert)
                .map_err(|e| Error::TlsConfig(format!("rejected CA certificate: {e}")))?;
        }
        Self::from_root_store(roots)
    }
}

fn read_certs(reader: &mut dyn io::BufRead) -> Result<Vec<CertificateDer<'static>>> {
    let certs = rustls_pemfile::certs(reader)
        .collect::<io::Result<Vec<_>>>()
        .map_err(|e| Error::TlsConfig(format!("malformed PEM: {e}")))?;
    if certs.is_empty() {
        return Err(Error::TlsConfig("no certificates found".into()));
    }
    Ok(certs)
}

/// Load every certificate from a PEM file.
///
/// # Errors
///
/// Returns [`Error::TlsConfig`] if the file cannot be read or holds no
/// certificates.
pub fn load_certs_from_file(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let file = File::open(path)
        .map_err(|e| Error::TlsConfig(format!("cannot open {}: {e}", path.display())))?;
    read_certs(&mut BufReader::new(file))
}

fn handshake_error(err: &io::Error) -> Error {
    if matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) {
        return Error::Tls("handshake timed out".into());
    }
    match err.get_ref().and_then(|inner| inner.downcast_ref::<rustls::Error>()) {
        Some(tls) => Error::Tls(tls.to_string()),
        None => Error::Tls(format!("handshake failed: {err}")),
    }
}

/// Non-blocking TLS client stream.
pub struct TlsTransport {
    conn: ClientConnection,
    sock: TcpStream,
    peer: Option<SocketAddr>,
    eof: bool,
    closed: bool,
}

impl fmt::Debug for TlsTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsTransport")
            .field("peer", &self.peer)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl TlsTransport {
    /// Run the TLS handshake for `host` over a connected, blocking `sock`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidDnsName`] for an unusable host, [`Error::Tls`] for
    /// handshake or certificate failures, including the timeout.
    pub fn connect(
        context: &TlsContext,
        host: &str,
        mut sock: TcpStream,
        timeout: Duration,
    ) -> Result<Self> {
        let server_name = ServerName::try_from(host.to_owned())
            .map_err(|_| Error::InvalidDnsName(host.to_owned()))?;
        let mut conn = ClientConnection::new(Arc::clone(&context.config), server_name)
            .map_err(|e| Error::Tls(e.to_string()))?;

        sock.set_read_timeout(Some(timeout))?;
        sock.set_write_timeout(Some(timeout))?;
        while conn.is_handshaking() {
            conn.complete_io(&mut sock).map_err(|e| handshake_error(&e))?;
        }
        sock.set_read_timeout(None)?;
        sock.set_write_timeout(None)?;
        sock.set_nonblocking(true)?;

        let peer = sock.peer_addr().ok();
        Ok(Self {
            conn,
            sock,
            peer,
            eof: false,
            closed: false,
        })
    }

    /// Push buffered TLS records to the socket until it would block.
    fn flush_records(&mut self) -> Result<()> {
        while self.conn.wants_write() {
            match self.conn.write_tls(&mut self.sock) {
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

impl Transport for TlsTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        loop {
            match self.conn.reader().read(buf) {
                Ok(0) => return Err(Error::ConnectionClosed),
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if self.eof {
                        return Err(Error::ConnectionClosed);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return Err(Error::ConnectionClosed);
                }
                Err(e) => return Err(e.into()),
            }

            match self.conn.read_tls(&mut self.sock) {
                Ok(0) => self.eof = true,
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    self.flush_records()?;
                    return Ok(0);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
            self.conn
                .process_new_packets()
                .map_err(|e| Error::Tls(e.to_string()))?;
            // Session tickets and alerts may need answering.
            self.flush_records()?;
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.flush_records()?;
        if self.conn.wants_write() {
            // The socket is full; take no more plaintext until it drains.
            return Ok(0);
        }
        let n = self.conn.writer().write(data)?;
        self.flush_records()?;
        Ok(n)
    }

    fn flush(&mut self) -> Result<()> {
        self.flush_records()
    }

    fn wants_write(&self) -> bool {
        self.conn.wants_write()
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.conn.send_close_notify();
            let _ = self.flush_records();
            let _ = self.sock.shutdown(Shutdown::Both);
        }
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }
}
