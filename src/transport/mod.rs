//! Byte-stream transports beneath the WebSocket engine.
//!
//! A [`Transport`] never blocks: reads return `Ok(0)` when nothing is
//! available and writes may accept fewer bytes than offered, including none.

use std::net::SocketAddr;

use crate::config::Config;
use crate::endpoint::Endpoint;
use crate::error::Result;

mod tcp;
#[cfg(feature = "tls-rustls")]
mod tls;

pub use tcp::TcpTransport;
#[cfg(feature = "tls-rustls")]
pub use tls::{TlsContext, TlsTransport, load_certs_from_file};

/// Non-blocking, bidirectional byte stream.
pub trait Transport: Send {
    /// Read whatever is available into `buf`.
    ///
    /// Returns `Ok(0)` when no bytes are ready.
    ///
    /// # Errors
    ///
    /// [`Error::ConnectionClosed`](crate::Error::ConnectionClosed) once the
    /// peer has closed the stream, or the underlying I/O or TLS error.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write as much of `data` as the stream accepts right now.
    ///
    /// # Errors
    ///
    /// The underlying I/O or TLS error.
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Push out bytes that [`write`](Self::write) accepted but the transport
    /// still holds, as far as the stream allows right now.
    ///
    /// # Errors
    ///
    /// The underlying I/O error.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// Whether accepted bytes are still held inside the transport.
    fn wants_write(&self) -> bool {
        false
    }

    /// Shut the stream down. Calling it again has no effect.
    fn close(&mut self);

    /// Address of the remote end, when known.
    fn peer_addr(&self) -> Option<SocketAddr> {
        None
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        (**self).write(data)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn wants_write(&self) -> bool {
        (**self).wants_write()
    }

    fn close(&mut self) {
        (**self).close();
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        (**self).peer_addr()
    }
}

/// Open the transport for `endpoint`: TCP, wrapped in TLS for `wss://`.
///
/// Connecting and the TLS handshake complete before this returns, bounded by
/// `config.timeouts.connect`; the returned stream is non-blocking.
///
/// # Errors
///
/// Transport-category errors for resolution or connect failures and
/// TLS-category errors for TLS setup or handshake failures.
pub fn open(endpoint: &Endpoint, config: &Config) -> Result<Box<dyn Transport>> {
    let stream = tcp::connect_stream(&endpoint.host, endpoint.port, config.timeouts.connect)?;
    if endpoint.secure {
        secure(endpoint, config, stream)
    } else {
        Ok(Box::new(TcpTransport::new(stream)?))
    }
}

#[cfg(feature = "tls-rustls")]
fn secure(
    endpoint: &Endpoint,
    config: &Config,
    stream: std::net::TcpStream,
) -> Result<Box<dyn Transport>> {
    let context = match &config.tls {
        Some(context) => context.clone(),
        None => TlsContext::with_webpki_roots()?,
    };
    let transport = TlsTransport::connect(&context, &endpoint.host, stream, config.timeouts.connect)?;
    Ok(Box::new(transport))
}

#[cfg(not(feature = "tls-rustls"))]
fn secure(
    _endpoint: &Endpoint,
    _config: &Config,
    _stream: std::net::TcpStream,
) -> Result<Box<dyn Transport>> {
    Err(crate::Error::TlsUnavailable)
}
