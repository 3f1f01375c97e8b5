//! Connection options: resource limits, timeouts and logging.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::log::{LogSink, TracingSink};
#[cfg(feature = "tls-rustls")]
use crate::transport::TlsContext;

/// Resource limits for a connection.
///
/// These bound the memory a misbehaving peer (or caller) can make the
/// engine hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum payload of a single inbound frame in bytes.
    ///
    /// Checked against the frame header, before any payload is buffered.
    ///
    /// Default: 16 MB
    pub max_frame_size: usize,

    /// Maximum size of a reassembled inbound message in bytes.
    ///
    /// Default: 64 MB
    pub max_message_size: usize,

    /// Maximum number of frames in a single inbound message.
    ///
    /// Default: 4096
    pub max_fragment_count: usize,

    /// Maximum size of the HTTP upgrade response in bytes.
    ///
    /// Default: 8 KB
    pub max_handshake_size: usize,

    /// Memory ceiling for queued outbound payload bytes.
    ///
    /// Default: 64 MB
    pub max_send_queue_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_frame_size: 16 * 1024 * 1024,
            max_message_size: 64 * 1024 * 1024,
            max_fragment_count: 4096,
            max_handshake_size: 8192,
            max_send_queue_size: 64 * 1024 * 1024,
        }
    }
}

impl Limits {
    /// Create new limits with custom values.
    #[must_use]
    pub const fn new(
        max_frame_size: usize,
        max_message_size: usize,
        max_fragment_count: usize,
        max_handshake_size: usize,
        max_send_queue_size: usize,
    ) -> Self {
        Self {
            max_frame_size,
            max_message_size,
            max_fragment_count,
            max_handshake_size,
            max_send_queue_size,
        }
    }

    /// Limits for small embedded targets.
    ///
    /// - Max frame: 64 KB
    /// - Max message: 256 KB
    /// - Max fragments: 16
    /// - Max handshake: 4 KB
    /// - Max send queue: 256 KB
    #[must_use]
    pub const fn embedded() -> Self {
        Self {
            max_frame_size: 64 * 1024,
            max_message_size: 256 * 1024,
            max_fragment_count: 16,
            max_handshake_size: 4096,
            max_send_queue_size: 256 * 1024,
        }
    }

    /// Validate that message size is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MessageTooLarge`](crate::Error::MessageTooLarge) if `size` exceeds the configured maximum.
    pub const fn check_message_size(&self, size: usize) -> Result<(), crate::Error> {
        if size > self.max_message_size {
            Err(crate::Error::MessageTooLarge {
                size,
                max: self.max_message_size,
            })
        } else {
            Ok(())
        }
    }

    /// Validate that a declared frame length is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FrameTooLarge`](crate::Error::FrameTooLarge) if `size` exceeds the configured maximum.
    pub const fn check_frame_size(&self, size: u64) -> Result<(), crate::Error> {
        if size > self.max_frame_size as u64 {
            Err(crate::Error::FrameTooLarge {
                size,
                max: self.max_frame_size,
            })
        } else {
            Ok(())
        }
    }

    /// Validate that fragment count is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TooManyFragments`](crate::Error::TooManyFragments) if `count` exceeds the configured maximum.
    pub const fn check_fragment_count(&self, count: usize) -> Result<(), crate::Error> {
        if count > self.max_fragment_count {
            Err(crate::Error::TooManyFragments {
                count,
                max: self.max_fragment_count,
            })
        } else {
            Ok(())
        }
    }

    /// Validate that handshake size is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HandshakeTooLarge`](crate::Error::HandshakeTooLarge) if `size` exceeds the configured maximum.
    pub const fn check_handshake_size(&self, size: usize) -> Result<(), crate::Error> {
        if size > self.max_handshake_size {
            Err(crate::Error::HandshakeTooLarge {
                size,
                max: self.max_handshake_size,
            })
        } else {
            Ok(())
        }
    }

    /// Validate that the send queue may grow to `size` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QueueFull`](crate::Error::QueueFull) if `size` exceeds the configured ceiling.
    pub const fn check_send_queue_size(&self, size: usize) -> Result<(), crate::Error> {
        if size > self.max_send_queue_size {
            Err(crate::Error::QueueFull {
                size,
                max: self.max_send_queue_size,
            })
        } else {
            Ok(())
        }
    }
}

/// Timeouts enforced by [`Connection::update`](crate::Connection::update).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeouts {
    /// TCP connect plus TLS handshake, performed inside `connect`.
    ///
    /// Default: 10 seconds
    pub connect: Duration,

    /// Time allowed for the server's HTTP upgrade response.
    ///
    /// Default: 10 seconds
    pub handshake: Duration,

    /// Time allowed for the peer to answer a close frame.
    ///
    /// Default: 5 seconds
    pub close: Duration,

    /// Interval between keepalive pings. `None` disables keepalive.
    ///
    /// Default: None
    pub ping_interval: Option<Duration>,

    /// Time allowed for a pong after a keepalive ping.
    ///
    /// Default: 10 seconds
    pub ping_timeout: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            handshake: Duration::from_secs(10),
            close: Duration::from_secs(5),
            ping_interval: None,
            ping_timeout: Duration::from_secs(10),
        }
    }
}

impl Timeouts {
    /// Create new timeouts with custom values; keepalive stays disabled.
    #[must_use]
    pub const fn new(connect: Duration, handshake: Duration, close: Duration) -> Self {
        Self {
            connect,
            handshake,
            close,
            ping_interval: None,
            ping_timeout: Duration::from_secs(10),
        }
    }

    /// Enable keepalive pings.
    #[must_use]
    pub const fn with_keepalive(mut self, interval: Duration, timeout: Duration) -> Self {
        self.ping_interval = Some(interval);
        self.ping_timeout = timeout;
        self
    }
}

/// Options for opening a connection.
#[derive(Clone)]
pub struct Config {
    /// Resource limits.
    pub limits: Limits,

    /// Timeout configuration.
    pub timeouts: Timeouts,

    /// Largest payload per outbound frame; longer messages are fragmented.
    ///
    /// Default: 64 KB
    pub fragment_size: usize,

    /// Bytes requested from the transport per read.
    ///
    /// Default: 16 KB
    pub read_buffer_size: usize,

    /// Subprotocols offered in `Sec-WebSocket-Protocol`.
    pub protocols: Vec<String>,

    /// Value for the `Origin` request header.
    pub origin: Option<String>,

    /// Extra request headers.
    pub headers: Vec<(String, String)>,

    /// Destination for connection log lines.
    ///
    /// Default: [`TracingSink`]
    pub log: Arc<dyn LogSink>,

    /// TLS context used for `wss://` URLs. Bundled web roots when `None`.
    #[cfg(feature = "tls-rustls")]
    pub tls: Option<TlsContext>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            timeouts: Timeouts::default(),
            fragment_size: 64 * 1024,
            read_buffer_size: 16 * 1024,
            protocols: Vec::new(),
            origin: None,
            headers: Vec::new(),
            log: Arc::new(TracingSink),
            #[cfg(feature = "tls-rustls")]
            tls: None,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("limits", &self.limits)
            .field("timeouts", &self.timeouts)
            .field("fragment_size", &self.fragment_size)
            .field("read_buffer_size", &self.read_buffer_size)
            .field("protocols", &self.protocols)
            .field("origin", &self.origin)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set custom limits.
    #[must_use]
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set custom timeouts.
    #[must_use]
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Set the close handshake timeout.
    #[must_use]
    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.close = timeout;
        self
    }

    /// Set the maximum inbound message size.
    ///
    /// Also lowers the frame limit when it would otherwise exceed the message
    /// limit.
    #[must_use]
    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.limits.max_message_size = size;
        self.limits.max_frame_size = self.limits.max_frame_size.min(size);
        self
    }

    /// Set the outbound fragment size (clamped to at least one byte).
    #[must_use]
    pub fn with_fragment_size(mut self, size: usize) -> Self {
        self.fragment_size = size.max(1);
        self
    }

    /// Set read buffer size (clamped to at least one byte).
    #[must_use]
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }

    /// Offer a subprotocol.
    #[must_use]
    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocols.push(protocol.into());
        self
    }

    /// Send an `Origin` header.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Add an extra request header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Route connection log lines to `sink`.
    #[must_use]
    pub fn with_log_sink(mut self, sink: impl LogSink + 'static) -> Self {
        self.log = Arc::new(sink);
        self
    }

    /// Use an explicit TLS context for `wss://` URLs.
    #[cfg(feature = "tls-rustls")]
    #[must_use]
    pub fn with_tls(mut self, tls: TlsContext) -> Self {
        self.tls = Some(tls);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_limits_default() {
        let limits = Limits::default();
        assert_eq!(limits.max_frame_size, 16 * 1024 * 1024);
        assert_eq!(limits.max_message_size, 64 * 1024 * 1024);
        assert_eq!(limits.max_fragment_count, 4096);
        assert_eq!(limits.max_handshake_size, 8192);
        assert_eq!(limits.max_send_queue_size, 64 * 1024 * 1024);
    }

    #[test]
    fn test_limits_embedded() {
        let limits = Limits::embedded();
        assert_eq!(limits.max_frame_size, 64 * 1024);
        assert_eq!(limits.max_fragment_count, 16);
        assert_eq!(limits.max_send_queue_size, 256 * 1024);
    }

    #[test]
    fn test_limits_checks() {
        let limits = Limits::default();
        assert!(limits.check_handshake_size(1024).is_ok());
        assert!(limits.check_handshake_size(10000).is_err());
        assert!(limits.check_message_size(1024).is_ok());
        assert!(limits.check_message_size(100 * 1024 * 1024).is_err());
        assert!(limits.check_frame_size(1024).is_ok());
        assert!(limits.check_frame_size(u64::MAX).is_err());
        assert!(limits.check_fragment_count(50).is_ok());
        assert!(limits.check_fragment_count(5000).is_err());
    }

    #[test]
    fn test_send_queue_ceiling() {
        let limits = Limits::new(1024, 1024, 4, 1024, 100);
        assert!(limits.check_send_queue_size(100).is_ok());
        assert_eq!(
            limits.check_send_queue_size(101),
            Err(Error::QueueFull { size: 101, max: 100 })
        );
    }

    #[test]
    fn test_timeouts_default() {
        let timeouts = Timeouts::default();
        assert_eq!(timeouts.connect, Duration::from_secs(10));
        assert_eq!(timeouts.handshake, Duration::from_secs(10));
        assert_eq!(timeouts.close, Duration::from_secs(5));
        assert!(timeouts.ping_interval.is_none());
    }

    #[test]
    fn test_timeouts_keepalive() {
        let timeouts = Timeouts::default()
            .with_keepalive(Duration::from_secs(30), Duration::from_secs(5));
        assert_eq!(timeouts.ping_interval, Some(Duration::from_secs(30)));
        assert_eq!(timeouts.ping_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_config_builder() {
        let config = Config::new()
            .with_limits(Limits::embedded())
            .with_fragment_size(4096)
            .with_close_timeout(Duration::from_millis(250))
            .with_protocol("chat")
            .with_origin("https://example.com")
            .with_header("X-Trace", "1");

        assert_eq!(config.fragment_size, 4096);
        assert_eq!(config.limits.max_frame_size, 64 * 1024);
        assert_eq!(config.timeouts.close, Duration::from_millis(250));
        assert_eq!(config.protocols, vec!["chat".to_string()]);
        assert_eq!(config.origin.as_deref(), Some("https://example.com"));
        assert_eq!(config.headers.len(), 1);
    }

    #[test]
    fn test_max_message_size_caps_frame_size() {
        let config = Config::new().with_max_message_size(1000);
        assert_eq!(config.limits.max_message_size, 1000);
        assert_eq!(config.limits.max_frame_size, 1000);
    }

    #[test]
    fn test_zero_sizes_are_clamped() {
        let config = Config::new().with_fragment_size(0).with_read_buffer_size(0);
        assert_eq!(config.fragment_size, 1);
        assert_eq!(config.read_buffer_size, 1);
    }

    #[test]
    fn test_config_debug_omits_sink() {
        let rendered = format!("{:?}", Config::default());
        assert!(rendered.starts_with("Config {"));
        assert!(rendered.contains("fragment_size"));
    }
}
