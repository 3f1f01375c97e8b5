//! Error types for the WebSocket client engine.
//!
//! Every failure the engine can report is a variant of [`Error`]. Each variant
//! belongs to exactly one [`ErrorCategory`], which decides whether the failure
//! tears the connection down.

use std::fmt;

use thiserror::Error;

use crate::connection::ConnectionState;
use crate::message::CloseCode;

/// Result type alias for WebSocket operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during WebSocket operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Socket-level I/O failure.
    #[error("I/O error: {message}")]
    Io {
        /// Raw OS error number, when the platform supplied one.
        code: Option<i32>,
        /// Human-readable description.
        message: String,
    },

    /// The URL could not be turned into a WebSocket endpoint.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Address resolution or TCP connect failed.
    #[error("Connect failed: {0}")]
    Connect(String),

    /// The peer closed the byte stream.
    #[error("Connection closed by peer")]
    ConnectionClosed,

    /// No pong arrived within the configured keepalive timeout.
    #[error("Ping timed out after {0:?}")]
    PingTimeout(std::time::Duration),

    /// TLS handshake or record-layer failure.
    #[error("TLS error: {0}")]
    Tls(String),

    /// TLS context could not be built (bad CA bundle, unreadable file).
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    /// Host name is not usable for certificate verification.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(String),

    /// `wss://` requested but the crate was built without TLS support.
    #[error("TLS support not compiled in")]
    TlsUnavailable,

    /// Malformed or non-conforming upgrade response.
    #[error("Invalid handshake: {0}")]
    InvalidHandshake(String),

    /// Server answered the upgrade with a non-101 status.
    #[error("Handshake rejected with HTTP status {status}")]
    HandshakeRejected {
        /// HTTP status code returned by the server.
        status: u16,
    },

    /// Upgrade response exceeded the configured size.
    #[error("Handshake too large: {size} bytes (max: {max})")]
    HandshakeTooLarge {
        /// Bytes received so far.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// No upgrade response arrived in time.
    #[error("Handshake timed out after {0:?}")]
    HandshakeTimeout(std::time::Duration),

    /// Invalid header value (contains CR/LF).
    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(String),

    /// Invalid frame structure or header.
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Protocol violation detected.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Invalid UTF-8 in text frame.
    #[error("Invalid UTF-8 in text frame")]
    InvalidUtf8,

    /// Frame size exceeds configured maximum.
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge {
        /// Actual frame size.
        size: u64,
        /// Maximum allowed size.
        max: usize,
    },

    /// Message size exceeds configured maximum.
    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge {
        /// Actual message size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Too many fragments in a single message.
    #[error("Too many fragments: {count} (max: {max})")]
    TooManyFragments {
        /// Actual fragment count.
        count: usize,
        /// Maximum allowed fragments.
        max: usize,
    },

    /// Peer sent a close frame with a code that may not appear on the wire.
    #[error("Invalid close code: {0}")]
    InvalidCloseCode(u16),

    /// Reserved opcode used.
    #[error("Reserved opcode: {0:#x}")]
    ReservedOpcode(u8),

    /// Invalid opcode value.
    #[error("Invalid opcode: {0:#x}")]
    InvalidOpcode(u8),

    /// Control frame fragmented (RFC violation).
    #[error("Control frames cannot be fragmented")]
    FragmentedControlFrame,

    /// Control frame payload too large (>125 bytes).
    #[error("Control frame payload too large: {0} bytes (max: 125)")]
    ControlFrameTooLarge(usize),

    /// Masked server frame (security violation).
    #[error("Server frame must not be masked")]
    MaskedServerFrame,

    /// Reserved bits set without extension.
    #[error("Reserved bits set without negotiated extension")]
    ReservedBitsSet,

    /// Incomplete frame data.
    #[error("Incomplete frame: need {needed} more bytes")]
    IncompleteFrame {
        /// Number of additional bytes needed.
        needed: usize,
    },

    /// Queuing the message would exceed the send-queue memory ceiling.
    #[error("Send queue full: {size} bytes queued would exceed {max}")]
    QueueFull {
        /// Bytes that would be queued after accepting the message.
        size: usize,
        /// Configured ceiling.
        max: usize,
    },

    /// Operation not allowed in the connection's current state.
    #[error("Cannot {operation} while connection is {state}")]
    InvalidState {
        /// The rejected operation.
        operation: &'static str,
        /// State at the time of the call.
        state: ConnectionState,
    },

    /// API misuse that does not depend on connection state.
    #[error("Invalid usage: {0}")]
    Usage(String),
}

/// Broad classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Socket, DNS, connect or peer-closed failures.
    Transport,
    /// TLS configuration, handshake or certificate failures.
    Tls,
    /// HTTP upgrade failures.
    Handshake,
    /// Frame, message or close-code violations by the peer.
    Protocol,
    /// Queue memory ceiling exceeded.
    Capacity,
    /// Operation attempted in a state that forbids it.
    State,
}

impl ErrorCategory {
    /// Returns `true` when errors of this category close the connection.
    #[must_use]
    #[inline]
    pub const fn is_fatal(self) -> bool {
        !matches!(self, ErrorCategory::Capacity | ErrorCategory::State)
    }

    /// Short lowercase name used in reports and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::Transport => "transport",
            ErrorCategory::Tls => "tls",
            ErrorCategory::Handshake => "handshake",
            ErrorCategory::Protocol => "protocol",
            ErrorCategory::Capacity => "capacity",
            ErrorCategory::State => "state",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Classify this error.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Error::Io { .. }
            | Error::InvalidUrl(_)
            | Error::Connect(_)
            | Error::ConnectionClosed
            | Error::PingTimeout(_) => ErrorCategory::Transport,

            Error::Tls(_) | Error::TlsConfig(_) | Error::InvalidDnsName(_) | Error::TlsUnavailable => {
                ErrorCategory::Tls
            }

            Error::InvalidHandshake(_)
            | Error::HandshakeRejected { .. }
            | Error::HandshakeTooLarge { .. }
            | Error::HandshakeTimeout(_)
            | Error::InvalidHeaderValue(_) => ErrorCategory::Handshake,

            Error::QueueFull { .. } => ErrorCategory::Capacity,

            Error::InvalidState { .. } | Error::Usage(_) => ErrorCategory::State,

            Error::InvalidFrame(_)
            | Error::ProtocolViolation(_)
            | Error::InvalidUtf8
            | Error::FrameTooLarge { .. }
            | Error::MessageTooLarge { .. }
            | Error::TooManyFragments { .. }
            | Error::InvalidCloseCode(_)
            | Error::ReservedOpcode(_)
            | Error::InvalidOpcode(_)
            | Error::FragmentedControlFrame
            | Error::ControlFrameTooLarge(_)
            | Error::MaskedServerFrame
            | Error::ReservedBitsSet
            | Error::IncompleteFrame { .. } => ErrorCategory::Protocol,
        }
    }

    /// Returns `true` if this error closes the connection.
    #[must_use]
    #[inline]
    pub const fn is_fatal(&self) -> bool {
        self.category().is_fatal()
    }

    /// Close code sent to the peer when this error aborts the connection.
    #[must_use]
    pub const fn close_code(&self) -> CloseCode {
        match self {
            Error::InvalidUtf8 => CloseCode::InvalidPayload,
            Error::FrameTooLarge { .. }
            | Error::MessageTooLarge { .. }
            | Error::TooManyFragments { .. } => CloseCode::MessageTooBig,
            _ => CloseCode::ProtocolError,
        }
    }

    /// Category-specific numeric detail.
    ///
    /// OS error number for I/O failures, HTTP status for rejected upgrades,
    /// the RFC 6455 close code for protocol errors and the offending size for
    /// capacity errors. Zero when nothing more specific applies.
    #[must_use]
    pub fn code(&self) -> i64 {
        match self {
            Error::Io { code, .. } => code.map_or(0, i64::from),
            Error::HandshakeRejected { status } => i64::from(*status),
            Error::HandshakeTooLarge { size, .. } | Error::QueueFull { size, .. } => {
                i64::try_from(*size).unwrap_or(i64::MAX)
            }
            _ if self.category() == ErrorCategory::Protocol => i64::from(self.close_code().as_u16()),
            _ => 0,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io {
            code: err.raw_os_error(),
            message: err.to_string(),
        }
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(_: std::str::Utf8Error) -> Self {
        Error::InvalidUtf8
    }
}
