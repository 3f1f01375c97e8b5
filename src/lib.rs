//! # pollws - poll-driven WebSocket client engine
//!
//! `pollws` implements the client side of RFC 6455 over plaintext TCP or
//! TLS without an async runtime. A [`Connection`] never blocks after it is
//! opened: the caller queues messages, calls [`Connection::update`] from its
//! own loop and picks up received messages with [`Connection::recv`].
//!
//! ## Features
//!
//! - **Incremental frame codec** tolerating arbitrary read boundaries
//! - **Fragmentation** of outbound messages, including caller-streamed ones
//! - **Close handshake** with a bounded wait
//! - **Backpressure** through a send queue memory ceiling
//! - **TLS** via rustls with an explicit [`TlsContext`] (feature `tls-rustls`)
//! - **Structured errors** with a per-thread [`last_error`] report
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pollws::{Config, MessageKind};
//!
//! let mut conn = pollws::connect("ws://127.0.0.1:9001/", Config::default())?;
//! conn.send_text("Hello world!")?;
//!
//! conn.send_begin(MessageKind::Text)?;
//! for part in ["Multi", "Part", "Message"] {
//!     conn.send_append_str(part)?;
//! }
//! conn.send_finish()?;
//!
//! while !conn.is_closed() {
//!     conn.update()?;
//!     while let Some(message) = conn.recv() {
//!         println!("{message:?}");
//!     }
//!     std::thread::sleep(std::time::Duration::from_millis(10));
//! }
//! println!("{:?}", conn.stats());
//! # Ok::<(), pollws::Error>(())
//! ```

pub mod config;
pub mod connection;
pub mod endpoint;
pub mod error;
pub mod log;
pub mod message;
pub mod protocol;
pub mod report;
pub mod stats;
pub mod transport;

pub use config::{Config, Limits, Timeouts};
pub use connection::{CloseStatus, Connection, ConnectionState};
pub use endpoint::Endpoint;
pub use error::{Error, ErrorCategory, Result};
pub use log::{ConsoleSink, FileSink, LogSink, NoopSink, TracingSink};
pub use message::{CloseCode, CloseFrame, Message, MessageKind};
pub use protocol::{OpCode, WS_GUID, compute_accept_key};
pub use report::{ErrorReport, clear_last_error, last_error};
pub use stats::{DirectionStats, Stats};
pub use transport::Transport;
#[cfg(feature = "tls-rustls")]
pub use transport::TlsContext;

/// Open a connection; shorthand for [`Connection::connect`].
///
/// # Errors
///
/// See [`Connection::connect`].
pub fn connect(url: &str, config: Config) -> Result<Connection> {
    Connection::connect(url, config)
}
