//! Connection lifecycle states.

use std::fmt;

use crate::error::ErrorCategory;
use crate::message::CloseFrame;

/// Lifecycle state of a connection.
///
/// ```text
/// Connecting ──handshake ok──▶ Open ──local close──▶ ClosingLocal ──peer close──▶ Closed
///     │                          │                                                  ▲
///     │                          └──peer close──▶ ClosingRemote ──echo sent─────────┤
///     └──────────────────── failure, timeout or queue_close ────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// Transport open, upgrade handshake in progress.
    #[default]
    Connecting,
    /// Upgrade accepted; messages flow both ways.
    Open,
    /// We sent (or queued) a close frame and wait for the peer's.
    ClosingLocal,
    /// The peer sent a close frame; our reply is being written.
    ClosingRemote,
    /// Terminal. The transport has been released.
    Closed,
}

impl ConnectionState {
    /// Not yet closed.
    #[must_use]
    #[inline]
    pub const fn is_active(&self) -> bool {
        !matches!(self, ConnectionState::Closed)
    }

    /// Whether new messages may be queued.
    ///
    /// Messages queued while connecting are held until the upgrade succeeds.
    #[must_use]
    #[inline]
    pub const fn can_send(&self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Open)
    }

    /// Whether data frames from the peer are still accepted.
    #[must_use]
    #[inline]
    pub const fn can_receive(&self) -> bool {
        matches!(self, ConnectionState::Open | ConnectionState::ClosingLocal)
    }

    /// Either closing state.
    #[must_use]
    #[inline]
    pub const fn is_closing(&self) -> bool {
        matches!(
            self,
            ConnectionState::ClosingLocal | ConnectionState::ClosingRemote
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::ClosingLocal => "closing (local)",
            ConnectionState::ClosingRemote => "closing (remote)",
            ConnectionState::Closed => "closed",
        })
    }
}

/// How a closed connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseStatus {
    /// Both close frames were exchanged. Carries the peer's close frame, if
    /// it had a status code.
    Clean(Option<CloseFrame>),
    /// The peer did not complete the close handshake in time.
    TimedOut,
    /// Closed locally before the upgrade completed.
    Aborted,
    /// A fatal error tore the connection down.
    Failed(ErrorCategory),
}

impl CloseStatus {
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        matches!(self, CloseStatus::Clean(_))
    }
}
