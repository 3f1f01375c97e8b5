//! The client connection state machine.
//!
//! ## Connection Lifecycle
//!
//! 1. **Connecting** - transport open, upgrade request in flight
//! 2. **Open** - messages flow both ways
//! 3. **ClosingLocal / ClosingRemote** - close frames being exchanged
//! 4. **Closed** - terminal, transport released
//!
//! All progress happens inside [`Connection::update`]; see its docs for the
//! order of work within one call.

#[allow(clippy::module_inception)]
mod connection;
mod fragmenter;
mod queue;
mod state;

pub use connection::Connection;
pub use fragmenter::{FramePiece, MessageBuilder, MessageFragmenter, OutgoingMessage};
pub use state::{CloseStatus, ConnectionState};
