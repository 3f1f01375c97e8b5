//! Per-connection traffic counters.

/// Counters for one direction of traffic.
///
/// Only complete application messages are counted: control frames and
/// messages still being assembled or written do not contribute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectionStats {
    /// Messages fully sent or delivered.
    pub total_messages: u64,
    /// Payload bytes of those messages.
    pub total_bytes: u64,
}

impl DirectionStats {
    #[inline]
    pub(crate) fn record(&mut self, payload_len: usize) {
        self.total_messages += 1;
        self.total_bytes += payload_len as u64;
    }
}

/// Traffic counters for a connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// Outbound messages whose last byte reached the transport.
    pub send: DirectionStats,
    /// Inbound messages fully reassembled.
    pub recv: DirectionStats,
}
