//! Header checks for frames received from a server.
//!
//! Everything here runs on the header alone, so a hostile length never
//! causes the payload to be buffered.

use crate::config::Limits;
use crate::error::{Error, Result};
use crate::protocol::frame::{FrameHeader, MAX_CONTROL_FRAME_PAYLOAD};

/// Validator for inbound frame headers.
#[derive(Debug, Clone)]
pub struct FrameValidator {
    limits: Limits,
}

impl FrameValidator {
    #[must_use]
    pub fn new(limits: Limits) -> Self {
        Self { limits }
    }

    /// Check a header received from the server.
    ///
    /// # Errors
    ///
    /// - [`Error::MaskedServerFrame`] if the mask bit is set
    /// - [`Error::ReservedBitsSet`] if any RSV bit is set (no extensions are negotiated)
    /// - [`Error::FragmentedControlFrame`] for a control frame without FIN
    /// - [`Error::ControlFrameTooLarge`] for a control payload over 125 bytes
    /// - [`Error::FrameTooLarge`] if the declared length exceeds the frame limit
    pub fn validate(&self, header: &FrameHeader) -> Result<()> {
        if header.mask.is_some() {
            return Err(Error::MaskedServerFrame);
        }
        if header.rsv1 || header.rsv2 || header.rsv3 {
            return Err(Error::ReservedBitsSet);
        }
        if header.opcode.is_control() {
            if !header.fin {
                return Err(Error::FragmentedControlFrame);
            }
            if header.payload_len > MAX_CONTROL_FRAME_PAYLOAD as u64 {
                return Err(Error::ControlFrameTooLarge(
                    usize::try_from(header.payload_len).unwrap_or(usize::MAX),
                ));
            }
        }
        self.limits.check_frame_size(header.payload_len)
    }
}
