//! Incremental frame decoder.
//!
//! Bytes arrive from the transport in arbitrary pieces. The decoder buffers
//! them, validates each header as soon as it is complete and yields frames
//! once their payload has fully arrived.

use bytes::{Buf, BytesMut};

use crate::config::Limits;
use crate::error::{Error, Result};
use crate::protocol::frame::{Frame, FrameHeader};
use crate::protocol::mask::apply_mask;
use crate::protocol::validation::FrameValidator;

/// Stateful decoder for the server-to-client byte stream.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: BytesMut,
    header: Option<(FrameHeader, usize)>,
    validator: FrameValidator,
}

impl FrameDecoder {
    #[must_use]
    pub fn new(limits: Limits) -> Self {
        Self {
            buf: BytesMut::with_capacity(4096),
            header: None,
            validator: FrameValidator::new(limits),
        }
    }

    /// Append received bytes.
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Bytes received but not yet returned as frames.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Decode the next complete frame, if one is buffered.
    ///
    /// # Errors
    ///
    /// Any header error from [`FrameHeader::parse`] or
    /// [`FrameValidator::validate`]. The decoder is unusable afterwards.
    pub fn decode(&mut self) -> Result<Option<Frame>> {
        let (header, payload_len) = match self.header {
            Some(pending) => pending,
            None => match FrameHeader::parse(&self.buf) {
                Ok(header) => {
                    self.validator.validate(&header)?;
                    // Validation capped the length at the frame limit.
                    let payload_len = usize::try_from(header.payload_len).map_err(|_| {
                        Error::FrameTooLarge {
                            size: header.payload_len,
                            max: usize::MAX,
                        }
                    })?;
                    self.buf.advance(header.header_len);
                    self.header = Some((header, payload_len));
                    (header, payload_len)
                }
                Err(Error::IncompleteFrame { .. }) => return Ok(None),
                Err(e) => return Err(e),
            },
        };

        if self.buf.len() < payload_len {
            self.buf.reserve(payload_len - self.buf.len());
            return Ok(None);
        }

        let mut payload = self.buf.split_to(payload_len).to_vec();
        if let Some(key) = header.mask {
            apply_mask(&mut payload, key);
        }
        self.header = None;
        Ok(Some(Frame::new(header.fin, header.opcode, payload)))
    }
}
