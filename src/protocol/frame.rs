//! Frame header parsing and frame serialization (RFC 6455 Section 5.2).
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
//! |N|V|V|V|       |S|             |   (if payload len==126/127)   |
//! | |1|2|3|       |K|             |                               |
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |                  Masking key (if MASK set)                    |
//! +---------------------------------------------------------------+
//! |                         Payload data                          |
//! +---------------------------------------------------------------+
//! ```

use bytes::{BufMut, BytesMut};

use crate::error::{Error, Result};
use crate::message::CloseFrame;
use crate::protocol::OpCode;
use crate::protocol::mask::apply_mask;

/// Maximum payload size for control frames.
pub const MAX_CONTROL_FRAME_PAYLOAD: usize = 125;

/// Longest possible header: 2 fixed bytes, 8 length bytes, 4 mask bytes.
pub const MAX_HEADER_LEN: usize = 14;

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub fin: bool,
    pub rsv1: bool,
    pub rsv2: bool,
    pub rsv3: bool,
    pub opcode: OpCode,
    pub mask: Option<[u8; 4]>,
    /// Declared payload length, exactly as it appeared on the wire.
    pub payload_len: u64,
    /// Bytes occupied by the header itself.
    pub header_len: usize,
}

impl FrameHeader {
    /// Parse a header from the front of `buf`.
    ///
    /// # Errors
    ///
    /// - [`Error::IncompleteFrame`] if `buf` does not yet hold the whole header
    /// - [`Error::ReservedOpcode`] for opcodes 0x3-0x7 and 0xB-0xF
    /// - [`Error::InvalidFrame`] if a 64-bit length has its top bit set
    pub fn parse(buf: &[u8]) -> Result<Self> {
        let [byte0, byte1, rest @ ..] = buf else {
            return Err(Error::IncompleteFrame {
                needed: 2 - buf.len(),
            });
        };

        let opcode = OpCode::from_u8(byte0 & 0x0F)?;
        let masked = byte1 & 0x80 != 0;

        let (payload_len, ext_len) = match byte1 & 0x7F {
            126 => match rest {
                [a, b, ..] => (u64::from(u16::from_be_bytes([*a, *b])), 2),
                _ => {
                    return Err(Error::IncompleteFrame {
                        needed: 4 - buf.len(),
                    });
                }
            },
            127 => {
                let Some(ext) = rest.first_chunk::<8>() else {
                    return Err(Error::IncompleteFrame {
                        needed: 10 - buf.len(),
                    });
                };
                let len = u64::from_be_bytes(*ext);
                if len & (1 << 63) != 0 {
                    return Err(Error::InvalidFrame(
                        "64-bit payload length has its most significant bit set".into(),
                    ));
                }
                (len, 8)
            }
            short => (u64::from(short), 0),
        };

        let header_len = 2 + ext_len + if masked { 4 } else { 0 };
        if buf.len() < header_len {
            return Err(Error::IncompleteFrame {
                needed: header_len - buf.len(),
            });
        }

        let mask = masked.then(|| {
            let at = 2 + ext_len;
            [buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]
        });

        Ok(Self {
            fin: byte0 & 0x80 != 0,
            rsv1: byte0 & 0x40 != 0,
            rsv2: byte0 & 0x20 != 0,
            rsv3: byte0 & 0x10 != 0,
            opcode,
            mask,
            payload_len,
            header_len,
        })
    }

    /// Write a header for a frame with no RSV bits set.
    pub fn encode(out: &mut BytesMut, fin: bool, opcode: OpCode, len: usize, mask: Option<[u8; 4]>) {
        let mut byte0 = opcode.as_u8();
        if fin {
            byte0 |= 0x80;
        }
        let mask_bit = if mask.is_some() { 0x80 } else { 0 };

        out.reserve(MAX_HEADER_LEN);
        out.put_u8(byte0);
        if len <= 125 {
            out.put_u8(mask_bit | len as u8);
        } else if let Ok(len) = u16::try_from(len) {
            out.put_u8(mask_bit | 126);
            out.put_u16(len);
        } else {
            out.put_u8(mask_bit | 127);
            out.put_u64(len as u64);
        }
        if let Some(key) = mask {
            out.put_slice(&key);
        }
    }
}

/// Bytes a frame with `payload_len` bytes of payload occupies on the wire.
#[must_use]
pub const fn wire_size(payload_len: usize, masked: bool) -> usize {
    let ext = if payload_len <= 125 {
        0
    } else if payload_len <= u16::MAX as usize {
        2
    } else {
        8
    };
    2 + ext + if masked { 4 } else { 0 } + payload_len
}

/// A complete frame with an unmasked payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Final fragment flag.
    pub fin: bool,
    pub opcode: OpCode,
    payload: Vec<u8>,
}

impl Frame {
    #[must_use]
    pub fn new(fin: bool, opcode: OpCode, payload: Vec<u8>) -> Self {
        Self {
            fin,
            opcode,
            payload,
        }
    }

    #[must_use]
    pub fn text(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Text, data.into())
    }

    #[must_use]
    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Binary, data.into())
    }

    /// Close frame; `None` produces an empty payload.
    #[must_use]
    pub fn close(close: Option<&CloseFrame>) -> Self {
        let payload = close.map(CloseFrame::to_payload).unwrap_or_default();
        Self::new(true, OpCode::Close, payload)
    }

    #[must_use]
    pub fn ping(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Ping, data.into())
    }

    #[must_use]
    pub fn pong(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Pong, data.into())
    }

    #[inline]
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    #[must_use]
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Parse one complete frame from `buf`, unmasking the payload if needed.
    ///
    /// Returns the frame and the number of bytes consumed. RSV bits are not
    /// checked here; see [`FrameValidator`](crate::protocol::FrameValidator).
    ///
    /// # Errors
    ///
    /// - [`Error::IncompleteFrame`] if the frame is not fully buffered
    /// - any error from [`FrameHeader::parse`]
    pub fn parse(buf: &[u8]) -> Result<(Self, usize)> {
        let header = FrameHeader::parse(buf)?;
        let payload_len = usize::try_from(header.payload_len).map_err(|_| Error::FrameTooLarge {
            size: header.payload_len,
            max: usize::MAX,
        })?;
        let total = header
            .header_len
            .checked_add(payload_len)
            .ok_or(Error::FrameTooLarge {
                size: header.payload_len,
                max: usize::MAX - header.header_len,
            })?;
        if buf.len() < total {
            return Err(Error::IncompleteFrame {
                needed: total - buf.len(),
            });
        }

        let mut payload = buf[header.header_len..total].to_vec();
        if let Some(key) = header.mask {
            apply_mask(&mut payload, key);
        }
        Ok((Self::new(header.fin, header.opcode, payload), total))
    }

    /// Append the wire encoding of this frame to `out`.
    ///
    /// Client frames must pass a mask key; the payload is masked in `out`,
    /// leaving `self` untouched.
    pub fn encode(&self, out: &mut BytesMut, mask: Option<[u8; 4]>) {
        FrameHeader::encode(out, self.fin, self.opcode, self.payload.len(), mask);
        let start = out.len();
        out.extend_from_slice(&self.payload);
        if let Some(key) = mask {
            apply_mask(&mut out[start..], key);
        }
    }

    /// Bytes this frame occupies on the wire.
    #[must_use]
    pub fn wire_size(&self, masked: bool) -> usize {
        wire_size(self.payload.len(), masked)
    }
}
