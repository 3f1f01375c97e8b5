//! Outbound frame scheduling and the inbound message queue.

use std::collections::VecDeque;

use bytes::{Buf, BytesMut};

use super::fragmenter::{FrameCursor, OutgoingMessage};
use crate::error::{Error, Result};
use crate::message::Message;
use crate::protocol::{Frame, FrameHeader, MaskGenerator, apply_mask};

/// What finished going out with the last byte of a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Written {
    /// The final frame of a data message with this many payload bytes.
    Message(usize),
    /// A ping or pong.
    Control,
    /// Our close frame.
    Close,
}

/// Frames waiting for the transport.
///
/// Control frames may be interleaved between the fragments of a data
/// message, but a frame is always written out completely before the next one
/// is encoded. Once a close frame is queued no further data is scheduled, and
/// once it has been encoded nothing follows it.
#[derive(Debug)]
pub struct SendQueue {
    control: VecDeque<Frame>,
    messages: VecDeque<OutgoingMessage>,
    current: Option<(OutgoingMessage, FrameCursor)>,
    close: Option<Frame>,
    sealed: bool,
    out: BytesMut,
    in_flight: Option<Written>,
    queued_bytes: usize,
    max_bytes: usize,
    fragment_size: usize,
    masks: MaskGenerator,
}

impl SendQueue {
    #[must_use]
    pub fn new(max_bytes: usize, fragment_size: usize) -> Self {
        Self {
            control: VecDeque::new(),
            messages: VecDeque::new(),
            current: None,
            close: None,
            sealed: false,
            out: BytesMut::new(),
            in_flight: None,
            queued_bytes: 0,
            max_bytes,
            fragment_size: fragment_size.max(1),
            masks: MaskGenerator::new(),
        }
    }

    /// Payload bytes of data messages not yet fully written.
    #[must_use]
    pub fn queued_bytes(&self) -> usize {
        self.queued_bytes
    }

    /// Fail with [`Error::QueueFull`] unless `extra` more bytes fit.
    pub fn check_room(&self, extra: usize) -> Result<()> {
        let size = self.queued_bytes.saturating_add(extra);
        if size > self.max_bytes {
            return Err(Error::QueueFull {
                size,
                max: self.max_bytes,
            });
        }
        Ok(())
    }

    /// Queue a data message.
    ///
    /// # Errors
    ///
    /// [`Error::QueueFull`] if the message would push the queue past its
    /// ceiling. Nothing is queued in that case.
    pub fn push_message(&mut self, message: OutgoingMessage) -> Result<()> {
        self.check_room(message.len())?;
        self.queued_bytes += message.len();
        self.messages.push_back(message);
        Ok(())
    }

    /// Queue a ping or pong ahead of pending data.
    pub fn push_control(&mut self, frame: Frame) {
        if !self.sealed && self.close.is_none() {
            self.control.push_back(frame);
        }
    }

    /// Queue our close frame. Messages that have not started going out are
    /// discarded; returns how many.
    pub fn push_close(&mut self, frame: Frame) -> usize {
        let dropped = self.messages.len();
        for message in self.messages.drain(..) {
            self.queued_bytes -= message.len();
        }
        self.control.clear();
        self.close = Some(frame);
        dropped
    }

    /// Anything left to write.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.out.is_empty()
            || (!self.sealed
                && (!self.control.is_empty()
                    || self.current.is_some()
                    || self.close.is_some()
                    || !self.messages.is_empty()))
    }

    /// The bytes to hand to the transport next.
    pub fn next_chunk(&mut self) -> Option<&[u8]> {
        if self.out.is_empty() {
            self.load_next();
        }
        (!self.out.is_empty()).then_some(&self.out[..])
    }

    /// Mark `n` bytes from [`Self::next_chunk`] as written. Reports what
    /// completed when the encoded frame has gone out entirely.
    pub fn consume(&mut self, n: usize) -> Option<Written> {
        self.out.advance(n.min(self.out.len()));
        if !self.out.is_empty() {
            return None;
        }
        let written = self.in_flight.take();
        if let Some(Written::Message(len)) = written {
            self.queued_bytes -= len;
        }
        written
    }

    /// Encode `frame` for an out-of-band write, bypassing the queue. Returns
    /// `None` while a frame is partly written, since anything written now
    /// would land inside it.
    pub fn encode_immediate(&mut self, frame: &Frame) -> Option<BytesMut> {
        if !self.out.is_empty() || self.sealed {
            return None;
        }
        let mut buf = BytesMut::with_capacity(frame.wire_size(true));
        frame.encode(&mut buf, Some(self.masks.next_key()));
        Some(buf)
    }

    /// Drop everything, including a partly written frame.
    pub fn clear(&mut self) {
        self.control.clear();
        self.messages.clear();
        self.current = None;
        self.close = None;
        self.out.clear();
        self.in_flight = None;
        self.queued_bytes = 0;
        self.sealed = true;
    }

    fn load_next(&mut self) {
        if self.sealed {
            return;
        }
        if let Some(frame) = self.control.pop_front() {
            frame.encode(&mut self.out, Some(self.masks.next_key()));
            self.in_flight = Some(Written::Control);
            return;
        }
        if self.current.is_none() {
            if let Some(close) = self.close.take() {
                close.encode(&mut self.out, Some(self.masks.next_key()));
                self.in_flight = Some(Written::Close);
                self.sealed = true;
                return;
            }
            self.current = self
                .messages
                .pop_front()
                .map(|message| (message, FrameCursor::default()));
        }

        let Some((message, cursor)) = &mut self.current else {
            return;
        };
        let Some(piece) = message.next_frame(cursor, self.fragment_size) else {
            self.current = None;
            return;
        };
        let key = self.masks.next_key();
        FrameHeader::encode(&mut self.out, piece.fin, piece.opcode, piece.payload.len(), Some(key));
        let start = self.out.len();
        self.out.extend_from_slice(piece.payload);
        apply_mask(&mut self.out[start..], key);

        if piece.fin {
            self.in_flight = Some(Written::Message(message.len()));
            self.current = None;
        }
    }
}

/// Complete messages waiting for [`Connection::recv`](super::Connection::recv).
#[derive(Debug, Default)]
pub struct RecvQueue {
    messages: VecDeque<Message>,
}

impl RecvQueue {
    pub fn push(&mut self, message: Message) {
        self.messages.push_back(message);
    }

    pub fn pop(&mut self) -> Option<Message> {
        self.messages.pop_front()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
