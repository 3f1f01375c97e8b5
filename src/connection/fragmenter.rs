//! Outbound messages and their split into frames.
//!
//! A message is stored as the chunks the caller supplied. Frames never span
//! chunks: each chunk is cut into frames of at most `fragment_size` bytes,
//! the first frame carries the message opcode, later ones are continuations
//! and only the last one has FIN set.

use crate::error::Result;
use crate::message::{Message, MessageKind};
use crate::protocol::{OpCode, Utf8Validator};

/// A complete message waiting in the send queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    kind: MessageKind,
    chunks: Vec<Vec<u8>>,
    len: usize,
}

impl OutgoingMessage {
    #[must_use]
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Total payload bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate over the frames of this message.
    #[must_use]
    pub fn frames(&self, fragment_size: usize) -> MessageFragmenter<'_> {
        MessageFragmenter {
            message: self,
            cursor: FrameCursor::default(),
            fragment_size,
        }
    }

    /// Produce the frame at `cursor` and advance it.
    pub fn next_frame(&self, cursor: &mut FrameCursor, fragment_size: usize) -> Option<FramePiece<'_>> {
        if cursor.done {
            return None;
        }
        let fragment_size = fragment_size.max(1);

        while cursor.chunk < self.chunks.len() && cursor.offset >= self.chunks[cursor.chunk].len() {
            cursor.chunk += 1;
            cursor.offset = 0;
        }

        let opcode = if cursor.started {
            OpCode::Continuation
        } else {
            OpCode::for_kind(self.kind)
        };
        cursor.started = true;

        let Some(data) = self.chunks.get(cursor.chunk) else {
            // Empty message: a single empty final frame.
            cursor.done = true;
            return Some(FramePiece {
                fin: true,
                opcode,
                payload: &[],
            });
        };

        let end = (cursor.offset + fragment_size).min(data.len());
        let payload = &data[cursor.offset..end];
        cursor.offset = end;

        let fin = end == data.len() && self.chunks[cursor.chunk + 1..].iter().all(Vec::is_empty);
        cursor.done = fin;
        Some(FramePiece {
            fin,
            opcode,
            payload,
        })
    }
}

impl From<Message> for OutgoingMessage {
    fn from(message: Message) -> Self {
        let kind = message.kind();
        let payload = message.into_payload();
        Self {
            kind,
            len: payload.len(),
            chunks: vec![payload],
        }
    }
}

/// Position inside an [`OutgoingMessage`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameCursor {
    chunk: usize,
    offset: usize,
    started: bool,
    done: bool,
}

/// One frame's worth of an outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramePiece<'a> {
    pub fin: bool,
    pub opcode: OpCode,
    pub payload: &'a [u8],
}

/// Iterator over the frames of an [`OutgoingMessage`].
#[derive(Debug)]
pub struct MessageFragmenter<'a> {
    message: &'a OutgoingMessage,
    cursor: FrameCursor,
    fragment_size: usize,
}

impl<'a> Iterator for MessageFragmenter<'a> {
    type Item = FramePiece<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.message.next_frame(&mut self.cursor, self.fragment_size)
    }
}

/// A message being streamed by the caller in pieces.
#[derive(Debug)]
pub struct MessageBuilder {
    kind: MessageKind,
    chunks: Vec<Vec<u8>>,
    len: usize,
    utf8: Option<Utf8Validator>,
}

impl MessageBuilder {
    #[must_use]
    pub fn new(kind: MessageKind) -> Self {
        Self {
            kind,
            chunks: Vec::new(),
            len: 0,
            utf8: (kind == MessageKind::Text).then(Utf8Validator::new),
        }
    }

    /// Bytes appended so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append a chunk.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidUtf8`] if a text message stops being valid UTF-8; the
    /// chunk is not appended.
    pub fn append(&mut self, data: &[u8]) -> Result<()> {
        if let Some(utf8) = &mut self.utf8 {
            // Validate on a copy so a rejected chunk leaves the state untouched.
            let mut trial = utf8.clone();
            trial.feed(data, false)?;
            *utf8 = trial;
        }
        if !data.is_empty() {
            self.chunks.push(data.to_vec());
            self.len += data.len();
        }
        Ok(())
    }

    /// Check that the message could be finished now, leaving the builder as is.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidUtf8`] if a text message ends inside a multi-byte sequence.
    pub fn check_complete(&self) -> Result<()> {
        match &self.utf8 {
            Some(utf8) => utf8.clone().feed(&[], true),
            None => Ok(()),
        }
    }

    /// Complete the message.
    ///
    /// # Errors
    ///
    /// As for [`Self::check_complete`].
    pub fn finish(self) -> Result<OutgoingMessage> {
        self.check_complete()?;
        Ok(OutgoingMessage {
            kind: self.kind,
            chunks: self.chunks,
            len: self.len,
        })
    }
}
