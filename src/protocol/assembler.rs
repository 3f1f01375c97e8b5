//! Reassembly of fragmented inbound messages.

use crate::config::Limits;
use crate::error::{Error, Result};
use crate::message::{Message, MessageKind};
use crate::protocol::utf8::Utf8Validator;
use crate::protocol::{Frame, OpCode};

/// Joins data frames into complete messages.
///
/// Control frames never reach the assembler; the connection handles them
/// between fragments.
#[derive(Debug)]
pub struct MessageAssembler {
    buffer: Vec<u8>,
    kind: Option<MessageKind>,
    fragment_count: usize,
    utf8: Utf8Validator,
    limits: Limits,
}

impl MessageAssembler {
    #[must_use]
    pub fn new(limits: Limits) -> Self {
        Self {
            buffer: Vec::new(),
            kind: None,
            fragment_count: 0,
            utf8: Utf8Validator::new(),
            limits,
        }
    }

    /// Add a data frame. Returns the message once its final frame arrives.
    ///
    /// # Errors
    ///
    /// - [`Error::ProtocolViolation`] for a continuation with no message in
    ///   progress, or a new Text/Binary frame while one is in progress
    /// - [`Error::TooManyFragments`] / [`Error::MessageTooLarge`] when limits are exceeded
    /// - [`Error::InvalidUtf8`] as soon as text content stops being valid UTF-8
    pub fn push(&mut self, frame: Frame) -> Result<Option<Message>> {
        debug_assert!(frame.opcode.is_data());

        let kind = match (frame.opcode, self.kind) {
            (OpCode::Continuation, Some(kind)) => kind,
            (OpCode::Continuation, None) => {
                return Err(Error::ProtocolViolation(
                    "Continuation frame without a message in progress".into(),
                ));
            }
            (_, Some(_)) => {
                return Err(Error::ProtocolViolation(format!(
                    "Expected continuation frame, got {}",
                    frame.opcode
                )));
            }
            (opcode, None) => {
                let kind = opcode.message_kind().ok_or_else(|| {
                    Error::ProtocolViolation(format!("{opcode} frame is not a data frame"))
                })?;
                self.kind = Some(kind);
                kind
            }
        };

        self.fragment_count += 1;
        self.limits.check_fragment_count(self.fragment_count)?;
        self.limits
            .check_message_size(self.buffer.len() + frame.payload().len())?;

        if kind == MessageKind::Text {
            self.utf8.feed(frame.payload(), frame.fin)?;
        }

        if !frame.fin {
            self.buffer.extend_from_slice(frame.payload());
            return Ok(None);
        }

        let payload = if self.buffer.is_empty() {
            frame.into_payload()
        } else {
            self.buffer.extend_from_slice(frame.payload());
            std::mem::take(&mut self.buffer)
        };
        self.reset();

        Ok(Some(match kind {
            MessageKind::Text => {
                Message::Text(String::from_utf8(payload).map_err(|_| Error::InvalidUtf8)?)
            }
            MessageKind::Binary => Message::Binary(payload),
        }))
    }

    /// Whether a fragmented message is in progress.
    #[must_use]
    pub fn is_assembling(&self) -> bool {
        self.kind.is_some()
    }

    /// Drop any partially assembled message.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.kind = None;
        self.fragment_count = 0;
        self.utf8.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assembler() -> MessageAssembler {
        MessageAssembler::new(Limits::default())
    }

    fn small() -> MessageAssembler {
        MessageAssembler::new(Limits::new(1024, 100, 3, 4096, 1024))
    }

    #[test]
    fn test_single_frame_message() {
        let mut assembler = assembler();
        let msg = assembler.push(Frame::text("Hello")).unwrap();
        assert_eq!(msg, Some(Message::text("Hello")));
        assert!(!assembler.is_assembling());
    }

    #[test]
    fn test_multi_part_message() {
        let mut assembler = assembler();
        assert!(assembler
            .push(Frame::new(false, OpCode::Text, b"Multi".to_vec()))
            .unwrap()
            .is_none());
        assert!(assembler.is_assembling());
        assert!(assembler
            .push(Frame::new(false, OpCode::Continuation, b"Part".to_vec()))
            .unwrap()
            .is_none());
        let msg = assembler
            .push(Frame::new(true, OpCode::Continuation, b"Message".to_vec()))
            .unwrap();
        assert_eq!(msg, Some(Message::text("MultiPartMessage")));
    }

    #[test]
    fn test_binary_fragments() {
        let mut assembler = assembler();
        assembler.push(Frame::new(false, OpCode::Binary, vec![1, 2])).unwrap();
        assembler.push(Frame::new(false, OpCode::Continuation, vec![])).unwrap();
        let msg = assembler
            .push(Frame::new(true, OpCode::Continuation, vec![0xFF]))
            .unwrap();
        assert_eq!(msg, Some(Message::binary(vec![1, 2, 0xFF])));
    }

    #[test]
    fn test_empty_message() {
        let mut assembler = assembler();
        assert_eq!(
            assembler.push(Frame::binary(Vec::new())).unwrap(),
            Some(Message::binary(Vec::new()))
        );
    }

    #[test]
    fn test_continuation_without_start_fails() {
        let mut assembler = assembler();
        let result = assembler.push(Frame::new(true, OpCode::Continuation, b"data".to_vec()));
        assert!(matches!(result, Err(Error::ProtocolViolation(_))));
    }

    #[test]
    fn test_new_message_while_assembling_fails() {
        let mut assembler = assembler();
        assembler.push(Frame::new(false, OpCode::Text, b"first".to_vec())).unwrap();
        let result = assembler.push(Frame::text("second"));
        assert!(matches!(result, Err(Error::ProtocolViolation(_))));
    }

    #[test]
    fn test_max_message_size_exceeded() {
        let mut assembler = small();
        assembler.push(Frame::new(false, OpCode::Binary, vec![0; 60])).unwrap();
        let result = assembler.push(Frame::new(true, OpCode::Continuation, vec![0; 41]));
        assert_eq!(result, Err(Error::MessageTooLarge { size: 101, max: 100 }));
    }

    #[test]
    fn test_max_fragment_count_exceeded() {
        let mut assembler = small();
        assembler.push(Frame::new(false, OpCode::Binary, vec![1])).unwrap();
        assembler.push(Frame::new(false, OpCode::Continuation, vec![2])).unwrap();
        assembler.push(Frame::new(false, OpCode::Continuation, vec![3])).unwrap();
        let result = assembler.push(Frame::new(true, OpCode::Continuation, vec![4]));
        assert_eq!(result, Err(Error::TooManyFragments { count: 4, max: 3 }));
    }

    #[test]
    fn test_utf8_split_across_fragments() {
        let mut assembler = assembler();
        assembler.push(Frame::new(false, OpCode::Text, vec![0xf0, 0x9f])).unwrap();
        let msg = assembler
            .push(Frame::new(true, OpCode::Continuation, vec![0x8e, 0x89]))
            .unwrap()
            .unwrap();
        assert_eq!(msg.as_text(), Some("🎉"));
    }

    #[test]
    fn test_invalid_utf8_detected_before_final_fragment() {
        let mut assembler = assembler();
        let result = assembler.push(Frame::new(false, OpCode::Text, vec![b'o', b'k', 0xFF]));
        assert_eq!(result, Err(Error::InvalidUtf8));
    }

    #[test]
    fn test_binary_skips_utf8_validation() {
        let mut assembler = assembler();
        let msg = assembler.push(Frame::binary(vec![0x80, 0x81, 0xff])).unwrap();
        assert_eq!(msg, Some(Message::binary(vec![0x80, 0x81, 0xff])));
    }

    #[test]
    fn test_reset_allows_fresh_message() {
        let mut assembler = assembler();
        assembler.push(Frame::new(false, OpCode::Text, b"partial".to_vec())).unwrap();
        assembler.reset();
        assert!(!assembler.is_assembling());
        assert_eq!(
            assembler.push(Frame::text("fresh")).unwrap(),
            Some(Message::text("fresh"))
        );
    }
}
