//! Application messages and close status codes (RFC 6455 Section 5.6, 7.4).

use crate::error::{Error, Result};

/// Maximum close reason length: a control payload holds 125 bytes, two of
/// which carry the status code.
pub const MAX_CLOSE_REASON: usize = 123;

/// WebSocket close status code per RFC 6455 Section 7.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum CloseCode {
    /// Normal closure (1000).
    #[default]
    Normal,
    /// Going away (1001).
    GoingAway,
    /// Protocol error (1002).
    ProtocolError,
    /// Unsupported data (1003).
    UnsupportedData,
    /// Invalid payload (1007), e.g. non-UTF-8 text.
    InvalidPayload,
    /// Policy violation (1008).
    PolicyViolation,
    /// Message too big (1009).
    MessageTooBig,
    /// Mandatory extension (1010).
    MandatoryExtension,
    /// Internal error (1011).
    InternalError,
    /// Any other code: 1012-1014 registered, 3000-4999 application defined.
    Other(u16),
}

impl CloseCode {
    /// Create a `CloseCode` from its numeric value.
    #[must_use]
    pub const fn from_u16(code: u16) -> Self {
        match code {
            1000 => CloseCode::Normal,
            1001 => CloseCode::GoingAway,
            1002 => CloseCode::ProtocolError,
            1003 => CloseCode::UnsupportedData,
            1007 => CloseCode::InvalidPayload,
            1008 => CloseCode::PolicyViolation,
            1009 => CloseCode::MessageTooBig,
            1010 => CloseCode::MandatoryExtension,
            1011 => CloseCode::InternalError,
            other => CloseCode::Other(other),
        }
    }

    /// Numeric value of this close code.
    #[must_use]
    pub const fn as_u16(&self) -> u16 {
        match self {
            CloseCode::Normal => 1000,
            CloseCode::GoingAway => 1001,
            CloseCode::ProtocolError => 1002,
            CloseCode::UnsupportedData => 1003,
            CloseCode::InvalidPayload => 1007,
            CloseCode::PolicyViolation => 1008,
            CloseCode::MessageTooBig => 1009,
            CloseCode::MandatoryExtension => 1010,
            CloseCode::InternalError => 1011,
            CloseCode::Other(code) => *code,
        }
    }

    /// Whether this code may appear in a close frame on the wire.
    ///
    /// Accepts 1000-1003, 1007-1014 and 3000-4999. Everything else, including
    /// the reserved 1004-1006 and 1015, is rejected.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self.as_u16(), 1000..=1003 | 1007..=1014 | 3000..=4999)
    }

    /// Whether this is one of the codes an endpoint must never send
    /// (1004, 1005, 1006, 1015).
    #[must_use]
    pub const fn is_reserved(&self) -> bool {
        matches!(self.as_u16(), 1004..=1006 | 1015)
    }
}

impl From<u16> for CloseCode {
    fn from(code: u16) -> Self {
        CloseCode::from_u16(code)
    }
}

/// Status code and reason carried by a close frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFrame {
    /// The close status code.
    pub code: CloseCode,
    /// Human-readable reason (UTF-8, at most 123 bytes).
    pub reason: String,
}

impl CloseFrame {
    /// Create a new close frame with the given code and reason.
    #[must_use]
    pub fn new(code: CloseCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Check that this close frame may be sent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Usage`] for a reserved or out-of-range code, or a
    /// reason longer than [`MAX_CLOSE_REASON`] bytes.
    pub fn check_outgoing(&self) -> Result<()> {
        if !self.code.is_valid() {
            return Err(Error::Usage(format!(
                "close code {} may not be sent",
                self.code.as_u16()
            )));
        }
        if self.reason.len() > MAX_CLOSE_REASON {
            return Err(Error::Usage(format!(
                "close reason is {} bytes (max: {MAX_CLOSE_REASON})",
                self.reason.len()
            )));
        }
        Ok(())
    }

    /// Encode as a close frame payload: big-endian code followed by the reason.
    #[must_use]
    pub fn to_payload(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(2 + self.reason.len());
        payload.extend_from_slice(&self.code.as_u16().to_be_bytes());
        payload.extend_from_slice(self.reason.as_bytes());
        payload
    }

    /// Decode a received close frame payload.
    ///
    /// An empty payload means the peer gave no status and yields `None`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidFrame`] for a one-byte payload
    /// - [`Error::InvalidCloseCode`] for a code that may not appear on the wire
    /// - [`Error::InvalidUtf8`] if the reason is not UTF-8
    pub fn from_payload(payload: &[u8]) -> Result<Option<Self>> {
        match payload {
            [] => Ok(None),
            [_] => Err(Error::InvalidFrame(
                "Close payload must be empty or at least 2 bytes".into(),
            )),
            [hi, lo, reason @ ..] => {
                let code = CloseCode::from_u16(u16::from_be_bytes([*hi, *lo]));
                if !code.is_valid() {
                    return Err(Error::InvalidCloseCode(code.as_u16()));
                }
                let reason = std::str::from_utf8(reason)?;
                Ok(Some(CloseFrame::new(code, reason)))
            }
        }
    }
}

/// Kind of a data message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// UTF-8 text.
    Text,
    /// Arbitrary bytes.
    Binary,
}

/// A complete application message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// A text message (UTF-8 encoded).
    Text(String),
    /// A binary message (arbitrary bytes).
    Binary(Vec<u8>),
}

impl Message {
    /// Create a text message.
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Message::Text(s.into())
    }

    /// Create a binary message.
    #[must_use]
    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Message::Binary(data.into())
    }

    /// The kind of this message.
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        match self {
            Message::Text(_) => MessageKind::Text,
            Message::Binary(_) => MessageKind::Binary,
        }
    }

    /// Returns `true` if this is a text message.
    #[must_use]
    pub const fn is_text(&self) -> bool {
        matches!(self, Message::Text(_))
    }

    /// Returns `true` if this is a binary message.
    #[must_use]
    pub const fn is_binary(&self) -> bool {
        matches!(self, Message::Binary(_))
    }

    /// Payload bytes regardless of kind.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        match self {
            Message::Text(s) => s.as_bytes(),
            Message::Binary(data) => data,
        }
    }

    /// Payload length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.payload().len()
    }

    /// Returns `true` if the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload().is_empty()
    }

    /// Consume and return the payload bytes.
    #[must_use]
    pub fn into_payload(self) -> Vec<u8> {
        match self {
            Message::Text(s) => s.into_bytes(),
            Message::Binary(data) => data,
        }
    }

    /// Consume and return the text content, if this is a text message.
    #[must_use]
    pub fn into_text(self) -> Option<String> {
        match self {
            Message::Text(s) => Some(s),
            Message::Binary(_) => None,
        }
    }

    /// Borrow the text content, if this is a text message.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Message::Text(s) => Some(s),
            Message::Binary(_) => None,
        }
    }

    /// Borrow the binary content, if this is a binary message.
    #[must_use]
    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            Message::Binary(data) => Some(data),
            Message::Text(_) => None,
        }
    }
}

impl From<String> for Message {
    fn from(s: String) -> Self {
        Message::Text(s)
    }
}

impl From<&str> for Message {
    fn from(s: &str) -> Self {
        Message::Text(s.to_owned())
    }
}

impl From<Vec<u8>> for Message {
    fn from(data: Vec<u8>) -> Self {
        Message::Binary(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_kind_and_payload() {
        let msg = Message::text("hello");
        assert_eq!(msg.kind(), MessageKind::Text);
        assert_eq!(msg.payload(), b"hello");
        assert_eq!(msg.len(), 5);

        let msg = Message::binary([1u8, 2, 3]);
        assert_eq!(msg.kind(), MessageKind::Binary);
        assert_eq!(msg.as_binary(), Some(&[1u8, 2, 3][..]));
        assert!(msg.as_text().is_none());
    }

    #[test]
    fn test_empty_message() {
        assert!(Message::text("").is_empty());
        assert_eq!(Message::binary(Vec::new()).into_payload(), Vec::<u8>::new());
    }

    #[test]
    fn test_close_code_roundtrip() {
        for code in [1000u16, 1001, 1002, 1003, 1007, 1008, 1009, 1010, 1011, 3000, 4999] {
            assert_eq!(CloseCode::from_u16(code).as_u16(), code);
        }
    }

    #[test]
    fn test_close_code_validity() {
        assert!(CloseCode::Normal.is_valid());
        assert!(CloseCode::Other(1012).is_valid());
        assert!(CloseCode::Other(4000).is_valid());
        for reserved in [1004u16, 1005, 1006, 1015] {
            let code = CloseCode::from_u16(reserved);
            assert!(code.is_reserved());
            assert!(!code.is_valid());
        }
        assert!(!CloseCode::Other(999).is_valid());
        assert!(!CloseCode::Other(2000).is_valid());
        assert!(!CloseCode::Other(5000).is_valid());
    }

    #[test]
    fn test_close_frame_payload() {
        let frame = CloseFrame::new(CloseCode::GoingAway, "bye");
        let payload = frame.to_payload();
        assert_eq!(payload, [0x03, 0xE9, b'b', b'y', b'e']);
        assert_eq!(CloseFrame::from_payload(&payload).unwrap(), Some(frame));
    }

    #[test]
    fn test_close_frame_empty_payload() {
        assert_eq!(CloseFrame::from_payload(&[]).unwrap(), None);
    }

    #[test]
    fn test_close_frame_one_byte_payload_rejected() {
        assert!(matches!(
            CloseFrame::from_payload(&[0x03]),
            Err(Error::InvalidFrame(_))
        ));
    }

    #[test]
    fn test_close_frame_reserved_code_rejected() {
        let payload = 1005u16.to_be_bytes();
        assert_eq!(
            CloseFrame::from_payload(&payload),
            Err(Error::InvalidCloseCode(1005))
        );
    }

    #[test]
    fn test_close_frame_invalid_reason_utf8() {
        assert_eq!(
            CloseFrame::from_payload(&[0x03, 0xE8, 0xFF]),
            Err(Error::InvalidUtf8)
        );
    }

    #[test]
    fn test_check_outgoing() {
        assert!(CloseFrame::new(CloseCode::Normal, "done").check_outgoing().is_ok());
        assert!(
            CloseFrame::new(CloseCode::Other(1006), "")
                .check_outgoing()
                .is_err()
        );
        let long = "x".repeat(MAX_CLOSE_REASON + 1);
        assert!(CloseFrame::new(CloseCode::Normal, long).check_outgoing().is_err());
        let max = "x".repeat(MAX_CLOSE_REASON);
        assert!(CloseFrame::new(CloseCode::Normal, max).check_outgoing().is_ok());
    }
}
