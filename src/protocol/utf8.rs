//! Incremental UTF-8 validation for text messages.
//!
//! Text messages may be split across frames at any byte, including inside a
//! multi-byte sequence. The validator carries at most three bytes of an
//! unfinished sequence from one fragment to the next.

use crate::error::{Error, Result};

/// Incremental UTF-8 validator.
#[derive(Debug, Clone, Default)]
pub struct Utf8Validator {
    pending: [u8; 4],
    pending_len: usize,
}

impl Utf8Validator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the next fragment of a text message.
    ///
    /// When `is_final` is false a truncated sequence at the end of `data` is
    /// held back for the next call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUtf8`] on any invalid sequence, or when the
    /// final fragment ends mid-sequence.
    pub fn feed(&mut self, mut data: &[u8], is_final: bool) -> Result<()> {
        if self.pending_len > 0 {
            let take = (4 - self.pending_len).min(data.len());
            let mut joint = self.pending;
            joint[self.pending_len..self.pending_len + take].copy_from_slice(&data[..take]);
            let joint_len = self.pending_len + take;

            match std::str::from_utf8(&joint[..joint_len]) {
                Ok(_) => data = &data[take..],
                Err(e) if e.valid_up_to() > 0 => data = &data[e.valid_up_to() - self.pending_len..],
                Err(e) if e.error_len().is_none() && !is_final => {
                    // Still short; `data` was entirely consumed.
                    self.pending = joint;
                    self.pending_len = joint_len;
                    return Ok(());
                }
                Err(_) => return Err(Error::InvalidUtf8),
            }
            self.pending_len = 0;
        }

        match std::str::from_utf8(data) {
            Ok(_) => Ok(()),
            Err(e) if e.error_len().is_none() && !is_final => {
                let tail = &data[e.valid_up_to()..];
                self.pending[..tail.len()].copy_from_slice(tail);
                self.pending_len = tail.len();
                Ok(())
            }
            Err(_) => Err(Error::InvalidUtf8),
        }
    }

    /// Discard any held-back bytes.
    pub fn reset(&mut self) {
        self.pending_len = 0;
    }

    /// Whether bytes of an unfinished sequence are held back.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending_len > 0
    }
}
