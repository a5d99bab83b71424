//! Handshake message reassembly over the record stream.
//!
//! Messages may span records or share one; the 4-byte header gives each
//! message's extent.

use super::HandshakeType;
use mantis_types::TlsError;

/// Upper bound on a single handshake message body.
pub const MAX_HANDSHAKE_MESSAGE: usize = 1 << 17;

#[derive(Debug, Default)]
pub struct HandshakeReassembler {
    buf: Vec<u8>,
}

impl HandshakeReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the plaintext of one handshake record.
    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Bytes of a partial message are buffered.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Next complete message (header included), or `None` when more
    /// records are needed.
    pub fn next_message(&mut self) -> Result<Option<(HandshakeType, Vec<u8>)>, TlsError> {
        if self.buf.len() < 4 {
            return Ok(None);
        }
        let msg_type = HandshakeType::from_u8(self.buf[0])
            .ok_or_else(|| TlsError::UnexpectedMessage(format!("handshake type {}", self.buf[0])))?;
        let len = (self.buf[1] as usize) << 16 | (self.buf[2] as usize) << 8 | self.buf[3] as usize;
        if len > MAX_HANDSHAKE_MESSAGE {
            return Err(TlsError::DecodeError(format!("handshake message of {len} bytes")));
        }
        if self.buf.len() < 4 + len {
            return Ok(None);
        }
        let rest = self.buf.split_off(4 + len);
        let msg = std::mem::replace(&mut self.buf, rest);
        Ok(Some((msg_type, msg)))
    }
}
