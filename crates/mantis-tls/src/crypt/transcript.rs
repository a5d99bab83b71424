//! Handshake transcript.
//!
//! Messages are buffered rather than hashed incrementally: a TLS 1.2
//! client learns the PRF hash only from ServerHello, and TLS 1.2
//! CertificateVerify signs the raw messages.

use mantis_crypto::hash::Hash;
use mantis_types::{HashAlgId, TlsError};

#[derive(Debug, Default, Clone)]
pub struct Transcript {
    messages: Vec<u8>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one complete handshake message, header included.
    pub fn update(&mut self, msg: &[u8]) {
        self.messages.extend_from_slice(msg);
    }

    /// Everything appended so far.
    pub fn messages(&self) -> &[u8] {
        &self.messages
    }

    /// Hash of the messages so far.
    pub fn hash(&self, alg: HashAlgId) -> Result<Vec<u8>, TlsError> {
        Ok(Hash::digest(alg, &self.messages)?)
    }

    /// Hash of the messages so far followed by `extra`, which is not
    /// recorded. Used for PSK binders over a truncated ClientHello.
    pub fn hash_with(&self, alg: HashAlgId, extra: &[u8]) -> Result<Vec<u8>, TlsError> {
        let mut h = Hash::new(alg);
        h.update(&self.messages)?;
        h.update(extra)?;
        Ok(h.finish()?)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::hex;

    #[test]
    fn test_empty_transcript_hash() {
        let t = Transcript::new();
        assert!(t.is_empty());
        assert_eq!(
            t.hash(HashAlgId::Sha256).unwrap(),
            hex("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
        );
    }

    #[test]
    fn test_incremental_matches_one_shot() {
        let mut t = Transcript::new();
        t.update(b"client hello");
        let partial = t.hash_with(HashAlgId::Sha384, b"server hello").unwrap();
        assert_eq!(t.len(), 12);
        t.update(b"server hello");
        assert_eq!(t.hash(HashAlgId::Sha384).unwrap(), partial);
        assert_eq!(
            partial,
            Hash::digest(HashAlgId::Sha384, b"client helloserver hello").unwrap()
        );
        assert_eq!(t.messages(), b"client helloserver hello");
    }
}
