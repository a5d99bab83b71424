//! TLS 1.2 AEAD record protection (RFC 5246 §6.2.3.3, RFC 5288, RFC 7905).
//!
//! GCM and CCM: `nonce = fixed_iv(4) || explicit(8)`, the explicit part is
//! the sequence number and travels in front of the ciphertext.
//! ChaCha20-Poly1305: `nonce = iv(12) XOR seq`, nothing explicit.
//! `aad = seq(8) || type(1) || version(2) || plaintext_length(2)`.

use super::encryption::{aead_for, xor_nonce};
use super::{ContentType, Record, MAX_PLAINTEXT_LENGTH, RECORD_VERSION};
use crate::crypt::traffic_keys::KeyMaterial;
use crate::crypt::CipherSuiteParams;
use mantis_crypto::aead::AeadKey;
use mantis_crypto::provider::Aead;
use mantis_types::TlsError;
use zeroize::Zeroizing;

pub struct Aead12Protection {
    aead: AeadKey,
    fixed_iv: Zeroizing<Vec<u8>>,
    explicit_len: usize,
    seq: u64,
}

fn additional_data(seq: u64, content_type: ContentType, len: usize) -> [u8; 13] {
    let mut aad = [0u8; 13];
    aad[..8].copy_from_slice(&seq.to_be_bytes());
    aad[8] = content_type as u8;
    aad[9..11].copy_from_slice(&RECORD_VERSION.to_be_bytes());
    aad[11..].copy_from_slice(&(len as u16).to_be_bytes());
    aad
}

impl Aead12Protection {
    pub fn new(params: &CipherSuiteParams, keys: &KeyMaterial) -> Result<Self, TlsError> {
        if keys.iv.len() != params.fixed_iv_len() {
            return Err(TlsError::InvalidKeyLength(keys.iv.len()));
        }
        Ok(Self {
            aead: aead_for(params, &keys.key)?,
            fixed_iv: Zeroizing::new(keys.iv.clone()),
            explicit_len: params.record_iv_len(),
            seq: 0,
        })
    }

    pub fn sequence_number(&self) -> u64 {
        self.seq
    }

    #[cfg(test)]
    pub(crate) fn set_sequence_number(&mut self, seq: u64) {
        self.seq = seq;
    }

    fn next_seq(&mut self) -> Result<u64, TlsError> {
        if self.seq == u64::MAX {
            return Err(TlsError::SeqExhausted);
        }
        let seq = self.seq;
        self.seq += 1;
        Ok(seq)
    }

    fn nonce(&self, explicit: &[u8], seq: u64) -> Vec<u8> {
        if self.explicit_len == 0 {
            xor_nonce(&self.fixed_iv, seq)
        } else {
            let mut n = self.fixed_iv.to_vec();
            n.extend_from_slice(explicit);
            n
        }
    }

    pub fn encrypt(&mut self, content_type: ContentType, plaintext: &[u8]) -> Result<Record, TlsError> {
        let seq = self.next_seq()?;
        let explicit = if self.explicit_len == 0 { Vec::new() } else { seq.to_be_bytes().to_vec() };
        let aad = additional_data(seq, content_type, plaintext.len());
        let sealed = self.aead.seal(&self.nonce(&explicit, seq), &aad, plaintext)?;

        let mut fragment = explicit;
        fragment.extend_from_slice(&sealed);
        Ok(Record {
            content_type,
            version: RECORD_VERSION,
            fragment,
        })
    }

    pub fn decrypt(&mut self, record: &Record) -> Result<(ContentType, Vec<u8>), TlsError> {
        let overhead = self.explicit_len + self.aead.tag_size();
        if record.fragment.len() < overhead {
            return Err(TlsError::DecryptError);
        }
        let plaintext_len = record.fragment.len() - overhead;
        if plaintext_len > MAX_PLAINTEXT_LENGTH {
            return Err(TlsError::RecordOverflow);
        }
        let seq = self.next_seq()?;
        let (explicit, sealed) = record.fragment.split_at(self.explicit_len);
        let aad = additional_data(seq, record.content_type, plaintext_len);
        let plaintext = self
            .aead
            .open(&self.nonce(explicit, seq), &aad, sealed)
            .map_err(|_| TlsError::DecryptError)?;
        Ok((record.content_type, plaintext))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CipherSuite;

    fn pair(suite: CipherSuite) -> (Aead12Protection, Aead12Protection) {
        let params = CipherSuiteParams::from_suite(suite).unwrap();
        let keys = KeyMaterial {
            key: vec![0x5A; params.key_len()],
            iv: vec![0xA5; params.fixed_iv_len()],
            mac_key: vec![],
        };
        (
            Aead12Protection::new(params, &keys).unwrap(),
            Aead12Protection::new(params, &keys).unwrap(),
        )
    }

    #[test]
    fn test_gcm_explicit_nonce_is_sequence() {
        let (mut w, mut r) = pair(CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256);
        w.encrypt(ContentType::ApplicationData, b"skip").unwrap();
        let _ = r.decrypt(&w.encrypt(ContentType::ApplicationData, b"").unwrap());
        let rec = w.encrypt(ContentType::ApplicationData, b"hello").unwrap();
        assert_eq!(rec.fragment[..8], 2u64.to_be_bytes());
        assert_eq!(rec.fragment.len(), 8 + 5 + 16);
        // reader is at seq 1, the record was sealed at seq 2
        assert_eq!(r.decrypt(&rec), Err(TlsError::DecryptError));
    }

    #[test]
    fn test_chacha_and_ccm_roundtrip() {
        for suite in [
            CipherSuite::TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256,
            CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_CCM,
            CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
        ] {
            let (mut w, mut r) = pair(suite);
            for msg in [&b""[..], b"a", &[7u8; 300]] {
                let rec = w.encrypt(ContentType::Handshake, msg).unwrap();
                assert_eq!(r.decrypt(&rec).unwrap(), (ContentType::Handshake, msg.to_vec()));
            }
        }
    }

    #[test]
    fn test_content_type_is_authenticated() {
        let (mut w, mut r) = pair(CipherSuite::TLS_RSA_WITH_AES_128_GCM_SHA256);
        let mut rec = w.encrypt(ContentType::Handshake, b"data").unwrap();
        rec.content_type = ContentType::ApplicationData;
        assert_eq!(r.decrypt(&rec), Err(TlsError::DecryptError));
    }

    #[test]
    fn test_short_fragment_and_exhaustion() {
        let (mut w, mut r) = pair(CipherSuite::TLS_DHE_RSA_WITH_AES_128_GCM_SHA256);
        let rec = Record {
            content_type: ContentType::ApplicationData,
            version: RECORD_VERSION,
            fragment: vec![0; 23],
        };
        assert_eq!(r.decrypt(&rec), Err(TlsError::DecryptError));
        w.set_sequence_number(u64::MAX);
        assert_eq!(
            w.encrypt(ContentType::ApplicationData, b"x").unwrap_err(),
            TlsError::SeqExhausted
        );
    }
}
