//! TLS 1.3 record protection (RFC 8446 §5.2).
//!
//! ```text
//! TLSInnerPlaintext = content || type(1) || zeros
//! nonce             = iv XOR pad_left(seq, 12)
//! aad               = 0x17 || 0x0303 || length(2)
//! ```

use super::{ContentType, Record, MAX_PLAINTEXT_LENGTH, RECORD_VERSION};
use crate::crypt::traffic_keys::KeyMaterial;
use crate::crypt::{BulkCipher, CipherSuiteParams};
use mantis_crypto::aead::AeadKey;
use mantis_crypto::provider::Aead;
use mantis_types::TlsError;
use zeroize::Zeroizing;

/// Nonce for record `seq`: the static IV with the sequence number XORed
/// into its low eight bytes.
pub(crate) fn xor_nonce(iv: &[u8], seq: u64) -> Vec<u8> {
    let mut nonce = iv.to_vec();
    let off = nonce.len() - 8;
    for (n, s) in nonce[off..].iter_mut().zip(seq.to_be_bytes()) {
        *n ^= s;
    }
    nonce
}

pub(crate) fn aead_for(params: &CipherSuiteParams, key: &[u8]) -> Result<AeadKey, TlsError> {
    match params.bulk {
        BulkCipher::Aead(alg) => Ok(AeadKey::new(alg, key)?),
        BulkCipher::Cbc(_) => Err(TlsError::Internal(format!("{} is not an AEAD suite", params.name))),
    }
}

pub struct Tls13Protection {
    aead: AeadKey,
    iv: Zeroizing<Vec<u8>>,
    seq: u64,
}

impl Tls13Protection {
    pub fn new(params: &CipherSuiteParams, keys: &KeyMaterial) -> Result<Self, TlsError> {
        if keys.iv.len() != 12 {
            return Err(TlsError::InvalidKeyLength(keys.iv.len()));
        }
        Ok(Self {
            aead: aead_for(params, &keys.key)?,
            iv: Zeroizing::new(keys.iv.clone()),
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

    pub fn encrypt(&mut self, content_type: ContentType, plaintext: &[u8]) -> Result<Record, TlsError> {
        let seq = self.next_seq()?;
        let mut inner = Zeroizing::new(Vec::with_capacity(plaintext.len() + 1));
        inner.extend_from_slice(plaintext);
        inner.push(content_type as u8);

        let len = inner.len() + self.aead.tag_size();
        let aad = header(len);
        let fragment = self.aead.seal(&xor_nonce(&self.iv, seq), &aad, &inner)?;
        Ok(Record {
            content_type: ContentType::ApplicationData,
            version: RECORD_VERSION,
            fragment,
        })
    }

    pub fn decrypt(&mut self, record: &Record) -> Result<(ContentType, Vec<u8>), TlsError> {
        if record.content_type != ContentType::ApplicationData {
            return Err(TlsError::UnexpectedMessage(format!(
                "{:?} record after keys were installed",
                record.content_type
            )));
        }
        if record.fragment.len() < self.aead.tag_size() + 1 {
            return Err(TlsError::DecryptError);
        }
        let seq = self.next_seq()?;
        let aad = header(record.fragment.len());
        let mut inner = self
            .aead
            .open(&xor_nonce(&self.iv, seq), &aad, &record.fragment)
            .map_err(|_| TlsError::DecryptError)?;

        let type_pos = inner
            .iter()
            .rposition(|&b| b != 0)
            .ok_or_else(|| TlsError::UnexpectedMessage("record without content type".into()))?;
        let content_type = ContentType::from_u8(inner[type_pos])
            .ok_or_else(|| TlsError::UnexpectedMessage(format!("inner content type {}", inner[type_pos])))?;
        inner.truncate(type_pos);
        if inner.len() > MAX_PLAINTEXT_LENGTH {
            return Err(TlsError::RecordOverflow);
        }
        Ok((content_type, inner))
    }
}

fn header(len: usize) -> [u8; 5] {
    let l = (len as u16).to_be_bytes();
    [ContentType::ApplicationData as u8, 0x03, 0x03, l[0], l[1]]
}
