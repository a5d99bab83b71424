//! TLS 1.2 CBC MAC-then-encrypt record protection (RFC 5246 §6.2.3.2).
//!
//! ```text
//! fragment = IV || E(plaintext || MAC || padding)
//! MAC      = HMAC(mac_key, seq(8) || type(1) || version(2) || length(2) || plaintext)
//! ```
//!
//! Padding and MAC are checked together without branching on secret data;
//! every failure is reported as `DecryptError`.

use super::{ContentType, Record, MAX_PLAINTEXT_LENGTH, RECORD_VERSION};
use crate::crypt::traffic_keys::KeyMaterial;
use crate::crypt::{BulkCipher, CipherSuiteParams};
use mantis_crypto::cipher::BlockCipherKey;
use mantis_crypto::hmac::Hmac;
use mantis_crypto::modes::cbc::{cbc_decrypt, cbc_encrypt};
use mantis_crypto::rand::random_bytes;
use mantis_types::TlsError;
use subtle::{ConditionallySelectable, ConstantTimeEq, ConstantTimeLess};
use zeroize::Zeroizing;

pub struct Cbc12Protection {
    cipher: BlockCipherKey,
    mac: Hmac,
    mac_len: usize,
    block_size: usize,
    seq: u64,
}

impl Cbc12Protection {
    pub fn new(params: &CipherSuiteParams, keys: &KeyMaterial) -> Result<Self, TlsError> {
        let (BulkCipher::Cbc(id), Some(mac_alg)) = (params.bulk, params.mac) else {
            return Err(TlsError::Internal(format!("{} is not a CBC suite", params.name)));
        };
        if keys.mac_key.len() != mac_alg.output_size() {
            return Err(TlsError::InvalidKeyLength(keys.mac_key.len()));
        }
        Ok(Self {
            cipher: BlockCipherKey::new(id, &keys.key)?,
            mac: Hmac::new(mac_alg, &keys.mac_key)?,
            mac_len: mac_alg.output_size(),
            block_size: id.block_size(),
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

    fn compute_mac(&mut self, seq: u64, content_type: ContentType, data: &[u8]) -> Result<Vec<u8>, TlsError> {
        self.mac.reset();
        self.mac.update(&seq.to_be_bytes())?;
        self.mac.update(&[content_type as u8])?;
        self.mac.update(&RECORD_VERSION.to_be_bytes())?;
        self.mac.update(&(data.len() as u16).to_be_bytes())?;
        self.mac.update(data)?;
        Ok(self.mac.finish()?)
    }

    pub fn encrypt(&mut self, content_type: ContentType, plaintext: &[u8]) -> Result<Record, TlsError> {
        let seq = self.next_seq()?;
        let mac = self.compute_mac(seq, content_type, plaintext)?;

        let body_len = plaintext.len() + self.mac_len;
        let pad = self.block_size - (body_len + 1) % self.block_size;
        let pad = if pad == self.block_size { 0 } else { pad };
        let mut body = Zeroizing::new(Vec::with_capacity(body_len + pad + 1));
        body.extend_from_slice(plaintext);
        body.extend_from_slice(&mac);
        body.resize(body_len + pad + 1, pad as u8);

        let iv = random_bytes(self.block_size)?;
        cbc_encrypt(&self.cipher, &iv, &mut body)?;

        let mut fragment = iv;
        fragment.extend_from_slice(&body);
        Ok(Record {
            content_type,
            version: RECORD_VERSION,
            fragment,
        })
    }

    pub fn decrypt(&mut self, record: &Record) -> Result<(ContentType, Vec<u8>), TlsError> {
        let bs = self.block_size;
        let frag = &record.fragment;
        let min_body = (self.mac_len + 1).div_ceil(bs) * bs;
        if frag.len() < bs + min_body || frag.len() % bs != 0 {
            return Err(TlsError::DecryptError);
        }
        if frag.len() - bs > MAX_PLAINTEXT_LENGTH + 2048 {
            return Err(TlsError::RecordOverflow);
        }
        let seq = self.next_seq()?;
        let (iv, ct) = frag.split_at(bs);
        let mut body = Zeroizing::new(ct.to_vec());
        cbc_decrypt(&self.cipher, iv, &mut body).map_err(|_| TlsError::DecryptError)?;

        let n = body.len();
        let pad = body[n - 1];
        // padding must leave room for the MAC
        let max_pad = (n - self.mac_len - 1).min(255) as u8;
        let mut good = !max_pad.ct_lt(&pad);

        // every padding byte equals `pad`; scan a fixed window
        let window = (max_pad as usize) + 1;
        for i in 1..=window {
            let j = (i - 1) as u8;
            let in_pad = j.ct_lt(&pad) | j.ct_eq(&pad);
            let matches = body[n - i].ct_eq(&pad);
            good &= !in_pad | matches;
        }

        // an invalid pad is treated as zero so the MAC runs over a plausible length
        let pad_len = u8::conditional_select(&0, &pad, good) as usize;
        let data_len = n - self.mac_len - pad_len - 1;
        let (data, rest) = body.split_at(data_len);
        let expected = self.compute_mac(seq, record.content_type, data)?;
        good &= expected.ct_eq(&rest[..self.mac_len]);

        // equalise HMAC compression work across padding lengths
        self.absorb_dummy(n - data_len)?;

        if !bool::from(good) {
            return Err(TlsError::DecryptError);
        }
        if data_len > MAX_PLAINTEXT_LENGTH {
            return Err(TlsError::RecordOverflow);
        }
        Ok((record.content_type, data.to_vec()))
    }

    fn absorb_dummy(&mut self, len: usize) -> Result<(), TlsError> {
        let dummy = [0u8; 256];
        self.mac.reset();
        self.mac.update(&dummy[..len.min(dummy.len())])?;
        self.mac.finish()?;
        Ok(())
    }
}
