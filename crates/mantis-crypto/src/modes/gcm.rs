//! GCM (Galois/Counter Mode), NIST SP 800-38D.
//!
//! GHASH multiplies bit by bit with masks instead of using a lookup table, so
//! its timing does not depend on the hash key or the data.

use crate::provider::BlockCipher;
use mantis_types::CryptoError;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, Zeroizing};

pub const GCM_TAG_SIZE: usize = 16;
pub const GCM_NONCE_SIZE: usize = 12;

const R: u128 = 0xE1 << 120;

fn gf_mul(x: u128, h: u128) -> u128 {
    let mut z = 0u128;
    let mut v = h;
    for i in (0..128).rev() {
        let bit = (x >> i) & 1;
        z ^= v & bit.wrapping_neg();
        let lsb = v & 1;
        v = (v >> 1) ^ (R & lsb.wrapping_neg());
    }
    z
}

/// Streaming GHASH. [`Ghash::pad`] closes a segment (AAD or ciphertext)
/// by zero-filling its last partial block.
pub(crate) struct Ghash {
    h: u128,
    acc: u128,
    buf: [u8; 16],
    buf_len: usize,
}

impl Drop for Ghash {
    fn drop(&mut self) {
        self.h.zeroize();
        self.acc.zeroize();
        self.buf.zeroize();
    }
}

impl Ghash {
    pub(crate) fn new(h: &[u8; 16]) -> Self {
        Ghash {
            h: u128::from_be_bytes(*h),
            acc: 0,
            buf: [0; 16],
            buf_len: 0,
        }
    }

    fn absorb(&mut self, block: &[u8; 16]) {
        self.acc = gf_mul(self.acc ^ u128::from_be_bytes(*block), self.h);
    }

    pub(crate) fn update(&mut self, mut data: &[u8]) {
        if self.buf_len > 0 {
            let take = (16 - self.buf_len).min(data.len());
            self.buf[self.buf_len..self.buf_len + take].copy_from_slice(&data[..take]);
            self.buf_len += take;
            data = &data[take..];
            if self.buf_len < 16 {
                return;
            }
            let b = self.buf;
            self.absorb(&b);
            self.buf_len = 0;
        }
        let mut chunks = data.chunks_exact(16);
        for c in &mut chunks {
            let mut b = [0u8; 16];
            b.copy_from_slice(c);
            self.absorb(&b);
        }
        let rest = chunks.remainder();
        self.buf[..rest.len()].copy_from_slice(rest);
        self.buf_len = rest.len();
    }

    pub(crate) fn pad(&mut self) {
        if self.buf_len > 0 {
            let mut b = [0u8; 16];
            b[..self.buf_len].copy_from_slice(&self.buf[..self.buf_len]);
            self.absorb(&b);
            self.buf_len = 0;
        }
    }

    /// Absorb the length block (bit lengths of both segments) and return the
    /// hash.
    pub(crate) fn finish(mut self, aad_len: usize, ct_len: usize) -> [u8; 16] {
        self.pad();
        let mut lens = [0u8; 16];
        lens[..8].copy_from_slice(&((aad_len as u64) * 8).to_be_bytes());
        lens[8..].copy_from_slice(&((ct_len as u64) * 8).to_be_bytes());
        self.absorb(&lens);
        self.acc.to_be_bytes()
    }
}

/// Hash subkey H = E(K, 0^128).
pub(crate) fn hash_subkey(cipher: &dyn BlockCipher) -> Result<[u8; 16], CryptoError> {
    if cipher.block_size() != 16 {
        return Err(CryptoError::NotSupported);
    }
    let mut h = [0u8; 16];
    cipher.encrypt_block(&mut h)?;
    Ok(h)
}

/// Pre-counter block J0 for any non-empty nonce.
pub(crate) fn pre_counter(h: &[u8; 16], nonce: &[u8]) -> Result<[u8; 16], CryptoError> {
    if nonce.is_empty() {
        return Err(CryptoError::InvalidIvLength);
    }
    if nonce.len() == GCM_NONCE_SIZE {
        let mut j0 = [0u8; 16];
        j0[..12].copy_from_slice(nonce);
        j0[15] = 1;
        return Ok(j0);
    }
    let mut g = Ghash::new(h);
    g.update(nonce);
    Ok(g.finish(0, nonce.len()))
}

fn inc32(block: &mut [u8; 16]) {
    let c = u32::from_be_bytes([block[12], block[13], block[14], block[15]]).wrapping_add(1);
    block[12..].copy_from_slice(&c.to_be_bytes());
}

fn gctr(cipher: &dyn BlockCipher, j0: &[u8; 16], data: &mut [u8]) -> Result<(), CryptoError> {
    let mut ctr = *j0;
    let mut ks = Zeroizing::new([0u8; 16]);
    for chunk in data.chunks_mut(16) {
        inc32(&mut ctr);
        ks.copy_from_slice(&ctr);
        cipher.encrypt_block(&mut ks[..])?;
        for (d, k) in chunk.iter_mut().zip(ks.iter()) {
            *d ^= k;
        }
    }
    Ok(())
}

fn compute_tag(
    cipher: &dyn BlockCipher,
    h: &[u8; 16],
    j0: &[u8; 16],
    aad: &[u8],
    ct: &[u8],
) -> Result<[u8; 16], CryptoError> {
    let mut g = Ghash::new(h);
    g.update(aad);
    g.pad();
    g.update(ct);
    let mut tag = g.finish(aad.len(), ct.len());
    let mut ek0 = *j0;
    cipher.encrypt_block(&mut ek0)?;
    for (t, e) in tag.iter_mut().zip(ek0.iter()) {
        *t ^= e;
    }
    ek0.zeroize();
    Ok(tag)
}

/// Encrypt and authenticate. Returns `ciphertext || 16-byte tag`.
pub fn gcm_encrypt(
    cipher: &dyn BlockCipher,
    nonce: &[u8],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let h = Zeroizing::new(hash_subkey(cipher)?);
    let j0 = pre_counter(&h, nonce)?;
    let mut out = Vec::with_capacity(plaintext.len() + GCM_TAG_SIZE);
    out.extend_from_slice(plaintext);
    gctr(cipher, &j0, &mut out)?;
    let tag = compute_tag(cipher, &h, &j0, aad, &out)?;
    out.extend_from_slice(&tag);
    Ok(out)
}

/// Verify the trailing tag over `aad` and the ciphertext, then decrypt.
pub fn gcm_decrypt(
    cipher: &dyn BlockCipher,
    nonce: &[u8],
    aad: &[u8],
    input: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if input.len() < GCM_TAG_SIZE {
        return Err(CryptoError::AeadTagVerifyFail);
    }
    let (ct, tag) = input.split_at(input.len() - GCM_TAG_SIZE);
    let h = Zeroizing::new(hash_subkey(cipher)?);
    let j0 = pre_counter(&h, nonce)?;
    let expected = compute_tag(cipher, &h, &j0, aad, ct)?;
    if !bool::from(expected[..].ct_eq(tag)) {
        return Err(CryptoError::AeadTagVerifyFail);
    }
    let mut out = ct.to_vec();
    gctr(cipher, &j0, &mut out)?;
    Ok(out)
}
