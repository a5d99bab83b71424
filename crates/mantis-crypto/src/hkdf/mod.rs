//! HKDF (HMAC-based Extract-and-Expand Key Derivation Function).
//!
//! HKDF is a key derivation function defined in RFC 5869. It consists of
//! two stages: extract (to produce a pseudorandom key from input keying
//! material) and expand (to derive output keying material of any length).
//! The TLS 1.3 key schedule is built on these two operations.

use crate::hash::HashAlgId;
use crate::hmac::Hmac;
use mantis_types::CryptoError;
use zeroize::{Zeroize, Zeroizing};

/// HKDF context holding the pseudorandom key.
pub struct Hkdf {
    alg: HashAlgId,
    prk: Vec<u8>,
}

impl Drop for Hkdf {
    fn drop(&mut self) {
        self.prk.zeroize();
    }
}

impl Hkdf {
    /// Perform the extract step. An empty `salt` means a block of zeros of
    /// hash length.
    pub fn new(alg: HashAlgId, salt: &[u8], ikm: &[u8]) -> Result<Self, CryptoError> {
        Ok(Self {
            alg,
            prk: extract(alg, salt, ikm)?,
        })
    }

    /// Wrap an existing pseudorandom key (skips extract).
    pub fn from_prk(alg: HashAlgId, prk: &[u8]) -> Result<Self, CryptoError> {
        if prk.len() < alg.output_size() {
            return Err(CryptoError::InvalidKeyLength(prk.len()));
        }
        Ok(Self {
            alg,
            prk: prk.to_vec(),
        })
    }

    pub fn prk(&self) -> &[u8] {
        &self.prk
    }

    /// Perform the expand step to derive `okm_len` bytes of output keying material.
    pub fn expand(&self, info: &[u8], okm_len: usize) -> Result<Vec<u8>, CryptoError> {
        expand(self.alg, &self.prk, info, okm_len)
    }

    /// One-shot: extract and expand in a single call.
    pub fn derive(
        alg: HashAlgId,
        salt: &[u8],
        ikm: &[u8],
        info: &[u8],
        okm_len: usize,
    ) -> Result<Vec<u8>, CryptoError> {
        Self::new(alg, salt, ikm)?.expand(info, okm_len)
    }
}

/// HKDF-Extract: PRK = HMAC-Hash(salt, IKM).
pub fn extract(alg: HashAlgId, salt: &[u8], ikm: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if salt.is_empty() {
        let zeros = vec![0u8; alg.output_size()];
        Hmac::mac(alg, &zeros, ikm)
    } else {
        Hmac::mac(alg, salt, ikm)
    }
}

/// HKDF-Expand: T(i) = HMAC-Hash(PRK, T(i-1) || info || i).
pub fn expand(alg: HashAlgId, prk: &[u8], info: &[u8], okm_len: usize) -> Result<Vec<u8>, CryptoError> {
    let hash_len = alg.output_size();
    if okm_len > 255 * hash_len {
        return Err(CryptoError::KdfDkLenOverflow);
    }
    let base = Hmac::new(alg, prk)?;
    let mut okm = Zeroizing::new(Vec::with_capacity(okm_len));
    let mut t = Zeroizing::new(Vec::new());
    let mut counter = 1u8;
    while okm.len() < okm_len {
        let mut h = base.clone();
        h.update(&t)?;
        h.update(info)?;
        h.update(&[counter])?;
        t = Zeroizing::new(h.finish()?);
        let take = (okm_len - okm.len()).min(hash_len);
        okm.extend_from_slice(&t[..take]);
        counter = counter.wrapping_add(1);
    }
    // Hands the allocation to the caller; nothing is left behind to wipe.
    Ok(std::mem::take(&mut *okm))
}
