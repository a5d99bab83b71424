//! HMAC-DRBG mechanism (NIST SP 800-90A section 10.1.2) over HMAC-SHA-256.
//!
//! This is the bare algorithm. Entropy gathering, reseed scheduling and the
//! lifecycle live in [`super::Drbg`].

use crate::hmac::Hmac;
use mantis_types::{CryptoError, HashAlgId};
use zeroize::{Zeroize, Zeroizing};

pub(crate) const OUT_LEN: usize = 32;

pub struct HmacDrbg {
    k: [u8; OUT_LEN],
    v: [u8; OUT_LEN],
}

impl Drop for HmacDrbg {
    fn drop(&mut self) {
        self.k.zeroize();
        self.v.zeroize();
    }
}

fn hmac(key: &[u8], parts: &[&[u8]]) -> Result<[u8; OUT_LEN], CryptoError> {
    let mut h = Hmac::new(HashAlgId::Sha256, key)?;
    for p in parts {
        h.update(p)?;
    }
    let tag = Zeroizing::new(h.finish()?);
    let mut out = [0u8; OUT_LEN];
    out.copy_from_slice(&tag);
    Ok(out)
}

impl HmacDrbg {
    /// Instantiate from `entropy || nonce || personalization` already
    /// concatenated by the caller.
    pub fn new(seed_material: &[u8]) -> Result<Self, CryptoError> {
        let mut d = HmacDrbg {
            k: [0x00; OUT_LEN],
            v: [0x01; OUT_LEN],
        };
        d.update(seed_material)?;
        Ok(d)
    }

    fn update(&mut self, provided: &[u8]) -> Result<(), CryptoError> {
        self.k = hmac(&self.k, &[&self.v, &[0x00], provided])?;
        self.v = hmac(&self.k, &[&self.v])?;
        if !provided.is_empty() {
            self.k = hmac(&self.k, &[&self.v, &[0x01], provided])?;
            self.v = hmac(&self.k, &[&self.v])?;
        }
        Ok(())
    }

    pub fn reseed(&mut self, entropy: &[u8], additional: &[u8]) -> Result<(), CryptoError> {
        let mut seed = Zeroizing::new(Vec::with_capacity(entropy.len() + additional.len()));
        seed.extend_from_slice(entropy);
        seed.extend_from_slice(additional);
        self.update(&seed)
    }

    /// Fill `out`. Callers keep single requests at or below
    /// [`super::MAX_REQUEST`].
    pub fn generate(&mut self, out: &mut [u8], additional: &[u8]) -> Result<(), CryptoError> {
        if !additional.is_empty() {
            self.update(additional)?;
        }
        for chunk in out.chunks_mut(OUT_LEN) {
            self.v = hmac(&self.k, &[&self.v])?;
            chunk.copy_from_slice(&self.v[..chunk.len()]);
        }
        self.update(additional)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::hex;

    #[test]
    fn test_cavp_sha256_no_reseed() {
        let entropy = hex("ca851911349384bffe89de1cbdc46e6831e44d34a4fb935ee285dd14b71a7488");
        let nonce = hex("659ba96c601dc69fc902940805ec0ca8");
        let mut d = HmacDrbg::new(&[entropy, nonce].concat()).unwrap();
        let mut out = [0u8; 128];
        d.generate(&mut out, b"").unwrap();
        d.generate(&mut out, b"").unwrap();
        assert_eq!(
            out.to_vec(),
            hex("e528e9abf2dece54d47c7e75e5fe302149f817ea9fb4bee6f4199697d04d5b89
                 d54fbb978a15b5c443c9ec21036d2460b6f73ebad0dc2aba6e624abf07745bc1
                 07694bb7547bb0995f70de25d6b29e2d3011bb19d27676c07162c8b5ccde0668
                 961df86803482cb37ed6d5c0bb8d50cf1f50d476aa0458bdaba806f48be9dcb8")
        );
    }

    #[test]
    fn test_reseed_with_additional_input() {
        let seed: Vec<u8> = (0u8..48).collect();
        let mut d = HmacDrbg::new(&seed).unwrap();
        let mut out = [0u8; 40];
        d.generate(&mut out, b"").unwrap();
        assert_eq!(
            out.to_vec(),
            hex("0ffb80875a3e9022a4941a3fa1b0d3611df14e1cf651a73ce9229b9f3ad56887680428845710288e")
        );
        let entropy: Vec<u8> = (100u8..132).collect();
        d.reseed(&entropy, b"add").unwrap();
        let mut out = [0u8; 16];
        d.generate(&mut out, b"").unwrap();
        assert_eq!(out.to_vec(), hex("d0c9a964630df9f77a3b77ab944dcd30"));
    }
}
