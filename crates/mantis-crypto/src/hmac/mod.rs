//! HMAC (Hash-based Message Authentication Code) implementation.
//!
//! HMAC provides message authentication using a cryptographic hash function
//! combined with a secret key, as defined in RFC 2104.
//!
//! HMAC(K, m) = H((K' XOR opad) || H((K' XOR ipad) || m))
//!
//! where K' is the key padded/hashed to block size, ipad = 0x36, opad = 0x5c.

use crate::hash::{Hash, HashAlgId};
use crate::provider::Mac;
use mantis_types::CryptoError;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, Zeroizing};

/// HMAC context over any [`HashAlgId`].
///
/// The keyed inner and outer states are kept so `reset` restores them by
/// copying instead of re-hashing the padded key.
#[derive(Clone)]
pub struct Hmac {
    inner: Hash,
    outer: Hash,
    inner_keyed: Hash,
    outer_keyed: Hash,
    done: Option<Zeroizing<Vec<u8>>>,
}

impl Hmac {
    /// Create a new HMAC instance. Any key length is accepted; keys longer
    /// than the hash block size are hashed first.
    pub fn new(alg: HashAlgId, key: &[u8]) -> Result<Self, CryptoError> {
        let block_size = alg.block_size();

        let mut key_block = Zeroizing::new(vec![0u8; block_size]);
        if key.len() > block_size {
            let hashed = Zeroizing::new(Hash::digest(alg, key)?);
            key_block[..hashed.len()].copy_from_slice(&hashed);
        } else {
            key_block[..key.len()].copy_from_slice(key);
        }

        let mut pad = Zeroizing::new(vec![0u8; block_size]);
        for (p, k) in pad.iter_mut().zip(key_block.iter()) {
            *p = k ^ 0x36;
        }
        let mut inner = Hash::new(alg);
        inner.update(&pad)?;

        for (p, k) in pad.iter_mut().zip(key_block.iter()) {
            *p = k ^ 0x5c;
        }
        let mut outer = Hash::new(alg);
        outer.update(&pad)?;

        Ok(Self {
            inner_keyed: inner.clone(),
            outer_keyed: outer.clone(),
            inner,
            outer,
            done: None,
        })
    }

    pub fn alg(&self) -> HashAlgId {
        self.inner.alg()
    }

    pub fn output_size(&self) -> usize {
        self.inner.output_size()
    }

    /// Feed data into the HMAC computation.
    pub fn update(&mut self, data: &[u8]) -> Result<(), CryptoError> {
        if self.done.is_some() {
            return Err(CryptoError::HashFinalized);
        }
        self.inner.update(data)
    }

    /// Finalize and return the tag. Repeated calls return the same tag.
    pub fn finish(&mut self) -> Result<Vec<u8>, CryptoError> {
        if let Some(tag) = &self.done {
            return Ok(tag.to_vec());
        }
        let inner_hash = Zeroizing::new(self.inner.finish()?);
        self.outer.update(&inner_hash)?;
        let tag = self.outer.finish()?;
        self.done = Some(Zeroizing::new(tag.clone()));
        Ok(tag)
    }

    /// Finalize and compare against `expected` in constant time.
    pub fn verify(&mut self, expected: &[u8]) -> Result<bool, CryptoError> {
        let tag = Zeroizing::new(self.finish()?);
        Ok(tag.len() == expected.len() && bool::from(tag.ct_eq(expected)))
    }

    /// Reset the HMAC state for reuse with the same key.
    pub fn reset(&mut self) {
        self.inner = self.inner_keyed.clone();
        self.outer = self.outer_keyed.clone();
        self.done = None;
    }

    /// One-shot HMAC computation.
    pub fn mac(alg: HashAlgId, key: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut ctx = Self::new(alg, key)?;
        ctx.update(data)?;
        ctx.finish()
    }
}

impl Mac for Hmac {
    fn output_size(&self) -> usize {
        Hmac::output_size(self)
    }

    fn update(&mut self, data: &[u8]) -> Result<(), CryptoError> {
        Hmac::update(self, data)
    }

    fn finish(&mut self, out: &mut [u8]) -> Result<(), CryptoError> {
        let need = self.output_size();
        if out.len() < need {
            return Err(CryptoError::BufferTooSmall {
                need,
                got: out.len(),
            });
        }
        let mut tag = Hmac::finish(self)?;
        out[..need].copy_from_slice(&tag);
        tag.zeroize();
        Ok(())
    }

    fn reset(&mut self) {
        Hmac::reset(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{hex, to_hex};

    // RFC 4231 test case 1
    #[test]
    fn test_hmac_sha256_rfc4231_case1() {
        let key = [0x0bu8; 20];
        let tag = Hmac::mac(HashAlgId::Sha256, &key, b"Hi There").unwrap();
        assert_eq!(
            to_hex(&tag),
            "b0344c61d8db38535ca8afceaf0bf12b881dc200c9833da726e9376c2e32cff7"
        );
    }

    // RFC 4231 test case 2
    #[test]
    fn test_hmac_sha384_sha512_rfc4231_case2() {
        let data = b"what do ya want for nothing?";
        assert_eq!(
            to_hex(&Hmac::mac(HashAlgId::Sha384, b"Jefe", data).unwrap()),
            "af45d2e376484031617f78d2b58a6b1b9c7ef464f5a01b47e42ec3736322445e\
             8e2240ca5e69e2c78b3239ecfab21649"
        );
        assert_eq!(
            to_hex(&Hmac::mac(HashAlgId::Sha512, b"Jefe", data).unwrap()),
            "164b7a7bfcf819e2e395fbe73b56e0a387bd64222e831fd610270cd7ea250554\
             9758bf75c05a994a6d034f65f8f0e6fdcaeab1a34d4a6b4b636e070a38bce737"
        );
    }

    // RFC 4231 test case 6: key longer than the block size
    #[test]
    fn test_hmac_sha256_long_key() {
        let key = [0xaau8; 131];
        let tag = Hmac::mac(
            HashAlgId::Sha256,
            &key,
            b"Test Using Larger Than Block-Size Key - Hash Key First",
        )
        .unwrap();
        assert_eq!(
            tag,
            hex("60e431591ee0b67f0d8a26aacbf5b77f8e0bc6213728c5140546040f0ee37f54")
        );
    }

    // RFC 2202
    #[test]
    fn test_hmac_sha1_and_md5_rfc2202() {
        let tag = Hmac::mac(HashAlgId::Sha1, &[0x0b; 20], b"Hi There").unwrap();
        assert_eq!(to_hex(&tag), "b617318655057264e28bc0b6fb378c8ef146be00");
        let tag = Hmac::mac(HashAlgId::Md5, &[0x0b; 16], b"Hi There").unwrap();
        assert_eq!(to_hex(&tag), "9294727a3638bb1c13f48ef8158bfc9d");
    }

    #[test]
    fn test_hmac_reset_and_verify() {
        let mut h = Hmac::new(HashAlgId::Sha256, b"key").unwrap();
        h.update(b"The quick brown fox ").unwrap();
        h.update(b"jumps over the lazy dog").unwrap();
        let tag = h.finish().unwrap();
        assert_eq!(
            to_hex(&tag),
            "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
        assert_eq!(h.finish().unwrap(), tag);

        h.reset();
        h.update(b"The quick brown fox jumps over the lazy dog").unwrap();
        assert!(h.verify(&tag).unwrap());

        let mut bad = tag.clone();
        bad[31] ^= 1;
        h.reset();
        h.update(b"The quick brown fox jumps over the lazy dog").unwrap();
        assert!(!h.verify(&bad).unwrap());
        assert!(!h.verify(&tag[..16]).unwrap());
    }

    #[test]
    fn test_hmac_via_mac_trait() {
        let mut h = Hmac::new(HashAlgId::Sha3_256, b"k").unwrap();
        let m: &mut dyn Mac = &mut h;
        m.update(b"data").unwrap();
        let mut out = [0u8; 32];
        m.finish(&mut out).unwrap();
        assert_eq!(
            out.to_vec(),
            Hmac::mac(HashAlgId::Sha3_256, b"k", b"data").unwrap()
        );
    }
}
