//! GMAC: GCM authentication over AAD only (NIST SP 800-38D).

use crate::aes::AesKey;
use crate::modes::gcm::{hash_subkey, pre_counter, Ghash};
use mantis_types::CryptoError;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, Zeroizing};

pub const GMAC_TAG_SIZE: usize = 16;

pub struct Gmac {
    cipher: AesKey,
    h: Zeroizing<[u8; 16]>,
    j0: [u8; 16],
    ghash: Ghash,
    len: usize,
}

impl Drop for Gmac {
    fn drop(&mut self) {
        self.j0.zeroize();
    }
}

impl Gmac {
    pub fn new(key: &[u8], iv: &[u8]) -> Result<Self, CryptoError> {
        let cipher = AesKey::new(key)?;
        let h = Zeroizing::new(hash_subkey(&cipher)?);
        let j0 = pre_counter(&h, iv)?;
        let ghash = Ghash::new(&h);
        Ok(Gmac {
            cipher,
            h,
            j0,
            ghash,
            len: 0,
        })
    }

    pub fn update(&mut self, data: &[u8]) {
        self.ghash.update(data);
        self.len += data.len();
    }

    /// Compute the tag. Call [`Gmac::reset`] with a fresh IV before the next
    /// message.
    pub fn finish(&mut self) -> Result<[u8; GMAC_TAG_SIZE], CryptoError> {
        let ghash = std::mem::replace(&mut self.ghash, Ghash::new(&self.h));
        let mut tag = ghash.finish(self.len, 0);
        let mut ek0 = self.j0;
        self.cipher.encrypt_block(&mut ek0)?;
        for (t, e) in tag.iter_mut().zip(ek0.iter()) {
            *t ^= e;
        }
        ek0.zeroize();
        self.len = 0;
        Ok(tag)
    }

    /// Start a new message under a fresh IV. Reusing an IV with the same key
    /// breaks GMAC.
    pub fn reset(&mut self, iv: &[u8]) -> Result<(), CryptoError> {
        self.j0 = pre_counter(&self.h, iv)?;
        self.ghash = Ghash::new(&self.h);
        self.len = 0;
        Ok(())
    }

    pub fn verify(&mut self, expected: &[u8]) -> Result<bool, CryptoError> {
        let tag = self.finish()?;
        Ok(expected.len() == GMAC_TAG_SIZE && bool::from(tag[..].ct_eq(expected)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modes::gcm::gcm_encrypt;
    use crate::test_util::hex;

    #[test]
    fn test_gmac_matches_gcm_empty_plaintext() {
        let key = hex("feffe9928665731c6d6a8f9467308308");
        let iv = hex("cafebabefacedbaddecaf888");
        let aad = hex("feedfacedeadbeeffeedfacedeadbeefabaddad2");
        let mut g = Gmac::new(&key, &iv).unwrap();
        g.update(&aad[..7]);
        g.update(&aad[7..]);
        let tag = g.finish().unwrap();
        assert_eq!(tag.to_vec(), hex("346434fd51d5cd0c5887ec63e39b907a"));
        let aes = AesKey::new(&key).unwrap();
        assert_eq!(gcm_encrypt(&aes, &iv, &aad, b"").unwrap(), tag.to_vec());
    }

    #[test]
    fn test_reset_and_verify() {
        let key = [9u8; 16];
        let mut g = Gmac::new(&key, &[1u8; 12]).unwrap();
        g.update(b"header");
        let tag = g.finish().unwrap();
        g.reset(&[2u8; 12]).unwrap();
        g.update(b"header");
        assert_ne!(g.finish().unwrap(), tag);
        g.reset(&[1u8; 12]).unwrap();
        g.update(b"header");
        assert!(g.verify(&tag).unwrap());
        assert!(Gmac::new(&key, &[]).is_err());
    }
}
