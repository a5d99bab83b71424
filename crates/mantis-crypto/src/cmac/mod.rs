//! CMAC over AES (NIST SP 800-38B, RFC 4493).

use crate::aes::{AesKey, AES_BLOCK_SIZE};
use crate::provider::Mac;
use mantis_types::CryptoError;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

/// Streaming CMAC state. The last block is held back until `finish` so it
/// can be masked with K1 or K2.
pub struct Cmac {
    cipher: AesKey,
    k1: [u8; AES_BLOCK_SIZE],
    k2: [u8; AES_BLOCK_SIZE],
    x: [u8; AES_BLOCK_SIZE],
    buf: [u8; AES_BLOCK_SIZE],
    buf_len: usize,
}

impl Drop for Cmac {
    fn drop(&mut self) {
        self.k1.zeroize();
        self.k2.zeroize();
        self.x.zeroize();
        self.buf.zeroize();
    }
}

/// Doubling in GF(2^128); the reduction constant is applied with a mask.
fn dbl(b: &[u8; AES_BLOCK_SIZE]) -> [u8; AES_BLOCK_SIZE] {
    let v = u128::from_be_bytes(*b);
    let msb = v >> 127;
    ((v << 1) ^ (0x87 & msb.wrapping_neg())).to_be_bytes()
}

impl Cmac {
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        let cipher = AesKey::new(key)?;
        let mut l = [0u8; AES_BLOCK_SIZE];
        cipher.encrypt_block(&mut l)?;
        let k1 = dbl(&l);
        let k2 = dbl(&k1);
        l.zeroize();
        Ok(Cmac {
            cipher,
            k1,
            k2,
            x: [0; AES_BLOCK_SIZE],
            buf: [0; AES_BLOCK_SIZE],
            buf_len: 0,
        })
    }

    fn chain(&mut self, block: &[u8; AES_BLOCK_SIZE]) -> Result<(), CryptoError> {
        for (x, b) in self.x.iter_mut().zip(block) {
            *x ^= b;
        }
        self.cipher.encrypt_block(&mut self.x)
    }

    pub fn update(&mut self, mut data: &[u8]) -> Result<(), CryptoError> {
        while !data.is_empty() {
            if self.buf_len == AES_BLOCK_SIZE {
                let b = self.buf;
                self.chain(&b)?;
                self.buf_len = 0;
            }
            let take = (AES_BLOCK_SIZE - self.buf_len).min(data.len());
            self.buf[self.buf_len..self.buf_len + take].copy_from_slice(&data[..take]);
            self.buf_len += take;
            data = &data[take..];
        }
        Ok(())
    }

    /// Compute the tag. The state is reset afterwards.
    pub fn finish(&mut self) -> Result<[u8; AES_BLOCK_SIZE], CryptoError> {
        let mut last = [0u8; AES_BLOCK_SIZE];
        last[..self.buf_len].copy_from_slice(&self.buf[..self.buf_len]);
        let mask = if self.buf_len == AES_BLOCK_SIZE {
            self.k1
        } else {
            last[self.buf_len] = 0x80;
            self.k2
        };
        for (l, m) in last.iter_mut().zip(mask.iter()) {
            *l ^= m;
        }
        self.chain(&last)?;
        let tag = self.x;
        self.reset();
        Ok(tag)
    }

    pub fn reset(&mut self) {
        self.x.zeroize();
        self.buf.zeroize();
        self.buf_len = 0;
    }

    /// Constant-time comparison against a received tag (full or truncated).
    pub fn verify(&mut self, expected: &[u8]) -> Result<bool, CryptoError> {
        let tag = self.finish()?;
        if expected.is_empty() || expected.len() > AES_BLOCK_SIZE {
            return Ok(false);
        }
        Ok(bool::from(tag[..expected.len()].ct_eq(expected)))
    }

    pub fn mac(key: &[u8], data: &[u8]) -> Result<[u8; AES_BLOCK_SIZE], CryptoError> {
        let mut c = Cmac::new(key)?;
        c.update(data)?;
        c.finish()
    }
}

impl Mac for Cmac {
    fn output_size(&self) -> usize {
        AES_BLOCK_SIZE
    }

    fn update(&mut self, data: &[u8]) -> Result<(), CryptoError> {
        Cmac::update(self, data)
    }

    fn finish(&mut self, out: &mut [u8]) -> Result<(), CryptoError> {
        if out.len() < AES_BLOCK_SIZE {
            return Err(CryptoError::BufferTooSmall {
                need: AES_BLOCK_SIZE,
                got: out.len(),
            });
        }
        out[..AES_BLOCK_SIZE].copy_from_slice(&Cmac::finish(self)?);
        Ok(())
    }

    fn reset(&mut self) {
        Cmac::reset(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::hex;

    const KEY: &str = "2b7e151628aed2a6abf7158809cf4f3c";
    const MSG: &str = "6bc1bee22e409f96e93d7e117393172aae2d8a571e03ac9c9eb76fac45af8e51
                       30c81c46a35ce411";

    #[test]
    fn test_rfc4493_examples() {
        let key = hex(KEY);
        let msg = hex(MSG);
        assert_eq!(Cmac::mac(&key, b"").unwrap().to_vec(), hex("bb1d6929e95937287fa37d129b756746"));
        assert_eq!(
            Cmac::mac(&key, &msg[..16]).unwrap().to_vec(),
            hex("070a16b46b4d4144f79bdd9dd04a287c")
        );
        assert_eq!(
            Cmac::mac(&key, &msg[..40]).unwrap().to_vec(),
            hex("dfa66747de9ae63030ca32611497c827")
        );
    }

    #[test]
    fn test_subkeys() {
        let c = Cmac::new(&hex(KEY)).unwrap();
        assert_eq!(c.k1.to_vec(), hex("fbeed618357133667c85e08f7236a8de"));
        assert_eq!(c.k2.to_vec(), hex("f7ddac306ae266ccf90bc11ee46d513b"));
    }

    #[test]
    fn test_streaming_and_verify() {
        let key = hex(KEY);
        let msg = hex(MSG);
        let mut c = Cmac::new(&key).unwrap();
        for chunk in msg[..32].chunks(7) {
            c.update(chunk).unwrap();
        }
        assert_eq!(c.finish().unwrap().to_vec(), hex("ce0cbf1738f4df6428b1d93bf12081c9"));
        c.update(&msg[..16]).unwrap();
        assert!(c.verify(&hex("070a16b46b4d4144")).unwrap());
        c.update(&msg[..16]).unwrap();
        assert!(!c.verify(&hex("070a16b46b4d4145")).unwrap());
    }

    #[test]
    fn test_bad_key_length() {
        assert_eq!(Cmac::new(&[0u8; 10]).err(), Some(CryptoError::InvalidKeyLength(10)));
    }
}
