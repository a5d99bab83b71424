//! IDEA block cipher (64-bit block, 128-bit key).
//!
//! Multiplication modulo 2^16 + 1 is computed with the low/high split and a
//! sign mask, so there is no data-dependent branch or division.

use crate::provider::BlockCipher;
use mantis_types::CryptoError;
use zeroize::Zeroize;

/// IDEA block size in bytes.
pub const IDEA_BLOCK_SIZE: usize = 8;
/// IDEA key size in bytes.
pub const IDEA_KEY_SIZE: usize = 16;

const ROUNDS: usize = 8;
const SUBKEYS: usize = 6 * ROUNDS + 4;

/// Multiplication in the group (Z/65537)* with 0 standing for 2^16.
fn mul(a: u16, b: u16) -> u16 {
    let a = a as u64 + ((((a as u64).wrapping_sub(1)) >> 63) << 16);
    let b = b as u64 + ((((b as u64).wrapping_sub(1)) >> 63) << 16);
    let p = a * b;
    let mut r = (p & 0xffff) as i64 - (p >> 16) as i64;
    r += 65537 & (r >> 63);
    r as u16
}

/// Multiplicative inverse via x^(65537 - 2).
fn mul_inv(x: u16) -> u16 {
    let mut result = 1u16;
    let mut base = x;
    let mut e = 65535u32;
    while e > 0 {
        if e & 1 == 1 {
            result = mul(result, base);
        }
        base = mul(base, base);
        e >>= 1;
    }
    result
}

/// An expanded IDEA key (encryption and decryption schedules).
#[derive(Clone)]
pub struct IdeaKey {
    enc: [u16; SUBKEYS],
    dec: [u16; SUBKEYS],
}

impl Drop for IdeaKey {
    fn drop(&mut self) {
        self.enc.zeroize();
        self.dec.zeroize();
    }
}

impl IdeaKey {
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        if key.len() != IDEA_KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength(key.len()));
        }
        let mut kb = [0u8; 16];
        kb.copy_from_slice(key);
        let mut k = u128::from_be_bytes(kb);
        kb.zeroize();
        let mut enc = [0u16; SUBKEYS];
        for (i, z) in enc.iter_mut().enumerate() {
            *z = (k >> (112 - 16 * (i % 8))) as u16;
            if i % 8 == 7 {
                k = k.rotate_left(25);
            }
        }
        k.zeroize();

        let neg = |x: u16| x.wrapping_neg();
        let mut dec = [0u16; SUBKEYS];
        dec[0] = mul_inv(enc[48]);
        dec[1] = neg(enc[49]);
        dec[2] = neg(enc[50]);
        dec[3] = mul_inv(enc[51]);
        dec[4] = enc[46];
        dec[5] = enc[47];
        for r in 1..ROUNDS {
            let b = 48 - 6 * r;
            dec[6 * r] = mul_inv(enc[b]);
            // middle rounds swap the two additive keys
            dec[6 * r + 1] = neg(enc[b + 2]);
            dec[6 * r + 2] = neg(enc[b + 1]);
            dec[6 * r + 3] = mul_inv(enc[b + 3]);
            dec[6 * r + 4] = enc[b - 2];
            dec[6 * r + 5] = enc[b - 1];
        }
        dec[48] = mul_inv(enc[0]);
        dec[49] = neg(enc[1]);
        dec[50] = neg(enc[2]);
        dec[51] = mul_inv(enc[3]);
        Ok(Self { enc, dec })
    }

    pub fn encrypt_block(&self, block: &mut [u8]) -> Result<(), CryptoError> {
        crypt(block, &self.enc)
    }

    pub fn decrypt_block(&self, block: &mut [u8]) -> Result<(), CryptoError> {
        crypt(block, &self.dec)
    }
}

fn crypt(block: &mut [u8], z: &[u16; SUBKEYS]) -> Result<(), CryptoError> {
    if block.len() != IDEA_BLOCK_SIZE {
        return Err(CryptoError::InvalidArg);
    }
    let word = |i: usize| u16::from_be_bytes([block[2 * i], block[2 * i + 1]]);
    let (mut x1, mut x2, mut x3, mut x4) = (word(0), word(1), word(2), word(3));
    for k in z.chunks_exact(6).take(ROUNDS) {
        x1 = mul(x1, k[0]);
        x2 = x2.wrapping_add(k[1]);
        x3 = x3.wrapping_add(k[2]);
        x4 = mul(x4, k[3]);
        let mut t0 = mul(x1 ^ x3, k[4]);
        let t1 = mul(t0.wrapping_add(x2 ^ x4), k[5]);
        t0 = t0.wrapping_add(t1);
        x1 ^= t1;
        x4 ^= t0;
        t0 ^= x2;
        x2 = x3 ^ t1;
        x3 = t0;
    }
    let out = [
        mul(x1, z[48]),
        x3.wrapping_add(z[49]),
        x2.wrapping_add(z[50]),
        mul(x4, z[51]),
    ];
    for (chunk, w) in block.chunks_exact_mut(2).zip(out.iter()) {
        chunk.copy_from_slice(&w.to_be_bytes());
    }
    Ok(())
}

impl BlockCipher for IdeaKey {
    fn block_size(&self) -> usize {
        IDEA_BLOCK_SIZE
    }

    fn encrypt_block(&self, block: &mut [u8]) -> Result<(), CryptoError> {
        IdeaKey::encrypt_block(self, block)
    }

    fn decrypt_block(&self, block: &mut [u8]) -> Result<(), CryptoError> {
        IdeaKey::decrypt_block(self, block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{hex, to_hex};

    #[test]
    fn test_mul_group_identities() {
        assert_eq!(mul(0, 0), 1); // (-1)(-1)
        assert_eq!(mul(1, 0x1234), 0x1234);
        for x in [1u16, 2, 3, 0x8000, 0xffff, 0] {
            assert_eq!(mul(x, mul_inv(x)), 1, "x={x}");
        }
    }

    #[test]
    fn test_idea_kat() {
        let key = IdeaKey::new(&hex("00010002000300040005000600070008")).unwrap();
        let mut block = hex("0000000100020003");
        key.encrypt_block(&mut block).unwrap();
        assert_eq!(to_hex(&block), "11fbed2b01986de5");
        key.decrypt_block(&mut block).unwrap();
        assert_eq!(to_hex(&block), "0000000100020003");
    }

    #[test]
    fn test_idea_key_length() {
        assert_eq!(
            IdeaKey::new(&[0u8; 24]).err(),
            Some(CryptoError::InvalidKeyLength(24))
        );
    }
}
