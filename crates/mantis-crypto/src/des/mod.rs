//! DES and Triple-DES (EDE) block ciphers (FIPS 46-3, SP 800-67).
//!
//! Only Triple-DES is exposed for use; single DES exists as its building
//! block. S-box lookups scan every entry and select with a mask.

use crate::provider::BlockCipher;
use mantis_types::CryptoError;
use zeroize::Zeroize;

/// DES block size in bytes.
pub const DES_BLOCK_SIZE: usize = 8;

const IP: [u8; 64] = [
    58, 50, 42, 34, 26, 18, 10, 2, 60, 52, 44, 36, 28, 20, 12, 4,
    62, 54, 46, 38, 30, 22, 14, 6, 64, 56, 48, 40, 32, 24, 16, 8,
    57, 49, 41, 33, 25, 17, 9, 1, 59, 51, 43, 35, 27, 19, 11, 3,
    61, 53, 45, 37, 29, 21, 13, 5, 63, 55, 47, 39, 31, 23, 15, 7,
];

const FP: [u8; 64] = [
    40, 8, 48, 16, 56, 24, 64, 32, 39, 7, 47, 15, 55, 23, 63, 31,
    38, 6, 46, 14, 54, 22, 62, 30, 37, 5, 45, 13, 53, 21, 61, 29,
    36, 4, 44, 12, 52, 20, 60, 28, 35, 3, 43, 11, 51, 19, 59, 27,
    34, 2, 42, 10, 50, 18, 58, 26, 33, 1, 41, 9, 49, 17, 57, 25,
];

const E: [u8; 48] = [
    32, 1, 2, 3, 4, 5, 4, 5, 6, 7, 8, 9, 8, 9, 10, 11,
    12, 13, 12, 13, 14, 15, 16, 17, 16, 17, 18, 19, 20, 21, 20, 21,
    22, 23, 24, 25, 24, 25, 26, 27, 28, 29, 28, 29, 30, 31, 32, 1,
];

const P: [u8; 32] = [
    16, 7, 20, 21, 29, 12, 28, 17, 1, 15, 23, 26, 5, 18, 31, 10,
    2, 8, 24, 14, 32, 27, 3, 9, 19, 13, 30, 6, 22, 11, 4, 25,
];

const PC1: [u8; 56] = [
    57, 49, 41, 33, 25, 17, 9, 1, 58, 50, 42, 34, 26, 18,
    10, 2, 59, 51, 43, 35, 27, 19, 11, 3, 60, 52, 44, 36,
    63, 55, 47, 39, 31, 23, 15, 7, 62, 54, 46, 38, 30, 22,
    14, 6, 61, 53, 45, 37, 29, 21, 13, 5, 28, 20, 12, 4,
];

const PC2: [u8; 48] = [
    14, 17, 11, 24, 1, 5, 3, 28, 15, 6, 21, 10, 23, 19, 12, 4,
    26, 8, 16, 7, 27, 20, 13, 2, 41, 52, 31, 37, 47, 55, 30, 40,
    51, 45, 33, 48, 44, 49, 39, 56, 34, 53, 46, 42, 50, 36, 29, 32,
];

const SHIFTS: [u32; 16] = [1, 1, 2, 2, 2, 2, 2, 2, 1, 2, 2, 2, 2, 2, 2, 1];

/// S-boxes, entry `row * 16 + col`.
const SBOXES: [[u8; 64]; 8] = [
    [
        14, 4, 13, 1, 2, 15, 11, 8, 3, 10, 6, 12, 5, 9, 0, 7,
        0, 15, 7, 4, 14, 2, 13, 1, 10, 6, 12, 11, 9, 5, 3, 8,
        4, 1, 14, 8, 13, 6, 2, 11, 15, 12, 9, 7, 3, 10, 5, 0,
        15, 12, 8, 2, 4, 9, 1, 7, 5, 11, 3, 14, 10, 0, 6, 13,
    ],
    [
        15, 1, 8, 14, 6, 11, 3, 4, 9, 7, 2, 13, 12, 0, 5, 10,
        3, 13, 4, 7, 15, 2, 8, 14, 12, 0, 1, 10, 6, 9, 11, 5,
        0, 14, 7, 11, 10, 4, 13, 1, 5, 8, 12, 6, 9, 3, 2, 15,
        13, 8, 10, 1, 3, 15, 4, 2, 11, 6, 7, 12, 0, 5, 14, 9,
    ],
    [
        10, 0, 9, 14, 6, 3, 15, 5, 1, 13, 12, 7, 11, 4, 2, 8,
        13, 7, 0, 9, 3, 4, 6, 10, 2, 8, 5, 14, 12, 11, 15, 1,
        13, 6, 4, 9, 8, 15, 3, 0, 11, 1, 2, 12, 5, 10, 14, 7,
        1, 10, 13, 0, 6, 9, 8, 7, 4, 15, 14, 3, 11, 5, 2, 12,
    ],
    [
        7, 13, 14, 3, 0, 6, 9, 10, 1, 2, 8, 5, 11, 12, 4, 15,
        13, 8, 11, 5, 6, 15, 0, 3, 4, 7, 2, 12, 1, 10, 14, 9,
        10, 6, 9, 0, 12, 11, 7, 13, 15, 1, 3, 14, 5, 2, 8, 4,
        3, 15, 0, 6, 10, 1, 13, 8, 9, 4, 5, 11, 12, 7, 2, 14,
    ],
    [
        2, 12, 4, 1, 7, 10, 11, 6, 8, 5, 3, 15, 13, 0, 14, 9,
        14, 11, 2, 12, 4, 7, 13, 1, 5, 0, 15, 10, 3, 9, 8, 6,
        4, 2, 1, 11, 10, 13, 7, 8, 15, 9, 12, 5, 6, 3, 0, 14,
        11, 8, 12, 7, 1, 14, 2, 13, 6, 15, 0, 9, 10, 4, 5, 3,
    ],
    [
        12, 1, 10, 15, 9, 2, 6, 8, 0, 13, 3, 4, 14, 7, 5, 11,
        10, 15, 4, 2, 7, 12, 9, 5, 6, 1, 13, 14, 0, 11, 3, 8,
        9, 14, 15, 5, 2, 8, 12, 3, 7, 0, 4, 10, 1, 13, 11, 6,
        4, 3, 2, 12, 9, 5, 15, 10, 11, 14, 1, 7, 6, 0, 8, 13,
    ],
    [
        4, 11, 2, 14, 15, 0, 8, 13, 3, 12, 9, 7, 5, 10, 6, 1,
        13, 0, 11, 7, 4, 9, 1, 10, 14, 3, 5, 12, 2, 15, 8, 6,
        1, 4, 11, 13, 12, 3, 7, 14, 10, 15, 6, 8, 0, 5, 9, 2,
        6, 11, 13, 8, 1, 4, 10, 7, 9, 5, 0, 15, 14, 2, 3, 12,
    ],
    [
        13, 2, 8, 4, 6, 15, 11, 1, 10, 9, 3, 14, 5, 0, 12, 7,
        1, 15, 13, 8, 10, 3, 7, 4, 12, 5, 6, 11, 0, 14, 9, 2,
        7, 11, 4, 1, 9, 12, 14, 2, 0, 6, 10, 13, 15, 3, 5, 8,
        2, 1, 14, 7, 4, 10, 8, 13, 15, 12, 9, 0, 3, 5, 6, 11,
    ],
];

/// Bit permutation: output bit `i` (from the MSB) is input bit `table[i]`,
/// 1-based from the MSB of an `in_bits`-wide value.
fn permute(x: u64, table: &[u8], in_bits: u32) -> u64 {
    table
        .iter()
        .fold(0u64, |acc, &p| (acc << 1) | ((x >> (in_bits - p as u32)) & 1))
}

fn sbox_lookup(sbox: &[u8; 64], idx: u8) -> u8 {
    let mut out = 0u8;
    for (i, &v) in sbox.iter().enumerate() {
        let mask = (((i as u8 ^ idx) as u16).wrapping_sub(1) >> 8) as u8;
        out |= v & mask;
    }
    out
}

fn feistel(r: u32, k: u64) -> u32 {
    let x = permute(r as u64, &E, 32) ^ k;
    let mut out = 0u64;
    for (i, sbox) in SBOXES.iter().enumerate() {
        let six = ((x >> (42 - 6 * i)) & 0x3f) as u8;
        // row from the outer bits, column from the middle four
        let idx = (((six >> 4) & 2) | (six & 1)) * 16 + ((six >> 1) & 0xf);
        out = (out << 4) | sbox_lookup(sbox, idx) as u64;
    }
    permute(out, &P, 32) as u32
}

/// A single-DES key schedule.
#[derive(Clone)]
struct DesKey {
    subkeys: [u64; 16],
}

impl Drop for DesKey {
    fn drop(&mut self) {
        self.subkeys.zeroize();
    }
}

impl DesKey {
    fn new(key: &[u8]) -> Self {
        let mut k = [0u8; 8];
        k.copy_from_slice(&key[..8]);
        let cd = permute(u64::from_be_bytes(k), &PC1, 64);
        k.zeroize();
        let mut c = (cd >> 28) as u32;
        let mut d = (cd & 0x0fff_ffff) as u32;
        let mut subkeys = [0u64; 16];
        for (sk, &s) in subkeys.iter_mut().zip(SHIFTS.iter()) {
            c = ((c << s) | (c >> (28 - s))) & 0x0fff_ffff;
            d = ((d << s) | (d >> (28 - s))) & 0x0fff_ffff;
            *sk = permute(((c as u64) << 28) | d as u64, &PC2, 56);
        }
        Self { subkeys }
    }

    fn crypt(&self, block: u64, decrypt: bool) -> u64 {
        let x = permute(block, &IP, 64);
        let mut l = (x >> 32) as u32;
        let mut r = x as u32;
        for i in 0..16 {
            let k = if decrypt {
                self.subkeys[15 - i]
            } else {
                self.subkeys[i]
            };
            let next = l ^ feistel(r, k);
            l = r;
            r = next;
        }
        permute(((r as u64) << 32) | l as u64, &FP, 64)
    }
}

/// Triple-DES EDE key: 24 bytes (three keys) or 16 bytes (K3 = K1).
#[derive(Clone)]
pub struct TripleDesKey {
    k1: DesKey,
    k2: DesKey,
    k3: DesKey,
}

impl TripleDesKey {
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        match key.len() {
            16 => Ok(Self {
                k1: DesKey::new(&key[..8]),
                k2: DesKey::new(&key[8..16]),
                k3: DesKey::new(&key[..8]),
            }),
            24 => Ok(Self {
                k1: DesKey::new(&key[..8]),
                k2: DesKey::new(&key[8..16]),
                k3: DesKey::new(&key[16..24]),
            }),
            n => Err(CryptoError::InvalidKeyLength(n)),
        }
    }

    pub fn encrypt_block(&self, block: &mut [u8]) -> Result<(), CryptoError> {
        let x = load(block)?;
        let y = self.k3.crypt(self.k2.crypt(self.k1.crypt(x, false), true), false);
        block.copy_from_slice(&y.to_be_bytes());
        Ok(())
    }

    pub fn decrypt_block(&self, block: &mut [u8]) -> Result<(), CryptoError> {
        let x = load(block)?;
        let y = self.k1.crypt(self.k2.crypt(self.k3.crypt(x, true), false), true);
        block.copy_from_slice(&y.to_be_bytes());
        Ok(())
    }
}

fn load(block: &[u8]) -> Result<u64, CryptoError> {
    let b: [u8; 8] = block.try_into().map_err(|_| CryptoError::InvalidArg)?;
    Ok(u64::from_be_bytes(b))
}

impl BlockCipher for TripleDesKey {
    fn block_size(&self) -> usize {
        DES_BLOCK_SIZE
    }

    fn encrypt_block(&self, block: &mut [u8]) -> Result<(), CryptoError> {
        TripleDesKey::encrypt_block(self, block)
    }

    fn decrypt_block(&self, block: &mut [u8]) -> Result<(), CryptoError> {
        TripleDesKey::decrypt_block(self, block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{hex, to_hex};

    #[test]
    fn test_single_des_kat() {
        let k = DesKey::new(&hex("133457799BBCDFF1"));
        assert_eq!(k.crypt(0x0123456789ABCDEF, false), 0x85E813540F0AB405);
        assert_eq!(k.crypt(0x85E813540F0AB405, true), 0x0123456789ABCDEF);
    }

    #[test]
    fn test_3des_three_key() {
        let key = hex("0123456789abcdef23456789abcdef01456789abcdef0123");
        let c = TripleDesKey::new(&key).unwrap();
        let mut block = hex("6bc1bee22e409f96");
        c.encrypt_block(&mut block).unwrap();
        assert_eq!(to_hex(&block), "714772f339841d34");
        c.decrypt_block(&mut block).unwrap();
        assert_eq!(to_hex(&block), "6bc1bee22e409f96");
    }

    #[test]
    fn test_3des_equal_keys_is_single_des() {
        let single = hex("133457799BBCDFF1");
        let key = [single.clone(), single.clone(), single].concat();
        let c = TripleDesKey::new(&key).unwrap();
        let mut block = hex("0123456789ABCDEF");
        c.encrypt_block(&mut block).unwrap();
        assert_eq!(to_hex(&block), "85e813540f0ab405");
    }

    #[test]
    fn test_3des_two_key_and_bad_lengths() {
        let two = hex("0123456789abcdef23456789abcdef01");
        let three = hex("0123456789abcdef23456789abcdef010123456789abcdef");
        let a = TripleDesKey::new(&two).unwrap();
        let b = TripleDesKey::new(&three).unwrap();
        let mut x = [7u8; 8];
        let mut y = [7u8; 8];
        a.encrypt_block(&mut x).unwrap();
        b.encrypt_block(&mut y).unwrap();
        assert_eq!(x, y);
        assert_eq!(TripleDesKey::new(&[0u8; 8]).err(), Some(CryptoError::InvalidKeyLength(8)));
    }
}
