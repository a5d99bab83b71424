//! Camellia block cipher (RFC 3713).
//!
//! The four S-boxes are derived from SBOX1 by rotations; every lookup scans
//! the packed table with a mask.

use crate::provider::BlockCipher;
use mantis_types::CryptoError;
use zeroize::Zeroize;

/// Camellia block size in bytes.
pub const CAMELLIA_BLOCK_SIZE: usize = 16;

/// SBOX1 packed eight entries per word, entry `i` in byte `i % 8` of word `i / 8`.
const SBOX1: [u64; 32] = [
    0xe5c027b3ec2c8270, 0x41ae0cea355785e4, 0x21a51945936bef23, 0xbd92651d4e4f0eed,
    0xce1feb7c8fafb886, 0x1a0bc55e5fdc303e, 0x3d5d47d5ca39e1a6, 0x4d6c5651d65a01d9,
    0x2db0ccfb669a0d8b, 0x9984b1f0202b1274, 0x05767e34c2cb4cdf, 0xd70417d131a9b76d,
    0x1c111bde613a5814, 0x22f21853169c0f32, 0x917ab5c3b2cf44fe, 0x5069fc60a8e80824,
    0x976289a17da0d0aa, 0xd264ffe0951e5b54, 0xdb75f7a34800c410, 0x94dd3f09dae6038a,
    0x33904acd02835c87, 0xe2bf7f9df3f66773, 0x3bc637c826d89b52, 0x2e63be134b6f9681,
    0x8ebc6e9f8ca779e9, 0x59b4fd2fb6f9f529, 0xba7146e76a069878, 0xfa8da28842ab25d4,
    0x0aaceef855b90772, 0xa4f1383c682a4936, 0xc143c9bb7bd32840, 0x9e80c777f4ade315,
];

const SIGMA: [u64; 6] = [
    0xA09E667F3BCC908B,
    0xB67AE8584CAA73B2,
    0xC6EF372FE94F82BE,
    0x54FF53A5F1D36F1C,
    0x10E527FADE682D1D,
    0xB05688C2B3E6C1FD,
];

fn s1(x: u8) -> u8 {
    let hi = (x >> 3) as u64;
    let mut word = 0u64;
    for (i, &w) in SBOX1.iter().enumerate() {
        let mask = ((i as u64 ^ hi).wrapping_sub(1) >> 63).wrapping_neg();
        word |= w & mask;
    }
    (word >> ((x & 7) as u64 * 8)) as u8
}

fn s2(x: u8) -> u8 {
    s1(x).rotate_left(1)
}

fn s3(x: u8) -> u8 {
    s1(x).rotate_left(7)
}

fn s4(x: u8) -> u8 {
    s1(x.rotate_left(1))
}

fn f(input: u64, key: u64) -> u64 {
    let t = (input ^ key).to_be_bytes();
    let t = [
        s1(t[0]),
        s2(t[1]),
        s3(t[2]),
        s4(t[3]),
        s2(t[4]),
        s3(t[5]),
        s4(t[6]),
        s1(t[7]),
    ];
    let y = [
        t[0] ^ t[2] ^ t[3] ^ t[5] ^ t[6] ^ t[7],
        t[0] ^ t[1] ^ t[3] ^ t[4] ^ t[6] ^ t[7],
        t[0] ^ t[1] ^ t[2] ^ t[4] ^ t[5] ^ t[7],
        t[1] ^ t[2] ^ t[3] ^ t[4] ^ t[5] ^ t[6],
        t[0] ^ t[1] ^ t[5] ^ t[6] ^ t[7],
        t[1] ^ t[2] ^ t[4] ^ t[6] ^ t[7],
        t[2] ^ t[3] ^ t[4] ^ t[5] ^ t[7],
        t[0] ^ t[3] ^ t[4] ^ t[5] ^ t[6],
    ];
    u64::from_be_bytes(y)
}

fn fl(x: u64, k: u64) -> u64 {
    let (mut x1, mut x2) = ((x >> 32) as u32, x as u32);
    let (k1, k2) = ((k >> 32) as u32, k as u32);
    x2 ^= (x1 & k1).rotate_left(1);
    x1 ^= x2 | k2;
    ((x1 as u64) << 32) | x2 as u64
}

fn fl_inv(y: u64, k: u64) -> u64 {
    let (mut y1, mut y2) = ((y >> 32) as u32, y as u32);
    let (k1, k2) = ((k >> 32) as u32, k as u32);
    y1 ^= y2 | k2;
    y2 ^= (y1 & k1).rotate_left(1);
    ((y1 as u64) << 32) | y2 as u64
}

fn hi(x: u128) -> u64 {
    (x >> 64) as u64
}

fn lo(x: u128) -> u64 {
    x as u64
}

/// An expanded Camellia key.
#[derive(Clone)]
pub struct CamelliaKey {
    kw: [u64; 4],
    k: [u64; 24],
    ke: [u64; 6],
    /// 18 rounds for 128-bit keys, 24 otherwise.
    rounds: usize,
}

impl Drop for CamelliaKey {
    fn drop(&mut self) {
        self.kw.zeroize();
        self.k.zeroize();
        self.ke.zeroize();
    }
}

impl CamelliaKey {
    /// Expand a 16, 24 or 32 byte key.
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        let mut buf = [0u8; 16];
        buf.copy_from_slice(key.get(..16).ok_or(CryptoError::InvalidKeyLength(key.len()))?);
        let kl = u128::from_be_bytes(buf);
        let kr = match key.len() {
            16 => 0u128,
            24 => {
                let mut r = [0u8; 8];
                r.copy_from_slice(&key[16..24]);
                let r = u64::from_be_bytes(r);
                ((r as u128) << 64) | (!r) as u128
            }
            32 => {
                buf.copy_from_slice(&key[16..32]);
                u128::from_be_bytes(buf)
            }
            n => return Err(CryptoError::InvalidKeyLength(n)),
        };
        buf.zeroize();

        let mut d1 = hi(kl ^ kr);
        let mut d2 = lo(kl ^ kr);
        d2 ^= f(d1, SIGMA[0]);
        d1 ^= f(d2, SIGMA[1]);
        d1 ^= hi(kl);
        d2 ^= lo(kl);
        d2 ^= f(d1, SIGMA[2]);
        d1 ^= f(d2, SIGMA[3]);
        let ka = ((d1 as u128) << 64) | d2 as u128;

        let mut out = CamelliaKey {
            kw: [0; 4],
            k: [0; 24],
            ke: [0; 6],
            rounds: 18,
        };
        if key.len() == 16 {
            let r = |x: u128, n: u32| x.rotate_left(n);
            out.kw = [hi(kl), lo(kl), hi(r(ka, 111)), lo(r(ka, 111))];
            out.k[..18].copy_from_slice(&[
                hi(ka),
                lo(ka),
                hi(r(kl, 15)),
                lo(r(kl, 15)),
                hi(r(ka, 15)),
                lo(r(ka, 15)),
                hi(r(kl, 45)),
                lo(r(kl, 45)),
                hi(r(ka, 45)),
                lo(r(kl, 60)),
                hi(r(ka, 60)),
                lo(r(ka, 60)),
                hi(r(kl, 94)),
                lo(r(kl, 94)),
                hi(r(ka, 94)),
                lo(r(ka, 94)),
                hi(r(kl, 111)),
                lo(r(kl, 111)),
            ]);
            out.ke[..4].copy_from_slice(&[hi(r(ka, 30)), lo(r(ka, 30)), hi(r(kl, 77)), lo(r(kl, 77))]);
        } else {
            let mut d1 = hi(ka ^ kr);
            let mut d2 = lo(ka ^ kr);
            d2 ^= f(d1, SIGMA[4]);
            d1 ^= f(d2, SIGMA[5]);
            let kb = ((d1 as u128) << 64) | d2 as u128;
            let r = |x: u128, n: u32| x.rotate_left(n);
            out.rounds = 24;
            out.kw = [hi(kl), lo(kl), hi(r(kb, 111)), lo(r(kb, 111))];
            out.k = [
                hi(kb),
                lo(kb),
                hi(r(kr, 15)),
                lo(r(kr, 15)),
                hi(r(ka, 15)),
                lo(r(ka, 15)),
                hi(r(kb, 30)),
                lo(r(kb, 30)),
                hi(r(kl, 45)),
                lo(r(kl, 45)),
                hi(r(ka, 45)),
                lo(r(ka, 45)),
                hi(r(kr, 60)),
                lo(r(kr, 60)),
                hi(r(kb, 60)),
                lo(r(kb, 60)),
                hi(r(kl, 77)),
                lo(r(kl, 77)),
                hi(r(kr, 94)),
                lo(r(kr, 94)),
                hi(r(ka, 94)),
                lo(r(ka, 94)),
                hi(r(kl, 111)),
                lo(r(kl, 111)),
            ];
            out.ke = [
                hi(r(kr, 30)),
                lo(r(kr, 30)),
                hi(r(kl, 60)),
                lo(r(kl, 60)),
                hi(r(ka, 77)),
                lo(r(ka, 77)),
            ];
        }
        Ok(out)
    }

    /// Core Feistel network over the given subkey order.
    fn crypt(&self, block: &mut [u8], decrypt: bool) -> Result<(), CryptoError> {
        let b: [u8; 16] = (&*block).try_into().map_err(|_| CryptoError::InvalidArg)?;
        let m = u128::from_be_bytes(b);
        let n = self.rounds;
        let layers = n / 6 - 1;
        let kw = if decrypt {
            [self.kw[2], self.kw[3], self.kw[0], self.kw[1]]
        } else {
            self.kw
        };
        let mut d1 = hi(m) ^ kw[0];
        let mut d2 = lo(m) ^ kw[1];
        for i in (0..n).step_by(2) {
            let (ka, kb) = if decrypt {
                (self.k[n - 1 - i], self.k[n - 2 - i])
            } else {
                (self.k[i], self.k[i + 1])
            };
            d2 ^= f(d1, ka);
            d1 ^= f(d2, kb);
            let layer = (i + 2) / 6;
            if (i + 2) % 6 == 0 && layer <= layers {
                let j = layer - 1;
                let (e1, e2) = if decrypt {
                    (self.ke[2 * layers - 1 - 2 * j], self.ke[2 * layers - 2 - 2 * j])
                } else {
                    (self.ke[2 * j], self.ke[2 * j + 1])
                };
                d1 = fl(d1, e1);
                d2 = fl_inv(d2, e2);
            }
        }
        d2 ^= kw[2];
        d1 ^= kw[3];
        let c = ((d2 as u128) << 64) | d1 as u128;
        block.copy_from_slice(&c.to_be_bytes());
        Ok(())
    }

    pub fn encrypt_block(&self, block: &mut [u8]) -> Result<(), CryptoError> {
        self.crypt(block, false)
    }

    pub fn decrypt_block(&self, block: &mut [u8]) -> Result<(), CryptoError> {
        self.crypt(block, true)
    }
}

impl BlockCipher for CamelliaKey {
    fn block_size(&self) -> usize {
        CAMELLIA_BLOCK_SIZE
    }

    fn encrypt_block(&self, block: &mut [u8]) -> Result<(), CryptoError> {
        CamelliaKey::encrypt_block(self, block)
    }

    fn decrypt_block(&self, block: &mut [u8]) -> Result<(), CryptoError> {
        CamelliaKey::decrypt_block(self, block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{hex, to_hex};

    // RFC 3713 Appendix A
    #[test]
    fn test_camellia_rfc3713_vectors() {
        let pt = hex("0123456789abcdeffedcba9876543210");
        let cases = [
            (
                "0123456789abcdeffedcba9876543210",
                "67673138549669730857065648eabe43",
            ),
            (
                "0123456789abcdeffedcba98765432100011223344556677",
                "b4993401b3e996f84ee5cee7d79b09b9",
            ),
            (
                "0123456789abcdeffedcba987654321000112233445566778899aabbccddeeff",
                "9acc237dff16d76c20ef7c919e3a7509",
            ),
        ];
        for (key, ct) in cases {
            let c = CamelliaKey::new(&hex(key)).unwrap();
            let mut block = pt.clone();
            c.encrypt_block(&mut block).unwrap();
            assert_eq!(to_hex(&block), ct, "key {key}");
            c.decrypt_block(&mut block).unwrap();
            assert_eq!(block, pt);
        }
    }

    #[test]
    fn test_camellia_bad_key_length() {
        assert_eq!(
            CamelliaKey::new(&[0u8; 20]).err(),
            Some(CryptoError::InvalidKeyLength(20))
        );
        assert_eq!(
            CamelliaKey::new(&[0u8; 8]).err(),
            Some(CryptoError::InvalidKeyLength(8))
        );
    }
}
