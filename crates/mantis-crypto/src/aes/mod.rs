//! AES block cipher (FIPS 197).
//!
//! Table-free in the sense that matters for timing: S-box lookups scan the
//! whole table (packed eight entries per word) and select with masks, and
//! the GF(2^8) arithmetic in MixColumns uses no data-dependent branches.

use crate::provider::BlockCipher;
use mantis_types::CryptoError;
use zeroize::Zeroize;

/// AES block size in bytes.
pub const AES_BLOCK_SIZE: usize = 16;

/// Forward S-box, entry `i` in byte `i % 8` of word `i / 8`.
const SBOX: [u64; 32] = [
    0xc56f6bf27b777c63, 0x76abd7fe2b670130, 0xf04759fa7dc982ca, 0xc072a49cafa2d4ad,
    0xccf73f362693fdb7, 0x1531d871f1e5a534, 0x9a059618c323c704, 0x75b227ebe2801207,
    0xa05a6e1b1a2c8309, 0x842fe329b3d63b52, 0x5bb1fc20ed00d153, 0xcf584c4a39becb6a,
    0x85334d43fbaaefd0, 0xa89f3c507f02f945, 0xf5389d928f40a351, 0xd2f3ff1021dab6bc,
    0x1744975fec130ccd, 0x73195d643d7ea7c4, 0x88902a22dc4f8160, 0xdb0b5ede14b8ee46,
    0x5c2406490a3a32e0, 0x79e4959162acd3c2, 0xa94ed58d6d37c8e7, 0x08ae7a65eaf4566c,
    0xc6b4a61c2e2578ba, 0x8a8bbd4b1f74dde8, 0x0ef6034866b53e70, 0x9e1dc186b9573561,
    0x948ed9691198f8e1, 0xdf2855cee9871e9b, 0x6842e6bf0d89a18c, 0x16bb54b00f2d9941,
];

/// Inverse S-box, same packing.
const INV_SBOX: [u64; 32] = [
    0x38a53630d56a0952, 0xfbd7f3819ea340bf, 0x87ff2f9b8239e37c, 0xcbe9dec444438e34,
    0x3d23c2a632947b54, 0x4ec3fa420b954cee, 0xb224d92866a12e08, 0x25d18b6d49a25b76,
    0x1698688664f6f872, 0x92b6655dcc5ca4d4, 0xdab9edfd5048706c, 0x849d8da75746155e,
    0x0ad3bc8c00abd890, 0x0645b3b80558e4f7, 0x020f3fca8f1e2cd0, 0x6b8a130103bdafc1,
    0xeadc674f4111913a, 0x73e6b4f0cecff297, 0x8535ade72274ac96, 0x6edf751ce837f9e2,
    0x89c5291d711af147, 0x1bbe18aa0e62b76f, 0x2079d2c64b3e56fc, 0xf45acd78fec0db9a,
    0x31c7078833a8dd1f, 0x5fec8027591012b1, 0x0d4ab519a97f5160, 0xef9cc9939f7ae52d,
    0xb0f52aae4d3be0a0, 0x619953833cbbebc8, 0x26d677ba7e042b17, 0x7d0c2155631469e1,
];

const RCON: [u8; 10] = [0x01, 0x02, 0x04, 0x08, 0x10, 0x20, 0x40, 0x80, 0x1b, 0x36];

#[inline]
fn ct_lookup(table: &[u64; 32], x: u8) -> u8 {
    let hi = (x >> 3) as u64;
    let mut word = 0u64;
    for (i, &w) in table.iter().enumerate() {
        // all ones when i == hi
        let mask = ((i as u64 ^ hi).wrapping_sub(1) >> 63).wrapping_neg();
        word |= w & mask;
    }
    (word >> ((x & 7) as u64 * 8)) as u8
}

#[inline]
fn xtime(b: u8) -> u8 {
    (b << 1) ^ (((b >> 7) & 1).wrapping_mul(0x1b))
}

/// An expanded AES key (128, 192 or 256 bit).
#[derive(Clone)]
pub struct AesKey {
    round_keys: [[u8; 16]; 15],
    rounds: usize,
}

impl Drop for AesKey {
    fn drop(&mut self) {
        self.round_keys.zeroize();
    }
}

impl AesKey {
    /// Expand a 16, 24 or 32 byte key. Any other length fails with
    /// `InvalidKeyLength`.
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        let nk = match key.len() {
            16 | 24 | 32 => key.len() / 4,
            n => return Err(CryptoError::InvalidKeyLength(n)),
        };
        let rounds = nk + 6;
        let total = 4 * (rounds + 1);
        let mut w = [[0u8; 4]; 60];
        for (i, word) in w.iter_mut().take(nk).enumerate() {
            word.copy_from_slice(&key[4 * i..4 * i + 4]);
        }
        for i in nk..total {
            let mut temp = w[i - 1];
            if i % nk == 0 {
                temp = [
                    ct_lookup(&SBOX, temp[1]) ^ RCON[i / nk - 1],
                    ct_lookup(&SBOX, temp[2]),
                    ct_lookup(&SBOX, temp[3]),
                    ct_lookup(&SBOX, temp[0]),
                ];
            } else if nk > 6 && i % nk == 4 {
                for b in temp.iter_mut() {
                    *b = ct_lookup(&SBOX, *b);
                }
            }
            for j in 0..4 {
                w[i][j] = w[i - nk][j] ^ temp[j];
            }
        }
        let mut round_keys = [[0u8; 16]; 15];
        for (r, rk) in round_keys.iter_mut().take(rounds + 1).enumerate() {
            for c in 0..4 {
                rk[4 * c..4 * c + 4].copy_from_slice(&w[4 * r + c]);
            }
        }
        w.zeroize();
        Ok(Self { round_keys, rounds })
    }

    /// Key length in bytes.
    pub fn key_size(&self) -> usize {
        (self.rounds - 6) * 4
    }

    /// Encrypt one 16-byte block in place.
    pub fn encrypt_block(&self, block: &mut [u8]) -> Result<(), CryptoError> {
        let state = as_block(block)?;
        add_round_key(state, &self.round_keys[0]);
        for round in 1..self.rounds {
            sub_bytes(state, &SBOX);
            shift_rows(state);
            mix_columns(state);
            add_round_key(state, &self.round_keys[round]);
        }
        sub_bytes(state, &SBOX);
        shift_rows(state);
        add_round_key(state, &self.round_keys[self.rounds]);
        Ok(())
    }

    /// Decrypt one 16-byte block in place.
    pub fn decrypt_block(&self, block: &mut [u8]) -> Result<(), CryptoError> {
        let state = as_block(block)?;
        add_round_key(state, &self.round_keys[self.rounds]);
        for round in (1..self.rounds).rev() {
            inv_shift_rows(state);
            sub_bytes(state, &INV_SBOX);
            add_round_key(state, &self.round_keys[round]);
            inv_mix_columns(state);
        }
        inv_shift_rows(state);
        sub_bytes(state, &INV_SBOX);
        add_round_key(state, &self.round_keys[0]);
        Ok(())
    }
}

impl BlockCipher for AesKey {
    fn block_size(&self) -> usize {
        AES_BLOCK_SIZE
    }

    fn encrypt_block(&self, block: &mut [u8]) -> Result<(), CryptoError> {
        AesKey::encrypt_block(self, block)
    }

    fn decrypt_block(&self, block: &mut [u8]) -> Result<(), CryptoError> {
        AesKey::decrypt_block(self, block)
    }
}

fn as_block(block: &mut [u8]) -> Result<&mut [u8; 16], CryptoError> {
    block.try_into().map_err(|_| CryptoError::InvalidArg)
}

fn add_round_key(state: &mut [u8; 16], rk: &[u8; 16]) {
    for (s, k) in state.iter_mut().zip(rk.iter()) {
        *s ^= k;
    }
}

fn sub_bytes(state: &mut [u8; 16], table: &[u64; 32]) {
    for b in state.iter_mut() {
        *b = ct_lookup(table, *b);
    }
}

fn shift_rows(s: &mut [u8; 16]) {
    let t = *s;
    for r in 1..4 {
        for c in 0..4 {
            s[r + 4 * c] = t[r + 4 * ((c + r) % 4)];
        }
    }
}

fn inv_shift_rows(s: &mut [u8; 16]) {
    let t = *s;
    for r in 1..4 {
        for c in 0..4 {
            s[r + 4 * c] = t[r + 4 * ((c + 4 - r) % 4)];
        }
    }
}

fn mix_columns(s: &mut [u8; 16]) {
    for col in s.chunks_exact_mut(4) {
        let [a0, a1, a2, a3] = [col[0], col[1], col[2], col[3]];
        let all = a0 ^ a1 ^ a2 ^ a3;
        col[0] ^= all ^ xtime(a0 ^ a1);
        col[1] ^= all ^ xtime(a1 ^ a2);
        col[2] ^= all ^ xtime(a2 ^ a3);
        col[3] ^= all ^ xtime(a3 ^ a0);
    }
}

fn inv_mix_columns(s: &mut [u8; 16]) {
    for col in s.chunks_exact_mut(4) {
        let a = [col[0], col[1], col[2], col[3]];
        let m = |x: u8| {
            let x2 = xtime(x);
            let x4 = xtime(x2);
            let x8 = xtime(x4);
            // (9x, 11x, 13x, 14x)
            (x8 ^ x, x8 ^ x2 ^ x, x8 ^ x4 ^ x, x8 ^ x4 ^ x2)
        };
        let m0 = m(a[0]);
        let m1 = m(a[1]);
        let m2 = m(a[2]);
        let m3 = m(a[3]);
        col[0] = m0.3 ^ m1.1 ^ m2.2 ^ m3.0;
        col[1] = m0.0 ^ m1.3 ^ m2.1 ^ m3.2;
        col[2] = m0.2 ^ m1.0 ^ m2.3 ^ m3.1;
        col[3] = m0.1 ^ m1.2 ^ m2.0 ^ m3.3;
    }
}
