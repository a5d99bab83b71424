//! SHA-1 message digest (FIPS 180-4).
//!
//! Used by TLS 1.2 CBC cipher suites (HMAC-SHA1) and legacy certificate
//! fingerprints.

use crate::hash::buffer::BlockBuffer;
use mantis_types::CryptoError;
use zeroize::Zeroize;

/// SHA-1 output size in bytes.
pub const SHA1_OUTPUT_SIZE: usize = 20;
const BLOCK_SIZE: usize = 64;

const INIT: [u32; 5] = [0x67452301, 0xEFCDAB89, 0x98BADCFE, 0x10325476, 0xC3D2E1F0];

/// SHA-1 hash context.
#[derive(Clone)]
pub struct Sha1 {
    state: [u32; 5],
    buffer: BlockBuffer<BLOCK_SIZE>,
    done: Option<[u8; SHA1_OUTPUT_SIZE]>,
}

impl Drop for Sha1 {
    fn drop(&mut self) {
        self.state.zeroize();
        self.done.zeroize();
    }
}

impl Default for Sha1 {
    fn default() -> Self {
        Self::new()
    }
}

impl Sha1 {
    pub fn new() -> Self {
        Self {
            state: INIT,
            buffer: BlockBuffer::new(),
            done: None,
        }
    }

    pub fn update(&mut self, data: &[u8]) -> Result<(), CryptoError> {
        if self.done.is_some() {
            return Err(CryptoError::HashFinalized);
        }
        let state = &mut self.state;
        self.buffer.update(data, |block| compress(state, block));
        Ok(())
    }

    /// Finalize and return the 20-byte digest; repeated calls return the
    /// cached value.
    pub fn finish(&mut self) -> Result<[u8; SHA1_OUTPUT_SIZE], CryptoError> {
        if let Some(d) = self.done {
            return Ok(d);
        }
        let state = &mut self.state;
        self.buffer.finalize(8, true, |block| compress(state, block));
        let mut out = [0u8; SHA1_OUTPUT_SIZE];
        for (chunk, word) in out.chunks_exact_mut(4).zip(self.state.iter()) {
            chunk.copy_from_slice(&word.to_be_bytes());
        }
        self.done = Some(out);
        Ok(out)
    }

    pub fn reset(&mut self) {
        self.state = INIT;
        self.buffer.reset();
        self.done = None;
    }

    pub fn digest(data: &[u8]) -> Result<[u8; SHA1_OUTPUT_SIZE], CryptoError> {
        let mut ctx = Self::new();
        ctx.update(data)?;
        ctx.finish()
    }
}

fn compress(state: &mut [u32; 5], block: &[u8]) {
    let mut w = [0u32; 80];
    for (i, chunk) in block.chunks_exact(4).enumerate() {
        w[i] = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    for i in 16..80 {
        w[i] = (w[i - 3] ^ w[i - 8] ^ w[i - 14] ^ w[i - 16]).rotate_left(1);
    }
    let [mut a, mut b, mut c, mut d, mut e] = *state;
    for (i, &wi) in w.iter().enumerate() {
        let (f, k) = match i {
            0..=19 => ((b & c) | (!b & d), 0x5A827999),
            20..=39 => (b ^ c ^ d, 0x6ED9EBA1),
            40..=59 => ((b & c) | (b & d) | (c & d), 0x8F1BBCDC),
            _ => (b ^ c ^ d, 0xCA62C1D6u32),
        };
        let t = a
            .rotate_left(5)
            .wrapping_add(f)
            .wrapping_add(e)
            .wrapping_add(k)
            .wrapping_add(wi);
        e = d;
        d = c;
        c = b.rotate_left(30);
        b = a;
        a = t;
    }
    state[0] = state[0].wrapping_add(a);
    state[1] = state[1].wrapping_add(b);
    state[2] = state[2].wrapping_add(c);
    state[3] = state[3].wrapping_add(d);
    state[4] = state[4].wrapping_add(e);
}
