//! MD5 message digest (RFC 1321).
//!
//! Kept for the TLS 1.2 PRF-era interoperability surface and legacy digests;
//! MD5 is not collision resistant and is never used for signatures.

use crate::hash::buffer::BlockBuffer;
use mantis_types::CryptoError;
use zeroize::Zeroize;

/// MD5 output size in bytes.
pub const MD5_OUTPUT_SIZE: usize = 16;
const BLOCK_SIZE: usize = 64;

const S: [u32; 64] = [
    7, 12, 17, 22, 7, 12, 17, 22, 7, 12, 17, 22, 7, 12, 17, 22, 5, 9, 14, 20, 5, 9, 14, 20, 5, 9,
    14, 20, 5, 9, 14, 20, 4, 11, 16, 23, 4, 11, 16, 23, 4, 11, 16, 23, 4, 11, 16, 23, 6, 10, 15,
    21, 6, 10, 15, 21, 6, 10, 15, 21, 6, 10, 15, 21,
];

const K: [u32; 64] = [
    0xd76aa478, 0xe8c7b756, 0x242070db, 0xc1bdceee, 0xf57c0faf, 0x4787c62a, 0xa8304613, 0xfd469501,
    0x698098d8, 0x8b44f7af, 0xffff5bb1, 0x895cd7be, 0x6b901122, 0xfd987193, 0xa679438e, 0x49b40821,
    0xf61e2562, 0xc040b340, 0x265e5a51, 0xe9b6c7aa, 0xd62f105d, 0x02441453, 0xd8a1e681, 0xe7d3fbc8,
    0x21e1cde6, 0xc33707d6, 0xf4d50d87, 0x455a14ed, 0xa9e3e905, 0xfcefa3f8, 0x676f02d9, 0x8d2a4c8a,
    0xfffa3942, 0x8771f681, 0x6d9d6122, 0xfde5380c, 0xa4beea44, 0x4bdecfa9, 0xf6bb4b60, 0xbebfbc70,
    0x289b7ec6, 0xeaa127fa, 0xd4ef3085, 0x04881d05, 0xd9d4d039, 0xe6db99e5, 0x1fa27cf8, 0xc4ac5665,
    0xf4292244, 0x432aff97, 0xab9423a7, 0xfc93a039, 0x655b59c3, 0x8f0ccc92, 0xffeff47d, 0x85845dd1,
    0x6fa87e4f, 0xfe2ce6e0, 0xa3014314, 0x4e0811a1, 0xf7537e82, 0xbd3af235, 0x2ad7d2bb, 0xeb86d391,
];

const INIT: [u32; 4] = [0x67452301, 0xefcdab89, 0x98badcfe, 0x10325476];

/// MD5 hash context.
#[derive(Clone)]
pub struct Md5 {
    state: [u32; 4],
    buffer: BlockBuffer<BLOCK_SIZE>,
    done: Option<[u8; MD5_OUTPUT_SIZE]>,
}

impl Drop for Md5 {
    fn drop(&mut self) {
        self.state.zeroize();
        self.done.zeroize();
    }
}

impl Default for Md5 {
    fn default() -> Self {
        Self::new()
    }
}

impl Md5 {
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

    /// Finalize and return the digest. Calling `finish` again without `reset`
    /// returns the same digest.
    pub fn finish(&mut self) -> Result<[u8; MD5_OUTPUT_SIZE], CryptoError> {
        if let Some(d) = self.done {
            return Ok(d);
        }
        let state = &mut self.state;
        self.buffer.finalize(8, false, |block| compress(state, block));
        let mut out = [0u8; MD5_OUTPUT_SIZE];
        for (chunk, word) in out.chunks_exact_mut(4).zip(self.state.iter()) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        self.done = Some(out);
        Ok(out)
    }

    pub fn reset(&mut self) {
        self.state = INIT;
        self.buffer.reset();
        self.done = None;
    }

    /// One-shot: compute the MD5 digest of `data`.
    pub fn digest(data: &[u8]) -> Result<[u8; MD5_OUTPUT_SIZE], CryptoError> {
        let mut ctx = Self::new();
        ctx.update(data)?;
        ctx.finish()
    }
}

fn compress(state: &mut [u32; 4], block: &[u8]) {
    let mut m = [0u32; 16];
    for (w, chunk) in m.iter_mut().zip(block.chunks_exact(4)) {
        *w = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    let [mut a, mut b, mut c, mut d] = *state;
    for i in 0..64 {
        let (f, g) = match i / 16 {
            0 => ((b & c) | (!b & d), i),
            1 => ((d & b) | (!d & c), (5 * i + 1) % 16),
            2 => (b ^ c ^ d, (3 * i + 5) % 16),
            _ => (c ^ (b | !d), (7 * i) % 16),
        };
        let tmp = d;
        d = c;
        c = b;
        b = b.wrapping_add(
            a.wrapping_add(f)
                .wrapping_add(K[i])
                .wrapping_add(m[g])
                .rotate_left(S[i]),
        );
        a = tmp;
    }
    state[0] = state[0].wrapping_add(a);
    state[1] = state[1].wrapping_add(b);
    state[2] = state[2].wrapping_add(c);
    state[3] = state[3].wrapping_add(d);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::to_hex;

    #[test]
    fn test_md5_rfc1321_vectors() {
        let cases: [(&[u8], &str); 4] = [
            (b"", "d41d8cd98f00b204e9800998ecf8427e"),
            (b"abc", "900150983cd24fb0d6963f7d28e17f72"),
            (b"message digest", "f96b697d7cb7938d525a2f31aaf161d0"),
            (
                b"12345678901234567890123456789012345678901234567890123456789012345678901234567890",
                "57edf4a22be3c955ac49da2e2107b67a",
            ),
        ];
        for (msg, expected) in cases {
            assert_eq!(to_hex(&Md5::digest(msg).unwrap()), expected);
        }
    }

    #[test]
    fn test_md5_finish_twice_and_update_after() {
        let mut ctx = Md5::new();
        ctx.update(b"abc").unwrap();
        let first = ctx.finish().unwrap();
        assert_eq!(ctx.finish().unwrap(), first);
        assert_eq!(ctx.update(b"x"), Err(CryptoError::HashFinalized));
        ctx.reset();
        ctx.update(b"abc").unwrap();
        assert_eq!(ctx.finish().unwrap(), first);
    }
}
