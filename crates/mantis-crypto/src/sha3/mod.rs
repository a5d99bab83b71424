//! SHA-3 hash functions and the SHAKE extendable-output functions (FIPS 202).

use mantis_types::CryptoError;
use zeroize::Zeroize;

const ROUND_CONSTANTS: [u64; 24] = [
    0x0000000000000001, 0x0000000000008082, 0x800000000000808A, 0x8000000080008000,
    0x000000000000808B, 0x0000000080000001, 0x8000000080008081, 0x8000000000008009,
    0x000000000000008A, 0x0000000000000088, 0x0000000080008009, 0x000000008000000A,
    0x000000008000808B, 0x800000000000008B, 0x8000000000008089, 0x8000000000008003,
    0x8000000000008002, 0x8000000000000080, 0x000000000000800A, 0x800000008000000A,
    0x8000000080008081, 0x8000000000008080, 0x0000000080000001, 0x8000000080008008,
];

/// ρ offsets indexed by lane `x + 5y`.
const RHO: [u32; 25] = [
    0, 1, 62, 28, 27, 36, 44, 6, 55, 20, 3, 10, 43, 25, 39, 41, 45, 15, 21, 8, 18, 2, 61, 56, 14,
];

const MAX_RATE: usize = 168;

fn keccak_f1600(a: &mut [u64; 25]) {
    for &rc in ROUND_CONSTANTS.iter() {
        let mut c = [0u64; 5];
        for (x, cx) in c.iter_mut().enumerate() {
            *cx = a[x] ^ a[x + 5] ^ a[x + 10] ^ a[x + 15] ^ a[x + 20];
        }
        for x in 0..5 {
            let d = c[(x + 4) % 5] ^ c[(x + 1) % 5].rotate_left(1);
            for y in 0..5 {
                a[x + 5 * y] ^= d;
            }
        }
        let mut b = [0u64; 25];
        for x in 0..5 {
            for y in 0..5 {
                b[y + 5 * ((2 * x + 3 * y) % 5)] = a[x + 5 * y].rotate_left(RHO[x + 5 * y]);
            }
        }
        for y in 0..5 {
            for x in 0..5 {
                a[x + 5 * y] = b[x + 5 * y] ^ (!b[(x + 1) % 5 + 5 * y] & b[(x + 2) % 5 + 5 * y]);
            }
        }
        a[0] ^= rc;
    }
}

/// Keccak sponge with a byte-oriented absorb/squeeze interface.
#[derive(Clone)]
struct Sponge {
    lanes: [u64; 25],
    rate: usize,
    suffix: u8,
    /// Bytes absorbed into the current block, or squeezed from it.
    pos: usize,
    squeezing: bool,
}

impl Sponge {
    fn new(rate: usize, suffix: u8) -> Self {
        Self {
            lanes: [0u64; 25],
            rate,
            suffix,
            pos: 0,
            squeezing: false,
        }
    }

    fn xor_byte(&mut self, idx: usize, byte: u8) {
        self.lanes[idx / 8] ^= (byte as u64) << (8 * (idx % 8));
    }

    fn byte(&self, idx: usize) -> u8 {
        (self.lanes[idx / 8] >> (8 * (idx % 8))) as u8
    }

    fn absorb(&mut self, data: &[u8]) {
        for &byte in data {
            self.xor_byte(self.pos, byte);
            self.pos += 1;
            if self.pos == self.rate {
                keccak_f1600(&mut self.lanes);
                self.pos = 0;
            }
        }
    }

    fn pad(&mut self) {
        self.xor_byte(self.pos, self.suffix);
        self.xor_byte(self.rate - 1, 0x80);
        keccak_f1600(&mut self.lanes);
        self.pos = 0;
        self.squeezing = true;
    }

    fn squeeze(&mut self, out: &mut [u8]) {
        if !self.squeezing {
            self.pad();
        }
        for o in out.iter_mut() {
            if self.pos == self.rate {
                keccak_f1600(&mut self.lanes);
                self.pos = 0;
            }
            *o = self.byte(self.pos);
            self.pos += 1;
        }
    }

    fn reset(&mut self) {
        self.lanes.zeroize();
        self.pos = 0;
        self.squeezing = false;
    }
}

impl Drop for Sponge {
    fn drop(&mut self) {
        self.lanes.zeroize();
    }
}

// ---------------------------------------------------------------------------
// Fixed-output SHA-3
// ---------------------------------------------------------------------------

/// A SHA-3 context with output length `N` bytes.
#[derive(Clone)]
pub struct Sha3<const N: usize> {
    sponge: Sponge,
    done: Option<[u8; N]>,
}

/// SHA3-224 context.
pub type Sha3_224 = Sha3<28>;
/// SHA3-256 context.
pub type Sha3_256 = Sha3<32>;
/// SHA3-384 context.
pub type Sha3_384 = Sha3<48>;
/// SHA3-512 context.
pub type Sha3_512 = Sha3<64>;

impl<const N: usize> Drop for Sha3<N> {
    fn drop(&mut self) {
        self.done.zeroize();
    }
}

impl<const N: usize> Default for Sha3<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Sha3<N> {
    /// Sponge rate in bytes for this output size.
    pub const RATE: usize = 200 - 2 * N;

    pub fn new() -> Self {
        debug_assert!(Self::RATE <= MAX_RATE);
        Self {
            sponge: Sponge::new(Self::RATE, 0x06),
            done: None,
        }
    }

    pub fn update(&mut self, data: &[u8]) -> Result<(), CryptoError> {
        if self.done.is_some() {
            return Err(CryptoError::HashFinalized);
        }
        self.sponge.absorb(data);
        Ok(())
    }

    /// Finalize and return the digest; later calls return the same value.
    pub fn finish(&mut self) -> Result<[u8; N], CryptoError> {
        if let Some(d) = self.done {
            return Ok(d);
        }
        let mut out = [0u8; N];
        self.sponge.squeeze(&mut out);
        self.done = Some(out);
        Ok(out)
    }

    pub fn reset(&mut self) {
        self.sponge.reset();
        self.done = None;
    }

    pub fn digest(data: &[u8]) -> Result<[u8; N], CryptoError> {
        let mut ctx = Self::new();
        ctx.update(data)?;
        ctx.finish()
    }
}

// ---------------------------------------------------------------------------
// SHAKE
// ---------------------------------------------------------------------------

/// SHAKE extendable-output function. Output may be squeezed in any number of
/// pieces; once squeezing starts no more input is accepted.
#[derive(Clone)]
pub struct Shake {
    sponge: Sponge,
}

impl Shake {
    /// SHAKE128.
    pub fn shake128() -> Self {
        Self {
            sponge: Sponge::new(168, 0x1f),
        }
    }

    /// SHAKE256.
    pub fn shake256() -> Self {
        Self {
            sponge: Sponge::new(136, 0x1f),
        }
    }

    pub fn update(&mut self, data: &[u8]) -> Result<(), CryptoError> {
        if self.sponge.squeezing {
            return Err(CryptoError::HashFinalized);
        }
        self.sponge.absorb(data);
        Ok(())
    }

    pub fn squeeze(&mut self, out: &mut [u8]) {
        self.sponge.squeeze(out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::to_hex;

    #[test]
    fn test_sha3_256_vectors() {
        assert_eq!(
            to_hex(&Sha3_256::digest(b"").unwrap()),
            "a7ffc6f8bf1ed76651c14756a061d662f580ff4de43b49fa82d80a4b80f8434a"
        );
        assert_eq!(
            to_hex(&Sha3_256::digest(b"abc").unwrap()),
            "3a985da74fe225b2045c172d6bd390bd855f086e3e9d525b46bfe24511431532"
        );
    }

    #[test]
    fn test_sha3_other_sizes_abc() {
        assert_eq!(
            to_hex(&Sha3_224::digest(b"abc").unwrap()),
            "e642824c3f8cf24ad09234ee7d3c766fc9a3a5168d0c94ad73b46fdf"
        );
        assert_eq!(
            to_hex(&Sha3_384::digest(b"abc").unwrap()),
            "ec01498288516fc926459f58e2c6ad8df9b473cb0fc08c2596da7cf0e49be4b2\
             98d88cea927ac7f539f1edf228376d25"
        );
        assert_eq!(
            to_hex(&Sha3_512::digest(b"abc").unwrap()),
            "b751850b1a57168a5693cd924b6b096e08f621827444f70d884f5d0240d2712e\
             10e116e9192af3c91a7ec57647e3934057340b4cf408d5a56592f8274eec53f0"
        );
    }

    #[test]
    fn test_sha3_rate_boundary_chunking() {
        let data = vec![0xa3u8; 200];
        let expected = Sha3_256::digest(&data).unwrap();
        let mut ctx = Sha3_256::new();
        ctx.update(&data[..135]).unwrap();
        ctx.update(&data[135..136]).unwrap();
        ctx.update(&data[136..]).unwrap();
        assert_eq!(ctx.finish().unwrap(), expected);
    }

    #[test]
    fn test_shake128_empty_and_incremental_squeeze() {
        let mut x = Shake::shake128();
        let mut out = [0u8; 32];
        x.squeeze(&mut out);
        assert_eq!(
            to_hex(&out),
            "7f9c2ba4e88f827d616045507605853ed73b8093f6efbc88eb1a6eacfa66ef26"
        );

        let mut y = Shake::shake128();
        let mut a = [0u8; 10];
        let mut b = [0u8; 22];
        y.squeeze(&mut a);
        y.squeeze(&mut b);
        assert_eq!([&a[..], &b[..]].concat(), out.to_vec());
        assert_eq!(y.update(b"late"), Err(CryptoError::HashFinalized));
    }

    #[test]
    fn test_shake256_empty() {
        let mut x = Shake::shake256();
        let mut out = [0u8; 32];
        x.squeeze(&mut out);
        assert_eq!(
            to_hex(&out),
            "46b9dd2b0ba88d13233b3feb743eeb243fcd52ea62b81b82b50c27646ed5762f"
        );
    }
}
