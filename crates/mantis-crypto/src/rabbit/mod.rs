//! Rabbit stream cipher (RFC 4503).
//!
//! Keystream words are serialized little-endian, the byte order wolfCrypt
//! uses; RFC 4503 prints its test vectors most significant byte first.

use mantis_types::CryptoError;
use zeroize::Zeroize;

pub const RABBIT_KEY_SIZE: usize = 16;
pub const RABBIT_IV_SIZE: usize = 8;

const A: [u32; 8] = [
    0x4D34_D34D,
    0xD34D_34D3,
    0x34D3_4D34,
    0x4D34_D34D,
    0xD34D_34D3,
    0x34D3_4D34,
    0x4D34_D34D,
    0xD34D_34D3,
];

#[derive(Clone, Default)]
struct State {
    x: [u32; 8],
    c: [u32; 8],
    carry: u32,
}

impl Zeroize for State {
    fn zeroize(&mut self) {
        self.x.zeroize();
        self.c.zeroize();
        self.carry.zeroize();
    }
}

fn g(u: u32, v: u32) -> u32 {
    let s = u.wrapping_add(v) as u64;
    let sq = s * s;
    (sq as u32) ^ ((sq >> 32) as u32)
}

impl State {
    fn next(&mut self) {
        for j in 0..8 {
            let t = self.c[j] as u64 + A[j] as u64 + self.carry as u64;
            self.carry = (t >> 32) as u32;
            self.c[j] = t as u32;
        }
        let mut gv = [0u32; 8];
        for j in 0..8 {
            gv[j] = g(self.x[j], self.c[j]);
        }
        for j in 0..8 {
            let (p1, p2) = ((j + 7) % 8, (j + 6) % 8);
            self.x[j] = if j % 2 == 0 {
                gv[j]
                    .wrapping_add(gv[p1].rotate_left(16))
                    .wrapping_add(gv[p2].rotate_left(16))
            } else {
                gv[j].wrapping_add(gv[p1].rotate_left(8)).wrapping_add(gv[p2])
            };
        }
        gv.zeroize();
    }

    fn extract(&self) -> [u8; 16] {
        let x = &self.x;
        let words = [
            x[0] ^ (x[5] >> 16) ^ (x[3] << 16),
            x[2] ^ (x[7] >> 16) ^ (x[5] << 16),
            x[4] ^ (x[1] >> 16) ^ (x[7] << 16),
            x[6] ^ (x[3] >> 16) ^ (x[1] << 16),
        ];
        let mut out = [0u8; 16];
        for (chunk, w) in out.chunks_exact_mut(4).zip(words) {
            chunk.copy_from_slice(&w.to_le_bytes());
        }
        out
    }
}

/// Rabbit keystream generator with a 128-bit key and optional 64-bit IV.
///
/// Keystream position carries across [`Rabbit::apply_keystream`] calls.
pub struct Rabbit {
    master: State,
    work: State,
    block: [u8; 16],
    used: usize,
}

impl Drop for Rabbit {
    fn drop(&mut self) {
        self.master.zeroize();
        self.work.zeroize();
        self.block.zeroize();
    }
}

impl Rabbit {
    pub fn new(key: &[u8], iv: Option<&[u8]>) -> Result<Self, CryptoError> {
        if key.len() != RABBIT_KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength(key.len()));
        }
        let mut k = [0u32; 8];
        for (w, b) in k.iter_mut().zip(key.chunks_exact(2)) {
            *w = u16::from_le_bytes([b[0], b[1]]) as u32;
        }
        let mut master = State::default();
        for j in 0..8 {
            if j % 2 == 0 {
                master.x[j] = (k[(j + 1) % 8] << 16) | k[j];
                master.c[j] = (k[(j + 4) % 8] << 16) | k[(j + 5) % 8];
            } else {
                master.x[j] = (k[(j + 5) % 8] << 16) | k[(j + 4) % 8];
                master.c[j] = (k[j] << 16) | k[(j + 1) % 8];
            }
        }
        k.zeroize();
        for _ in 0..4 {
            master.next();
        }
        for j in 0..8 {
            master.c[j] ^= master.x[(j + 4) % 8];
        }
        let mut r = Rabbit {
            work: master.clone(),
            master,
            block: [0; 16],
            used: 16,
        };
        if let Some(iv) = iv {
            r.set_iv(iv)?;
        }
        Ok(r)
    }

    /// Restart the keystream from the key state mixed with a new IV.
    pub fn set_iv(&mut self, iv: &[u8]) -> Result<(), CryptoError> {
        if iv.len() != RABBIT_IV_SIZE {
            return Err(CryptoError::InvalidIvLength);
        }
        let i0 = u32::from_le_bytes([iv[0], iv[1], iv[2], iv[3]]);
        let i2 = u32::from_le_bytes([iv[4], iv[5], iv[6], iv[7]]);
        let i1 = (i0 >> 16) | (i2 & 0xffff_0000);
        let i3 = (i2 << 16) | (i0 & 0x0000_ffff);
        let mix = [i0, i1, i2, i3];

        self.work = self.master.clone();
        for j in 0..8 {
            self.work.c[j] ^= mix[j % 4];
        }
        for _ in 0..4 {
            self.work.next();
        }
        self.used = 16;
        Ok(())
    }

    pub fn apply_keystream(&mut self, data: &mut [u8]) {
        for b in data.iter_mut() {
            if self.used == 16 {
                self.work.next();
                self.block = self.work.extract();
                self.used = 0;
            }
            *b ^= self.block[self.used];
            self.used += 1;
        }
    }
}
