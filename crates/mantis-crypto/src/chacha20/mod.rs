//! ChaCha20 stream cipher, Poly1305 one-time authenticator and the
//! ChaCha20-Poly1305 AEAD construction (RFC 8439).

use crate::provider::Mac;
use mantis_types::CryptoError;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, Zeroizing};

/// ChaCha20 key size in bytes.
pub const CHACHA20_KEY_SIZE: usize = 32;
/// IETF nonce size in bytes.
pub const CHACHA20_NONCE_SIZE: usize = 12;
/// Poly1305 tag size in bytes.
pub const POLY1305_TAG_SIZE: usize = 16;
/// Poly1305 one-time key size in bytes.
pub const POLY1305_KEY_SIZE: usize = 32;

const SIGMA: [u32; 4] = [0x6170_7865, 0x3320_646e, 0x7962_2d32, 0x6b20_6574];

// ---- block function ----

fn load_le32(b: &[u8]) -> u32 {
    u32::from_le_bytes([b[0], b[1], b[2], b[3]])
}

fn load_le64(b: &[u8]) -> u64 {
    let mut w = [0u8; 8];
    w.copy_from_slice(&b[..8]);
    u64::from_le_bytes(w)
}

#[inline(always)]
fn qr(x: &mut [u32; 16], a: usize, b: usize, c: usize, d: usize) {
    x[a] = x[a].wrapping_add(x[b]);
    x[d] = (x[d] ^ x[a]).rotate_left(16);
    x[c] = x[c].wrapping_add(x[d]);
    x[b] = (x[b] ^ x[c]).rotate_left(12);
    x[a] = x[a].wrapping_add(x[b]);
    x[d] = (x[d] ^ x[a]).rotate_left(8);
    x[c] = x[c].wrapping_add(x[d]);
    x[b] = (x[b] ^ x[c]).rotate_left(7);
}

/// One 64-byte keystream block for `(key, counter, nonce)`.
fn keystream_block(key: &[u32; 8], counter: u32, nonce: &[u32; 3], out: &mut [u8; 64]) {
    let mut input = [0u32; 16];
    input[..4].copy_from_slice(&SIGMA);
    input[4..12].copy_from_slice(key);
    input[12] = counter;
    input[13..].copy_from_slice(nonce);

    let mut x = input;
    for _ in 0..10 {
        qr(&mut x, 0, 4, 8, 12);
        qr(&mut x, 1, 5, 9, 13);
        qr(&mut x, 2, 6, 10, 14);
        qr(&mut x, 3, 7, 11, 15);
        qr(&mut x, 0, 5, 10, 15);
        qr(&mut x, 1, 6, 11, 12);
        qr(&mut x, 2, 7, 8, 13);
        qr(&mut x, 3, 4, 9, 14);
    }
    for (i, (w, init)) in x.iter().zip(input.iter()).enumerate() {
        out[4 * i..4 * i + 4].copy_from_slice(&w.wrapping_add(*init).to_le_bytes());
    }
    x.zeroize();
    input.zeroize();
}

// ---- ChaCha20 ----

/// ChaCha20 keyed with a 256-bit key. The nonce and initial block counter
/// are supplied per call.
#[derive(Clone)]
pub struct ChaCha20 {
    key: [u32; 8],
}

impl Drop for ChaCha20 {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl ChaCha20 {
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        if key.len() != CHACHA20_KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength(key.len()));
        }
        let mut k = [0u32; 8];
        for (w, chunk) in k.iter_mut().zip(key.chunks_exact(4)) {
            *w = load_le32(chunk);
        }
        Ok(ChaCha20 { key: k })
    }

    /// XOR `data` with the keystream starting at block `counter`.
    /// Encryption and decryption are the same operation.
    pub fn apply_keystream(
        &self,
        nonce: &[u8],
        counter: u32,
        data: &mut [u8],
    ) -> Result<(), CryptoError> {
        if nonce.len() != CHACHA20_NONCE_SIZE {
            return Err(CryptoError::InvalidIvLength);
        }
        let n = [load_le32(&nonce[0..]), load_le32(&nonce[4..]), load_le32(&nonce[8..])];
        let blocks = data.len().div_ceil(64) as u64;
        if counter as u64 + blocks > 1u64 << 32 {
            return Err(CryptoError::InputOverflow);
        }
        let mut ks = Zeroizing::new([0u8; 64]);
        for (i, chunk) in data.chunks_mut(64).enumerate() {
            keystream_block(&self.key, counter.wrapping_add(i as u32), &n, &mut ks);
            for (d, k) in chunk.iter_mut().zip(ks.iter()) {
                *d ^= k;
            }
        }
        Ok(())
    }
}

// ---- Poly1305 ----

const MASK44: u64 = 0xfff_ffff_ffff;
const MASK42: u64 = 0x3ff_ffff_ffff;

/// Poly1305 with 44/44/42-bit limbs and 128-bit products.
///
/// The key must never be used for more than one message; the AEAD derives a
/// fresh one per nonce.
#[derive(Clone)]
pub struct Poly1305 {
    r: [u64; 3],
    pad: [u64; 2],
    h: [u64; 3],
    buf: [u8; 16],
    buf_len: usize,
}

impl Drop for Poly1305 {
    fn drop(&mut self) {
        self.r.zeroize();
        self.pad.zeroize();
        self.h.zeroize();
        self.buf.zeroize();
    }
}

impl Poly1305 {
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        if key.len() != POLY1305_KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength(key.len()));
        }
        let t0 = load_le64(&key[0..]);
        let t1 = load_le64(&key[8..]);
        // clamping folded into the limb masks
        let r = [
            t0 & 0xffc_0fff_ffff,
            ((t0 >> 44) | (t1 << 20)) & 0xfff_ffc0_ffff,
            (t1 >> 24) & 0x00f_ffff_fc0f,
        ];
        Ok(Poly1305 {
            r,
            pad: [load_le64(&key[16..]), load_le64(&key[24..])],
            h: [0; 3],
            buf: [0; 16],
            buf_len: 0,
        })
    }

    fn block(&mut self, m: &[u8], hibit: u64) {
        let t0 = load_le64(&m[0..]);
        let t1 = load_le64(&m[8..]);
        let [r0, r1, r2] = self.r;
        let s1 = r1 * 20;
        let s2 = r2 * 20;

        let h0 = self.h[0] + (t0 & MASK44);
        let h1 = self.h[1] + (((t0 >> 44) | (t1 << 20)) & MASK44);
        let h2 = self.h[2] + (((t1 >> 24) & MASK42) | hibit);

        let mul = |a: u64, b: u64| a as u128 * b as u128;
        let d0 = mul(h0, r0) + mul(h1, s2) + mul(h2, s1);
        let mut d1 = mul(h0, r1) + mul(h1, r0) + mul(h2, s2);
        let mut d2 = mul(h0, r2) + mul(h1, r1) + mul(h2, r0);

        d1 += d0 >> 44;
        let mut h0 = d0 as u64 & MASK44;
        d2 += d1 >> 44;
        let mut h1 = d1 as u64 & MASK44;
        let c = (d2 >> 42) as u64;
        let h2 = d2 as u64 & MASK42;
        h0 += c * 5;
        h1 += h0 >> 44;
        h0 &= MASK44;
        self.h = [h0, h1, h2];
    }

    pub fn update(&mut self, mut data: &[u8]) {
        if self.buf_len > 0 {
            let take = (16 - self.buf_len).min(data.len());
            self.buf[self.buf_len..self.buf_len + take].copy_from_slice(&data[..take]);
            self.buf_len += take;
            data = &data[take..];
            if self.buf_len < 16 {
                return;
            }
            let b = self.buf;
            self.block(&b, 1 << 40);
            self.buf_len = 0;
        }
        let mut blocks = data.chunks_exact(16);
        for b in &mut blocks {
            self.block(b, 1 << 40);
        }
        let rest = blocks.remainder();
        self.buf[..rest.len()].copy_from_slice(rest);
        self.buf_len = rest.len();
    }

    fn tag(&self) -> [u8; 16] {
        let mut st = self.clone();
        if st.buf_len > 0 {
            let mut last = [0u8; 16];
            last[..st.buf_len].copy_from_slice(&st.buf[..st.buf_len]);
            last[st.buf_len] = 1;
            st.block(&last, 0);
        }
        let [mut h0, mut h1, mut h2] = st.h;
        for _ in 0..2 {
            h2 += h1 >> 44;
            h1 &= MASK44;
            h0 += (h2 >> 42) * 5;
            h2 &= MASK42;
            h1 += h0 >> 44;
            h0 &= MASK44;
        }

        // h - p; keep it unless it went negative
        let mut g0 = h0 + 5;
        let mut g1 = h1 + (g0 >> 44);
        g0 &= MASK44;
        let g2 = h2.wrapping_add(g1 >> 44).wrapping_sub(1 << 42);
        g1 &= MASK44;
        let keep_g = (g2 >> 63).wrapping_sub(1);
        h0 = (h0 & !keep_g) | (g0 & keep_g);
        h1 = (h1 & !keep_g) | (g1 & keep_g);
        h2 = (h2 & !keep_g) | (g2 & keep_g);

        let [p0, p1] = st.pad;
        h0 += p0 & MASK44;
        h1 += (((p0 >> 44) | (p1 << 20)) & MASK44) + (h0 >> 44);
        h0 &= MASK44;
        h2 += ((p1 >> 24) & MASK42) + (h1 >> 44);
        h1 &= MASK44;
        h2 &= MASK42;

        let mut out = [0u8; 16];
        out[..8].copy_from_slice(&(h0 | (h1 << 44)).to_le_bytes());
        out[8..].copy_from_slice(&((h1 >> 20) | (h2 << 24)).to_le_bytes());
        out
    }

    /// Consume the authenticator and return the tag.
    pub fn finish(self) -> [u8; 16] {
        self.tag()
    }

    /// One-shot tag.
    pub fn mac(key: &[u8], data: &[u8]) -> Result<[u8; 16], CryptoError> {
        let mut p = Poly1305::new(key)?;
        p.update(data);
        Ok(p.finish())
    }
}

impl Mac for Poly1305 {
    fn output_size(&self) -> usize {
        POLY1305_TAG_SIZE
    }

    fn update(&mut self, data: &[u8]) -> Result<(), CryptoError> {
        Poly1305::update(self, data);
        Ok(())
    }

    fn finish(&mut self, out: &mut [u8]) -> Result<(), CryptoError> {
        if out.len() < POLY1305_TAG_SIZE {
            return Err(CryptoError::BufferTooSmall {
                need: POLY1305_TAG_SIZE,
                got: out.len(),
            });
        }
        out[..POLY1305_TAG_SIZE].copy_from_slice(&self.tag());
        Ok(())
    }

    fn reset(&mut self) {
        self.h = [0; 3];
        self.buf.zeroize();
        self.buf_len = 0;
    }
}

// ---- ChaCha20-Poly1305 ----

/// ChaCha20-Poly1305 AEAD (RFC 8439 section 2.8).
#[derive(Clone)]
pub struct ChaCha20Poly1305 {
    cipher: ChaCha20,
}

impl ChaCha20Poly1305 {
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        Ok(ChaCha20Poly1305 {
            cipher: ChaCha20::new(key)?,
        })
    }

    fn tag(&self, nonce: &[u8], aad: &[u8], ct: &[u8]) -> Result<[u8; 16], CryptoError> {
        let mut otk = Zeroizing::new([0u8; 64]);
        self.cipher.apply_keystream(nonce, 0, &mut otk[..])?;
        let mut mac = Poly1305::new(&otk[..32])?;
        let zeros = [0u8; 16];
        mac.update(aad);
        mac.update(&zeros[..(16 - aad.len() % 16) % 16]);
        mac.update(ct);
        mac.update(&zeros[..(16 - ct.len() % 16) % 16]);
        mac.update(&(aad.len() as u64).to_le_bytes());
        mac.update(&(ct.len() as u64).to_le_bytes());
        Ok(mac.finish())
    }

    /// Returns `ciphertext || tag`.
    pub fn encrypt(&self, nonce: &[u8], aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut out = Vec::with_capacity(plaintext.len() + POLY1305_TAG_SIZE);
        out.extend_from_slice(plaintext);
        self.cipher.apply_keystream(nonce, 1, &mut out)?;
        let tag = self.tag(nonce, aad, &out)?;
        out.extend_from_slice(&tag);
        Ok(out)
    }

    /// Verifies the trailing tag, then decrypts.
    pub fn decrypt(&self, nonce: &[u8], aad: &[u8], input: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if nonce.len() != CHACHA20_NONCE_SIZE {
            return Err(CryptoError::InvalidIvLength);
        }
        if input.len() < POLY1305_TAG_SIZE {
            return Err(CryptoError::AeadTagVerifyFail);
        }
        let (ct, tag) = input.split_at(input.len() - POLY1305_TAG_SIZE);
        let expected = self.tag(nonce, aad, ct)?;
        if !bool::from(expected[..].ct_eq(tag)) {
            return Err(CryptoError::AeadTagVerifyFail);
        }
        let mut out = ct.to_vec();
        self.cipher.apply_keystream(nonce, 1, &mut out)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::hex;

    const SUNSCREEN: &[u8] = b"Ladies and Gentlemen of the class of '99: If I could offer you only one tip for the future, sunscreen would be it.";

    fn seq_key() -> Vec<u8> {
        (0u8..32).collect()
    }

    #[test]
    fn test_keystream_block_rfc8439_2_3_2() {
        let c = ChaCha20::new(&seq_key()).unwrap();
        let mut block = [0u8; 64];
        c.apply_keystream(&hex("000000090000004a00000000"), 1, &mut block).unwrap();
        assert_eq!(
            block.to_vec(),
            hex("10f1e7e4d13b5915500fdd1fa32071c4c7d1f4c733c068030422aa9ac3d46c4e
                 d2826446079faa0914c2d705d98b02a2b5129cd1de164eb9cbd083e8a2503c4e")
        );
    }

    #[test]
    fn test_encrypt_rfc8439_2_4_2() {
        let c = ChaCha20::new(&seq_key()).unwrap();
        let nonce = hex("000000000000004a00000000");
        let mut data = SUNSCREEN.to_vec();
        c.apply_keystream(&nonce, 1, &mut data).unwrap();
        assert_eq!(
            data,
            hex("6e2e359a2568f98041ba0728dd0d6981e97e7aec1d4360c20a27afccfd9fae0b
                 f91b65c5524733ab8f593dabcd62b3571639d624e65152ab8f530c359f0861d8
                 07ca0dbf500d6a6156a38e088a22b65e52bc514d16ccf806818ce91ab7793736
                 5af90bbf74a35be6b40b8eedf2785e42874d")
        );
        c.apply_keystream(&nonce, 1, &mut data).unwrap();
        assert_eq!(data, SUNSCREEN);
    }

    #[test]
    fn test_bad_lengths() {
        assert_eq!(ChaCha20::new(&[0u8; 16]).err(), Some(CryptoError::InvalidKeyLength(16)));
        let c = ChaCha20::new(&[0u8; 32]).unwrap();
        assert_eq!(
            c.apply_keystream(&[0u8; 8], 0, &mut [0u8; 4]),
            Err(CryptoError::InvalidIvLength)
        );
        assert!(Poly1305::new(&[0u8; 31]).is_err());
    }

    #[test]
    fn test_counter_exhaustion() {
        let c = ChaCha20::new(&[0u8; 32]).unwrap();
        let mut two_blocks = [0u8; 65];
        assert_eq!(
            c.apply_keystream(&[0u8; 12], u32::MAX, &mut two_blocks),
            Err(CryptoError::InputOverflow)
        );
        assert!(c.apply_keystream(&[0u8; 12], u32::MAX, &mut two_blocks[..64]).is_ok());
    }

    #[test]
    fn test_poly1305_rfc8439_2_5_2() {
        let key = hex("85d6be7857556d337f4452fe42d506a80103808afb0db2fd4abff6af4149f51b");
        let tag = Poly1305::mac(&key, b"Cryptographic Forum Research Group").unwrap();
        assert_eq!(tag.to_vec(), hex("a8061dc1305136c6c22b8baf0c0127a9"));
    }

    #[test]
    fn test_poly1305_chunked_matches_oneshot() {
        let key = hex("85d6be7857556d337f4452fe42d506a80103808afb0db2fd4abff6af4149f51b");
        let msg: Vec<u8> = (0..200u32).map(|i| (i * 7) as u8).collect();
        let whole = Poly1305::mac(&key, &msg).unwrap();
        for split in [0usize, 1, 15, 16, 17, 100, 199] {
            let mut p = Poly1305::new(&key).unwrap();
            p.update(&msg[..split]);
            p.update(&[]);
            p.update(&msg[split..]);
            assert_eq!(p.finish(), whole, "split at {split}");
        }
    }

    #[test]
    fn test_poly1305_mac_trait_reset() {
        let key = [0x11u8; 32];
        let mut p = Poly1305::new(&key).unwrap();
        Mac::update(&mut p, b"first").unwrap();
        Mac::reset(&mut p);
        Mac::update(&mut p, b"second").unwrap();
        let mut out = [0u8; 16];
        Mac::finish(&mut p, &mut out).unwrap();
        assert_eq!(out, Poly1305::mac(&key, b"second").unwrap());
    }

    #[test]
    fn test_aead_rfc8439_2_8_2() {
        let key = hex("808182838485868788898a8b8c8d8e8f909192939495969798999a9b9c9d9e9f");
        let nonce = hex("070000004041424344454647");
        let aad = hex("50515253c0c1c2c3c4c5c6c7");
        let aead = ChaCha20Poly1305::new(&key).unwrap();
        let sealed = aead.encrypt(&nonce, &aad, SUNSCREEN).unwrap();
        assert_eq!(
            sealed,
            hex("d31a8d34648e60db7b86afbc53ef7ec2a4aded51296e08fea9e2b5a736ee62d6
                 3dbea45e8ca9671282fafb69da92728b1a71de0a9e060b2905d6a5b67ecd3b36
                 92ddbd7f2d778b8c9803aee328091b58fab324e4fad675945585808b4831d7bc
                 3ff4def08e4b7a9de576d26586cec64b6116
                 1ae10b594f09e26a7e902ecbd0600691")
        );
        assert_eq!(aead.decrypt(&nonce, &aad, &sealed).unwrap(), SUNSCREEN);
    }

    #[test]
    fn test_aead_rejects_tampering() {
        let aead = ChaCha20Poly1305::new(&[7u8; 32]).unwrap();
        let nonce = [1u8; 12];
        let mut sealed = aead.encrypt(&nonce, b"hdr", b"payload").unwrap();
        assert!(aead.decrypt(&nonce, b"hdx", &sealed).is_err());
        sealed[0] ^= 1;
        assert_eq!(
            aead.decrypt(&nonce, b"hdr", &sealed),
            Err(CryptoError::AeadTagVerifyFail)
        );
        assert_eq!(
            aead.decrypt(&nonce, b"hdr", &[0u8; 15]),
            Err(CryptoError::AeadTagVerifyFail)
        );
    }

    #[test]
    fn test_aead_empty_plaintext_is_tag_only() {
        let aead = ChaCha20Poly1305::new(&[7u8; 32]).unwrap();
        let sealed = aead.encrypt(&[0u8; 12], b"", b"").unwrap();
        assert_eq!(sealed.len(), POLY1305_TAG_SIZE);
        assert!(aead.decrypt(&[0u8; 12], b"", &sealed).unwrap().is_empty());
    }
}
