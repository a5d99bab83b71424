//! X25519 key agreement (RFC 7748).

use crate::curve25519::field::Fe;
use mantis_types::{CryptoError, SecureRandom};
use subtle::{Choice, ConditionallySelectable, ConstantTimeEq};
use zeroize::{Zeroize, Zeroizing};

pub const X25519_KEY_SIZE: usize = 32;

const BASE_U: [u8; 32] = {
    let mut u = [0u8; 32];
    u[0] = 9;
    u
};

/// The X25519 function: Montgomery ladder over the u-coordinate.
///
/// `k` is clamped here, so callers may pass raw bytes.
pub fn x25519(k: &[u8; 32], u: &[u8; 32]) -> [u8; 32] {
    let mut scalar = Zeroizing::new(*k);
    scalar[0] &= 248;
    scalar[31] &= 127;
    scalar[31] |= 64;

    let x1 = Fe::from_bytes(u);
    let mut x2 = Fe::ONE;
    let mut z2 = Fe::ZERO;
    let mut x3 = x1;
    let mut z3 = Fe::ONE;
    let mut swap = Choice::from(0);

    for t in (0..255).rev() {
        let bit = Choice::from((scalar[t / 8] >> (t % 8)) & 1);
        swap ^= bit;
        Fe::conditional_swap(&mut x2, &mut x3, swap);
        Fe::conditional_swap(&mut z2, &mut z3, swap);
        swap = bit;

        let a = x2 + z2;
        let aa = a.square();
        let b = x2 - z2;
        let bb = b.square();
        let e = aa - bb;
        let c = x3 + z3;
        let d = x3 - z3;
        let da = d * a;
        let cb = c * b;
        x3 = (da + cb).square();
        z3 = x1 * (da - cb).square();
        x2 = aa * bb;
        z2 = e * (aa + e.mul_small(121_665));
    }
    Fe::conditional_swap(&mut x2, &mut x3, swap);
    Fe::conditional_swap(&mut z2, &mut z3, swap);

    (x2 * z2.invert()).to_bytes()
}

pub struct X25519PrivateKey {
    key: [u8; X25519_KEY_SIZE],
}

impl Drop for X25519PrivateKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct X25519PublicKey {
    key: [u8; X25519_KEY_SIZE],
}

impl X25519PrivateKey {
    pub fn generate(rng: &mut dyn SecureRandom) -> Result<Self, CryptoError> {
        let mut key = [0u8; X25519_KEY_SIZE];
        rng.fill_bytes(&mut key)?;
        Ok(X25519PrivateKey { key })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let key: [u8; X25519_KEY_SIZE] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength(bytes.len()))?;
        Ok(X25519PrivateKey { key })
    }

    pub fn public_key(&self) -> X25519PublicKey {
        X25519PublicKey {
            key: x25519(&self.key, &BASE_U),
        }
    }

    /// Shared secret with `peer`. A low-order peer point yields the all-zero
    /// output, which is refused with [`CryptoError::DegenerateSharedSecret`].
    pub fn diffie_hellman(&self, peer: &X25519PublicKey) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let shared = Zeroizing::new(x25519(&self.key, &peer.key));
        if bool::from(shared[..].ct_eq(&[0u8; 32][..])) {
            log::debug!("x25519 peer value has small order");
            return Err(CryptoError::DegenerateSharedSecret);
        }
        Ok(Zeroizing::new(shared.to_vec()))
    }
}

impl X25519PublicKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let key: [u8; X25519_KEY_SIZE] =
            bytes.try_into().map_err(|_| CryptoError::EccInvalidPublicKey)?;
        Ok(X25519PublicKey { key })
    }

    pub fn as_bytes(&self) -> &[u8; X25519_KEY_SIZE] {
        &self.key
    }
}
