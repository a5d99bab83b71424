//! Ed25519 signatures (RFC 8032, pure variant).
//!
//! Unlike the other signature primitives, Ed25519 hashes the message itself
//! with SHA-512; callers pass the full message, not a digest.

use crate::curve25519::edwards::EdwardsPoint;
use crate::curve25519::scalar;
use crate::sha2::Sha512;
use mantis_types::{CryptoError, SecureRandom};
use zeroize::{Zeroize, Zeroizing};

pub const ED25519_KEY_SIZE: usize = 32;
pub const ED25519_SIGNATURE_SIZE: usize = 64;

fn sha512(parts: &[&[u8]]) -> Result<[u8; 64], CryptoError> {
    let mut h = Sha512::new();
    for p in parts {
        h.update(p)?;
    }
    h.finish()
}

/// An Ed25519 signing key: the 32-byte seed and the values expanded from it.
pub struct Ed25519KeyPair {
    seed: [u8; ED25519_KEY_SIZE],
    /// Clamped secret scalar `s`.
    scalar: [u8; 32],
    /// Second half of SHA-512(seed), keyed into the nonce.
    prefix: [u8; 32],
    public: Ed25519PublicKey,
}

impl Drop for Ed25519KeyPair {
    fn drop(&mut self) {
        self.seed.zeroize();
        self.scalar.zeroize();
        self.prefix.zeroize();
    }
}

impl std::fmt::Debug for Ed25519KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ed25519KeyPair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

impl Ed25519KeyPair {
    pub fn generate(rng: &mut dyn SecureRandom) -> Result<Self, CryptoError> {
        let mut seed = Zeroizing::new([0u8; ED25519_KEY_SIZE]);
        rng.fill_bytes(&mut seed[..])?;
        Self::from_seed(&seed[..])
    }

    pub fn from_seed(seed: &[u8]) -> Result<Self, CryptoError> {
        let seed: [u8; ED25519_KEY_SIZE] = seed
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength(seed.len()))?;
        let mut h = Zeroizing::new(sha512(&[&seed])?);
        let mut s = [0u8; 32];
        s.copy_from_slice(&h[..32]);
        s[0] &= 248;
        s[31] &= 127;
        s[31] |= 64;
        let mut prefix = [0u8; 32];
        prefix.copy_from_slice(&h[32..]);
        h.zeroize();

        let public = Ed25519PublicKey {
            bytes: EdwardsPoint::mul_base(&s).compress(),
        };
        Ok(Ed25519KeyPair {
            seed,
            scalar: s,
            prefix,
            public,
        })
    }

    pub fn seed(&self) -> &[u8; ED25519_KEY_SIZE] {
        &self.seed
    }

    pub fn public_key(&self) -> &Ed25519PublicKey {
        &self.public
    }

    pub fn sign(&self, message: &[u8]) -> Result<[u8; ED25519_SIGNATURE_SIZE], CryptoError> {
        let r = Zeroizing::new(scalar::reduce_wide(&sha512(&[&self.prefix, message])?));
        let big_r = EdwardsPoint::mul_base(&r).compress();
        let k = scalar::reduce_wide(&sha512(&[&big_r, &self.public.bytes, message])?);
        let s = scalar::mul_add(&k, &self.scalar, &r);

        let mut sig = [0u8; ED25519_SIGNATURE_SIZE];
        sig[..32].copy_from_slice(&big_r);
        sig[32..].copy_from_slice(&s);
        Ok(sig)
    }

    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<bool, CryptoError> {
        self.public.verify(message, signature)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ed25519PublicKey {
    bytes: [u8; ED25519_KEY_SIZE],
}

impl Ed25519PublicKey {
    /// Accepts any 32 bytes that decode to a curve point.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; ED25519_KEY_SIZE] =
            bytes.try_into().map_err(|_| CryptoError::EccInvalidPublicKey)?;
        if EdwardsPoint::decompress(&bytes).is_none() {
            return Err(CryptoError::EccInvalidPublicKey);
        }
        Ok(Ed25519PublicKey { bytes })
    }

    pub fn as_bytes(&self) -> &[u8; ED25519_KEY_SIZE] {
        &self.bytes
    }

    /// Checks `[S]B = R + [k]A`. Malformed signatures verify as `false`.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<bool, CryptoError> {
        if signature.len() != ED25519_SIGNATURE_SIZE {
            return Ok(false);
        }
        let mut r_bytes = [0u8; 32];
        let mut s = [0u8; 32];
        r_bytes.copy_from_slice(&signature[..32]);
        s.copy_from_slice(&signature[32..]);
        if !scalar::is_canonical(&s) {
            return Ok(false);
        }
        let a = EdwardsPoint::decompress(&self.bytes).ok_or(CryptoError::EccInvalidPublicKey)?;
        if EdwardsPoint::decompress(&r_bytes).is_none() {
            return Ok(false);
        }
        let k = scalar::reduce_wide(&sha512(&[&r_bytes, &self.bytes, message])?);
        let check = EdwardsPoint::mul_base(&s).add(&a.mul(&k).neg());
        Ok(check.compress() == r_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{hex, TestRng};

    struct Vector {
        seed: &'static str,
        public: &'static str,
        msg: &'static str,
        sig: &'static str,
    }

    const RFC8032: [Vector; 3] = [
        Vector {
            seed: "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60",
            public: "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a",
            msg: "",
            sig: "e5564300c360ac729086e2cc806e828a84877f1eb8e5d974d873e065224901555fb8821590a33bacc61e39701cf9b46bd25bf5f0595bbe24655141438e7a100b",
        },
        Vector {
            seed: "4ccd089b28ff96da9db6c346ec114e0f5b8a319f35aba624da8cf6ed4fb8a6fb",
            public: "3d4017c3e843895a92b70aa74d1b7ebc9c982ccf2ec4968cc0cd55f12af4660c",
            msg: "72",
            sig: "92a009a9f0d4cab8720e820b5f642540a2b27b5416503f8fb3762223ebdb69da085ac1e43e15996e458f3613d0f11d8c387b2eaeb4302aeeb00d291612bb0c00",
        },
        Vector {
            seed: "c5aa8df43f9f837bedb7442f31dcb7b166d38535076f094b85ce3a2e0b4458f7",
            public: "fc51cd8e6218a1a38da47ed00230f0580816ed13ba3303ac5deb911548908025",
            msg: "af82",
            sig: "6291d657deec24024827e69c3abe01a30ce548a284743a445e3680d7db5ac3ac18ff9b538d16f290ae67f760984dc6594a7c15e9716ed28dc027beceea1ec40a",
        },
    ];

    #[test]
    fn test_rfc8032_vectors() {
        for v in &RFC8032 {
            let kp = Ed25519KeyPair::from_seed(&hex(v.seed)).unwrap();
            assert_eq!(kp.public_key().as_bytes()[..], hex(v.public)[..]);
            let sig = kp.sign(&hex(v.msg)).unwrap();
            assert_eq!(sig[..], hex(v.sig)[..]);
            let pk = Ed25519PublicKey::from_bytes(&hex(v.public)).unwrap();
            assert!(pk.verify(&hex(v.msg), &sig).unwrap());
        }
    }

    #[test]
    fn test_verify_rejects_modified_inputs() {
        let kp = Ed25519KeyPair::generate(&mut TestRng(11)).unwrap();
        let sig = kp.sign(b"transcript hash").unwrap();
        assert!(kp.verify(b"transcript hash", &sig).unwrap());
        assert!(!kp.verify(b"transcript hasH", &sig).unwrap());
        let mut bad = sig;
        bad[5] ^= 1;
        assert!(!kp.verify(b"transcript hash", &bad).unwrap());
        assert!(!kp.verify(b"transcript hash", &sig[..63]).unwrap());
    }

    #[test]
    fn test_verify_rejects_non_canonical_s() {
        let kp = Ed25519KeyPair::from_seed(&[9u8; 32]).unwrap();
        let mut sig = kp.sign(b"m").unwrap();
        // S + l is the same scalar but not the canonical encoding
        let l = hex("edd3f55c1a631258d69cf7a2def9de1400000000000000000000000000000010");
        let mut carry = 0u16;
        for (s, b) in sig[32..].iter_mut().zip(&l) {
            let t = *s as u16 + *b as u16 + carry;
            *s = t as u8;
            carry = t >> 8;
        }
        assert!(!kp.verify(b"m", &sig).unwrap());
    }

    #[test]
    fn test_bad_key_lengths() {
        assert_eq!(
            Ed25519KeyPair::from_seed(&[0u8; 31]).err(),
            Some(CryptoError::InvalidKeyLength(31))
        );
        assert!(Ed25519PublicKey::from_bytes(&[0u8; 33]).is_err());
    }
}
