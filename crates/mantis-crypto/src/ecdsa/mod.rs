//! ECDSA over P-256 and P-384 (FIPS 186-4 §6, ANSI X9.62).
//!
//! Signing and verification take a precomputed message digest; signatures
//! are the DER `SEQUENCE { r INTEGER, s INTEGER }` used by X.509 and TLS.

use mantis_bignum::BigNum;
use mantis_types::{CryptoError, EccCurveId, SecureRandom};
use mantis_utils::asn1::{Decoder, Encoder};
use zeroize::Zeroize;

use crate::ecc::{self, point, EcPoint};

/// Nonce draws before giving up on a degenerate (r, s).
const MAX_SIGN_ATTEMPTS: usize = 64;

pub struct EcdsaKeyPair {
    private_key: BigNum,
    public_key: EcdsaPublicKey,
}

impl Drop for EcdsaKeyPair {
    fn drop(&mut self) {
        self.private_key.zeroize();
    }
}

impl std::fmt::Debug for EcdsaKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EcdsaKeyPair")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

impl EcdsaKeyPair {
    pub fn generate(curve: EccCurveId, rng: &mut dyn SecureRandom) -> Result<Self, CryptoError> {
        let d = BigNum::random_range(ecc::order(curve), rng)?;
        Self::from_scalar(curve, d)
    }

    pub fn from_private_key(curve: EccCurveId, private_key: &[u8]) -> Result<Self, CryptoError> {
        let d = ecc::scalar_from_bytes(curve, private_key)?;
        Self::from_scalar(curve, d)
    }

    fn from_scalar(curve: EccCurveId, d: BigNum) -> Result<Self, CryptoError> {
        let q = EcPoint::generator(curve).mul_secret(&d)?;
        Ok(EcdsaKeyPair {
            private_key: d,
            public_key: EcdsaPublicKey { point: q },
        })
    }

    /// Private scalar, left-padded to the field size.
    pub fn private_key_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        self.private_key
            .to_bytes_be_padded(self.public_key.curve().field_size())
    }

    pub fn public_key(&self) -> &EcdsaPublicKey {
        &self.public_key
    }

    /// Sign `digest`, returning a DER signature.
    pub fn sign(&self, digest: &[u8], rng: &mut dyn SecureRandom) -> Result<Vec<u8>, CryptoError> {
        if digest.is_empty() {
            return Err(CryptoError::NullInput);
        }
        let curve = self.public_key.curve();
        let n = ecc::order(curve);
        let e = truncate_digest(digest, n.bit_len());
        let g = EcPoint::generator(curve);

        for _ in 0..MAX_SIGN_ATTEMPTS {
            let mut k = BigNum::random_range(n, rng)?;
            let r = g.mul_secret(&k)?.x().mod_reduce(n)?;
            if r.is_zero() {
                k.zeroize();
                continue;
            }
            let k_inv = k.mod_inv(n)?;
            k.zeroize();
            let dr = self.private_key.mod_mul(&r, n)?;
            let s = k_inv.mod_mul(&e.mod_add(&dr, n)?, n)?;
            if s.is_zero() {
                continue;
            }
            return Ok(encode_signature(&r, &s));
        }
        Err(CryptoError::BnRandGenFail)
    }

    pub fn verify(&self, digest: &[u8], signature: &[u8]) -> Result<bool, CryptoError> {
        self.public_key.verify(digest, signature)
    }
}

/// Verification key Q.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcdsaPublicKey {
    point: EcPoint,
}

impl EcdsaPublicKey {
    pub fn from_uncompressed(curve: EccCurveId, data: &[u8]) -> Result<Self, CryptoError> {
        Ok(EcdsaPublicKey {
            point: EcPoint::from_uncompressed(curve, data)?,
        })
    }

    pub fn curve(&self) -> EccCurveId {
        self.point.curve()
    }

    pub fn to_uncompressed(&self) -> Result<Vec<u8>, CryptoError> {
        self.point.to_uncompressed()
    }

    /// `Ok(false)` for a well-formed signature that does not verify; an
    /// error only for malformed DER.
    pub fn verify(&self, digest: &[u8], signature: &[u8]) -> Result<bool, CryptoError> {
        let curve = self.curve();
        let n = ecc::order(curve);
        let (r, s) = decode_signature(signature)?;
        if r.is_zero() || s.is_zero() || r >= *n || s >= *n {
            return Ok(false);
        }
        let e = truncate_digest(digest, n.bit_len());
        let w = s.mod_inv(n)?;
        let u1 = e.mod_mul(&w, n)?;
        let u2 = r.mod_mul(&w, n)?;
        let c = ecc::curves::params(curve);
        let sum = point::mul_add_public(&u1, &u2, &self.point.to_jacobian(), c)?;
        match sum.to_affine(&c.p)? {
            Some((x, _)) => Ok(x.mod_reduce(n)? == r),
            None => Ok(false),
        }
    }
}

/// Leftmost `n_bits` of the digest as an integer.
fn truncate_digest(digest: &[u8], n_bits: usize) -> BigNum {
    let e = BigNum::from_bytes_be(digest);
    let bits = digest.len() * 8;
    if bits > n_bits {
        e.shr(bits - n_bits)
    } else {
        e
    }
}

fn encode_signature(r: &BigNum, s: &BigNum) -> Vec<u8> {
    let mut enc = Encoder::new();
    enc.sequence(|seq| {
        seq.write_unsigned(&r.to_bytes_be())
            .write_unsigned(&s.to_bytes_be());
    });
    enc.finish()
}

fn decode_signature(der: &[u8]) -> Result<(BigNum, BigNum), CryptoError> {
    let mut outer = Decoder::new(der);
    let mut seq = outer.read_sequence()?;
    let r = BigNum::from_bytes_be(seq.read_unsigned()?);
    let s = BigNum::from_bytes_be(seq.read_unsigned()?);
    seq.finish()?;
    outer.finish()?;
    Ok((r, s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{hex, TestRng};

    const P256_D: &str = "4fbcf3229f4f39d75306badbb4ffdbe9fce265377509494bad166142bda03680";
    const P256_Q: &str = "04e1e39c597336d756a3ecd4bc1e034992c0021827c4f25159a7cb644f8a2a8d9b\
                          61d106eebab28c2afef121ebbce5b42672fa5da0fcd726466668552d4f528c6f";
    // SHA-256("sample")
    const P256_DIGEST: &str = "af2bdbe1aa9b6ec1e2ade1d694f41fc71a831d0268e9891562113d8a62add1bf";
    const P256_SIG: &str = "304502203f0f003983738f70760160b0f466c5e9baa96b7146cdafa5577700411290b1d0\
                            022100ee16e8d1f34b75a381e632b0cc1fed387352bd20cf781343bf47991176331d1b";

    const P384_Q: &str = "045a79d60625dbaefe6a43c35995dd59c20c25c780177c5c7183938700f2c6b430\
                          3352531b8311b128a3fdf242a68816860a56347a0c9abc15bdfa07406dc9c921ae\
                          82413b9390d8c85ce199bd32d882c6ae79dde5c93b02b27c17f3024290aed5";
    const P384_DIGEST: &str = "9a9083505bc92276aec4be312696ef7bf3bf603f4bbd381196a029f340585312\
                               313bca4a9b5b890efee42c77b1ee25fe";
    const P384_SIG: &str = "30650230146457e746878e99d11600e96b7b2dbcdbdac8c91e83bcc2876ea08f119f12\
                            765048e7007c50fec091a9cc63e8518401023100a98c128ce18dab7e4e57d86d792c3f\
                            bc8d003be9637f7c9b9b1cf7f1467c7d4c9643f474df2e466d14352c9f24a4cfcc";

    #[test]
    fn test_verify_external_signatures() {
        let q = EcdsaPublicKey::from_uncompressed(EccCurveId::NistP256, &hex(P256_Q)).unwrap();
        assert!(q.verify(&hex(P256_DIGEST), &hex(P256_SIG)).unwrap());
        let q = EcdsaPublicKey::from_uncompressed(EccCurveId::NistP384, &hex(P384_Q)).unwrap();
        assert!(q.verify(&hex(P384_DIGEST), &hex(P384_SIG)).unwrap());
    }

    #[test]
    fn test_sign_verify_roundtrip() {
        let mut rng = TestRng(42);
        let key = EcdsaKeyPair::from_private_key(EccCurveId::NistP256, &hex(P256_D)).unwrap();
        assert_eq!(key.public_key().to_uncompressed().unwrap(), hex(P256_Q));
        let sig = key.sign(&hex(P256_DIGEST), &mut rng).unwrap();
        assert!(key.verify(&hex(P256_DIGEST), &sig).unwrap());

        let key = EcdsaKeyPair::generate(EccCurveId::NistP384, &mut rng).unwrap();
        let sig = key.sign(&hex(P384_DIGEST), &mut rng).unwrap();
        assert!(key.public_key().verify(&hex(P384_DIGEST), &sig).unwrap());
        assert_eq!(key.private_key_bytes().unwrap().len(), 48);
    }

    #[test]
    fn test_wrong_digest_or_key_fails() {
        let q = EcdsaPublicKey::from_uncompressed(EccCurveId::NistP256, &hex(P256_Q)).unwrap();
        let mut digest = hex(P256_DIGEST);
        digest[0] ^= 1;
        assert!(!q.verify(&digest, &hex(P256_SIG)).unwrap());

        let other = EcdsaKeyPair::generate(EccCurveId::NistP256, &mut TestRng(1)).unwrap();
        assert!(!other.verify(&hex(P256_DIGEST), &hex(P256_SIG)).unwrap());
    }

    #[test]
    fn test_out_of_range_and_malformed() {
        let q = EcdsaPublicKey::from_uncompressed(EccCurveId::NistP256, &hex(P256_Q)).unwrap();
        let n = ecc::order(EccCurveId::NistP256);
        let bad = encode_signature(n, &BigNum::one());
        assert!(!q.verify(&hex(P256_DIGEST), &bad).unwrap());
        let zero = encode_signature(&BigNum::zero(), &BigNum::one());
        assert!(!q.verify(&hex(P256_DIGEST), &zero).unwrap());

        let mut trailing = hex(P256_SIG);
        trailing.push(0);
        assert!(q.verify(&hex(P256_DIGEST), &trailing).is_err());
        assert!(q.verify(&hex(P256_DIGEST), &[0x30, 0x00]).is_err());
    }

    #[test]
    fn test_truncate_digest() {
        let e = truncate_digest(&[0xFF; 64], 256);
        assert_eq!(e.bit_len(), 256);
        let e = truncate_digest(&[0x01, 0x02], 256);
        assert_eq!(e, BigNum::from_u64(0x0102));
    }
}
