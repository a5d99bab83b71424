//! DSA over caller-supplied domain parameters (FIPS 186-4 §4).
//!
//! Like ECDSA, signing takes a precomputed digest and produces the DER
//! `SEQUENCE { r, s }` encoding.

use mantis_bignum::BigNum;
use mantis_types::{CryptoError, SecureRandom};
use mantis_utils::asn1::{Decoder, Encoder};
use zeroize::Zeroize;

const MAX_SIGN_ATTEMPTS: usize = 64;

/// Domain parameters `(p, q, g)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DsaParams {
    p: BigNum,
    q: BigNum,
    g: BigNum,
}

impl DsaParams {
    /// Checks the structural relations `q | p - 1`, `1 < g < p` and
    /// `g^q = 1 mod p`. Primality of p and q is the caller's concern.
    pub fn new(p: &[u8], q: &[u8], g: &[u8]) -> Result<Self, CryptoError> {
        let p = BigNum::from_bytes_be(p);
        let q = BigNum::from_bytes_be(q);
        let g = BigNum::from_bytes_be(g);
        let one = BigNum::one();
        if p.is_even() || q.is_even() || q.bit_len() < 16 || q >= p {
            return Err(CryptoError::DsaInvalidParams);
        }
        if !p.sub(&one).mod_reduce(&q)?.is_zero() {
            return Err(CryptoError::DsaInvalidParams);
        }
        if g <= one || g >= p || !g.mod_exp(&q, &p)?.is_one() {
            return Err(CryptoError::DsaInvalidParams);
        }
        Ok(DsaParams { p, q, g })
    }

    pub fn p_bytes(&self) -> Vec<u8> {
        self.p.to_bytes_be()
    }

    pub fn q_bytes(&self) -> Vec<u8> {
        self.q.to_bytes_be()
    }

    pub fn g_bytes(&self) -> Vec<u8> {
        self.g.to_bytes_be()
    }
}

pub struct DsaKeyPair {
    params: DsaParams,
    x: BigNum,
    public_key: DsaPublicKey,
}

impl Drop for DsaKeyPair {
    fn drop(&mut self) {
        self.x.zeroize();
    }
}

impl std::fmt::Debug for DsaKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DsaKeyPair")
            .field("q_bits", &self.params.q.bit_len())
            .finish_non_exhaustive()
    }
}

impl DsaKeyPair {
    pub fn generate(params: &DsaParams, rng: &mut dyn SecureRandom) -> Result<Self, CryptoError> {
        let x = BigNum::random_range(&params.q, rng)?;
        Self::from_scalar(params, x)
    }

    pub fn from_private_key(params: &DsaParams, x: &[u8]) -> Result<Self, CryptoError> {
        let x = BigNum::from_bytes_be(x);
        if x.is_zero() || x >= params.q {
            return Err(CryptoError::InvalidKey);
        }
        Self::from_scalar(params, x)
    }

    fn from_scalar(params: &DsaParams, x: BigNum) -> Result<Self, CryptoError> {
        let y = params.g.mod_exp(&x, &params.p)?;
        Ok(DsaKeyPair {
            params: params.clone(),
            x,
            public_key: DsaPublicKey {
                params: params.clone(),
                y,
            },
        })
    }

    pub fn public_key(&self) -> &DsaPublicKey {
        &self.public_key
    }

    pub fn sign(&self, digest: &[u8], rng: &mut dyn SecureRandom) -> Result<Vec<u8>, CryptoError> {
        if digest.is_empty() {
            return Err(CryptoError::NullInput);
        }
        let DsaParams { p, q, g } = &self.params;
        let z = truncate_digest(digest, q.bit_len());
        for _ in 0..MAX_SIGN_ATTEMPTS {
            let mut k = BigNum::random_range(q, rng)?;
            let r = g.mod_exp(&k, p)?.mod_reduce(q)?;
            if r.is_zero() {
                k.zeroize();
                continue;
            }
            let k_inv = k.mod_inv(q)?;
            k.zeroize();
            let s = k_inv.mod_mul(&z.mod_add(&self.x.mod_mul(&r, q)?, q)?, q)?;
            if s.is_zero() {
                continue;
            }
            let mut enc = Encoder::new();
            enc.sequence(|seq| {
                seq.write_unsigned(&r.to_bytes_be())
                    .write_unsigned(&s.to_bytes_be());
            });
            return Ok(enc.finish());
        }
        Err(CryptoError::BnRandGenFail)
    }

    pub fn verify(&self, digest: &[u8], signature: &[u8]) -> Result<bool, CryptoError> {
        self.public_key.verify(digest, signature)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DsaPublicKey {
    params: DsaParams,
    y: BigNum,
}

impl DsaPublicKey {
    pub fn new(params: &DsaParams, y: &[u8]) -> Result<Self, CryptoError> {
        let y = BigNum::from_bytes_be(y);
        if y <= BigNum::one() || y >= params.p || !y.mod_exp(&params.q, &params.p)?.is_one() {
            return Err(CryptoError::InvalidKey);
        }
        Ok(DsaPublicKey {
            params: params.clone(),
            y,
        })
    }

    pub fn y_bytes(&self) -> Vec<u8> {
        self.y.to_bytes_be()
    }

    pub fn verify(&self, digest: &[u8], signature: &[u8]) -> Result<bool, CryptoError> {
        let DsaParams { p, q, g } = &self.params;
        let mut outer = Decoder::new(signature);
        let mut seq = outer.read_sequence()?;
        let r = BigNum::from_bytes_be(seq.read_unsigned()?);
        let s = BigNum::from_bytes_be(seq.read_unsigned()?);
        seq.finish()?;
        outer.finish()?;
        if r.is_zero() || s.is_zero() || r >= *q || s >= *q {
            return Ok(false);
        }
        let w = s.mod_inv(q)?;
        let z = truncate_digest(digest, q.bit_len());
        let u1 = z.mod_mul(&w, q)?;
        let u2 = r.mod_mul(&w, q)?;
        let v = g
            .mod_exp(&u1, p)?
            .mod_mul(&self.y.mod_exp(&u2, p)?, p)?
            .mod_reduce(q)?;
        Ok(v == r)
    }
}

/// Leftmost `min(N, outlen)` bits of the digest.
fn truncate_digest(digest: &[u8], q_bits: usize) -> BigNum {
    let e = BigNum::from_bytes_be(digest);
    let bits = digest.len() * 8;
    if bits > q_bits {
        e.shr(bits - q_bits)
    } else {
        e
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{hex, TestRng};

    // 1024/160 parameters and signature from an independent implementation.
    const P: &str = "fe8ad88f2034127f128b84125f343abf98dae9f627548cc3a909efde63c12f56\
        60f891203a36ce9c717fdbd4ede14c9cef0acb19f6ef10987ca00a936b864714\
        b8325851f99568febc76ccf02f3ed0508954f012c7c8d1848239316ae3d5cb02\
        e7c811cfd18b0bab9843dfbcf621444223a371f3631eb277adb9e088a36d9485";
    const Q: &str = "a612a7289dd2f46d2526a21a7b83515ffedaf525";
    const G: &str = "ee27f62d9ee7d356032762f1d2f15773ce4a60702c94ea41024fe3cd02712a20\
        afae3ee8a65f20cc94318b39f775b96fde792de7a1ee8712a25d33180fd729ac\
        ff103824879aec089ab166280d47af08b47c9e9954951122e98f52b2f529cc22\
        9962f1a0d2dcbe095c76bf28d1901f71015867453cd2aa01e8eae0b8a89f08ad";
    const X: &str = "2c0a523a892ccfb58a8035ccbd4a0c28a33051b0";
    const Y: &str = "6698ba92b61169ca722e03e185d7dd66493995f4922c21d00c5c606954e46280\
        fc18bc71fda4570054cac327dd7bdd1782529fcb3bdda09080c814a18c1848c5\
        d8176391a3614bcf05e0863e474a71d1950b3ebd7656a2cc3a510a800f97cbec\
        b34ffbc127670fd334f7e5ddda0789f0e21a054cca812be05b28d9b90868c327";
    // SHA-256("mantis dsa test")
    const DIGEST: &str = "f8edb5ced631e79faf22beb5bdd4271a4a49996c0ef94e88b6f69d9180c33e7e";
    const SIG: &str = "302c021405eb75532707511cb413a386b5d1b634b90273c4021476623aa0e1bd\
        4d3cf47b496b741223486e55659a";

    fn params() -> DsaParams {
        DsaParams::new(&hex(P), &hex(Q), &hex(G)).unwrap()
    }

    #[test]
    fn test_verify_external_signature() {
        let y = DsaPublicKey::new(&params(), &hex(Y)).unwrap();
        assert!(y.verify(&hex(DIGEST), &hex(SIG)).unwrap());
        let mut d = hex(DIGEST);
        d[31] ^= 1;
        assert!(!y.verify(&d, &hex(SIG)).unwrap());
    }

    #[test]
    fn test_derived_public_key_and_roundtrip() {
        let key = DsaKeyPair::from_private_key(&params(), &hex(X)).unwrap();
        assert_eq!(key.public_key().y_bytes(), hex(Y));
        let mut rng = TestRng(77);
        let sig = key.sign(&hex(DIGEST), &mut rng).unwrap();
        assert!(key.verify(&hex(DIGEST), &sig).unwrap());

        let other = DsaKeyPair::generate(&params(), &mut rng).unwrap();
        assert!(!other.verify(&hex(DIGEST), &sig).unwrap());
    }

    #[test]
    fn test_parameter_checks() {
        let (p, q, g) = (hex(P), hex(Q), hex(G));
        assert_eq!(
            DsaParams::new(&p, &q, &[2]).unwrap_err(),
            CryptoError::DsaInvalidParams
        );
        assert!(DsaParams::new(&p, &p, &g).is_err());
        let mut q_off = q.clone();
        q_off[19] ^= 2;
        assert!(DsaParams::new(&p, &q_off, &g).is_err());
        assert!(DsaPublicKey::new(&params(), &[1]).is_err());
        assert!(DsaKeyPair::from_private_key(&params(), &q).is_err());
    }

    #[test]
    fn test_malformed_signature() {
        let y = DsaPublicKey::new(&params(), &hex(Y)).unwrap();
        assert!(y.verify(&hex(DIGEST), &[0x30, 0x03, 0x02, 0x01, 0x01]).is_err());
        let mut enc = Encoder::new();
        enc.sequence(|s| {
            s.write_unsigned(&hex(Q)).write_u64(1);
        });
        assert!(!y.verify(&hex(DIGEST), &enc.finish()).unwrap());
    }
}
