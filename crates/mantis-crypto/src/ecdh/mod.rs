//! Elliptic-curve Diffie-Hellman over P-256 and P-384 (SEC 1 §3.3.1).
//!
//! The shared secret is the x-coordinate of `d·Q`, left-padded to the field
//! size, as TLS uses it for the premaster secret.

use mantis_bignum::BigNum;
use mantis_types::{CryptoError, EccCurveId, SecureRandom};
use zeroize::{Zeroize, Zeroizing};

use crate::ecc::{self, EcPoint};

/// An ephemeral or static ECDH key pair.
pub struct EcdhKeyPair {
    private_key: BigNum,
    public_key: EcPoint,
}

impl Drop for EcdhKeyPair {
    fn drop(&mut self) {
        self.private_key.zeroize();
    }
}

impl std::fmt::Debug for EcdhKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EcdhKeyPair")
            .field("curve", &self.public_key.curve())
            .finish_non_exhaustive()
    }
}

impl EcdhKeyPair {
    pub fn generate(curve: EccCurveId, rng: &mut dyn SecureRandom) -> Result<Self, CryptoError> {
        let d = BigNum::random_range(ecc::order(curve), rng)?;
        Self::from_scalar(curve, d)
    }

    /// Build a key pair from a big-endian private scalar of exactly the
    /// field size.
    pub fn from_private_key(curve: EccCurveId, private_key: &[u8]) -> Result<Self, CryptoError> {
        let d = ecc::scalar_from_bytes(curve, private_key)?;
        Self::from_scalar(curve, d)
    }

    fn from_scalar(curve: EccCurveId, d: BigNum) -> Result<Self, CryptoError> {
        let public_key = EcPoint::generator(curve).mul_secret(&d)?;
        Ok(EcdhKeyPair {
            private_key: d,
            public_key,
        })
    }

    pub fn curve(&self) -> EccCurveId {
        self.public_key.curve()
    }

    /// Public key in uncompressed form, as carried in TLS key shares.
    pub fn public_key_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        self.public_key.to_uncompressed()
    }

    /// Shared secret with a peer's uncompressed public key.
    ///
    /// Peer points off the curve, the point at infinity and a zero
    /// x-coordinate result are all refused.
    pub fn compute_shared_secret(&self, peer: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let q = EcPoint::from_uncompressed(self.curve(), peer)?;
        let s = q.mul_secret(&self.private_key)?;
        if s.x().is_zero() {
            log::debug!("ecdh: peer point produced a zero shared secret");
            return Err(CryptoError::DegenerateSharedSecret);
        }
        Ok(Zeroizing::new(s.x_bytes()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{hex, TestRng};

    struct Vector {
        curve: EccCurveId,
        d1: &'static str,
        d2: &'static str,
        pub2: &'static str,
        shared: &'static str,
    }

    const VECTORS: [Vector; 2] = [
        Vector {
            curve: EccCurveId::NistP256,
            d1: "4fbcf3229f4f39d75306badbb4ffdbe9fce265377509494bad166142bda03680",
            d2: "4f9021d18f077400780f4dd9da355dc57716779732efa68df21d32b64443c894",
            pub2: "04df0a5964ae80e73fcc22925a3247c5be8bc5d4a119527cfa5b5a69e48ea57c55\
                   31eaa99207015e12fb977933db5ed6220ccd65d850bedaf4b428399b7223f704",
            shared: "2d2a5295e28eb9a734958cb94b04ccd797f274c45f66b9507e865085728071cc",
        },
        Vector {
            curve: EccCurveId::NistP384,
            d1: "0de0f836de086450b421d868abc642dad751e080e16f86194e960404e7b9620b\
                 497e36b02e9f6f5b8447889e68331c4e",
            d2: "79c7c7cf14a5e73f112096d9f415bf790d27a3359de1ba90727d42320ec09e51\
                 396b0aa8b28e97caba096ba108aaa0a2",
            pub2: "0426ca983e34288fb18f4fccf046f5e5145f7a4ffdedceeb931a7cd683a9ec771f\
                   3c38454dd8e2136216f2dd8a72133e1f5fa13cc3ab57421bb806824a0b49fcf4\
                   d0d98380953ed89b91b72021bb9ddb990ddda46707ae7331eec3ccd0b55a5420",
            shared: "46e1fc7399e9fcd59eb70dcce6f7b6de3c0928cb290d701a4a2d70a1b819893f\
                     9cd9f439d15bc56adb1ba1e039c7a88a",
        },
    ];

    #[test]
    fn test_known_answer() {
        for v in &VECTORS {
            let a = EcdhKeyPair::from_private_key(v.curve, &hex(v.d1)).unwrap();
            let b = EcdhKeyPair::from_private_key(v.curve, &hex(v.d2)).unwrap();
            assert_eq!(b.public_key_bytes().unwrap(), hex(v.pub2));
            let s1 = a.compute_shared_secret(&hex(v.pub2)).unwrap();
            let s2 = b.compute_shared_secret(&a.public_key_bytes().unwrap()).unwrap();
            assert_eq!(*s1, hex(v.shared));
            assert_eq!(s1, s2);
        }
    }

    #[test]
    fn test_generated_pairs_agree() {
        let mut rng = TestRng(7);
        let a = EcdhKeyPair::generate(EccCurveId::NistP256, &mut rng).unwrap();
        let b = EcdhKeyPair::generate(EccCurveId::NistP256, &mut rng).unwrap();
        let s1 = a.compute_shared_secret(&b.public_key_bytes().unwrap()).unwrap();
        let s2 = b.compute_shared_secret(&a.public_key_bytes().unwrap()).unwrap();
        assert_eq!(s1.len(), 32);
        assert_eq!(s1, s2);
    }

    #[test]
    fn test_rejects_bad_peer() {
        let v = &VECTORS[0];
        let a = EcdhKeyPair::from_private_key(v.curve, &hex(v.d1)).unwrap();
        let mut off = hex(v.pub2);
        off[40] ^= 0x10;
        assert_eq!(
            a.compute_shared_secret(&off),
            Err(CryptoError::EccPointNotOnCurve)
        );
        assert_eq!(
            a.compute_shared_secret(&[0x00]),
            Err(CryptoError::EccPointAtInfinity)
        );
        assert!(a.compute_shared_secret(&hex(VECTORS[1].pub2)).is_err());
    }
}
