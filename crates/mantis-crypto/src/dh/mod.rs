//! Finite-field Diffie-Hellman (PKCS #3 / RFC 7919).
//!
//! Public values and shared secrets are big-endian and left-padded to the
//! length of the prime, the form TLS 1.3 key shares use. TLS 1.2 strips the
//! leading zeros of the secret itself.

mod groups;

use mantis_bignum::BigNum;
use mantis_types::{CryptoError, DhParamId, SecureRandom};
use zeroize::{Zeroize, Zeroizing};

/// Group parameters `(p, g)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhParams {
    p: BigNum,
    g: BigNum,
}

impl DhParams {
    /// Explicit parameters, as carried in a TLS 1.2 ServerKeyExchange.
    pub fn new(p: &[u8], g: &[u8]) -> Result<Self, CryptoError> {
        let p = BigNum::from_bytes_be(p);
        let g = BigNum::from_bytes_be(g);
        if p.is_even() || p.bit_len() < 5 {
            return Err(CryptoError::InvalidArg);
        }
        if g <= BigNum::one() || g >= p.sub(&BigNum::one()) {
            return Err(CryptoError::InvalidArg);
        }
        Ok(DhParams { p, g })
    }

    pub fn from_group(id: DhParamId) -> Self {
        DhParams {
            p: groups::prime(id),
            g: BigNum::from_u64(2),
        }
    }

    /// Length of p in bytes.
    pub fn prime_size(&self) -> usize {
        self.p.bit_len().div_ceil(8)
    }

    pub fn p_bytes(&self) -> Vec<u8> {
        self.p.to_bytes_be()
    }

    pub fn g_bytes(&self) -> Vec<u8> {
        self.g.to_bytes_be()
    }

    /// Reject `y <= 1` and `y >= p - 1` (SP 800-56A partial validation).
    fn check_public(&self, y: &BigNum) -> Result<(), CryptoError> {
        if *y <= BigNum::one() || *y >= self.p.sub(&BigNum::one()) {
            return Err(CryptoError::DhInvalidPublicKey);
        }
        Ok(())
    }
}

pub struct DhKeyPair {
    params: DhParams,
    private_key: BigNum,
    public_key: BigNum,
}

impl Drop for DhKeyPair {
    fn drop(&mut self) {
        self.private_key.zeroize();
    }
}

impl std::fmt::Debug for DhKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DhKeyPair")
            .field("prime_bits", &self.params.p.bit_len())
            .finish_non_exhaustive()
    }
}

impl DhKeyPair {
    /// Private exponent drawn uniformly from `[2, p - 2]`.
    pub fn generate(params: &DhParams, rng: &mut dyn SecureRandom) -> Result<Self, CryptoError> {
        let bound = params.p.sub(&BigNum::from_u64(2));
        let x = BigNum::random_range(&bound, rng)?.add(&BigNum::one());
        Self::from_private(params, x)
    }

    /// Key pair from a fixed private exponent; for tests and known answers.
    pub fn from_private_key(params: &DhParams, x: &[u8]) -> Result<Self, CryptoError> {
        let x = BigNum::from_bytes_be(x);
        if x <= BigNum::one() || x >= params.p.sub(&BigNum::one()) {
            return Err(CryptoError::InvalidArg);
        }
        Self::from_private(params, x)
    }

    fn from_private(params: &DhParams, x: BigNum) -> Result<Self, CryptoError> {
        let y = params.g.mod_exp(&x, &params.p)?;
        Ok(DhKeyPair {
            params: params.clone(),
            private_key: x,
            public_key: y,
        })
    }

    pub fn params(&self) -> &DhParams {
        &self.params
    }

    pub fn public_key_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        self.public_key.to_bytes_be_padded(self.params.prime_size())
    }

    /// `peer^x mod p`. Degenerate peer values are rejected, and so is a
    /// result of 1.
    pub fn compute_shared_secret(&self, peer: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        if peer.len() > self.params.prime_size() {
            return Err(CryptoError::DhInvalidPublicKey);
        }
        let y = BigNum::from_bytes_be(peer);
        self.params.check_public(&y)?;
        let z = y.mod_exp(&self.private_key, &self.params.p)?;
        if z.is_one() {
            log::debug!("dh: peer value produced a shared secret of 1");
            return Err(CryptoError::DegenerateSharedSecret);
        }
        Ok(Zeroizing::new(
            z.to_bytes_be_padded(self.params.prime_size())?,
        ))
    }
}
