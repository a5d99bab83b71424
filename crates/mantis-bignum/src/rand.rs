//! Random big numbers drawn from a caller supplied [`SecureRandom`].

use crate::bignum::BigNum;
use mantis_types::{CryptoError, SecureRandom};
use zeroize::Zeroize;

impl BigNum {
    /// Random number of exactly `bits` bits (top bit set).
    ///
    /// With `odd` the low bit is forced to 1.
    pub fn random(
        bits: usize,
        odd: bool,
        rng: &mut dyn SecureRandom,
    ) -> Result<BigNum, CryptoError> {
        if bits == 0 {
            return Ok(BigNum::zero());
        }
        let mut buf = random_bytes(bits, rng)?;
        let top = (bits - 1) % 8;
        buf[0] |= 1u8 << top;
        let mut r = BigNum::from_bytes_be(&buf);
        buf.zeroize();
        if odd {
            r.set_bit(0);
        }
        Ok(r)
    }

    /// Uniform random value in `[1, upper)` by rejection sampling.
    pub fn random_range(upper: &BigNum, rng: &mut dyn SecureRandom) -> Result<BigNum, CryptoError> {
        if upper.is_zero() || upper.is_one() || upper.is_negative() {
            return Err(CryptoError::InvalidArg);
        }
        loop {
            let c = BigNum::random_below(upper, rng)?;
            if !c.is_zero() {
                return Ok(c);
            }
        }
    }

    /// Uniform random value in `[0, upper)` by rejection sampling.
    pub fn random_below(upper: &BigNum, rng: &mut dyn SecureRandom) -> Result<BigNum, CryptoError> {
        if upper.is_zero() || upper.is_negative() {
            return Err(CryptoError::InvalidArg);
        }
        let bits = upper.bit_len();
        for _ in 0..1000 {
            let mut buf = random_bytes(bits, rng)?;
            let c = BigNum::from_bytes_be(&buf);
            buf.zeroize();
            if c < *upper {
                return Ok(c);
            }
        }
        Err(CryptoError::BnRandGenFail)
    }
}

/// `ceil(bits / 8)` random bytes with the excess high bits cleared.
fn random_bytes(bits: usize, rng: &mut dyn SecureRandom) -> Result<Vec<u8>, CryptoError> {
    let len = bits.div_ceil(8);
    let mut buf = vec![0u8; len];
    rng.fill_bytes(&mut buf)
        .map_err(|_| CryptoError::BnRandGenFail)?;
    let excess = len * 8 - bits;
    if excess > 0 {
        buf[0] &= 0xFF >> excess;
    }
    Ok(buf)
}
