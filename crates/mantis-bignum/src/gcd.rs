//! GCD and modular inverse.

use crate::bignum::BigNum;
use mantis_types::CryptoError;

impl BigNum {
    /// Greatest common divisor of the magnitudes (Euclid).
    pub fn gcd(&self, other: &BigNum) -> Result<BigNum, CryptoError> {
        if self.is_zero() && other.is_zero() {
            return Err(CryptoError::InvalidArg);
        }
        let mut a = self.abs();
        let mut b = other.abs();
        while !b.is_zero() {
            let r = a.mod_reduce(&b)?;
            a = b;
            b = r;
        }
        Ok(a)
    }

    /// self^(-1) mod modulus via the extended Euclidean algorithm.
    ///
    /// Returns `BnNoInverse` when gcd(self, modulus) != 1.
    pub fn mod_inv(&self, modulus: &BigNum) -> Result<BigNum, CryptoError> {
        if modulus.is_zero() || modulus.is_one() || modulus.is_negative() {
            return Err(CryptoError::InvalidArg);
        }
        let mut old_r = self.mod_reduce(modulus)?;
        if old_r.is_zero() {
            return Err(CryptoError::BnNoInverse);
        }
        let mut r = modulus.clone();
        let mut old_s = BigNum::one();
        let mut s = BigNum::zero();

        while !r.is_zero() {
            let (q, rem) = old_r.div_rem(&r)?;
            old_r = std::mem::replace(&mut r, rem);
            let next = old_s.sub(&q.mul(&s));
            old_s = std::mem::replace(&mut s, next);
        }

        if !old_r.is_one() {
            return Err(CryptoError::BnNoInverse);
        }
        old_s.mod_reduce(modulus)
    }

    /// Least common multiple of the magnitudes.
    pub fn lcm(&self, other: &BigNum) -> Result<BigNum, CryptoError> {
        let g = self.gcd(other)?;
        let (q, _) = self.abs().div_rem(&g)?;
        Ok(q.mul(&other.abs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gcd() {
        let a = BigNum::from_u64(12);
        let b = BigNum::from_u64(8);
        assert_eq!(a.gcd(&b).unwrap(), BigNum::from_u64(4));
        assert_eq!(a.gcd(&BigNum::zero()).unwrap(), a);
        assert!(BigNum::zero().gcd(&BigNum::zero()).is_err());
        assert_eq!(a.lcm(&b).unwrap(), BigNum::from_u64(24));
    }

    #[test]
    fn test_mod_inv() {
        let inv = BigNum::from_u64(3).mod_inv(&BigNum::from_u64(7)).unwrap();
        assert_eq!(inv, BigNum::from_u64(5));

        let m = BigNum::one().shl(127).sub(&BigNum::one());
        let a = BigNum::from_u64(0xDEAD_BEEF);
        let inv = a.mod_inv(&m).unwrap();
        assert_eq!(a.mod_mul(&inv, &m).unwrap(), BigNum::one());
    }

    #[test]
    fn test_mod_inv_no_inverse() {
        let r = BigNum::from_u64(6).mod_inv(&BigNum::from_u64(9));
        assert_eq!(r, Err(CryptoError::BnNoInverse));
    }
}
