//! Primality testing and prime generation.

use crate::bignum::BigNum;
use crate::montgomery::MontgomeryCtx;
use mantis_types::{CryptoError, SecureRandom};

/// Odd primes below 1000 for trial division.
fn small_primes() -> &'static [u64] {
    static PRIMES: std::sync::OnceLock<Vec<u64>> = std::sync::OnceLock::new();
    PRIMES.get_or_init(|| {
        let mut sieve = [true; 1000];
        let mut out = Vec::new();
        for i in 2..1000 {
            if sieve[i] {
                if i > 2 {
                    out.push(i as u64);
                }
                let mut j = i * i;
                while j < 1000 {
                    sieve[j] = false;
                    j += i;
                }
            }
        }
        out
    })
}

/// Miller-Rabin rounds for a candidate of `bits` bits (FIPS 186-5 table C.1,
/// error probability at most 2^-100).
pub fn mr_rounds(bits: usize) -> usize {
    match bits {
        0..=512 => 7,
        513..=1024 => 4,
        1025..=1536 => 3,
        _ => 2,
    }
}

impl BigNum {
    /// Probabilistic primality test: trial division then `rounds` Miller-Rabin
    /// rounds with random bases.
    pub fn is_probably_prime(
        &self,
        rounds: usize,
        rng: &mut dyn SecureRandom,
    ) -> Result<bool, CryptoError> {
        if self.is_negative() || self.is_zero() || self.is_one() {
            return Ok(false);
        }
        if self.num_limbs() == 1 && self.low_u64() == 2 {
            return Ok(true);
        }
        if self.is_even() {
            return Ok(false);
        }
        for &p in small_primes() {
            if self.num_limbs() == 1 && self.low_u64() == p {
                return Ok(true);
            }
            if self.rem_u64(p)? == 0 {
                return Ok(false);
            }
        }
        if self.bit_len() < 20 {
            // Below 1000^2 trial division is conclusive.
            return Ok(true);
        }

        let one = BigNum::one();
        let n_minus_one = self.sub(&one);
        let mut d = n_minus_one.clone();
        let mut s = 0usize;
        while d.is_even() {
            d = d.shr(1);
            s += 1;
        }

        let ctx = MontgomeryCtx::new(self)?;
        let n_minus_three = self.sub(&BigNum::from_u64(3));
        'witness: for _ in 0..rounds.max(1) {
            // a in [2, n-2]
            let a = BigNum::random_below(&n_minus_three, rng)?.add(&BigNum::from_u64(2));
            let mut x = ctx.mont_exp(&a, &d)?;
            if x == one || x == n_minus_one {
                continue;
            }
            for _ in 1..s {
                x = x.sqr().mod_reduce(self)?;
                if x == n_minus_one {
                    continue 'witness;
                }
                if x == one {
                    return Ok(false);
                }
            }
            return Ok(false);
        }
        Ok(true)
    }

    /// Generate a random prime of exactly `bits` bits with the two top bits set,
    /// so the product of two such primes has exactly `2 * bits` bits.
    pub fn generate_prime(bits: usize, rng: &mut dyn SecureRandom) -> Result<BigNum, CryptoError> {
        if bits < 16 {
            return Err(CryptoError::InvalidArg);
        }
        let rounds = mr_rounds(bits);
        // Generous bound: the prime density around 2^bits is ~1/(bits ln 2).
        for _ in 0..(bits * 64) {
            let mut cand = BigNum::random(bits, true, rng)?;
            cand.set_bit(bits - 2);
            if cand.is_probably_prime(rounds, rng)? {
                return Ok(cand);
            }
        }
        Err(CryptoError::BnPrimeGenFail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_rng::TestRng;

    #[test]
    fn test_small_values() {
        let mut rng = TestRng(3);
        let primes = [2u64, 3, 5, 7, 97, 997, 7919, 1_000_003];
        for p in primes {
            assert!(BigNum::from_u64(p).is_probably_prime(8, &mut rng).unwrap(), "{p}");
        }
        for c in [0u64, 1, 4, 15, 561, 1_000_001, 7919 * 7907] {
            assert!(!BigNum::from_u64(c).is_probably_prime(8, &mut rng).unwrap(), "{c}");
        }
    }

    #[test]
    fn test_mersenne_prime_and_composite() {
        let mut rng = TestRng(4);
        let m127 = BigNum::one().shl(127).sub(&BigNum::one());
        assert!(m127.is_probably_prime(10, &mut rng).unwrap());
        let m128 = BigNum::one().shl(128).sub(&BigNum::one());
        assert!(!m128.is_probably_prime(10, &mut rng).unwrap());
        // composite with no factor below 1000
        let c = BigNum::from_u64(1009 * 1013 * 1019);
        assert!(!c.is_probably_prime(10, &mut rng).unwrap());
    }

    #[test]
    fn test_generate_prime() {
        let mut rng = TestRng(5);
        let p = BigNum::generate_prime(128, &mut rng).unwrap();
        assert_eq!(p.bit_len(), 128);
        assert_eq!(p.get_bit(126), 1);
        assert!(p.is_probably_prime(20, &mut rng).unwrap());
    }
}
