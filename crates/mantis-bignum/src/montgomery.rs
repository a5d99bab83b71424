//! Montgomery multiplication context for modular exponentiation.

use crate::bignum::{BigNum, DoubleLimb, Limb, LIMB_BITS};
use mantis_types::CryptoError;
use zeroize::Zeroize;

/// Montgomery multiplication context for an odd modulus `N`.
///
/// `R = 2^(m_size * 64)`. Values in Montgomery form are kept as fixed-width
/// limb vectors of `m_size` limbs so the inner loops never reallocate.
pub struct MontgomeryCtx {
    modulus: BigNum,
    n: Vec<Limb>,
    m_size: usize,
    /// N' such that N[0] * N' ≡ -1 (mod 2^64).
    n_prime: u64,
    /// R² mod N, used for encoding into Montgomery form.
    r_squared: Vec<Limb>,
}

impl MontgomeryCtx {
    /// Create a new Montgomery context for the given odd modulus.
    pub fn new(modulus: &BigNum) -> Result<Self, CryptoError> {
        if modulus.is_zero() {
            return Err(CryptoError::BnDivisionByZero);
        }
        if modulus.is_even() || modulus.is_negative() {
            return Err(CryptoError::InvalidArg);
        }
        let m_size = modulus.num_limbs();
        let n = modulus.limbs().to_vec();
        let n_prime = compute_n_prime(n[0]);
        let r2 = BigNum::one()
            .shl(2 * m_size * LIMB_BITS)
            .mod_reduce(modulus)?;
        Ok(MontgomeryCtx {
            modulus: modulus.clone(),
            r_squared: r2.limbs_padded(m_size),
            n,
            m_size,
            n_prime,
        })
    }

    /// The modulus N.
    pub fn modulus(&self) -> &BigNum {
        &self.modulus
    }

    /// Convert into Montgomery form: aR mod N.
    pub fn to_mont(&self, a: &BigNum) -> Result<BigNum, CryptoError> {
        let a = a.mod_reduce(&self.modulus)?.limbs_padded(self.m_size);
        Ok(BigNum::from_limbs(self.mul_limbs(&a, &self.r_squared)))
    }

    /// Convert out of Montgomery form: aR^(-1) mod N.
    pub fn from_mont(&self, a_mont: &BigNum) -> BigNum {
        let mut one = vec![0u64; self.m_size];
        one[0] = 1;
        BigNum::from_limbs(self.mul_limbs(&a_mont.limbs_padded(self.m_size), &one))
    }

    /// Montgomery product: a * b * R^(-1) mod N, inputs in Montgomery form.
    pub fn mont_mul(&self, a: &BigNum, b: &BigNum) -> BigNum {
        BigNum::from_limbs(self.mul_limbs(
            &a.limbs_padded(self.m_size),
            &b.limbs_padded(self.m_size),
        ))
    }

    /// Montgomery square.
    pub fn mont_sqr(&self, a: &BigNum) -> BigNum {
        let a = a.limbs_padded(self.m_size);
        BigNum::from_limbs(self.mul_limbs(&a, &a))
    }

    /// Coarsely integrated operand scanning (CIOS) Montgomery multiplication
    /// on fixed-width limb vectors. Output is fully reduced.
    fn mul_limbs(&self, a: &[Limb], b: &[Limb]) -> Vec<Limb> {
        let m = self.m_size;
        let n = &self.n;
        let mut t = vec![0u64; m + 2];
        for &bi in b.iter().take(m) {
            let mut c: Limb = 0;
            for j in 0..m {
                let s = t[j] as DoubleLimb + a[j] as DoubleLimb * bi as DoubleLimb + c as DoubleLimb;
                t[j] = s as Limb;
                c = (s >> LIMB_BITS) as Limb;
            }
            let s = t[m] as DoubleLimb + c as DoubleLimb;
            t[m] = s as Limb;
            t[m + 1] = (s >> LIMB_BITS) as Limb;

            let q = t[0].wrapping_mul(self.n_prime);
            let s = t[0] as DoubleLimb + q as DoubleLimb * n[0] as DoubleLimb;
            let mut c = (s >> LIMB_BITS) as Limb;
            for j in 1..m {
                let s = t[j] as DoubleLimb + q as DoubleLimb * n[j] as DoubleLimb + c as DoubleLimb;
                t[j - 1] = s as Limb;
                c = (s >> LIMB_BITS) as Limb;
            }
            let s = t[m] as DoubleLimb + c as DoubleLimb;
            t[m - 1] = s as Limb;
            t[m] = t[m + 1] + (s >> LIMB_BITS) as Limb;
            t[m + 1] = 0;
        }

        // Conditional final subtraction, selected with a mask.
        let mut diff = vec![0u64; m];
        let mut borrow = 0u64;
        for j in 0..m {
            let (d1, b1) = t[j].overflowing_sub(n[j]);
            let (d2, b2) = d1.overflowing_sub(borrow);
            diff[j] = d2;
            borrow = (b1 | b2) as u64;
        }
        let (_, b_top) = t[m].overflowing_sub(borrow);
        // keep t when the subtraction underflowed
        let keep_t = (b_top as u64).wrapping_neg();
        let mut out = vec![0u64; m];
        for j in 0..m {
            out[j] = (t[j] & keep_t) | (diff[j] & !keep_t);
        }
        t.zeroize();
        diff.zeroize();
        out
    }

    /// Fixed-window exponentiation: base^exp mod N.
    ///
    /// Every window performs the same squarings and one multiplication, and the
    /// table entry is gathered by scanning the whole table, so the sequence of
    /// operations depends only on the bit length of `exp`.
    pub fn mont_exp(&self, base: &BigNum, exp: &BigNum) -> Result<BigNum, CryptoError> {
        if self.modulus.is_one() {
            return Ok(BigNum::zero());
        }
        if exp.is_zero() {
            return Ok(BigNum::one());
        }

        let m = self.m_size;
        let exp_bits = exp.bit_len();
        let w = window_size(exp_bits);
        let table_size = 1usize << w;

        let one_mont = {
            let mut one = vec![0u64; m];
            one[0] = 1;
            self.mul_limbs(&one, &self.r_squared)
        };
        let base_mont = self.to_mont(base)?.limbs_padded(m);
        let mut table: Vec<Vec<Limb>> = Vec::with_capacity(table_size);
        table.push(one_mont.clone());
        table.push(base_mont.clone());
        for i in 2..table_size {
            let next = self.mul_limbs(&table[i - 1], &base_mont);
            table.push(next);
        }

        let mut acc = one_mont;
        let windows = exp_bits.div_ceil(w);
        for win in (0..windows).rev() {
            for _ in 0..w {
                acc = self.mul_limbs(&acc, &acc);
            }
            let mut idx = 0usize;
            for b in 0..w {
                idx |= (exp.get_bit(win * w + b) as usize) << b;
            }
            let entry = gather(&table, idx, m);
            acc = self.mul_limbs(&acc, &entry);
        }

        let mut one = vec![0u64; m];
        one[0] = 1;
        let out = self.mul_limbs(&acc, &one);
        for t in table.iter_mut() {
            t.zeroize();
        }
        Ok(BigNum::from_limbs(out))
    }
}

/// Select `table[idx]` touching every entry.
fn gather(table: &[Vec<Limb>], idx: usize, m: usize) -> Vec<Limb> {
    let mut out = vec![0u64; m];
    for (i, entry) in table.iter().enumerate() {
        let mask = ((i == idx) as u64).wrapping_neg();
        for j in 0..m {
            out[j] |= entry[j] & mask;
        }
    }
    out
}

/// N' such that N[0] * N' ≡ -1 (mod 2^64), by Newton iteration.
fn compute_n_prime(n0: u64) -> u64 {
    let mut x: u64 = 1;
    for _ in 0..6 {
        x = x.wrapping_mul(2u64.wrapping_sub(n0.wrapping_mul(x)));
    }
    x.wrapping_neg()
}

fn window_size(bits: usize) -> usize {
    match bits {
        0..=32 => 1,
        33..=128 => 3,
        129..=512 => 4,
        _ => 5,
    }
}
