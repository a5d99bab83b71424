//! Arithmetic on BigNum: add/sub/mul, shifts, Knuth division, modular helpers.

use crate::bignum::{BigNum, DoubleLimb, Limb, LIMB_BITS};
use crate::montgomery::MontgomeryCtx;
use mantis_types::CryptoError;
use std::cmp::Ordering;

impl BigNum {
    /// self + other
    pub fn add(&self, other: &BigNum) -> BigNum {
        if self.is_negative() == other.is_negative() {
            BigNum::from_parts(add_limbs(self.limbs(), other.limbs()), self.is_negative())
        } else if self.is_negative() {
            signed_sub(other.limbs(), self.limbs())
        } else {
            signed_sub(self.limbs(), other.limbs())
        }
    }

    /// self - other
    pub fn sub(&self, other: &BigNum) -> BigNum {
        if self.is_negative() != other.is_negative() {
            BigNum::from_parts(add_limbs(self.limbs(), other.limbs()), self.is_negative())
        } else if self.is_negative() {
            signed_sub(other.limbs(), self.limbs())
        } else {
            signed_sub(self.limbs(), other.limbs())
        }
    }

    /// self * other
    pub fn mul(&self, other: &BigNum) -> BigNum {
        BigNum::from_parts(
            mul_limbs(self.limbs(), other.limbs()),
            self.is_negative() != other.is_negative(),
        )
    }

    /// self * self
    pub fn sqr(&self) -> BigNum {
        BigNum::from_limbs(mul_limbs(self.limbs(), self.limbs()))
    }

    /// Multiply the magnitude by a single limb.
    pub fn mul_u64(&self, m: u64) -> BigNum {
        BigNum::from_parts(mul_limbs(self.limbs(), &[m]), self.is_negative())
    }

    /// Shift the magnitude left by `bits`.
    pub fn shl(&self, bits: usize) -> BigNum {
        BigNum::from_parts(shl_limbs(self.limbs(), bits), self.is_negative())
    }

    /// Shift the magnitude right by `bits` (truncating).
    pub fn shr(&self, bits: usize) -> BigNum {
        let limb_shift = bits / LIMB_BITS;
        let bit_shift = bits % LIMB_BITS;
        let src = self.limbs();
        if limb_shift >= src.len() {
            return BigNum::zero();
        }
        let mut out = vec![0u64; src.len() - limb_shift];
        for i in 0..out.len() {
            let lo = src[i + limb_shift] >> bit_shift;
            let hi = if bit_shift > 0 && i + limb_shift + 1 < src.len() {
                src[i + limb_shift + 1] << (LIMB_BITS - bit_shift)
            } else {
                0
            };
            out[i] = lo | hi;
        }
        BigNum::from_parts(out, self.is_negative())
    }

    /// Truncated division: returns (quotient, remainder) with the remainder
    /// taking the sign of the dividend.
    pub fn div_rem(&self, divisor: &BigNum) -> Result<(BigNum, BigNum), CryptoError> {
        if divisor.is_zero() {
            return Err(CryptoError::BnDivisionByZero);
        }
        let (q, r) = div_rem_limbs(self.limbs(), divisor.limbs());
        Ok((
            BigNum::from_parts(q, self.is_negative() != divisor.is_negative()),
            BigNum::from_parts(r, self.is_negative()),
        ))
    }

    /// Remainder of the magnitude by a single limb.
    pub fn rem_u64(&self, d: u64) -> Result<u64, CryptoError> {
        if d == 0 {
            return Err(CryptoError::BnDivisionByZero);
        }
        let mut rem: DoubleLimb = 0;
        for &limb in self.limbs().iter().rev() {
            rem = ((rem << LIMB_BITS) | limb as DoubleLimb) % d as DoubleLimb;
        }
        Ok(rem as u64)
    }

    /// Non-negative residue of self modulo `modulus`, in `[0, modulus)`.
    pub fn mod_reduce(&self, modulus: &BigNum) -> Result<BigNum, CryptoError> {
        let (_, r) = self.div_rem(modulus)?;
        if r.is_negative() {
            Ok(r.add(&modulus.abs()))
        } else {
            Ok(r)
        }
    }

    /// (self + other) mod m, inputs already reduced.
    pub fn mod_add(&self, other: &BigNum, m: &BigNum) -> Result<BigNum, CryptoError> {
        let s = self.add(other);
        if s >= *m {
            Ok(s.sub(m))
        } else if s.is_negative() {
            s.mod_reduce(m)
        } else {
            Ok(s)
        }
    }

    /// (self - other) mod m, inputs already reduced.
    pub fn mod_sub(&self, other: &BigNum, m: &BigNum) -> Result<BigNum, CryptoError> {
        let d = self.sub(other);
        if d.is_negative() {
            let d = d.add(m);
            if d.is_negative() {
                return d.mod_reduce(m);
            }
            Ok(d)
        } else {
            Ok(d)
        }
    }

    /// (self * other) mod m
    pub fn mod_mul(&self, other: &BigNum, m: &BigNum) -> Result<BigNum, CryptoError> {
        self.mul(other).mod_reduce(m)
    }

    /// self^exp mod modulus.
    ///
    /// Odd moduli go through the Montgomery ladder in [`MontgomeryCtx`]; even
    /// moduli (rare, only in tests and parameter checks) use plain
    /// square-and-multiply.
    pub fn mod_exp(&self, exp: &BigNum, modulus: &BigNum) -> Result<BigNum, CryptoError> {
        if modulus.is_zero() {
            return Err(CryptoError::BnDivisionByZero);
        }
        if exp.is_negative() {
            return Err(CryptoError::InvalidArg);
        }
        if modulus.is_odd() {
            let ctx = MontgomeryCtx::new(modulus)?;
            return ctx.mont_exp(self, exp);
        }
        let mut result = BigNum::one().mod_reduce(modulus)?;
        let base = self.mod_reduce(modulus)?;
        for i in (0..exp.bit_len()).rev() {
            result = result.sqr().mod_reduce(modulus)?;
            if exp.get_bit(i) == 1 {
                result = result.mul(&base).mod_reduce(modulus)?;
            }
        }
        Ok(result)
    }

    /// Compare magnitudes.
    pub fn cmp_abs(&self, other: &BigNum) -> Ordering {
        cmp_limbs(self.limbs(), other.limbs())
    }
}

pub(crate) fn cmp_limbs(a: &[Limb], b: &[Limb]) -> Ordering {
    let n = a.len().max(b.len());
    for i in (0..n).rev() {
        let av = a.get(i).copied().unwrap_or(0);
        let bv = b.get(i).copied().unwrap_or(0);
        if av != bv {
            return av.cmp(&bv);
        }
    }
    Ordering::Equal
}

fn add_limbs(a: &[Limb], b: &[Limb]) -> Vec<Limb> {
    let n = a.len().max(b.len());
    let mut out = vec![0u64; n + 1];
    let mut carry = 0u64;
    for (i, o) in out.iter_mut().take(n).enumerate() {
        let s = a.get(i).copied().unwrap_or(0) as DoubleLimb
            + b.get(i).copied().unwrap_or(0) as DoubleLimb
            + carry as DoubleLimb;
        *o = s as Limb;
        carry = (s >> LIMB_BITS) as Limb;
    }
    out[n] = carry;
    out
}

/// a - b for magnitudes `a >= b`.
pub(crate) fn sub_limbs(a: &[Limb], b: &[Limb]) -> Vec<Limb> {
    let mut out = vec![0u64; a.len()];
    let mut borrow = 0u64;
    for i in 0..a.len() {
        let (d1, b1) = a[i].overflowing_sub(b.get(i).copied().unwrap_or(0));
        let (d2, b2) = d1.overflowing_sub(borrow);
        out[i] = d2;
        borrow = (b1 | b2) as u64;
    }
    out
}

fn signed_sub(a: &[Limb], b: &[Limb]) -> BigNum {
    match cmp_limbs(a, b) {
        Ordering::Equal => BigNum::zero(),
        Ordering::Greater => BigNum::from_limbs(sub_limbs(a, b)),
        Ordering::Less => BigNum::from_parts(sub_limbs(b, a), true),
    }
}

pub(crate) fn mul_limbs(a: &[Limb], b: &[Limb]) -> Vec<Limb> {
    let mut out = vec![0u64; a.len() + b.len()];
    for (i, &ai) in a.iter().enumerate() {
        if ai == 0 {
            continue;
        }
        let mut carry = 0u64;
        for (j, &bj) in b.iter().enumerate() {
            let p = ai as DoubleLimb * bj as DoubleLimb
                + out[i + j] as DoubleLimb
                + carry as DoubleLimb;
            out[i + j] = p as Limb;
            carry = (p >> LIMB_BITS) as Limb;
        }
        out[i + b.len()] = carry;
    }
    out
}

fn shl_limbs(a: &[Limb], bits: usize) -> Vec<Limb> {
    let limb_shift = bits / LIMB_BITS;
    let bit_shift = bits % LIMB_BITS;
    let mut out = vec![0u64; a.len() + limb_shift + 1];
    for (i, &limb) in a.iter().enumerate() {
        out[i + limb_shift] |= limb << bit_shift;
        if bit_shift > 0 {
            out[i + limb_shift + 1] |= limb >> (LIMB_BITS - bit_shift);
        }
    }
    out
}

fn trimmed(a: &[Limb]) -> &[Limb] {
    let mut n = a.len();
    while n > 1 && a[n - 1] == 0 {
        n -= 1;
    }
    &a[..n]
}

/// Knuth, TAOCP vol. 2, 4.3.1 Algorithm D on magnitudes.
fn div_rem_limbs(a: &[Limb], b: &[Limb]) -> (Vec<Limb>, Vec<Limb>) {
    let a = trimmed(a);
    let b = trimmed(b);
    if cmp_limbs(a, b) == Ordering::Less {
        return (vec![0], a.to_vec());
    }

    if b.len() == 1 {
        let d = b[0] as DoubleLimb;
        let mut q = vec![0u64; a.len()];
        let mut rem: DoubleLimb = 0;
        for i in (0..a.len()).rev() {
            let cur = (rem << LIMB_BITS) | a[i] as DoubleLimb;
            q[i] = (cur / d) as Limb;
            rem = cur % d;
        }
        return (q, vec![rem as Limb]);
    }

    // D1: normalize so the divisor's top limb has its high bit set.
    let s = b[b.len() - 1].leading_zeros() as usize;
    let bn = {
        let mut v = shl_limbs(b, s);
        v.truncate(b.len());
        v
    };
    let mut an = shl_limbs(a, s);
    an.truncate(a.len() + 1);

    let n = bn.len();
    let m = an.len() - n;
    let mut q = vec![0u64; m];
    let d1 = bn[n - 1] as DoubleLimb;
    let d2 = bn[n - 2] as DoubleLimb;

    for j in (0..m).rev() {
        // D3: estimate qhat from the top two limbs.
        let num = ((an[j + n] as DoubleLimb) << LIMB_BITS) | an[j + n - 1] as DoubleLimb;
        let mut qhat = num / d1;
        let mut rhat = num % d1;
        while (qhat >> LIMB_BITS) != 0
            || qhat * d2 > ((rhat << LIMB_BITS) | an[j + n - 2] as DoubleLimb)
        {
            qhat -= 1;
            rhat += d1;
            if (rhat >> LIMB_BITS) != 0 {
                break;
            }
        }

        // D4: multiply and subtract.
        let mut carry: DoubleLimb = 0;
        let mut borrow = 0u64;
        for i in 0..n {
            let p = qhat * bn[i] as DoubleLimb + carry;
            carry = p >> LIMB_BITS;
            let (t1, b1) = an[i + j].overflowing_sub(p as Limb);
            let (t2, b2) = t1.overflowing_sub(borrow);
            an[i + j] = t2;
            borrow = (b1 | b2) as u64;
        }
        let (t1, b1) = an[j + n].overflowing_sub(carry as Limb);
        let (t2, b2) = t1.overflowing_sub(borrow);
        an[j + n] = t2;

        // D6: add back when the estimate was one too large.
        if b1 || b2 {
            qhat -= 1;
            let mut c: DoubleLimb = 0;
            for i in 0..n {
                let sum = an[i + j] as DoubleLimb + bn[i] as DoubleLimb + c;
                an[i + j] = sum as Limb;
                c = sum >> LIMB_BITS;
            }
            an[j + n] = an[j + n].wrapping_add(c as Limb);
        }
        q[j] = qhat as Limb;
    }

    // D8: unnormalize the remainder.
    let mut r = vec![0u64; n];
    for i in 0..n {
        let lo = an[i] >> s;
        let hi = if s > 0 { an[i + 1] << (LIMB_BITS - s) } else { 0 };
        r[i] = lo | hi;
    }
    (q, r)
}
