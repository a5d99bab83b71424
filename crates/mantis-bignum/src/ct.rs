//! Constant-time helpers on magnitudes.

use crate::bignum::BigNum;
use subtle::{Choice, ConditionallySelectable, ConstantTimeEq};

impl BigNum {
    /// Constant-time equality of magnitudes over the longer limb length.
    pub fn ct_eq(&self, other: &BigNum) -> Choice {
        let n = self.num_limbs().max(other.num_limbs());
        let a = self.limbs_padded(n);
        let b = other.limbs_padded(n);
        let mut acc = Choice::from(1u8);
        for i in 0..n {
            acc &= a[i].ct_eq(&b[i]);
        }
        acc
    }

    /// Returns `a` if `choice` is 0 and `b` if it is 1.
    pub fn ct_select(a: &BigNum, b: &BigNum, choice: Choice) -> BigNum {
        let n = a.num_limbs().max(b.num_limbs());
        let la = a.limbs_padded(n);
        let lb = b.limbs_padded(n);
        let out = (0..n)
            .map(|i| u64::conditional_select(&la[i], &lb[i], choice))
            .collect();
        BigNum::from_limbs(out)
    }
}

impl ConstantTimeEq for BigNum {
    fn ct_eq(&self, other: &Self) -> Choice {
        BigNum::ct_eq(self, other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ct_eq_and_select() {
        let a = BigNum::from_u64(42);
        let b = BigNum::one().shl(64).add(&BigNum::from_u64(42));
        assert_eq!(a.ct_eq(&a.clone()).unwrap_u8(), 1);
        assert_eq!(a.ct_eq(&b).unwrap_u8(), 0);
        assert_eq!(BigNum::ct_select(&a, &b, Choice::from(0)), a);
        assert_eq!(BigNum::ct_select(&a, &b, Choice::from(1)), b);
    }
}
