//! Arithmetic in GF(2^255 - 19), five unsigned 51-bit limbs.
//!
//! Every operation returns limbs below 2^52, so any output can feed any other
//! operation without an explicit normalisation step. Only [`Fe::to_bytes`]
//! produces the canonical residue.

use core::ops::{Add, Mul, Neg, Sub};
use subtle::{Choice, ConditionallySelectable, ConstantTimeEq};

const MASK: u64 = (1 << 51) - 1;

/// 4p in limb form, added before subtracting so limbs never go negative.
const FOUR_P: [u64; 5] = [
    0x1F_FFFF_FFFF_FFB4,
    0x1F_FFFF_FFFF_FFFC,
    0x1F_FFFF_FFFF_FFFC,
    0x1F_FFFF_FFFF_FFFC,
    0x1F_FFFF_FFFF_FFFC,
];

#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Fe(pub(crate) [u64; 5]);

impl Fe {
    pub(crate) const ZERO: Fe = Fe([0, 0, 0, 0, 0]);
    pub(crate) const ONE: Fe = Fe([1, 0, 0, 0, 0]);

    /// One carry pass; the top carry wraps around multiplied by 19.
    fn carry(mut l: [u64; 5]) -> Fe {
        for i in 0..4 {
            l[i + 1] += l[i] >> 51;
            l[i] &= MASK;
        }
        l[0] += 19 * (l[4] >> 51);
        l[4] &= MASK;
        Fe(l)
    }

    fn carry_wide(c: [u128; 5]) -> Fe {
        let mut l = [0u64; 5];
        let mut carry = 0u128;
        for (out, v) in l.iter_mut().zip(c) {
            let t = v + carry;
            *out = (t as u64) & MASK;
            carry = t >> 51;
        }
        let t = l[0] as u128 + carry * 19;
        l[0] = (t as u64) & MASK;
        l[1] += (t >> 51) as u64;
        Fe(l)
    }

    pub(crate) fn square(&self) -> Fe {
        *self * *self
    }

    /// `self^(2^k)`.
    pub(crate) fn pow2k(&self, k: u32) -> Fe {
        let mut r = *self;
        for _ in 0..k {
            r = r.square();
        }
        r
    }

    /// Multiply by a small constant such as 121666.
    pub(crate) fn mul_small(&self, k: u32) -> Fe {
        let mut c = [0u128; 5];
        for (ci, &a) in c.iter_mut().zip(&self.0) {
            *ci = a as u128 * k as u128;
        }
        Fe::carry_wide(c)
    }

    /// Returns `(self^(2^250 - 1), self^11)`, the shared prefix of the
    /// inversion and square root exponents.
    fn pow22501(&self) -> (Fe, Fe) {
        let z2 = self.square();
        let z9 = *self * z2.pow2k(2);
        let z11 = z2 * z9;
        let z_5_0 = z9 * z11.square();
        let z_10_0 = z_5_0.pow2k(5) * z_5_0;
        let z_20_0 = z_10_0.pow2k(10) * z_10_0;
        let z_40_0 = z_20_0.pow2k(20) * z_20_0;
        let z_50_0 = z_40_0.pow2k(10) * z_10_0;
        let z_100_0 = z_50_0.pow2k(50) * z_50_0;
        let z_200_0 = z_100_0.pow2k(100) * z_100_0;
        let z_250_0 = z_200_0.pow2k(50) * z_50_0;
        (z_250_0, z11)
    }

    /// `self^(p - 2)`; zero maps to zero.
    pub(crate) fn invert(&self) -> Fe {
        let (z_250_0, z11) = self.pow22501();
        z_250_0.pow2k(5) * z11
    }

    /// `self^((p - 5) / 8)`, used for square roots.
    pub(crate) fn pow_p58(&self) -> Fe {
        let (z_250_0, _) = self.pow22501();
        z_250_0.pow2k(2) * *self
    }

    /// Decode 32 little-endian bytes; bit 255 is ignored.
    pub(crate) fn from_bytes(bytes: &[u8; 32]) -> Fe {
        let w = |i: usize| {
            let mut b = [0u8; 8];
            b.copy_from_slice(&bytes[8 * i..8 * i + 8]);
            u64::from_le_bytes(b)
        };
        let (w0, w1, w2, w3) = (w(0), w(1), w(2), w(3));
        Fe([
            w0 & MASK,
            ((w0 >> 51) | (w1 << 13)) & MASK,
            ((w1 >> 38) | (w2 << 26)) & MASK,
            ((w2 >> 25) | (w3 << 39)) & MASK,
            (w3 >> 12) & MASK,
        ])
    }

    /// Canonical little-endian encoding.
    pub(crate) fn to_bytes(&self) -> [u8; 32] {
        let mut l = Fe::carry(Fe::carry(self.0).0).0;
        // q = 1 exactly when the value is at least p
        let mut q = (l[0] + 19) >> 51;
        for limb in &l[1..] {
            q = (limb + q) >> 51;
        }
        l[0] += 19 * q;
        for i in 0..4 {
            l[i + 1] += l[i] >> 51;
            l[i] &= MASK;
        }
        l[4] &= MASK;

        let words = [
            l[0] | (l[1] << 51),
            (l[1] >> 13) | (l[2] << 38),
            (l[2] >> 26) | (l[3] << 25),
            (l[3] >> 39) | (l[4] << 12),
        ];
        let mut out = [0u8; 32];
        for (chunk, w) in out.chunks_exact_mut(8).zip(words) {
            chunk.copy_from_slice(&w.to_le_bytes());
        }
        out
    }

    /// Low bit of the canonical encoding.
    pub(crate) fn is_negative(&self) -> Choice {
        Choice::from(self.to_bytes()[0] & 1)
    }

    pub(crate) fn is_zero(&self) -> Choice {
        self.ct_eq(&Fe::ZERO)
    }
}

impl ConstantTimeEq for Fe {
    fn ct_eq(&self, other: &Fe) -> Choice {
        self.to_bytes()[..].ct_eq(&other.to_bytes()[..])
    }
}

impl ConditionallySelectable for Fe {
    fn conditional_select(a: &Fe, b: &Fe, choice: Choice) -> Fe {
        let mut l = [0u64; 5];
        for (i, out) in l.iter_mut().enumerate() {
            *out = u64::conditional_select(&a.0[i], &b.0[i], choice);
        }
        Fe(l)
    }
}

impl Add for Fe {
    type Output = Fe;
    fn add(self, rhs: Fe) -> Fe {
        let mut l = self.0;
        for (a, b) in l.iter_mut().zip(rhs.0) {
            *a += b;
        }
        Fe::carry(l)
    }
}

impl Sub for Fe {
    type Output = Fe;
    fn sub(self, rhs: Fe) -> Fe {
        let mut l = [0u64; 5];
        for i in 0..5 {
            l[i] = self.0[i] + FOUR_P[i] - rhs.0[i];
        }
        Fe::carry(l)
    }
}

impl Neg for Fe {
    type Output = Fe;
    fn neg(self) -> Fe {
        Fe::ZERO - self
    }
}

impl Mul for Fe {
    type Output = Fe;
    fn mul(self, rhs: Fe) -> Fe {
        let a = self.0;
        let b = rhs.0;
        let m = |x: u64, y: u64| x as u128 * y as u128;
        let b1 = b[1] * 19;
        let b2 = b[2] * 19;
        let b3 = b[3] * 19;
        let b4 = b[4] * 19;
        Fe::carry_wide([
            m(a[0], b[0]) + m(a[1], b4) + m(a[2], b3) + m(a[3], b2) + m(a[4], b1),
            m(a[0], b[1]) + m(a[1], b[0]) + m(a[2], b4) + m(a[3], b3) + m(a[4], b2),
            m(a[0], b[2]) + m(a[1], b[1]) + m(a[2], b[0]) + m(a[3], b4) + m(a[4], b3),
            m(a[0], b[3]) + m(a[1], b[2]) + m(a[2], b[1]) + m(a[3], b[0]) + m(a[4], b4),
            m(a[0], b[4]) + m(a[1], b[3]) + m(a[2], b[2]) + m(a[3], b[1]) + m(a[4], b[0]),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fe(v: u64) -> Fe {
        let mut b = [0u8; 32];
        b[..8].copy_from_slice(&v.to_le_bytes());
        Fe::from_bytes(&b)
    }

    #[test]
    fn test_encoding_roundtrip() {
        let mut b = [0u8; 32];
        for (i, x) in b.iter_mut().enumerate() {
            *x = (i as u8).wrapping_mul(37).wrapping_add(5);
        }
        b[31] &= 0x7f;
        assert_eq!(Fe::from_bytes(&b).to_bytes(), b);
    }

    #[test]
    fn test_non_canonical_input_reduces() {
        // p + 3 encodes the same element as 3
        let mut b = [0xffu8; 32];
        b[0] = 0xed + 3;
        b[31] = 0x7f;
        assert_eq!(Fe::from_bytes(&b).to_bytes(), fe(3).to_bytes());
        // -1 reduces to p - 1
        let minus_one = -Fe::ONE;
        let mut expect = [0xffu8; 32];
        expect[0] = 0xec;
        expect[31] = 0x7f;
        assert_eq!(minus_one.to_bytes(), expect);
    }

    #[test]
    fn test_mul_and_invert() {
        let a = fe(123_456_789);
        let b = fe(987_654_321);
        assert_eq!((a * b).to_bytes(), fe(123_456_789 * 987_654_321).to_bytes());
        assert!(bool::from((a * a.invert()).ct_eq(&Fe::ONE)));
        assert!(bool::from(Fe::ZERO.invert().is_zero()));
    }

    #[test]
    fn test_sub_wraps() {
        let r = fe(5) - fe(7) + fe(2);
        assert!(bool::from(r.is_zero()));
    }

    #[test]
    fn test_select() {
        let a = fe(1);
        let b = fe(2);
        assert!(bool::from(Fe::conditional_select(&a, &b, Choice::from(1)).ct_eq(&b)));
        assert!(bool::from(Fe::conditional_select(&a, &b, Choice::from(0)).ct_eq(&a)));
    }
}
