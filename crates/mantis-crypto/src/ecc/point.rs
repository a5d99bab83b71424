//! Jacobian point arithmetic over the a = -3 prime curves.
//!
//! A point (X, Y, Z) stands for the affine point (X/Z², Y/Z³); Z = 0 is the
//! point at infinity.

use mantis_bignum::BigNum;
use mantis_types::CryptoError;
use subtle::Choice;

use super::curves::CurveParams;

#[derive(Clone, Debug)]
pub(crate) struct Jacobian {
    pub x: BigNum,
    pub y: BigNum,
    pub z: BigNum,
}

impl Jacobian {
    pub fn infinity() -> Self {
        Jacobian {
            x: BigNum::one(),
            y: BigNum::one(),
            z: BigNum::zero(),
        }
    }

    pub fn from_affine(x: &BigNum, y: &BigNum) -> Self {
        Jacobian {
            x: x.clone(),
            y: y.clone(),
            z: BigNum::one(),
        }
    }

    pub fn is_infinity(&self) -> bool {
        self.z.is_zero()
    }

    pub fn to_affine(&self, p: &BigNum) -> Result<Option<(BigNum, BigNum)>, CryptoError> {
        if self.is_infinity() {
            return Ok(None);
        }
        let zi = self.z.mod_inv(p)?;
        let zi2 = zi.mod_mul(&zi, p)?;
        let zi3 = zi2.mod_mul(&zi, p)?;
        Ok(Some((self.x.mod_mul(&zi2, p)?, self.y.mod_mul(&zi3, p)?)))
    }

    /// Swap `a` and `b` when `swap` is set, without branching on it.
    fn cswap(a: &mut Jacobian, b: &mut Jacobian, swap: Choice) {
        let na = Jacobian {
            x: BigNum::ct_select(&a.x, &b.x, swap),
            y: BigNum::ct_select(&a.y, &b.y, swap),
            z: BigNum::ct_select(&a.z, &b.z, swap),
        };
        let nb = Jacobian {
            x: BigNum::ct_select(&b.x, &a.x, swap),
            y: BigNum::ct_select(&b.y, &a.y, swap),
            z: BigNum::ct_select(&b.z, &a.z, swap),
        };
        *a = na;
        *b = nb;
    }
}

/// `y² == x³ - 3x + b (mod p)` for affine coordinates already below p.
pub(crate) fn on_curve(x: &BigNum, y: &BigNum, c: &CurveParams) -> Result<bool, CryptoError> {
    let p = &c.p;
    let lhs = y.mod_mul(y, p)?;
    let x3 = x.mod_mul(x, p)?.mod_mul(x, p)?;
    let three_x = x.mul_u64(3).mod_reduce(p)?;
    let rhs = x3.mod_sub(&three_x, p)?.mod_add(&c.b, p)?;
    Ok(lhs == rhs)
}

pub(crate) fn add(a: &Jacobian, b: &Jacobian, c: &CurveParams) -> Result<Jacobian, CryptoError> {
    if a.is_infinity() {
        return Ok(b.clone());
    }
    if b.is_infinity() {
        return Ok(a.clone());
    }
    let p = &c.p;

    let z1z1 = a.z.mod_mul(&a.z, p)?;
    let z2z2 = b.z.mod_mul(&b.z, p)?;
    let u1 = a.x.mod_mul(&z2z2, p)?;
    let u2 = b.x.mod_mul(&z1z1, p)?;
    let s1 = a.y.mod_mul(&z2z2, p)?.mod_mul(&b.z, p)?;
    let s2 = b.y.mod_mul(&z1z1, p)?.mod_mul(&a.z, p)?;

    let h = u2.mod_sub(&u1, p)?;
    let r = s2.mod_sub(&s1, p)?;
    if h.is_zero() {
        return if r.is_zero() {
            double(a, c)
        } else {
            Ok(Jacobian::infinity())
        };
    }

    let hh = h.mod_mul(&h, p)?;
    let hhh = hh.mod_mul(&h, p)?;
    let v = u1.mod_mul(&hh, p)?;

    // X3 = r² - H³ - 2V
    let x3 = r
        .mod_mul(&r, p)?
        .mod_sub(&hhh, p)?
        .mod_sub(&v, p)?
        .mod_sub(&v, p)?;
    // Y3 = r(V - X3) - S1·H³
    let y3 = r
        .mod_mul(&v.mod_sub(&x3, p)?, p)?
        .mod_sub(&s1.mod_mul(&hhh, p)?, p)?;
    let z3 = h.mod_mul(&a.z, p)?.mod_mul(&b.z, p)?;

    Ok(Jacobian {
        x: x3,
        y: y3,
        z: z3,
    })
}

/// Doubling with M = 3(X + Z²)(X - Z²), valid because a = -3.
pub(crate) fn double(a: &Jacobian, c: &CurveParams) -> Result<Jacobian, CryptoError> {
    if a.is_infinity() || a.y.is_zero() {
        return Ok(Jacobian::infinity());
    }
    let p = &c.p;

    let yy = a.y.mod_mul(&a.y, p)?;
    let zz = a.z.mod_mul(&a.z, p)?;
    let s = a.x.mod_mul(&yy, p)?.mul_u64(4).mod_reduce(p)?;
    let m = a
        .x
        .mod_add(&zz, p)?
        .mod_mul(&a.x.mod_sub(&zz, p)?, p)?
        .mul_u64(3)
        .mod_reduce(p)?;

    let x3 = m.mod_mul(&m, p)?.mod_sub(&s.shl(1).mod_reduce(p)?, p)?;
    let yyyy8 = yy.mod_mul(&yy, p)?.mul_u64(8).mod_reduce(p)?;
    let y3 = m.mod_mul(&s.mod_sub(&x3, p)?, p)?.mod_sub(&yyyy8, p)?;
    let z3 = a.y.mod_mul(&a.z, p)?.shl(1).mod_reduce(p)?;

    Ok(Jacobian {
        x: x3,
        y: y3,
        z: z3,
    })
}

/// `k·P` for a secret `k < n`.
///
/// Montgomery ladder over a fixed bit count (the bit length of n) with
/// masked swaps, so the sequence of group operations does not depend on k.
pub(crate) fn mul_secret(
    k: &BigNum,
    point: &Jacobian,
    c: &CurveParams,
) -> Result<Jacobian, CryptoError> {
    let mut r0 = Jacobian::infinity();
    let mut r1 = point.clone();
    for i in (0..c.n.bit_len()).rev() {
        let bit = Choice::from(k.get_bit(i) as u8);
        Jacobian::cswap(&mut r0, &mut r1, bit);
        r1 = add(&r0, &r1, c)?;
        r0 = double(&r0, c)?;
        Jacobian::cswap(&mut r0, &mut r1, bit);
    }
    Ok(r0)
}

/// `u1·G + u2·Q` with Shamir's trick. Variable time; only for public inputs.
pub(crate) fn mul_add_public(
    u1: &BigNum,
    u2: &BigNum,
    q: &Jacobian,
    c: &CurveParams,
) -> Result<Jacobian, CryptoError> {
    let g = Jacobian::from_affine(&c.gx, &c.gy);
    let gq = add(&g, q, c)?;
    let bits = u1.bit_len().max(u2.bit_len());
    let mut acc = Jacobian::infinity();
    for i in (0..bits).rev() {
        acc = double(&acc, c)?;
        match (u1.get_bit(i), u2.get_bit(i)) {
            (1, 1) => acc = add(&acc, &gq, c)?,
            (1, _) => acc = add(&acc, &g, c)?,
            (_, 1) => acc = add(&acc, q, c)?,
            _ => {}
        }
    }
    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecc::curves::params;
    use mantis_types::EccCurveId;

    fn affine(pt: &Jacobian, c: &CurveParams) -> (BigNum, BigNum) {
        pt.to_affine(&c.p).unwrap().unwrap()
    }

    #[test]
    fn test_identity_and_inverse() {
        let c = params(EccCurveId::NistP256);
        let g = Jacobian::from_affine(&c.gx, &c.gy);
        let inf = Jacobian::infinity();
        assert_eq!(affine(&add(&g, &inf, c).unwrap(), c), (c.gx.clone(), c.gy.clone()));
        assert_eq!(affine(&add(&inf, &g, c).unwrap(), c), (c.gx.clone(), c.gy.clone()));
        let neg = Jacobian::from_affine(&c.gx, &c.p.sub(&c.gy));
        assert!(add(&g, &neg, c).unwrap().is_infinity());
        assert!(inf.to_affine(&c.p).unwrap().is_none());
    }

    #[test]
    fn test_double_matches_add() {
        for id in [EccCurveId::NistP256, EccCurveId::NistP384] {
            let c = params(id);
            let g = Jacobian::from_affine(&c.gx, &c.gy);
            let d = affine(&double(&g, c).unwrap(), c);
            assert_eq!(d, affine(&add(&g, &g, c).unwrap(), c));
            assert!(on_curve(&d.0, &d.1, c).unwrap());
        }
    }

    #[test]
    fn test_ladder_small_scalars() {
        let c = params(EccCurveId::NistP256);
        let g = Jacobian::from_affine(&c.gx, &c.gy);
        let mut acc = Jacobian::infinity();
        for k in 1..=6u64 {
            acc = add(&acc, &g, c).unwrap();
            let got = mul_secret(&BigNum::from_u64(k), &g, c).unwrap();
            assert_eq!(affine(&got, c), affine(&acc, c), "k = {k}");
        }
        assert!(mul_secret(&BigNum::zero(), &g, c).unwrap().is_infinity());
    }

    #[test]
    fn test_order_annihilates_generator() {
        let c = params(EccCurveId::NistP384);
        let g = Jacobian::from_affine(&c.gx, &c.gy);
        let n_minus_1 = c.n.sub(&BigNum::one());
        let r = mul_secret(&n_minus_1, &g, c).unwrap();
        // (n-1)G = -G
        assert_eq!(affine(&r, c), (c.gx.clone(), c.p.sub(&c.gy)));
        assert!(add(&r, &g, c).unwrap().is_infinity());
    }

    #[test]
    fn test_shamir_matches_separate() {
        let c = params(EccCurveId::NistP256);
        let g = Jacobian::from_affine(&c.gx, &c.gy);
        let q = double(&g, c).unwrap();
        let (u1, u2) = (BigNum::from_u64(7), BigNum::from_u64(11));
        let combined = mul_add_public(&u1, &u2, &q, c).unwrap();
        let separate = add(
            &mul_secret(&u1, &g, c).unwrap(),
            &mul_secret(&u2, &q, c).unwrap(),
            c,
        )
        .unwrap();
        assert_eq!(affine(&combined, c), affine(&separate, c));
        // 7 + 22 = 29
        let direct = mul_secret(&BigNum::from_u64(29), &g, c).unwrap();
        assert_eq!(affine(&combined, c), affine(&direct, c));
    }
}
