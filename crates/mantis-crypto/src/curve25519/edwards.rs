//! The twisted Edwards form of Curve25519 (edwards25519) in extended
//! coordinates `(X : Y : Z : T)` with `x = X/Z`, `y = Y/Z`, `xy = T/Z`.

use super::field::Fe;
use subtle::{Choice, ConditionallySelectable, ConstantTimeEq};

/// d = -121665/121666
const D: Fe = Fe([
    0x3_4DCA_1359_78A3,
    0x1_A828_3B15_6EBD,
    0x5_E7A2_6001_C029,
    0x7_39C6_63A0_3CBB,
    0x5_2036_CEE2_B6FF,
]);

const D2: Fe = Fe([
    0x6_9B94_26B2_F159,
    0x3_5050_762A_DD7A,
    0x3_CF44_C003_8052,
    0x6_738C_C740_7977,
    0x2_406D_9DC5_6DFF,
]);

const SQRT_M1: Fe = Fe([
    0x6_1B27_4A0E_A0B0,
    0x0_D5A5_FC8F_189D,
    0x7_EF5E_9CBD_0C60,
    0x7_8595_A680_4C9E,
    0x2_B832_4804_FC1D,
]);

const BASE_X: Fe = Fe([
    0x6_2D60_8F25_D51A,
    0x4_12A4_B4F6_592A,
    0x7_5B71_71A4_B31D,
    0x1_FF60_5271_18FE,
    0x2_1693_6D3C_D6E5,
]);

const BASE_Y: Fe = Fe([
    0x6_6666_6666_6658,
    0x4_CCCC_CCCC_CCCC,
    0x1_9999_9999_9999,
    0x3_3333_3333_3333,
    0x6_6666_6666_6666,
]);

#[derive(Clone, Copy, Debug)]
pub(crate) struct EdwardsPoint {
    x: Fe,
    y: Fe,
    z: Fe,
    t: Fe,
}

impl EdwardsPoint {
    pub(crate) fn identity() -> Self {
        EdwardsPoint {
            x: Fe::ZERO,
            y: Fe::ONE,
            z: Fe::ONE,
            t: Fe::ZERO,
        }
    }

    pub(crate) fn basepoint() -> Self {
        EdwardsPoint {
            x: BASE_X,
            y: BASE_Y,
            z: Fe::ONE,
            t: BASE_X * BASE_Y,
        }
    }

    /// Unified addition (Hisil-Wong-Carter-Dawson, a = -1).
    pub(crate) fn add(&self, q: &EdwardsPoint) -> EdwardsPoint {
        let a = (self.y - self.x) * (q.y - q.x);
        let b = (self.y + self.x) * (q.y + q.x);
        let c = self.t * D2 * q.t;
        let d = (self.z + self.z) * q.z;
        let (e, f, g, h) = (b - a, d - c, d + c, b + a);
        EdwardsPoint {
            x: e * f,
            y: g * h,
            z: f * g,
            t: e * h,
        }
    }

    pub(crate) fn double(&self) -> EdwardsPoint {
        let a = self.x.square();
        let b = self.y.square();
        let c = self.z.square() + self.z.square();
        let e = (self.x + self.y).square() - a - b;
        let g = b - a;
        let f = g - c;
        let h = -a - b;
        EdwardsPoint {
            x: e * f,
            y: g * h,
            z: f * g,
            t: e * h,
        }
    }

    pub(crate) fn neg(&self) -> EdwardsPoint {
        EdwardsPoint {
            x: -self.x,
            y: self.y,
            z: self.z,
            t: -self.t,
        }
    }

    /// `[k]P` for a little-endian 256-bit scalar. Runs the same sequence of
    /// field operations for every scalar.
    pub(crate) fn mul(&self, k: &[u8; 32]) -> EdwardsPoint {
        let mut acc = EdwardsPoint::identity();
        for i in (0..256).rev() {
            acc = acc.double();
            let sum = acc.add(self);
            let bit = Choice::from((k[i / 8] >> (i % 8)) & 1);
            acc = EdwardsPoint::conditional_select(&acc, &sum, bit);
        }
        acc
    }

    pub(crate) fn mul_base(k: &[u8; 32]) -> EdwardsPoint {
        EdwardsPoint::basepoint().mul(k)
    }

    /// `[8]P`, clearing the small-order component.
    pub(crate) fn mul_by_cofactor(&self) -> EdwardsPoint {
        self.double().double().double()
    }

    pub(crate) fn is_identity(&self) -> bool {
        bool::from(self.ct_eq(&EdwardsPoint::identity()))
    }

    /// RFC 8032 §5.1.2 encoding: y with the sign of x in bit 255.
    pub(crate) fn compress(&self) -> [u8; 32] {
        let zinv = self.z.invert();
        let x = self.x * zinv;
        let y = self.y * zinv;
        let mut out = y.to_bytes();
        out[31] |= x.is_negative().unwrap_u8() << 7;
        out
    }

    /// RFC 8032 §5.1.3 decoding. Rejects non-canonical y and encodings with
    /// no square root.
    pub(crate) fn decompress(bytes: &[u8; 32]) -> Option<EdwardsPoint> {
        let sign = bytes[31] >> 7;
        let mut y_bytes = *bytes;
        y_bytes[31] &= 0x7f;
        let y = Fe::from_bytes(&y_bytes);
        if y.to_bytes() != y_bytes {
            return None;
        }

        let yy = y.square();
        let u = yy - Fe::ONE;
        let v = D * yy + Fe::ONE;
        let v3 = v.square() * v;
        let mut x = u * v3 * (u * v3 * v3 * v).pow_p58();

        let vxx = v * x.square();
        if bool::from(vxx.ct_eq(&(-u))) {
            x = x * SQRT_M1;
        } else if !bool::from(vxx.ct_eq(&u)) {
            return None;
        }

        if bool::from(x.is_zero()) && sign == 1 {
            return None;
        }
        if x.is_negative().unwrap_u8() != sign {
            x = -x;
        }
        Some(EdwardsPoint {
            x,
            y,
            z: Fe::ONE,
            t: x * y,
        })
    }
}

impl ConditionallySelectable for EdwardsPoint {
    fn conditional_select(a: &Self, b: &Self, choice: Choice) -> Self {
        EdwardsPoint {
            x: Fe::conditional_select(&a.x, &b.x, choice),
            y: Fe::conditional_select(&a.y, &b.y, choice),
            z: Fe::conditional_select(&a.z, &b.z, choice),
            t: Fe::conditional_select(&a.t, &b.t, choice),
        }
    }
}

impl ConstantTimeEq for EdwardsPoint {
    /// Projective equality: X1*Z2 == X2*Z1 and Y1*Z2 == Y2*Z1.
    fn ct_eq(&self, other: &Self) -> Choice {
        (self.x * other.z).ct_eq(&(other.x * self.z)) & (self.y * other.z).ct_eq(&(other.y * self.z))
    }
}
