//! Domain parameters for the NIST prime curves (FIPS 186-4, SEC 2).
//! Both have a = -3 and cofactor 1.

use mantis_bignum::BigNum;
use mantis_types::EccCurveId;
use std::sync::OnceLock;

use crate::util::unhex;

pub(crate) struct CurveParams {
    pub p: BigNum,
    pub b: BigNum,
    pub gx: BigNum,
    pub gy: BigNum,
    pub n: BigNum,
    /// Field element and scalar length in bytes.
    pub size: usize,
}

struct Raw<const N: usize> {
    p: [u8; N],
    b: [u8; N],
    gx: [u8; N],
    gy: [u8; N],
    n: [u8; N],
}

const P256: Raw<32> = Raw {
    p: unhex("ffffffff00000001000000000000000000000000ffffffffffffffffffffffff"),
    b: unhex("5ac635d8aa3a93e7b3ebbd55769886bc651d06b0cc53b0f63bce3c3e27d2604b"),
    gx: unhex("6b17d1f2e12c4247f8bce6e563a440f277037d812deb33a0f4a13945d898c296"),
    gy: unhex("4fe342e2fe1a7f9b8ee7eb4a7c0f9e162bce33576b315ececbb6406837bf51f5"),
    n: unhex("ffffffff00000000ffffffffffffffffbce6faada7179e84f3b9cac2fc632551"),
};

const P384: Raw<48> = Raw {
    p: unhex(
        "fffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffe\
         ffffffff0000000000000000ffffffff",
    ),
    b: unhex(
        "b3312fa7e23ee7e4988e056be3f82d19181d9c6efe8141120314088f5013875a\
         c656398d8a2ed19d2a85c8edd3ec2aef",
    ),
    gx: unhex(
        "aa87ca22be8b05378eb1c71ef320ad746e1d3b628ba79b9859f741e082542a38\
         5502f25dbf55296c3a545e3872760ab7",
    ),
    gy: unhex(
        "3617de4a96262c6f5d9e98bf9292dc29f8f41dbd289a147ce9da3113b5f0b8c0\
         0a60b1ce1d7e819d7a431d7c90ea0e5f",
    ),
    n: unhex(
        "ffffffffffffffffffffffffffffffffffffffffffffffffc7634d81f4372ddf\
         581a0db248b0a77aecec196accc52973",
    ),
};

impl<const N: usize> Raw<N> {
    fn load(&self) -> CurveParams {
        CurveParams {
            p: BigNum::from_bytes_be(&self.p),
            b: BigNum::from_bytes_be(&self.b),
            gx: BigNum::from_bytes_be(&self.gx),
            gy: BigNum::from_bytes_be(&self.gy),
            n: BigNum::from_bytes_be(&self.n),
            size: N,
        }
    }
}

pub(crate) fn params(curve: EccCurveId) -> &'static CurveParams {
    static P256_PARAMS: OnceLock<CurveParams> = OnceLock::new();
    static P384_PARAMS: OnceLock<CurveParams> = OnceLock::new();
    match curve {
        EccCurveId::NistP256 => P256_PARAMS.get_or_init(|| P256.load()),
        EccCurveId::NistP384 => P384_PARAMS.get_or_init(|| P384.load()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_on_curve() {
        for id in [EccCurveId::NistP256, EccCurveId::NistP384] {
            let c = params(id);
            let p = &c.p;
            // y^2 = x^3 - 3x + b
            let lhs = c.gy.mod_mul(&c.gy, p).unwrap();
            let x3 = c.gx.mod_mul(&c.gx, p).unwrap().mod_mul(&c.gx, p).unwrap();
            let three_x = c.gx.mul_u64(3).mod_reduce(p).unwrap();
            let rhs = x3.mod_sub(&three_x, p).unwrap().mod_add(&c.b, p).unwrap();
            assert_eq!(lhs, rhs);
            assert_eq!(c.p.bit_len(), id.field_size() * 8);
            assert_eq!(c.n.bit_len(), id.field_size() * 8);
        }
    }
}
