//! NIST P-256 and P-384 curve arithmetic shared by ECDH and ECDSA.

pub(crate) mod curves;
pub(crate) mod point;

use mantis_bignum::BigNum;
use mantis_types::{CryptoError, EccCurveId};

use curves::params;
use point::Jacobian;

/// An affine point on one of the supported curves, never the identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EcPoint {
    curve: EccCurveId,
    x: BigNum,
    y: BigNum,
}

impl EcPoint {
    /// The base point G.
    pub fn generator(curve: EccCurveId) -> Self {
        let c = params(curve);
        EcPoint {
            curve,
            x: c.gx.clone(),
            y: c.gy.clone(),
        }
    }

    /// Parse `0x04 || X || Y` (SEC 1 uncompressed form) and check the
    /// point lies on the curve.
    ///
    /// The single byte `0x00` encodes the point at infinity and is refused
    /// with [`CryptoError::EccPointAtInfinity`].
    pub fn from_uncompressed(curve: EccCurveId, data: &[u8]) -> Result<Self, CryptoError> {
        if data == [0x00] {
            return Err(CryptoError::EccPointAtInfinity);
        }
        let c = params(curve);
        if data.len() != 1 + 2 * c.size || data[0] != 0x04 {
            return Err(CryptoError::EccInvalidPublicKey);
        }
        let x = BigNum::from_bytes_be(&data[1..1 + c.size]);
        let y = BigNum::from_bytes_be(&data[1 + c.size..]);
        if x >= c.p || y >= c.p || !point::on_curve(&x, &y, c)? {
            return Err(CryptoError::EccPointNotOnCurve);
        }
        Ok(EcPoint { curve, x, y })
    }

    pub fn to_uncompressed(&self) -> Result<Vec<u8>, CryptoError> {
        let size = self.curve.field_size();
        let mut out = Vec::with_capacity(1 + 2 * size);
        out.push(0x04);
        out.extend_from_slice(&self.x.to_bytes_be_padded(size)?);
        out.extend_from_slice(&self.y.to_bytes_be_padded(size)?);
        Ok(out)
    }

    pub fn curve(&self) -> EccCurveId {
        self.curve
    }

    /// Affine x-coordinate, left-padded to the field size.
    pub fn x_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        self.x.to_bytes_be_padded(self.curve.field_size())
    }

    pub(crate) fn x(&self) -> &BigNum {
        &self.x
    }

    pub(crate) fn to_jacobian(&self) -> Jacobian {
        Jacobian::from_affine(&self.x, &self.y)
    }

    /// Back to affine; infinity maps to [`CryptoError::EccPointAtInfinity`].
    pub(crate) fn from_jacobian(curve: EccCurveId, pt: &Jacobian) -> Result<Self, CryptoError> {
        let (x, y) = pt
            .to_affine(&params(curve).p)?
            .ok_or(CryptoError::EccPointAtInfinity)?;
        Ok(EcPoint { curve, x, y })
    }

    /// `k·self` for a secret scalar.
    pub(crate) fn mul_secret(&self, k: &BigNum) -> Result<Self, CryptoError> {
        let r = point::mul_secret(k, &self.to_jacobian(), params(self.curve))?;
        EcPoint::from_jacobian(self.curve, &r)
    }
}

/// Group order n of `curve`.
pub(crate) fn order(curve: EccCurveId) -> &'static BigNum {
    &params(curve).n
}

/// Validate a private scalar encoding: field-size bytes, 1 <= d < n.
pub(crate) fn scalar_from_bytes(curve: EccCurveId, bytes: &[u8]) -> Result<BigNum, CryptoError> {
    if bytes.len() != curve.field_size() {
        return Err(CryptoError::EccInvalidPrivateKey);
    }
    let d = BigNum::from_bytes_be(bytes);
    if d.is_zero() || d >= *order(curve) {
        return Err(CryptoError::EccInvalidPrivateKey);
    }
    Ok(d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::hex;

    const P256_PUB: &str = "04e1e39c597336d756a3ecd4bc1e034992c0021827c4f25159a7cb644f8a2a8d9b\
                            61d106eebab28c2afef121ebbce5b42672fa5da0fcd726466668552d4f528c6f";
    const P256_PRIV: &str = "4fbcf3229f4f39d75306badbb4ffdbe9fce265377509494bad166142bda03680";

    #[test]
    fn test_uncompressed_roundtrip() {
        let enc = hex(P256_PUB);
        let pt = EcPoint::from_uncompressed(EccCurveId::NistP256, &enc).unwrap();
        assert_eq!(pt.to_uncompressed().unwrap(), enc);
        assert_eq!(pt.curve(), EccCurveId::NistP256);
    }

    #[test]
    fn test_scalar_mul_known_key() {
        let d = scalar_from_bytes(EccCurveId::NistP256, &hex(P256_PRIV)).unwrap();
        let q = EcPoint::generator(EccCurveId::NistP256).mul_secret(&d).unwrap();
        assert_eq!(q.to_uncompressed().unwrap(), hex(P256_PUB));
    }

    #[test]
    fn test_decode_rejects() {
        let mut enc = hex(P256_PUB);
        assert_eq!(
            EcPoint::from_uncompressed(EccCurveId::NistP256, &[0x00]),
            Err(CryptoError::EccPointAtInfinity)
        );
        assert_eq!(
            EcPoint::from_uncompressed(EccCurveId::NistP384, &enc),
            Err(CryptoError::EccInvalidPublicKey)
        );
        enc[64] ^= 1;
        assert_eq!(
            EcPoint::from_uncompressed(EccCurveId::NistP256, &enc),
            Err(CryptoError::EccPointNotOnCurve)
        );
        enc[0] = 0x03;
        assert_eq!(
            EcPoint::from_uncompressed(EccCurveId::NistP256, &enc),
            Err(CryptoError::EccInvalidPublicKey)
        );
    }

    #[test]
    fn test_private_scalar_range() {
        let n = order(EccCurveId::NistP256).to_bytes_be();
        assert!(scalar_from_bytes(EccCurveId::NistP256, &n).is_err());
        assert!(scalar_from_bytes(EccCurveId::NistP256, &[0u8; 32]).is_err());
        assert!(scalar_from_bytes(EccCurveId::NistP256, &[1u8; 31]).is_err());
    }
}
