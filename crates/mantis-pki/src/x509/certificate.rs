//! Certificate DER decoding.

use mantis_types::{CryptoError, PkiError};
use mantis_utils::asn1::{tags, Decoder};
use mantis_utils::oid::{known, Oid};

use super::signing::{curve_from_oid, verify_signature};
use super::{DistinguishedName, PublicKeyInfo, SignatureAlgorithm, X509Extension};

fn asn1_err(e: CryptoError) -> PkiError {
    PkiError::Asn1Error(e.to_string())
}

/// A decoded X.509 certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    /// Complete DER encoding.
    pub raw: Vec<u8>,
    /// 1, 2 or 3.
    pub version: u8,
    /// Serial number contents octets.
    pub serial_number: Vec<u8>,
    pub signature_algorithm: SignatureAlgorithm,
    pub issuer: DistinguishedName,
    pub subject: DistinguishedName,
    /// Unix seconds.
    pub not_before: i64,
    /// Unix seconds.
    pub not_after: i64,
    pub public_key: PublicKeyInfo,
    pub extensions: Vec<X509Extension>,
    pub signature_value: Vec<u8>,
    tbs_raw: Vec<u8>,
}

fn parse_signature_algorithm(dec: &mut Decoder) -> Result<SignatureAlgorithm, PkiError> {
    let mut alg = dec.read_sequence().map_err(asn1_err)?;
    let oid = Oid::from_der_value(alg.read_oid().map_err(asn1_err)?).map_err(asn1_err)?;
    if !alg.is_empty() {
        alg.read_null().map_err(asn1_err)?;
    }
    alg.finish().map_err(asn1_err)?;
    SignatureAlgorithm::from_oid(&oid)
        .ok_or_else(|| PkiError::UnsupportedAlgorithm(format!("signature algorithm {oid}")))
}

pub(crate) fn parse_name(dec: &mut Decoder) -> Result<DistinguishedName, PkiError> {
    let mut name = dec.read_sequence().map_err(asn1_err)?;
    let mut entries = Vec::new();
    while !name.is_empty() {
        let mut rdn = name.read_set().map_err(asn1_err)?;
        while !rdn.is_empty() {
            let mut atv = rdn.read_sequence().map_err(asn1_err)?;
            let oid = Oid::from_der_value(atv.read_oid().map_err(asn1_err)?).map_err(asn1_err)?;
            let attr = known::DN_ATTRIBUTES
                .iter()
                .find(|(arcs, _)| oid.is(arcs))
                .map(|(_, short)| short.to_string())
                .unwrap_or_else(|| oid.to_string());
            let value = atv.read_string().map_err(asn1_err)?;
            atv.finish().map_err(asn1_err)?;
            entries.push((attr, value));
        }
    }
    Ok(DistinguishedName { entries })
}

fn parse_validity(dec: &mut Decoder) -> Result<(i64, i64), PkiError> {
    let mut validity = dec.read_sequence().map_err(asn1_err)?;
    let not_before = validity.read_time().map_err(asn1_err)?;
    let not_after = validity.read_time().map_err(asn1_err)?;
    validity.finish().map_err(asn1_err)?;
    Ok((not_before, not_after))
}

fn parse_public_key_info(dec: &mut Decoder) -> Result<PublicKeyInfo, PkiError> {
    let mut spki = dec.read_sequence().map_err(asn1_err)?;
    let mut alg = spki.read_sequence().map_err(asn1_err)?;
    let key = spki.read_bit_string().map_err(asn1_err)?;
    spki.finish().map_err(asn1_err)?;
    let oid = Oid::from_der_value(alg.read_oid().map_err(asn1_err)?).map_err(asn1_err)?;

    let info = if oid.is(known::ED25519) {
        let pk: [u8; 32] = key
            .try_into()
            .map_err(|_| PkiError::InvalidCert("ed25519 key must be 32 bytes".into()))?;
        PublicKeyInfo::Ed25519(pk)
    } else if oid.is(known::EC_PUBLIC_KEY) {
        let curve_oid =
            Oid::from_der_value(alg.read_oid().map_err(asn1_err)?).map_err(asn1_err)?;
        let curve = curve_from_oid(&curve_oid)
            .ok_or_else(|| PkiError::UnsupportedAlgorithm(format!("ec curve {curve_oid}")))?;
        if key.len() != 1 + 2 * curve.field_size() || key[0] != 0x04 {
            return Err(PkiError::InvalidCert("ec key is not an uncompressed point".into()));
        }
        PublicKeyInfo::Ec {
            curve,
            point: key.to_vec(),
        }
    } else if oid.is(known::RSA_ENCRYPTION) {
        alg.read_null().map_err(asn1_err)?;
        let mut outer = Decoder::new(key);
        let mut rsa = outer.read_sequence().map_err(asn1_err)?;
        let n = rsa.read_unsigned().map_err(asn1_err)?.to_vec();
        let e = rsa.read_unsigned().map_err(asn1_err)?.to_vec();
        rsa.finish().map_err(asn1_err)?;
        outer.finish().map_err(asn1_err)?;
        PublicKeyInfo::Rsa { n, e }
    } else {
        return Err(PkiError::UnsupportedAlgorithm(format!("public key {oid}")));
    };
    alg.finish().map_err(asn1_err)?;
    Ok(info)
}

fn parse_extensions(data: &[u8]) -> Result<Vec<X509Extension>, PkiError> {
    let mut outer = Decoder::new(data);
    let mut seq = outer.read_sequence().map_err(asn1_err)?;
    outer.finish().map_err(asn1_err)?;
    let mut extensions = Vec::new();
    while !seq.is_empty() {
        let mut ext = seq.read_sequence().map_err(asn1_err)?;
        let oid = ext.read_oid().map_err(asn1_err)?.to_vec();
        // critical BOOLEAN DEFAULT FALSE
        let critical = match ext.peek_tag() {
            Some(t) if t.0 == tags::BOOLEAN => ext.read_boolean().map_err(asn1_err)?,
            _ => false,
        };
        let value = ext.read_octet_string().map_err(asn1_err)?.to_vec();
        ext.finish().map_err(asn1_err)?;
        extensions.push(X509Extension {
            oid,
            critical,
            value,
        });
    }
    Ok(extensions)
}

impl Certificate {
    pub fn from_der(data: &[u8]) -> Result<Self, PkiError> {
        let mut outer = Decoder::new(data);
        let mut cert = outer.read_sequence().map_err(asn1_err)?;
        outer.finish().map_err(asn1_err)?;

        let tbs_tlv = cert.read_expected(tags::SEQUENCE).map_err(asn1_err)?;
        let mut tbs = Decoder::new(tbs_tlv.value);

        // version [0] EXPLICIT INTEGER DEFAULT v1
        let version = match tbs.read_optional_context(0, true).map_err(asn1_err)? {
            Some(tlv) => {
                let mut v = Decoder::new(tlv.value);
                let n = v.read_small_uint().map_err(asn1_err)?;
                v.finish().map_err(asn1_err)?;
                if n > 2 {
                    return Err(PkiError::InvalidCert(format!("unknown version {n}")));
                }
                n as u8 + 1
            }
            None => 1,
        };
        let serial_number = tbs.read_integer().map_err(asn1_err)?.to_vec();
        let inner_alg = parse_signature_algorithm(&mut tbs)?;
        let issuer = parse_name(&mut tbs)?;
        let (not_before, not_after) = parse_validity(&mut tbs)?;
        let subject = parse_name(&mut tbs)?;
        let public_key = parse_public_key_info(&mut tbs)?;
        // issuerUniqueID [1], subjectUniqueID [2]
        tbs.read_optional_context(1, false).map_err(asn1_err)?;
        tbs.read_optional_context(2, false).map_err(asn1_err)?;
        let extensions = match tbs.read_optional_context(3, true).map_err(asn1_err)? {
            Some(tlv) => parse_extensions(tlv.value)?,
            None => Vec::new(),
        };
        tbs.finish().map_err(asn1_err)?;

        let signature_algorithm = parse_signature_algorithm(&mut cert)?;
        if signature_algorithm != inner_alg {
            return Err(PkiError::InvalidCert(
                "inner and outer signature algorithms differ".into(),
            ));
        }
        let signature_value = cert.read_bit_string().map_err(asn1_err)?.to_vec();
        cert.finish().map_err(asn1_err)?;

        Ok(Certificate {
            raw: data.to_vec(),
            version,
            serial_number,
            signature_algorithm,
            issuer,
            subject,
            not_before,
            not_after,
            public_key,
            extensions,
            signature_value,
            tbs_raw: tbs_tlv.raw.to_vec(),
        })
    }

    pub fn to_der(&self) -> &[u8] {
        &self.raw
    }

    /// The signed TBSCertificate encoding.
    pub fn tbs_der(&self) -> &[u8] {
        &self.tbs_raw
    }

    /// Issuer and subject names are equal.
    pub fn is_self_signed(&self) -> bool {
        self.issuer == self.subject
    }

    /// Verify this certificate's signature with `issuer`'s public key.
    pub fn verify_signature(&self, issuer: &Certificate) -> Result<bool, PkiError> {
        verify_signature(
            self.signature_algorithm,
            &issuer.public_key,
            &self.tbs_raw,
            &self.signature_value,
        )
    }

    /// Fails with `CertNotYetValid` or `CertExpired` when `time` falls
    /// outside `[not_before, not_after]`.
    pub fn check_validity(&self, time: i64) -> Result<(), PkiError> {
        if time < self.not_before {
            return Err(PkiError::CertNotYetValid);
        }
        if time > self.not_after {
            return Err(PkiError::CertExpired);
        }
        Ok(())
    }

    pub fn extension(&self, arcs: &[u32]) -> Option<&X509Extension> {
        let oid = mantis_utils::oid::encode(arcs);
        self.extensions.iter().find(|e| e.oid == oid)
    }

    /// The `cA` flag of basic constraints; false when the extension is
    /// absent or malformed.
    pub fn is_ca(&self) -> bool {
        let Some(ext) = self.extension(known::BASIC_CONSTRAINTS) else {
            return false;
        };
        let mut outer = Decoder::new(&ext.value);
        let Ok(mut bc) = outer.read_sequence() else {
            return false;
        };
        match bc.peek_tag() {
            Some(t) if t.0 == tags::BOOLEAN => bc.read_boolean().unwrap_or(false),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::x509::{CertificateBuilder, SigningKey};
    use mantis_crypto::ecdsa::EcdsaKeyPair;
    use mantis_crypto::ed25519::Ed25519KeyPair;
    use mantis_crypto::rand::OsRandom;
    use mantis_types::EccCurveId;

    fn ed_key(seed: u8) -> SigningKey {
        SigningKey::Ed25519(Ed25519KeyPair::from_seed(&[seed; 32]).unwrap())
    }

    fn self_signed(key: &SigningKey, cn: &str) -> Certificate {
        let dn = DistinguishedName::new().with("CN", cn).with("O", "Mantis");
        CertificateBuilder::new()
            .serial_number(&[0x0A, 0xBC])
            .issuer(dn.clone())
            .subject(dn)
            .validity(1_600_000_000, 1_900_000_000)
            .subject_public_key(key.public_key_info().unwrap())
            .ca(true)
            .build(key, &mut OsRandom)
            .unwrap()
    }

    #[test]
    fn test_parse_built_certificate() {
        let key = ed_key(1);
        let cert = self_signed(&key, "root");
        let parsed = Certificate::from_der(&cert.raw).unwrap();
        assert_eq!(parsed, cert);
        assert_eq!(parsed.version, 3);
        assert_eq!(parsed.serial_number, [0x0A, 0xBC]);
        assert_eq!(parsed.subject.get("CN"), Some("root"));
        assert_eq!(parsed.subject.to_string(), "CN=root, O=Mantis");
        assert_eq!(parsed.signature_algorithm, SignatureAlgorithm::Ed25519);
        assert!(parsed.is_self_signed());
        assert!(parsed.is_ca());
        assert!(parsed.verify_signature(&parsed).unwrap());
    }

    #[test]
    fn test_ec_certificate_key() {
        let key = SigningKey::Ecdsa(
            EcdsaKeyPair::generate(EccCurveId::NistP256, &mut OsRandom).unwrap(),
        );
        let cert = self_signed(&key, "ec");
        assert_eq!(cert.signature_algorithm, SignatureAlgorithm::EcdsaSha256);
        match &cert.public_key {
            PublicKeyInfo::Ec { curve, point } => {
                assert_eq!(*curve, EccCurveId::NistP256);
                assert_eq!(point.len(), 65);
            }
            other => panic!("unexpected key {other:?}"),
        }
        assert!(cert.verify_signature(&cert).unwrap());
    }

    #[test]
    fn test_tampered_tbs_fails_signature() {
        let key = ed_key(2);
        let cert = self_signed(&key, "tamper");
        let mut raw = cert.raw.clone();
        // flip a byte inside the subject common name
        let pos = raw
            .windows(6)
            .rposition(|w| w == b"tamper")
            .unwrap();
        raw[pos] ^= 0x20;
        let bad = Certificate::from_der(&raw).unwrap();
        assert!(!bad.verify_signature(&cert).unwrap());
    }

    #[test]
    fn test_validity_window() {
        let cert = self_signed(&ed_key(3), "time");
        assert!(cert.check_validity(1_700_000_000).is_ok());
        assert_eq!(cert.check_validity(1_500_000_000), Err(PkiError::CertNotYetValid));
        assert_eq!(cert.check_validity(2_000_000_000), Err(PkiError::CertExpired));
    }

    #[test]
    fn test_rejects_garbage_and_trailing_data() {
        assert!(Certificate::from_der(&[]).is_err());
        assert!(Certificate::from_der(&[0x30, 0x03, 0x02, 0x01, 0x01]).is_err());
        let mut raw = self_signed(&ed_key(4), "trail").raw;
        raw.push(0);
        assert!(Certificate::from_der(&raw).is_err());
    }

    #[test]
    fn test_truncation_never_panics() {
        let raw = self_signed(&ed_key(5), "cut").raw;
        for len in 0..raw.len() {
            assert!(Certificate::from_der(&raw[..len]).is_err());
        }
    }
}
