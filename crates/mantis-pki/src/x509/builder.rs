//! `CertificateBuilder` and the DER writers behind it.

use mantis_types::{PkiError, SecureRandom};
use mantis_utils::asn1::Encoder;
use mantis_utils::oid::{self, known};

use super::signing::{curve_oid, SigningKey};
use super::{Certificate, DistinguishedName, PublicKeyInfo, X509Extension};

pub(crate) fn encode_name(dn: &DistinguishedName) -> Result<Vec<u8>, PkiError> {
    let mut attrs = Vec::with_capacity(dn.entries.len());
    for (attr, value) in &dn.entries {
        let arcs = known::DN_ATTRIBUTES
            .iter()
            .find(|(_, short)| short == attr)
            .map(|(arcs, _)| *arcs)
            .ok_or_else(|| PkiError::InvalidCert(format!("unknown name attribute {attr}")))?;
        attrs.push((arcs, attr.as_str(), value.as_str()));
    }
    let mut enc = Encoder::new();
    enc.sequence(|name| {
        for (arcs, attr, value) in attrs {
            name.set(|rdn| {
                rdn.sequence(|atv| {
                    atv.write_oid(&oid::encode(arcs));
                    // countryName is PrintableString (RFC 5280 appendix A)
                    if attr == "C" {
                        atv.write_printable_string(value);
                    } else {
                        atv.write_utf8_string(value);
                    }
                });
            });
        }
    });
    Ok(enc.finish())
}

impl PublicKeyInfo {
    /// SubjectPublicKeyInfo DER.
    pub fn to_der(&self) -> Vec<u8> {
        let mut enc = Encoder::new();
        enc.sequence(|spki| match self {
            PublicKeyInfo::Ed25519(pk) => {
                spki.sequence(|alg| {
                    alg.write_oid(&oid::encode(known::ED25519));
                });
                spki.write_bit_string(pk);
            }
            PublicKeyInfo::Ec { curve, point } => {
                spki.sequence(|alg| {
                    alg.write_oid(&oid::encode(known::EC_PUBLIC_KEY))
                        .write_oid(&oid::encode(curve_oid(*curve)));
                });
                spki.write_bit_string(point);
            }
            PublicKeyInfo::Rsa { n, e } => {
                spki.sequence(|alg| {
                    alg.write_oid(&oid::encode(known::RSA_ENCRYPTION)).write_null();
                });
                let mut key = Encoder::new();
                key.sequence(|k| {
                    k.write_unsigned(n).write_unsigned(e);
                });
                spki.write_bit_string(&key.finish());
            }
        });
        enc.finish()
    }
}

/// Builder for X.509 v3 certificates, used for test and demo identities.
///
/// ```no_run
/// # use mantis_pki::x509::{CertificateBuilder, DistinguishedName, SigningKey};
/// # fn demo(key: &SigningKey) -> Result<(), mantis_types::PkiError> {
/// let name = DistinguishedName::new().with("CN", "localhost");
/// let cert = CertificateBuilder::self_signed(name, key, 0, 4_000_000_000)?
///     .build(key, &mut mantis_crypto::rand::OsRandom)?;
/// # Ok(()) }
/// ```
#[derive(Debug, Clone)]
pub struct CertificateBuilder {
    serial_number: Vec<u8>,
    issuer: DistinguishedName,
    subject: DistinguishedName,
    not_before: i64,
    not_after: i64,
    public_key: Option<PublicKeyInfo>,
    extensions: Vec<X509Extension>,
}

impl Default for CertificateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CertificateBuilder {
    pub fn new() -> Self {
        Self {
            serial_number: vec![0x01],
            issuer: DistinguishedName::new(),
            subject: DistinguishedName::new(),
            not_before: 0,
            not_after: 0,
            public_key: None,
            extensions: Vec::new(),
        }
    }

    /// Issuer = subject = `name`, keyed with `key`'s own public key and
    /// marked as a CA.
    pub fn self_signed(
        name: DistinguishedName,
        key: &SigningKey,
        not_before: i64,
        not_after: i64,
    ) -> Result<Self, PkiError> {
        Ok(Self::new()
            .issuer(name.clone())
            .subject(name)
            .validity(not_before, not_after)
            .subject_public_key(key.public_key_info()?)
            .ca(true))
    }

    pub fn serial_number(mut self, serial: &[u8]) -> Self {
        self.serial_number = serial.to_vec();
        self
    }

    pub fn issuer(mut self, dn: DistinguishedName) -> Self {
        self.issuer = dn;
        self
    }

    pub fn subject(mut self, dn: DistinguishedName) -> Self {
        self.subject = dn;
        self
    }

    pub fn validity(mut self, not_before: i64, not_after: i64) -> Self {
        self.not_before = not_before;
        self.not_after = not_after;
        self
    }

    pub fn subject_public_key(mut self, key: PublicKeyInfo) -> Self {
        self.public_key = Some(key);
        self
    }

    pub fn add_extension(mut self, arcs: &[u32], critical: bool, value: Vec<u8>) -> Self {
        self.extensions.push(X509Extension {
            oid: oid::encode(arcs),
            critical,
            value,
        });
        self
    }

    /// Critical basic constraints carrying only the `cA` flag.
    pub fn ca(self, is_ca: bool) -> Self {
        let mut bc = Encoder::new();
        bc.sequence(|s| {
            if is_ca {
                s.write_boolean(true);
            }
        });
        self.add_extension(known::BASIC_CONSTRAINTS, true, bc.finish())
    }

    /// Sign with `issuer_key` and return the decoded result.
    pub fn build(
        self,
        issuer_key: &SigningKey,
        rng: &mut dyn SecureRandom,
    ) -> Result<Certificate, PkiError> {
        let public_key = self
            .public_key
            .ok_or_else(|| PkiError::InvalidCert("subject public key not set".into()))?;
        if self.not_after < self.not_before {
            return Err(PkiError::InvalidCert("validity ends before it starts".into()));
        }
        let alg = issuer_key.algorithm();
        let alg_der = alg.to_der();
        let issuer = encode_name(&self.issuer)?;
        let subject = encode_name(&self.subject)?;

        let mut tbs = Encoder::new();
        tbs.sequence(|t| {
            t.explicit(0, |v| {
                v.write_u64(2);
            });
            t.write_unsigned(&self.serial_number)
                .write_raw(&alg_der)
                .write_raw(&issuer)
                .sequence(|v| {
                    v.write_time(self.not_before).write_time(self.not_after);
                })
                .write_raw(&subject)
                .write_raw(&public_key.to_der());
            if !self.extensions.is_empty() {
                t.explicit(3, |x| {
                    x.sequence(|exts| {
                        for ext in &self.extensions {
                            exts.sequence(|e| {
                                e.write_oid(&ext.oid);
                                if ext.critical {
                                    e.write_boolean(true);
                                }
                                e.write_octet_string(&ext.value);
                            });
                        }
                    });
                });
            }
        });
        let tbs = tbs.finish();
        let signature = issuer_key.sign(&tbs, rng)?;

        let mut cert = Encoder::new();
        cert.sequence(|c| {
            c.write_raw(&tbs)
                .write_raw(&alg_der)
                .write_bit_string(&signature);
        });
        Certificate::from_der(&cert.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mantis_crypto::ed25519::Ed25519KeyPair;
    use mantis_crypto::rand::OsRandom;
    use mantis_crypto::rsa::RsaPrivateKey;

    #[test]
    fn test_name_encoding() {
        let dn = DistinguishedName::new().with("C", "NL").with("CN", "x");
        let der = encode_name(&dn).unwrap();
        // SEQUENCE { SET { SEQUENCE { OID 2.5.4.6, PrintableString "NL" } }, ... }
        assert_eq!(
            &der[..13],
            &[0x30, 0x19, 0x31, 0x0B, 0x30, 0x09, 0x06, 0x03, 0x55, 0x04, 0x06, 0x13, 0x02]
        );
        assert!(encode_name(&DistinguishedName::new().with("XX", "y")).is_err());
    }

    #[test]
    fn test_missing_key_and_bad_validity() {
        let key = SigningKey::Ed25519(Ed25519KeyPair::from_seed(&[1; 32]).unwrap());
        assert!(CertificateBuilder::new().build(&key, &mut OsRandom).is_err());
        let b = CertificateBuilder::new()
            .subject_public_key(key.public_key_info().unwrap())
            .validity(10, 5);
        assert!(b.build(&key, &mut OsRandom).is_err());
    }

    #[test]
    fn test_rsa_issued_leaf() {
        let ca_key = SigningKey::Rsa(RsaPrivateKey::generate(1024, &mut OsRandom).unwrap());
        let leaf_key = SigningKey::Ed25519(Ed25519KeyPair::from_seed(&[7; 32]).unwrap());
        let ca_name = DistinguishedName::new().with("CN", "rsa ca");
        let ca = CertificateBuilder::self_signed(ca_name.clone(), &ca_key, 0, 2_000_000_000)
            .unwrap()
            .build(&ca_key, &mut OsRandom)
            .unwrap();
        let leaf = CertificateBuilder::new()
            .serial_number(&[0x80, 0x01])
            .issuer(ca_name)
            .subject(DistinguishedName::new().with("CN", "leaf"))
            .validity(0, 2_000_000_000)
            .subject_public_key(leaf_key.public_key_info().unwrap())
            .build(&ca_key, &mut OsRandom)
            .unwrap();
        assert_eq!(leaf.signature_algorithm, crate::x509::SignatureAlgorithm::RsaPkcs1Sha256);
        assert_eq!(leaf.serial_number, [0x00, 0x80, 0x01]);
        assert!(leaf.extensions.is_empty());
        assert!(!leaf.is_ca());
        assert!(leaf.verify_signature(&ca).unwrap());
        assert!(!leaf.verify_signature(&leaf).is_ok_and(|v| v));
    }
}
