//! Signature algorithm dispatch and the `SigningKey` abstraction.

use mantis_crypto::ecdsa::{EcdsaKeyPair, EcdsaPublicKey};
use mantis_crypto::ed25519::{Ed25519KeyPair, Ed25519PublicKey};
use mantis_crypto::hash::Hash;
use mantis_crypto::rsa::{RsaPrivateKey, RsaPublicKey};
use mantis_types::{EccCurveId, HashAlgId, PkiError, SecureRandom};
use mantis_utils::asn1::Encoder;
use mantis_utils::oid::{self, known, Oid};

use super::{PublicKeyInfo, SignatureAlgorithm};

impl SignatureAlgorithm {
    pub(crate) fn from_oid(oid: &Oid) -> Option<Self> {
        [
            (known::ED25519, SignatureAlgorithm::Ed25519),
            (known::ECDSA_WITH_SHA256, SignatureAlgorithm::EcdsaSha256),
            (known::ECDSA_WITH_SHA384, SignatureAlgorithm::EcdsaSha384),
            (known::SHA256_WITH_RSA, SignatureAlgorithm::RsaPkcs1Sha256),
            (known::SHA384_WITH_RSA, SignatureAlgorithm::RsaPkcs1Sha384),
        ]
        .into_iter()
        .find(|(arcs, _)| oid.is(arcs))
        .map(|(_, alg)| alg)
    }

    pub fn oid(self) -> &'static [u32] {
        match self {
            SignatureAlgorithm::Ed25519 => known::ED25519,
            SignatureAlgorithm::EcdsaSha256 => known::ECDSA_WITH_SHA256,
            SignatureAlgorithm::EcdsaSha384 => known::ECDSA_WITH_SHA384,
            SignatureAlgorithm::RsaPkcs1Sha256 => known::SHA256_WITH_RSA,
            SignatureAlgorithm::RsaPkcs1Sha384 => known::SHA384_WITH_RSA,
        }
    }

    /// Digest applied to the TBS bytes; `None` for Ed25519, which signs
    /// the message itself.
    pub fn hash(self) -> Option<HashAlgId> {
        match self {
            SignatureAlgorithm::Ed25519 => None,
            SignatureAlgorithm::EcdsaSha256 | SignatureAlgorithm::RsaPkcs1Sha256 => {
                Some(HashAlgId::Sha256)
            }
            SignatureAlgorithm::EcdsaSha384 | SignatureAlgorithm::RsaPkcs1Sha384 => {
                Some(HashAlgId::Sha384)
            }
        }
    }

    /// AlgorithmIdentifier DER. RSA carries explicit NULL parameters,
    /// ECDSA and Ed25519 carry none (RFC 5758, RFC 8410).
    pub(crate) fn to_der(self) -> Vec<u8> {
        let rsa = matches!(
            self,
            SignatureAlgorithm::RsaPkcs1Sha256 | SignatureAlgorithm::RsaPkcs1Sha384
        );
        let mut enc = Encoder::new();
        enc.sequence(|s| {
            s.write_oid(&oid::encode(self.oid()));
            if rsa {
                s.write_null();
            }
        });
        enc.finish()
    }
}

pub(crate) fn curve_from_oid(oid: &Oid) -> Option<EccCurveId> {
    if oid.is(known::PRIME256V1) {
        Some(EccCurveId::NistP256)
    } else if oid.is(known::SECP384R1) {
        Some(EccCurveId::NistP384)
    } else {
        None
    }
}

pub(crate) fn curve_oid(curve: EccCurveId) -> &'static [u32] {
    match curve {
        EccCurveId::NistP256 => known::PRIME256V1,
        EccCurveId::NistP384 => known::SECP384R1,
    }
}

fn digest(alg: SignatureAlgorithm, message: &[u8]) -> Result<Vec<u8>, PkiError> {
    match alg.hash() {
        Some(h) => Ok(Hash::digest(h, message)?),
        None => Ok(message.to_vec()),
    }
}

/// Check `signature` over `message` with `key` under `alg`.
///
/// A key whose type does not fit the algorithm is an error, not a failed
/// verification.
pub(crate) fn verify_signature(
    alg: SignatureAlgorithm,
    key: &PublicKeyInfo,
    message: &[u8],
    signature: &[u8],
) -> Result<bool, PkiError> {
    match (alg, key) {
        (SignatureAlgorithm::Ed25519, PublicKeyInfo::Ed25519(pk)) => {
            Ok(Ed25519PublicKey::from_bytes(pk)?.verify(message, signature)?)
        }
        (
            SignatureAlgorithm::EcdsaSha256 | SignatureAlgorithm::EcdsaSha384,
            PublicKeyInfo::Ec { curve, point },
        ) => {
            let key = EcdsaPublicKey::from_uncompressed(*curve, point)?;
            let d = digest(alg, message)?;
            // a signature that is not even DER counts as invalid
            Ok(key.verify(&d, signature).unwrap_or(false))
        }
        (
            SignatureAlgorithm::RsaPkcs1Sha256 | SignatureAlgorithm::RsaPkcs1Sha384,
            PublicKeyInfo::Rsa { n, e },
        ) => {
            let key = RsaPublicKey::new(n, e)?;
            let d = digest(alg, message)?;
            let hash = alg.hash().ok_or_else(|| {
                PkiError::UnsupportedAlgorithm("rsa signature without digest".into())
            })?;
            Ok(key.verify_pkcs1(hash, &d, signature).unwrap_or(false))
        }
        (alg, _) => Err(PkiError::UnsupportedAlgorithm(format!(
            "{alg:?} signature with mismatched key type"
        ))),
    }
}

/// A private key able to sign certificates.
#[derive(Debug)]
pub enum SigningKey {
    /// Signs the raw TBS bytes.
    Ed25519(Ed25519KeyPair),
    /// SHA-256 on P-256, SHA-384 on P-384.
    Ecdsa(EcdsaKeyPair),
    /// PKCS#1 v1.5 with SHA-256.
    Rsa(RsaPrivateKey),
}

impl SigningKey {
    pub fn algorithm(&self) -> SignatureAlgorithm {
        match self {
            SigningKey::Ed25519(_) => SignatureAlgorithm::Ed25519,
            SigningKey::Ecdsa(k) => match k.public_key().curve() {
                EccCurveId::NistP256 => SignatureAlgorithm::EcdsaSha256,
                EccCurveId::NistP384 => SignatureAlgorithm::EcdsaSha384,
            },
            SigningKey::Rsa(_) => SignatureAlgorithm::RsaPkcs1Sha256,
        }
    }

    pub fn public_key_info(&self) -> Result<PublicKeyInfo, PkiError> {
        Ok(match self {
            SigningKey::Ed25519(k) => PublicKeyInfo::Ed25519(*k.public_key().as_bytes()),
            SigningKey::Ecdsa(k) => PublicKeyInfo::Ec {
                curve: k.public_key().curve(),
                point: k.public_key().to_uncompressed()?,
            },
            SigningKey::Rsa(k) => PublicKeyInfo::Rsa {
                n: k.public_key().n_bytes(),
                e: k.public_key().e_bytes(),
            },
        })
    }

    pub fn sign(&self, message: &[u8], rng: &mut dyn SecureRandom) -> Result<Vec<u8>, PkiError> {
        let alg = self.algorithm();
        match self {
            SigningKey::Ed25519(k) => Ok(k.sign(message)?.to_vec()),
            SigningKey::Ecdsa(k) => Ok(k.sign(&digest(alg, message)?, rng)?),
            SigningKey::Rsa(k) => Ok(k.sign_pkcs1(HashAlgId::Sha256, &digest(alg, message)?)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mantis_crypto::rand::OsRandom;

    #[test]
    fn test_oid_mapping_roundtrip() {
        for alg in [
            SignatureAlgorithm::Ed25519,
            SignatureAlgorithm::EcdsaSha256,
            SignatureAlgorithm::EcdsaSha384,
            SignatureAlgorithm::RsaPkcs1Sha256,
            SignatureAlgorithm::RsaPkcs1Sha384,
        ] {
            assert_eq!(SignatureAlgorithm::from_oid(&Oid::new(alg.oid())), Some(alg));
        }
        assert_eq!(SignatureAlgorithm::from_oid(&Oid::new(known::RSASSA_PSS)), None);
    }

    #[test]
    fn test_rsa_alg_id_has_null_params() {
        let der = SignatureAlgorithm::RsaPkcs1Sha256.to_der();
        assert_eq!(&der[der.len() - 2..], &[0x05, 0x00]);
        let der = SignatureAlgorithm::Ed25519.to_der();
        assert_eq!(der, [0x30, 0x05, 0x06, 0x03, 0x2B, 0x65, 0x70]);
    }

    #[test]
    fn test_sign_verify_each_key_type() {
        let mut rng = OsRandom;
        let keys = [
            SigningKey::Ed25519(Ed25519KeyPair::from_seed(&[9u8; 32]).unwrap()),
            SigningKey::Ecdsa(EcdsaKeyPair::generate(EccCurveId::NistP384, &mut rng).unwrap()),
        ];
        for key in &keys {
            let sig = key.sign(b"to be signed", &mut rng).unwrap();
            let pk = key.public_key_info().unwrap();
            assert!(verify_signature(key.algorithm(), &pk, b"to be signed", &sig).unwrap());
            assert!(!verify_signature(key.algorithm(), &pk, b"to be signeD", &sig).unwrap());
        }
    }

    #[test]
    fn test_mismatched_key_type() {
        let pk = PublicKeyInfo::Ed25519([1; 32]);
        assert!(matches!(
            verify_signature(SignatureAlgorithm::EcdsaSha256, &pk, b"m", b"s"),
            Err(PkiError::UnsupportedAlgorithm(_))
        ));
    }
}
