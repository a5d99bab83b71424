//! Self-signed server identities generated at start-up.

use mantis_crypto::ecdsa::EcdsaKeyPair;
use mantis_crypto::ed25519::Ed25519KeyPair;
use mantis_crypto::rand::OsRandom;
use mantis_crypto::rsa::RsaPrivateKey;
use mantis_pki::x509::{CertificateBuilder, DistinguishedName, SigningKey};
use mantis_tls::PrivateKey;
use mantis_types::EccCurveId;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

const RSA_BITS: usize = 2048;
const VALIDITY_SECS: i64 = 365 * 24 * 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    Ed25519,
    EcdsaP256,
    EcdsaP384,
    Rsa,
}

impl FromStr for KeyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ed25519" => Ok(KeyType::Ed25519),
            "p256" | "p-256" | "ecdsa" => Ok(KeyType::EcdsaP256),
            "p384" | "p-384" => Ok(KeyType::EcdsaP384),
            "rsa" => Ok(KeyType::Rsa),
            other => Err(format!("unknown key type '{other}' (use ed25519, p256, p384 or rsa)")),
        }
    }
}

/// A fresh key and a self-signed certificate for `cn`, valid from an hour ago for a year.
pub fn generate(key_type: KeyType, cn: &str) -> Result<(Vec<u8>, PrivateKey), Box<dyn std::error::Error>> {
    let mut rng = OsRandom;
    let (signer, key) = match key_type {
        KeyType::Ed25519 => {
            let kp = Ed25519KeyPair::generate(&mut rng)?;
            let copy = Ed25519KeyPair::from_seed(kp.seed())?;
            (SigningKey::Ed25519(kp), PrivateKey::Ed25519(copy))
        }
        KeyType::EcdsaP256 | KeyType::EcdsaP384 => {
            let curve = if key_type == KeyType::EcdsaP256 {
                EccCurveId::NistP256
            } else {
                EccCurveId::NistP384
            };
            let kp = EcdsaKeyPair::generate(curve, &mut rng)?;
            let copy = EcdsaKeyPair::from_private_key(curve, &kp.private_key_bytes()?)?;
            (SigningKey::Ecdsa(kp), PrivateKey::Ecdsa(copy))
        }
        KeyType::Rsa => {
            tracing::info!("generating {RSA_BITS}-bit RSA key");
            let key = RsaPrivateKey::generate(RSA_BITS, &mut rng)?;
            (SigningKey::Rsa(key.clone()), PrivateKey::Rsa(key))
        }
    };
    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as i64;
    let cert = CertificateBuilder::self_signed(
        DistinguishedName::new().with("CN", cn),
        &signer,
        now - 3600,
        now + VALIDITY_SECS,
    )?
    .build(&signer, &mut rng)?;
    Ok((cert.raw, key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mantis_pki::x509::Certificate;

    #[test]
    fn test_key_type_parse() {
        assert_eq!("Ed25519".parse::<KeyType>().unwrap(), KeyType::Ed25519);
        assert_eq!("p-384".parse::<KeyType>().unwrap(), KeyType::EcdsaP384);
        assert!("dsa".parse::<KeyType>().is_err());
    }

    #[test]
    fn test_generate_self_signed() {
        for kt in [KeyType::Ed25519, KeyType::EcdsaP256, KeyType::EcdsaP384] {
            let (der, key) = generate(kt, "mantis.test").unwrap();
            let cert = Certificate::from_der(&der).unwrap();
            assert!(cert.is_self_signed());
            assert!(cert.verify_signature(&cert).unwrap());
            assert_eq!(cert.subject.get("CN"), Some("mantis.test"));
            assert_eq!(kt == KeyType::Ed25519, matches!(key, PrivateKey::Ed25519(_)));
        }
    }
}
