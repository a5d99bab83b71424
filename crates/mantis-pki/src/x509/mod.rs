//! X.509 v3 certificates: DER decoding, signing and chain verification.
//!
//! Only the fields a TLS peer needs are interpreted. Extensions are kept as
//! raw `(oid, critical, value)` triples; apart from the CA flag of basic
//! constraints their contents are not enforced.

mod builder;
mod certificate;
mod signing;
mod verify;

pub use builder::CertificateBuilder;
pub use certificate::Certificate;
pub use signing::SigningKey;
pub use verify::CertificateVerifier;

use mantis_types::EccCurveId;

/// A distinguished name as an ordered list of `(attribute, value)` pairs.
///
/// Known attributes use their short names (`CN`, `O`, ...); others appear
/// in dotted OID form. Names compare entry by entry, which is the matching
/// rule chain building uses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistinguishedName {
    pub entries: Vec<(String, String)>,
}

impl DistinguishedName {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an attribute; chainable.
    pub fn with(mut self, attr: &str, value: &str) -> Self {
        self.entries.push((attr.to_string(), value.to_string()));
        self
    }

    /// First value of `attr`, e.g. `get("CN")`.
    pub fn get(&self, attr: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == attr)
            .map(|(_, v)| v.as_str())
    }
}

impl std::fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, (k, v)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{k}={v}")?;
        }
        Ok(())
    }
}

/// Subject public key, decoded from SubjectPublicKeyInfo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKeyInfo {
    Ed25519([u8; 32]),
    /// Uncompressed SEC1 point.
    Ec { curve: EccCurveId, point: Vec<u8> },
    /// Big-endian modulus and public exponent.
    Rsa { n: Vec<u8>, e: Vec<u8> },
}

/// Certificate signature algorithms understood by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    Ed25519,
    EcdsaSha256,
    EcdsaSha384,
    RsaPkcs1Sha256,
    RsaPkcs1Sha384,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct X509Extension {
    /// OID contents octets.
    pub oid: Vec<u8>,
    pub critical: bool,
    pub value: Vec<u8>,
}
