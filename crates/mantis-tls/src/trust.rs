//! Certificate decoding and chain validation seam.
//!
//! The handshake only sees [`CertificateDecoder`]; the `pki` feature
//! supplies [`PkiDecoder`] on top of `mantis-pki`.

use crate::crypt::CredentialKind;
use mantis_types::{EccCurveId, TlsError};
use std::sync::Arc;

/// Public key of a peer certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerPublicKey {
    Ed25519([u8; 32]),
    /// Uncompressed SEC1 point.
    Ec { curve: EccCurveId, point: Vec<u8> },
    Rsa { n: Vec<u8>, e: Vec<u8> },
}

impl PeerPublicKey {
    pub fn kind(&self) -> CredentialKind {
        match self {
            PeerPublicKey::Ed25519(_) => CredentialKind::Ed25519,
            PeerPublicKey::Ec { curve, .. } => CredentialKind::Ecdsa(*curve),
            PeerPublicKey::Rsa { .. } => CredentialKind::Rsa,
        }
    }
}

/// The parts of a certificate the engine uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCertificate {
    pub der: Vec<u8>,
    pub subject: String,
    pub issuer: String,
    /// Unix seconds.
    pub not_before: i64,
    pub not_after: i64,
    pub public_key: PeerPublicKey,
}

pub trait CertificateDecoder: Send + Sync {
    fn parse(&self, der: &[u8]) -> Result<ParsedCertificate, TlsError>;

    /// Validate `leaf` up to one of `roots`. `check_time` of `None` skips
    /// validity periods.
    fn verify_chain(
        &self,
        leaf: &[u8],
        intermediates: &[Vec<u8>],
        roots: &[Vec<u8>],
        check_time: Option<i64>,
    ) -> Result<(), TlsError>;
}

/// The decoder a context gets when none is configured.
pub fn default_decoder() -> Option<Arc<dyn CertificateDecoder>> {
    #[cfg(feature = "pki")]
    {
        Some(Arc::new(PkiDecoder))
    }
    #[cfg(not(feature = "pki"))]
    {
        None
    }
}

#[cfg(feature = "pki")]
pub use pki::PkiDecoder;

#[cfg(feature = "pki")]
mod pki {
    use super::*;
    use mantis_pki::x509::{Certificate, CertificateVerifier, PublicKeyInfo};

    /// X.509 decoder backed by `mantis-pki`.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct PkiDecoder;

    impl CertificateDecoder for PkiDecoder {
        fn parse(&self, der: &[u8]) -> Result<ParsedCertificate, TlsError> {
            let cert = Certificate::from_der(der)?;
            let public_key = match cert.public_key {
                PublicKeyInfo::Ed25519(k) => PeerPublicKey::Ed25519(k),
                PublicKeyInfo::Ec { curve, point } => PeerPublicKey::Ec { curve, point },
                PublicKeyInfo::Rsa { n, e } => PeerPublicKey::Rsa { n, e },
            };
            Ok(ParsedCertificate {
                subject: cert.subject.to_string(),
                issuer: cert.issuer.to_string(),
                not_before: cert.not_before,
                not_after: cert.not_after,
                public_key,
                der: cert.raw,
            })
        }

        fn verify_chain(
            &self,
            leaf: &[u8],
            intermediates: &[Vec<u8>],
            roots: &[Vec<u8>],
            check_time: Option<i64>,
        ) -> Result<(), TlsError> {
            let leaf = Certificate::from_der(leaf)?;
            let intermediates = intermediates
                .iter()
                .map(|d| Certificate::from_der(d))
                .collect::<Result<Vec<_>, _>>()?;
            let mut verifier = CertificateVerifier::new();
            for root in roots {
                verifier.add_trusted_cert(Certificate::from_der(root)?);
            }
            if let Some(t) = check_time {
                verifier.set_verification_time(t);
            }
            let path = verifier.verify_chain(&leaf, &intermediates)?;
            log::debug!("trust: verified path of {} certificates for {}", path.len(), leaf.subject);
            Ok(())
        }
    }
}
